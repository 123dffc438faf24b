//! Persisted settings behind an opaque key/value store.
//!
//! Changes are staged with [`SettingsStore::set`] and only persisted by an
//! explicit [`SettingsStore::commit`], so a settings screen can batch its
//! edits and write once on exit.

use core::fmt;

use heapless::{LinearMap, String};

use crate::country::{COUNTRIES, DEFAULT_COUNTRY};
use crate::gain::{GainTarget, NOMINAL_DB, clamp_db};

/// Longest paired device name kept.
pub const DEVICE_NAME_LEN: usize = 32;
pub const DEFAULT_BACKLIGHT_PERCENT: u8 = 80;

pub type DeviceName = String<DEVICE_NAME_LEN>;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SettingKey {
    PairedAddress,
    PairedName,
    Paired,
    Country,
    MicGain,
    SpeakerGain,
    Backlight,
    AutoDim,
}

const KEY_COUNT: usize = 8;

#[derive(Clone, Debug, PartialEq)]
pub enum SettingValue {
    Address([u8; 6]),
    Name(DeviceName),
    Flag(bool),
    Index(u8),
    Gain(f32),
    Percent(u8),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SettingsError {
    /// The value does not have the type the key stores.
    TypeMismatch(SettingKey),
    /// The backing storage failed to read or write.
    Storage,
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TypeMismatch(key) => write!(f, "wrong value type for {key:?}"),
            Self::Storage => f.write_str("settings storage failure"),
        }
    }
}

/// Key/value persistence.
pub trait SettingsStore {
    fn get(&self, key: SettingKey) -> Option<SettingValue>;

    /// Stages a value.
    ///
    /// # Errors
    ///
    /// Rejects values whose type does not match the key.
    fn set(&mut self, key: SettingKey, value: SettingValue) -> Result<(), SettingsError>;

    /// Persists every staged value.
    ///
    /// # Errors
    ///
    /// Reports a storage failure; staged values stay staged.
    fn commit(&mut self) -> Result<(), SettingsError>;
}

fn check_type(key: SettingKey, value: &SettingValue) -> Result<(), SettingsError> {
    let matches = match key {
        SettingKey::PairedAddress => matches!(value, SettingValue::Address(_)),
        SettingKey::PairedName => matches!(value, SettingValue::Name(_)),
        SettingKey::Paired | SettingKey::AutoDim => matches!(value, SettingValue::Flag(_)),
        SettingKey::Country => matches!(value, SettingValue::Index(_)),
        SettingKey::MicGain | SettingKey::SpeakerGain => matches!(value, SettingValue::Gain(_)),
        SettingKey::Backlight => matches!(value, SettingValue::Percent(_)),
    };
    if matches {
        Ok(())
    } else {
        Err(SettingsError::TypeMismatch(key))
    }
}

/// In-RAM store; committed values survive only as long as the value itself.
#[derive(Clone, Debug, Default)]
pub struct MemorySettings {
    staged: LinearMap<SettingKey, SettingValue, KEY_COUNT>,
    committed: LinearMap<SettingKey, SettingValue, KEY_COUNT>,
    commits: u32,
}

impl MemorySettings {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            staged: LinearMap::new(),
            committed: LinearMap::new(),
            commits: 0,
        }
    }

    /// Value as last committed.
    #[must_use]
    pub fn committed(&self, key: SettingKey) -> Option<&SettingValue> {
        self.committed.get(&key)
    }

    #[must_use]
    pub const fn commit_count(&self) -> u32 {
        self.commits
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: SettingKey) -> Option<SettingValue> {
        self.staged
            .get(&key)
            .or_else(|| self.committed.get(&key))
            .cloned()
    }

    fn set(&mut self, key: SettingKey, value: SettingValue) -> Result<(), SettingsError> {
        check_type(key, &value)?;
        // One slot per key.
        self.staged
            .insert(key, value)
            .map(|_| ())
            .map_err(|_| SettingsError::Storage)
    }

    fn commit(&mut self) -> Result<(), SettingsError> {
        for (key, value) in &self.staged {
            self.committed
                .insert(*key, value.clone())
                .map_err(|_| SettingsError::Storage)?;
        }
        self.staged.clear();
        self.commits = self.commits.wrapping_add(1);
        Ok(())
    }
}

/// The handset the bridge reconnects to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PairedDevice {
    pub address: [u8; 6],
    pub name: DeviceName,
}

/// Typed view of everything the bridge persists.
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    pub paired: Option<PairedDevice>,
    pub country: u8,
    pub mic_db: f32,
    pub speaker_db: f32,
    pub backlight_percent: u8,
    pub auto_dim: bool,
}

impl Settings {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            paired: None,
            country: DEFAULT_COUNTRY,
            mic_db: NOMINAL_DB,
            speaker_db: NOMINAL_DB,
            backlight_percent: DEFAULT_BACKLIGHT_PERCENT,
            auto_dim: true,
        }
    }

    /// Reads every setting, substituting defaults for missing or out of
    /// range values.
    pub fn load(store: &impl SettingsStore) -> Self {
        let mut settings = Self::new();
        let paired = matches!(store.get(SettingKey::Paired), Some(SettingValue::Flag(true)));
        if paired && let Some(SettingValue::Address(address)) = store.get(SettingKey::PairedAddress) {
            let name = match store.get(SettingKey::PairedName) {
                Some(SettingValue::Name(name)) => name,
                _ => DeviceName::new(),
            };
            settings.paired = Some(PairedDevice { address, name });
        }
        if let Some(SettingValue::Index(index)) = store.get(SettingKey::Country)
            && usize::from(index) < COUNTRIES.len()
        {
            settings.country = index;
        }
        if let Some(SettingValue::Gain(db)) = store.get(SettingKey::MicGain) {
            settings.mic_db = clamp_db(GainTarget::Mic, db);
        }
        if let Some(SettingValue::Gain(db)) = store.get(SettingKey::SpeakerGain) {
            settings.speaker_db = clamp_db(GainTarget::Speaker, db);
        }
        if let Some(SettingValue::Percent(percent)) = store.get(SettingKey::Backlight) {
            settings.backlight_percent = percent.min(100);
        }
        if let Some(SettingValue::Flag(auto_dim)) = store.get(SettingKey::AutoDim) {
            settings.auto_dim = auto_dim;
        }
        settings
    }

    #[must_use]
    pub const fn gain(&self, target: GainTarget) -> f32 {
        match target {
            GainTarget::Mic => self.mic_db,
            GainTarget::Speaker => self.speaker_db,
        }
    }

    /// Stages every setting and commits once.
    ///
    /// # Errors
    ///
    /// Propagates the store's failure.
    pub fn save(&self, store: &mut impl SettingsStore) -> Result<(), SettingsError> {
        store.set(SettingKey::Paired, SettingValue::Flag(self.paired.is_some()))?;
        if let Some(device) = &self.paired {
            store.set(SettingKey::PairedAddress, SettingValue::Address(device.address))?;
            store.set(SettingKey::PairedName, SettingValue::Name(device.name.clone()))?;
        }
        store.set(SettingKey::Country, SettingValue::Index(self.country))?;
        store.set(SettingKey::MicGain, SettingValue::Gain(self.mic_db))?;
        store.set(SettingKey::SpeakerGain, SettingValue::Gain(self.speaker_db))?;
        store.set(SettingKey::Backlight, SettingValue::Percent(self.backlight_percent))?;
        store.set(SettingKey::AutoDim, SettingValue::Flag(self.auto_dim))?;
        store.commit()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}
