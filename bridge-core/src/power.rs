//! Power supervisor link and the process-wide fatal error latch.

use core::fmt;

use embassy_sync::blocking_mutex::raw::RawMutex;
use portable_atomic::{AtomicU8, Ordering};

use crate::bus::Bus;
use crate::events::{CellEvent, DisplayEvent};

const STATUS_REASON_MASK: u8 = 0x07;
const STATUS_BUTTON: u8 = 0x10;
const STATUS_CRITICAL_BATTERY: u8 = 0x80;
const STATUS_RESERVED: u8 = !(STATUS_REASON_MASK | STATUS_BUTTON | STATUS_CRITICAL_BATTERY);

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PowerOnReason {
    Button,
    Alarm,
    Charger,
}

/// Decoded supervisor status register.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PowerStatus {
    pub reason: PowerOnReason,
    pub button_pressed: bool,
    pub critical_battery: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PowerStatusError {
    /// A reserved bit was set.
    ReservedBits(u8),
    /// Not exactly one power-on reason bit was set.
    Reason(u8),
}

impl fmt::Display for PowerStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReservedBits(raw) => write!(f, "status {raw:#04x} has reserved bits set"),
            Self::Reason(raw) => write!(f, "status {raw:#04x} has no single power-on reason"),
        }
    }
}

impl PowerStatus {
    /// Decodes a status byte, rejecting reads that cannot be genuine.
    ///
    /// # Errors
    ///
    /// Returns [`PowerStatusError`] for a corrupted read; the caller skips
    /// this cycle.
    pub const fn validate(raw: u8) -> Result<Self, PowerStatusError> {
        if raw & STATUS_RESERVED != 0 {
            return Err(PowerStatusError::ReservedBits(raw));
        }
        let reason = match raw & STATUS_REASON_MASK {
            0x01 => PowerOnReason::Button,
            0x02 => PowerOnReason::Alarm,
            0x04 => PowerOnReason::Charger,
            _ => return Err(PowerStatusError::Reason(raw)),
        };
        Ok(Self {
            reason,
            button_pressed: raw & STATUS_BUTTON != 0,
            critical_battery: raw & STATUS_CRITICAL_BATTERY != 0,
        })
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum FatalCause {
    AudioInit = 1,
    RadioInit = 2,
    PowerInit = 3,
    Storage = 4,
}

impl FatalCause {
    const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(Self::AudioInit),
            2 => Some(Self::RadioInit),
            3 => Some(Self::PowerInit),
            4 => Some(Self::Storage),
            _ => None,
        }
    }
}

impl fmt::Display for FatalCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AudioInit => "audio codec init failed",
            Self::RadioInit => "bluetooth radio init failed",
            Self::PowerInit => "power monitoring init failed",
            Self::Storage => "settings storage failed",
        })
    }
}

/// Latches the first fatal failure. Normal operation stops once latched;
/// only a power-off request is still honored.
pub struct FatalLatch {
    cause: AtomicU8,
}

impl FatalLatch {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cause: AtomicU8::new(0),
        }
    }

    /// Records `cause` and tells the display. Returns `false` if an earlier
    /// failure already holds the latch.
    pub fn latch<M: RawMutex>(&self, cause: FatalCause, bus: &Bus<M>) -> bool {
        let first = self
            .cause
            .compare_exchange(0, cause as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if first {
            bus.display.raise(DisplayEvent::FatalError);
        }
        first
    }

    #[must_use]
    pub fn is_latched(&self) -> bool {
        self.cause.load(Ordering::Acquire) != 0
    }

    #[must_use]
    pub fn cause(&self) -> Option<FatalCause> {
        FatalCause::from_raw(self.cause.load(Ordering::Acquire))
    }
}

impl Default for FatalLatch {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PowerAction {
    Stay,
    /// Cut power; `wake_on_charge` re-arms wake-up when charging starts.
    PowerOff { wake_on_charge: bool },
}

/// Decides when the bridge powers itself off.
#[derive(Copy, Clone, Debug, Default)]
pub struct PowerSupervisor;

impl PowerSupervisor {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Evaluates one status read.
    ///
    /// `status` is the raw register value when the read succeeded. A power-off
    /// is announced to the cellular side first so the handset sees a clean
    /// disconnect.
    ///
    /// # Errors
    ///
    /// Reports a corrupted status read. No action is taken on it, although a
    /// pending power-off request is still returned through the action.
    pub fn poll<M: RawMutex>(
        &self,
        status: Option<u8>,
        power_off_requested: bool,
        fatal: &FatalLatch,
        bus: &Bus<M>,
    ) -> (PowerAction, Result<(), PowerStatusError>) {
        let decoded = status.map(PowerStatus::validate).transpose();
        let (decoded, check) = match decoded {
            Ok(decoded) => (decoded, Ok(())),
            Err(err) => (None, Err(err)),
        };

        let action = if power_off_requested {
            PowerAction::PowerOff {
                wake_on_charge: false,
            }
        } else if fatal.is_latched() {
            PowerAction::Stay
        } else {
            match decoded {
                Some(PowerStatus {
                    button_pressed: true,
                    ..
                }) => PowerAction::PowerOff {
                    wake_on_charge: false,
                },
                Some(PowerStatus {
                    critical_battery: true,
                    ..
                }) => PowerAction::PowerOff {
                    wake_on_charge: true,
                },
                _ => PowerAction::Stay,
            }
        };

        if action != PowerAction::Stay {
            bus.cell.raise(CellEvent::PowerDown);
        }
        (action, check)
    }
}

#[cfg(test)]
mod tests {
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

    use super::*;

    type TestBus = Bus<CriticalSectionRawMutex>;

    #[test]
    fn validate_accepts_one_reason_with_flags() {
        let status = PowerStatus::validate(0x91).expect("valid");
        assert_eq!(status.reason, PowerOnReason::Button);
        assert!(status.button_pressed);
        assert!(status.critical_battery);
    }

    #[test]
    fn validate_rejects_glitched_reads() {
        assert_eq!(PowerStatus::validate(0x21), Err(PowerStatusError::ReservedBits(0x21)));
        assert_eq!(PowerStatus::validate(0x03), Err(PowerStatusError::Reason(0x03)));
        assert_eq!(PowerStatus::validate(0x10), Err(PowerStatusError::Reason(0x10)));
    }

    #[test]
    fn glitched_read_is_ignored() {
        let bus = TestBus::new();
        let supervisor = PowerSupervisor::new();
        // Button and critical bits look set, but so does a reserved bit.
        let (action, check) = supervisor.poll(Some(0xF1), false, &FatalLatch::new(), &bus);
        assert_eq!(action, PowerAction::Stay);
        assert!(check.is_err());
        assert!(bus.cell.take().is_empty());
    }

    #[test]
    fn critical_battery_powers_off_and_wakes_on_charge() {
        let bus = TestBus::new();
        let (action, _) = PowerSupervisor::new().poll(Some(0x84), false, &FatalLatch::new(), &bus);
        assert_eq!(action, PowerAction::PowerOff { wake_on_charge: true });
        assert!(bus.cell.take().contains(CellEvent::PowerDown));
    }

    #[test]
    fn fatal_latch_still_honors_power_off_request() {
        let bus = TestBus::new();
        let fatal = FatalLatch::new();
        assert!(fatal.latch(FatalCause::AudioInit, &bus));
        assert!(!fatal.latch(FatalCause::Storage, &bus));
        assert_eq!(fatal.cause(), Some(FatalCause::AudioInit));
        assert!(bus.display.take().contains(DisplayEvent::FatalError));

        let supervisor = PowerSupervisor::new();
        let (action, _) = supervisor.poll(Some(0x11), false, &fatal, &bus);
        assert_eq!(action, PowerAction::Stay);
        let (action, _) = supervisor.poll(None, true, &fatal, &bus);
        assert_eq!(action, PowerAction::PowerOff { wake_on_charge: false });
    }
}
