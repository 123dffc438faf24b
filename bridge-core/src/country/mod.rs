//! Per-country telephony profiles.
//!
//! Profiles are immutable. The active profile is selected by an index kept
//! in settings; out-of-range indices fall back to [`DEFAULT_COUNTRY`].

mod samples;

use crate::callerid::{CallerIdFlags, CallerIdSpec, CallerIdStandard};

/// Index of the profile used when the stored index is invalid.
pub const DEFAULT_COUNTRY: u8 = 1;
/// Segments a tone descriptor can hold.
pub const MAX_TONE_SEGMENTS: usize = 4;
/// Ring cadence pairs a profile can hold.
pub const MAX_RING_PAIRS: usize = 2;

/// One cadence step of a synthesized tone.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ToneSegment {
    /// Up to four frequencies in Hz; zero entries are unused.
    pub frequencies: [u16; 4],
    /// Level of each frequency in dBm0.
    pub level: i8,
    /// Sounding time; zero sounds forever.
    pub on_ms: u16,
    pub off_ms: u16,
}

impl ToneSegment {
    const SILENT: Self = Self {
        frequencies: [0; 4],
        level: 0,
        on_ms: 0,
        off_ms: 0,
    };

    #[must_use]
    pub const fn is_continuous(&self) -> bool {
        self.on_ms == 0
    }
}

/// Fixed-capacity list of tone segments.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ToneDescriptor {
    segments: [ToneSegment; MAX_TONE_SEGMENTS],
    len: u8,
    repeats: bool,
}

impl ToneDescriptor {
    /// A steady tone.
    #[must_use]
    pub const fn continuous(frequencies: [u16; 4], level: i8) -> Self {
        let mut segments = [ToneSegment::SILENT; MAX_TONE_SEGMENTS];
        segments[0] = ToneSegment {
            frequencies,
            level,
            on_ms: 0,
            off_ms: 0,
        };
        Self {
            segments,
            len: 1,
            repeats: true,
        }
    }

    /// A tone switched on and off following `cadence` (on, off) pairs.
    /// Pairs beyond [`MAX_TONE_SEGMENTS`] are ignored.
    #[must_use]
    pub const fn cadenced(frequencies: [u16; 4], level: i8, cadence: &[(u16, u16)]) -> Self {
        let mut segments = [ToneSegment::SILENT; MAX_TONE_SEGMENTS];
        let mut len = 0;
        while len < cadence.len() && len < MAX_TONE_SEGMENTS {
            let (on_ms, off_ms) = cadence[len];
            segments[len] = ToneSegment {
                frequencies,
                level,
                on_ms,
                off_ms,
            };
            len += 1;
        }
        Self {
            segments,
            len: len as u8,
            repeats: true,
        }
    }

    /// Plays the segments once instead of looping back to the first.
    #[must_use]
    pub const fn once(mut self) -> Self {
        self.repeats = false;
        self
    }

    #[must_use]
    pub fn segments(&self) -> &[ToneSegment] {
        &self.segments[..usize::from(self.len)]
    }

    #[must_use]
    pub const fn repeats(&self) -> bool {
        self.repeats
    }
}

/// Either a synthesized cadence or a looped recording.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ToneSource {
    Synth(ToneDescriptor),
    Sampled(&'static [i16]),
}

/// The three call-progress tones of a country.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ToneSet {
    pub dial: ToneSource,
    /// Reorder, also used while there is no service.
    pub reorder: ToneSource,
    /// Receiver-off-hook alarm.
    pub off_hook: ToneSource,
}

/// Ring signal: reversal frequency and (on, off) cadence.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RingCadence {
    pub frequency_hz: u8,
    pairs: [(u16, u16); MAX_RING_PAIRS],
    len: u8,
}

impl RingCadence {
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn new(frequency_hz: u8, cadence: &[(u16, u16)]) -> Self {
        let mut pairs = [(0, 0); MAX_RING_PAIRS];
        let mut len = 0;
        while len < cadence.len() && len < MAX_RING_PAIRS {
            pairs[len] = cadence[len];
            len += 1;
        }
        Self {
            frequency_hz,
            pairs,
            len: len as u8,
        }
    }

    #[must_use]
    pub fn pairs(&self) -> &[(u16, u16)] {
        &self.pairs[..usize::from(self.len)]
    }

    /// Duration of cadence step `step`; even steps ring, odd steps are silent.
    #[must_use]
    pub fn step_ms(&self, step: usize) -> u16 {
        self.pairs()
            .get(step / 2)
            .map_or(0, |&(on, off)| if step % 2 == 0 { on } else { off })
    }

    #[must_use]
    pub fn step_count(&self) -> usize {
        self.pairs().len() * 2
    }
}

/// Everything the line side needs to behave like one country's exchange.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CountryProfile {
    pub name: &'static str,
    pub caller_id: CallerIdSpec,
    pub tones: ToneSet,
    pub ring: RingCadence,
    /// Idle off-hook time before the alarm tone; zero disables the alarm.
    pub off_hook_timeout_ms: u32,
    /// Pulse count (1..=10) to digit.
    pub rotary_map: [char; 10],
}

impl CountryProfile {
    /// Looks up a profile, clamping unknown indices to the default.
    /// The second value is `true` when the index had to be replaced.
    #[must_use]
    pub fn lookup(index: u8) -> (&'static Self, bool) {
        match COUNTRIES.get(usize::from(index)) {
            Some(profile) => (profile, false),
            None => (&COUNTRIES[usize::from(DEFAULT_COUNTRY)], true),
        }
    }

    /// Digit for a rotary pulse count, `None` outside 1..=10.
    #[must_use]
    pub fn rotary_digit(&self, pulses: u8) -> Option<char> {
        let index = usize::from(pulses).checked_sub(1)?;
        self.rotary_map.get(index).copied()
    }

    #[must_use]
    pub const fn off_hook_alarm_enabled(&self) -> bool {
        self.off_hook_timeout_ms != 0
    }
}

const STANDARD_ROTARY: [char; 10] = ['1', '2', '3', '4', '5', '6', '7', '8', '9', '0'];
const REVERSED_ROTARY: [char; 10] = ['9', '8', '7', '6', '5', '4', '3', '2', '1', '0'];

const fn tone(frequencies: [u16; 4], level: i8, cadence: &[(u16, u16)]) -> ToneSource {
    ToneSource::Synth(ToneDescriptor::cadenced(frequencies, level, cadence))
}

const fn steady(frequencies: [u16; 4], level: i8) -> ToneSource {
    ToneSource::Synth(ToneDescriptor::continuous(frequencies, level))
}

/// Supported countries, alphabetical.
pub static COUNTRIES: [CountryProfile; 7] = [
    CountryProfile {
        name: "Australia",
        caller_id: CallerIdSpec::new(CallerIdStandard::Bellcore, CallerIdFlags::NONE, 0, 200, 0),
        tones: ToneSet {
            dial: ToneSource::Sampled(&samples::AUSTRALIA_DIAL_TONE),
            reorder: tone([400, 0, 0, 0], -13, &[(375, 375)]),
            off_hook: steady([1500, 0, 0, 0], -10),
        },
        ring: RingCadence::new(25, &[(400, 200), (400, 2000)]),
        off_hook_timeout_ms: 60_000,
        rotary_map: STANDARD_ROTARY,
    },
    CountryProfile {
        name: "Europe",
        caller_id: CallerIdSpec::new(
            CallerIdStandard::Etsi,
            CallerIdFlags::BEFORE_RING.union(CallerIdFlags::DUAL_TONE_ALERT),
            0,
            200,
            0,
        ),
        tones: ToneSet {
            dial: steady([425, 0, 0, 0], -13),
            reorder: tone([425, 0, 0, 0], -13, &[(240, 240)]),
            off_hook: steady([425, 0, 0, 0], -56),
        },
        ring: RingCadence::new(25, &[(1000, 200)]),
        off_hook_timeout_ms: 0,
        rotary_map: STANDARD_ROTARY,
    },
    CountryProfile {
        name: "Germany pre-1979",
        caller_id: CallerIdSpec::DISABLED,
        tones: ToneSet {
            dial: tone([475, 0, 0, 0], -13, &[(200, 300), (700, 800)]),
            reorder: tone([475, 0, 0, 0], -13, &[(240, 240)]),
            off_hook: steady([475, 0, 0, 0], -56),
        },
        ring: RingCadence::new(25, &[(1000, 200)]),
        off_hook_timeout_ms: 0,
        rotary_map: STANDARD_ROTARY,
    },
    CountryProfile {
        name: "India",
        caller_id: CallerIdSpec::new(
            CallerIdStandard::Dtmf1,
            CallerIdFlags::BEFORE_RING.union(CallerIdFlags::LINE_REVERSAL),
            100,
            200,
            0,
        ),
        tones: ToneSet {
            dial: ToneSource::Sampled(&samples::INDIA_DIAL_TONE),
            reorder: tone([400, 0, 0, 0], -13, &[(250, 250)]),
            off_hook: steady([400, 0, 0, 0], -56),
        },
        ring: RingCadence::new(25, &[(400, 200), (400, 2000)]),
        off_hook_timeout_ms: 0,
        rotary_map: STANDARD_ROTARY,
    },
    CountryProfile {
        name: "New Zealand Rev",
        caller_id: CallerIdSpec::new(CallerIdStandard::Bellcore, CallerIdFlags::NONE, 0, 200, 0),
        tones: ToneSet {
            dial: steady([400, 0, 0, 0], -13),
            reorder: tone([400, 0, 0, 0], -13, &[(250, 250)]),
            off_hook: steady([400, 0, 0, 0], -56),
        },
        ring: RingCadence::new(25, &[(400, 200), (400, 200)]),
        off_hook_timeout_ms: 0,
        rotary_map: REVERSED_ROTARY,
    },
    CountryProfile {
        name: "United States",
        caller_id: CallerIdSpec::new(CallerIdStandard::Bellcore, CallerIdFlags::NONE, 0, 200, 0),
        tones: ToneSet {
            dial: steady([350, 440, 0, 0], -13),
            reorder: tone([480, 620, 0, 0], -13, &[(250, 250)]),
            off_hook: tone([1400, 2060, 2450, 2600], -10, &[(100, 100)]),
        },
        ring: RingCadence::new(20, &[(2000, 200)]),
        off_hook_timeout_ms: 60_000,
        rotary_map: STANDARD_ROTARY,
    },
    CountryProfile {
        name: "United Kingdom",
        caller_id: CallerIdSpec::new(
            CallerIdStandard::Sin227,
            CallerIdFlags::BEFORE_RING
                .union(CallerIdFlags::LINE_REVERSAL)
                .union(CallerIdFlags::DUAL_TONE_ALERT),
            100,
            200,
            0,
        ),
        tones: ToneSet {
            dial: steady([350, 450, 0, 0], -13),
            reorder: tone([400, 0, 0, 0], -13, &[(400, 350), (225, 525)]),
            off_hook: tone([1400, 2060, 2450, 2600], -10, &[(100, 100)]),
        },
        ring: RingCadence::new(25, &[(400, 200), (400, 200)]),
        off_hook_timeout_ms: 60_000,
        rotary_map: STANDARD_ROTARY,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_index_clamps_to_default() {
        let (profile, clamped) = CountryProfile::lookup(200);
        assert!(clamped);
        assert_eq!(profile.name, "Europe");

        let (profile, clamped) = CountryProfile::lookup(5);
        assert!(!clamped);
        assert_eq!(profile.name, "United States");
    }

    #[test]
    fn rotary_maps_cover_every_pulse_count() {
        for profile in &COUNTRIES {
            for pulses in 1..=10u8 {
                let digit = profile.rotary_digit(pulses).expect("mapped");
                assert_eq!(digit, profile.rotary_map[usize::from(pulses) - 1]);
            }
            assert_eq!(profile.rotary_digit(0), None);
            assert_eq!(profile.rotary_digit(11), None);
        }
        let (nz, _) = CountryProfile::lookup(4);
        assert_eq!(nz.rotary_digit(1), Some('9'));
        assert_eq!(nz.rotary_digit(10), Some('0'));
    }

    #[test]
    fn ring_steps_alternate_on_and_off() {
        let ring = RingCadence::new(25, &[(400, 200), (400, 2000)]);
        assert_eq!(ring.step_count(), 4);
        assert_eq!(
            [ring.step_ms(0), ring.step_ms(1), ring.step_ms(2), ring.step_ms(3)],
            [400, 200, 400, 2000]
        );
        assert_eq!(ring.step_ms(4), 0);
    }

    #[test]
    fn cadence_capacity_is_bounded() {
        let descriptor = ToneDescriptor::cadenced([1, 0, 0, 0], 0, &[(1, 1); 6]);
        assert_eq!(descriptor.segments().len(), MAX_TONE_SEGMENTS);
        let ring = RingCadence::new(20, &[(1, 1); 3]);
        assert_eq!(ring.pairs().len(), MAX_RING_PAIRS);
    }
}
