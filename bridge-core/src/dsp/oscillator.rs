//! Direct digital synthesis of sine tones.

use crate::audio::LINE_RATE_HZ;

/// One full sine cycle, full scale.
const SINE: [i16; 256] = [
    0, 804, 1608, 2410, 3212, 4011, 4808, 5602, 6393, 7179, 7962, 8739,
    9512, 10278, 11039, 11793, 12539, 13279, 14010, 14732, 15446, 16151, 16846, 17530,
    18204, 18868, 19519, 20159, 20787, 21403, 22005, 22594, 23170, 23731, 24279, 24811,
    25329, 25832, 26319, 26790, 27245, 27683, 28105, 28510, 28898, 29268, 29621, 29956,
    30273, 30571, 30852, 31113, 31356, 31580, 31785, 31971, 32137, 32285, 32412, 32521,
    32609, 32678, 32728, 32757, 32767, 32757, 32728, 32678, 32609, 32521, 32412, 32285,
    32137, 31971, 31785, 31580, 31356, 31113, 30852, 30571, 30273, 29956, 29621, 29268,
    28898, 28510, 28105, 27683, 27245, 26790, 26319, 25832, 25329, 24811, 24279, 23731,
    23170, 22594, 22005, 21403, 20787, 20159, 19519, 18868, 18204, 17530, 16846, 16151,
    15446, 14732, 14010, 13279, 12539, 11793, 11039, 10278, 9512, 8739, 7962, 7179,
    6393, 5602, 4808, 4011, 3212, 2410, 1608, 804, 0, -804, -1608, -2410,
    -3212, -4011, -4808, -5602, -6393, -7179, -7962, -8739, -9512, -10278, -11039, -11793,
    -12539, -13279, -14010, -14732, -15446, -16151, -16846, -17530, -18204, -18868, -19519, -20159,
    -20787, -21403, -22005, -22594, -23170, -23731, -24279, -24811, -25329, -25832, -26319, -26790,
    -27245, -27683, -28105, -28510, -28898, -29268, -29621, -29956, -30273, -30571, -30852, -31113,
    -31356, -31580, -31785, -31971, -32137, -32285, -32412, -32521, -32609, -32678, -32728, -32757,
    -32767, -32757, -32728, -32678, -32609, -32521, -32412, -32285, -32137, -31971, -31785, -31580,
    -31356, -31113, -30852, -30571, -30273, -29956, -29621, -29268, -28898, -28510, -28105, -27683,
    -27245, -26790, -26319, -25832, -25329, -24811, -24279, -23731, -23170, -22594, -22005, -21403,
    -20787, -20159, -19519, -18868, -18204, -17530, -16846, -16151, -15446, -14732, -14010, -13279,
    -12539, -11793, -11039, -10278, -9512, -8739, -7962, -7179, -6393, -5602, -4808, -4011,
    -3212, -2410, -1608, -804,
];

/// Peak amplitude for levels of 0 to -63 dBm0 (index is the attenuation).
const LEVELS: [u16; 64] = [
    22826, 20344, 18132, 16160, 14402, 12836, 11440, 10196, 9087, 8099, 7218, 6433,
    5734, 5110, 4554, 4059, 3618, 3224, 2874, 2561, 2283, 2034, 1813, 1616,
    1440, 1284, 1144, 1020, 909, 810, 722, 643, 573, 511, 455, 406,
    362, 322, 287, 256, 228, 203, 181, 162, 144, 128, 114, 102,
    91, 81, 72, 64, 57, 51, 46, 41, 36, 32, 29, 26,
    23, 20, 18, 16,
];

/// Peak amplitude of a sine at `level` dBm0, clamped to 0..=-63.
#[must_use]
pub fn amplitude_for_level(level: i8) -> i16 {
    let index = usize::from(level.clamp(-63, 0).unsigned_abs());
    // Every table entry is below i16::MAX.
    LEVELS[index] as i16
}

/// Phase-accumulator sine oscillator.
#[derive(Clone, Debug, Default)]
pub struct Oscillator {
    phase: u32,
    step: u32,
    amplitude: i16,
}

impl Oscillator {
    #[must_use]
    pub fn new(frequency_hz: u16, level: i8) -> Self {
        Self {
            phase: 0,
            step: phase_step(frequency_hz),
            amplitude: amplitude_for_level(level),
        }
    }

    /// Retunes without resetting phase, keeping the waveform continuous.
    pub fn set_frequency(&mut self, frequency_hz: u16) {
        self.step = phase_step(frequency_hz);
    }

    pub fn next_sample(&mut self) -> i16 {
        let index = (self.phase >> 24) as usize;
        self.phase = self.phase.wrapping_add(self.step);
        let scaled = i32::from(SINE[index]) * i32::from(self.amplitude) / 32_767;
        // |SINE| and amplitude are both <= 32767.
        scaled as i16
    }
}

fn phase_step(frequency_hz: u16) -> u32 {
    // Frequencies stay below the line rate, so the step fits in 32 bits.
    ((u64::from(frequency_hz) << 32) / u64::from(LINE_RATE_HZ)) as u32
}

/// Sum of up to four oscillators; zero frequencies are skipped.
#[derive(Clone, Debug, Default)]
pub struct ToneBank {
    oscillators: heapless::Vec<Oscillator, 4>,
}

impl ToneBank {
    #[must_use]
    pub fn new(frequencies: &[u16], level: i8) -> Self {
        let mut oscillators = heapless::Vec::new();
        for &frequency in frequencies.iter().filter(|&&f| f != 0).take(4) {
            // take(4) keeps this within capacity.
            let _ = oscillators.push(Oscillator::new(frequency, level));
        }
        Self { oscillators }
    }

    /// A bank that only produces silence.
    #[must_use]
    pub fn silent() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_silent(&self) -> bool {
        self.oscillators.is_empty()
    }

    pub fn next_sample(&mut self) -> i16 {
        let sum: i32 = self
            .oscillators
            .iter_mut()
            .map(|osc| i32::from(osc.next_sample()))
            .sum();
        sum.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
    }

    pub fn fill(&mut self, out: &mut [i16]) {
        for sample in out {
            *sample = self.next_sample();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_table_follows_dbm0_scale() {
        assert_eq!(amplitude_for_level(-10), 7_218);
        assert_eq!(amplitude_for_level(-13), 5_110);
        assert_eq!(amplitude_for_level(5), amplitude_for_level(0));
        assert_eq!(amplitude_for_level(-90), amplitude_for_level(-63));
    }

    #[test]
    fn oscillator_completes_cycles_at_requested_rate() {
        let mut osc = Oscillator::new(1_000, 0);
        let mut crossings = 0;
        let mut previous = osc.next_sample();
        for _ in 0..LINE_RATE_HZ {
            let sample = osc.next_sample();
            if previous < 0 && sample >= 0 {
                crossings += 1;
            }
            previous = sample;
        }
        assert!((999..=1_001).contains(&crossings), "crossings {crossings}");
    }

    #[test]
    fn bank_skips_zero_frequencies() {
        let bank = ToneBank::new(&[350, 0, 440, 0], -13);
        assert!(!bank.is_silent());
        assert!(ToneBank::new(&[0, 0], -13).is_silent());
        let mut silent = ToneBank::silent();
        assert_eq!(silent.next_sample(), 0);
    }
}
