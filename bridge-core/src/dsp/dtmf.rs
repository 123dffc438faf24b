//! DTMF generation and Goertzel detection.

use heapless::Deque;

use super::{DetectedDigits, DtmfDetector, SampleSource, ToneBank};

/// Settle time after a locally generated DTMF burst.
pub const DTMF_FLUSH_MS: u32 = 30;

const ROWS: [u16; 4] = [697, 770, 852, 941];
const COLUMNS: [u16; 4] = [1209, 1336, 1477, 1633];
const KEYPAD: [[char; 4]; 4] = [
    ['1', '2', '3', 'A'],
    ['4', '5', '6', 'B'],
    ['7', '8', '9', 'C'],
    ['*', '0', '#', 'D'],
];

/// Row and column frequency for a keypad character.
#[must_use]
pub fn dtmf_frequencies(key: char) -> Option<(u16, u16)> {
    KEYPAD.iter().enumerate().find_map(|(row, keys)| {
        keys.iter()
            .position(|&k| k == key)
            .map(|column| (ROWS[row], COLUMNS[column]))
    })
}

/// Burst timing for generated digits.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DtmfTiming {
    pub on_ms: u16,
    pub off_ms: u16,
    pub level: i8,
}

impl DtmfTiming {
    /// Single digit dialed from the keypad.
    pub const KEYPAD: Self = Self {
        on_ms: 100,
        off_ms: 0,
        level: -10,
    };
    /// Digit strings such as DTMF caller ID.
    pub const STRING: Self = Self {
        on_ms: 70,
        off_ms: 70,
        level: -10,
    };
}

/// Sends queued digits as tone bursts, then reports completion.
#[derive(Clone, Debug)]
pub struct DtmfSender {
    timing: DtmfTiming,
    queue: Deque<char, 32>,
    bank: ToneBank,
    on_left: u32,
    off_left: u32,
}

impl DtmfSender {
    #[must_use]
    pub fn new(timing: DtmfTiming) -> Self {
        Self {
            timing,
            queue: Deque::new(),
            bank: ToneBank::silent(),
            on_left: 0,
            off_left: 0,
        }
    }

    /// Queues a digit. Returns `false` for non-DTMF characters or a full queue.
    pub fn push(&mut self, key: char) -> bool {
        dtmf_frequencies(key).is_some() && self.queue.push_back(key).is_ok()
    }

    /// Drops queued and in-progress digits.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.on_left = 0;
        self.off_left = 0;
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.on_left == 0 && self.off_left == 0
    }

    fn start_next(&mut self) -> bool {
        let Some(key) = self.queue.pop_front() else {
            return false;
        };
        let Some((row, column)) = dtmf_frequencies(key) else {
            return false;
        };
        self.bank = ToneBank::new(&[row, column], self.timing.level);
        self.on_left = u32::from(self.timing.on_ms) * 8;
        self.off_left = u32::from(self.timing.off_ms) * 8;
        true
    }
}

impl SampleSource for DtmfSender {
    fn fill(&mut self, out: &mut [i16]) -> usize {
        let mut produced = 0;
        for slot in out.iter_mut() {
            if self.on_left == 0 && self.off_left == 0 && !self.start_next() {
                break;
            }
            if self.on_left > 0 {
                self.on_left -= 1;
                *slot = self.bank.next_sample();
            } else {
                self.off_left -= 1;
                *slot = 0;
            }
            produced += 1;
        }
        produced
    }
}

const BLOCK: usize = 102;
const BLOCK_LEN: f32 = 102.0;
/// 2·cos(2π·f/8000) for the row then column frequencies.
const COEFFICIENTS: [f32; 8] = [
    1.707_738, 1.645_281, 1.568_687, 1.478_205, 1.164_104, 0.996_370, 0.798_618, 0.568_533,
];
/// Minimum tone power (mean square) for a valid row or column.
const MIN_TONE_POWER: f32 = 100_000.0;
/// Column may exceed row by 8 dB, row may exceed column by 4 dB.
const NORMAL_TWIST: f32 = 6.3;
const REVERSE_TWIST: f32 = 2.5;
/// Share of the block energy the two tones must account for.
const MIN_TONE_SHARE: f32 = 0.6;

/// Block-based Goertzel receiver reporting each key press once.
#[derive(Clone, Debug)]
pub struct GoertzelDetector {
    block: [i16; BLOCK],
    filled: usize,
    last_hit: Option<char>,
    reported: Option<char>,
}

impl GoertzelDetector {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            block: [0; BLOCK],
            filled: 0,
            last_hit: None,
            reported: None,
        }
    }

    fn classify(&self) -> Option<char> {
        let mut powers = [0f32; 8];
        for (power, &coefficient) in powers.iter_mut().zip(COEFFICIENTS.iter()) {
            let (mut s1, mut s2) = (0f32, 0f32);
            for &sample in &self.block {
                let s0 = f32::from(sample) + coefficient * s1 - s2;
                s2 = s1;
                s1 = s0;
            }
            let magnitude = s1 * s1 + s2 * s2 - coefficient * s1 * s2;
            // Mean-square power of a sine producing this magnitude.
            *power = magnitude * 2.0 / (BLOCK_LEN * BLOCK_LEN);
        }
        let total: f32 = self
            .block
            .iter()
            .map(|&s| f32::from(s) * f32::from(s))
            .sum::<f32>()
            / BLOCK_LEN;

        let (row, row_power) = strongest(&powers[..4]);
        let (column, column_power) = strongest(&powers[4..]);
        if row_power < MIN_TONE_POWER || column_power < MIN_TONE_POWER {
            return None;
        }
        if column_power > row_power * NORMAL_TWIST || row_power > column_power * REVERSE_TWIST {
            return None;
        }
        if row_power + column_power < total * MIN_TONE_SHARE {
            return None;
        }
        Some(KEYPAD[row][column])
    }

    fn finish_block(&mut self, digits: &mut DetectedDigits) {
        let hit = self.classify();
        if hit.is_some() && hit == self.last_hit && hit != self.reported {
            if let Some(digit) = hit {
                digits.record(digit);
            }
            self.reported = hit;
        }
        if hit.is_none() {
            self.reported = None;
        }
        self.last_hit = hit;
        self.filled = 0;
    }
}

fn strongest(powers: &[f32]) -> (usize, f32) {
    powers
        .iter()
        .copied()
        .enumerate()
        .fold((0, 0.0), |best, (index, power)| {
            if power > best.1 { (index, power) } else { best }
        })
}

impl Default for GoertzelDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl DtmfDetector for GoertzelDetector {
    fn feed(&mut self, samples: &[i16], digits: &mut DetectedDigits) {
        for &sample in samples {
            self.block[self.filled] = sample;
            self.filled += 1;
            if self.filled == BLOCK {
                self.finish_block(digits);
            }
        }
    }

    fn reset(&mut self) {
        self.filled = 0;
        self.last_hit = None;
        self.reported = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(detector: &mut GoertzelDetector, audio: &[i16]) -> DetectedDigits {
        let mut digits = DetectedDigits::new();
        for chunk in audio.chunks(80) {
            detector.feed(chunk, &mut digits);
        }
        digits
    }

    fn burst(key: char) -> [i16; 960] {
        let mut sender = DtmfSender::new(DtmfTiming::KEYPAD);
        assert!(sender.push(key));
        let mut audio = [0i16; 960];
        assert_eq!(sender.fill(&mut audio), 800);
        audio
    }

    #[test]
    fn keypad_lookup_covers_extended_digits() {
        assert_eq!(dtmf_frequencies('5'), Some((770, 1336)));
        assert_eq!(dtmf_frequencies('D'), Some((941, 1633)));
        assert_eq!(dtmf_frequencies('x'), None);
    }

    #[test]
    fn sender_stops_after_queued_digits() {
        let mut sender = DtmfSender::new(DtmfTiming::STRING);
        sender.push('1');
        sender.push('2');
        let mut out = [0i16; 4_000];
        assert_eq!(sender.fill(&mut out), 2 * 140 * 8);
        assert!(sender.is_idle());
        assert!(!sender.push('z'));
    }

    #[test]
    fn detects_each_generated_digit_once() {
        let mut detector = GoertzelDetector::new();
        for key in ['1', '5', '9', '0', '#', 'A'] {
            let digits = detect(&mut detector, &burst(key));
            assert_eq!(digits.as_slice(), &[key], "digit {key}");
        }
    }

    #[test]
    fn repeated_key_needs_a_gap() {
        let mut detector = GoertzelDetector::new();
        let audio = burst('7');
        assert_eq!(detect(&mut detector, &audio[..800]).len(), 1);
        assert_eq!(detect(&mut detector, &audio[..800]).len(), 0, "no gap yet");
        assert_eq!(detect(&mut detector, &[0; 400]).len(), 0);
        assert_eq!(detect(&mut detector, &audio[..800]).len(), 1);
    }

    #[test]
    fn keys_beyond_the_sink_are_counted() {
        let mut detector = GoertzelDetector::new();
        let mut digits = DetectedDigits::new();
        for key in ['1', '2', '3', '4', '5', '6'] {
            for chunk in burst(key).chunks(80) {
                detector.feed(chunk, &mut digits);
            }
        }
        assert_eq!(digits.as_slice(), &['1', '2', '3', '4']);
        assert_eq!(digits.dropped(), 2);
    }

    #[test]
    fn ignores_single_tone() {
        let mut detector = GoertzelDetector::new();
        let mut bank = ToneBank::new(&[941], -10);
        let mut audio = [0i16; 960];
        bank.fill(&mut audio);
        assert!(detect(&mut detector, &audio).is_empty());
    }
}
