use heapless::Vec;

use super::{Oscillator, SampleSource};
use crate::audio::LINE_RATE_HZ;

const BAUD: u32 = 1_200;
const TAIL_MARK_BITS: u16 = 4;
/// Longest caller-ID frame the modulator accepts.
pub const MAX_FSK_BYTES: usize = 80;

/// Frequency plan for caller-ID FSK.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FskModem {
    /// 1200 Hz mark, 2200 Hz space.
    Bell202,
    /// 1300 Hz mark, 2100 Hz space.
    V23,
}

impl FskModem {
    #[must_use]
    pub const fn mark_hz(self) -> u16 {
        match self {
            Self::Bell202 => 1_200,
            Self::V23 => 1_300,
        }
    }

    #[must_use]
    pub const fn space_hz(self) -> u16 {
        match self {
            Self::Bell202 => 2_200,
            Self::V23 => 2_100,
        }
    }
}

/// Modem plus the preamble a standard requires.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FskProfile {
    pub modem: FskModem,
    /// Alternating 0/1 channel-seizure bits.
    pub seizure_bits: u16,
    /// Continuous mark bits before the first byte.
    pub mark_bits: u16,
    pub level: i8,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Stage {
    Seizure(u16),
    Mark(u16),
    /// Byte index and bit position 0..=9 (start, eight data bits, stop).
    Data(usize, u8),
    Tail(u16),
    Done,
}

/// Phase-continuous 1200 baud FSK transmitter for 8N1 framed bytes.
#[derive(Clone, Debug)]
pub struct FskModulator {
    profile: FskProfile,
    bytes: Vec<u8, MAX_FSK_BYTES>,
    stage: Stage,
    oscillator: Oscillator,
    bit_clock: u32,
    bit_sent: u32,
}

impl FskModulator {
    /// Prepares a transmission. Bytes beyond [`MAX_FSK_BYTES`] are dropped.
    #[must_use]
    pub fn new(profile: FskProfile, bytes: &[u8]) -> Self {
        let mut frame = Vec::new();
        let _ = frame.extend_from_slice(&bytes[..bytes.len().min(MAX_FSK_BYTES)]);
        let stage = first_stage(&profile);
        Self {
            oscillator: Oscillator::new(profile.modem.mark_hz(), profile.level),
            profile,
            bytes: frame,
            stage,
            bit_clock: 0,
            bit_sent: 0,
        }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.stage == Stage::Done
    }

    /// Total bits this transmission sends, preamble included.
    #[must_use]
    pub fn bit_count(&self) -> u32 {
        u32::from(self.profile.seizure_bits)
            + u32::from(self.profile.mark_bits)
            + self.bytes.len() as u32 * 10
            + u32::from(TAIL_MARK_BITS)
    }

    fn current_bit(&self) -> Option<bool> {
        match self.stage {
            Stage::Seizure(left) => Some((self.profile.seizure_bits - left) % 2 == 1),
            Stage::Mark(_) | Stage::Tail(_) => Some(true),
            Stage::Data(index, bit) => Some(match bit {
                0 => false,
                9 => true,
                n => (self.bytes[index] >> (n - 1)) & 1 == 1,
            }),
            Stage::Done => None,
        }
    }

    fn advance(&mut self) {
        self.bit_sent += 1;
        self.stage = match self.stage {
            Stage::Seizure(left) if left > 1 => Stage::Seizure(left - 1),
            Stage::Seizure(_) => mark_or_data(self.profile.mark_bits, &self.bytes),
            Stage::Mark(left) if left > 1 => Stage::Mark(left - 1),
            Stage::Mark(_) => data_or_tail(&self.bytes, 0),
            Stage::Data(index, bit) if bit < 9 => Stage::Data(index, bit + 1),
            Stage::Data(index, _) => data_or_tail(&self.bytes, index + 1),
            Stage::Tail(left) if left > 1 => Stage::Tail(left - 1),
            Stage::Tail(_) | Stage::Done => Stage::Done,
        };
    }
}

fn first_stage(profile: &FskProfile) -> Stage {
    if profile.seizure_bits > 0 {
        Stage::Seizure(profile.seizure_bits)
    } else {
        Stage::Mark(profile.mark_bits.max(1))
    }
}

fn mark_or_data(mark_bits: u16, bytes: &[u8]) -> Stage {
    if mark_bits > 0 {
        Stage::Mark(mark_bits)
    } else {
        data_or_tail(bytes, 0)
    }
}

fn data_or_tail(bytes: &[u8], index: usize) -> Stage {
    if index < bytes.len() {
        Stage::Data(index, 0)
    } else {
        Stage::Tail(TAIL_MARK_BITS)
    }
}

impl SampleSource for FskModulator {
    fn fill(&mut self, out: &mut [i16]) -> usize {
        let mut produced = 0;
        for slot in out.iter_mut() {
            let Some(bit) = self.current_bit() else {
                break;
            };
            let frequency = if bit {
                self.profile.modem.mark_hz()
            } else {
                self.profile.modem.space_hz()
            };
            self.oscillator.set_frequency(frequency);
            *slot = self.oscillator.next_sample();
            produced += 1;

            self.bit_clock += BAUD;
            if self.bit_clock >= LINE_RATE_HZ {
                self.bit_clock -= LINE_RATE_HZ;
                self.advance();
            }
        }
        produced
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROFILE: FskProfile = FskProfile {
        modem: FskModem::Bell202,
        seizure_bits: 30,
        mark_bits: 15,
        level: -13,
    };

    #[test]
    fn duration_matches_bit_count() {
        let mut modulator = FskModulator::new(PROFILE, &[0x80, 0x01, 0x55]);
        assert_eq!(modulator.bit_count(), 30 + 15 + 30 + 4);
        let mut out = [0i16; 1_000];
        let mut total = 0;
        loop {
            let produced = modulator.fill(&mut out);
            if produced == 0 {
                break;
            }
            total += produced;
        }
        let expected = modulator.bit_count() * LINE_RATE_HZ / BAUD;
        assert!(total.abs_diff(expected as usize) <= 1, "total {total}");
        assert!(modulator.is_finished());
    }

    #[test]
    fn bits_follow_8n1_framing_lsb_first() {
        let mut modulator = FskModulator::new(
            FskProfile {
                seizure_bits: 0,
                mark_bits: 1,
                ..PROFILE
            },
            &[0b0000_0110],
        );
        let mut bits = heapless::Vec::<bool, 16>::new();
        while let Some(bit) = modulator.current_bit() {
            let _ = bits.push(bit);
            modulator.advance();
        }
        assert_eq!(
            bits.as_slice(),
            &[
                true, false, false, true, true, false, false, false, false, false, true, true,
                true, true, true,
            ]
        );
    }

    #[test]
    fn seizure_alternates_starting_with_space() {
        let modulator = FskModulator::new(PROFILE, &[]);
        assert_eq!(modulator.current_bit(), Some(false));
    }
}
