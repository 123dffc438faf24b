//! Rotary pulse decoding with DTMF as the alternative digit source.

use super::hook::HookState;
use crate::country::CountryProfile;
use crate::dial_buffer::{DialedDigit, DigitSource};
use crate::ticks::Elapsed;

const MAX_PULSES: u8 = 10;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DialState {
    Idle,
    /// Loop open; either a pulse or the start of a hang-up.
    Break,
    /// Loop closed after at least one pulse.
    Make,
}

#[derive(Clone, Debug)]
pub struct DialDecoder {
    state: DialState,
    pulses: u8,
    elapsed: Elapsed,
    break_ticks: u32,
    make_ticks: u32,
    pending_dtmf: Option<char>,
}

impl DialDecoder {
    #[must_use]
    pub const fn new(break_ticks: u32, make_ticks: u32) -> Self {
        Self {
            state: DialState::Idle,
            pulses: 0,
            elapsed: Elapsed::new(),
            break_ticks,
            make_ticks,
            pending_dtmf: None,
        }
    }

    #[must_use]
    pub const fn state(&self) -> DialState {
        self.state
    }

    /// Holds a detected DTMF key until the decoder is idle.
    pub fn offer_dtmf(&mut self, digit: char) {
        self.pending_dtmf = Some(digit);
    }

    pub fn clear_dtmf(&mut self) {
        self.pending_dtmf = None;
    }

    /// Advances one tick; returns a digit when one is complete.
    pub fn update(
        &mut self,
        hook: HookState,
        change: Option<bool>,
        profile: &CountryProfile,
    ) -> Option<DialedDigit> {
        match self.state {
            DialState::Idle => {
                if hook == HookState::OnHook {
                    return None;
                }
                if change == Some(false) {
                    self.state = DialState::Break;
                    self.pulses = 0;
                    self.elapsed.reset();
                } else if let Some(digit) = self.pending_dtmf.take() {
                    return Some(DialedDigit::new(digit, DigitSource::Dtmf));
                }
            }
            DialState::Break => {
                if self.elapsed.tick() > self.break_ticks {
                    // Too long for a pulse; the hook machine decides if it is a hang-up.
                    self.state = DialState::Idle;
                } else if change == Some(true) {
                    self.pulses = (self.pulses + 1).min(MAX_PULSES);
                    self.state = DialState::Make;
                    self.elapsed.reset();
                }
            }
            DialState::Make => {
                if self.elapsed.tick() > self.make_ticks {
                    self.state = DialState::Idle;
                    return profile
                        .rotary_digit(self.pulses)
                        .map(|digit| DialedDigit::new(digit, DigitSource::Rotary));
                } else if change == Some(false) {
                    self.state = DialState::Break;
                    self.elapsed.reset();
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::country::COUNTRIES;

    const BREAK: u32 = 10;
    const MAKE: u32 = 10;

    fn europe() -> &'static CountryProfile {
        &COUNTRIES[1]
    }

    fn pulse(decoder: &mut DialDecoder, count: u8, profile: &CountryProfile) {
        for _ in 0..count {
            assert_eq!(
                decoder.update(HookState::OnHookProvisional, Some(false), profile),
                None
            );
            for _ in 0..5 {
                assert_eq!(decoder.update(HookState::OnHookProvisional, None, profile), None);
            }
            assert_eq!(decoder.update(HookState::OffHook, Some(true), profile), None);
            for _ in 0..3 {
                assert_eq!(decoder.update(HookState::OffHook, None, profile), None);
            }
        }
    }

    fn settle(decoder: &mut DialDecoder, profile: &CountryProfile) -> Option<DialedDigit> {
        (0..=MAKE + 1).find_map(|_| decoder.update(HookState::OffHook, None, profile))
    }

    #[test]
    fn pulse_count_maps_through_country() {
        let profile = europe();
        for count in 1..=10u8 {
            let mut decoder = DialDecoder::new(BREAK, MAKE);
            pulse(&mut decoder, count, profile);
            let digit = settle(&mut decoder, profile).expect("digit");
            assert_eq!(digit.digit, profile.rotary_map[usize::from(count) - 1]);
            assert_eq!(digit.source, DigitSource::Rotary);
        }
    }

    #[test]
    fn long_break_produces_no_digit() {
        let profile = europe();
        let mut decoder = DialDecoder::new(BREAK, MAKE);
        decoder.update(HookState::OnHookProvisional, Some(false), profile);
        for _ in 0..=BREAK {
            decoder.update(HookState::OnHookProvisional, None, profile);
        }
        assert_eq!(decoder.state(), DialState::Idle);
        assert_eq!(decoder.update(HookState::OffHook, Some(true), profile), None);
        assert_eq!(settle(&mut decoder, profile), None);
    }

    #[test]
    fn dtmf_waits_for_idle_and_reports_once() {
        let profile = europe();
        let mut decoder = DialDecoder::new(BREAK, MAKE);
        decoder.offer_dtmf('7');
        let digit = decoder.update(HookState::OffHook, None, profile).expect("digit");
        assert_eq!(digit, DialedDigit::new('7', DigitSource::Dtmf));
        assert_eq!(decoder.update(HookState::OffHook, None, profile), None);
    }

    #[test]
    fn on_hook_line_ignores_dtmf() {
        let profile = europe();
        let mut decoder = DialDecoder::new(BREAK, MAKE);
        decoder.offer_dtmf('1');
        assert_eq!(decoder.update(HookState::OnHook, None, profile), None);
    }
}
