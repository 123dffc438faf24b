//! Caller-ID delivery around the ring cadence.
//!
//! The sequencer only decides what happens when; ringing, line polarity and
//! audio are carried out by the caller through [`CidCommand`]s.

use heapless::Vec;

use crate::callerid::{CallerIdFlags, CallerIdSpec};
use crate::ticks::{Countdown, POTS_TICK_MS};

/// Silence inserted before a before-ring message that has no other alert.
pub const MIN_LEAD_IN_MS: u16 = 100;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CidState {
    Idle,
    /// Short ring pulse (RP-AS) in progress.
    AlertRing,
    /// Dual-tone alert (DT-AS) in progress.
    AlertTone,
    PreWait,
    Message,
    PostWait,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CidCommand {
    /// Forward polarity when `true`.
    SetForward(bool),
    AlertRing { duration_ms: u16 },
    PlayAlertTone,
    SendMessage,
    /// Ringing may continue; `ring_now` starts the ring that was held back.
    ReleaseRing { ring_now: bool },
}

pub type CidCommands = Vec<CidCommand, 3>;

#[derive(Clone, Debug)]
pub struct CallerIdSequencer {
    state: CidState,
    spec: CallerIdSpec,
    wait: Countdown,
    reversed: bool,
    ring_held: bool,
}

impl CallerIdSequencer {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: CidState::Idle,
            spec: CallerIdSpec::DISABLED,
            wait: Countdown::expired(),
            reversed: false,
            ring_held: false,
        }
    }

    #[must_use]
    pub const fn state(&self) -> CidState {
        self.state
    }

    #[must_use]
    pub const fn is_idle(&self) -> bool {
        matches!(self.state, CidState::Idle)
    }

    /// Begins delivery ahead of the first ring, which is held until the end.
    pub fn start_before_ring(&mut self, spec: CallerIdSpec) -> CidCommands {
        let mut commands = CidCommands::new();
        self.spec = spec;
        self.ring_held = true;
        let flags = spec.flags;
        if flags.contains(CallerIdFlags::LINE_REVERSAL) {
            self.reversed = true;
            let _ = commands.push(CidCommand::SetForward(false));
        }
        if flags.contains(CallerIdFlags::ALERT_RING) {
            self.state = CidState::AlertRing;
            let _ = commands.push(CidCommand::AlertRing {
                duration_ms: spec.alert_ms,
            });
        } else if flags.contains(CallerIdFlags::DUAL_TONE_ALERT) {
            self.state = CidState::AlertTone;
            let _ = commands.push(CidCommand::PlayAlertTone);
        } else {
            let lead_in = if self.reversed {
                spec.pre_ms
            } else {
                spec.pre_ms.max(MIN_LEAD_IN_MS)
            };
            self.enter_pre_wait(lead_in);
        }
        commands
    }

    /// Begins delivery after the first ring; later rings wait for it.
    pub fn start_after_ring(&mut self, spec: CallerIdSpec) {
        self.spec = spec;
        self.ring_held = false;
        self.enter_pre_wait(spec.pre_ms);
    }

    /// `true` while ring requests must not start a ring.
    #[must_use]
    pub const fn blocks_ringing(&self) -> bool {
        !self.is_idle()
    }

    /// The alert ring pulse has ended.
    pub fn alert_ring_done(&mut self) {
        if self.state == CidState::AlertRing {
            self.enter_pre_wait(self.spec.pre_ms);
        }
    }

    /// The alert tone or message audio (including its flush) has ended,
    /// or the message could not be built.
    pub fn audio_done(&mut self) {
        match self.state {
            CidState::AlertTone => self.enter_pre_wait(self.spec.pre_ms),
            CidState::Message => {
                self.state = CidState::PostWait;
                self.wait = Countdown::from_millis(u32::from(self.spec.post_ms), POTS_TICK_MS);
            }
            _ => {}
        }
    }

    /// Advances one tick.
    pub fn update(&mut self) -> CidCommands {
        let mut commands = CidCommands::new();
        match self.state {
            CidState::PreWait => {
                if self.wait.is_expired() || self.wait.tick() {
                    self.state = CidState::Message;
                    let _ = commands.push(CidCommand::SendMessage);
                }
            }
            CidState::PostWait => {
                if self.wait.is_expired() || self.wait.tick() {
                    self.state = CidState::Idle;
                    if self.reversed {
                        self.reversed = false;
                        let _ = commands.push(CidCommand::SetForward(true));
                    }
                    let _ = commands.push(CidCommand::ReleaseRing {
                        ring_now: self.ring_held,
                    });
                    self.ring_held = false;
                }
            }
            CidState::Idle | CidState::AlertRing | CidState::AlertTone | CidState::Message => {}
        }
        commands
    }

    /// Abandons delivery, e.g. when the phone is answered.
    pub fn abort(&mut self) -> CidCommands {
        let mut commands = CidCommands::new();
        if self.reversed {
            self.reversed = false;
            let _ = commands.push(CidCommand::SetForward(true));
        }
        self.state = CidState::Idle;
        self.ring_held = false;
        commands
    }

    fn enter_pre_wait(&mut self, millis: u16) {
        self.state = CidState::PreWait;
        self.wait = Countdown::from_millis(u32::from(millis), POTS_TICK_MS);
    }
}

impl Default for CallerIdSequencer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callerid::CallerIdStandard;

    fn ticks_until_message(sequencer: &mut CallerIdSequencer) -> u32 {
        for tick in 1..1000 {
            if sequencer.update().contains(&CidCommand::SendMessage) {
                return tick;
            }
        }
        panic!("message never sent");
    }

    #[test]
    fn plain_before_ring_gets_minimum_lead_in() {
        let spec = CallerIdSpec::new(
            CallerIdStandard::Dtmf1,
            CallerIdFlags::BEFORE_RING,
            0,
            300,
            0,
        );
        let mut sequencer = CallerIdSequencer::new();
        assert!(sequencer.start_before_ring(spec).is_empty());
        assert_eq!(ticks_until_message(&mut sequencer), 10);
    }

    #[test]
    fn line_reversal_then_alert_ring_then_release() {
        let spec = CallerIdSpec::new(
            CallerIdStandard::Sin227,
            CallerIdFlags::BEFORE_RING
                .union(CallerIdFlags::LINE_REVERSAL)
                .union(CallerIdFlags::ALERT_RING),
            500,
            200,
            200,
        );
        let mut sequencer = CallerIdSequencer::new();
        let commands = sequencer.start_before_ring(spec);
        assert_eq!(
            commands.as_slice(),
            &[
                CidCommand::SetForward(false),
                CidCommand::AlertRing { duration_ms: 200 }
            ]
        );
        assert!(sequencer.blocks_ringing());
        assert!(sequencer.update().is_empty());

        sequencer.alert_ring_done();
        assert_eq!(ticks_until_message(&mut sequencer), 50);
        sequencer.audio_done();
        assert_eq!(sequencer.state(), CidState::PostWait);

        let mut released = None;
        for _ in 0..20 {
            let commands = sequencer.update();
            if !commands.is_empty() {
                released = Some(commands);
            }
        }
        assert_eq!(
            released.expect("released").as_slice(),
            &[
                CidCommand::SetForward(true),
                CidCommand::ReleaseRing { ring_now: true }
            ]
        );
        assert!(sequencer.is_idle());
    }

    #[test]
    fn after_ring_release_does_not_ring_immediately() {
        let spec = CallerIdSpec::new(CallerIdStandard::Bellcore, CallerIdFlags::NONE, 0, 200, 0);
        let mut sequencer = CallerIdSequencer::new();
        sequencer.start_after_ring(spec);
        assert_eq!(ticks_until_message(&mut sequencer), 1);
        sequencer.audio_done();
        let released: CidCommands = (0..20).flat_map(|_| sequencer.update()).collect();
        assert_eq!(released.as_slice(), &[CidCommand::ReleaseRing { ring_now: false }]);
    }

    #[test]
    fn abort_restores_polarity() {
        let spec = CallerIdSpec::new(
            CallerIdStandard::Etsi,
            CallerIdFlags::BEFORE_RING.union(CallerIdFlags::LINE_REVERSAL),
            100,
            200,
            0,
        );
        let mut sequencer = CallerIdSequencer::new();
        sequencer.start_before_ring(spec);
        assert_eq!(sequencer.abort().as_slice(), &[CidCommand::SetForward(true)]);
        assert!(!sequencer.blocks_ringing());
    }
}
