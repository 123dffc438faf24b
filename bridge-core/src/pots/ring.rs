//! Ring cadence generator.
//!
//! A ring is a train of polarity reversals at the country's ring frequency
//! while the line is in ring mode. One cadence runs its on/off steps and
//! stops; the next cadence starts on the next ring request.

use super::line::LineInterface;
use crate::country::RingCadence;
use crate::ticks::{Countdown, POTS_TICK_MS};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RingState {
    Idle,
    PulseOn,
    PulseOff,
    StepWait,
}

/// Normal cadence or the short alert pulse sent ahead of caller ID.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RingKind {
    Cadence,
    Alert { duration_ms: u16 },
}

/// Ticks spent reversed and forward for one ring cycle at `frequency_hz`.
///
/// The reversed half is rounded down; whatever that loses is added to the
/// forward half so one full cycle keeps the nominal period.
#[must_use]
pub const fn pulse_ticks(frequency_hz: u8) -> (u32, u32) {
    let hz = if frequency_hz == 0 { 1 } else { frequency_hz as u32 };
    let period_ms = 1000 / hz;
    let on = period_ms / 2 / POTS_TICK_MS;
    let off = (period_ms - on * POTS_TICK_MS) / POTS_TICK_MS;
    (on, off)
}

#[derive(Clone, Debug)]
pub struct RingGenerator {
    state: RingState,
    kind: RingKind,
    cadence: RingCadence,
    step: usize,
    last_step: usize,
    period: Countdown,
    pulse: Countdown,
    idle_forward: bool,
}

impl RingGenerator {
    #[must_use]
    pub const fn new(cadence: RingCadence) -> Self {
        Self {
            state: RingState::Idle,
            kind: RingKind::Cadence,
            cadence,
            step: 0,
            last_step: 0,
            period: Countdown::expired(),
            pulse: Countdown::expired(),
            idle_forward: true,
        }
    }

    #[must_use]
    pub const fn state(&self) -> RingState {
        self.state
    }

    #[must_use]
    pub const fn is_idle(&self) -> bool {
        matches!(self.state, RingState::Idle)
    }

    /// Takes effect at the next ring.
    pub fn set_cadence(&mut self, cadence: RingCadence) {
        self.cadence = cadence;
    }

    /// Polarity held between rings; reversed while a caller-ID line
    /// reversal is in effect.
    pub fn set_idle_polarity(&mut self, forward: bool, line: &mut impl LineInterface) {
        self.idle_forward = forward;
        if self.is_idle() {
            line.set_forward(forward);
        }
    }

    pub fn start(&mut self, kind: RingKind, line: &mut impl LineInterface) {
        self.kind = kind;
        self.step = 0;
        let first_ms = match kind {
            RingKind::Cadence => {
                // The trailing silence is the gap until the next ring request.
                self.last_step = self.cadence.step_count().saturating_sub(2);
                self.cadence.step_ms(0)
            }
            RingKind::Alert { duration_ms } => {
                self.last_step = 0;
                duration_ms
            }
        };
        self.begin_ring_step(first_ms, line);
    }

    /// Stops immediately, restoring idle polarity. Returns `true` if a ring was running.
    pub fn abort(&mut self, line: &mut impl LineInterface) -> bool {
        if self.is_idle() {
            return false;
        }
        self.finish(line);
        true
    }

    /// Advances one tick. Returns the kind of ring that just completed.
    pub fn update(&mut self, line: &mut impl LineInterface) -> Option<RingKind> {
        let (on_ticks, off_ticks) = pulse_ticks(self.cadence.frequency_hz);
        match self.state {
            RingState::Idle => {}
            RingState::PulseOn => {
                self.period.tick();
                if self.pulse.tick() {
                    self.state = RingState::PulseOff;
                    self.pulse = Countdown::ticks(off_ticks);
                    line.set_forward(true);
                }
            }
            RingState::PulseOff => {
                let period_done = self.period.tick();
                let pulse_done = self.pulse.tick();
                if period_done {
                    if self.step >= self.last_step {
                        self.finish(line);
                        return Some(self.kind);
                    }
                    self.step += 1;
                    self.state = RingState::StepWait;
                    self.period = self.step_countdown(self.cadence.step_ms(self.step));
                    line.set_ring_mode(false);
                    line.set_forward(self.idle_forward);
                } else if pulse_done {
                    self.state = RingState::PulseOn;
                    self.pulse = Countdown::ticks(on_ticks);
                    line.set_forward(false);
                }
            }
            RingState::StepWait => {
                if self.period.tick() {
                    self.step += 1;
                    let step_ms = self.cadence.step_ms(self.step);
                    self.begin_ring_step(step_ms, line);
                }
            }
        }
        None
    }

    fn begin_ring_step(&mut self, duration_ms: u16, line: &mut impl LineInterface) {
        let (on_ticks, _) = pulse_ticks(self.cadence.frequency_hz);
        self.state = RingState::PulseOn;
        self.period = self.step_countdown(duration_ms);
        self.pulse = Countdown::ticks(on_ticks);
        line.set_ring_mode(true);
        line.set_forward(false);
    }

    fn step_countdown(&self, duration_ms: u16) -> Countdown {
        Countdown::from_millis(u32::from(duration_ms), POTS_TICK_MS)
    }

    fn finish(&mut self, line: &mut impl LineInterface) {
        self.state = RingState::Idle;
        line.set_forward(self.idle_forward);
        line.set_ring_mode(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::country::COUNTRIES;

    #[derive(Default)]
    struct Recorder {
        ring_mode: bool,
        forward: bool,
        reversals: u32,
        ring_mode_ticks: u32,
    }

    impl LineInterface for Recorder {
        fn hook_is_off(&mut self) -> bool {
            false
        }

        fn set_ring_mode(&mut self, enabled: bool) {
            self.ring_mode = enabled;
        }

        fn set_forward(&mut self, forward: bool) {
            if self.forward && !forward {
                self.reversals += 1;
            }
            self.forward = forward;
        }
    }

    fn run(generator: &mut RingGenerator, line: &mut Recorder) -> (u32, Option<RingKind>) {
        for tick in 1..10_000 {
            if line.ring_mode {
                line.ring_mode_ticks += 1;
            }
            if let Some(end) = generator.update(line) {
                return (tick, Some(end));
            }
        }
        (10_000, None)
    }

    #[test]
    fn pulse_halves_add_up_to_the_ring_period() {
        for frequency in [16u8, 17, 20, 25, 30, 50] {
            let (on, off) = pulse_ticks(frequency);
            let period = 1000 / u32::from(frequency);
            let total = (on + off) * POTS_TICK_MS;
            assert!(total <= period && period - total < POTS_TICK_MS, "{frequency} Hz");
            assert!(off >= on);
        }
    }

    #[test]
    fn single_pair_cadence_rings_once_then_stops() {
        let cadence = RingCadence::new(20, &[(1000, 4000)]);
        let mut line = Recorder {
            forward: true,
            ..Recorder::default()
        };
        let mut generator = RingGenerator::new(cadence);
        generator.start(RingKind::Cadence, &mut line);
        assert!(line.ring_mode);

        let (ticks, end) = run(&mut generator, &mut line);
        assert_eq!(end, Some(RingKind::Cadence));
        assert_eq!(ticks, 100);
        // 20 Hz for one second.
        assert_eq!(line.reversals, 20);
        assert!(!line.ring_mode);
        assert!(line.forward);
    }

    #[test]
    fn double_ring_drops_ring_mode_between_bursts() {
        let australia = COUNTRIES[0].ring;
        let mut line = Recorder {
            forward: true,
            ..Recorder::default()
        };
        let mut generator = RingGenerator::new(australia);
        generator.start(RingKind::Cadence, &mut line);

        let mut saw_wait_without_ring_mode = false;
        loop {
            if generator.state() == RingState::StepWait {
                saw_wait_without_ring_mode |= !line.ring_mode;
            }
            if generator.update(&mut line).is_some() {
                break;
            }
        }
        assert!(saw_wait_without_ring_mode);
        // Two 400 ms bursts at 25 Hz.
        assert_eq!(line.reversals, 20);
    }

    #[test]
    fn alert_ring_is_one_short_burst() {
        let mut line = Recorder {
            forward: true,
            ..Recorder::default()
        };
        let mut generator = RingGenerator::new(COUNTRIES[6].ring);
        generator.start(RingKind::Alert { duration_ms: 200 }, &mut line);
        let (ticks, end) = run(&mut generator, &mut line);
        assert_eq!(end, Some(RingKind::Alert { duration_ms: 200 }));
        assert_eq!(ticks, 20);
    }

    #[test]
    fn abort_restores_idle_polarity() {
        let mut line = Recorder {
            forward: true,
            ..Recorder::default()
        };
        let mut generator = RingGenerator::new(COUNTRIES[1].ring);
        generator.set_idle_polarity(false, &mut line);
        generator.start(RingKind::Cadence, &mut line);
        generator.update(&mut line);
        assert!(generator.abort(&mut line));
        assert!(!line.forward);
        assert!(!line.ring_mode);
        assert!(!generator.abort(&mut line));
    }
}
