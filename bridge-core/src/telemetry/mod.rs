//! Call telemetry shared by firmware and host targets.
//!
//! Every task reports what happened as a [`TelemetryEventKind`]; the
//! recorder keeps the most recent records in a fixed-size ring so the
//! emulator console and the firmware status dump can show the last few
//! seconds of a call without any allocation.

use core::{fmt, time::Duration};

use heapless::{HistoryBuf, OldestOrdered};

use crate::audio::{AudioDiagnostic, AudioSource};
use crate::cellular::CellState;
use crate::dial_buffer::{DialedDigit, DigitSource};
use crate::orchestrator::CallState;

/// Identifier used when tracking emitted telemetry events.
pub type EventId = u32;

/// Discriminated telemetry events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEventKind {
    CallState(CallState),
    CellState(CellState),
    Hook { off_hook: bool },
    Digit(char),
    /// Caller ID arrived, or `blocked` when none came by the second ring.
    CallerId { blocked: bool },
    AudioSource(AudioSource),
    Audio(AudioDiagnostic),
    /// A task produced more diagnostics in one poll than it could report.
    DiagnosticsDropped(u32),
    Fatal,
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::CallState(state) => write!(f, "call {}", state.name()),
            TelemetryEventKind::CellState(state) => write!(f, "cell {state:?}"),
            TelemetryEventKind::Hook { off_hook: true } => f.write_str("off-hook"),
            TelemetryEventKind::Hook { off_hook: false } => f.write_str("on-hook"),
            TelemetryEventKind::Digit(digit) => write!(f, "digit {digit}"),
            TelemetryEventKind::CallerId { blocked: false } => f.write_str("caller-id"),
            TelemetryEventKind::CallerId { blocked: true } => f.write_str("caller-id blocked"),
            TelemetryEventKind::AudioSource(source) => write!(f, "audio {source:?}"),
            TelemetryEventKind::Audio(diagnostic) => write!(f, "audio {diagnostic:?}"),
            TelemetryEventKind::DiagnosticsDropped(count) => write!(f, "{count} diagnostics dropped"),
            TelemetryEventKind::Fatal => f.write_str("fatal"),
        }
    }
}

impl TelemetryEventKind {
    const CALL_STATE_BASE: u16 = 0x0000;
    const CELL_STATE_BASE: u16 = 0x0010;
    const ON_HOOK_CODE: u16 = 0x0020;
    const OFF_HOOK_CODE: u16 = 0x0021;
    const CALLER_ID_CODE: u16 = 0x0022;
    const CALLER_ID_BLOCKED_CODE: u16 = 0x0023;
    const FATAL_CODE: u16 = 0x0024;
    const DROPPED_CODE: u16 = 0x0025;
    const AUDIO_SOURCE_BASE: u16 = 0x0030;
    const AUDIO_BASE: u16 = 0x0038;
    const DIGIT_BASE: u16 = 0x0100;

    /// Encodes the event into a compact discriminant for status words.
    #[must_use]
    #[allow(clippy::cast_lossless, clippy::cast_possible_truncation)]
    pub const fn to_raw(self) -> u16 {
        match self {
            TelemetryEventKind::CallState(state) => Self::CALL_STATE_BASE + state.to_raw() as u16,
            TelemetryEventKind::CellState(state) => Self::CELL_STATE_BASE + state as u16,
            TelemetryEventKind::Hook { off_hook: false } => Self::ON_HOOK_CODE,
            TelemetryEventKind::Hook { off_hook: true } => Self::OFF_HOOK_CODE,
            TelemetryEventKind::CallerId { blocked: false } => Self::CALLER_ID_CODE,
            TelemetryEventKind::CallerId { blocked: true } => Self::CALLER_ID_BLOCKED_CODE,
            TelemetryEventKind::Fatal => Self::FATAL_CODE,
            TelemetryEventKind::DiagnosticsDropped(_) => Self::DROPPED_CODE,
            TelemetryEventKind::AudioSource(source) => Self::AUDIO_SOURCE_BASE + source.to_raw() as u16,
            TelemetryEventKind::Audio(diagnostic) => {
                Self::AUDIO_BASE
                    + match diagnostic {
                        AudioDiagnostic::RxOverflow(_) => 0,
                        AudioDiagnostic::TxOverflow(_) => 1,
                        AudioDiagnostic::AlignUnderrun(_) => 2,
                        AudioDiagnostic::AlignOverrun(_) => 3,
                    }
            }
            // Dialable characters are ASCII.
            TelemetryEventKind::Digit(digit) => Self::DIGIT_BASE + (digit as u32 & 0xFF) as u16,
        }
    }
}

/// Payloads carried alongside telemetry events.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TelemetryPayload {
    None,
    /// Time spent in the state that was just left.
    Transition { elapsed_in_previous: Option<Duration> },
    Digit(DigitSource),
}

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 64;

/// Monotonic instants the recorder can measure between.
pub trait TelemetryInstant: Copy {
    /// Returns the saturating duration from `earlier` to `self`.
    fn saturating_duration_since(&self, earlier: Self) -> Duration;
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TelemetryRecord<TInstant>
where
    TInstant: Copy,
{
    pub id: EventId,
    pub timestamp: TInstant,
    pub event: TelemetryEventKind,
    pub details: TelemetryPayload,
}

pub type TelemetryRing<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY> =
    HistoryBuf<TelemetryRecord<TInstant>, CAPACITY>;

/// Records telemetry events into a fixed-size ring buffer.
pub struct TelemetryRecorder<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY>
where
    TInstant: Copy,
{
    ring: TelemetryRing<TInstant, CAPACITY>,
    call_entered_at: Option<TInstant>,
    cell_entered_at: Option<TInstant>,
    next_event_id: EventId,
}

impl<TInstant, const CAPACITY: usize> TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: TelemetryInstant,
{
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            call_entered_at: None,
            cell_entered_at: None,
            next_event_id: 0,
        }
    }

    /// Recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord<TInstant>> {
        self.ring.oldest_ordered()
    }

    #[must_use]
    pub fn latest(&self) -> Option<&TelemetryRecord<TInstant>> {
        self.ring.recent()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Records an orchestrator transition with the time spent in the previous state.
    pub fn record_call_state(&mut self, to: CallState, timestamp: TInstant) -> EventId {
        let elapsed_in_previous = since(&mut self.call_entered_at, timestamp);
        self.record(
            TelemetryEventKind::CallState(to),
            TelemetryPayload::Transition { elapsed_in_previous },
            timestamp,
        )
    }

    /// Records a cellular link transition with the time spent in the previous state.
    pub fn record_cell_state(&mut self, to: CellState, timestamp: TInstant) -> EventId {
        let elapsed_in_previous = since(&mut self.cell_entered_at, timestamp);
        self.record(
            TelemetryEventKind::CellState(to),
            TelemetryPayload::Transition { elapsed_in_previous },
            timestamp,
        )
    }

    pub fn record_digit(&mut self, digit: DialedDigit, timestamp: TInstant) -> EventId {
        self.record(
            TelemetryEventKind::Digit(digit.digit),
            TelemetryPayload::Digit(digit.source),
            timestamp,
        )
    }

    /// Records an event that carries no payload.
    pub fn record_event(&mut self, event: TelemetryEventKind, timestamp: TInstant) -> EventId {
        self.record(event, TelemetryPayload::None, timestamp)
    }

    pub fn record(
        &mut self,
        event: TelemetryEventKind,
        details: TelemetryPayload,
        timestamp: TInstant,
    ) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);
        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            event,
            details,
        });
        id
    }
}

impl<TInstant, const CAPACITY: usize> Default for TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: TelemetryInstant,
{
    fn default() -> Self {
        Self::new()
    }
}

fn since<TInstant: TelemetryInstant>(entered_at: &mut Option<TInstant>, now: TInstant) -> Option<Duration> {
    let elapsed = entered_at.map(|previous| now.saturating_duration_since(previous));
    *entered_at = Some(now);
    elapsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    struct Millis(u64);

    impl TelemetryInstant for Millis {
        fn saturating_duration_since(&self, earlier: Self) -> Duration {
            Duration::from_millis(self.0.saturating_sub(earlier.0))
        }
    }

    #[test]
    fn call_transitions_carry_time_in_previous_state() {
        let mut recorder: TelemetryRecorder<Millis> = TelemetryRecorder::new();
        recorder.record_call_state(CallState::Idle, Millis(100));
        recorder.record_call_state(CallState::CallReceiving, Millis(2_600));

        let latest = recorder.latest().expect("record");
        assert_eq!(latest.event, TelemetryEventKind::CallState(CallState::CallReceiving));
        assert_eq!(
            latest.details,
            TelemetryPayload::Transition {
                elapsed_in_previous: Some(Duration::from_millis(2_500))
            }
        );
        let first = recorder.oldest_first().next().expect("record");
        assert_eq!(first.details, TelemetryPayload::Transition { elapsed_in_previous: None });
    }

    #[test]
    fn call_and_cell_timers_are_independent() {
        let mut recorder: TelemetryRecorder<Millis> = TelemetryRecorder::new();
        recorder.record_call_state(CallState::Idle, Millis(0));
        recorder.record_cell_state(CellState::ConnectedIdle, Millis(40));
        recorder.record_call_state(CallState::UserDialing, Millis(50));

        let records: heapless::Vec<_, 4> = recorder.oldest_first().copied().collect();
        assert_eq!(records[1].details, TelemetryPayload::Transition { elapsed_in_previous: None });
        assert_eq!(
            records[2].details,
            TelemetryPayload::Transition {
                elapsed_in_previous: Some(Duration::from_millis(50))
            }
        );
    }

    #[test]
    fn ring_keeps_most_recent_records() {
        let mut recorder: TelemetryRecorder<Millis, 4> = TelemetryRecorder::new();
        for (at, digit) in (0u64..).zip("5551212".chars()) {
            recorder.record_digit(DialedDigit::new(digit, DigitSource::Rotary), Millis(at));
        }
        assert_eq!(recorder.len(), 4);
        let ids: heapless::Vec<EventId, 4> = recorder.oldest_first().map(|record| record.id).collect();
        assert_eq!(ids.as_slice(), &[3, 4, 5, 6]);
    }

    #[test]
    fn raw_codes_are_distinct_per_kind() {
        assert_eq!(TelemetryEventKind::CallState(CallState::Idle).to_raw(), 0x0000);
        assert_eq!(TelemetryEventKind::CellState(CellState::WaitEnd).to_raw(), 0x0014);
        assert_eq!(TelemetryEventKind::Digit('5').to_raw(), 0x0135);
        assert_ne!(
            TelemetryEventKind::Hook { off_hook: true }.to_raw(),
            TelemetryEventKind::Hook { off_hook: false }.to_raw()
        );
    }
}
