//! Call lifecycle shared by the line and the handset.
//!
//! The orchestrator owns the single authoritative [`CallState`]. It never
//! drives hardware itself: every decision becomes an event for the POTS
//! task, the cellular task or the display layer, plus codec gain updates
//! through [`CodecControl`].

use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::bus::Bus;
use crate::dial_buffer::{DialBufferError, DialedDigit, DigitSource};
use crate::events::{CallEvent, CellEvent, DisplayEvent, EventSet, PotsEvent};
use crate::gain::{CodecControl, GainTarget, apply_codec_gain, bt_to_db};
use crate::report::Report;
use crate::ticks::{CALL_TICK_MS, Elapsed};

/// Single digit that asks the handset for its voice assistant.
pub const ASSISTANT_DIGIT: char = '0';

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CallState {
    /// Handset connected, nothing happening.
    Idle,
    /// No handset connection.
    ServiceLost,
    /// Handset reports an incoming call; the line is ringing.
    CallReceiving,
    /// The phone was picked up; waiting for the handset to connect the call.
    CallAnswering,
    /// Off-hook and collecting digits.
    UserDialing,
    /// Dial request sent; waiting for the handset to report the call.
    CallInitiating,
    /// Call exists but its audio is not routed to the line.
    CallActive,
    /// Call exists and its audio is on the line.
    CallActiveVoice,
    /// Hang-up requested; waiting for the handset to confirm.
    CallEnding,
    /// The far end hung up; waiting for the phone to go on-hook.
    CallEndingWaitOnHook,
}

impl CallState {
    const ALL: [CallState; 10] = [
        CallState::Idle,
        CallState::ServiceLost,
        CallState::CallReceiving,
        CallState::CallAnswering,
        CallState::UserDialing,
        CallState::CallInitiating,
        CallState::CallActive,
        CallState::CallActiveVoice,
        CallState::CallEnding,
        CallState::CallEndingWaitOnHook,
    ];

    /// Compact encoding for status words.
    #[must_use]
    pub const fn to_raw(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub fn from_raw(raw: u8) -> Option<Self> {
        Self::ALL.get(usize::from(raw)).copied()
    }

    /// Returns `true` while something call related is going on.
    #[must_use]
    pub const fn is_busy(self) -> bool {
        !matches!(self, CallState::Idle | CallState::ServiceLost)
    }

    /// Returns `true` when dialed digits are sent to the far end as DTMF.
    #[must_use]
    pub const fn is_in_call(self) -> bool {
        matches!(self, CallState::CallActive | CallState::CallActiveVoice)
    }

    const fn accepts_digits(self) -> bool {
        matches!(self, CallState::UserDialing) || self.is_in_call()
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            CallState::Idle => "idle",
            CallState::ServiceLost => "service-lost",
            CallState::CallReceiving => "call-receiving",
            CallState::CallAnswering => "call-answering",
            CallState::UserDialing => "user-dialing",
            CallState::CallInitiating => "call-initiating",
            CallState::CallActive => "call-active",
            CallState::CallActiveVoice => "call-active-voice",
            CallState::CallEnding => "call-ending",
            CallState::CallEndingWaitOnHook => "call-ending-wait-on-hook",
        }
    }
}

/// Orchestrator timing.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CallTiming {
    /// Silence between handset ring indications that ends an unanswered call.
    pub ring_timeout_ms: u32,
    /// Quiet period after the last line digit before dialing automatically.
    pub auto_dial_ms: u32,
    /// Interval between activity notifications while busy.
    pub activity_ms: u32,
}

impl CallTiming {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring_timeout_ms: 7_000,
            auto_dial_ms: 4_000,
            activity_ms: 500,
        }
    }
}

impl Default for CallTiming {
    fn default() -> Self {
        Self::new()
    }
}

/// Conditions worth a log line, reported by [`CallOrchestrator::poll`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CallDiagnostic {
    StateChanged { from: CallState, to: CallState },
    /// The codec rejected a gain update.
    CodecGainFailed(GainTarget),
    DigitRejected(DialBufferError),
}

pub type CallDiagnostics = Report<CallDiagnostic, 4>;

/// Requests that only live for the poll that observed them.
#[derive(Copy, Clone, Debug, Default)]
struct Requests {
    dial_pressed: bool,
    ring: bool,
}

pub struct CallOrchestrator {
    state: CallState,
    ring_timeout_ticks: u32,
    auto_dial_ticks: u32,
    activity_ticks: u32,
    in_service: bool,
    in_call: bool,
    audio_connected: bool,
    off_hook: bool,
    caller_id_valid: bool,
    ring_count: u8,
    last_digit_from_line: bool,
    ring_timer: Elapsed,
    dial_timer: Elapsed,
    activity: Elapsed,
}

impl CallOrchestrator {
    #[must_use]
    pub const fn new(timing: CallTiming) -> Self {
        Self {
            state: CallState::ServiceLost,
            ring_timeout_ticks: timing.ring_timeout_ms / CALL_TICK_MS,
            auto_dial_ticks: timing.auto_dial_ms / CALL_TICK_MS,
            activity_ticks: timing.activity_ms / CALL_TICK_MS,
            in_service: false,
            in_call: false,
            audio_connected: false,
            off_hook: false,
            caller_id_valid: false,
            ring_count: 0,
            last_digit_from_line: false,
            ring_timer: Elapsed::new(),
            dial_timer: Elapsed::new(),
            activity: Elapsed::new(),
        }
    }

    #[must_use]
    pub const fn state(&self) -> CallState {
        self.state
    }

    /// Handset ring indications seen for the current call.
    #[must_use]
    pub const fn ring_count(&self) -> u8 {
        self.ring_count
    }

    /// Pushes the stored gains to the codec, typically once at start-up.
    pub fn restore_gains<M: RawMutex>(
        &self,
        bus: &Bus<M>,
        codec: &mut impl CodecControl,
    ) -> CallDiagnostics {
        let mut diagnostics = CallDiagnostics::new();
        for target in [GainTarget::Mic, GainTarget::Speaker] {
            if !apply_codec_gain(codec, target, bus.gain(target)) {
                diagnostics.record(CallDiagnostic::CodecGainFailed(target));
            }
        }
        diagnostics
    }

    /// Runs one 50 ms tick.
    pub fn poll<M: RawMutex>(
        &mut self,
        bus: &Bus<M>,
        codec: &mut impl CodecControl,
    ) -> CallDiagnostics {
        let mut diagnostics = CallDiagnostics::new();
        let events = bus.call.take();
        let requests = self.handle_events(events, bus, codec, &mut diagnostics);
        self.evaluate(requests, bus, &mut diagnostics);

        if self.state.is_busy() {
            if self.activity.tick() > self.activity_ticks {
                self.activity.reset();
                bus.display.raise(DisplayEvent::Activity);
            }
        } else {
            self.activity.reset();
        }
        diagnostics
    }

    fn handle_events<M: RawMutex>(
        &mut self,
        events: EventSet<CallEvent>,
        bus: &Bus<M>,
        codec: &mut impl CodecControl,
        diagnostics: &mut CallDiagnostics,
    ) -> Requests {
        let mut requests = Requests::default();
        for event in events.iter() {
            match event {
                CallEvent::OnHook => self.off_hook = false,
                CallEvent::OffHook => self.off_hook = true,
                CallEvent::PotsDigit => {
                    if let Some(digit) = bus.take_pots_digit() {
                        self.push_digit(digit, bus, diagnostics);
                        self.last_digit_from_line = true;
                    }
                }
                CallEvent::UiDigit => {
                    if let Some(digit) = bus.take_ui_digit() {
                        self.push_digit(DialedDigit::new(digit, DigitSource::App), bus, diagnostics);
                        self.last_digit_from_line = false;
                        // Heard on the line as a DTMF burst while dialing.
                        if self.state == CallState::UserDialing {
                            bus.post_app_digit(digit);
                        }
                    }
                }
                CallEvent::UiDelete => {
                    if self.state == CallState::UserDialing && bus.dial.with(|dial| dial.pop()).is_some() {
                        self.last_digit_from_line = false;
                        bus.display.raise(DisplayEvent::NumberChanged);
                    }
                }
                CallEvent::UiDial => requests.dial_pressed = true,
                CallEvent::InService => self.in_service = true,
                CallEvent::OutOfService => self.in_service = false,
                CallEvent::Ring => {
                    requests.ring = true;
                    self.ring_count = self.ring_count.saturating_add(1);
                }
                CallEvent::CallStarted => self.in_call = true,
                CallEvent::CallEnded => self.in_call = false,
                CallEvent::CallerIdAvailable => {
                    self.caller_id_valid = true;
                    bus.display.raise(DisplayEvent::CallerIdChanged);
                }
                CallEvent::AudioStarted => self.audio_connected = true,
                CallEvent::AudioEnded => self.audio_connected = false,
                CallEvent::UiMicGain => self.local_gain(GainTarget::Mic, bus, codec, diagnostics),
                CallEvent::UiSpeakerGain => {
                    self.local_gain(GainTarget::Speaker, bus, codec, diagnostics);
                }
                CallEvent::RemoteMicGain => self.remote_gain(GainTarget::Mic, bus, codec, diagnostics),
                CallEvent::RemoteSpeakerGain => {
                    self.remote_gain(GainTarget::Speaker, bus, codec, diagnostics);
                }
                CallEvent::RingMute => bus.pots.raise(PotsEvent::MuteRing),
                CallEvent::RingUnmute => bus.pots.raise(PotsEvent::UnmuteRing),
            }
        }
        requests
    }

    fn push_digit<M: RawMutex>(
        &mut self,
        digit: DialedDigit,
        bus: &Bus<M>,
        diagnostics: &mut CallDiagnostics,
    ) {
        if self.state.accepts_digits() {
            match bus.dial.with(|dial| dial.push(digit)) {
                Ok(()) => {
                    bus.display.raise(DisplayEvent::NumberChanged);
                    self.dial_timer.reset();
                }
                Err(err) => {
                    diagnostics.record(CallDiagnostic::DigitRejected(err));
                }
            }
        }
        if self.state.is_in_call() {
            bus.post_dtmf_digit(digit.digit);
        }
    }

    /// Display-originated gain: codec and handset, never back to the display.
    fn local_gain<M: RawMutex>(
        &self,
        target: GainTarget,
        bus: &Bus<M>,
        codec: &mut impl CodecControl,
        diagnostics: &mut CallDiagnostics,
    ) {
        if !apply_codec_gain(codec, target, bus.gain(target)) {
            diagnostics.record(CallDiagnostic::CodecGainFailed(target));
        }
        bus.cell.raise(match target {
            GainTarget::Mic => CellEvent::MicGainChanged,
            GainTarget::Speaker => CellEvent::SpeakerGainChanged,
        });
    }

    /// Handset-originated gain: codec and display, never back to the handset.
    fn remote_gain<M: RawMutex>(
        &self,
        target: GainTarget,
        bus: &Bus<M>,
        codec: &mut impl CodecControl,
        diagnostics: &mut CallDiagnostics,
    ) {
        let db = bt_to_db(target, bus.remote_gain(target));
        bus.set_gain(target, db);
        if !apply_codec_gain(codec, target, db) {
            diagnostics.record(CallDiagnostic::CodecGainFailed(target));
        }
        bus.display.raise(match target {
            GainTarget::Mic => DisplayEvent::MicGainChanged,
            GainTarget::Speaker => DisplayEvent::SpeakerGainChanged,
        });
    }

    fn answered_state(&self) -> CallState {
        if self.audio_connected && self.off_hook {
            CallState::CallActiveVoice
        } else {
            CallState::CallActive
        }
    }

    fn evaluate<M: RawMutex>(
        &mut self,
        requests: Requests,
        bus: &Bus<M>,
        diagnostics: &mut CallDiagnostics,
    ) {
        if self.state != CallState::ServiceLost && !self.in_service {
            self.enter(CallState::ServiceLost, bus, diagnostics);
            return;
        }

        let next = match self.state {
            CallState::ServiceLost => self.in_service.then_some(CallState::Idle),
            CallState::Idle => {
                if requests.ring {
                    Some(CallState::CallReceiving)
                } else if self.off_hook {
                    // Audio already routed here means the call was answered on the handset.
                    Some(if self.audio_connected {
                        CallState::CallActiveVoice
                    } else {
                        CallState::UserDialing
                    })
                } else {
                    None
                }
            }
            CallState::CallReceiving => {
                let next = if requests.dial_pressed {
                    Some(CallState::CallEnding)
                } else if self.in_call {
                    Some(self.answered_state())
                } else if self.off_hook {
                    Some(CallState::CallAnswering)
                } else if requests.ring {
                    self.ring_timer.reset();
                    None
                } else if self.ring_timer.tick() >= self.ring_timeout_ticks {
                    bus.pots.raise(PotsEvent::DoneRinging);
                    Some(CallState::Idle)
                } else {
                    None
                };
                // No caller ID by the second ring: the number was withheld.
                if requests.ring && self.ring_count == 2 && !self.caller_id_valid {
                    bus.display.raise(DisplayEvent::CallerIdBlocked);
                }
                next
            }
            CallState::CallAnswering => {
                if !self.off_hook || requests.dial_pressed {
                    Some(CallState::CallEnding)
                } else if self.in_call {
                    Some(self.answered_state())
                } else {
                    None
                }
            }
            CallState::UserDialing => {
                if !self.off_hook {
                    Some(CallState::Idle)
                } else if requests.ring {
                    Some(CallState::CallReceiving)
                } else if self.audio_connected {
                    Some(CallState::CallActiveVoice)
                } else if !bus.dial.is_empty() {
                    let quiet = self.dial_timer.tick() >= self.auto_dial_ticks;
                    (requests.dial_pressed || (self.last_digit_from_line && quiet))
                        .then_some(CallState::CallInitiating)
                } else {
                    None
                }
            }
            CallState::CallInitiating => {
                if self.in_call {
                    Some(self.answered_state())
                } else if requests.dial_pressed || !self.off_hook {
                    Some(CallState::CallEnding)
                } else {
                    None
                }
            }
            CallState::CallActive => {
                if requests.dial_pressed {
                    Some(CallState::CallEnding)
                } else if !self.in_call {
                    Some(if self.off_hook {
                        CallState::CallEndingWaitOnHook
                    } else {
                        CallState::Idle
                    })
                } else if self.audio_connected && self.off_hook {
                    Some(CallState::CallActiveVoice)
                } else {
                    None
                }
            }
            CallState::CallActiveVoice => {
                if requests.dial_pressed || !self.off_hook {
                    Some(CallState::CallEnding)
                } else if !self.audio_connected {
                    Some(if self.in_call {
                        CallState::CallActive
                    } else {
                        CallState::CallEndingWaitOnHook
                    })
                } else {
                    None
                }
            }
            CallState::CallEnding => {
                if self.audio_connected && self.off_hook {
                    Some(CallState::CallActiveVoice)
                } else if !self.in_call {
                    Some(if self.off_hook {
                        CallState::CallEndingWaitOnHook
                    } else {
                        CallState::Idle
                    })
                } else {
                    None
                }
            }
            CallState::CallEndingWaitOnHook => (!self.off_hook).then_some(CallState::Idle),
        };

        if let Some(next) = next {
            self.enter(next, bus, diagnostics);
        }
    }

    fn enter<M: RawMutex>(&mut self, to: CallState, bus: &Bus<M>, diagnostics: &mut CallDiagnostics) {
        match to {
            CallState::ServiceLost => bus.pots.raise(PotsEvent::OutOfService),
            CallState::Idle => {
                bus.pots.raise(PotsEvent::InService);
                bus.clear_caller_number();
                self.caller_id_valid = false;
                self.ring_count = 0;
                bus.dial.with(|dial| dial.clear());
                bus.display.raise(DisplayEvent::NumberChanged);
            }
            CallState::CallReceiving => {
                bus.display.raise(DisplayEvent::Activity);
                self.ring_timer.reset();
            }
            CallState::CallAnswering => bus.cell.raise(CellEvent::AnswerCall),
            CallState::UserDialing => self.dial_timer.reset(),
            CallState::CallInitiating => {
                let number = bus.dial.number();
                if number.len() == 1 && number.starts_with(ASSISTANT_DIGIT) {
                    bus.cell.raise(CellEvent::DialAssistant);
                } else {
                    bus.post_dial_number(&number);
                }
            }
            CallState::CallEnding => bus.cell.raise(CellEvent::HangupCall),
            CallState::CallActive | CallState::CallActiveVoice | CallState::CallEndingWaitOnHook => {}
        }

        diagnostics.record(CallDiagnostic::StateChanged {
            from: self.state,
            to,
        });
        self.state = to;
        bus.display.raise(DisplayEvent::StatusChanged);
    }
}

impl Default for CallOrchestrator {
    fn default() -> Self {
        Self::new(CallTiming::new())
    }
}
