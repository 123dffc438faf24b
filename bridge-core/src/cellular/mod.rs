//! Hands-free call control towards the handset.
//!
//! [`CellularLink`] tracks whether the handset is connected, whether a call
//! exists and whether call audio is routed to the bridge. It turns
//! orchestrator requests into [`HfpCommand`]s and keeps the rest of the
//! bridge informed through the bus. The radio itself sits behind
//! [`HfpControl`]; its indications enter through [`dispatch_indication`].

mod at;

use embassy_sync::blocking_mutex::raw::RawMutex;

pub use at::{AtDecoder, AtError, AtLine, IndicatorMap, format_command};

use crate::bus::{Bus, OutgoingNumber};
use crate::callerid::CallerNumber;
use crate::events::{CallEvent, CellEvent, DisplayEvent, EventSet, PotsEvent};
use crate::gain::{GainTarget, db_to_bt};
use crate::report::Report;
use crate::ticks::{CELL_TICK_MS, Countdown};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CellState {
    /// No service level connection to a handset.
    Disconnected,
    ConnectedIdle,
    /// Dial sent, the handset has not reported a call yet.
    CallInitiated,
    CallActive,
    /// Hang-up sent, waiting for the handset to drop the call.
    WaitEnd,
}

/// Commands for the hands-free radio.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum HfpCommand {
    Dial(OutgoingNumber),
    Answer,
    /// Rejects a ringing call or ends the current one.
    Hangup,
    Dtmf(char),
    /// Asks the handset to leave echo cancellation to the bridge.
    DisableRemoteEchoCancel,
    VoiceRecognition(bool),
    /// Volume level 0..=15 reported to the handset.
    Volume { target: GainTarget, level: u8 },
    Connect,
    Disconnect,
    Discoverable(bool),
    ForgetPairing,
}

/// Value of the handset's call setup indicator.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CallSetup {
    Idle,
    /// A call is ringing on the handset.
    Incoming,
    /// Outgoing call, the network is still routing it.
    Dialing,
    /// Outgoing call, the far end is ringing.
    Alerting,
}

impl CallSetup {
    #[must_use]
    pub const fn from_raw(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Idle),
            1 => Some(Self::Incoming),
            2 => Some(Self::Dialing),
            3 => Some(Self::Alerting),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_outgoing(self) -> bool {
        matches!(self, Self::Dialing | Self::Alerting)
    }
}

/// Indications received from the hands-free radio.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum HfpIndication {
    Ring,
    /// Calling line identity; empty when the caller withheld it.
    CallerNumber(CallerNumber),
    /// Call indicator.
    Call(bool),
    /// Call setup indicator.
    CallSetup(CallSetup),
    /// Indicators the bridge does not act on.
    Indicator { index: u8, value: u8 },
    /// The handset announced where its indicators sit; already applied by
    /// the [`AtDecoder`] that produced it.
    IndicatorsMapped(IndicatorMap),
    Volume { target: GainTarget, level: u8 },
    SlcConnected,
    SlcDisconnected,
    AudioOpened { wideband: bool },
    AudioClosed,
    AuthSucceeded,
    AuthFailed,
    Ok,
    Error,
}

/// The radio as seen by [`CellularLink`].
pub trait HfpControl {
    fn send(&mut self, command: HfpCommand);

    /// Whether the radio still holds bond information for the paired handset.
    fn has_bond(&mut self) -> bool;
}

impl<T: HfpControl + ?Sized> HfpControl for &mut T {
    fn send(&mut self, command: HfpCommand) {
        (**self).send(command);
    }

    fn has_bond(&mut self) -> bool {
        (**self).has_bond()
    }
}

/// Fans a radio indication out to the tasks that care about it.
///
/// Returns `false` for indications nobody acts on.
pub fn dispatch_indication<M: RawMutex>(bus: &Bus<M>, indication: HfpIndication) -> bool {
    match indication {
        HfpIndication::Ring => {
            bus.call.raise(CallEvent::Ring);
            bus.pots.raise(PotsEvent::Ring);
        }
        HfpIndication::CallerNumber(number) => bus.post_caller_number(Some(number)),
        HfpIndication::Call(true) => bus.cell.raise(CellEvent::CallActive),
        HfpIndication::Call(false) => bus.cell.raise(CellEvent::CallIdle),
        HfpIndication::CallSetup(CallSetup::Idle) => bus.cell.raise(CellEvent::CallSetupIdle),
        HfpIndication::CallSetup(CallSetup::Incoming) => bus.cell.raise(CellEvent::CallSetupIncoming),
        HfpIndication::CallSetup(CallSetup::Dialing | CallSetup::Alerting) => {
            bus.cell.raise(CellEvent::CallSetupOutgoing);
        }
        HfpIndication::Volume { target, level } => bus.post_remote_gain(target, level),
        HfpIndication::SlcConnected => bus.cell.raise(CellEvent::SlcConnected),
        HfpIndication::SlcDisconnected => bus.cell.raise(CellEvent::SlcDisconnected),
        HfpIndication::AudioOpened { wideband } => {
            bus.cell.raise(CellEvent::AudioOpened);
            bus.call.raise(CallEvent::AudioStarted);
            bus.pots.raise(if wideband {
                PotsEvent::Audio16k
            } else {
                PotsEvent::Audio8k
            });
        }
        HfpIndication::AudioClosed => {
            bus.cell.raise(CellEvent::AudioClosed);
            bus.call.raise(CallEvent::AudioEnded);
            bus.pots.raise(PotsEvent::AudioClosed);
        }
        HfpIndication::AuthSucceeded => bus.cell.raise(CellEvent::AuthSucceeded),
        HfpIndication::AuthFailed
        | HfpIndication::Indicator { .. }
        | HfpIndication::IndicatorsMapped(_)
        | HfpIndication::Ok
        | HfpIndication::Error => return false,
    }
    true
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CellularTiming {
    /// Interval between connection attempts while disconnected.
    pub reconnect_ms: u32,
    /// Delay before the first attempt after a successful pairing.
    pub pairing_settle_ms: u32,
}

impl CellularTiming {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            reconnect_ms: 60_000,
            pairing_settle_ms: 3_000,
        }
    }
}

impl Default for CellularTiming {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CellDiagnostic {
    StateChanged { from: CellState, to: CellState },
    Reconnecting,
    /// The radio lost the bond for the paired handset.
    BondMissing,
}

pub type CellDiagnostics = Report<CellDiagnostic, 4>;

#[derive(Copy, Clone, Debug, Default)]
struct Requests {
    answer: bool,
    hangup: bool,
    dial_number: bool,
    dial_assistant: bool,
}

impl Requests {
    fn from_events(events: EventSet<CellEvent>) -> Self {
        Self {
            answer: events.contains(CellEvent::AnswerCall),
            hangup: events.contains(CellEvent::HangupCall),
            dial_number: events.contains(CellEvent::DialNumber),
            dial_assistant: events.contains(CellEvent::DialAssistant),
        }
    }
}

pub struct CellularLink {
    state: CellState,
    timing: CellularTiming,
    reconnect: Countdown,
    paired: bool,
    in_service: bool,
    call: bool,
    incoming_setup: bool,
    outgoing_setup: bool,
    audio_connected: bool,
}

impl CellularLink {
    /// A paired link tries to connect on its first poll.
    #[must_use]
    pub const fn new(timing: CellularTiming, paired: bool) -> Self {
        Self {
            state: CellState::Disconnected,
            timing,
            reconnect: Countdown::ticks(1),
            paired,
            in_service: false,
            call: false,
            incoming_setup: false,
            outgoing_setup: false,
            audio_connected: false,
        }
    }

    #[must_use]
    pub const fn state(&self) -> CellState {
        self.state
    }

    #[must_use]
    pub const fn is_paired(&self) -> bool {
        self.paired
    }

    pub fn set_paired(&mut self, paired: bool) {
        self.paired = paired;
    }

    /// Whether the handset has a call the bridge should carry. A ringing
    /// incoming call only counts once it is answered, unless the bridge is
    /// itself waiting for a dialed call to appear.
    #[must_use]
    pub const fn in_call(&self) -> bool {
        self.call
            || self.outgoing_setup
            || (self.incoming_setup && matches!(self.state, CellState::CallInitiated))
    }

    /// Whether the handset reports an incoming call still ringing.
    #[must_use]
    pub const fn is_ringing(&self) -> bool {
        self.incoming_setup && !self.call
    }

    #[must_use]
    pub const fn audio_connected(&self) -> bool {
        self.audio_connected
    }

    /// Runs one 20 ms tick.
    pub fn poll<M: RawMutex>(&mut self, bus: &Bus<M>, hfp: &mut impl HfpControl) -> CellDiagnostics {
        let mut diagnostics = CellDiagnostics::new();
        let events = bus.cell.take();
        self.handle_indications(events);
        self.handle_commands(events, bus, hfp);
        self.evaluate(Requests::from_events(events), bus, hfp, &mut diagnostics);
        diagnostics
    }

    fn handle_indications(&mut self, events: EventSet<CellEvent>) {
        if events.contains(CellEvent::SlcConnected) {
            self.in_service = true;
        }
        if events.contains(CellEvent::SlcDisconnected) {
            self.in_service = false;
        }
        if events.contains(CellEvent::CallActive) {
            self.call = true;
        }
        if events.contains(CellEvent::CallIdle) {
            self.call = false;
        }
        if events.contains(CellEvent::CallSetupIncoming) {
            self.incoming_setup = true;
            self.outgoing_setup = false;
        }
        if events.contains(CellEvent::CallSetupOutgoing) {
            self.outgoing_setup = true;
            self.incoming_setup = false;
        }
        if events.contains(CellEvent::CallSetupIdle) {
            self.incoming_setup = false;
            self.outgoing_setup = false;
        }
        if events.contains(CellEvent::AuthSucceeded) {
            // A connection is already under way as part of the pairing.
            self.paired = true;
            self.reconnect = Countdown::from_millis(self.timing.pairing_settle_ms, CELL_TICK_MS);
        }
    }

    fn handle_commands<M: RawMutex>(
        &mut self,
        events: EventSet<CellEvent>,
        bus: &Bus<M>,
        hfp: &mut impl HfpControl,
    ) {
        if events.contains(CellEvent::AudioOpened) {
            self.audio_connected = true;
            send_volume(bus, hfp, GainTarget::Mic);
            send_volume(bus, hfp, GainTarget::Speaker);
        }
        if events.contains(CellEvent::AudioClosed) {
            self.audio_connected = false;
        }
        if events.contains(CellEvent::PowerDown) && self.in_service {
            hfp.send(HfpCommand::Disconnect);
        }
        if events.contains(CellEvent::DialDtmf)
            && let Some(digit) = bus.take_dtmf_digit()
            && self.state == CellState::CallActive
        {
            hfp.send(HfpCommand::Dtmf(digit));
        }
        if self.state == CellState::CallActive {
            if events.contains(CellEvent::MicGainChanged) {
                send_volume(bus, hfp, GainTarget::Mic);
            }
            if events.contains(CellEvent::SpeakerGainChanged) {
                send_volume(bus, hfp, GainTarget::Speaker);
            }
        }
        if events.contains(CellEvent::EnablePairing) {
            if self.in_service {
                hfp.send(HfpCommand::Disconnect);
            }
            hfp.send(HfpCommand::Discoverable(true));
        }
        if events.contains(CellEvent::DisablePairing) {
            hfp.send(HfpCommand::Discoverable(false));
        }
        if events.contains(CellEvent::ForgetPairing) {
            if self.in_service {
                hfp.send(HfpCommand::Disconnect);
            }
            hfp.send(HfpCommand::ForgetPairing);
            self.paired = false;
        }
    }

    fn evaluate<M: RawMutex>(
        &mut self,
        requests: Requests,
        bus: &Bus<M>,
        hfp: &mut impl HfpControl,
        diagnostics: &mut CellDiagnostics,
    ) {
        let next = match self.state {
            CellState::Disconnected => {
                if self.in_service {
                    Some(CellState::ConnectedIdle)
                } else {
                    if self.paired && self.reconnect.tick() {
                        self.reconnect = Countdown::from_millis(self.timing.reconnect_ms, CELL_TICK_MS);
                        if hfp.has_bond() {
                            hfp.send(HfpCommand::Connect);
                            diagnostics.record(CellDiagnostic::Reconnecting);
                        } else {
                            bus.display.raise(DisplayEvent::ForgetPairing);
                            diagnostics.record(CellDiagnostic::BondMissing);
                        }
                    }
                    None
                }
            }
            CellState::ConnectedIdle => {
                if !self.in_service {
                    Some(CellState::Disconnected)
                } else if requests.answer {
                    hfp.send(HfpCommand::Answer);
                    None
                } else if self.in_call() {
                    Some(CellState::CallActive)
                } else if requests.dial_number || requests.dial_assistant {
                    Some(CellState::CallInitiated)
                } else {
                    if requests.hangup {
                        hfp.send(HfpCommand::Hangup);
                    }
                    None
                }
            }
            CellState::CallInitiated => {
                if !self.in_service {
                    Some(CellState::Disconnected)
                } else if self.in_call() {
                    Some(CellState::CallActive)
                } else if requests.hangup {
                    Some(CellState::ConnectedIdle)
                } else {
                    None
                }
            }
            CellState::CallActive => {
                if !self.in_service {
                    Some(CellState::Disconnected)
                } else if !self.in_call() {
                    Some(CellState::ConnectedIdle)
                } else if requests.hangup {
                    Some(CellState::WaitEnd)
                } else {
                    None
                }
            }
            CellState::WaitEnd => {
                if !self.in_service {
                    Some(CellState::Disconnected)
                } else if !self.in_call() {
                    Some(CellState::ConnectedIdle)
                } else {
                    None
                }
            }
        };

        if let Some(to) = next {
            self.enter(to, requests, bus, hfp);
            diagnostics.record(CellDiagnostic::StateChanged {
                from: self.state,
                to,
            });
            self.state = to;
        }
    }

    fn enter<M: RawMutex>(
        &mut self,
        to: CellState,
        requests: Requests,
        bus: &Bus<M>,
        hfp: &mut impl HfpControl,
    ) {
        match to {
            CellState::Disconnected => {
                self.reconnect = Countdown::ticks(1);
                bus.call.raise(CallEvent::OutOfService);
                // Nothing downstream may keep a call the link can no longer carry.
                let had_call = self.in_call();
                self.call = false;
                self.incoming_setup = false;
                self.outgoing_setup = false;
                if had_call {
                    bus.call.raise(CallEvent::CallEnded);
                }
                if self.audio_connected {
                    self.audio_connected = false;
                    bus.call.raise(CallEvent::AudioEnded);
                    bus.pots.raise(PotsEvent::AudioClosed);
                }
            }
            CellState::ConnectedIdle => {
                bus.call.raise(CallEvent::InService);
                bus.call.raise(CallEvent::CallEnded);
                match self.state {
                    CellState::Disconnected => hfp.send(HfpCommand::DisableRemoteEchoCancel),
                    CellState::CallInitiated => {
                        hfp.send(HfpCommand::Hangup);
                        hfp.send(HfpCommand::VoiceRecognition(false));
                    }
                    _ => {}
                }
                self.reconnect = Countdown::ticks(1);
            }
            CellState::CallInitiated => {
                if requests.dial_number {
                    hfp.send(HfpCommand::Dial(bus.outgoing_number()));
                } else if requests.dial_assistant {
                    hfp.send(HfpCommand::VoiceRecognition(true));
                }
            }
            CellState::CallActive => bus.call.raise(CallEvent::CallStarted),
            CellState::WaitEnd => {
                hfp.send(HfpCommand::Hangup);
                hfp.send(HfpCommand::VoiceRecognition(false));
            }
        }
    }
}

fn send_volume<M: RawMutex>(bus: &Bus<M>, hfp: &mut impl HfpControl, target: GainTarget) {
    let level = db_to_bt(target, bus.gain(target));
    hfp.send(HfpCommand::Volume { target, level });
}
