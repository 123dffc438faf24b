//! Analog line signaling.
//!
//! [`PotsLine`] runs every sub-machine of the line once per 10 ms tick:
//! hook debounce, hook state, DTMF listening, ringing, caller-ID sequencing,
//! dial decoding and tone output, in that order. It reads its requests from
//! the bus and reports hook changes and dialed digits back to it.

mod cid;
mod dial;
mod hook;
mod line;
mod ring;
mod tone;

use embassy_sync::blocking_mutex::raw::RawMutex;

pub use cid::{CallerIdSequencer, CidCommand, CidCommands, CidState, MIN_LEAD_IN_MS};
pub use dial::{DialDecoder, DialState};
pub use hook::{HookDebounce, HookMachine, HookState, HookTransition};
pub use line::LineInterface;
pub use ring::{RingGenerator, RingKind, RingState, pulse_ticks};
pub use tone::{DUAL_TONE_ALERT, OnHookAudio, ToneInputs, ToneMachine, ToneOutcome, ToneState};

use crate::audio::{AudioPipeline, AudioSource};
use crate::bus::Bus;
use crate::callerid::{Absence, CallerIdMessage};
use crate::country::{CountryProfile, ToneSource};
use crate::dsp::{DetectedDigits, DtmfDetector, TonePlayer};
use crate::events::{CallEvent, PotsEvent};
use crate::report::Report;
use crate::ticks::POTS_TICK_MS;

/// Line timing constants.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PotsTiming {
    /// On-hook time that ends a call rather than dialing a pulse.
    pub hang_up_ms: u32,
    /// Longest open-loop interval accepted as a rotary break.
    pub break_ms: u32,
    /// Closed-loop interval that ends a rotary digit.
    pub make_ms: u32,
}

impl PotsTiming {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            hang_up_ms: 500,
            break_ms: 100,
            make_ms: 100,
        }
    }
}

impl Default for PotsTiming {
    fn default() -> Self {
        Self::new()
    }
}

/// Conditions worth a log line, reported by [`PotsLine::poll`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PotsDiagnostic {
    /// More than one key was decoded in one tick; the first was kept.
    MultipleDtmf { kept: char, count: usize },
    /// The requested country index does not exist; the default is used.
    CountryClamped { requested: u8 },
    CountryChanged { name: &'static str },
    /// The queue of digits to play on the line was full.
    AppDigitDropped(char),
    /// The country's caller-ID standard cannot express this caller.
    CallerIdSkipped,
}

pub type PotsDiagnostics = Report<PotsDiagnostic, 4>;

pub struct PotsLine<L, D> {
    line: L,
    profile: &'static CountryProfile,
    debounce: HookDebounce,
    hook: HookMachine,
    dialer: DialDecoder,
    ring: RingGenerator,
    caller_id: CallerIdSequencer,
    tones: ToneMachine<D>,
    in_service: bool,
    call_audio: Option<AudioSource>,
    ring_muted: bool,
    ring_count: u8,
    caller_id_started: bool,
}

impl<L: LineInterface, D: DtmfDetector> PotsLine<L, D> {
    /// Builds the line for `country`. The second value reports a clamped index.
    pub fn new(
        mut line: L,
        detector: D,
        country: u8,
        timing: PotsTiming,
    ) -> (Self, Option<PotsDiagnostic>) {
        let (profile, clamped) = CountryProfile::lookup(country);
        line.set_ring_mode(false);
        line.set_forward(true);
        let pots = Self {
            line,
            profile,
            debounce: HookDebounce::new(),
            hook: HookMachine::new(timing.hang_up_ms / POTS_TICK_MS),
            dialer: DialDecoder::new(timing.break_ms / POTS_TICK_MS, timing.make_ms / POTS_TICK_MS),
            ring: RingGenerator::new(profile.ring),
            caller_id: CallerIdSequencer::new(),
            tones: ToneMachine::new(profile, detector),
            in_service: false,
            call_audio: None,
            ring_muted: false,
            ring_count: 0,
            caller_id_started: false,
        };
        let diagnostic = clamped.then_some(PotsDiagnostic::CountryClamped { requested: country });
        (pots, diagnostic)
    }

    #[must_use]
    pub fn profile(&self) -> &'static CountryProfile {
        self.profile
    }

    #[must_use]
    pub fn hook_state(&self) -> HookState {
        self.hook.state()
    }

    #[must_use]
    pub fn tone_state(&self) -> ToneState {
        self.tones.state()
    }

    #[must_use]
    pub fn ring_state(&self) -> RingState {
        self.ring.state()
    }

    #[must_use]
    pub fn caller_id_state(&self) -> CidState {
        self.caller_id.state()
    }

    #[must_use]
    pub fn dial_state(&self) -> DialState {
        self.dialer.state()
    }

    /// Completed ring cadences since the ring sequence started.
    #[must_use]
    pub fn ring_count(&self) -> u8 {
        self.ring_count
    }

    #[must_use]
    pub fn is_ring_muted(&self) -> bool {
        self.ring_muted
    }

    #[must_use]
    pub fn line(&self) -> &L {
        &self.line
    }

    pub fn line_mut(&mut self) -> &mut L {
        &mut self.line
    }

    /// Runs one 10 ms tick.
    pub fn poll<M: RawMutex>(&mut self, bus: &Bus<M>, pipeline: &AudioPipeline<M>) -> PotsDiagnostics {
        let mut diagnostics = PotsDiagnostics::new();
        let ring_request = self.handle_requests(bus, pipeline, &mut diagnostics);

        let change = self.debounce.sample(self.line.hook_is_off());
        match self.hook.update(change) {
            Some(HookTransition::WentOffHook) => {
                self.end_ring_sequence(pipeline);
                bus.call.raise(CallEvent::OffHook);
            }
            Some(HookTransition::WentOnHook) => bus.call.raise(CallEvent::OnHook),
            None => {}
        }
        let hook = self.hook.state();

        let mut heard = DetectedDigits::new();
        self.tones.listen(pipeline, &mut heard);
        if let Some(&kept) = heard.first() {
            if heard.len() > 1 {
                diagnostics.record(PotsDiagnostic::MultipleDtmf {
                    kept,
                    count: heard.total(),
                });
            }
            self.dialer.offer_dtmf(kept);
        }

        self.run_ringer(hook, ring_request, bus, pipeline, &mut diagnostics);

        let digit = self.dialer.update(hook, change, self.profile);
        if let Some(digit) = digit {
            bus.post_pots_digit(digit);
        }

        let inputs = ToneInputs {
            off_hook: hook == HookState::OffHook,
            on_hook: hook == HookState::OnHook,
            in_service: self.in_service,
            call_audio: self.call_audio,
            line_digit: digit.is_some(),
        };
        let previous = self.tones.state();
        match self.tones.update(inputs, pipeline) {
            Some(ToneOutcome::OnHookAudioDone) => self.caller_id.audio_done(),
            Some(ToneOutcome::OnHookAudioAborted) => {
                let commands = self.caller_id.abort();
                self.apply(commands, bus, pipeline, &mut diagnostics);
            }
            None => {}
        }
        if previous != ToneState::Dial && self.tones.state() == ToneState::Dial {
            // A fresh dial tone starts a fresh dialing session.
            self.dialer.clear_dtmf();
        }
        diagnostics
    }

    fn handle_requests<M: RawMutex>(
        &mut self,
        bus: &Bus<M>,
        pipeline: &AudioPipeline<M>,
        diagnostics: &mut PotsDiagnostics,
    ) -> bool {
        let events = bus.pots.take();
        let mut ring_request = false;
        for event in events.iter() {
            match event {
                PotsEvent::InService => self.in_service = true,
                PotsEvent::OutOfService => self.in_service = false,
                PotsEvent::Audio8k => self.call_audio = Some(AudioSource::Voice8k),
                PotsEvent::Audio16k => self.call_audio = Some(AudioSource::Voice16k),
                PotsEvent::AudioClosed => self.call_audio = None,
                PotsEvent::MuteRing => self.ring_muted = true,
                PotsEvent::UnmuteRing => self.ring_muted = false,
                PotsEvent::Ring => ring_request = true,
                PotsEvent::DoneRinging => self.end_ring_sequence(pipeline),
                PotsEvent::AppDigit => {
                    if let Some(digit) = bus.take_app_digit()
                        && !self.tones.queue_app_digit(digit)
                    {
                        diagnostics.record(PotsDiagnostic::AppDigitDropped(digit));
                    }
                }
                PotsEvent::CountryChanged => self.select_country(bus.country(), diagnostics),
            }
        }
        ring_request && !self.ring_muted
    }

    fn select_country(&mut self, index: u8, diagnostics: &mut PotsDiagnostics) {
        let (profile, clamped) = CountryProfile::lookup(index);
        if clamped {
            diagnostics.record(PotsDiagnostic::CountryClamped { requested: index });
        }
        self.profile = profile;
        self.tones.load_country(profile);
        self.ring.set_cadence(profile.ring);
        diagnostics.record(PotsDiagnostic::CountryChanged { name: profile.name });
    }

    fn run_ringer<M: RawMutex>(
        &mut self,
        hook: HookState,
        ring_request: bool,
        bus: &Bus<M>,
        pipeline: &AudioPipeline<M>,
        diagnostics: &mut PotsDiagnostics,
    ) {
        if hook == HookState::OffHook {
            self.ring.abort(&mut self.line);
        }

        match self.ring.update(&mut self.line) {
            Some(RingKind::Cadence) => {
                self.ring_count = self.ring_count.saturating_add(1);
                let spec = self.profile.caller_id;
                if spec.is_enabled() && !spec.before_ring() && !self.caller_id_started {
                    self.caller_id_started = true;
                    self.caller_id.start_after_ring(spec);
                }
            }
            Some(RingKind::Alert { .. }) => self.caller_id.alert_ring_done(),
            None => {}
        }

        let line_free = hook == HookState::OnHook
            && self.ring.is_idle()
            && !self.caller_id.blocks_ringing()
            && self.tones.state() == ToneState::Idle;
        if ring_request && line_free {
            let spec = self.profile.caller_id;
            if spec.is_enabled() && spec.before_ring() && !self.caller_id_started {
                self.caller_id_started = true;
                let commands = self.caller_id.start_before_ring(spec);
                self.apply(commands, bus, pipeline, diagnostics);
            } else {
                self.ring.start(RingKind::Cadence, &mut self.line);
            }
        }

        let commands = self.caller_id.update();
        self.apply(commands, bus, pipeline, diagnostics);
    }

    fn apply<M: RawMutex>(
        &mut self,
        commands: CidCommands,
        bus: &Bus<M>,
        pipeline: &AudioPipeline<M>,
        diagnostics: &mut PotsDiagnostics,
    ) {
        for command in commands {
            match command {
                CidCommand::SetForward(forward) => {
                    self.ring.set_idle_polarity(forward, &mut self.line);
                }
                CidCommand::AlertRing { duration_ms } => {
                    self.ring.start(RingKind::Alert { duration_ms }, &mut self.line);
                }
                CidCommand::PlayAlertTone => {
                    let alert = TonePlayer::new(ToneSource::Synth(DUAL_TONE_ALERT));
                    if !self.tones.play_on_hook(OnHookAudio::Alert(alert), pipeline) {
                        self.caller_id.audio_done();
                    }
                }
                CidCommand::SendMessage => {
                    let number = bus.caller_number();
                    // An empty number means the network withheld it.
                    let absence = match &number {
                        Some(digits) if digits.is_empty() => Absence::Private,
                        _ => Absence::Unavailable,
                    };
                    let message = CallerIdMessage::build(
                        &self.profile.caller_id,
                        number.as_deref(),
                        absence,
                        bus.caller_id_time(),
                    );
                    let started = message.is_some_and(|message| {
                        self.tones
                            .play_on_hook(OnHookAudio::Message(message.transmitter()), pipeline)
                    });
                    if !started {
                        diagnostics.record(PotsDiagnostic::CallerIdSkipped);
                        self.caller_id.audio_done();
                    }
                }
                CidCommand::ReleaseRing { ring_now } => {
                    if ring_now && self.hook.state() == HookState::OnHook && !self.ring_muted {
                        self.ring.start(RingKind::Cadence, &mut self.line);
                    }
                }
            }
        }
    }

    /// Off-hook or the end of an unanswered call: stop ringing and
    /// forget the caller-ID progress so the next call starts over.
    fn end_ring_sequence<M: RawMutex>(&mut self, pipeline: &AudioPipeline<M>) {
        self.ring.abort(&mut self.line);
        for command in self.caller_id.abort() {
            if let CidCommand::SetForward(forward) = command {
                self.ring.set_idle_polarity(forward, &mut self.line);
            }
        }
        if self.hook.state() == HookState::OnHook {
            self.tones.stop_on_hook(pipeline);
        }
        self.ring_count = 0;
        self.caller_id_started = false;
    }
}
