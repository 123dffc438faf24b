//! What the line hears: call-progress tones, local DTMF feedback, caller-ID
//! audio or the voice path, and when the DTMF receiver may listen.

use heapless::Deque;

use crate::audio::{AudioPipeline, AudioSource, FRAME_SAMPLES};
use crate::callerid::CallerIdTransmitter;
use crate::country::{CountryProfile, ToneDescriptor, ToneSource};
use crate::dsp::{
    DTMF_FLUSH_MS, DetectedDigits, DtmfDetector, DtmfSender, DtmfTiming, SampleSource, TonePlayer,
};
use crate::ticks::{Countdown, POTS_TICK_MS};
use embassy_sync::blocking_mutex::raw::RawMutex;

/// Dual-tone alerting signal sent ahead of some caller-ID messages.
pub const DUAL_TONE_ALERT: ToneDescriptor =
    ToneDescriptor::cadenced([2130, 2750, 0, 0], -13, &[(100, 0)]).once();

const APP_DIGIT_QUEUE: usize = 16;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ToneState {
    Idle,
    Voice,
    VoiceWaitHangup,
    Dial,
    DialQuiet,
    Dtmf,
    DtmfFlush,
    NoService,
    OffHookAlarm,
    CallerIdPlaying,
    CallerIdFlush,
}

impl ToneState {
    /// The DTMF receiver only listens while the user may be dialing.
    #[must_use]
    pub const fn listens_for_dtmf(self) -> bool {
        matches!(self, Self::Dial | Self::DialQuiet)
    }

    /// States in which the tone path owns the line audio.
    #[must_use]
    pub const fn uses_tone_path(self) -> bool {
        !matches!(self, Self::Idle | Self::Voice | Self::VoiceWaitHangup)
    }
}

/// Audio played to an on-hook line for caller ID.
#[derive(Clone, Debug)]
pub enum OnHookAudio {
    Alert(TonePlayer),
    Message(CallerIdTransmitter),
}

impl SampleSource for OnHookAudio {
    fn fill(&mut self, out: &mut [i16]) -> usize {
        match self {
            Self::Alert(player) => player.fill(out),
            Self::Message(transmitter) => transmitter.fill(out),
        }
    }
}

/// Per-tick view of the rest of the POTS side.
#[derive(Copy, Clone, Debug)]
pub struct ToneInputs {
    pub off_hook: bool,
    pub on_hook: bool,
    pub in_service: bool,
    /// Voice rate while the handset has routed call audio to the line.
    pub call_audio: Option<AudioSource>,
    /// A digit was dialed on the line this tick.
    pub line_digit: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ToneOutcome {
    /// Caller-ID audio and its flush have finished.
    OnHookAudioDone,
    /// Caller-ID audio was cut short by the phone going off-hook.
    OnHookAudioAborted,
}

pub struct ToneMachine<D> {
    state: ToneState,
    dial: TonePlayer,
    reorder: TonePlayer,
    off_hook: TonePlayer,
    dtmf: DtmfSender,
    on_hook_audio: Option<OnHookAudio>,
    app_digits: Deque<char, APP_DIGIT_QUEUE>,
    detector: D,
    idle_timer: Countdown,
    flush: Countdown,
    off_hook_timeout_ms: u32,
    voice_rate: AudioSource,
    scratch: [i16; FRAME_SAMPLES],
}

impl<D: DtmfDetector> ToneMachine<D> {
    #[must_use]
    pub fn new(profile: &CountryProfile, detector: D) -> Self {
        Self {
            state: ToneState::Idle,
            dial: TonePlayer::new(profile.tones.dial),
            reorder: TonePlayer::new(profile.tones.reorder),
            off_hook: TonePlayer::new(profile.tones.off_hook),
            dtmf: DtmfSender::new(DtmfTiming::KEYPAD),
            on_hook_audio: None,
            app_digits: Deque::new(),
            detector,
            idle_timer: Countdown::expired(),
            flush: Countdown::expired(),
            off_hook_timeout_ms: profile.off_hook_timeout_ms,
            voice_rate: AudioSource::Voice8k,
            scratch: [0; FRAME_SAMPLES],
        }
    }

    #[must_use]
    pub const fn state(&self) -> ToneState {
        self.state
    }

    /// Reloads the country tones. Each player restarts, so a tone that is
    /// playing continues with the new country's cadence from its start.
    pub fn load_country(&mut self, profile: &CountryProfile) {
        self.dial.load(profile.tones.dial);
        self.reorder.load(profile.tones.reorder);
        self.off_hook.load(profile.tones.off_hook);
        self.off_hook_timeout_ms = profile.off_hook_timeout_ms;
    }

    /// Queues a digit dialed on the phone's behalf; it is played as a DTMF
    /// burst once the line is ready. Returns `false` when the queue is full.
    pub fn queue_app_digit(&mut self, digit: char) -> bool {
        self.app_digits.push_back(digit).is_ok()
    }

    #[must_use]
    pub fn pending_app_digits(&self) -> usize {
        self.app_digits.len()
    }

    /// Starts caller-ID audio on an idle, on-hook line.
    /// Returns `false` if the line is busy with something else.
    pub fn play_on_hook<M: RawMutex>(
        &mut self,
        audio: OnHookAudio,
        pipeline: &AudioPipeline<M>,
    ) -> bool {
        if !matches!(self.state, ToneState::Idle | ToneState::CallerIdFlush) {
            return false;
        }
        self.on_hook_audio = Some(audio);
        self.enter(ToneState::CallerIdPlaying, pipeline);
        true
    }

    /// Cuts caller-ID audio short on an on-hook line.
    pub fn stop_on_hook<M: RawMutex>(&mut self, pipeline: &AudioPipeline<M>) {
        if matches!(self.state, ToneState::CallerIdPlaying | ToneState::CallerIdFlush) {
            self.on_hook_audio = None;
            self.enter(ToneState::Idle, pipeline);
        }
    }

    /// Drains received line audio, feeding the DTMF receiver when it is armed.
    pub fn listen<M: RawMutex>(&mut self, pipeline: &AudioPipeline<M>, digits: &mut DetectedDigits) {
        if !self.state.uses_tone_path() {
            return;
        }
        loop {
            let count = pipeline.get_rx_tone(&mut self.scratch);
            if count == 0 {
                break;
            }
            if self.state.listens_for_dtmf() {
                self.detector.feed(&self.scratch[..count], digits);
            }
        }
    }

    /// Advances one tick.
    pub fn update<M: RawMutex>(
        &mut self,
        inputs: ToneInputs,
        pipeline: &AudioPipeline<M>,
    ) -> Option<ToneOutcome> {
        let audio = inputs.call_audio;
        match self.state {
            ToneState::Idle => {
                if inputs.off_hook {
                    if let Some(rate) = audio {
                        self.voice_rate = rate;
                        self.enter(ToneState::Voice, pipeline);
                    } else if inputs.in_service {
                        self.enter(ToneState::Dial, pipeline);
                    } else {
                        self.enter(ToneState::NoService, pipeline);
                    }
                }
            }
            ToneState::Voice => match audio {
                None if inputs.off_hook => self.enter(ToneState::VoiceWaitHangup, pipeline),
                _ if inputs.on_hook => self.enter(ToneState::Idle, pipeline),
                Some(rate) if rate != self.voice_rate => {
                    self.voice_rate = rate;
                    self.enter(ToneState::Voice, pipeline);
                }
                _ => {}
            },
            ToneState::VoiceWaitHangup => {
                if inputs.on_hook {
                    self.enter(ToneState::Idle, pipeline);
                } else if let Some(rate) = audio {
                    self.voice_rate = rate;
                    self.enter(ToneState::Voice, pipeline);
                } else if self.idle_expired() {
                    self.enter(ToneState::OffHookAlarm, pipeline);
                }
            }
            ToneState::Dial => {
                if !inputs.in_service {
                    self.enter(ToneState::NoService, pipeline);
                } else if inputs.on_hook || inputs.line_digit {
                    self.enter(ToneState::DialQuiet, pipeline);
                } else if inputs.off_hook && !self.app_digits.is_empty() {
                    self.enter(ToneState::Dtmf, pipeline);
                } else if let Some(rate) = audio {
                    self.voice_rate = rate;
                    self.enter(ToneState::Voice, pipeline);
                } else if self.idle_expired() {
                    self.enter(ToneState::OffHookAlarm, pipeline);
                } else {
                    feed(&mut self.dial, &mut self.scratch, pipeline);
                }
            }
            ToneState::DialQuiet => {
                if let Some(rate) = audio {
                    self.voice_rate = rate;
                    self.enter(ToneState::Voice, pipeline);
                } else if inputs.on_hook {
                    self.enter(ToneState::Idle, pipeline);
                } else if inputs.off_hook && !self.app_digits.is_empty() {
                    self.enter(ToneState::Dtmf, pipeline);
                } else if self.idle_expired() {
                    self.enter(ToneState::OffHookAlarm, pipeline);
                }
            }
            ToneState::Dtmf => {
                if let Some(rate) = audio {
                    self.voice_rate = rate;
                    self.enter(ToneState::Voice, pipeline);
                } else if inputs.on_hook {
                    self.enter(ToneState::Idle, pipeline);
                } else if self.idle_expired() {
                    self.enter(ToneState::OffHookAlarm, pipeline);
                } else if !feed(&mut self.dtmf, &mut self.scratch, pipeline) {
                    self.enter(ToneState::DtmfFlush, pipeline);
                }
            }
            ToneState::DtmfFlush => {
                if let Some(rate) = audio {
                    self.voice_rate = rate;
                    self.enter(ToneState::Voice, pipeline);
                } else if inputs.on_hook {
                    self.enter(ToneState::Idle, pipeline);
                } else if self.flush.tick() {
                    if inputs.off_hook && !self.app_digits.is_empty() {
                        self.enter(ToneState::Dtmf, pipeline);
                    } else {
                        self.enter(ToneState::DialQuiet, pipeline);
                    }
                }
            }
            ToneState::NoService => {
                if inputs.in_service {
                    self.enter(ToneState::Dial, pipeline);
                } else if inputs.on_hook {
                    self.enter(ToneState::Idle, pipeline);
                } else {
                    feed(&mut self.reorder, &mut self.scratch, pipeline);
                }
            }
            ToneState::OffHookAlarm => {
                if inputs.on_hook {
                    self.enter(ToneState::Idle, pipeline);
                } else {
                    feed(&mut self.off_hook, &mut self.scratch, pipeline);
                }
            }
            ToneState::CallerIdPlaying => {
                if inputs.off_hook {
                    self.on_hook_audio = None;
                    self.enter(ToneState::Idle, pipeline);
                    return Some(ToneOutcome::OnHookAudioAborted);
                }
                let playing = match self.on_hook_audio.as_mut() {
                    Some(source) => feed(source, &mut self.scratch, pipeline),
                    None => false,
                };
                if !playing {
                    self.on_hook_audio = None;
                    self.enter(ToneState::CallerIdFlush, pipeline);
                }
            }
            ToneState::CallerIdFlush => {
                if inputs.off_hook {
                    self.enter(ToneState::Idle, pipeline);
                    return Some(ToneOutcome::OnHookAudioAborted);
                }
                if self.flush.tick() {
                    self.enter(ToneState::Idle, pipeline);
                    return Some(ToneOutcome::OnHookAudioDone);
                }
            }
        }
        None
    }

    fn idle_expired(&mut self) -> bool {
        self.off_hook_timeout_ms != 0 && self.idle_timer.tick()
    }

    fn reset_idle_timer(&mut self) {
        self.idle_timer = Countdown::from_millis(self.off_hook_timeout_ms, POTS_TICK_MS);
    }

    fn enter<M: RawMutex>(&mut self, next: ToneState, pipeline: &AudioPipeline<M>) {
        self.state = next;
        match next {
            ToneState::Idle => pipeline.select_source(AudioSource::Disabled),
            ToneState::Voice => pipeline.select_source(self.voice_rate),
            ToneState::VoiceWaitHangup => {
                pipeline.select_source(AudioSource::Disabled);
                self.reset_idle_timer();
            }
            ToneState::Dial => {
                self.dial.restart();
                pipeline.select_source(AudioSource::Tone);
                self.detector.reset();
                self.dtmf.clear();
                self.reset_idle_timer();
            }
            ToneState::DialQuiet => self.reset_idle_timer(),
            ToneState::Dtmf => {
                if let Some(digit) = self.app_digits.pop_front() {
                    self.dtmf.push(digit);
                }
                pipeline.select_source(AudioSource::Tone);
                self.reset_idle_timer();
            }
            ToneState::DtmfFlush | ToneState::CallerIdFlush => {
                self.flush = Countdown::from_millis(DTMF_FLUSH_MS, POTS_TICK_MS);
            }
            ToneState::NoService => {
                self.reorder.restart();
                pipeline.select_source(AudioSource::Tone);
            }
            ToneState::OffHookAlarm => {
                self.off_hook.restart();
                pipeline.select_source(AudioSource::Tone);
            }
            ToneState::CallerIdPlaying => pipeline.select_source(AudioSource::Tone),
        }
    }

    /// Drops digits still waiting to be played.
    pub fn clear_app_digits(&mut self) {
        self.app_digits.clear();
    }
}

/// Keeps about one frame of tone queued ahead of the codec.
/// Returns `false` once the source has nothing more to play.
fn feed<M: RawMutex>(
    source: &mut impl SampleSource,
    scratch: &mut [i16; FRAME_SAMPLES],
    pipeline: &AudioPipeline<M>,
) -> bool {
    while pipeline.tx_count() <= FRAME_SAMPLES {
        let produced = source.fill(scratch);
        if produced == 0 {
            return false;
        }
        pipeline.put_tx_tone(&scratch[..produced]);
    }
    true
}
