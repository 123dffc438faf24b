use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::mem;
use std::path::Path;
use std::time::Duration;

use bridge_core::audio::{
    AudioConfig, AudioEngine, AudioError, AudioPipeline, AudioPort, AudioStats, ECHO_TAIL_SAMPLES, FRAME_SAMPLES,
};
use bridge_core::bus::Bus;
use bridge_core::callerid::CallerNumber;
use bridge_core::cellular::{
    CellDiagnostic, CellularLink, CellularTiming, HfpCommand, HfpControl, HfpIndication,
    dispatch_indication, format_command,
};
use bridge_core::console::{AudioLink, ConsoleCommand, HELP, UiCommand, parse_command};
use bridge_core::country::COUNTRIES;
use bridge_core::dsp::{DtmfSender, DtmfTiming, GoertzelDetector, NlmsCanceller, SampleSource};
use bridge_core::events::{CallEvent, DisplayEvent};
use bridge_core::gain::{CodecControl, GainTarget};
use bridge_core::orchestrator::{CallDiagnostic, CallOrchestrator, CallTiming};
use bridge_core::pots::{HookState, LineInterface, PotsDiagnostic, PotsLine, PotsTiming};
use bridge_core::settings::{DeviceName, MemorySettings, PairedDevice, Settings};
use bridge_core::telemetry::{TelemetryEventKind, TelemetryInstant, TelemetryRecorder};
use bridge_core::ticks::{CALL_TICK_MS, CELL_TICK_MS, POTS_TICK_MS};
use embassy_futures::block_on;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

/// Time given to every stimulus: long enough for the orchestrator and then
/// the cellular link to poll at least once each.
const SETTLE_MS: u32 = CALL_TICK_MS + CELL_TICK_MS;
const ROTARY_BREAK_MS: u32 = 60;
const ROTARY_MAKE_MS: u32 = 40;
const INTER_DIGIT_MS: u32 = 300;
/// Keypad burst plus enough silence for the detector to let go.
const DTMF_KEY_MS: u32 = 150;
/// Ticks between audio counter checks.
const STATS_TICKS: u64 = 100;
const STATUS_RECORDS: usize = 8;
const MAX_REMOTE_LEVEL: u8 = 15;

const HANDSET_ADDRESS: [u8; 6] = [0x02, 0x00, 0x5e, 0x10, 0x00, 0x01];
const HANDSET_NAME: &str = "emulated handset";

type HostBus = Bus<CriticalSectionRawMutex>;
type HostPipeline = AudioPipeline<CriticalSectionRawMutex>;

/// Simulated time since power-up.
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub struct SimInstant(u64);

impl SimInstant {
    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0
    }
}

impl TelemetryInstant for SimInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

/// Reply to one console line.
#[derive(Debug, Default)]
pub struct Response {
    pub lines: Vec<String>,
    pub quit: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(self) -> &'static str {
        match self {
            TranscriptRole::Host => ">",
            TranscriptRole::Emulator => "<",
        }
    }
}

/// Line card driven by the console.
#[derive(Debug)]
struct SimLine {
    off_hook: bool,
    ring_mode: bool,
    forward: bool,
}

impl LineInterface for SimLine {
    fn hook_is_off(&mut self) -> bool {
        self.off_hook
    }

    fn set_ring_mode(&mut self, enabled: bool) {
        self.ring_mode = enabled;
    }

    fn set_forward(&mut self, forward: bool) {
        self.forward = forward;
    }
}

/// Radio co-processor that only records what it was asked to send.
#[derive(Debug)]
struct SimRadio {
    sent: Vec<HfpCommand>,
    bonded: bool,
}

impl HfpControl for SimRadio {
    fn send(&mut self, command: HfpCommand) {
        self.sent.push(command);
    }

    fn has_bond(&mut self) -> bool {
        self.bonded
    }
}

#[derive(Debug, Default)]
struct SimCodec {
    mic: Option<u8>,
    speaker: Option<u8>,
    writes: Vec<(GainTarget, u8)>,
}

impl CodecControl for SimCodec {
    fn set_level(&mut self, target: GainTarget, level: u8) -> bool {
        match target {
            GainTarget::Mic => self.mic = Some(level),
            GainTarget::Speaker => self.speaker = Some(level),
        }
        self.writes.push((target, level));
        true
    }
}

/// Codec transport. Keypad tones typed at the console arrive on the
/// receive side; the transmit side is only measured.
struct SimPort {
    keys: DtmfSender,
    tx_peak: i16,
}

impl AudioPort for SimPort {
    async fn exchange(&mut self, tx: &[i16], rx: &mut [i16]) -> Result<(), AudioError> {
        self.tx_peak = tx.iter().map(|sample| sample.saturating_abs()).max().unwrap_or(0);
        let mut line = [0i16; FRAME_SAMPLES];
        let count = (rx.len() / 2).min(FRAME_SAMPLES);
        let produced = self.keys.fill(&mut line[..count]);
        line[produced..count].fill(0);
        for (pair, &sample) in rx.chunks_exact_mut(2).zip(line.iter()) {
            pair[0] = sample;
            pair[1] = sample;
        }
        Ok(())
    }
}

/// The whole bridge running on simulated time.
pub struct Session {
    bus: HostBus,
    pipeline: HostPipeline,
    pots: PotsLine<SimLine, GoertzelDetector>,
    link: CellularLink,
    call: CallOrchestrator,
    engine: AudioEngine<NlmsCanceller<ECHO_TAIL_SAMPLES>>,
    radio: SimRadio,
    codec: SimCodec,
    port: SimPort,
    store: MemorySettings,
    settings: Settings,
    telemetry: TelemetryRecorder<SimInstant>,
    transcript: Option<TranscriptLogger>,
    audio_stats: AudioStats,
    startup: Option<PotsDiagnostic>,
    dial_len: usize,
    output: Vec<String>,
    elapsed_ms: u64,
    ticks: u64,
}

impl Session {
    /// Powers up the bridge for `country` with a bonded handset in range.
    ///
    /// # Errors
    ///
    /// Fails when the transcript file cannot be created or the initial
    /// settings cannot be stored.
    pub fn new(country: u8, transcript: Option<&Path>) -> io::Result<Self> {
        let mut store = MemorySettings::new();
        let mut name = DeviceName::new();
        let _ = name.push_str(HANDSET_NAME);
        let mut seeded = Settings::new();
        seeded.paired = Some(PairedDevice {
            address: HANDSET_ADDRESS,
            name,
        });
        seeded.country = country;
        seeded
            .save(&mut store)
            .map_err(|err| io::Error::other(err.to_string()))?;

        let settings = Settings::load(&store);
        let bus = HostBus::new();
        for target in [GainTarget::Mic, GainTarget::Speaker] {
            bus.set_gain(target, settings.gain(target));
        }
        let line = SimLine {
            off_hook: false,
            ring_mode: false,
            forward: true,
        };
        let (pots, startup) = PotsLine::new(line, GoertzelDetector::new(), country, PotsTiming::new());
        let transcript = transcript.map(TranscriptLogger::create).transpose()?;
        let pipeline = HostPipeline::new();
        let audio_stats = pipeline.stats();

        Ok(Self {
            bus,
            pipeline,
            pots,
            link: CellularLink::new(CellularTiming::new(), settings.paired.is_some()),
            call: CallOrchestrator::new(CallTiming::new()),
            engine: AudioEngine::new(NlmsCanceller::new(), AudioConfig::new()),
            radio: SimRadio {
                sent: Vec::new(),
                bonded: true,
            },
            codec: SimCodec::default(),
            port: SimPort {
                keys: DtmfSender::new(DtmfTiming::KEYPAD),
                tx_peak: 0,
            },
            store,
            settings,
            telemetry: TelemetryRecorder::new(),
            transcript,
            audio_stats,
            startup,
            dial_len: 0,
            output: Vec::new(),
            elapsed_ms: 0,
            ticks: 0,
        })
    }

    /// Restores the codec gains and reports the selected country.
    ///
    /// # Errors
    ///
    /// Fails when the transcript cannot be written.
    pub fn start(&mut self) -> io::Result<Response> {
        if let Some(diagnostic) = self.startup.take() {
            self.report_pots(&[diagnostic]);
        }
        self.reply(format!("country {}", self.pots.profile().name));
        for diagnostic in self.call.restore_gains(&self.bus, &mut self.codec) {
            self.report_call(diagnostic);
        }
        self.report_codec();
        self.finish(false)
    }

    /// Parses and applies one console line.
    ///
    /// # Errors
    ///
    /// Fails when the transcript cannot be written.
    pub fn handle_command(&mut self, line: &str) -> io::Result<Response> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Response::default());
        }
        if let Some(transcript) = &mut self.transcript {
            transcript.append_line(self.elapsed_ms, TranscriptRole::Host, trimmed)?;
        }
        match parse_command(trimmed) {
            Ok(command) => {
                let quit = command == ConsoleCommand::Exit;
                self.apply(command);
                self.finish(quit)
            }
            Err(err) => {
                self.reply(format!("ERR {err}"));
                self.finish(false)
            }
        }
    }

    fn finish(&mut self, quit: bool) -> io::Result<Response> {
        let lines = mem::take(&mut self.output);
        if let Some(transcript) = &mut self.transcript {
            for line in &lines {
                transcript.append_line(self.elapsed_ms, TranscriptRole::Emulator, line)?;
            }
        }
        Ok(Response { lines, quit })
    }

    fn reply(&mut self, line: String) {
        self.output.push(line);
    }

    fn event(&mut self, line: String) {
        let line = format!("[{:>7} ms] {line}", self.elapsed_ms);
        self.output.push(line);
    }

    fn now(&self) -> SimInstant {
        SimInstant(self.elapsed_ms)
    }

    fn apply(&mut self, command: ConsoleCommand) {
        match command {
            ConsoleCommand::Help => {
                for line in HELP.lines() {
                    self.reply(line.to_owned());
                }
            }
            ConsoleCommand::Status => self.report_status(),
            ConsoleCommand::Tick(millis) => {
                self.run_ms(millis);
                self.reply(format!("OK t={}ms", self.elapsed_ms));
            }
            ConsoleCommand::Hook { off_hook } => {
                self.pots.line_mut().off_hook = off_hook;
                self.run_ms(SETTLE_MS);
            }
            ConsoleCommand::Rotary(digit) => self.dial_rotary(digit),
            ConsoleCommand::Dtmf(digit) => self.dial_dtmf(digit),
            ConsoleCommand::Ui(ui) => {
                match ui {
                    UiCommand::Digit(digit) => self.bus.post_ui_digit(digit),
                    UiCommand::Dial => self.bus.call.raise(CallEvent::UiDial),
                    UiCommand::Delete => self.bus.call.raise(CallEvent::UiDelete),
                }
                self.run_ms(SETTLE_MS);
            }
            ConsoleCommand::Ring => self.indicate(HfpIndication::Ring),
            ConsoleCommand::Clip(number) => {
                // An empty number is how the radio reports a withheld caller.
                self.indicate(HfpIndication::CallerNumber(number.unwrap_or_else(CallerNumber::new)));
            }
            ConsoleCommand::Slc(true) => self.indicate(HfpIndication::SlcConnected),
            ConsoleCommand::Slc(false) => self.indicate(HfpIndication::SlcDisconnected),
            ConsoleCommand::CallSetup(setup) => self.indicate(HfpIndication::CallSetup(setup)),
            ConsoleCommand::Audio(AudioLink::Narrowband) => {
                self.indicate(HfpIndication::AudioOpened { wideband: false });
            }
            ConsoleCommand::Audio(AudioLink::Wideband) => {
                self.indicate(HfpIndication::AudioOpened { wideband: true });
            }
            ConsoleCommand::Audio(AudioLink::Closed) => self.indicate(HfpIndication::AudioClosed),
            ConsoleCommand::Gain { target, db } => self.change_gain(target, db),
            ConsoleCommand::Remote { target, level } => {
                if level > MAX_REMOTE_LEVEL {
                    self.reply(format!("ERR handset volume {level} is above {MAX_REMOTE_LEVEL}"));
                } else {
                    self.indicate(HfpIndication::Volume { target, level });
                }
            }
            ConsoleCommand::Country(index) => self.change_country(index),
            ConsoleCommand::MuteRing(muted) => {
                self.bus.call.raise(if muted {
                    CallEvent::RingMute
                } else {
                    CallEvent::RingUnmute
                });
                self.run_ms(SETTLE_MS);
            }
            ConsoleCommand::Exit => self.reply("Session closed.".to_owned()),
        }
    }

    fn indicate(&mut self, indication: HfpIndication) {
        if !dispatch_indication(&self.bus, indication) {
            self.reply("radio: indication ignored".to_owned());
        }
        self.run_ms(SETTLE_MS);
    }

    fn dial_rotary(&mut self, digit: char) {
        if !self.pots.line().off_hook {
            self.reply("ERR lift the handset before dialing".to_owned());
            return;
        }
        let Some(index) = self.pots.profile().rotary_map.iter().position(|&mapped| mapped == digit) else {
            self.reply(format!("ERR {digit} cannot be dialed by pulses"));
            return;
        };
        let pulses = index + 1;
        for _ in 0..pulses {
            self.pots.line_mut().off_hook = false;
            self.run_ms(ROTARY_BREAK_MS);
            self.pots.line_mut().off_hook = true;
            self.run_ms(ROTARY_MAKE_MS);
        }
        self.run_ms(INTER_DIGIT_MS);
        self.reply(format!("OK {digit} sent as {pulses} pulses"));
    }

    fn dial_dtmf(&mut self, digit: char) {
        if !self.pots.line().off_hook {
            self.reply("ERR lift the handset before dialing".to_owned());
            return;
        }
        if !self.port.keys.push(digit) {
            self.reply("ERR keypad busy".to_owned());
            return;
        }
        self.run_ms(DTMF_KEY_MS);
    }

    fn change_gain(&mut self, target: GainTarget, db: f32) {
        self.bus.post_ui_gain(target, db);
        self.run_ms(SETTLE_MS);
        let applied = self.bus.gain(target);
        match target {
            GainTarget::Mic => self.settings.mic_db = applied,
            GainTarget::Speaker => self.settings.speaker_db = applied,
        }
        self.save_settings();
    }

    fn change_country(&mut self, index: u8) {
        self.bus.post_country(index);
        self.run_ms(SETTLE_MS);
        if usize::from(index) < COUNTRIES.len() {
            self.settings.country = index;
            self.save_settings();
        }
    }

    fn save_settings(&mut self) {
        match self.settings.save(&mut self.store) {
            Ok(()) => self.reply(format!("settings saved ({} commits)", self.store.commit_count())),
            Err(err) => self.reply(format!("ERR settings: {err}")),
        }
    }

    fn run_ms(&mut self, millis: u32) {
        for _ in 0..millis / POTS_TICK_MS {
            self.tick();
        }
    }

    /// One 10 ms step: a codec frame, the line, and whichever slower
    /// tasks are due.
    fn tick(&mut self) {
        match block_on(self.engine.run_frame(&self.pipeline, &mut self.port)) {
            Ok(Some(source)) => {
                self.telemetry
                    .record_event(TelemetryEventKind::AudioSource(source), self.now());
                self.event(format!("audio: source {source:?}"));
            }
            Ok(None) => {}
            Err(err) => self.event(format!("audio: {err}")),
        }

        let was_off_hook = self.pots.hook_state() != HookState::OnHook;
        let was_ringing = self.pots.line().ring_mode;
        let diagnostics = self.pots.poll(&self.bus, &self.pipeline);
        self.report_pots(&diagnostics);
        self.report_dropped("pots", diagnostics.dropped());
        self.report_line(was_off_hook, was_ringing);

        self.ticks += 1;
        self.elapsed_ms += u64::from(POTS_TICK_MS);
        if self.elapsed_ms % u64::from(CELL_TICK_MS) == 0 {
            let diagnostics = self.link.poll(&self.bus, &mut self.radio);
            self.report_dropped("cell", diagnostics.dropped());
            for diagnostic in diagnostics {
                self.report_cell(diagnostic);
            }
            self.report_radio();
        }
        if self.elapsed_ms % u64::from(CALL_TICK_MS) == 0 {
            let diagnostics = self.call.poll(&self.bus, &mut self.codec);
            self.report_dropped("call", diagnostics.dropped());
            for diagnostic in diagnostics {
                self.report_call(diagnostic);
            }
            self.report_codec();
        }
        self.report_display();
        if self.ticks % STATS_TICKS == 0 {
            self.report_audio_stats();
        }
    }

    fn report_line(&mut self, was_off_hook: bool, was_ringing: bool) {
        let off_hook = self.pots.hook_state() != HookState::OnHook;
        if off_hook != was_off_hook {
            self.telemetry
                .record_event(TelemetryEventKind::Hook { off_hook }, self.now());
            self.event(format!("line: {}", if off_hook { "off-hook" } else { "on-hook" }));
        }
        let ringing = self.pots.line().ring_mode;
        if ringing != was_ringing {
            self.event(format!("line: {}", if ringing { "ringing" } else { "ring stopped" }));
        }
    }

    fn report_dropped(&mut self, task: &str, count: u32) {
        if count > 0 {
            self.telemetry
                .record_event(TelemetryEventKind::DiagnosticsDropped(count), self.now());
            self.event(format!("{task}: {count} diagnostics dropped"));
        }
    }

    fn report_pots(&mut self, diagnostics: &[PotsDiagnostic]) {
        for diagnostic in diagnostics {
            let line = match *diagnostic {
                PotsDiagnostic::MultipleDtmf { kept, count } => {
                    format!("pots: {count} keys heard in one tick, kept {kept}")
                }
                PotsDiagnostic::CountryClamped { requested } => {
                    format!("pots: country {requested} unknown, using {}", self.pots.profile().name)
                }
                PotsDiagnostic::CountryChanged { name } => format!("pots: country {name}"),
                PotsDiagnostic::AppDigitDropped(digit) => format!("pots: digit {digit} dropped"),
                PotsDiagnostic::CallerIdSkipped => "pots: caller id cannot be sent in this country".to_owned(),
            };
            self.event(line);
        }
    }

    fn report_cell(&mut self, diagnostic: CellDiagnostic) {
        match diagnostic {
            CellDiagnostic::StateChanged { from, to } => {
                self.telemetry.record_cell_state(to, self.now());
                self.event(format!("cell: {from:?} -> {to:?}"));
            }
            CellDiagnostic::Reconnecting => self.event("cell: reconnecting to handset".to_owned()),
            CellDiagnostic::BondMissing => {
                self.settings.paired = None;
                self.event("cell: handset bond missing".to_owned());
                self.save_settings();
            }
        }
    }

    fn report_call(&mut self, diagnostic: CallDiagnostic) {
        match diagnostic {
            CallDiagnostic::StateChanged { from, to } => {
                self.telemetry.record_call_state(to, self.now());
                self.event(format!("call: {} -> {}", from.name(), to.name()));
            }
            CallDiagnostic::CodecGainFailed(target) => {
                self.event(format!("call: codec rejected {target:?} gain"));
            }
            CallDiagnostic::DigitRejected(err) => self.event(format!("call: digit rejected ({err})")),
        }
    }

    fn report_radio(&mut self) {
        for command in mem::take(&mut self.radio.sent) {
            let line = match format_command(&command) {
                Ok(at) => format!("radio <- {}", at.trim_end()),
                Err(err) => format!("radio <- {command:?} ({err})"),
            };
            self.event(line);
        }
    }

    fn report_codec(&mut self) {
        for (target, level) in mem::take(&mut self.codec.writes) {
            self.event(format!("codec: {target:?} level {level}"));
        }
    }

    fn report_display(&mut self) {
        let events = self.bus.display.take();
        for event in events.iter() {
            match event {
                DisplayEvent::NumberChanged => self.show_number(),
                DisplayEvent::CallerIdChanged => {
                    self.telemetry
                        .record_event(TelemetryEventKind::CallerId { blocked: false }, self.now());
                    let caller = self.bus.caller_number().unwrap_or_default();
                    let shown = if caller.is_empty() { "private" } else { caller.as_str() };
                    self.event(format!("display: caller {shown}"));
                }
                DisplayEvent::CallerIdBlocked => {
                    self.telemetry
                        .record_event(TelemetryEventKind::CallerId { blocked: true }, self.now());
                    self.event("display: caller unavailable".to_owned());
                }
                DisplayEvent::MicGainChanged => {
                    self.event(format!("display: mic {:.1} dB", self.bus.gain(GainTarget::Mic)));
                }
                DisplayEvent::SpeakerGainChanged => {
                    self.event(format!("display: speaker {:.1} dB", self.bus.gain(GainTarget::Speaker)));
                }
                DisplayEvent::ForgetPairing => self.event("display: pairing forgotten".to_owned()),
                DisplayEvent::FatalError => self.event("display: fatal error".to_owned()),
                DisplayEvent::StatusChanged | DisplayEvent::Activity => {}
            }
        }
    }

    fn show_number(&mut self) {
        let len = self.bus.dial.len();
        if len > self.dial_len
            && let Some(digit) = self.bus.dial.with(|buffer| buffer.last())
        {
            self.telemetry.record_digit(digit, self.now());
        }
        self.dial_len = len;
        self.event(format!("display: number {}", self.bus.dial.number()));
    }

    fn report_audio_stats(&mut self) {
        let stats = self.pipeline.stats();
        for diagnostic in stats.changes_since(&self.audio_stats) {
            self.telemetry
                .record_event(TelemetryEventKind::Audio(diagnostic), self.now());
            self.event(format!("audio: {diagnostic:?}"));
        }
        self.audio_stats = stats;
    }

    fn report_status(&mut self) {
        let caller = self
            .bus
            .caller_number()
            .map_or_else(|| "-".to_owned(), |number| number.as_str().to_owned());
        let lines = [
            format!("time      {} ms", self.elapsed_ms),
            format!("call      {} rings={}", self.call.state().name(), self.call.ring_count()),
            format!(
                "cell      {:?} paired={} handset-ringing={}",
                self.link.state(),
                self.link.is_paired(),
                self.link.is_ringing(),
            ),
            format!(
                "line      hook={:?} tone={:?} ring={:?} cid={:?} dial={:?} muted={} reversed={}",
                self.pots.hook_state(),
                self.pots.tone_state(),
                self.pots.ring_state(),
                self.pots.caller_id_state(),
                self.pots.dial_state(),
                self.pots.is_ring_muted(),
                !self.pots.line().forward,
            ),
            format!("country   {}", self.pots.profile().name),
            format!("number    {}", self.bus.dial.number()),
            format!("caller    {caller}"),
            format!(
                "audio     {:?} rx={} tx={} peak={}",
                self.engine.active(),
                self.pipeline.rx_count(),
                self.pipeline.tx_count(),
                self.port.tx_peak,
            ),
            format!(
                "gain      mic={:.1}dB speaker={:.1}dB codec={:?}/{:?}",
                self.bus.gain(GainTarget::Mic),
                self.bus.gain(GainTarget::Speaker),
                self.codec.mic,
                self.codec.speaker,
            ),
            format!("telemetry {} records", self.telemetry.len()),
        ];
        self.output.extend(lines);

        let skip = self.telemetry.len().saturating_sub(STATUS_RECORDS);
        let records: Vec<String> = self
            .telemetry
            .oldest_first()
            .skip(skip)
            .map(|record| {
                format!(
                    "  #{} t={}ms {}",
                    record.id,
                    record.timestamp.as_millis(),
                    record.event
                )
            })
            .collect();
        self.output.extend(records);
    }
}

struct TranscriptLogger {
    writer: BufWriter<File>,
}

impl TranscriptLogger {
    fn create(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let mut logger = Self {
            writer: BufWriter::new(File::create(path)?),
        };
        writeln!(logger.writer, "# POTS bridge emulator transcript")?;
        writeln!(logger.writer, "# Timestamps are simulated milliseconds since power-up")?;
        writeln!(logger.writer)?;
        logger.writer.flush()?;
        Ok(logger)
    }

    fn append_line(&mut self, elapsed_ms: u64, role: TranscriptRole, line: &str) -> io::Result<()> {
        writeln!(self.writer, "[+{elapsed_ms:>7} ms] {} {line}", role.prefix())?;
        self.writer.flush()
    }
}
