//! Bench that runs the line, the cellular link and the orchestrator at their
//! own tick rates against mocked hardware.

#![allow(dead_code)]

use bridge_core::audio::{AudioConfig, AudioEngine, AudioPipeline, FRAME_SAMPLES};
use bridge_core::bus::Bus;
use bridge_core::cellular::{CellState, CellularLink, CellularTiming, HfpCommand, HfpControl, HfpIndication, dispatch_indication};
use bridge_core::dsp::{GoertzelDetector, PassthroughCanceller};
use bridge_core::gain::{CodecControl, GainTarget};
use bridge_core::orchestrator::{CallDiagnostic, CallOrchestrator, CallState, CallTiming};
use bridge_core::pots::{LineInterface, PotsLine, PotsTiming};
use bridge_core::ticks::{CALL_TICK_MS, CELL_TICK_MS, POTS_TICK_MS};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use heapless::Vec;

pub type TestBus = Bus<CriticalSectionRawMutex>;
pub type TestPipeline = AudioPipeline<CriticalSectionRawMutex>;

/// Line card with a hook switch the test flips by hand.
#[derive(Debug, Default)]
pub struct MockLine {
    pub off_hook: bool,
    pub ring_mode: bool,
    pub forward: bool,
    /// Times ring mode was switched on.
    pub ring_starts: u32,
    /// Times polarity was reversed.
    pub reversals: u32,
}

impl LineInterface for MockLine {
    fn hook_is_off(&mut self) -> bool {
        self.off_hook
    }

    fn set_ring_mode(&mut self, enabled: bool) {
        if enabled && !self.ring_mode {
            self.ring_starts += 1;
        }
        self.ring_mode = enabled;
    }

    fn set_forward(&mut self, forward: bool) {
        if self.forward && !forward {
            self.reversals += 1;
        }
        self.forward = forward;
    }
}

#[derive(Debug)]
pub struct MockRadio {
    pub sent: Vec<HfpCommand, 64>,
    pub bonded: bool,
}

impl MockRadio {
    pub fn new() -> Self {
        Self {
            sent: Vec::new(),
            bonded: true,
        }
    }

    pub fn count(&self, command: &HfpCommand) -> usize {
        self.sent.iter().filter(|sent| *sent == command).count()
    }
}

impl HfpControl for MockRadio {
    fn send(&mut self, command: HfpCommand) {
        self.sent.push(command).expect("radio log full");
    }

    fn has_bond(&mut self) -> bool {
        self.bonded
    }
}

#[derive(Debug, Default)]
pub struct MockCodec {
    pub mic: Option<u8>,
    pub speaker: Option<u8>,
    pub writes: u32,
}

impl CodecControl for MockCodec {
    fn set_level(&mut self, target: GainTarget, level: u8) -> bool {
        self.writes += 1;
        match target {
            GainTarget::Mic => self.mic = Some(level),
            GainTarget::Speaker => self.speaker = Some(level),
        }
        true
    }
}

pub struct Bench {
    pub bus: TestBus,
    pub pipeline: TestPipeline,
    pub pots: PotsLine<MockLine, GoertzelDetector>,
    pub link: CellularLink,
    pub call: CallOrchestrator,
    pub engine: AudioEngine<PassthroughCanceller>,
    pub radio: MockRadio,
    pub codec: MockCodec,
    pub call_history: Vec<CallState, 32>,
    ticks: u32,
}

impl Bench {
    pub fn new(country: u8) -> Self {
        let (pots, clamped) = PotsLine::new(
            MockLine::default(),
            GoertzelDetector::new(),
            country,
            PotsTiming::new(),
        );
        assert_eq!(clamped, None);
        Self {
            bus: TestBus::new(),
            pipeline: TestPipeline::new(),
            pots,
            link: CellularLink::new(CellularTiming::new(), true),
            call: CallOrchestrator::new(CallTiming::new()),
            engine: AudioEngine::new(PassthroughCanceller, AudioConfig::new()),
            radio: MockRadio::new(),
            codec: MockCodec::default(),
            call_history: Vec::new(),
            ticks: 0,
        }
    }

    /// Bench with a handset already connected and the orchestrator idle.
    pub fn connected(country: u8) -> Self {
        let mut bench = Self::new(country);
        bench.indicate(HfpIndication::SlcConnected);
        bench.run_ms(200);
        assert_eq!(bench.link.state(), CellState::ConnectedIdle);
        assert_eq!(bench.call.state(), CallState::Idle);
        bench.radio.sent.clear();
        bench
    }

    pub fn indicate(&self, indication: HfpIndication) {
        dispatch_indication(&self.bus, indication);
    }

    pub fn line(&self) -> &MockLine {
        self.pots.line()
    }

    pub fn set_off_hook(&mut self, off_hook: bool) {
        self.pots.line_mut().off_hook = off_hook;
    }

    /// One 10 ms step: a codec frame, the line, and whichever slower
    /// machines are due.
    pub fn tick(&mut self) {
        self.engine.poll_restart(&self.pipeline);
        let mut tx = [0i16; FRAME_SAMPLES * 2];
        self.engine.fill_tx_frame(&self.pipeline, &mut tx);
        self.engine.drain_rx_frame(&self.pipeline, &[0i16; FRAME_SAMPLES * 2]);

        self.pots.poll(&self.bus, &self.pipeline);
        self.ticks += 1;
        let elapsed_ms = self.ticks * POTS_TICK_MS;
        if elapsed_ms % CELL_TICK_MS == 0 {
            self.link.poll(&self.bus, &mut self.radio);
        }
        if elapsed_ms % CALL_TICK_MS == 0 {
            for diagnostic in self.call.poll(&self.bus, &mut self.codec) {
                if let CallDiagnostic::StateChanged { to, .. } = diagnostic {
                    self.call_history.push(to).expect("history full");
                }
            }
        }
    }

    pub fn run_ms(&mut self, millis: u32) {
        for _ in 0..millis / POTS_TICK_MS {
            self.tick();
        }
    }

    /// Runs until `done` holds, for at most `limit_ms`. Returns the time taken.
    pub fn run_until(&mut self, limit_ms: u32, mut done: impl FnMut(&Self) -> bool) -> Option<u32> {
        for step in 0..limit_ms / POTS_TICK_MS {
            if done(self) {
                return Some(step * POTS_TICK_MS);
            }
            self.tick();
        }
        None
    }

    /// Lifts the handset and waits for the hook to settle.
    pub fn lift(&mut self) {
        self.set_off_hook(true);
        self.run_ms(100);
    }

    pub fn hang_up(&mut self) {
        self.set_off_hook(false);
        self.run_ms(700);
    }

    /// Dials one digit as a train of 60 ms breaks and 40 ms makes, then
    /// waits for the inter-digit gap.
    pub fn dial_rotary(&mut self, pulses: u8) {
        for _ in 0..pulses {
            self.set_off_hook(false);
            self.run_ms(60);
            self.set_off_hook(true);
            self.run_ms(40);
        }
        self.run_ms(300);
    }
}
