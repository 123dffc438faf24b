//! Telemetry ring and logging helpers for the firmware tasks.
//!
//! Each task hands its poll diagnostics to [`FirmwareTelemetry`], which
//! records the interesting ones in the shared core ring, keeps [`status`]
//! current and mirrors everything to defmt (or stdout on the host).

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use core::cell::RefCell;

use bridge_core::audio::{AudioDiagnostic, AudioSource};
use bridge_core::cellular::{CellDiagnostic, CellState};
use bridge_core::orchestrator::{CallDiagnostic, CallState};
use bridge_core::pots::PotsDiagnostic;
use bridge_core::power::FatalCause;
use bridge_core::telemetry::{TelemetryEventKind, TelemetryInstant, TelemetryRecorder};
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::Instant;

use crate::status;

/// Records shown by one status dump.
const DUMP_RECORDS: usize = 8;

/// Embassy instant usable as a telemetry timestamp.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FirmwareInstant(Instant);

impl FirmwareInstant {
    #[must_use]
    pub fn as_millis(self) -> u64 {
        self.0.as_millis()
    }
}

impl From<Instant> for FirmwareInstant {
    fn from(instant: Instant) -> Self {
        Self(instant)
    }
}

impl TelemetryInstant for FirmwareInstant {
    fn saturating_duration_since(&self, earlier: Self) -> core::time::Duration {
        core::time::Duration::from_micros(self.0.saturating_duration_since(earlier.0).as_micros())
    }
}

/// Telemetry shared by every firmware task.
pub struct FirmwareTelemetry<M: RawMutex> {
    recorder: Mutex<M, RefCell<TelemetryRecorder<FirmwareInstant>>>,
}

impl<M: RawMutex> FirmwareTelemetry<M> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            recorder: Mutex::new(RefCell::new(TelemetryRecorder::new())),
        }
    }

    fn record(&self, event: TelemetryEventKind, at: FirmwareInstant) {
        self.recorder
            .lock(|recorder| recorder.borrow_mut().record_event(event, at));
    }

    pub fn call(&self, diagnostics: &[CallDiagnostic], at: FirmwareInstant) {
        for diagnostic in diagnostics {
            match *diagnostic {
                CallDiagnostic::StateChanged { from, to } => {
                    self.recorder
                        .lock(|recorder| recorder.borrow_mut().record_call_state(to, at));
                    status::record_call_state(to);
                    log_call_state(from, to, at);
                }
                CallDiagnostic::CodecGainFailed(target) => {
                    log_warning("call", "codec rejected gain", target_label(target));
                }
                CallDiagnostic::DigitRejected(_) => log_warning("call", "digit rejected", "dial buffer"),
            }
        }
    }

    pub fn cell(&self, diagnostics: &[CellDiagnostic], at: FirmwareInstant) {
        for diagnostic in diagnostics {
            match *diagnostic {
                CellDiagnostic::StateChanged { from, to } => {
                    self.recorder
                        .lock(|recorder| recorder.borrow_mut().record_cell_state(to, at));
                    status::record_service(to != CellState::Disconnected);
                    log_cell_state(from, to, at);
                }
                CellDiagnostic::Reconnecting => log_info("cell", "reconnecting to handset"),
                CellDiagnostic::BondMissing => {
                    status::record_bonded(false);
                    log_warning("cell", "bond lost", "forgetting handset");
                }
            }
        }
    }

    pub fn pots(&self, diagnostics: &[PotsDiagnostic]) {
        for diagnostic in diagnostics {
            match *diagnostic {
                PotsDiagnostic::MultipleDtmf { kept, count } => log_multiple_dtmf(kept, count),
                PotsDiagnostic::CountryClamped { requested } => log_country_clamped(requested),
                PotsDiagnostic::CountryChanged { name } => log_info("pots", name),
                PotsDiagnostic::AppDigitDropped(_) => log_warning("pots", "digit dropped", "queue full"),
                PotsDiagnostic::CallerIdSkipped => log_info("pots", "caller id not expressible"),
            }
        }
    }

    /// Records diagnostics a task could not fit in one poll's report.
    pub fn dropped(&self, task: &'static str, count: u32, at: FirmwareInstant) {
        if count == 0 {
            return;
        }
        self.record(TelemetryEventKind::DiagnosticsDropped(count), at);
        log_dropped(task, count);
    }

    pub fn hook(&self, off_hook: bool, at: FirmwareInstant) {
        status::record_hook(off_hook);
        self.record(TelemetryEventKind::Hook { off_hook }, at);
    }

    pub fn audio_source(&self, source: AudioSource, at: FirmwareInstant) {
        self.record(TelemetryEventKind::AudioSource(source), at);
        log_audio_source(source);
    }

    pub fn audio(&self, diagnostics: &[AudioDiagnostic], at: FirmwareInstant) {
        for &diagnostic in diagnostics {
            self.record(TelemetryEventKind::Audio(diagnostic), at);
            log_audio(diagnostic);
        }
    }

    pub fn fatal(&self, cause: FatalCause, at: FirmwareInstant) {
        self.record(TelemetryEventKind::Fatal, at);
        log_fatal(cause);
    }

    /// Logs the status word and the most recent records.
    pub fn dump(&self) {
        log_status(&status::snapshot());
        self.recorder.lock(|recorder| {
            let recorder = recorder.borrow();
            let skip = recorder.len().saturating_sub(DUMP_RECORDS);
            for record in recorder.oldest_first().skip(skip) {
                log_record(record.id, record.timestamp, record.event);
            }
        });
    }

    #[must_use]
    pub fn record_count(&self) -> usize {
        self.recorder.lock(|recorder| recorder.borrow().len())
    }
}

impl<M: RawMutex> Default for FirmwareTelemetry<M> {
    fn default() -> Self {
        Self::new()
    }
}

const fn target_label(target: bridge_core::gain::GainTarget) -> &'static str {
    match target {
        bridge_core::gain::GainTarget::Mic => "mic",
        bridge_core::gain::GainTarget::Speaker => "speaker",
    }
}

#[cfg(target_os = "none")]
fn log_call_state(from: CallState, to: CallState, at: FirmwareInstant) {
    defmt::info!("call: {} -> {} t={}ms", from.name(), to.name(), at.as_millis());
}

#[cfg(not(target_os = "none"))]
fn log_call_state(from: CallState, to: CallState, at: FirmwareInstant) {
    println!("call: {} -> {} t={}ms", from.name(), to.name(), at.as_millis());
}

#[cfg(target_os = "none")]
fn log_cell_state(from: CellState, to: CellState, at: FirmwareInstant) {
    defmt::info!(
        "cell: {} -> {} t={}ms",
        defmt::Debug2Format(&from),
        defmt::Debug2Format(&to),
        at.as_millis()
    );
}

#[cfg(not(target_os = "none"))]
fn log_cell_state(from: CellState, to: CellState, at: FirmwareInstant) {
    println!("cell: {from:?} -> {to:?} t={}ms", at.as_millis());
}

#[cfg(target_os = "none")]
fn log_info(task: &'static str, message: &'static str) {
    defmt::info!("{}: {}", task, message);
}

#[cfg(not(target_os = "none"))]
fn log_info(task: &'static str, message: &'static str) {
    println!("{task}: {message}");
}

#[cfg(target_os = "none")]
fn log_warning(task: &'static str, message: &'static str, detail: &'static str) {
    defmt::warn!("{}: {} ({})", task, message, detail);
}

#[cfg(not(target_os = "none"))]
fn log_warning(task: &'static str, message: &'static str, detail: &'static str) {
    println!("{task}: {message} ({detail})");
}

#[cfg(target_os = "none")]
fn log_multiple_dtmf(kept: char, count: usize) {
    defmt::warn!("pots: {} DTMF keys in one tick, kept {}", count, kept);
}

#[cfg(not(target_os = "none"))]
fn log_multiple_dtmf(kept: char, count: usize) {
    println!("pots: {count} DTMF keys in one tick, kept {kept}");
}

#[cfg(target_os = "none")]
fn log_dropped(task: &'static str, count: u32) {
    defmt::warn!("{}: {} diagnostics dropped", task, count);
}

#[cfg(not(target_os = "none"))]
fn log_dropped(task: &'static str, count: u32) {
    println!("{task}: {count} diagnostics dropped");
}

#[cfg(target_os = "none")]
fn log_country_clamped(requested: u8) {
    defmt::warn!("pots: country {} unknown, using default", requested);
}

#[cfg(not(target_os = "none"))]
fn log_country_clamped(requested: u8) {
    println!("pots: country {requested} unknown, using default");
}

#[cfg(target_os = "none")]
fn log_audio_source(source: AudioSource) {
    defmt::info!("audio: source {}", defmt::Debug2Format(&source));
}

#[cfg(not(target_os = "none"))]
fn log_audio_source(source: AudioSource) {
    println!("audio: source {source:?}");
}

#[cfg(target_os = "none")]
fn log_audio(diagnostic: AudioDiagnostic) {
    defmt::warn!("audio: {}", defmt::Debug2Format(&diagnostic));
}

#[cfg(not(target_os = "none"))]
fn log_audio(diagnostic: AudioDiagnostic) {
    println!("audio: {diagnostic:?}");
}

#[cfg(target_os = "none")]
fn log_fatal(cause: FatalCause) {
    defmt::error!("fatal: {}", defmt::Display2Format(&cause));
}

#[cfg(not(target_os = "none"))]
fn log_fatal(cause: FatalCause) {
    println!("fatal: {cause}");
}

#[cfg(target_os = "none")]
fn log_status(status: &status::StatusSnapshot) {
    defmt::info!("status: {}", defmt::Display2Format(status));
}

#[cfg(not(target_os = "none"))]
fn log_status(status: &status::StatusSnapshot) {
    println!("status: {status}");
}

#[cfg(target_os = "none")]
fn log_record(id: u32, at: FirmwareInstant, event: TelemetryEventKind) {
    defmt::info!("telemetry #{} t={}ms {}", id, at.as_millis(), defmt::Display2Format(&event));
}

#[cfg(not(target_os = "none"))]
fn log_record(id: u32, at: FirmwareInstant, event: TelemetryEventKind) {
    println!("telemetry #{id} t={}ms {event}", at.as_millis());
}
