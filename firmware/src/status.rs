#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Shared status storage for the firmware target.
//!
//! Tasks publish what they know through these atomics so the periodic status
//! dump can read a consistent-enough [`StatusSnapshot`] without borrowing any
//! task's state.

use core::fmt;

use bridge_core::audio::AudioStats;
use bridge_core::orchestrator::CallState;
use portable_atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};

/// Current [`CallState`] in its raw encoding.
static CALL_STATE: AtomicU8 = AtomicU8::new(CallState::ServiceLost.to_raw());
static OFF_HOOK: AtomicBool = AtomicBool::new(false);
/// Whether a handset service level connection is up.
static IN_SERVICE: AtomicBool = AtomicBool::new(false);
/// Whether the radio still holds a bond for the paired handset.
static BONDED: AtomicBool = AtomicBool::new(false);
static RX_OVERFLOWS: AtomicU32 = AtomicU32::new(0);
static TX_OVERFLOWS: AtomicU32 = AtomicU32::new(0);
static ALIGN_FAULTS: AtomicU32 = AtomicU32::new(0);

pub fn record_call_state(state: CallState) {
    CALL_STATE.store(state.to_raw(), Ordering::Relaxed);
}

pub fn record_hook(off_hook: bool) {
    OFF_HOOK.store(off_hook, Ordering::Relaxed);
}

pub fn record_service(in_service: bool) {
    IN_SERVICE.store(in_service, Ordering::Relaxed);
}

pub fn record_bonded(bonded: bool) {
    BONDED.store(bonded, Ordering::Relaxed);
}

#[must_use]
pub fn is_bonded() -> bool {
    BONDED.load(Ordering::Relaxed)
}

/// Copies the pipeline counters; they only ever grow.
pub fn record_audio(stats: &AudioStats) {
    RX_OVERFLOWS.store(stats.rx_overflows, Ordering::Relaxed);
    TX_OVERFLOWS.store(stats.tx_overflows, Ordering::Relaxed);
    ALIGN_FAULTS.store(
        stats.align_underruns.wrapping_add(stats.align_overruns),
        Ordering::Relaxed,
    );
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StatusSnapshot {
    pub call: Option<CallState>,
    pub off_hook: bool,
    pub in_service: bool,
    pub bonded: bool,
    pub rx_overflows: u32,
    pub tx_overflows: u32,
    pub align_faults: u32,
}

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "call={} hook={} service={} bonded={} overflows rx={} tx={} align={}",
            self.call.map_or("?", CallState::name),
            if self.off_hook { "off" } else { "on" },
            self.in_service,
            self.bonded,
            self.rx_overflows,
            self.tx_overflows,
            self.align_faults,
        )
    }
}

#[must_use]
pub fn snapshot() -> StatusSnapshot {
    StatusSnapshot {
        call: CallState::from_raw(CALL_STATE.load(Ordering::Relaxed)),
        off_hook: OFF_HOOK.load(Ordering::Relaxed),
        in_service: IN_SERVICE.load(Ordering::Relaxed),
        bonded: is_bonded(),
        rx_overflows: RX_OVERFLOWS.load(Ordering::Relaxed),
        tx_overflows: TX_OVERFLOWS.load(Ordering::Relaxed),
        align_faults: ALIGN_FAULTS.load(Ordering::Relaxed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_values() {
        record_call_state(CallState::CallActiveVoice);
        record_hook(true);
        record_audio(&AudioStats {
            rx_overflows: 3,
            tx_overflows: 1,
            align_underruns: 2,
            align_overruns: 5,
            frames: 900,
        });

        let status = snapshot();
        assert_eq!(status.call, Some(CallState::CallActiveVoice));
        assert!(status.off_hook);
        assert_eq!(status.align_faults, 7);

        let mut text = heapless::String::<128>::new();
        core::fmt::write(&mut text, format_args!("{status}")).expect("fits");
        assert!(text.starts_with("call=call-active-voice hook=off"));
    }
}
