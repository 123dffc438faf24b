//! Signal-processing primitives used by the line and audio paths.
//!
//! The state machines only depend on the traits below. The bundled
//! implementations are compact fixed-tick versions good enough for a
//! single analog line.

mod dtmf;
mod echo;
mod fsk;
mod oscillator;
mod tone;

pub use dtmf::{DTMF_FLUSH_MS, DtmfSender, DtmfTiming, GoertzelDetector, dtmf_frequencies};
pub use echo::{NlmsCanceller, PassthroughCanceller};
pub use fsk::{FskModem, FskModulator, FskProfile};
pub use oscillator::{Oscillator, ToneBank, amplitude_for_level};
pub use tone::TonePlayer;

/// Removes the echo of transmitted audio from received audio.
pub trait EchoCanceller {
    /// Processes one sample pair and returns the cleaned receive sample.
    fn update(&mut self, tx: i16, rx: i16) -> i16;

    /// Forgets all adaptation state.
    fn flush(&mut self);
}

/// Produces audio on demand.
pub trait SampleSource {
    /// Writes up to `out.len()` samples and returns how many were produced.
    /// Zero means the source has finished.
    fn fill(&mut self, out: &mut [i16]) -> usize;
}

/// Collects DTMF digits reported by a detector within one poll.
pub type DetectedDigits = crate::report::Report<char, 4>;

/// Decodes DTMF digits from line audio.
pub trait DtmfDetector {
    /// Feeds `samples`; newly recognized key presses are appended to `digits`.
    fn feed(&mut self, samples: &[i16], digits: &mut DetectedDigits);

    /// Drops partial blocks and forgets the last reported digit.
    fn reset(&mut self);
}
