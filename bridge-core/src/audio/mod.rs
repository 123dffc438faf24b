//! Full-duplex audio path between the line codec and the tone or voice side.
//!
//! The codec transport exchanges interleaved stereo frames at the line rate.
//! [`AudioEngine`] runs in the audio task and converts those frames into the
//! two shared [`SampleBuffer`]s held by [`AudioPipeline`], which the POTS and
//! cellular sides read and write without ever blocking.

use core::fmt;

mod align;
mod buffer;
mod dc;
mod engine;
mod pipeline;
mod resample;

pub use align::AlignmentQueue;
pub use buffer::SampleBuffer;
pub use dc::DcRestore;
pub use engine::AudioEngine;
pub use pipeline::{AudioDiagnostic, AudioDiagnostics, AudioPipeline, AudioStats};
pub use resample::{HalfBandInterpolator, decimate_pair};

/// Line-side sample rate.
pub const LINE_RATE_HZ: u32 = 8_000;
/// Mono samples per codec frame (10 ms at the line rate).
pub const FRAME_SAMPLES: usize = 80;
/// Capacity of each circular sample buffer.
pub const BUFFER_SAMPLES: usize = 960;
/// Echo canceller tail length in samples.
pub const ECHO_TAIL_SAMPLES: usize = 128;
/// Default alignment depth in codec frames.
pub const DEFAULT_ALIGN_FRAMES: usize = 3;
/// Deepest alignment the queue can hold, in codec frames.
pub const MAX_ALIGN_FRAMES: usize = 8;
/// Alignment queue capacity: the deepest setting plus one frame of headroom.
pub const ALIGN_SAMPLES: usize = (MAX_ALIGN_FRAMES + 1) * FRAME_SAMPLES;

/// Which side currently owns the line audio.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[repr(u8)]
pub enum AudioSource {
    #[default]
    Disabled = 0,
    /// Locally generated tones and DTMF detection.
    Tone = 1,
    /// Narrowband call audio (CVSD).
    Voice8k = 2,
    /// Wideband call audio (mSBC).
    Voice16k = 3,
}

impl AudioSource {
    #[must_use]
    pub const fn to_raw(self) -> u8 {
        self as u8
    }

    /// Unknown values map to [`AudioSource::Disabled`].
    #[must_use]
    pub const fn from_raw(raw: u8) -> Self {
        match raw {
            1 => Self::Tone,
            2 => Self::Voice8k,
            3 => Self::Voice16k,
            _ => Self::Disabled,
        }
    }

    #[must_use]
    pub const fn is_voice(self) -> bool {
        matches!(self, Self::Voice8k | Self::Voice16k)
    }

    /// Voice-side samples per line sample.
    #[must_use]
    pub const fn rate_factor(self) -> usize {
        match self {
            Self::Voice16k => 2,
            _ => 1,
        }
    }
}

/// Tunables for the audio path.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AudioConfig {
    /// Frames of transmit audio held back before they meet their echo.
    pub align_frames: usize,
}

impl AudioConfig {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            align_frames: DEFAULT_ALIGN_FRAMES,
        }
    }

    /// Sets the alignment depth, limited to what the queue can hold.
    #[must_use]
    pub const fn with_align_frames(mut self, frames: usize) -> Self {
        self.align_frames = if frames > MAX_ALIGN_FRAMES {
            MAX_ALIGN_FRAMES
        } else {
            frames
        };
        self
    }

    #[must_use]
    pub const fn align_samples(&self) -> usize {
        self.align_frames * FRAME_SAMPLES
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Audio failures. Codec initialization failure is fatal.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AudioError {
    CodecInit,
    Transport,
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CodecInit => f.write_str("audio codec failed to initialize"),
            Self::Transport => f.write_str("audio transport error"),
        }
    }
}

/// Codec frame transport.
///
/// One call exchanges a full frame in each direction: `tx` is played while
/// `rx` is captured, both interleaved stereo.
#[allow(async_fn_in_trait)]
pub trait AudioPort {
    /// # Errors
    ///
    /// Returns [`AudioError::Transport`] when the frame could not be moved.
    async fn exchange(&mut self, tx: &[i16], rx: &mut [i16]) -> Result<(), AudioError>;
}
