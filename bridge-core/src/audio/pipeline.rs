use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;
use portable_atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};

use super::{ALIGN_SAMPLES, AlignmentQueue, AudioSource, BUFFER_SAMPLES, SampleBuffer};

pub(super) type LineBuffer = SampleBuffer<BUFFER_SAMPLES>;
pub(super) type LineAlignment = AlignmentQueue<ALIGN_SAMPLES>;

/// Diagnostic counters for the audio path.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct AudioStats {
    pub rx_overflows: u32,
    pub tx_overflows: u32,
    pub align_underruns: u32,
    pub align_overruns: u32,
    pub frames: u32,
}

/// Counter growth worth a log line.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AudioDiagnostic {
    RxOverflow(u32),
    TxOverflow(u32),
    AlignUnderrun(u32),
    AlignOverrun(u32),
}

impl AudioDiagnostic {
    #[must_use]
    pub const fn count(self) -> u32 {
        match self {
            Self::RxOverflow(n) | Self::TxOverflow(n) | Self::AlignUnderrun(n) | Self::AlignOverrun(n) => n,
        }
    }
}

pub type AudioDiagnostics = heapless::Vec<AudioDiagnostic, 4>;

impl AudioStats {
    /// Reports each counter that grew since `earlier`, with the increase.
    #[must_use]
    pub fn changes_since(&self, earlier: &AudioStats) -> AudioDiagnostics {
        let mut changes = AudioDiagnostics::new();
        let grown = [
            AudioDiagnostic::RxOverflow(self.rx_overflows.wrapping_sub(earlier.rx_overflows)),
            AudioDiagnostic::TxOverflow(self.tx_overflows.wrapping_sub(earlier.tx_overflows)),
            AudioDiagnostic::AlignUnderrun(self.align_underruns.wrapping_sub(earlier.align_underruns)),
            AudioDiagnostic::AlignOverrun(self.align_overruns.wrapping_sub(earlier.align_overruns)),
        ];
        for change in grown {
            if change.count() > 0 {
                // One slot per kind.
                let _ = changes.push(change);
            }
        }
        changes
    }
}

/// Audio state shared between the audio task and its clients.
///
/// Each buffer has its own lock, held only while samples are copied.
pub struct AudioPipeline<M: RawMutex> {
    rx: Mutex<M, RefCell<LineBuffer>>,
    tx: Mutex<M, RefCell<LineBuffer>>,
    align: Mutex<M, RefCell<LineAlignment>>,
    source: AtomicU8,
    restart: AtomicBool,
    muted: AtomicBool,
    frames: AtomicU32,
}

impl<M: RawMutex> AudioPipeline<M> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            rx: Mutex::new(RefCell::new(SampleBuffer::new())),
            tx: Mutex::new(RefCell::new(SampleBuffer::new())),
            align: Mutex::new(RefCell::new(AlignmentQueue::new())),
            source: AtomicU8::new(AudioSource::Disabled.to_raw()),
            restart: AtomicBool::new(false),
            muted: AtomicBool::new(false),
            frames: AtomicU32::new(0),
        }
    }

    /// Switches the line to `source`. The audio task is asked to restart
    /// only when the source changes.
    pub fn select_source(&self, source: AudioSource) {
        let previous = self.source.swap(source.to_raw(), Ordering::AcqRel);
        if previous != source.to_raw() {
            self.restart.store(true, Ordering::Release);
        }
    }

    #[must_use]
    pub fn source(&self) -> AudioSource {
        AudioSource::from_raw(self.source.load(Ordering::Acquire))
    }

    /// Mutes receive audio headed for the handset.
    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }

    pub(super) fn take_restart(&self) -> bool {
        self.restart.swap(false, Ordering::AcqRel)
    }

    /// Samples waiting to be read from the line.
    #[must_use]
    pub fn rx_count(&self) -> usize {
        self.rx.lock(|rx| rx.borrow().len())
    }

    /// Samples queued for the line.
    #[must_use]
    pub fn tx_count(&self) -> usize {
        self.tx.lock(|tx| tx.borrow().len())
    }

    /// Reads line audio for tone detection. Returns the number of real
    /// samples; the rest of `out` is zero-filled.
    pub fn get_rx_tone(&self, out: &mut [i16]) -> usize {
        self.get_rx_if(self.source() == AudioSource::Tone, out)
    }

    /// Queues generated tone samples for the line.
    pub fn put_tx_tone(&self, samples: &[i16]) -> usize {
        self.put_tx_if(self.source() == AudioSource::Tone, samples)
    }

    /// Reads line audio for the call. Rate follows the selected voice source.
    pub fn get_rx_voice(&self, out: &mut [i16]) -> usize {
        self.get_rx_if(self.source().is_voice(), out)
    }

    /// Queues call audio for the line.
    pub fn put_tx_voice(&self, samples: &[i16]) -> usize {
        self.put_tx_if(self.source().is_voice(), samples)
    }

    /// Fills `out` with little-endian call audio. Returns bytes of real audio.
    pub fn get_rx_voice_bytes(&self, out: &mut [u8]) -> usize {
        let mut produced = 0;
        let mut scratch = [0i16; 64];
        for chunk in out.chunks_mut(scratch.len() * 2) {
            let samples = &mut scratch[..chunk.len() / 2];
            let got = self.get_rx_voice(samples);
            for (bytes, sample) in chunk.chunks_exact_mut(2).zip(samples.iter()) {
                bytes.copy_from_slice(&sample.to_le_bytes());
            }
            if chunk.len() % 2 == 1 {
                chunk[chunk.len() - 1] = 0;
            }
            produced += got * 2;
        }
        produced
    }

    /// Queues little-endian call audio. A trailing odd byte is ignored.
    pub fn put_tx_voice_bytes(&self, bytes: &[u8]) -> usize {
        let mut accepted = 0;
        let mut scratch = [0i16; 64];
        for chunk in bytes.chunks(scratch.len() * 2) {
            let mut count = 0;
            for (slot, pair) in scratch.iter_mut().zip(chunk.chunks_exact(2)) {
                *slot = i16::from_le_bytes([pair[0], pair[1]]);
                count += 1;
            }
            accepted += self.put_tx_voice(&scratch[..count]) * 2;
        }
        accepted
    }

    #[must_use]
    pub fn stats(&self) -> AudioStats {
        let (align_underruns, align_overruns) = self.align.lock(|align| {
            let align = align.borrow();
            (align.underruns(), align.overruns())
        });
        AudioStats {
            rx_overflows: self.rx.lock(|rx| rx.borrow().overflows()),
            tx_overflows: self.tx.lock(|tx| tx.borrow().overflows()),
            align_underruns,
            align_overruns,
            frames: self.frames.load(Ordering::Relaxed),
        }
    }

    fn get_rx_if(&self, allowed: bool, out: &mut [i16]) -> usize {
        let got = if allowed {
            self.rx.lock(|rx| rx.borrow_mut().pop(out))
        } else {
            0
        };
        out[got..].fill(0);
        got
    }

    fn put_tx_if(&self, allowed: bool, samples: &[i16]) -> usize {
        if !allowed {
            return 0;
        }
        self.tx.lock(|tx| tx.borrow_mut().push(samples));
        samples.len()
    }

    pub(super) fn pop_tx(&self, out: &mut [i16]) -> usize {
        self.tx.lock(|tx| tx.borrow_mut().pop(out))
    }

    pub(super) fn push_rx(&self, samples: &[i16]) {
        self.rx.lock(|rx| rx.borrow_mut().push(samples));
    }

    pub(super) fn push_align(&self, samples: &[i16]) {
        self.align.lock(|align| {
            let mut align = align.borrow_mut();
            for &sample in samples {
                align.push(sample);
            }
        });
    }

    pub(super) fn pop_align(&self, out: &mut [i16]) {
        self.align.lock(|align| {
            let mut align = align.borrow_mut();
            for slot in out.iter_mut() {
                *slot = align.pop();
            }
        });
    }

    pub(super) fn reset_buffers(&self, align_depth: usize) {
        self.rx.lock(|rx| rx.borrow_mut().clear());
        self.tx.lock(|tx| tx.borrow_mut().clear());
        self.align.lock(|align| align.borrow_mut().reset(align_depth));
    }

    pub(super) fn count_frame(&self) {
        self.frames.fetch_add(1, Ordering::Relaxed);
    }
}

impl<M: RawMutex> Default for AudioPipeline<M> {
    fn default() -> Self {
        Self::new()
    }
}
