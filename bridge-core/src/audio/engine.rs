use embassy_sync::blocking_mutex::raw::RawMutex;

use super::{
    AudioConfig, AudioError, AudioPipeline, AudioPort, AudioSource, DcRestore, FRAME_SAMPLES,
    HalfBandInterpolator, decimate_pair,
};
use crate::dsp::EchoCanceller;

/// Frame-level processing owned by the audio task.
///
/// Converts codec frames (interleaved stereo, channel 0 carries the line)
/// into the pipeline's sample buffers and back.
pub struct AudioEngine<E> {
    canceller: E,
    interpolator: HalfBandInterpolator,
    dc: DcRestore,
    config: AudioConfig,
    active: AudioSource,
}

impl<E: EchoCanceller> AudioEngine<E> {
    #[must_use]
    pub fn new(canceller: E, config: AudioConfig) -> Self {
        Self {
            canceller,
            interpolator: HalfBandInterpolator::new(),
            dc: DcRestore::new(),
            config,
            active: AudioSource::Disabled,
        }
    }

    /// Source the engine was last initialized for.
    #[must_use]
    pub fn active(&self) -> AudioSource {
        self.active
    }

    #[must_use]
    pub fn config(&self) -> AudioConfig {
        self.config
    }

    /// Reinitializes the stream if a source change is pending. Returns the
    /// new source when a restart happened.
    pub fn poll_restart<M: RawMutex>(&mut self, pipeline: &AudioPipeline<M>) -> Option<AudioSource> {
        if !pipeline.take_restart() {
            return None;
        }
        let source = pipeline.source();
        self.canceller.flush();
        match source {
            AudioSource::Tone => self.dc.reset(),
            AudioSource::Voice8k | AudioSource::Voice16k => self.interpolator.reset(),
            AudioSource::Disabled => {}
        }
        pipeline.reset_buffers(self.config.align_samples());
        self.active = source;
        Some(source)
    }

    /// Runs one transfer period against the codec: restart if requested,
    /// then one frame out and one frame in. Returns the new source after a
    /// restart.
    ///
    /// # Errors
    ///
    /// Propagates transport failures; the caller decides whether to retry on
    /// the next period.
    pub async fn run_frame<M: RawMutex>(
        &mut self,
        pipeline: &AudioPipeline<M>,
        port: &mut impl AudioPort,
    ) -> Result<Option<AudioSource>, AudioError> {
        let restarted = self.poll_restart(pipeline);
        let mut tx = [0i16; FRAME_SAMPLES * 2];
        let mut rx = [0i16; FRAME_SAMPLES * 2];
        self.fill_tx_frame(pipeline, &mut tx);
        port.exchange(&tx, &mut rx).await?;
        self.drain_rx_frame(pipeline, &rx);
        Ok(restarted)
    }

    /// Builds one outgoing codec frame. `frame` holds interleaved stereo
    /// pairs; both channels receive the same sample.
    pub fn fill_tx_frame<M: RawMutex>(&mut self, pipeline: &AudioPipeline<M>, frame: &mut [i16]) {
        frame.fill(0);
        if self.active == AudioSource::Disabled {
            return;
        }
        let factor = self.active.rate_factor();
        let mut scratch = [0i16; FRAME_SAMPLES * 2];
        let mut line = [0i16; FRAME_SAMPLES];

        for pairs in frame.chunks_mut(FRAME_SAMPLES * 2) {
            let count = pairs.len() / 2;
            let wanted = &mut scratch[..count * factor];
            let got = pipeline.pop_tx(wanted);
            wanted[got..].fill(0);

            for (index, out) in line[..count].iter_mut().enumerate() {
                *out = if factor == 2 {
                    decimate_pair(wanted[index * 2], wanted[index * 2 + 1])
                } else {
                    wanted[index]
                };
            }
            for (pair, &sample) in pairs.chunks_exact_mut(2).zip(line.iter()) {
                pair[0] = sample;
                pair[1] = sample;
            }
            if self.active.is_voice() {
                pipeline.push_align(&line[..count]);
            }
        }
    }

    /// Consumes one incoming codec frame.
    pub fn drain_rx_frame<M: RawMutex>(&mut self, pipeline: &AudioPipeline<M>, frame: &[i16]) {
        if self.active == AudioSource::Disabled {
            return;
        }
        let mut line = [0i16; FRAME_SAMPLES];
        let mut aligned = [0i16; FRAME_SAMPLES];
        let mut wide = [0i16; FRAME_SAMPLES * 2];

        for pairs in frame.chunks(FRAME_SAMPLES * 2) {
            let count = pairs.len() / 2;
            for (out, pair) in line.iter_mut().zip(pairs.chunks_exact(2)) {
                *out = pair[0];
            }
            let line = &mut line[..count];

            match self.active {
                AudioSource::Tone => {
                    for sample in line.iter_mut() {
                        *sample = self.dc.process(*sample);
                    }
                    pipeline.push_rx(line);
                }
                AudioSource::Voice8k | AudioSource::Voice16k => {
                    let aligned = &mut aligned[..count];
                    pipeline.pop_align(aligned);
                    let muted = pipeline.is_muted();
                    for (sample, &tx) in line.iter_mut().zip(aligned.iter()) {
                        let rx = sample.saturating_neg();
                        let cleaned = self.canceller.update(tx, rx);
                        *sample = if muted { 0 } else { cleaned };
                    }
                    if self.active == AudioSource::Voice16k {
                        let written = self.interpolator.process_block(line, &mut wide);
                        pipeline.push_rx(&wide[..written]);
                    } else {
                        pipeline.push_rx(line);
                    }
                }
                AudioSource::Disabled => {}
            }
        }
        pipeline.count_frame();
    }
}
