use bridge_core::audio::{AudioConfig, AudioEngine, AudioStats, ECHO_TAIL_SAMPLES};
use bridge_core::dsp::NlmsCanceller;
use bridge_core::ticks::POTS_TICK_MS;
use embassy_time::{Duration, Ticker};
use portable_atomic::Ordering;

use super::{CODEC_READY, FATAL, PIPELINE, TELEMETRY, now};
use crate::hw::SpiAudioPort;
use crate::status;

/// Frames between counter checks, one second of audio.
const STATS_INTERVAL_FRAMES: u32 = 100;

#[embassy_executor::task]
pub async fn run(mut port: SpiAudioPort<'static>, config: AudioConfig) -> ! {
    let mut engine = AudioEngine::new(NlmsCanceller::<ECHO_TAIL_SAMPLES>::new(), config);
    let mut last_stats = AudioStats::default();
    let mut frames = 0u32;
    let mut ticker = Ticker::every(Duration::from_millis(u64::from(POTS_TICK_MS)));
    loop {
        ticker.next().await;
        if FATAL.is_latched() || !CODEC_READY.load(Ordering::Acquire) {
            continue;
        }
        match engine.run_frame(&PIPELINE, &mut port).await {
            Ok(Some(source)) => TELEMETRY.audio_source(source, now()),
            Ok(None) => {}
            Err(err) => defmt::warn!("audio: {}", defmt::Display2Format(&err)),
        }

        frames = frames.wrapping_add(1);
        if frames % STATS_INTERVAL_FRAMES == 0 {
            let stats = PIPELINE.stats();
            TELEMETRY.audio(&stats.changes_since(&last_stats), now());
            status::record_audio(&stats);
            last_stats = stats;
        }
    }
}
