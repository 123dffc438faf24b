use super::{SampleSource, ToneBank};
use crate::country::{ToneDescriptor, ToneSegment, ToneSource};

const SAMPLES_PER_MS: u32 = 8;

#[derive(Clone, Debug)]
enum Playback {
    Synth {
        descriptor: ToneDescriptor,
        index: usize,
        sounding: bool,
        /// Samples left in the current half of the segment; `None` sounds forever.
        remaining: Option<u32>,
        bank: ToneBank,
    },
    Sampled {
        table: &'static [i16],
        position: usize,
    },
    Finished,
}

/// Plays a country tone: a cadenced synthesized tone or a looped recording.
///
/// Segments play in order, each sounding for its on-time and then staying
/// silent for its off-time. A repeating descriptor returns to its first
/// segment after the last one; a one-shot descriptor finishes instead.
#[derive(Clone, Debug)]
pub struct TonePlayer {
    source: ToneSource,
    playback: Playback,
}

impl TonePlayer {
    #[must_use]
    pub fn new(source: ToneSource) -> Self {
        let mut player = Self {
            source,
            playback: Playback::Finished,
        };
        player.restart();
        player
    }

    /// Starts again from the first segment or sample.
    pub fn restart(&mut self) {
        self.playback = match self.source {
            ToneSource::Synth(descriptor) => match descriptor.segments().first() {
                Some(first) => Playback::Synth {
                    descriptor,
                    index: 0,
                    sounding: true,
                    remaining: on_samples(first),
                    bank: ToneBank::new(&first.frequencies, first.level),
                },
                None => Playback::Finished,
            },
            ToneSource::Sampled(table) if !table.is_empty() => Playback::Sampled { table, position: 0 },
            ToneSource::Sampled(_) => Playback::Finished,
        };
    }

    /// Replaces the tone, e.g. after a country change, and restarts it.
    pub fn load(&mut self, source: ToneSource) {
        self.source = source;
        self.restart();
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(self.playback, Playback::Finished)
    }

    fn next_sample(&mut self) -> Option<i16> {
        match &mut self.playback {
            Playback::Finished => None,
            Playback::Sampled { table, position } => {
                let sample = table[*position];
                *position = (*position + 1) % table.len();
                Some(sample)
            }
            Playback::Synth {
                descriptor,
                index,
                sounding,
                remaining,
                bank,
            } => {
                while *remaining == Some(0) {
                    let segments = descriptor.segments();
                    if *sounding {
                        *sounding = false;
                        *remaining = Some(u32::from(segments[*index].off_ms) * SAMPLES_PER_MS);
                        continue;
                    }
                    *index += 1;
                    if *index == segments.len() {
                        if !descriptor.repeats() {
                            self.playback = Playback::Finished;
                            return None;
                        }
                        *index = 0;
                    }
                    let segment = &segments[*index];
                    *sounding = true;
                    *remaining = on_samples(segment);
                    *bank = ToneBank::new(&segment.frequencies, segment.level);
                }
                if let Some(left) = remaining {
                    *left -= 1;
                }
                Some(if *sounding { bank.next_sample() } else { 0 })
            }
        }
    }
}

fn on_samples(segment: &ToneSegment) -> Option<u32> {
    if segment.is_continuous() {
        None
    } else {
        Some(u32::from(segment.on_ms) * SAMPLES_PER_MS)
    }
}

impl SampleSource for TonePlayer {
    fn fill(&mut self, out: &mut [i16]) -> usize {
        let mut produced = 0;
        for slot in out.iter_mut() {
            match self.next_sample() {
                Some(sample) => {
                    *slot = sample;
                    produced += 1;
                }
                None => break,
            }
        }
        produced
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loud_samples(player: &mut TonePlayer, count: usize) -> usize {
        let mut out = [0i16; 8];
        let mut loud = 0;
        for _ in 0..count / out.len() {
            let produced = player.fill(&mut out);
            loud += out[..produced].iter().filter(|s| s.abs() > 100).count();
        }
        loud
    }

    #[test]
    fn continuous_tone_never_finishes() {
        let mut player = TonePlayer::new(ToneSource::Synth(ToneDescriptor::continuous(
            [350, 440, 0, 0],
            -13,
        )));
        let mut out = [0i16; 80];
        for _ in 0..1_000 {
            assert_eq!(player.fill(&mut out), 80);
        }
        assert!(!player.is_finished());
    }

    #[test]
    fn cadenced_tone_alternates_and_repeats() {
        let descriptor = ToneDescriptor::cadenced([400, 0, 0, 0], -13, &[(100, 100)]);
        let mut player = TonePlayer::new(ToneSource::Synth(descriptor));
        let on = loud_samples(&mut player, 800);
        let off = loud_samples(&mut player, 800);
        let on_again = loud_samples(&mut player, 800);
        assert!(on > 600, "on period too quiet: {on}");
        assert_eq!(off, 0);
        assert!(on_again > 600);
    }

    #[test]
    fn one_shot_descriptor_finishes_after_last_segment() {
        let descriptor = ToneDescriptor::cadenced([2_130, 2_750, 0, 0], -13, &[(10, 5)]).once();
        let mut player = TonePlayer::new(ToneSource::Synth(descriptor));
        let mut out = [0i16; 200];
        assert_eq!(player.fill(&mut out), 120);
        assert!(player.is_finished());
        assert_eq!(player.fill(&mut out), 0);

        player.restart();
        assert_eq!(player.fill(&mut out), 120);
    }

    #[test]
    fn sampled_source_loops_table() {
        static TABLE: [i16; 3] = [1, 2, 3];
        let mut player = TonePlayer::new(ToneSource::Sampled(&TABLE));
        let mut out = [0i16; 7];
        assert_eq!(player.fill(&mut out), 7);
        assert_eq!(out, [1, 2, 3, 1, 2, 3, 1]);
    }
}
