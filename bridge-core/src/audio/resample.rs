//! 2x rate conversion between the 8 kHz line and 16 kHz wideband voice.

const CENTER_WEIGHT: i64 = 38_400;
const INNER_WEIGHT: i64 = -6_400;
const OUTER_WEIGHT: i64 = 768;

/// Averages two 16 kHz samples into one 8 kHz sample.
#[must_use]
pub fn decimate_pair(first: i16, second: i16) -> i16 {
    // The mean of two i16 values always fits.
    ((i32::from(first) + i32::from(second)) / 2) as i16
}

/// Six-tap half-band interpolator producing two output samples per input.
///
/// The first output of each pair is the input delayed by three samples; the
/// second is the filtered midpoint.
#[derive(Clone, Debug, Default)]
pub struct HalfBandInterpolator {
    taps: [i16; 6],
}

impl HalfBandInterpolator {
    #[must_use]
    pub const fn new() -> Self {
        Self { taps: [0; 6] }
    }

    /// Clears the tap history.
    pub fn reset(&mut self) {
        self.taps = [0; 6];
    }

    pub fn process(&mut self, input: i16) -> [i16; 2] {
        self.taps[5] = input;
        let t = self.taps.map(i64::from);
        let held = self.taps[2];
        let acc = CENTER_WEIGHT * (t[2] + t[3])
            + INNER_WEIGHT * (t[1] + t[4])
            + OUTER_WEIGHT * (t[0] + t[5]);
        self.taps.copy_within(1.., 0);
        let filtered = ((acc + 32_768) >> 16).clamp(i64::from(i16::MIN), i64::from(i16::MAX));
        // Clamped above.
        [held, filtered as i16]
    }

    /// Upsamples `input` into `output`, which must hold twice as many samples.
    /// Returns the number of samples written.
    pub fn process_block(&mut self, input: &[i16], output: &mut [i16]) -> usize {
        let mut written = 0;
        for (&sample, pair) in input.iter().zip(output.chunks_exact_mut(2)) {
            pair.copy_from_slice(&self.process(sample));
            written += 2;
        }
        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimation_averages_pairs() {
        assert_eq!(decimate_pair(100, 300), 200);
        assert_eq!(decimate_pair(i16::MAX, i16::MAX), i16::MAX);
        assert_eq!(decimate_pair(i16::MIN, i16::MIN), i16::MIN);
    }

    #[test]
    fn interpolator_settles_to_dc_input() {
        let mut filter = HalfBandInterpolator::new();
        let mut last = [0; 2];
        for _ in 0..8 {
            last = filter.process(1_000);
        }
        assert_eq!(last, [1_000, 1_000]);
    }

    #[test]
    fn interpolator_delays_input_by_three_samples() {
        let mut filter = HalfBandInterpolator::new();
        let outputs: [[i16; 2]; 4] =
            core::array::from_fn(|i| filter.process(if i == 0 { 500 } else { 0 }));
        assert_eq!(outputs[0][0], 0);
        assert_eq!(outputs[3][0], 500);
    }

    #[test]
    fn full_scale_input_is_clamped() {
        let mut filter = HalfBandInterpolator::new();
        for sample in [i16::MIN, i16::MAX, i16::MAX, i16::MIN, i16::MIN, i16::MAX] {
            let [_, filtered] = filter.process(sample);
            assert!((i16::MIN..=i16::MAX).contains(&filtered));
        }
    }

    #[test]
    fn reset_clears_history() {
        let mut filter = HalfBandInterpolator::new();
        filter.process(12_000);
        filter.reset();
        assert_eq!(filter.process(0), [0, 0]);
    }
}
