/// Fixed-capacity circular buffer of 16-bit samples.
///
/// Writing into a full buffer overwrites the oldest samples; the number of
/// pushes that had to drop data is kept in [`SampleBuffer::overflows`].
#[derive(Clone, Debug)]
pub struct SampleBuffer<const N: usize> {
    data: [i16; N],
    read: usize,
    write: usize,
    count: usize,
    overflows: u32,
}

impl<const N: usize> SampleBuffer<N> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            data: [0; N],
            read: 0,
            write: 0,
            count: 0,
            overflows: 0,
        }
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Samples available to read.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.count
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[must_use]
    pub const fn overflows(&self) -> u32 {
        self.overflows
    }

    /// Drops all samples; the overflow count is kept.
    pub fn clear(&mut self) {
        self.read = 0;
        self.write = 0;
        self.count = 0;
    }

    /// Appends `samples`, returning how many old samples were overwritten.
    pub fn push(&mut self, samples: &[i16]) -> usize {
        let mut dropped = 0;
        for &sample in samples {
            self.data[self.write] = sample;
            self.write = (self.write + 1) % N;
            if self.count == N {
                self.read = (self.read + 1) % N;
                dropped += 1;
            } else {
                self.count += 1;
            }
        }
        if dropped > 0 {
            self.overflows = self.overflows.wrapping_add(1);
        }
        dropped
    }

    /// Moves up to `out.len()` samples into `out` and returns the count.
    /// Slots past the returned count are left untouched.
    pub fn pop(&mut self, out: &mut [i16]) -> usize {
        let n = out.len().min(self.count);
        for slot in &mut out[..n] {
            *slot = self.data[self.read];
            self.read = (self.read + 1) % N;
        }
        self.count -= n;
        n
    }
}

impl<const N: usize> Default for SampleBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overflow_keeps_newest_samples() {
        let mut buffer = SampleBuffer::<4>::new();
        assert_eq!(buffer.push(&[1, 2, 3]), 0);
        assert_eq!(buffer.push(&[4, 5, 6]), 2);
        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.overflows(), 1);

        let mut out = [0; 4];
        assert_eq!(buffer.pop(&mut out), 4);
        assert_eq!(out, [3, 4, 5, 6]);
    }

    #[test]
    fn count_never_exceeds_capacity() {
        let mut buffer = SampleBuffer::<16>::new();
        let mut scratch = [0i16; 7];
        for round in 0..200_usize {
            let chunk = [i16::try_from(round % 100).unwrap_or(0); 11];
            buffer.push(&chunk[..round % 11]);
            if round % 3 == 0 {
                buffer.pop(&mut scratch[..round % 7]);
            }
            assert!(buffer.len() <= buffer.capacity());
        }
    }

    #[test]
    fn short_pop_reports_available_count() {
        let mut buffer = SampleBuffer::<8>::new();
        buffer.push(&[7, 8]);
        let mut out = [-1; 5];
        assert_eq!(buffer.pop(&mut out), 2);
        assert_eq!(out, [7, 8, -1, -1, -1]);
        assert!(buffer.is_empty());
    }
}
