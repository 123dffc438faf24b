/// Transmit samples held back until their echo arrives on the receive side.
///
/// Every pop is matched by an earlier push; popping an empty queue yields
/// silence and counts an underrun instead.
#[derive(Clone, Debug)]
pub struct AlignmentQueue<const N: usize> {
    data: [i16; N],
    read: usize,
    write: usize,
    count: usize,
    pushed: u32,
    popped: u32,
    underruns: u32,
    overruns: u32,
}

impl<const N: usize> AlignmentQueue<N> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            data: [0; N],
            read: 0,
            write: 0,
            count: 0,
            pushed: 0,
            popped: 0,
            underruns: 0,
            overruns: 0,
        }
    }

    /// Empties the queue and preloads `depth` samples of silence.
    pub fn reset(&mut self, depth: usize) {
        self.read = 0;
        self.write = 0;
        self.count = 0;
        self.pushed = 0;
        self.popped = 0;
        for _ in 0..depth.min(N) {
            self.push(0);
        }
    }

    pub fn push(&mut self, sample: i16) {
        if self.count == N {
            // Drop the oldest sample as if it had been consumed.
            self.read = (self.read + 1) % N;
            self.count -= 1;
            self.popped = self.popped.wrapping_add(1);
            self.overruns = self.overruns.wrapping_add(1);
        }
        self.data[self.write] = sample;
        self.write = (self.write + 1) % N;
        self.count += 1;
        self.pushed = self.pushed.wrapping_add(1);
    }

    pub fn pop(&mut self) -> i16 {
        if self.count == 0 {
            self.underruns = self.underruns.wrapping_add(1);
            return 0;
        }
        let sample = self.data[self.read];
        self.read = (self.read + 1) % N;
        self.count -= 1;
        self.popped = self.popped.wrapping_add(1);
        sample
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.count
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Pushes minus pops since the last reset.
    #[must_use]
    pub const fn backlog(&self) -> u32 {
        self.pushed.wrapping_sub(self.popped)
    }

    #[must_use]
    pub const fn underruns(&self) -> u32 {
        self.underruns
    }

    #[must_use]
    pub const fn overruns(&self) -> u32 {
        self.overruns
    }
}

impl<const N: usize> Default for AlignmentQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_delays_samples_by_depth() {
        let mut queue = AlignmentQueue::<16>::new();
        queue.reset(3);
        for sample in 1..=3 {
            queue.push(sample);
        }
        let popped: [i16; 6] = core::array::from_fn(|_| queue.pop());
        assert_eq!(popped, [0, 0, 0, 1, 2, 3]);
        assert_eq!(queue.underruns(), 0);
    }

    #[test]
    fn empty_pop_is_silence_and_counted() {
        let mut queue = AlignmentQueue::<4>::new();
        assert_eq!(queue.pop(), 0);
        assert_eq!(queue.underruns(), 1);
        assert_eq!(queue.backlog(), 0);
    }

    #[test]
    fn backlog_matches_length_through_overrun() {
        let mut queue = AlignmentQueue::<4>::new();
        for sample in 0..10 {
            queue.push(sample);
            assert_eq!(queue.backlog() as usize, queue.len());
        }
        assert_eq!(queue.overruns(), 6);
        assert_eq!(queue.pop(), 6);
    }
}
