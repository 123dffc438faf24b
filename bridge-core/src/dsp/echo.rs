use super::EchoCanceller;
use crate::audio::ECHO_TAIL_SAMPLES;

/// Leaves receive audio untouched.
#[derive(Copy, Clone, Debug, Default)]
pub struct PassthroughCanceller;

impl EchoCanceller for PassthroughCanceller {
    fn update(&mut self, _tx: i16, rx: i16) -> i16 {
        rx
    }

    fn flush(&mut self) {}
}

const STEP_SIZE: f32 = 0.5;
const REGULARIZATION: f32 = 1.0e4;

/// Normalized LMS canceller with a fixed tail.
#[derive(Clone, Debug)]
pub struct NlmsCanceller<const TAPS: usize = ECHO_TAIL_SAMPLES> {
    weights: [f32; TAPS],
    history: [f32; TAPS],
    head: usize,
    energy: f32,
}

impl<const TAPS: usize> NlmsCanceller<TAPS> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            weights: [0.0; TAPS],
            history: [0.0; TAPS],
            head: 0,
            energy: 0.0,
        }
    }
}

impl<const TAPS: usize> Default for NlmsCanceller<TAPS> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const TAPS: usize> EchoCanceller for NlmsCanceller<TAPS> {
    fn update(&mut self, tx: i16, rx: i16) -> i16 {
        let incoming = f32::from(tx);
        let outgoing = self.history[self.head];
        self.energy = (self.energy + incoming * incoming - outgoing * outgoing).max(0.0);
        self.history[self.head] = incoming;

        // history[head] is the newest sample; walk backwards in time.
        let mut estimate = 0.0;
        for (tap, weight) in self.weights.iter().enumerate() {
            estimate += weight * self.history[(self.head + TAPS - tap) % TAPS];
        }
        let error = f32::from(rx) - estimate;

        let gain = STEP_SIZE * error / (self.energy + REGULARIZATION);
        for (tap, weight) in self.weights.iter_mut().enumerate() {
            *weight += gain * self.history[(self.head + TAPS - tap) % TAPS];
        }
        self.head = (self.head + 1) % TAPS;

        error.clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16
    }

    fn flush(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noise(u32);

    impl Noise {
        fn next(&mut self) -> i16 {
            self.0 = self.0.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            ((self.0 >> 16) as i16) / 4
        }
    }

    #[test]
    fn converges_on_delayed_echo() {
        let mut canceller = NlmsCanceller::<32>::new();
        let mut noise = Noise(7);
        let mut line = [0i16; 32];
        let mut residual = 0f64;
        let mut echo_power = 0f64;

        for n in 0..16_000 {
            let tx = noise.next();
            line.rotate_right(1);
            line[0] = tx;
            let echo = line[10] / 2;
            let out = canceller.update(tx, echo);
            if n >= 15_000 {
                residual += f64::from(out) * f64::from(out);
                echo_power += f64::from(echo) * f64::from(echo);
            }
        }
        assert!(residual * 100.0 < echo_power, "less than 20 dB of cancellation");
    }

    #[test]
    fn flush_forgets_adaptation() {
        let mut canceller = NlmsCanceller::<8>::new();
        for _ in 0..100 {
            canceller.update(1_000, 500);
        }
        canceller.flush();
        assert_eq!(canceller.update(0, 123), 123);
    }
}
