/// Single-pole DC blocker applied to tone-path receive audio.
#[derive(Clone, Debug, Default)]
pub struct DcRestore {
    state: i32,
}

impl DcRestore {
    #[must_use]
    pub const fn new() -> Self {
        Self { state: 0 }
    }

    pub fn reset(&mut self) {
        self.state = 0;
    }

    pub fn process(&mut self, sample: i16) -> i16 {
        self.state += ((i32::from(sample) << 15) - self.state) >> 14;
        let restored = i32::from(sample) - (self.state >> 15);
        restored.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_constant_offset() {
        let mut dc = DcRestore::new();
        let mut out = 0;
        for _ in 0..200_000 {
            out = dc.process(4_000);
        }
        assert!(out.abs() < 16, "residual offset {out}");
    }

    #[test]
    fn passes_alternating_signal() {
        let mut dc = DcRestore::new();
        let mut peak = 0;
        for i in 0..2_000 {
            let sample = if i % 2 == 0 { 8_000 } else { -8_000 };
            peak = peak.max(dc.process(sample));
        }
        assert!(peak > 7_000);
    }
}
