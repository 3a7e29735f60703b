use std::sync::OnceLock;

const TABLE_LEN: usize = 4096;

static SINE_TABLE: OnceLock<Vec<f32>> = OnceLock::new();

fn sine_table() -> &'static [f32] {
    SINE_TABLE.get_or_init(|| {
        (0..TABLE_LEN)
            .map(|i| (i as f32 * std::f32::consts::TAU / TABLE_LEN as f32).sin())
            .collect()
    })
}

/// Table phase accumulator for one sinusoid.
#[derive(Clone, Copy)]
struct Phase {
    pos: f32,
    inc: f32,
}

impl Phase {
    fn new(sample_rate_hz: f32, freq_hz: f32) -> Self {
        Self {
            pos: 0.0,
            inc: freq_hz * TABLE_LEN as f32 / sample_rate_hz,
        }
    }

    fn sample(&mut self, table: &[f32]) -> f32 {
        let idx = self.pos as usize;
        let frac = self.pos - idx as f32;
        let value = table[idx] * (1.0 - frac) + table[(idx + 1) % TABLE_LEN] * frac;
        self.pos += self.inc;
        if self.pos >= TABLE_LEN as f32 {
            self.pos %= TABLE_LEN as f32;
        }
        value
    }
}

/// Sum of a row and a column sinusoid, each at half amplitude so the
/// output stays within [-1, 1].
pub(crate) struct DualToneOscillator {
    low: Phase,
    high: Phase,
}

impl DualToneOscillator {
    pub(crate) fn new(sample_rate_hz: f32, low_hz: f32, high_hz: f32) -> Self {
        Self {
            low: Phase::new(sample_rate_hz, low_hz),
            high: Phase::new(sample_rate_hz, high_hz),
        }
    }

    pub(crate) fn next(&mut self) -> f32 {
        let table = sine_table();
        0.5 * (self.low.sample(table) + self.high.sample(table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stays_within_unit_range() {
        let mut osc = DualToneOscillator::new(8000.0, 941.0, 1633.0);
        for _ in 0..8000 {
            let v = osc.next();
            assert!((-1.0..=1.0).contains(&v), "{}", v);
        }
    }

    #[test]
    fn starts_at_zero_phase() {
        let mut osc = DualToneOscillator::new(8000.0, 697.0, 1209.0);
        assert_eq!(osc.next(), 0.0);
        assert!(osc.next() > 0.0);
    }
}
