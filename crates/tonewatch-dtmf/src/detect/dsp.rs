use crate::error::ConfigError;
use crate::tones::{KeyMatrix, TargetFrequency, GROUP_LEN, TOTAL_BINS};

/// One magnitude per target frequency, in bank order.
pub type MagnitudeVector = [f32; TOTAL_BINS];

/// Goertzel recurrence coefficients, `2·cos(2π·f/fs)` per target frequency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoefficientTable {
    coeffs: [f32; TOTAL_BINS],
}

impl CoefficientTable {
    /// Validate the tone set against the sample rate and compute coefficients.
    pub fn new(
        sample_rate_hz: u32,
        tones: &[TargetFrequency; TOTAL_BINS],
    ) -> Result<Self, ConfigError> {
        if sample_rate_hz == 0 {
            return Err(ConfigError::SampleRate(sample_rate_hz));
        }
        let nyquist_hz = sample_rate_hz as f32 / 2.0;
        for tone in tones {
            if !tone.freq_hz.is_finite() || tone.freq_hz <= 0.0 {
                return Err(ConfigError::NonPositiveFrequency {
                    label: tone.label,
                    freq_hz: tone.freq_hz,
                });
            }
            if tone.freq_hz >= nyquist_hz {
                return Err(ConfigError::AboveNyquist {
                    label: tone.label,
                    freq_hz: tone.freq_hz,
                    nyquist_hz,
                });
            }
        }
        Ok(Self {
            coeffs: goertzel_coeffs(sample_rate_hz, tones),
        })
    }

    pub fn coeffs(&self) -> &[f32; TOTAL_BINS] {
        &self.coeffs
    }
}

fn goertzel_coeffs(sample_rate_hz: u32, tones: &[TargetFrequency; TOTAL_BINS]) -> [f32; TOTAL_BINS] {
    std::array::from_fn(|i| {
        let omega =
            2.0 * std::f64::consts::PI * f64::from(tones[i].freq_hz) / f64::from(sample_rate_hz);
        (2.0 * omega.cos()) as f32
    })
}

/// Eight parallel Goertzel filters sharing one coefficient table.
///
/// Filter state lives on the stack of [`GoertzelBank::magnitudes`], so no
/// accumulator survives from one block to the next.
#[derive(Debug, Clone)]
pub struct GoertzelBank {
    table: CoefficientTable,
}

impl GoertzelBank {
    pub fn new(table: CoefficientTable) -> Self {
        Self { table }
    }

    /// Run every filter over one block and return the final magnitudes.
    pub fn magnitudes(&self, block: &[i16]) -> MagnitudeVector {
        let coeffs = self.table.coeffs;
        let mut q1 = [0.0f32; TOTAL_BINS];
        let mut q2 = [0.0f32; TOTAL_BINS];

        for &sample in block {
            let x = f32::from(sample);
            for i in 0..TOTAL_BINS {
                let q0 = coeffs[i] * q1[i] - q2[i] + x;
                q2[i] = q1[i];
                q1[i] = q0;
            }
        }

        goertzel_finish(q1, q2, coeffs)
    }
}

fn goertzel_finish<const N: usize>(q1: [f32; N], q2: [f32; N], coeffs: [f32; N]) -> [f32; N] {
    // Rounding can push the power a hair below zero for near-silent bins.
    std::array::from_fn(|i| {
        let power = q1[i] * q1[i] + q2[i] * q2[i] - q1[i] * q2[i] * coeffs[i];
        power.max(0.0).sqrt()
    })
}

/// Classifier output for one block.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DetectionResult {
    /// Largest row-group magnitude (0 when no row tone is present).
    pub max_row: f32,
    /// Largest column-group magnitude (0 when no column tone is present).
    pub max_col: f32,
    /// Index of the dominant row tone within the row group.
    pub row: Option<usize>,
    /// Index of the dominant column tone within the column group.
    pub col: Option<usize>,
    pub key: Option<char>,
}

impl DetectionResult {
    /// Mean of the two dominant magnitudes, or zero when no key was selected.
    /// Diagnostic only.
    pub fn confidence(&self) -> f32 {
        if self.key.is_some() {
            (self.max_row + self.max_col) / 2.0
        } else {
            0.0
        }
    }

    /// Both dominant magnitudes strictly exceed `threshold`.
    pub fn is_strong(&self, threshold: f32) -> bool {
        self.max_row > threshold && self.max_col > threshold
    }
}

/// Pick the dominant row and column tones and look up the matching key.
pub fn classify(mags: &MagnitudeVector, keys: &KeyMatrix) -> DetectionResult {
    let (max_row, row) = dominant(&mags[..GROUP_LEN]);
    let (max_col, col) = dominant(&mags[GROUP_LEN..]);
    let key = match (row, col) {
        (Some(r), Some(c)) => Some(keys[r][c]),
        _ => None,
    };
    DetectionResult {
        max_row,
        max_col,
        row,
        col,
        key,
    }
}

// Strict `>` from zero: the lowest index wins ties and an all-zero group
// selects nothing.
fn dominant(values: &[f32]) -> (f32, Option<usize>) {
    let mut max_v = 0.0f32;
    let mut max_i = None;
    for (i, &v) in values.iter().enumerate() {
        if v > max_v {
            max_v = v;
            max_i = Some(i);
        }
    }
    (max_v, max_i)
}

/// Mean absolute sample value of a block.
pub fn audio_level(block: &[i16]) -> f32 {
    if block.is_empty() {
        return 0.0;
    }
    let sum: u64 = block.iter().map(|&s| u64::from(s.unsigned_abs())).sum();
    sum as f32 / block.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tones::{DTMF_KEYS, DTMF_TONES};
    use rustfft::num_complex::Complex;
    use rustfft::FftPlanner;

    const FS: u32 = 8000;
    const N: usize = 1024;

    fn bank() -> GoertzelBank {
        GoertzelBank::new(CoefficientTable::new(FS, &DTMF_TONES).expect("table"))
    }

    fn sine(freq_hz: f32, amplitude: f32, n: usize) -> Vec<i16> {
        (0..n)
            .map(|i| {
                let t = i as f32 / FS as f32;
                (amplitude * (2.0 * std::f32::consts::PI * freq_hz * t).sin()).round() as i16
            })
            .collect()
    }

    #[test]
    fn coefficients_match_reference() {
        let table = CoefficientTable::new(FS, &DTMF_TONES).expect("table");
        for (tone, &coeff) in DTMF_TONES.iter().zip(table.coeffs()) {
            let reference =
                2.0 * (2.0 * std::f64::consts::PI * f64::from(tone.freq_hz) / f64::from(FS)).cos();
            assert!(
                (f64::from(coeff) - reference).abs() < 1e-6,
                "{}: {} vs {}",
                tone.label,
                coeff,
                reference
            );
        }
    }

    #[test]
    fn rejects_zero_sample_rate() {
        assert_eq!(
            CoefficientTable::new(0, &DTMF_TONES),
            Err(ConfigError::SampleRate(0))
        );
    }

    #[test]
    fn rejects_tone_at_nyquist() {
        // 1633 Hz is exactly Nyquist at 3266 Hz.
        let err = CoefficientTable::new(3266, &DTMF_TONES).unwrap_err();
        assert!(matches!(err, ConfigError::AboveNyquist { label: "1633Hz", .. }));
    }

    #[test]
    fn rejects_non_positive_tone() {
        let mut tones = DTMF_TONES;
        tones[2] = TargetFrequency::new("bad", 0.0);
        let err = CoefficientTable::new(FS, &tones).unwrap_err();
        assert!(matches!(err, ConfigError::NonPositiveFrequency { label: "bad", .. }));
    }

    #[test]
    fn pure_tone_dominates_its_bin() {
        let bank = bank();
        for (target, tone) in DTMF_TONES.iter().enumerate() {
            let mags = bank.magnitudes(&sine(tone.freq_hz, 8000.0, N));
            for (i, &m) in mags.iter().enumerate() {
                if i != target {
                    assert!(
                        mags[target] > 10.0 * m,
                        "{} leaked into bin {}: {} vs {}",
                        tone.label,
                        i,
                        m,
                        mags[target]
                    );
                }
            }
        }
    }

    #[test]
    fn silence_yields_zero_and_no_key() {
        let mags = bank().magnitudes(&vec![0i16; N]);
        assert_eq!(mags, [0.0; TOTAL_BINS]);
        let result = classify(&mags, &DTMF_KEYS);
        assert_eq!(result.key, None);
        assert_eq!(result.row, None);
        assert_eq!(result.col, None);
        assert_eq!(result.confidence(), 0.0);
    }

    #[test]
    fn repeated_runs_are_identical() {
        let bank = bank();
        let block = sine(1336.0, 5000.0, N);
        assert_eq!(bank.magnitudes(&block), bank.magnitudes(&block));
    }

    #[test]
    fn matches_dft_bin_magnitude() {
        // 1000 Hz lands exactly on bin 128 at 8 kHz / 1024.
        let freq = 1000.0;
        let tones = [TargetFrequency::new("1000Hz", freq); TOTAL_BINS];
        let bank = GoertzelBank::new(CoefficientTable::new(FS, &tones).expect("table"));
        let block = sine(freq, 3000.0, N);
        let goertzel = bank.magnitudes(&block)[0];

        let mut buf: Vec<Complex<f32>> =
            block.iter().map(|&s| Complex::new(f32::from(s), 0.0)).collect();
        FftPlanner::<f32>::new().plan_fft_forward(N).process(&mut buf);
        let dft = buf[128].norm();

        assert!((goertzel - dft).abs() / dft < 1e-3, "{} vs {}", goertzel, dft);
    }

    #[test]
    fn classifies_dual_tone() {
        let bank = bank();
        let row = sine(770.0, 6000.0, N);
        let col = sine(1477.0, 6000.0, N);
        let block: Vec<i16> = row.iter().zip(&col).map(|(a, b)| a + b).collect();
        let result = classify(&bank.magnitudes(&block), &DTMF_KEYS);
        assert_eq!(result.row, Some(1));
        assert_eq!(result.col, Some(2));
        assert_eq!(result.key, Some('6'));
        assert!(result.confidence() > 0.0);
    }

    #[test]
    fn row_tie_selects_lower_index() {
        let mags = [10.0, 50.0, 50.0, 5.0, 1.0, 2.0, 2.0, 0.5];
        let result = classify(&mags, &DTMF_KEYS);
        assert_eq!(result.row, Some(1));
        assert_eq!(result.col, Some(1));
        assert_eq!(result.key, Some('5'));
    }

    #[test]
    fn empty_column_group_selects_no_key() {
        let mags = [10.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let result = classify(&mags, &DTMF_KEYS);
        assert_eq!(result.row, Some(0));
        assert_eq!(result.col, None);
        assert_eq!(result.key, None);
        assert_eq!(result.max_row, 10.0);
    }

    #[test]
    fn audio_level_is_mean_absolute() {
        assert_eq!(audio_level(&[]), 0.0);
        assert_eq!(audio_level(&[100, -100, 0, i16::MIN]), (200.0 + 32768.0) / 4.0);
    }
}
