pub mod dsp;
pub mod state;

use dsp::{audio_level, classify, CoefficientTable, DetectionResult, GoertzelBank, MagnitudeVector};
use state::{DetectionEvent, Detector};
use tracing::{debug, info, trace};

use crate::error::{BlockError, ConfigError};
use crate::tones::{TargetFrequency, DTMF_KEYS, DTMF_TONES, GROUP_LEN, TOTAL_BINS};

pub const DEFAULT_SAMPLE_RATE_HZ: u32 = 8000;
pub const DEFAULT_BLOCK_LEN: usize = 1024;
pub const DEFAULT_THRESHOLD: f32 = 1000.0;
pub const DEFAULT_RELEASE_RATIO: f32 = 0.5;
pub const DEFAULT_HISTORY_LEN: usize = 12;

/// Everything the pipeline computed for one block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cycle {
    pub magnitudes: MagnitudeVector,
    pub result: DetectionResult,
    /// Mean absolute sample value of the block.
    pub audio_level: f32,
    pub event: Option<DetectionEvent>,
}

/// Snapshot of detector state handed to a telemetry sink between cycles.
#[derive(Debug, Clone, PartialEq)]
pub struct Telemetry {
    pub result: DetectionResult,
    pub threshold: f32,
    pub count: u64,
    pub last_key: Option<char>,
    /// Recent keys, most recent last.
    pub history: Vec<char>,
}

/// Consumer of per-cycle telemetry. Implementations may drop updates to
/// rate-limit rendering; the pipeline never waits on them.
pub trait TelemetrySink {
    fn publish(&mut self, telemetry: &Telemetry, event: Option<&DetectionEvent>);
}

/// Block-by-block DTMF listener: filter bank, classifier and detector.
pub struct DtmfListener {
    sample_rate_hz: u32,
    block_len: usize,
    tones: [TargetFrequency; TOTAL_BINS],
    bank: GoertzelBank,
    detector: Detector,
}

impl DtmfListener {
    /// Create a builder with default settings.
    pub fn builder(sample_rate_hz: u32) -> DtmfListenerBuilder {
        DtmfListenerBuilder::new(sample_rate_hz)
    }

    /// Run one block through the pipeline.
    ///
    /// The block must hold exactly [`block_len`](Self::block_len) samples;
    /// a mismatched block is rejected without touching detector state.
    pub fn process_block(&mut self, block: &[i16]) -> Result<Cycle, BlockError> {
        if block.len() != self.block_len {
            return Err(BlockError {
                expected: self.block_len,
                actual: block.len(),
            });
        }

        let magnitudes = self.bank.magnitudes(block);
        let result = classify(&magnitudes, &DTMF_KEYS);
        let event = self.detector.update(&result);

        if let Some(ev) = &event {
            info!(
                key = %ev.key,
                count = ev.count,
                row = self.tones[ev.row].label,
                row_magnitude = ev.row_magnitude,
                col = self.tones[GROUP_LEN + ev.col].label,
                col_magnitude = ev.col_magnitude,
                "dtmf detected"
            );
        } else {
            debug!(
                max_row = result.max_row,
                max_col = result.max_col,
                key = ?result.key,
                "no new key"
            );
        }

        Ok(Cycle {
            magnitudes,
            result,
            audio_level: audio_level(block),
            event,
        })
    }

    /// Snapshot for a telemetry sink.
    pub fn telemetry(&self, result: &DetectionResult) -> Telemetry {
        Telemetry {
            result: *result,
            threshold: self.detector.threshold(),
            count: self.detector.count(),
            last_key: self.detector.last_key(),
            history: self.detector.history().to_vec(),
        }
    }

    /// Change the detection threshold. Invalid values leave the old one in place.
    pub fn set_threshold(&mut self, threshold: f32) -> Result<(), ConfigError> {
        validate_threshold(threshold)?;
        debug!(old = self.detector.threshold(), new = threshold, "threshold changed");
        self.detector.set_threshold(threshold);
        Ok(())
    }

    /// Clear detector state; configuration is kept.
    pub fn reset(&mut self) {
        self.detector.reset();
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    pub fn block_len(&self) -> usize {
        self.block_len
    }

    pub fn threshold(&self) -> f32 {
        self.detector.threshold()
    }

    pub fn tones(&self) -> &[TargetFrequency; TOTAL_BINS] {
        &self.tones
    }

    pub fn detector(&self) -> &Detector {
        &self.detector
    }
}

fn validate_threshold(threshold: f32) -> Result<(), ConfigError> {
    if threshold.is_finite() && threshold > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Threshold(threshold))
    }
}

/// Builder for configuring a DtmfListener.
pub struct DtmfListenerBuilder {
    sample_rate_hz: u32,
    block_len: usize,
    threshold: f32,
    release_ratio: f32,
    history_len: usize,
    tones: [TargetFrequency; TOTAL_BINS],
}

impl DtmfListenerBuilder {
    /// Create a builder with defaults for the given sample rate.
    pub fn new(sample_rate_hz: u32) -> Self {
        Self {
            sample_rate_hz,
            block_len: DEFAULT_BLOCK_LEN,
            threshold: DEFAULT_THRESHOLD,
            release_ratio: DEFAULT_RELEASE_RATIO,
            history_len: DEFAULT_HISTORY_LEN,
            tones: DTMF_TONES,
        }
    }

    /// Set the number of samples per block.
    pub fn block_len(mut self, block_len: usize) -> Self {
        self.block_len = block_len;
        self
    }

    /// Set the level both dominant magnitudes must exceed to report a key.
    pub fn threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the release level as a fraction of the threshold.
    pub fn release_ratio(mut self, ratio: f32) -> Self {
        self.release_ratio = ratio;
        self
    }

    /// Set how many recent keys are remembered.
    pub fn history_len(mut self, len: usize) -> Self {
        self.history_len = len;
        self
    }

    /// Replace the target frequency set. Rows first, then columns.
    pub fn tones(mut self, tones: [TargetFrequency; TOTAL_BINS]) -> Self {
        self.tones = tones;
        self
    }

    /// Validate the configuration and build the listener.
    pub fn build(self) -> Result<DtmfListener, ConfigError> {
        if self.block_len == 0 {
            return Err(ConfigError::EmptyBlock);
        }
        validate_threshold(self.threshold)?;
        if !(self.release_ratio > 0.0 && self.release_ratio <= 1.0) {
            return Err(ConfigError::ReleaseRatio(self.release_ratio));
        }
        if self.history_len == 0 {
            return Err(ConfigError::HistoryCapacity);
        }
        let table = CoefficientTable::new(self.sample_rate_hz, &self.tones)?;

        for (tone, coeff) in self.tones.iter().zip(table.coeffs()) {
            trace!(tone = tone.label, coeff, "goertzel coefficient");
        }

        Ok(DtmfListener {
            sample_rate_hz: self.sample_rate_hz,
            block_len: self.block_len,
            tones: self.tones,
            bank: GoertzelBank::new(table),
            detector: Detector::new(self.threshold, self.release_ratio, self.history_len),
        })
    }
}
