//! Error types for the detection pipeline and its audio boundary.

use thiserror::Error;

/// Invalid listener configuration. Raised before any audio is processed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("sample rate must be positive, got {0} Hz")]
    SampleRate(u32),
    #[error("target frequency {label} must be positive and finite, got {freq_hz} Hz")]
    NonPositiveFrequency { label: &'static str, freq_hz: f32 },
    #[error("target frequency {label} ({freq_hz} Hz) is at or above Nyquist ({nyquist_hz} Hz)")]
    AboveNyquist {
        label: &'static str,
        freq_hz: f32,
        nyquist_hz: f32,
    },
    #[error("block length must be at least one sample")]
    EmptyBlock,
    #[error("detection threshold must be positive and finite, got {0}")]
    Threshold(f32),
    #[error("release ratio must lie in (0, 1], got {0}")]
    ReleaseRatio(f32),
    #[error("history capacity must be at least one key")]
    HistoryCapacity,
}

/// A block handed to the pipeline does not match the configured length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("expected a block of {expected} samples, got {actual}")]
pub struct BlockError {
    pub expected: usize,
    pub actual: usize,
}

/// Failure to obtain the next block from an audio source.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no audio device available")]
    NoDevice,
    #[error("no audio device matched {0:?}")]
    NoMatchingDevice(String),
    #[error("device cannot capture mono audio at {sample_rate_hz} Hz")]
    UnsupportedConfig { sample_rate_hz: u32 },
    #[error("audio device error: {0}")]
    Device(String),
    #[error("audio stream error: {0}")]
    Stream(String),
    #[error("audio source disconnected")]
    Disconnected,
    #[error("end of audio stream")]
    EndOfStream,
    #[error("this audio input cannot be restarted")]
    RestartUnsupported,
    #[error("audio read failed: {0}")]
    Io(#[from] std::io::Error),
}

impl CaptureError {
    /// Whether the source can still deliver blocks after this error.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            CaptureError::Stream(_) | CaptureError::RestartUnsupported
        )
    }
}
