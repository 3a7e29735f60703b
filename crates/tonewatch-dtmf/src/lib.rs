//! DTMF key detection over fixed-size blocks of 16-bit audio.
//!
//! A bank of eight Goertzel filters measures the energy at each DTMF tone,
//! the strongest row and column tones select a key, and an edge-triggered
//! detector with release hysteresis turns that into discrete key events.

pub mod detect;
pub mod error;
pub mod history;
pub mod source;
pub mod tones;

pub use detect::dsp::{
    audio_level, classify, CoefficientTable, DetectionResult, GoertzelBank, MagnitudeVector,
};
pub use detect::state::{DetectionEvent, Detector};
pub use detect::{Cycle, DtmfListener, DtmfListenerBuilder, Telemetry, TelemetrySink};
pub use error::{BlockError, CaptureError, ConfigError};
pub use history::KeyHistory;
pub use source::{AudioBlock, BlockSource};
pub use tones::{
    key_frequencies, key_position, KeyMatrix, TargetFrequency, DTMF_KEYS, DTMF_TONES, GROUP_LEN,
    TOTAL_BINS,
};
