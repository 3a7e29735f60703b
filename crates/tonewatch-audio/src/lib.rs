//! Audio sources and sinks for the DTMF listener.

pub mod capture;
pub mod device;
pub mod playback;
pub mod replay;

pub use capture::CaptureSource;
pub use playback::Playback;
pub use replay::{RawReader, ReplaySource};
