pub mod dial;
pub mod modulator;
mod oscillator;

pub use dial::{encode_dial, DialSymbol, EncodeError};
pub use modulator::{to_i16, DtmfModulator};
