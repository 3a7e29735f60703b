//! Operator commands read from the console between cycles.

use thiserror::Error;

const DEFAULT_TEST_SECS: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Toggle verbose per-cycle diagnostics.
    ToggleDiagnostics,
    /// Print the first samples of the last block.
    DumpSamples,
    /// Measure input levels for the given number of seconds.
    MicrophoneTest { secs: f32 },
    /// Restart the audio source.
    ResetSource,
    /// Show (`None`) or change the detection threshold.
    Threshold(Option<f32>),
    /// Run the synthesised loopback self-test.
    SelfTest,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown command {0:?} (h for help)")]
    Unknown(String),
    #[error("invalid value {0:?}")]
    InvalidValue(String),
}

pub const HELP: &str = "\
Commands:
  d            - toggle diagnostics
  s            - show raw samples
  t [secs]     - test microphone (default 10 s)
  r            - reset audio input
  th [value]   - show or set detection threshold
  k            - loopback self-test
  h            - help
  q            - quit";

/// Parse one console line. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<Command>, CommandError> {
    let mut parts = line.split_whitespace();
    let Some(name) = parts.next() else {
        return Ok(None);
    };
    let arg = parts.next();

    let cmd = match name.to_ascii_lowercase().as_str() {
        "d" | "debug" => Command::ToggleDiagnostics,
        "s" | "samples" => Command::DumpSamples,
        "t" | "test" => Command::MicrophoneTest {
            secs: match arg {
                Some(v) => parse_positive(v)?,
                None => DEFAULT_TEST_SECS,
            },
        },
        "r" | "reset" => Command::ResetSource,
        "th" | "threshold" => Command::Threshold(arg.map(parse_positive).transpose()?),
        "k" | "selftest" => Command::SelfTest,
        "h" | "help" | "?" => Command::Help,
        "q" | "quit" | "exit" => Command::Quit,
        _ => return Err(CommandError::Unknown(name.to_string())),
    };
    Ok(Some(cmd))
}

fn parse_positive(value: &str) -> Result<f32, CommandError> {
    match value.parse::<f32>() {
        Ok(v) if v.is_finite() && v > 0.0 => Ok(v),
        _ => Err(CommandError::InvalidValue(value.to_string())),
    }
}
