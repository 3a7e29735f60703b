mod commands;
mod diagnostics;
mod display;
mod listen;
mod logging;
mod selftest;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tonewatch_audio::{device::list_devices, Playback};
use tonewatch_dtmf::detect::{
    DEFAULT_BLOCK_LEN, DEFAULT_HISTORY_LEN, DEFAULT_RELEASE_RATIO, DEFAULT_SAMPLE_RATE_HZ,
    DEFAULT_THRESHOLD,
};
use tonewatch_tone::modulator::{DEFAULT_GAP_MS, DEFAULT_TONE_MS};
use tonewatch_tone::{encode_dial, DtmfModulator};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "tonewatch",
    version,
    about = "Live DTMF keypad listener",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    /// Raise log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Mode>,

    #[command(flatten)]
    listen: ListenArgs,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Listen for DTMF keys (the default).
    Listen(ListenArgs),
    /// Play a dial string through an output device.
    Dial(DialArgs),
    /// Synthesise every key and check that the detector reports it.
    SelfTest(DetectorArgs),
    /// List audio input and output devices.
    Devices,
}

/// Detector tuning shared by listening and the self-test.
#[derive(Args, Debug, Clone)]
struct DetectorArgs {
    /// Sample rate in Hz.
    #[arg(long, env = "TONEWATCH_SAMPLE_RATE", default_value_t = DEFAULT_SAMPLE_RATE_HZ)]
    sample_rate: u32,

    /// Samples per analysis block.
    #[arg(long, env = "TONEWATCH_BLOCK_LEN", default_value_t = DEFAULT_BLOCK_LEN)]
    block_len: usize,

    /// Magnitude both dominant tones must exceed to report a key.
    #[arg(long, env = "TONEWATCH_THRESHOLD", default_value_t = DEFAULT_THRESHOLD)]
    threshold: f32,

    /// Fraction of the threshold both tones must fall below to release a key.
    #[arg(long, env = "TONEWATCH_RELEASE_RATIO", default_value_t = DEFAULT_RELEASE_RATIO)]
    release_ratio: f32,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct ListenArgs {
    #[command(flatten)]
    detector: DetectorArgs,

    /// Regex selecting the input device (default input otherwise).
    #[arg(long, env = "TONEWATCH_DEVICE")]
    device: Option<String>,

    /// Read raw s16le mono PCM from a file, or `-` for stdin.
    #[arg(long, conflicts_with = "synth")]
    input: Option<PathBuf>,

    /// Listen to a synthesised dial string instead of a device.
    #[arg(long)]
    synth: Option<String>,

    /// Number of recent keys kept in the history.
    #[arg(long, default_value_t = DEFAULT_HISTORY_LEN)]
    history: usize,

    /// Start with per-block diagnostics enabled. Off by default; `d` toggles
    /// them while listening.
    #[arg(long, default_value_t = false)]
    diagnostics: bool,

    /// Do not draw the status line.
    #[arg(long, default_value_t = false)]
    no_display: bool,
}

#[derive(Args, Debug)]
struct DialArgs {
    /// Keys to dial, e.g. "555-0123#". A comma inserts a pause.
    digits: String,

    /// Regex selecting the output device (default output otherwise).
    #[arg(long, env = "TONEWATCH_OUTPUT_DEVICE")]
    device: Option<String>,

    /// Output level, 0 to 1.
    #[arg(long, default_value_t = 0.5)]
    level: f32,

    /// Tone duration in milliseconds.
    #[arg(long, default_value_t = DEFAULT_TONE_MS)]
    tone_ms: f32,

    /// Silence after each tone in milliseconds. Keep it above two listener
    /// blocks so repeated keys are heard separately.
    #[arg(long, default_value_t = DEFAULT_GAP_MS)]
    gap_ms: f32,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command {
        None => listen::run(&cli.listen),
        Some(Mode::Listen(args)) => listen::run(&args),
        Some(Mode::Dial(args)) => dial(&args),
        Some(Mode::SelfTest(args)) => self_test(&args),
        Some(Mode::Devices) => devices(),
    }
}

fn dial(args: &DialArgs) -> Result<()> {
    let symbols = encode_dial(&args.digits).context("parse dial string")?;
    let mut playback =
        Playback::open(args.device.as_deref(), args.level).context("open audio output")?;
    let rate = playback.sample_rate_hz() as f32;
    let samples = DtmfModulator::new(rate, 1.0)
        .tone_ms(args.tone_ms)
        .gap_ms(args.gap_ms)
        .modulate(&symbols);
    let duration = Duration::from_secs_f32(samples.len() as f32 / rate);
    info!(digits = %args.digits, seconds = duration.as_secs_f32(), "dialing");

    playback.queue(samples)?;
    if !playback.wait_idle(duration + Duration::from_secs(2)) {
        bail!("output device did not finish playback");
    }
    // Let the device drain its own buffer before the stream is dropped.
    std::thread::sleep(Duration::from_millis(200));
    Ok(())
}

fn self_test(args: &DetectorArgs) -> Result<()> {
    let report = selftest::run(&selftest::SelfTestConfig {
        sample_rate_hz: args.sample_rate,
        block_len: args.block_len,
        threshold: args.threshold,
        release_ratio: args.release_ratio,
    })
    .context("invalid detector configuration")?;
    println!("{}", report);
    if !report.passed() {
        bail!("self-test failed");
    }
    Ok(())
}

fn devices() -> Result<()> {
    let list = list_devices()?;
    println!("Input devices:");
    for name in &list.inputs {
        println!("  {}", name);
    }
    println!("Output devices:");
    for name in &list.outputs {
        println!("  {}", name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn bare_invocation_listens_with_defaults() {
        let cli = Cli::try_parse_from(["tonewatch"]).expect("parse");
        assert!(cli.command.is_none());
        assert_eq!(cli.listen.detector.sample_rate, 8000);
        assert_eq!(cli.listen.detector.block_len, 1024);
        assert_eq!(cli.listen.detector.threshold, 1000.0);
        assert_eq!(cli.listen.history, 12);
        assert!(!cli.listen.diagnostics);
    }

    #[test]
    fn synth_and_input_conflict() {
        assert!(Cli::try_parse_from(["tonewatch", "--synth", "1", "--input", "x.raw"]).is_err());
    }

    #[test]
    fn dial_takes_digits() {
        let cli = Cli::try_parse_from(["tonewatch", "dial", "123#"]).expect("parse");
        match cli.command {
            Some(Mode::Dial(args)) => {
                assert_eq!(args.digits, "123#");
                assert_eq!(args.gap_ms, DEFAULT_GAP_MS);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
