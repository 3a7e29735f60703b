//! The listening loop: one block per cycle, operator commands in between.

use std::io::BufRead;
use std::sync::mpsc::{channel, Receiver};
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use tonewatch_audio::{CaptureSource, RawReader, ReplaySource};
use tonewatch_dtmf::{AudioBlock, BlockSource, CaptureError, DtmfListener, TelemetrySink};
use tonewatch_tone::{encode_dial, to_i16, DtmfModulator};
use tracing::{info, warn};

use crate::commands::{parse_command, Command, HELP};
use crate::diagnostics::{format_samples, BlockLevel, DebugReporter, LevelStats};
use crate::display::TerminalDisplay;
use crate::selftest::{self, SelfTestConfig};
use crate::ListenArgs;

const DISPLAY_INTERVAL: Duration = Duration::from_millis(100);
const SYNTH_LEVEL: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

enum Input<'a> {
    Device(Option<&'a str>),
    Stdin,
    Raw(&'a std::path::Path),
    Synth(&'a str),
}

impl<'a> Input<'a> {
    fn from_args(args: &'a ListenArgs) -> Self {
        if let Some(dial) = args.synth.as_deref() {
            return Input::Synth(dial);
        }
        match args.input.as_deref() {
            Some(path) if path.as_os_str() == "-" => Input::Stdin,
            Some(path) => Input::Raw(path),
            None => Input::Device(args.device.as_deref()),
        }
    }
}

fn open_source(
    input: &Input<'_>,
    sample_rate_hz: u32,
    block_len: usize,
) -> Result<Box<dyn BlockSource>> {
    Ok(match *input {
        Input::Device(regex) => Box::new(
            CaptureSource::open(regex, sample_rate_hz, block_len).context("open audio input")?,
        ),
        Input::Stdin => Box::new(RawReader::new(
            std::io::stdin().lock(),
            sample_rate_hz,
            block_len,
        )),
        Input::Raw(path) => Box::new(
            RawReader::open(path, sample_rate_hz, block_len)
                .with_context(|| format!("open {}", path.display()))?,
        ),
        Input::Synth(dial) => {
            let symbols = encode_dial(dial).context("parse dial string")?;
            let samples = DtmfModulator::new(sample_rate_hz as f32, SYNTH_LEVEL)
                .align_to_blocks(block_len)
                .modulate(&symbols);
            Box::new(ReplaySource::new(to_i16(&samples), sample_rate_hz, block_len))
        }
    })
}

/// Forward console lines to the pipeline thread.
fn spawn_console() -> Receiver<String> {
    let (tx, rx) = channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

struct Session {
    listener: DtmfListener,
    source: Box<dyn BlockSource>,
    display: TerminalDisplay,
    diagnostics: DebugReporter,
    /// Kept only for the raw sample dump.
    last_block: AudioBlock,
}

impl Session {
    fn cycle(&mut self) -> Result<Flow> {
        let block = match self.source.next_block() {
            Ok(block) => block,
            Err(CaptureError::EndOfStream) => {
                info!("end of audio input");
                return Ok(Flow::Stop);
            }
            Err(err) if !err.is_fatal() => {
                warn!(%err, "no block this cycle");
                return Ok(Flow::Continue);
            }
            Err(err) => return Err(err).context("audio capture failed"),
        };

        let cycle = self.listener.process_block(&block)?;
        self.diagnostics
            .report(&cycle, self.listener.threshold(), self.listener.tones());
        let telemetry = self.listener.telemetry(&cycle.result);
        self.display.publish(&telemetry, cycle.event.as_ref());
        self.last_block = block;
        Ok(Flow::Continue)
    }

    fn handle(&mut self, cmd: Command) -> Result<Flow> {
        match cmd {
            Command::ToggleDiagnostics => {
                let on = self.diagnostics.toggle();
                eprintln!("\nDiagnostics: {}", if on { "ON" } else { "OFF" });
            }
            Command::DumpSamples => eprintln!("\n{}", format_samples(&self.last_block)),
            Command::MicrophoneTest { secs } => return self.microphone_test(secs),
            Command::ResetSource => match self.source.restart() {
                Ok(()) => eprintln!("\nAudio input reset"),
                Err(err) if !err.is_fatal() => eprintln!("\n{}", err),
                Err(err) => return Err(err).context("reset audio input"),
            },
            Command::Threshold(None) => eprintln!("\nThreshold: {:.0}", self.listener.threshold()),
            Command::Threshold(Some(value)) => match self.listener.set_threshold(value) {
                Ok(()) => eprintln!("\nThreshold: {:.0}", value),
                Err(err) => eprintln!("\n{}", err),
            },
            Command::SelfTest => {
                let report = selftest::run(&SelfTestConfig {
                    sample_rate_hz: self.listener.sample_rate_hz(),
                    block_len: self.listener.block_len(),
                    threshold: self.listener.threshold(),
                    release_ratio: self.listener.detector().release_ratio(),
                })?;
                eprintln!("\n{}", report);
            }
            Command::Help => eprintln!("\n{}", HELP),
            Command::Quit => return Ok(Flow::Stop),
        }
        Ok(Flow::Continue)
    }

    /// Measure raw input levels; detection is paused meanwhile.
    fn microphone_test(&mut self, secs: f32) -> Result<Flow> {
        let rate = self.source.sample_rate_hz() as f32;
        let block_len = self.source.block_len();
        let blocks = (secs * rate / block_len as f32).ceil().max(1.0) as u64;
        let per_second = ((rate / block_len as f32) as u64).max(1);
        eprintln!("\nMICROPHONE TEST - {:.0} seconds", secs);
        eprintln!("Make noise into the microphone NOW!");

        let mut stats = LevelStats::default();
        let mut flow = Flow::Continue;
        for n in 1..=blocks {
            let block = match self.source.next_block() {
                Ok(block) => block,
                Err(CaptureError::EndOfStream) => {
                    flow = Flow::Stop;
                    break;
                }
                Err(err) if !err.is_fatal() => {
                    warn!(%err, "microphone test: no block");
                    continue;
                }
                Err(err) => return Err(err).context("microphone test aborted"),
            };
            let level = BlockLevel::measure(&block);
            stats.observe(&level);
            if n % per_second == 0 {
                eprintln!(
                    "Test {}s: Audio={:.1}, Max={}, NonZero={}",
                    n / per_second,
                    level.level,
                    level.peak,
                    level.nonzero
                );
            }
            self.last_block = block;
        }

        eprintln!("\n{}", stats.summary(block_len));
        Ok(flow)
    }
}

pub fn run(args: &ListenArgs) -> Result<()> {
    let tuning = &args.detector;
    let listener = DtmfListener::builder(tuning.sample_rate)
        .block_len(tuning.block_len)
        .threshold(tuning.threshold)
        .release_ratio(tuning.release_ratio)
        .history_len(args.history)
        .build()
        .context("invalid listener configuration")?;

    let input = Input::from_args(args);
    let source = open_source(&input, listener.sample_rate_hz(), listener.block_len())?;
    ensure!(
        source.sample_rate_hz() == listener.sample_rate_hz()
            && source.block_len() == listener.block_len(),
        "audio source delivers {} samples at {} Hz, listener expects {} at {} Hz",
        source.block_len(),
        source.sample_rate_hz(),
        listener.block_len(),
        listener.sample_rate_hz()
    );

    let console = match input {
        Input::Stdin => None,
        _ => Some(spawn_console()),
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        sample_rate_hz = listener.sample_rate_hz(),
        block_len = listener.block_len(),
        threshold = listener.threshold(),
        release_level = listener.detector().release_level(),
        "tonewatch listening"
    );
    if console.is_some() {
        eprintln!("{}", HELP);
    }

    let mut session = Session {
        listener,
        source,
        display: TerminalDisplay::new(DISPLAY_INTERVAL, !args.no_display),
        diagnostics: DebugReporter::new(args.diagnostics),
        last_block: Vec::new(),
    };

    'cycles: loop {
        if let Some(rx) = &console {
            while let Ok(line) = rx.try_recv() {
                match parse_command(&line) {
                    Ok(Some(cmd)) => {
                        if session.handle(cmd)? == Flow::Stop {
                            break 'cycles;
                        }
                    }
                    Ok(None) => {}
                    Err(err) => eprintln!("\n{}", err),
                }
            }
        }
        if session.cycle()? == Flow::Stop {
            break;
        }
    }

    session.display.finish();
    let detector = session.listener.detector();
    info!(
        detections = detector.count(),
        history = %detector.history(),
        "listener stopped"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heard(dial: &str) -> String {
        let mut listener = DtmfListener::builder(8000).build().expect("listener");
        let mut source = open_source(&Input::Synth(dial), 8000, 1024).expect("source");
        let mut keys = String::new();
        loop {
            match source.next_block() {
                Ok(block) => {
                    let cycle = listener.process_block(&block).expect("block");
                    keys.extend(cycle.event.map(|ev| ev.key));
                }
                Err(CaptureError::EndOfStream) => break,
                Err(err) => panic!("unexpected {}", err),
            }
        }
        keys
    }

    #[test]
    fn synth_input_keeps_repeated_keys() {
        assert_eq!(heard("55"), "55");
        assert_eq!(heard("1155"), "1155");
        assert_eq!(heard("555-0123#"), "5550123#");
    }

    #[test]
    fn synth_input_restarts() {
        let mut source = open_source(&Input::Synth("1"), 8000, 1024).expect("source");
        let first = source.next_block().expect("block");
        source.next_block().expect("block");
        source.restart().expect("restart");
        assert_eq!(source.next_block().expect("block"), first);
    }
}
