use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, StreamTrait};
use tonewatch_dtmf::{AudioBlock, BlockSource, CaptureError};
use tracing::{info, warn};

use crate::device::{device_error, device_name, select_input_device};

/// Blocks buffered between the audio callback and the pipeline.
const QUEUE_BLOCKS: usize = 8;

type BlockResult = Result<AudioBlock, CaptureError>;

/// Live microphone input delivering fixed-size mono blocks.
///
/// The audio callback slices the first channel into blocks and hands them
/// over a bounded queue. When the pipeline falls behind, whole blocks are
/// dropped and counted as overruns; partial or padded blocks are never sent.
pub struct CaptureSource {
    device_regex: Option<String>,
    sample_rate_hz: u32,
    block_len: usize,
    overruns: Arc<AtomicU64>,
    reported: OverrunTracker,
    rx: Receiver<BlockResult>,
    stream: Option<cpal::Stream>,
}

impl CaptureSource {
    /// Open an input device at `sample_rate_hz` and start capturing.
    pub fn open(
        device_regex: Option<&str>,
        sample_rate_hz: u32,
        block_len: usize,
    ) -> Result<Self, CaptureError> {
        let overruns = Arc::new(AtomicU64::new(0));
        let (stream, rx) =
            start_input(device_regex, sample_rate_hz, block_len, Arc::clone(&overruns))?;
        Ok(Self {
            device_regex: device_regex.map(str::to_string),
            sample_rate_hz,
            block_len,
            overruns,
            reported: OverrunTracker::default(),
            rx,
            stream: Some(stream),
        })
    }

    /// Blocks dropped because the pipeline was not keeping up.
    pub fn overruns(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }
}

impl BlockSource for CaptureSource {
    fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    fn block_len(&self) -> usize {
        self.block_len
    }

    fn next_block(&mut self) -> Result<AudioBlock, CaptureError> {
        let block = self.rx.recv().map_err(|_| CaptureError::Disconnected)?;
        let total = self.overruns();
        if let Some(dropped) = self.reported.newly_dropped(total) {
            warn!(dropped, total, "capture overrun, audio blocks dropped");
        }
        block
    }

    fn restart(&mut self) -> Result<(), CaptureError> {
        info!("restarting audio input");
        self.stream = None;
        let (stream, rx) = start_input(
            self.device_regex.as_deref(),
            self.sample_rate_hz,
            self.block_len,
            Arc::clone(&self.overruns),
        )?;
        self.stream = Some(stream);
        self.rx = rx;
        Ok(())
    }
}

fn start_input(
    device_regex: Option<&str>,
    sample_rate_hz: u32,
    block_len: usize,
    overruns: Arc<AtomicU64>,
) -> Result<(cpal::Stream, Receiver<BlockResult>), CaptureError> {
    let host = cpal::default_host();
    let device = select_input_device(&host, device_regex)?;
    let supported = find_input_config(&device, sample_rate_hz)?;
    let sample_format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();
    let channels = config.channels as usize;
    info!(
        device = %device_name(&device),
        sample_rate_hz,
        channels,
        format = ?sample_format,
        "audio input opened"
    );

    let (tx, rx) = sync_channel(QUEUE_BLOCKS);
    let err_tx = tx.clone();
    let err_fn = move |err: cpal::StreamError| {
        warn!(%err, "audio stream error");
        let _ = err_tx.try_send(Err(CaptureError::Stream(err.to_string())));
    };
    let mut blocker = Blocker::new(block_len, channels, tx, overruns);

    let stream = match sample_format {
        cpal::SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _info| blocker.push_frames(data, |s| s),
            err_fn,
            None,
        ),
        cpal::SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _info| blocker.push_frames(data, f32_to_i16),
            err_fn,
            None,
        ),
        other => {
            return Err(CaptureError::Device(format!(
                "unsupported sample format {:?}",
                other
            )))
        }
    }
    .map_err(device_error)?;

    stream.play().map_err(device_error)?;
    Ok((stream, rx))
}

/// Narrowest i16 or f32 config that can run at `sample_rate_hz`, preferring i16.
fn find_input_config(
    device: &cpal::Device,
    sample_rate_hz: u32,
) -> Result<cpal::SupportedStreamConfig, CaptureError> {
    let ranges: Vec<_> = device
        .supported_input_configs()
        .map_err(device_error)?
        .collect();
    for format in [cpal::SampleFormat::I16, cpal::SampleFormat::F32] {
        let best = ranges
            .iter()
            .filter(|cfg| {
                cfg.sample_format() == format
                    && cfg.min_sample_rate().0 <= sample_rate_hz
                    && cfg.max_sample_rate().0 >= sample_rate_hz
            })
            .min_by_key(|cfg| cfg.channels());
        if let Some(cfg) = best {
            return Ok(cfg.clone().with_sample_rate(cpal::SampleRate(sample_rate_hz)));
        }
    }
    Err(CaptureError::UnsupportedConfig { sample_rate_hz })
}

/// Remembers how many dropped blocks have already been reported.
#[derive(Debug, Default)]
struct OverrunTracker {
    seen: u64,
}

impl OverrunTracker {
    /// Blocks dropped since the previous call, given the running total.
    fn newly_dropped(&mut self, total: u64) -> Option<u64> {
        let fresh = total.saturating_sub(self.seen);
        self.seen = total;
        (fresh > 0).then_some(fresh)
    }
}

fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}

/// Slices interleaved callback buffers into mono blocks.
struct Blocker {
    block_len: usize,
    channels: usize,
    block: AudioBlock,
    tx: SyncSender<BlockResult>,
    overruns: Arc<AtomicU64>,
}

impl Blocker {
    fn new(
        block_len: usize,
        channels: usize,
        tx: SyncSender<BlockResult>,
        overruns: Arc<AtomicU64>,
    ) -> Self {
        Self {
            block_len: block_len.max(1),
            channels: channels.max(1),
            block: Vec::with_capacity(block_len),
            tx,
            overruns,
        }
    }

    fn push_frames<T: Copy>(&mut self, data: &[T], convert: impl Fn(T) -> i16) {
        for frame in data.chunks(self.channels) {
            self.block.push(convert(frame[0]));
            if self.block.len() == self.block_len {
                let full = std::mem::replace(&mut self.block, Vec::with_capacity(self.block_len));
                match self.tx.try_send(Ok(full)) {
                    Ok(()) | Err(TrySendError::Disconnected(_)) => {}
                    Err(TrySendError::Full(_)) => {
                        self.overruns.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        }
    }
}
