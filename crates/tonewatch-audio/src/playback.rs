use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{channel, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, StreamTrait};
use ringbuf::HeapRb;
use tonewatch_dtmf::CaptureError;
use tracing::{debug, info, warn};

use crate::device::{device_error, device_name, select_output_device};

const OUTPUT_RING_CAP: usize = 48_000 * 4;

/// Mono f32 playback to every channel of an output device.
pub struct Playback {
    _stream: cpal::Stream,
    sample_rate_hz: u32,
    tx: Sender<Vec<f32>>,
    queued: u64,
    played: Arc<AtomicU64>,
}

impl Playback {
    /// Open an output device at its default rate and start the stream.
    pub fn open(device_regex: Option<&str>, level: f32) -> Result<Self, CaptureError> {
        let host = cpal::default_host();
        let device = select_output_device(&host, device_regex)?;
        let config = device.default_output_config().map_err(device_error)?;
        let sample_format = config.sample_format();
        let config: cpal::StreamConfig = config.into();
        let channels = config.channels as usize;
        let sample_rate_hz = config.sample_rate.0;
        if sample_format != cpal::SampleFormat::F32 {
            return Err(CaptureError::Device(format!(
                "unsupported sample format {:?} (expected f32)",
                sample_format
            )));
        }
        info!(device = %device_name(&device), sample_rate_hz, channels, "audio output opened");

        let (tx, rx) = channel::<Vec<f32>>();
        let ring = HeapRb::<f32>::new(OUTPUT_RING_CAP);
        let (mut producer, mut consumer) = ring.split();
        let mut pending: VecDeque<f32> = VecDeque::new();
        let played = Arc::new(AtomicU64::new(0));
        let played_cb = Arc::clone(&played);

        let err_fn = |err: cpal::StreamError| warn!(%err, "audio output stream error");

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _| {
                    while let Ok(chunk) = rx.try_recv() {
                        debug!(samples = chunk.len(), "audio output: received chunk");
                        pending.extend(chunk);
                    }

                    while let Some(sample) = pending.front().copied() {
                        if producer.push(sample).is_ok() {
                            pending.pop_front();
                        } else {
                            break;
                        }
                    }

                    let mut count = 0u64;
                    for frame in data.chunks_mut(channels) {
                        let value = match consumer.pop() {
                            Some(sample) => {
                                count += 1;
                                sample * level
                            }
                            None => 0.0,
                        };
                        for chan in frame.iter_mut() {
                            *chan = value;
                        }
                    }
                    played_cb.fetch_add(count, Ordering::Relaxed);
                },
                err_fn,
                None,
            )
            .map_err(device_error)?;

        stream.play().map_err(device_error)?;
        Ok(Self {
            _stream: stream,
            sample_rate_hz,
            tx,
            queued: 0,
            played,
        })
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    /// Queue samples behind anything already playing.
    pub fn queue(&mut self, samples: Vec<f32>) -> Result<(), CaptureError> {
        let len = samples.len() as u64;
        self.tx
            .send(samples)
            .map_err(|_| CaptureError::Disconnected)?;
        self.queued += len;
        Ok(())
    }

    /// Block until every queued sample has been handed to the device, or
    /// until `timeout` passes. Returns whether playback finished.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.played.load(Ordering::Relaxed) < self.queued {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        true
    }
}
