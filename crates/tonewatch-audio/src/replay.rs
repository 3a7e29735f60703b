use std::fs::File;
use std::io::{self, BufReader, ErrorKind, Read, Seek};
use std::path::Path;

use tonewatch_dtmf::{AudioBlock, BlockSource, CaptureError};

/// Raw signed 16-bit little-endian mono PCM read from any byte stream.
///
/// A trailing partial block is discarded and reported as end of stream.
/// Only seekable readers can be restarted.
pub struct RawReader<R> {
    reader: R,
    rewind: Option<fn(&mut R) -> io::Result<()>>,
    sample_rate_hz: u32,
    block_len: usize,
    bytes: Vec<u8>,
}

impl<R: Read> RawReader<R> {
    /// A forward-only reader, e.g. stdin.
    pub fn new(reader: R, sample_rate_hz: u32, block_len: usize) -> Self {
        Self {
            reader,
            rewind: None,
            sample_rate_hz,
            block_len,
            bytes: vec![0u8; block_len * 2],
        }
    }
}

impl<R: Read + Seek> RawReader<R> {
    /// A reader that restarts from the beginning of the stream.
    pub fn seekable(reader: R, sample_rate_hz: u32, block_len: usize) -> Self {
        let rewind: fn(&mut R) -> io::Result<()> = |r| r.rewind();
        Self {
            rewind: Some(rewind),
            ..Self::new(reader, sample_rate_hz, block_len)
        }
    }
}

impl RawReader<BufReader<File>> {
    pub fn open(path: &Path, sample_rate_hz: u32, block_len: usize) -> Result<Self, CaptureError> {
        let file = File::open(path)?;
        Ok(Self::seekable(BufReader::new(file), sample_rate_hz, block_len))
    }
}

impl<R: Read> BlockSource for RawReader<R> {
    fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    fn block_len(&self) -> usize {
        self.block_len
    }

    fn next_block(&mut self) -> Result<AudioBlock, CaptureError> {
        match self.reader.read_exact(&mut self.bytes) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => {
                return Err(CaptureError::EndOfStream)
            }
            Err(err) => return Err(err.into()),
        }
        Ok(self
            .bytes
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect())
    }

    fn restart(&mut self) -> Result<(), CaptureError> {
        let rewind = self.rewind.ok_or(CaptureError::RestartUnsupported)?;
        rewind(&mut self.reader)?;
        Ok(())
    }
}

/// In-memory samples served block by block, e.g. a synthesised dial string.
pub struct ReplaySource {
    samples: Vec<i16>,
    pos: usize,
    sample_rate_hz: u32,
    block_len: usize,
}

impl ReplaySource {
    pub fn new(samples: Vec<i16>, sample_rate_hz: u32, block_len: usize) -> Self {
        Self {
            samples,
            pos: 0,
            sample_rate_hz,
            block_len,
        }
    }
}

impl BlockSource for ReplaySource {
    fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    fn block_len(&self) -> usize {
        self.block_len
    }

    fn next_block(&mut self) -> Result<AudioBlock, CaptureError> {
        let end = self.pos + self.block_len;
        if self.block_len == 0 || end > self.samples.len() {
            return Err(CaptureError::EndOfStream);
        }
        let block = self.samples[self.pos..end].to_vec();
        self.pos = end;
        Ok(block)
    }

    fn restart(&mut self) -> Result<(), CaptureError> {
        self.pos = 0;
        Ok(())
    }
}
