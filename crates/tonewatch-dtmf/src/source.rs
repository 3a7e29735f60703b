use crate::error::CaptureError;

/// Fixed-length run of signed 16-bit samples, processed once and dropped.
pub type AudioBlock = Vec<i16>;

/// Pull-based audio input. `next_block` blocks until a full block is ready.
pub trait BlockSource {
    fn sample_rate_hz(&self) -> u32;

    fn block_len(&self) -> usize;

    fn next_block(&mut self) -> Result<AudioBlock, CaptureError>;

    /// Tear down and reopen the underlying input. Sources that cannot
    /// start over report [`CaptureError::RestartUnsupported`].
    fn restart(&mut self) -> Result<(), CaptureError> {
        Err(CaptureError::RestartUnsupported)
    }
}

impl<S: BlockSource + ?Sized> BlockSource for Box<S> {
    fn sample_rate_hz(&self) -> u32 {
        (**self).sample_rate_hz()
    }

    fn block_len(&self) -> usize {
        (**self).block_len()
    }

    fn next_block(&mut self) -> Result<AudioBlock, CaptureError> {
        (**self).next_block()
    }

    fn restart(&mut self) -> Result<(), CaptureError> {
        (**self).restart()
    }
}
