use crate::models::error::CaptureError;
use crate::processing::pcm::encode_pcm16le;
use crate::traits::capture_driver::CaptureDevice;

/// Fixed-capacity sample store sized to one notification period.
///
/// Allocated once per `initialize` and reused for every periodic read.
#[derive(Debug)]
pub struct AudioFrameBuffer {
    samples: Vec<i16>,
}

impl AudioFrameBuffer {
    pub fn new(period_frames: usize) -> Self {
        Self {
            samples: vec![0; period_frames],
        }
    }

    /// Resize in place, keeping the allocation when it is large enough.
    pub fn resize(&mut self, period_frames: usize) {
        self.samples.resize(period_frames, 0);
    }

    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    /// Read up to one period from `device`. The count is clamped to capacity.
    pub fn fill_from<D: CaptureDevice + ?Sized>(
        &mut self,
        device: &mut D,
    ) -> Result<usize, CaptureError> {
        let n = device.read(&mut self.samples)?;
        Ok(n.min(self.samples.len()))
    }

    /// PCM16LE bytes for the first `n` samples of the last read.
    pub fn packetize(&self, n: usize) -> Vec<u8> {
        encode_pcm16le(&self.samples[..n.min(self.samples.len())])
    }
}
