use std::sync::Arc;

use crate::models::config::DeviceSpec;
use crate::models::error::CaptureError;
use crate::models::state::RecordingState;

/// Callback fired by a device every `period_frames` captured frames.
///
/// Fires on a driver-owned thread; the session performs the read from
/// inside the callback.
pub type PeriodListener = Arc<dyn Fn() + Send + Sync + 'static>;

/// Factory for platform capture devices (mono PCM16 input).
///
/// Implemented by:
/// - `MemoryDriver` (in-process, fed by the host)
/// - `WasapiDriver` (Windows)
pub trait CaptureDriver: Send + Sync {
    type Device: CaptureDevice;

    /// Minimum driver buffer size in frames for mono PCM16 at `sample_rate`.
    ///
    /// `None` when the driver does not support the rate.
    fn min_buffer_frames(&self, sample_rate: u32) -> Option<usize>;

    /// Construct a device. The returned handle may still report
    /// `is_initialized() == false`; the caller must then `release` it.
    fn open(&self, spec: DeviceSpec) -> Result<Self::Device, CaptureError>;
}

/// An opened hardware input stream.
///
/// `stop`, `release` and `clear_period_listener` must not wait on an
/// in-flight listener call: the listener may be blocked on the session
/// that is issuing the command.
pub trait CaptureDevice: Send {
    /// Whether driver-level initialization succeeded.
    fn is_initialized(&self) -> bool;

    fn recording_state(&self) -> RecordingState;

    /// Begin capture. Callers confirm via `recording_state`.
    fn start(&mut self) -> Result<(), CaptureError>;

    fn stop(&mut self) -> Result<(), CaptureError>;

    /// Read up to `buf.len()` samples. `Ok(0)` when nothing is buffered.
    fn read(&mut self, buf: &mut [i16]) -> Result<usize, CaptureError>;

    fn set_period_listener(&mut self, period_frames: usize, listener: PeriodListener);

    fn clear_period_listener(&mut self);

    /// Release the underlying stream. Must be idempotent.
    fn release(&mut self);
}
