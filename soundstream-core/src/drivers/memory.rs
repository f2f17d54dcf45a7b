//! In-process capture driver fed by the host.
//!
//! Behaves like a position-notification driver: samples pushed with
//! [`MemoryDriver::feed`] land in a ring buffer of `2 × period` frames and
//! the periodic listener fires once for every `period` frames captured
//! while recording. Useful for file playback into a session and for tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::config::DeviceSpec;
use crate::models::error::CaptureError;
use crate::models::state::RecordingState;
use crate::processing::ring_buffer::RingBuffer;
use crate::traits::capture_driver::{CaptureDevice, CaptureDriver, PeriodListener};

pub const MIN_SAMPLE_RATE: u32 = 8000;
pub const MAX_SAMPLE_RATE: u32 = 48000;
/// Floor for the reported minimum buffer.
pub const MIN_BUFFER_FRAMES: usize = 256;

struct Notifier {
    period_frames: usize,
    frames_since_notify: usize,
    listener: PeriodListener,
}

struct DeviceCore {
    ring: Mutex<RingBuffer>,
    recording: AtomicBool,
    released: AtomicBool,
    notifier: Mutex<Option<Notifier>>,
}

impl DeviceCore {
    /// Capture `samples`; returns how many periodic notifications to fire.
    fn capture(&self, samples: &[i16]) -> (usize, Option<PeriodListener>) {
        let dropped = self.ring.lock().write(samples);
        if dropped > 0 {
            log::debug!("Memory capture overflow, dropped {} samples", dropped);
        }

        let mut slot = self.notifier.lock();
        let Some(notifier) = slot.as_mut() else {
            return (0, None);
        };
        notifier.frames_since_notify += samples.len();
        let fires = notifier.frames_since_notify / notifier.period_frames;
        notifier.frames_since_notify %= notifier.period_frames;
        (fires, Some(Arc::clone(&notifier.listener)))
    }
}

/// Capture driver backed by host-fed memory.
///
/// Clones share the same active device, so the host keeps one clone for
/// feeding while the session owns another.
#[derive(Clone, Default)]
pub struct MemoryDriver {
    active: Arc<Mutex<Option<Arc<DeviceCore>>>>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push captured samples into the active device.
    ///
    /// Returns the number of samples accepted; zero when no device is open
    /// or it is not recording. Listener calls happen on the calling thread.
    pub fn feed(&self, samples: &[i16]) -> usize {
        let Some(core) = self.active.lock().clone() else {
            return 0;
        };
        if core.released.load(Ordering::SeqCst) || !core.recording.load(Ordering::SeqCst) {
            return 0;
        }

        let (fires, listener) = core.capture(samples);
        if let Some(listener) = listener {
            for _ in 0..fires {
                listener();
            }
        }
        samples.len()
    }

    /// Samples buffered on the active device and not yet read.
    pub fn buffered(&self) -> usize {
        self.active
            .lock()
            .as_ref()
            .map_or(0, |core| core.ring.lock().count())
    }

    pub fn has_active_device(&self) -> bool {
        self.active.lock().is_some()
    }
}

impl CaptureDriver for MemoryDriver {
    type Device = MemoryDevice;

    fn min_buffer_frames(&self, sample_rate: u32) -> Option<usize> {
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&sample_rate) {
            return None;
        }
        // 20 ms worth of frames.
        Some((sample_rate as usize / 50).max(MIN_BUFFER_FRAMES))
    }

    fn open(&self, spec: DeviceSpec) -> Result<MemoryDevice, CaptureError> {
        if spec.period_frames == 0 || spec.buffer_frames < spec.period_frames {
            return Err(CaptureError::InitializationFailed(format!(
                "invalid buffer geometry: {:?}",
                spec
            )));
        }
        let core = Arc::new(DeviceCore {
            ring: Mutex::new(RingBuffer::new(spec.buffer_frames)),
            recording: AtomicBool::new(false),
            released: AtomicBool::new(false),
            notifier: Mutex::new(None),
        });
        *self.active.lock() = Some(Arc::clone(&core));
        Ok(MemoryDevice {
            core,
            driver: Arc::clone(&self.active),
        })
    }
}

/// Device handle returned by [`MemoryDriver::open`].
pub struct MemoryDevice {
    core: Arc<DeviceCore>,
    driver: Arc<Mutex<Option<Arc<DeviceCore>>>>,
}

impl MemoryDevice {
    fn ensure_live(&self) -> Result<(), CaptureError> {
        if self.core.released.load(Ordering::SeqCst) {
            return Err(CaptureError::InvalidState("device released".into()));
        }
        Ok(())
    }
}

impl CaptureDevice for MemoryDevice {
    fn is_initialized(&self) -> bool {
        !self.core.released.load(Ordering::SeqCst)
    }

    fn recording_state(&self) -> RecordingState {
        if self.core.recording.load(Ordering::SeqCst) {
            RecordingState::Recording
        } else {
            RecordingState::Stopped
        }
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        self.ensure_live()?;
        if let Some(notifier) = self.core.notifier.lock().as_mut() {
            notifier.frames_since_notify = 0;
        }
        self.core.recording.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        self.ensure_live()?;
        self.core.recording.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn read(&mut self, buf: &mut [i16]) -> Result<usize, CaptureError> {
        self.ensure_live()?;
        Ok(self.core.ring.lock().read_into(buf))
    }

    fn set_period_listener(&mut self, period_frames: usize, listener: PeriodListener) {
        *self.core.notifier.lock() = Some(Notifier {
            period_frames: period_frames.max(1),
            frames_since_notify: 0,
            listener,
        });
    }

    fn clear_period_listener(&mut self) {
        *self.core.notifier.lock() = None;
    }

    fn release(&mut self) {
        if self.core.released.swap(true, Ordering::SeqCst) {
            return;
        }
        self.core.recording.store(false, Ordering::SeqCst);
        *self.core.notifier.lock() = None;
        self.core.ring.lock().reset();

        let mut active = self.driver.lock();
        if active.as_ref().is_some_and(|c| Arc::ptr_eq(c, &self.core)) {
            *active = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn open(driver: &MemoryDriver, period: usize) -> MemoryDevice {
        driver.open(DeviceSpec::for_period(16000, period)).unwrap()
    }

    fn counting_listener() -> (Arc<AtomicUsize>, PeriodListener) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        (count, Arc::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }))
    }

    #[test]
    fn min_buffer_is_twenty_ms_with_floor() {
        let driver = MemoryDriver::new();
        assert_eq!(driver.min_buffer_frames(16000), Some(320));
        assert_eq!(driver.min_buffer_frames(48000), Some(960));
        assert_eq!(driver.min_buffer_frames(8000), Some(MIN_BUFFER_FRAMES));
        assert_eq!(driver.min_buffer_frames(7999), None);
        assert_eq!(driver.min_buffer_frames(96000), None);
    }

    #[test]
    fn feed_is_ignored_until_recording() {
        let driver = MemoryDriver::new();
        let mut device = open(&driver, 4);

        assert_eq!(driver.feed(&[1, 2, 3]), 0);
        device.start().unwrap();
        assert_eq!(driver.feed(&[1, 2, 3]), 3);
        assert_eq!(driver.buffered(), 3);
    }

    #[test]
    fn listener_fires_once_per_period() {
        let driver = MemoryDriver::new();
        let mut device = open(&driver, 4);
        let (count, listener) = counting_listener();
        device.set_period_listener(4, listener);
        device.start().unwrap();

        driver.feed(&[0; 3]);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        driver.feed(&[0; 6]);
        assert_eq!(count.load(Ordering::SeqCst), 2);
        driver.feed(&[0; 3]);
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn read_drains_buffered_samples() {
        let driver = MemoryDriver::new();
        let mut device = open(&driver, 4);
        device.start().unwrap();
        driver.feed(&[10, 20, 30]);

        let mut buf = [0i16; 4];
        assert_eq!(device.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], &[10, 20, 30]);
        assert_eq!(device.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn overflow_keeps_newest_two_periods() {
        let driver = MemoryDriver::new();
        let mut device = open(&driver, 2);
        device.start().unwrap();
        driver.feed(&[1, 2, 3, 4, 5, 6]);

        let mut buf = [0i16; 8];
        assert_eq!(device.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], &[3, 4, 5, 6]);
    }

    #[test]
    fn released_device_rejects_commands() {
        let driver = MemoryDriver::new();
        let mut device = open(&driver, 4);
        let (count, listener) = counting_listener();
        device.set_period_listener(4, listener);
        device.start().unwrap();

        device.release();
        device.release();

        assert!(!driver.has_active_device());
        assert!(!device.is_initialized());
        assert_eq!(driver.feed(&[0; 8]), 0);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(device.start().is_err());
        assert!(device.read(&mut [0i16; 4]).is_err());
    }

    #[test]
    fn releasing_old_device_keeps_newer_active() {
        let driver = MemoryDriver::new();
        let mut old = open(&driver, 4);
        let _new = open(&driver, 4);

        old.release();
        assert!(driver.has_active_device());
    }

    #[test]
    fn rejects_bad_geometry() {
        let driver = MemoryDriver::new();
        assert!(driver.open(DeviceSpec::for_period(16000, 0)).is_err());
    }
}
