use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::models::config::{DeviceSpec, RecorderConfig};
use crate::models::diagnostics::RecorderDiagnostics;
use crate::models::error::{PermissionError, RecorderError};
use crate::models::state::{RecorderState, RecordingState};
use crate::processing::frame_buffer::AudioFrameBuffer;
use crate::traits::capture_driver::{CaptureDevice, CaptureDriver};
use crate::traits::clock::{Clock, SystemClock};
use crate::traits::event_sink::EventSink;
use crate::traits::permission_platform::PermissionPlatform;

use super::emitter::EventEmitter;
use super::permission_gate::{PermissionGate, PermissionToken};

/// Session diagnostics, only when the active config asks for them.
macro_rules! verbose {
    ($inner:expr, $($arg:tt)+) => {
        if $inner.verbose() {
            log::debug!($($arg)+);
        }
    };
}

/// Answer to `initializeRecorder`.
///
/// `success: false` without an error means permission was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitOutcome {
    pub success: bool,
    pub is_recorder_initialized: bool,
}

impl InitOutcome {
    pub fn initialized() -> Self {
        Self {
            success: true,
            is_recorder_initialized: true,
        }
    }

    pub fn denied() -> Self {
        Self {
            success: false,
            is_recorder_initialized: false,
        }
    }

    pub fn to_value(&self) -> Value {
        json!({
            "success": self.success,
            "isRecorderInitialized": self.is_recorder_initialized,
        })
    }
}

/// Completion for one `initialize` call; may run on the permission thread.
pub type InitResponder = Box<dyn FnOnce(Result<InitOutcome, RecorderError>) + Send + 'static>;

/// An initialize call waiting on the permission answer. Its sizing is
/// applied to the session only once the new device is open.
pub(super) struct PendingInitRequest {
    config: RecorderConfig,
    period_frames: usize,
    responder: InitResponder,
}

/// Everything the session owns, guarded by one lock.
pub(super) struct SessionInner<Dev> {
    pub(super) state: RecorderState,
    pub(super) config: Option<RecorderConfig>,
    pub(super) period_frames: usize,
    pub(super) frame_buffer: Option<AudioFrameBuffer>,
    pub(super) device: Option<Dev>,
    /// Bumped whenever the device is replaced or torn down; periodic
    /// listeners carry the value they were attached with.
    pub(super) generation: u64,
    pub(super) pending: Option<PendingInitRequest>,
    pub(super) context_attached: bool,
    pub(super) diagnostics: RecorderDiagnostics,
}

impl<Dev: CaptureDevice> SessionInner<Dev> {
    fn new() -> Self {
        Self {
            state: RecorderState::Unset,
            config: None,
            period_frames: 0,
            frame_buffer: None,
            device: None,
            generation: 0,
            pending: None,
            context_attached: true,
            diagnostics: RecorderDiagnostics::default(),
        }
    }

    fn verbose(&self) -> bool {
        self.config.is_some_and(|c| c.verbose_logging)
    }

    /// Detach, stop and release the current device. Errors are swallowed.
    fn release_device(&mut self) {
        self.generation += 1;
        let Some(mut device) = self.device.take() else {
            return;
        };
        device.clear_period_listener();
        if device.recording_state() == RecordingState::Recording {
            if let Err(e) = device.stop() {
                log::warn!("Error stopping recorder during release: {}", e);
            }
        }
        device.release();
        verbose!(self, "Capture device released");
    }

    /// Release the device on teardown or a failed re-open. A session left
    /// without a device is `Stopped`; returns that state when it changed.
    fn retire_device(&mut self) -> Option<RecorderState> {
        let had_device = self.device.is_some();
        self.release_device();
        let live = matches!(self.state, RecorderState::Initialized | RecorderState::Playing);
        if had_device && live {
            self.state = RecorderState::Stopped;
            Some(RecorderState::Stopped)
        } else {
            None
        }
    }
}

pub(super) struct SessionShared<D: CaptureDriver> {
    pub(super) driver: D,
    pub(super) gate: PermissionGate,
    pub(super) emitter: EventEmitter,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) inner: Mutex<SessionInner<D::Device>>,
}

impl<D: CaptureDriver> Drop for SessionShared<D> {
    fn drop(&mut self) {
        self.inner.get_mut().release_device();
    }
}

impl<D: CaptureDriver + 'static> SessionShared<D> {
    /// Steps 1-2 of initialize: validate and size the period. Nothing on
    /// the session changes until the device is replaced.
    fn prepare(
        &self,
        inner: &SessionInner<D::Device>,
        config: RecorderConfig,
    ) -> Result<usize, RecorderError> {
        if inner.pending.is_some() {
            return Err(RecorderError::InitializePending);
        }
        config
            .validate()
            .map_err(|_| RecorderError::InvalidSampleRate(config.sample_rate))?;
        let period_frames = match self.driver.min_buffer_frames(config.sample_rate) {
            Some(frames) if frames > 0 => frames,
            _ => return Err(RecorderError::InvalidSampleRate(config.sample_rate)),
        };
        if !inner.context_attached {
            return Err(RecorderError::NoContext);
        }

        if config.verbose_logging {
            log::debug!(
                "Sized recorder for {} Hz: period {} frames, buffer {} frames",
                config.sample_rate,
                period_frames,
                period_frames * 2
            );
        }
        Ok(period_frames)
    }

    /// Consume the pending initialize, if any, and answer it.
    pub(super) fn complete_initialize(self: &Arc<Self>, granted: bool) {
        let (responder, result, announce) = {
            let mut inner = self.inner.lock();
            let Some(pending) = inner.pending.take() else {
                return;
            };
            let PendingInitRequest {
                config,
                period_frames,
                responder,
            } = pending;
            if config.verbose_logging {
                log::debug!("Completing initializeRecorder, permission granted: {}", granted);
            }

            if granted {
                let retired = inner.retire_device();
                match self.open_device(&mut inner, config, period_frames) {
                    Ok(()) => {
                        inner.state = RecorderState::Initialized;
                        (
                            responder,
                            Ok(InitOutcome::initialized()),
                            Some(RecorderState::Initialized),
                        )
                    }
                    Err(err) => (responder, Err(err), retired),
                }
            } else {
                (responder, Ok(InitOutcome::denied()), None)
            }
        };

        if let Some(state) = announce {
            self.emitter.emit_status(state);
        }
        responder(result);
    }

    /// Open a device for `config` and, once it is live, adopt the new sizing.
    fn open_device(
        self: &Arc<Self>,
        inner: &mut SessionInner<D::Device>,
        config: RecorderConfig,
        period_frames: usize,
    ) -> Result<(), RecorderError> {
        let spec = DeviceSpec::for_period(config.sample_rate, period_frames);
        if config.verbose_logging {
            log::debug!("Opening capture device: {:?}", spec);
        }

        let mut device = self
            .driver
            .open(spec)
            .map_err(|e| RecorderError::RecorderInitFailed(e.to_string()))?;
        if !device.is_initialized() {
            device.release();
            return Err(RecorderError::RecorderInitFailed(
                "driver did not reach the initialized state".into(),
            ));
        }

        device.set_period_listener(spec.period_frames, self.period_listener(inner.generation));
        inner.device = Some(device);
        inner.config = Some(config);
        inner.period_frames = period_frames;
        match inner.frame_buffer.as_mut() {
            Some(buffer) => buffer.resize(period_frames),
            None => inner.frame_buffer = Some(AudioFrameBuffer::new(period_frames)),
        }
        verbose!(inner, "Capture device initialized");
        Ok(())
    }

    fn fail_pending(&self, err: RecorderError) {
        let pending = self.inner.lock().pending.take();
        if let Some(pending) = pending {
            (pending.responder)(Err(err));
        }
    }
}

/// Owns the capture device and drives it across the permission boundary.
///
/// Cheap to clone; all clones share one session. Commands from different
/// threads are serialized on an internal lock, and every event and
/// responder is invoked after that lock is released.
///
/// ```text
/// initialize ─┬─ permission held ──────────────┐
///             └─ PermissionGate ─ (async) ─────┴─ complete_initialize → Initialized
/// start → Playing ↔ stop → Stopped       teardown: any state, device released
/// ```
pub struct RecorderSession<D: CaptureDriver + 'static> {
    shared: Arc<SessionShared<D>>,
}

impl<D: CaptureDriver + 'static> Clone for RecorderSession<D> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<D: CaptureDriver + 'static> RecorderSession<D> {
    pub fn new(
        driver: D,
        permissions: Arc<dyn PermissionPlatform>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self::with_clock(driver, permissions, sink, Arc::new(SystemClock))
    }

    pub fn with_clock(
        driver: D,
        permissions: Arc<dyn PermissionPlatform>,
        sink: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            shared: Arc::new(SessionShared {
                driver,
                gate: PermissionGate::new(permissions),
                emitter: EventEmitter::new(sink),
                clock,
                inner: Mutex::new(SessionInner::new()),
            }),
        }
    }

    pub fn state(&self) -> RecorderState {
        self.shared.inner.lock().state
    }

    pub fn config(&self) -> Option<RecorderConfig> {
        self.shared.inner.lock().config
    }

    /// Frames per periodic read; 0 before the first successful sizing.
    pub fn period_frames(&self) -> usize {
        self.shared.inner.lock().period_frames
    }

    pub fn has_device(&self) -> bool {
        self.shared.inner.lock().device.is_some()
    }

    pub fn is_initialize_pending(&self) -> bool {
        self.shared.inner.lock().pending.is_some()
    }

    pub fn diagnostics(&self) -> RecorderDiagnostics {
        self.shared.inner.lock().diagnostics
    }

    pub fn has_permission(&self) -> bool {
        self.shared.gate.has_permission()
    }

    pub fn permission_gate(&self) -> &PermissionGate {
        &self.shared.gate
    }

    /// Route a permission answer received by the host.
    pub fn deliver_permission_result(&self, token: PermissionToken, granted: bool) -> bool {
        self.shared.gate.deliver(token, granted)
    }

    /// Initialize the recorder for `config`.
    ///
    /// `responder` runs exactly once: immediately when permission is held
    /// or the call fails, otherwise when the permission answer arrives.
    /// A second call while one is waiting on permission fails with
    /// `InitializePending`.
    pub fn initialize(&self, config: RecorderConfig, responder: InitResponder) {
        let has_permission = {
            let mut inner = self.shared.inner.lock();
            let period_frames = match self.shared.prepare(&inner, config) {
                Ok(period_frames) => period_frames,
                Err(err) => {
                    drop(inner);
                    log::warn!("initializeRecorder rejected: {}", err);
                    responder(Err(err));
                    return;
                }
            };
            inner.pending = Some(PendingInitRequest {
                config,
                period_frames,
                responder,
            });
            let has_permission = self.shared.gate.has_permission();
            if !has_permission && config.verbose_logging {
                log::debug!("Does not have permission, requesting");
            }
            has_permission
        };

        if has_permission {
            self.shared.complete_initialize(true);
        } else {
            self.request_permission();
        }
    }

    fn request_permission(&self) {
        let session = Arc::downgrade(&self.shared);
        let requested = self.shared.gate.request_permission(Box::new(move |granted| {
            if let Some(shared) = session.upgrade() {
                shared.complete_initialize(granted);
            }
        }));

        match requested {
            Ok(token) => log::debug!("Requested record permission ({})", token),
            // Granted between the check and the request.
            Err(PermissionError::AlreadyGranted) => self.shared.complete_initialize(true),
            // An earlier, torn-down initialize still has a request in flight;
            // its answer completes this one.
            Err(PermissionError::RequestPending) => {
                log::debug!("Waiting on outstanding permission request")
            }
            Err(err @ PermissionError::NoSurface) => {
                log::warn!("Cannot request record permission, no surface is available");
                self.shared.fail_pending(err.into());
            }
        }
    }

    /// Start capture. Idempotent while already recording.
    pub fn start(&self) -> Result<(), RecorderError> {
        {
            let mut guard = self.shared.inner.lock();
            let inner = &mut *guard;
            if !inner.state.can_start() {
                return Err(RecorderError::RecorderNotInitialized);
            }
            let device = match inner.device.as_mut() {
                Some(device) if device.is_initialized() => device,
                _ => return Err(RecorderError::RecorderNotInitialized),
            };
            if device.recording_state() == RecordingState::Recording {
                return Ok(());
            }

            device
                .start()
                .map_err(|e| RecorderError::FailedToRecord(e.to_string()))?;
            if device.recording_state() != RecordingState::Recording {
                return Err(RecorderError::FailedToRecord(
                    "device did not enter the recording state".into(),
                ));
            }
            inner.state = RecorderState::Playing;
            verbose!(inner, "Recording started");
        }
        self.shared.emitter.emit_status(RecorderState::Playing);
        Ok(())
    }

    /// Stop capture. Succeeds without side effects when there is no device
    /// or it is already stopped.
    pub fn stop(&self) -> Result<(), RecorderError> {
        {
            let mut guard = self.shared.inner.lock();
            let inner = &mut *guard;
            let Some(device) = inner.device.as_mut() else {
                return Ok(());
            };
            if device.recording_state() == RecordingState::Stopped {
                return Ok(());
            }

            device
                .stop()
                .map_err(|e| RecorderError::FailedToStop(e.to_string()))?;
            inner.state = RecorderState::Stopped;
            verbose!(inner, "Recording stopped");
        }
        self.shared.emitter.emit_status(RecorderState::Stopped);
        Ok(())
    }

    /// Release the device and frame buffer. Safe to repeat.
    ///
    /// A session that held a device ends up `Stopped` and announces it.
    /// An initialize still waiting on permission is answered with
    /// `success: false`; the eventual permission answer is discarded.
    pub fn teardown(&self) {
        let (stopped, pending) = {
            let mut inner = self.shared.inner.lock();
            let stopped = inner.retire_device();
            inner.frame_buffer = None;
            (stopped, inner.pending.take())
        };
        if let Some(state) = stopped {
            self.shared.emitter.emit_status(state);
        }
        if let Some(pending) = pending {
            log::debug!("Discarding initializeRecorder pending at teardown");
            (pending.responder)(Ok(InitOutcome::denied()));
        }
    }

    /// Host context became available again.
    pub fn attach(&self) {
        self.shared.inner.lock().context_attached = true;
    }

    /// Host context went away: tear down and refuse `initialize` with
    /// `NoContext` until `attach`.
    pub fn detach(&self) {
        self.teardown();
        self.shared.inner.lock().context_attached = false;
    }
}
