//! WASAPI microphone capture driver.
//!
//! Each opened device owns a dedicated worker thread that holds the COM
//! objects, polls the shared-mode stream and fills a ring buffer. Period
//! notifications are delivered from a second thread so the worker never
//! runs session code and can always be joined.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use windows::core::w;
use windows::Win32::Foundation::HANDLE;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Threading::{
    AvRevertMmThreadCharacteristics, AvSetMmThreadCharacteristicsW,
};

use soundstream_core::{
    CaptureDevice, CaptureDriver, CaptureError, DeviceSpec, PeriodListener, RecordingState,
    RingBuffer,
};

use crate::com::{activate_client, capture_endpoint, ComApartment};
use crate::fault::{FaultAction, FaultTracker};
use crate::period::{frames_for_period, hns_for_frames, is_supported_rate};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Opens mono PCM16 capture streams on a WASAPI endpoint.
#[derive(Debug, Clone, Default)]
pub struct WasapiDriver {
    device_id: Option<String>,
}

impl WasapiDriver {
    /// Capture from the system default microphone.
    pub fn default_device() -> Self {
        Self { device_id: None }
    }

    /// Capture from a specific endpoint by device ID.
    pub fn with_device(id: impl Into<String>) -> Self {
        Self {
            device_id: Some(id.into()),
        }
    }

    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }
}

impl CaptureDriver for WasapiDriver {
    type Device = WasapiDevice;

    fn min_buffer_frames(&self, sample_rate: u32) -> Option<usize> {
        if !is_supported_rate(sample_rate) {
            return None;
        }
        let device_id = self.device_id.clone();
        let period = thread::Builder::new()
            .name("wasapi-period-query".into())
            .spawn(move || query_min_period(device_id.as_deref()))
            .ok()?
            .join()
            .ok()?;
        match period {
            Ok(hns) => Some(frames_for_period(hns, sample_rate)),
            Err(e) => {
                log::warn!("Failed to query device period: {}", e);
                None
            }
        }
    }

    fn open(&self, spec: DeviceSpec) -> Result<WasapiDevice, CaptureError> {
        WasapiDevice::spawn(self.device_id.clone(), spec)
    }
}

fn query_min_period(device_id: Option<&str>) -> Result<i64, CaptureError> {
    let _com = ComApartment::enter()?;
    let device = capture_endpoint(device_id)?;
    let client = activate_client(&device)?;
    let mut default_period = 0i64;
    let mut min_period = 0i64;
    unsafe {
        client
            .GetDevicePeriod(Some(&mut default_period as *mut _), Some(&mut min_period as *mut _))
            .map_err(|e| CaptureError::Driver(format!("GetDevicePeriod failed: {}", e)))?;
    }
    Ok(min_period)
}

enum Command {
    Start(Sender<Result<(), CaptureError>>),
    Stop(Sender<Result<(), CaptureError>>),
    Shutdown,
}

struct DeviceShared {
    ring: Mutex<RingBuffer>,
    recording: AtomicBool,
    period_frames: AtomicUsize,
    listener: Mutex<Option<PeriodListener>>,
    /// Stream failure not yet seen by a reader.
    fault: Mutex<Option<CaptureError>>,
}

/// An open WASAPI capture stream.
pub struct WasapiDevice {
    commands: Option<Sender<Command>>,
    worker: Option<thread::JoinHandle<()>>,
    shared: Arc<DeviceShared>,
}

impl WasapiDevice {
    fn spawn(device_id: Option<String>, spec: DeviceSpec) -> Result<Self, CaptureError> {
        let shared = Arc::new(DeviceShared {
            ring: Mutex::new(RingBuffer::new(spec.buffer_frames)),
            recording: AtomicBool::new(false),
            period_frames: AtomicUsize::new(0),
            listener: Mutex::new(None),
            fault: Mutex::new(None),
        });

        let (command_tx, command_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();
        let (tick_tx, tick_rx) = mpsc::channel::<()>();

        let notifier_shared = Arc::clone(&shared);
        thread::Builder::new()
            .name("wasapi-period-notifier".into())
            .spawn(move || {
                for () in tick_rx {
                    let listener = notifier_shared.listener.lock().clone();
                    if let Some(listener) = listener {
                        listener();
                    }
                }
            })
            .map_err(|e| CaptureError::Driver(format!("failed to spawn notifier: {}", e)))?;

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("wasapi-mic-capture".into())
            .spawn(move || {
                capture_worker(device_id, spec, worker_shared, command_rx, ready_tx, tick_tx)
            })
            .map_err(|e| CaptureError::Driver(format!("failed to spawn mic thread: {}", e)))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                commands: Some(command_tx),
                worker: Some(worker),
                shared,
            }),
            Ok(Err(e)) => {
                let _ = worker.join();
                Err(e)
            }
            Err(_) => {
                let _ = worker.join();
                Err(CaptureError::InitializationFailed(
                    "capture thread exited during setup".into(),
                ))
            }
        }
    }

    fn send(
        &self,
        build: impl FnOnce(Sender<Result<(), CaptureError>>) -> Command,
    ) -> Result<(), CaptureError> {
        let commands = self
            .commands
            .as_ref()
            .ok_or_else(|| CaptureError::InvalidState("device released".into()))?;
        let (reply_tx, reply_rx) = mpsc::channel();
        commands
            .send(build(reply_tx))
            .map_err(|_| CaptureError::Driver("capture thread is gone".into()))?;
        reply_rx
            .recv()
            .map_err(|_| CaptureError::Driver("capture thread is gone".into()))?
    }
}

impl CaptureDevice for WasapiDevice {
    fn is_initialized(&self) -> bool {
        self.worker.is_some()
    }

    fn recording_state(&self) -> RecordingState {
        if self.shared.recording.load(Ordering::SeqCst) {
            RecordingState::Recording
        } else {
            RecordingState::Stopped
        }
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        self.send(Command::Start)
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        self.send(Command::Stop)
    }

    fn read(&mut self, buf: &mut [i16]) -> Result<usize, CaptureError> {
        if self.commands.is_none() {
            return Err(CaptureError::InvalidState("device released".into()));
        }
        if let Some(fault) = self.shared.fault.lock().take() {
            return Err(fault);
        }
        Ok(self.shared.ring.lock().read_into(buf))
    }

    fn set_period_listener(&mut self, period_frames: usize, listener: PeriodListener) {
        self.shared.period_frames.store(period_frames, Ordering::SeqCst);
        *self.shared.listener.lock() = Some(listener);
    }

    fn clear_period_listener(&mut self) {
        self.shared.period_frames.store(0, Ordering::SeqCst);
        self.shared.listener.lock().take();
    }

    fn release(&mut self) {
        self.clear_period_listener();
        if let Some(commands) = self.commands.take() {
            let _ = commands.send(Command::Shutdown);
        }
        // The worker never runs listeners, so joining it cannot deadlock.
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        self.shared.recording.store(false, Ordering::SeqCst);
        self.shared.ring.lock().reset();
        self.shared.fault.lock().take();
    }
}

impl Drop for WasapiDevice {
    fn drop(&mut self) {
        self.release();
    }
}

/// Worker thread body: owns COM and the stream for the device's lifetime.
fn capture_worker(
    device_id: Option<String>,
    spec: DeviceSpec,
    shared: Arc<DeviceShared>,
    commands: Receiver<Command>,
    ready: Sender<Result<(), CaptureError>>,
    ticks: Sender<()>,
) {
    let stream = match CaptureStream::open(device_id.as_deref(), spec) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    let _ = ready.send(Ok(()));

    let mut frames_since_notify = 0usize;
    let mut faults = FaultTracker::default();
    loop {
        match commands.recv_timeout(POLL_INTERVAL) {
            Ok(Command::Start(reply)) => {
                let result = stream.start();
                if result.is_ok() {
                    frames_since_notify = 0;
                    faults.reset();
                    shared.recording.store(true, Ordering::SeqCst);
                }
                let _ = reply.send(result);
            }
            Ok(Command::Stop(reply)) => {
                let result = stream.stop();
                if result.is_ok() {
                    shared.recording.store(false, Ordering::SeqCst);
                }
                let _ = reply.send(result);
            }
            Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }

        if !shared.recording.load(Ordering::SeqCst) || faults.is_halted() {
            continue;
        }

        let drained = stream.drain(|samples| {
            let dropped = shared.ring.lock().write(samples);
            if dropped > 0 {
                log::trace!("Ring buffer overflow, dropped {} samples", dropped);
            }
        });
        match drained {
            Ok(frames) => {
                faults.on_success();
                let period = shared.period_frames.load(Ordering::SeqCst);
                if period == 0 {
                    continue;
                }
                frames_since_notify += frames;
                while frames_since_notify >= period {
                    frames_since_notify -= period;
                    let _ = ticks.send(());
                }
            }
            Err(e) => {
                let code = e.code().0;
                let action = faults.on_failure(code);
                log::error!("Mic capture error: {}", e);
                if action == FaultAction::Halt {
                    log::error!("Capture stream halted after error {:#010x}", code);
                }
                // One outstanding fault at a time; the tick makes a reader see it.
                let mut fault = shared.fault.lock();
                if fault.is_none() {
                    *fault = Some(CaptureError::ReadFailed(code));
                    drop(fault);
                    let _ = ticks.send(());
                }
            }
        }
    }

    if shared.recording.swap(false, Ordering::SeqCst) {
        let _ = stream.stop();
    }
}

/// COM objects for one shared-mode capture stream. Lives on the worker thread.
struct CaptureStream {
    audio_client: IAudioClient,
    capture_client: IAudioCaptureClient,
    mmcss: Option<HANDLE>,
    // Dropped last so the interfaces above are released inside the apartment.
    _com: ComApartment,
}

impl Drop for CaptureStream {
    fn drop(&mut self) {
        if let Some(handle) = self.mmcss.take() {
            if let Err(e) = unsafe { AvRevertMmThreadCharacteristics(handle) } {
                log::debug!("MMCSS revert failed: {}", e);
            }
        }
    }
}

impl CaptureStream {
    /// Sequence:
    /// 1. CoInitializeEx (MTA)
    /// 2. Get capture device (default or by ID)
    /// 3. Activate IAudioClient
    /// 4. Initialize in shared mode, converting to mono PCM16 at the requested rate
    /// 5. Get IAudioCaptureClient service
    /// 6. Register with MMCSS for real-time priority
    fn open(device_id: Option<&str>, spec: DeviceSpec) -> Result<Self, CaptureError> {
        let com = ComApartment::enter()?;
        let device = capture_endpoint(device_id)?;
        let audio_client = activate_client(&device)?;

        let format = pcm16_mono(spec.sample_rate);
        let buffer_duration = hns_for_frames(spec.buffer_frames, spec.sample_rate);

        unsafe {
            audio_client
                .Initialize(
                    AUDCLNT_SHAREMODE_SHARED,
                    AUDCLNT_STREAMFLAGS_AUTOCONVERTPCM
                        | AUDCLNT_STREAMFLAGS_SRC_DEFAULT_QUALITY
                        | AUDCLNT_STREAMFLAGS_NOPERSIST,
                    buffer_duration,
                    0,
                    &format,
                    None,
                )
                .map_err(|e| {
                    CaptureError::InitializationFailed(format!(
                        "IAudioClient::Initialize failed: {}",
                        e
                    ))
                })?;

            let capture_client: IAudioCaptureClient = audio_client.GetService().map_err(|e| {
                CaptureError::InitializationFailed(format!("GetService failed: {}", e))
            })?;

            let mut task_index: u32 = 0;
            let mmcss = match AvSetMmThreadCharacteristicsW(w!("Pro Audio"), &mut task_index) {
                Ok(handle) => Some(handle),
                Err(e) => {
                    log::debug!("MMCSS registration failed: {}", e);
                    None
                }
            };

            Ok(Self {
                audio_client,
                capture_client,
                mmcss,
                _com: com,
            })
        }
    }

    fn start(&self) -> Result<(), CaptureError> {
        unsafe {
            self.audio_client
                .Start()
                .map_err(|e| CaptureError::Driver(format!("IAudioClient::Start failed: {}", e)))
        }
    }

    fn stop(&self) -> Result<(), CaptureError> {
        unsafe {
            self.audio_client
                .Stop()
                .map_err(|e| CaptureError::Driver(format!("IAudioClient::Stop failed: {}", e)))
        }
    }

    /// Hand every pending packet to `sink`. Returns the number of frames drained.
    fn drain(&self, mut sink: impl FnMut(&[i16])) -> windows::core::Result<usize> {
        let mut total = 0usize;
        unsafe {
            loop {
                let packet_length = self.capture_client.GetNextPacketSize()?;
                if packet_length == 0 {
                    break;
                }

                let mut buffer_ptr: *mut u8 = std::ptr::null_mut();
                let mut num_frames: u32 = 0;
                let mut flags: u32 = 0;
                self.capture_client
                    .GetBuffer(&mut buffer_ptr, &mut num_frames, &mut flags, None, None)?;

                let frames = num_frames as usize;
                if frames > 0 {
                    let silent = flags & (AUDCLNT_BUFFERFLAGS_SILENT.0 as u32) != 0;
                    if silent || buffer_ptr.is_null() {
                        sink(&vec![0i16; frames]);
                    } else {
                        sink(std::slice::from_raw_parts(buffer_ptr as *const i16, frames));
                    }
                    total += frames;
                }

                self.capture_client.ReleaseBuffer(num_frames)?;
            }
        }
        Ok(total)
    }
}

fn pcm16_mono(sample_rate: u32) -> WAVEFORMATEX {
    WAVEFORMATEX {
        wFormatTag: WAVE_FORMAT_PCM as u16,
        nChannels: 1,
        nSamplesPerSec: sample_rate,
        nAvgBytesPerSec: sample_rate * 2,
        nBlockAlign: 2,
        wBitsPerSample: 16,
        cbSize: 0,
    }
}
