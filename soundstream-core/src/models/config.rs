use serde::Deserialize;

/// Sample rate used when `initializeRecorder` omits one.
pub const DEFAULT_SAMPLE_RATE: u32 = 16000;

/// Configuration for a recorder session.
///
/// Captured format is fixed to mono PCM16; only the rate varies.
/// Replaced wholesale by each `initialize` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecorderConfig {
    /// Capture sample rate in Hz (default: 16000).
    pub sample_rate: u32,

    /// Emit diagnostic `debug!` logs from the session (default: false).
    #[serde(alias = "showLogs")]
    pub verbose_logging: bool,
}

impl RecorderConfig {
    pub fn new(sample_rate: u32, verbose_logging: bool) -> Self {
        Self {
            sample_rate,
            verbose_logging,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate == 0 {
            return Err("sample rate must be positive".into());
        }
        Ok(())
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            verbose_logging: false,
        }
    }
}

/// Parameters handed to `CaptureDriver::open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceSpec {
    pub sample_rate: u32,
    /// Frames between periodic notifications.
    pub period_frames: usize,
    /// Driver-side buffer size in frames (double-buffered period).
    pub buffer_frames: usize,
}

impl DeviceSpec {
    pub fn for_period(sample_rate: u32, period_frames: usize) -> Self {
        Self {
            sample_rate,
            period_frames,
            buffer_frames: period_frames * 2,
        }
    }
}
