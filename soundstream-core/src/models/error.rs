use thiserror::Error;

/// Driver-level errors reported by a `CaptureDriver` / `CaptureDevice`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("device not available")]
    DeviceNotAvailable,

    #[error("device initialization failed: {0}")]
    InitializationFailed(String),

    #[error("invalid device state: {0}")]
    InvalidState(String),

    #[error("read failed with code {0}")]
    ReadFailed(i32),

    #[error("driver error: {0}")]
    Driver(String),
}

/// Errors raised by the `PermissionGate`.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PermissionError {
    /// No UI surface is attached to ask the user from.
    #[error("cannot request permission, no surface is available")]
    NoSurface,

    #[error("permission is already granted")]
    AlreadyGranted,

    #[error("a permission request is already outstanding")]
    RequestPending,
}

/// Command-level errors surfaced to the consumer of a recorder session.
///
/// Permission denial is not an error: `initializeRecorder` answers
/// `{success: false}` instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecorderError {
    #[error("cannot request permission, no surface is available")]
    NoSurface,

    #[error("sample rate {0} Hz is not supported by the capture driver")]
    InvalidSampleRate(u32),

    #[error("host context is not available")]
    NoContext,

    #[error("failed to initialize capture device: {0}")]
    RecorderInitFailed(String),

    #[error("recorder not initialized")]
    RecorderNotInitialized,

    #[error("failed to start recording: {0}")]
    FailedToRecord(String),

    #[error("failed to stop recording: {0}")]
    FailedToStop(String),

    #[error("an initialization is already waiting for permission")]
    InitializePending,

    #[error("unexpected error: {0}")]
    Unknown(String),
}

impl RecorderError {
    /// Stable symbolic code used on the method channel.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoSurface => "NoSurface",
            Self::InvalidSampleRate(_) => "InvalidSampleRate",
            Self::NoContext => "NoContext",
            Self::RecorderInitFailed(_) => "RecorderInitFailed",
            Self::RecorderNotInitialized => "RecorderNotInitialized",
            Self::FailedToRecord(_) => "FailedToRecord",
            Self::FailedToStop(_) => "FailedToStop",
            Self::InitializePending => "InitializePending",
            Self::Unknown(_) => "Unknown",
        }
    }
}

impl From<PermissionError> for RecorderError {
    fn from(err: PermissionError) -> Self {
        match err {
            PermissionError::NoSurface => Self::NoSurface,
            other => Self::Unknown(other.to_string()),
        }
    }
}
