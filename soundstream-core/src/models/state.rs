use std::fmt;

use serde::{Deserialize, Serialize};

/// Recorder session state machine.
///
/// State transitions:
/// ```text
/// Unset → Initialized → Playing ↔ Stopped
/// ```
/// Only commands move the state. Re-initialization goes straight back to
/// `Initialized`; `Unset` is never revisited after construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RecorderState {
    #[default]
    Unset,
    Initialized,
    Playing,
    Stopped,
}

impl RecorderState {
    /// Symbolic name sent with `recorderStatus` events.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unset => "Unset",
            Self::Initialized => "Initialized",
            Self::Playing => "Playing",
            Self::Stopped => "Stopped",
        }
    }

    /// States from which `start` may drive a live device.
    pub fn can_start(&self) -> bool {
        matches!(self, Self::Initialized | Self::Playing | Self::Stopped)
    }
}

impl fmt::Display for RecorderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Hardware-level recording state reported by a capture device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    Stopped,
    Recording,
}
