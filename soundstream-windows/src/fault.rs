//! Classification of capture stream failures.

/// The endpoint was unplugged, disabled or reconfigured.
pub const AUDCLNT_E_DEVICE_INVALIDATED: i32 = 0x8889_0004_u32 as i32;
/// The Windows audio service stopped.
pub const AUDCLNT_E_SERVICE_NOT_RUNNING: i32 = 0x8889_0010_u32 as i32;

/// Consecutive failed polls before a stream is given up on.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultAction {
    /// Surface the failure and keep polling.
    Report,
    /// Surface the failure and stop polling the stream.
    Halt,
}

pub fn is_fatal(code: i32) -> bool {
    code == AUDCLNT_E_DEVICE_INVALIDATED || code == AUDCLNT_E_SERVICE_NOT_RUNNING
}

/// Tracks stream failures across polls.
#[derive(Debug, Default)]
pub struct FaultTracker {
    consecutive: u32,
    halted: bool,
}

impl FaultTracker {
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn on_success(&mut self) {
        self.consecutive = 0;
    }

    pub fn on_failure(&mut self, code: i32) -> FaultAction {
        self.consecutive += 1;
        if is_fatal(code) || self.consecutive >= MAX_CONSECUTIVE_FAILURES {
            self.halted = true;
            FaultAction::Halt
        } else {
            FaultAction::Report
        }
    }

    /// A restart gets a fresh budget.
    pub fn reset(&mut self) {
        self.consecutive = 0;
        self.halted = false;
    }
}
