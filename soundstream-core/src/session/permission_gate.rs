//! Capture-permission gate.
//!
//! The platform answers asynchronously and from any thread. Each request
//! carries a [`PermissionToken`]; a result is applied only when its token
//! matches the single outstanding request, so stray or late answers cannot
//! complete the wrong request.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use uuid::Uuid;

use crate::models::error::PermissionError;
use crate::traits::permission_platform::PermissionPlatform;

/// Continuation run once with the platform's answer.
pub type PermissionCallback = Box<dyn FnOnce(bool) + Send + 'static>;

/// Correlates a platform answer with the request that asked for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PermissionToken(Uuid);

impl PermissionToken {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for PermissionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

struct Outstanding {
    token: PermissionToken,
    on_resolved: PermissionCallback,
}

#[derive(Default)]
struct GateShared {
    outstanding: Mutex<Option<Outstanding>>,
}

impl GateShared {
    fn complete(&self, token: PermissionToken, granted: bool) -> bool {
        let on_resolved = {
            let mut slot = self.outstanding.lock();
            match slot.take() {
                Some(outstanding) if outstanding.token == token => outstanding.on_resolved,
                other => {
                    *slot = other;
                    log::debug!("Ignoring permission result for unknown request {}", token);
                    return false;
                }
            }
        };
        on_resolved(granted);
        true
    }
}

/// Handle given to the platform for answering one request.
pub struct PermissionRequest {
    token: PermissionToken,
    gate: Weak<GateShared>,
}

impl PermissionRequest {
    pub fn token(&self) -> PermissionToken {
        self.token
    }

    /// Deliver the user's answer. Returns `false` if the gate is gone or the
    /// request was already answered.
    pub fn resolve(self, granted: bool) -> bool {
        match self.gate.upgrade() {
            Some(gate) => gate.complete(self.token, granted),
            None => false,
        }
    }
}

impl fmt::Debug for PermissionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionRequest")
            .field("token", &self.token)
            .finish()
    }
}

/// Queries and requests the microphone permission, at most one request at a time.
pub struct PermissionGate {
    platform: Arc<dyn PermissionPlatform>,
    shared: Arc<GateShared>,
}

impl PermissionGate {
    pub fn new(platform: Arc<dyn PermissionPlatform>) -> Self {
        Self {
            platform,
            shared: Arc::new(GateShared::default()),
        }
    }

    /// Current grant; asks the platform every time.
    pub fn has_permission(&self) -> bool {
        self.platform.has_permission()
    }

    /// Whether a request is waiting on the platform.
    pub fn is_pending(&self) -> bool {
        self.shared.outstanding.lock().is_some()
    }

    /// Ask the platform for the permission.
    ///
    /// `on_resolved` runs exactly once when the matching answer arrives and
    /// never when this returns an error. There is no timeout and no way to
    /// withdraw an issued request.
    pub fn request_permission(
        &self,
        on_resolved: PermissionCallback,
    ) -> Result<PermissionToken, PermissionError> {
        if self.platform.has_permission() {
            return Err(PermissionError::AlreadyGranted);
        }
        if !self.platform.has_surface() {
            return Err(PermissionError::NoSurface);
        }

        let token = {
            let mut slot = self.shared.outstanding.lock();
            if slot.is_some() {
                return Err(PermissionError::RequestPending);
            }
            let token = PermissionToken::new();
            *slot = Some(Outstanding { token, on_resolved });
            token
        };

        // Lock released: the platform may answer synchronously.
        self.platform.request(PermissionRequest {
            token,
            gate: Arc::downgrade(&self.shared),
        });
        Ok(token)
    }

    /// Route a platform answer by token, for hosts that receive results
    /// out-of-band. Returns whether it matched the outstanding request.
    pub fn deliver(&self, token: PermissionToken, granted: bool) -> bool {
        self.shared.complete(token, granted)
    }
}
