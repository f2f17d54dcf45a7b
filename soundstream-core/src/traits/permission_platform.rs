use crate::session::permission_gate::PermissionRequest;

/// Platform access to the microphone capture permission.
pub trait PermissionPlatform: Send + Sync {
    /// Current grant, re-evaluated on every call.
    fn has_permission(&self) -> bool;

    /// Whether a UI surface is attached that a request can be shown from.
    fn has_surface(&self) -> bool;

    /// Issue the asynchronous platform request.
    ///
    /// The answer is delivered later, from any thread, through
    /// `request.resolve(granted)` (or `PermissionGate::deliver` with
    /// `request.token()`).
    fn request(&self, request: PermissionRequest);
}
