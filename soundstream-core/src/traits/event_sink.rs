use crate::models::event::PlatformEvent;

/// Outbound transport for session events.
///
/// Called from command, permission and capture threads alike.
/// Delivery is fire-and-forget; implementations must not call back into
/// the session synchronously while holding their own locks.
pub trait EventSink: Send + Sync {
    fn send(&self, event: &PlatformEvent);
}
