//! # soundstream-core
//!
//! Platform-agnostic microphone streaming core.
//!
//! Manages the lifecycle of a capture device, gates initialization behind an
//! asynchronously resolved permission, and drains captured audio every
//! period into little-endian PCM16 packets pushed to an event sink.
//! Platform backends implement `CaptureDriver` and `PermissionPlatform`
//! and plug into the generic `RecorderSession`.
//!
//! ## Architecture
//!
//! ```text
//! soundstream-core (this crate)
//! ├── traits/       ← CaptureDriver, CaptureDevice, PermissionPlatform, EventSink, Clock
//! ├── models/       ← RecorderConfig, RecorderState, RecorderError, PlatformEvent, etc.
//! ├── processing/   ← AudioFrameBuffer, PCM16 packing, RingBuffer
//! ├── session/      ← RecorderSession, PermissionGate, capture loop, EventEmitter
//! ├── channel/      ← MethodChannel (command dispatch for a host transport)
//! └── drivers/      ← MemoryDriver (host-fed reference backend)
//! ```

pub mod channel;
pub mod drivers;
pub mod models;
pub mod processing;
pub mod session;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use channel::method_channel::{MethodCall, MethodChannel, MethodResponse, Responder};
pub use drivers::memory::{MemoryDevice, MemoryDriver};
pub use models::config::{DeviceSpec, RecorderConfig, DEFAULT_SAMPLE_RATE};
pub use models::diagnostics::RecorderDiagnostics;
pub use models::error::{CaptureError, PermissionError, RecorderError};
pub use models::event::{AudioPacket, PlatformEvent, WireEvent};
pub use models::state::{RecorderState, RecordingState};
pub use processing::frame_buffer::AudioFrameBuffer;
pub use processing::pcm::{decode_pcm16le, encode_pcm16le};
pub use processing::ring_buffer::RingBuffer;
pub use session::emitter::EventEmitter;
pub use session::manager::{InitOutcome, InitResponder, RecorderSession};
pub use session::permission_gate::{PermissionCallback, PermissionGate, PermissionRequest, PermissionToken};
pub use traits::capture_driver::{CaptureDevice, CaptureDriver, PeriodListener};
pub use traits::clock::{Clock, SystemClock};
pub use traits::event_sink::EventSink;
pub use traits::permission_platform::PermissionPlatform;
