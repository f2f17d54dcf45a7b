//! # soundstream-windows
//!
//! Windows WASAPI backend for soundstream.
//!
//! Provides:
//! - `WasapiDriver` / `WasapiDevice`: mono PCM16 microphone capture via a
//!   shared-mode WASAPI capture endpoint
//! - `WindowsMicPermission`: `PermissionPlatform` over the Windows microphone
//!   privacy setting
//! - `period`: reference-time / frame conversions (all platforms)
//! - `fault`: capture stream failure classification (all platforms)
//!
//! ## Platform Requirements
//! - Windows 10 1803+ for the microphone privacy setting
//! - Visual Studio Build Tools 2022 + Windows SDK for linking
//!
//! ## Usage
//! ```ignore
//! use std::sync::Arc;
//! use soundstream_core::{MethodChannel, RecorderSession};
//! use soundstream_windows::{WasapiDriver, WindowsMicPermission};
//!
//! let session = RecorderSession::new(
//!     WasapiDriver::default_device(),
//!     Arc::new(WindowsMicPermission::new()),
//!     sink,
//! );
//! let channel = MethodChannel::new(session);
//! ```

pub mod fault;
pub mod period;

#[cfg(target_os = "windows")]
mod com;
#[cfg(target_os = "windows")]
pub mod permissions;
#[cfg(target_os = "windows")]
pub mod wasapi_driver;

#[cfg(target_os = "windows")]
pub use permissions::WindowsMicPermission;
#[cfg(target_os = "windows")]
pub use wasapi_driver::{WasapiDevice, WasapiDriver};
