//! Windows microphone privacy permission.
//!
//! On Windows 10 1803+, microphone access is controlled by the privacy
//! settings at Settings > Privacy > Microphone. Unpackaged desktop apps get
//! no per-app consent dialog, so a "request" re-checks access after giving
//! the user a chance to flip the toggle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use soundstream_core::{CaptureError, PermissionPlatform, PermissionRequest};

use windows::Win32::Media::Audio::IAudioClient;
use windows::Win32::System::Com::CLSCTX_ALL;

use crate::com::{capture_endpoint, ComApartment};

const E_ACCESSDENIED: i32 = -2147024891;
const AUDCLNT_E_DEVICE_IN_USE: i32 = -2004287478;

/// Check if microphone access is available.
///
/// Attempts to activate the default capture device. Access denied or
/// `AUDCLNT_E_DEVICE_IN_USE` means the privacy toggle is likely off.
/// Runs on a short-lived thread so the caller's COM apartment is untouched.
pub fn check_microphone_permission() -> Result<bool, CaptureError> {
    thread::Builder::new()
        .name("mic-permission-check".into())
        .spawn(check_mic_access)
        .map_err(|e| CaptureError::Driver(format!("failed to spawn check thread: {}", e)))?
        .join()
        .map_err(|_| CaptureError::Driver("permission check panicked".into()))?
}

fn check_mic_access() -> Result<bool, CaptureError> {
    let _com = ComApartment::enter()?;

    let device = match capture_endpoint(None) {
        Ok(d) => d,
        Err(CaptureError::DeviceNotAvailable) => return Ok(false),
        Err(e) => return Err(e),
    };

    let result: windows::core::Result<IAudioClient> = unsafe { device.Activate(CLSCTX_ALL, None) };
    match result {
        Ok(_) => Ok(true),
        Err(e) => {
            let code = e.code().0;
            if code == E_ACCESSDENIED || code == AUDCLNT_E_DEVICE_IN_USE {
                Ok(false)
            } else {
                log::warn!("Unexpected error checking mic permission: {}", e);
                Ok(true)
            }
        }
    }
}

/// [`PermissionPlatform`] backed by the Windows privacy settings.
pub struct WindowsMicPermission {
    surface: AtomicBool,
}

impl WindowsMicPermission {
    pub fn new() -> Self {
        Self {
            surface: AtomicBool::new(true),
        }
    }

    /// Mark whether a foreground window is available to host a request.
    pub fn set_surface_available(&self, available: bool) {
        self.surface.store(available, Ordering::SeqCst);
    }
}

impl Default for WindowsMicPermission {
    fn default() -> Self {
        Self::new()
    }
}

impl PermissionPlatform for WindowsMicPermission {
    fn has_permission(&self) -> bool {
        match check_microphone_permission() {
            Ok(granted) => granted,
            Err(e) => {
                log::warn!("Microphone permission check failed: {}", e);
                false
            }
        }
    }

    fn has_surface(&self) -> bool {
        self.surface.load(Ordering::SeqCst)
    }

    fn request(&self, request: PermissionRequest) {
        let token = request.token();
        let spawned = thread::Builder::new()
            .name("mic-permission-request".into())
            .spawn(move || {
                let granted = check_mic_access().unwrap_or_else(|e| {
                    log::warn!("Microphone permission request {} failed: {}", token, e);
                    false
                });
                if !request.resolve(granted) {
                    log::debug!("Permission request {} resolved after it was dropped", token);
                }
            });
        if let Err(e) = spawned {
            log::error!("Failed to spawn permission request thread: {}", e);
        }
    }
}
