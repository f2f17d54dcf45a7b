//! COM apartment and endpoint helpers shared by the driver and permission check.

use windows::core::HSTRING;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;

use soundstream_core::CaptureError;

/// Initializes a multithreaded apartment; uninitializes on drop.
pub(crate) struct ComApartment;

impl ComApartment {
    pub(crate) fn enter() -> Result<Self, CaptureError> {
        unsafe {
            CoInitializeEx(None, COINIT_MULTITHREADED)
                .ok()
                .map_err(|e| CaptureError::Driver(format!("CoInitializeEx failed: {}", e)))?;
        }
        Ok(Self)
    }
}

impl Drop for ComApartment {
    fn drop(&mut self) {
        unsafe {
            CoUninitialize();
        }
    }
}

/// Resolve a capture endpoint by ID, or the default console capture device.
///
/// Requires COM to be initialized on the calling thread.
pub(crate) fn capture_endpoint(device_id: Option<&str>) -> Result<IMMDevice, CaptureError> {
    unsafe {
        let enumerator: IMMDeviceEnumerator =
            CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
                .map_err(|e| CaptureError::Driver(format!("failed to create enumerator: {}", e)))?;

        match device_id {
            Some(id) => enumerator
                .GetDevice(&HSTRING::from(id))
                .map_err(|_| CaptureError::DeviceNotAvailable),
            None => enumerator
                .GetDefaultAudioEndpoint(eCapture, eConsole)
                .map_err(|_| CaptureError::DeviceNotAvailable),
        }
    }
}

/// Activate an `IAudioClient` on `device`.
pub(crate) fn activate_client(device: &IMMDevice) -> Result<IAudioClient, CaptureError> {
    unsafe {
        device
            .Activate(CLSCTX_ALL, None)
            .map_err(|e| CaptureError::InitializationFailed(format!("Activate failed: {}", e)))
    }
}
