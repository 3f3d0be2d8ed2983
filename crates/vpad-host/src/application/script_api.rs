//! ScriptApi: the surface a script host binds its functions to.
//!
//! Scripts speak in plain integers.  This module converts them the way a
//! script host casts its numbers (truncating to the target width) and forwards
//! each call to the [`VirtualControllerManager`].
//!
//! | Script function        | Method                                  |
//! |------------------------|-----------------------------------------|
//! | `AttachController`     | [`ScriptApi::attach_controller`]        |
//! | `DetachController`     | [`ScriptApi::detach_controller`]        |
//! | `IsControllerAttached` | [`ScriptApi::is_controller_attached`]   |
//! | `SetButtons`           | [`ScriptApi::set_buttons`]              |
//! | `SetJoystick`          | [`ScriptApi::set_joystick`]             |
//! | `ResyncController`     | [`ScriptApi::resync_controller`]        |
//! | `SleepThread`          | [`ScriptApi::sleep`]                    |
//! | `Log`                  | [`ScriptApi::log`]                      |
//!
//! Failures are [`ControllerError`] values whose `Display` output is the
//! message raised into the script, e.g. `"Error attaching controller: 0x0000cc22"`.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use vpad_core::{ButtonMask, ControllerHandle, ControllerIdentity};

use super::manage_controllers::{ControllerError, VirtualControllerManager};

/// Script-facing wrapper around a shared [`VirtualControllerManager`].
#[derive(Clone)]
pub struct ScriptApi {
    manager: Arc<VirtualControllerManager>,
}

impl ScriptApi {
    pub fn new(manager: Arc<VirtualControllerManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &VirtualControllerManager {
        &self.manager
    }

    /// Attaches a wireless gamepad with the given colors.
    ///
    /// # Errors
    ///
    /// See [`VirtualControllerManager::attach`].
    pub fn attach_controller(
        &self,
        body_color: i64,
        buttons_color: i64,
        grip_left_color: i64,
        grip_right_color: i64,
    ) -> Result<ControllerHandle, ControllerError> {
        self.manager.attach(ControllerIdentity::new(
            body_color as u32,
            buttons_color as u32,
            grip_left_color as u32,
            grip_right_color as u32,
        ))
    }

    /// # Errors
    ///
    /// See [`VirtualControllerManager::detach`].
    pub fn detach_controller(&self, handle: ControllerHandle) -> Result<(), ControllerError> {
        self.manager.detach(handle)
    }

    /// `None` stands for a missing or nil handle argument and answers `false`.
    ///
    /// # Errors
    ///
    /// See [`VirtualControllerManager::is_attached`].
    pub fn is_controller_attached(
        &self,
        handle: Option<ControllerHandle>,
    ) -> Result<bool, ControllerError> {
        self.manager.is_attached(handle)
    }

    /// Replaces the button mask; the integer is reinterpreted as 64 raw bits.
    ///
    /// # Errors
    ///
    /// See [`VirtualControllerManager::set_buttons`].
    pub fn set_buttons(&self, handle: ControllerHandle, mask: i64) -> Result<(), ControllerError> {
        self.manager
            .set_buttons(handle, ButtonMask::from_bits_retain(mask as u64))
    }

    /// Sets stick `index` (1 = left, 2 = right) to `(x, y)`.
    ///
    /// # Errors
    ///
    /// See [`VirtualControllerManager::set_joystick`].
    pub fn set_joystick(
        &self,
        handle: ControllerHandle,
        index: i64,
        x: i64,
        y: i64,
    ) -> Result<(), ControllerError> {
        self.manager.set_joystick(handle, index, x as i32, y as i32)
    }

    /// # Errors
    ///
    /// See [`VirtualControllerManager::resync`].
    pub fn resync_controller(&self, handle: ControllerHandle) -> Result<(), ControllerError> {
        self.manager.resync(handle)
    }

    /// Blocks the calling thread; zero or negative durations return at once.
    pub fn sleep(&self, nanoseconds: i64) {
        if let Ok(ns) = u64::try_from(nanoseconds) {
            if ns > 0 {
                std::thread::sleep(Duration::from_nanos(ns));
            }
        }
    }

    pub fn log(&self, message: &str) {
        info!(target: "vpad::script", "{message}");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::manage_controllers::DeviceBackend;
    use crate::infrastructure::device_backend::in_memory::{BackendOp, InMemoryDeviceBackend};
    use std::time::Instant;
    use vpad_core::{ResultCode, StickState};

    fn make_api() -> (ScriptApi, Arc<InMemoryDeviceBackend>) {
        let backend = Arc::new(InMemoryDeviceBackend::new());
        let manager = VirtualControllerManager::new(Arc::clone(&backend) as Arc<dyn DeviceBackend>);
        (ScriptApi::new(Arc::new(manager)), backend)
    }

    #[test]
    fn test_attach_controller_passes_colors_through() {
        // Arrange
        let (api, backend) = make_api();

        // Act
        let handle = api
            .attach_controller(0xFF0000, 0x00FF00, 0x0000FF, 0xFFFFFF)
            .unwrap();

        // Assert
        let identity = api.manager().identity(handle).unwrap();
        assert_eq!(
            identity,
            ControllerIdentity::new(0xFF0000, 0x00FF00, 0x0000FF, 0xFFFFFF)
        );
        assert_eq!(backend.device_count(), 1);
    }

    #[test]
    fn test_attach_controller_truncates_colors_to_32_bits() {
        let (api, _) = make_api();

        let handle = api.attach_controller(0x1_0000_00AA, -1, 0, 0).unwrap();

        let identity = api.manager().identity(handle).unwrap();
        assert_eq!(identity.body_color, 0xAA);
        assert_eq!(identity.buttons_color, 0xFFFF_FFFF);
    }

    #[test]
    fn test_set_buttons_negative_integer_sets_high_bit() {
        let (api, _) = make_api();
        let handle = api.attach_controller(0, 0, 0, 0).unwrap();

        api.set_buttons(handle, -1).unwrap();

        assert_eq!(
            api.manager().snapshot(handle).unwrap().buttons(),
            ButtonMask::all()
        );
    }

    #[test]
    fn test_set_joystick_truncates_axes_to_32_bits() {
        let (api, _) = make_api();
        let handle = api.attach_controller(0, 0, 0, 0).unwrap();

        api.set_joystick(handle, 1, 100, -50).unwrap();

        assert_eq!(
            api.manager().snapshot(handle).unwrap().left_stick(),
            StickState::new(100, -50)
        );
    }

    #[test]
    fn test_is_controller_attached_nil_is_false() {
        let (api, _) = make_api();
        assert_eq!(api.is_controller_attached(None), Ok(false));
    }

    #[test]
    fn test_failure_message_embeds_hex_code() {
        // Arrange
        let (api, backend) = make_api();
        backend.fail_next(BackendOp::Register, ResultCode::from_raw(0x2A8));

        // Act
        let err = api.attach_controller(0, 0, 0, 0).unwrap_err();

        // Assert
        assert_eq!(err.to_string(), "Error attaching controller: 0x000002a8");
    }

    #[test]
    fn test_sleep_negative_returns_immediately() {
        let (api, _) = make_api();
        let start = Instant::now();

        api.sleep(-5);
        api.sleep(0);

        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn test_sleep_blocks_for_requested_duration() {
        let (api, _) = make_api();
        let start = Instant::now();

        api.sleep(2_000_000);

        assert!(start.elapsed() >= Duration::from_millis(2));
    }
}
