//! In-memory device backend for tests and headless runs.
//!
//! # Why an in-memory backend?
//!
//! A real backend registers a virtual HID device with the platform's input
//! service.  That requires the platform, elevated service access, and makes
//! the emulated pad visible to every running application.
//!
//! `InMemoryDeviceBackend` replaces the platform with a device table and a
//! push log held in `Mutex`es, so tests can assert exactly which devices were
//! registered and which snapshots were pushed, in order.
//!
//! # Failure injection
//!
//! [`InMemoryDeviceBackend::fail_next`] makes the next call of one operation
//! fail with a chosen [`ResultCode`]; [`InMemoryDeviceBackend::fail_always`]
//! keeps failing until [`InMemoryDeviceBackend::clear_failures`].  This lets
//! tests drive every error path of the manager without a broken platform.
//!
//! ```ignore
//! let backend = Arc::new(InMemoryDeviceBackend::new());
//! let manager = VirtualControllerManager::new(Arc::clone(&backend) as Arc<dyn DeviceBackend>);
//!
//! let handle = manager.attach(identity)?;
//! backend.fail_next(BackendOp::Push, ResultCode::from_raw(0xCC22));
//! assert!(manager.set_buttons(handle, ButtonMask::A).is_err());
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::trace;
use vpad_core::{ControllerIdentity, ControllerProfile, ControllerState, ResultCode};

use crate::application::manage_controllers::{BackendHandle, DeviceBackend};

/// The four backend operations, used to target failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendOp {
    Register,
    Unregister,
    Query,
    Push,
}

/// Everything the backend knows about one registered device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredDevice {
    pub profile: ControllerProfile,
    pub identity: ControllerIdentity,
    /// Last snapshot accepted for the device, `None` until the first push.
    pub state: Option<ControllerState>,
    /// `false` once the platform side has dropped the device.
    pub attached: bool,
}

#[derive(Debug, Clone, Copy)]
struct Failure {
    code: ResultCode,
    persistent: bool,
}

/// Device backend that keeps everything in memory.
#[derive(Default)]
pub struct InMemoryDeviceBackend {
    next_id: AtomicU64,
    devices: Mutex<HashMap<BackendHandle, RegisteredDevice>>,
    pushes: Mutex<Vec<(BackendHandle, ControllerState)>>,
    failures: Mutex<HashMap<BackendOp, Failure>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl InMemoryDeviceBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next call of `op` fail with `code`.
    pub fn fail_next(&self, op: BackendOp, code: ResultCode) {
        lock(&self.failures).insert(
            op,
            Failure {
                code,
                persistent: false,
            },
        );
    }

    /// Makes every call of `op` fail with `code` until cleared.
    pub fn fail_always(&self, op: BackendOp, code: ResultCode) {
        lock(&self.failures).insert(
            op,
            Failure {
                code,
                persistent: true,
            },
        );
    }

    pub fn clear_failures(&self) {
        lock(&self.failures).clear();
    }

    /// Simulates the platform dropping the device on its own.
    pub fn unplug(&self, device: BackendHandle) {
        if let Some(entry) = lock(&self.devices).get_mut(&device) {
            entry.attached = false;
        }
    }

    pub fn device(&self, device: BackendHandle) -> Option<RegisteredDevice> {
        lock(&self.devices).get(&device).cloned()
    }

    /// Number of currently registered devices.
    pub fn device_count(&self) -> usize {
        lock(&self.devices).len()
    }

    /// Every accepted push, in order.
    pub fn pushes(&self) -> Vec<(BackendHandle, ControllerState)> {
        lock(&self.pushes).clone()
    }

    /// The snapshot the platform currently shows for `device`.
    pub fn current_state(&self, device: BackendHandle) -> Option<ControllerState> {
        lock(&self.devices).get(&device)?.state
    }

    /// Handles of all registered devices, in registration order.
    pub fn device_handles(&self) -> Vec<BackendHandle> {
        let mut handles: Vec<_> = lock(&self.devices).keys().copied().collect();
        handles.sort_by_key(|handle| handle.0);
        handles
    }

    fn check(&self, op: BackendOp) -> Result<(), ResultCode> {
        let mut failures = lock(&self.failures);
        match failures.get(&op).copied() {
            Some(failure) => {
                if !failure.persistent {
                    failures.remove(&op);
                }
                trace!(?op, code = %failure.code, "injected failure");
                Err(failure.code)
            }
            None => Ok(()),
        }
    }
}

/// Result code for calls naming a device that is not registered.
const DEVICE_NOT_FOUND: ResultCode = ResultCode::from_parts(202, 3);

impl DeviceBackend for InMemoryDeviceBackend {
    fn register_device(
        &self,
        profile: ControllerProfile,
        identity: ControllerIdentity,
    ) -> Result<BackendHandle, ResultCode> {
        self.check(BackendOp::Register)?;
        let handle = BackendHandle(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        lock(&self.devices).insert(
            handle,
            RegisteredDevice {
                profile,
                identity,
                state: None,
                attached: true,
            },
        );
        Ok(handle)
    }

    fn unregister_device(&self, device: BackendHandle) -> Result<(), ResultCode> {
        self.check(BackendOp::Unregister)?;
        lock(&self.devices)
            .remove(&device)
            .map(|_| ())
            .ok_or(DEVICE_NOT_FOUND)
    }

    fn query_attached(&self, device: BackendHandle) -> Result<bool, ResultCode> {
        self.check(BackendOp::Query)?;
        Ok(lock(&self.devices)
            .get(&device)
            .map(|entry| entry.attached)
            .unwrap_or(false))
    }

    fn push_state(&self, device: BackendHandle, state: &ControllerState) -> Result<(), ResultCode> {
        self.check(BackendOp::Push)?;
        let mut devices = lock(&self.devices);
        let entry = devices.get_mut(&device).ok_or(DEVICE_NOT_FOUND)?;
        entry.state = Some(*state);
        lock(&self.pushes).push((device, *state));
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use vpad_core::ButtonMask;

    const FAIL: ResultCode = ResultCode::from_raw(0xBAD);

    fn register(backend: &InMemoryDeviceBackend) -> BackendHandle {
        backend
            .register_device(ControllerProfile::WIRELESS_GAMEPAD, ControllerIdentity::default())
            .unwrap()
    }

    #[test]
    fn test_register_assigns_distinct_handles() {
        let backend = InMemoryDeviceBackend::new();

        let first = register(&backend);
        let second = register(&backend);

        assert_ne!(first, second);
        assert_eq!(backend.device_handles(), vec![first, second]);
    }

    #[test]
    fn test_registered_device_is_attached_until_unregistered() {
        // Arrange
        let backend = InMemoryDeviceBackend::new();
        let device = register(&backend);
        assert_eq!(backend.query_attached(device), Ok(true));

        // Act
        backend.unregister_device(device).unwrap();

        // Assert
        assert_eq!(backend.query_attached(device), Ok(false));
        assert_eq!(backend.device_count(), 0);
    }

    #[test]
    fn test_push_replaces_current_state_and_is_recorded() {
        // Arrange
        let backend = InMemoryDeviceBackend::new();
        let device = register(&backend);
        let mut state = ControllerState::default();
        state.set_buttons(ButtonMask::A);

        // Act
        backend.push_state(device, &ControllerState::default()).unwrap();
        backend.push_state(device, &state).unwrap();

        // Assert
        assert_eq!(backend.current_state(device), Some(state));
        assert_eq!(backend.pushes().len(), 2);
    }

    #[test]
    fn test_push_to_unknown_device_fails() {
        let backend = InMemoryDeviceBackend::new();
        let result = backend.push_state(BackendHandle(99), &ControllerState::default());
        assert_eq!(result, Err(DEVICE_NOT_FOUND));
    }

    #[test]
    fn test_fail_next_fails_exactly_once() {
        let backend = InMemoryDeviceBackend::new();
        backend.fail_next(BackendOp::Register, FAIL);

        let first = backend.register_device(
            ControllerProfile::WIRELESS_GAMEPAD,
            ControllerIdentity::default(),
        );
        let second = backend.register_device(
            ControllerProfile::WIRELESS_GAMEPAD,
            ControllerIdentity::default(),
        );

        assert_eq!(first, Err(FAIL));
        assert!(second.is_ok());
    }

    #[test]
    fn test_fail_always_persists_until_cleared() {
        // Arrange
        let backend = InMemoryDeviceBackend::new();
        let device = register(&backend);
        backend.fail_always(BackendOp::Query, FAIL);

        // Act / Assert
        assert_eq!(backend.query_attached(device), Err(FAIL));
        assert_eq!(backend.query_attached(device), Err(FAIL));
        backend.clear_failures();
        assert_eq!(backend.query_attached(device), Ok(true));
    }

    #[test]
    fn test_unplug_reports_not_attached_but_keeps_device() {
        let backend = InMemoryDeviceBackend::new();
        let device = register(&backend);

        backend.unplug(device);

        assert_eq!(backend.query_attached(device), Ok(false));
        assert!(backend.device(device).is_some());
    }
}
