//! VirtualControllerManager: lifecycle and state synchronisation of virtual
//! controllers.
//!
//! The manager owns one input snapshot per attached controller and keeps the
//! platform's view of each device in step with it.  The platform itself is
//! reached through a [`DeviceBackend`] trait object injected at construction
//! time; the concrete backend lives in the infrastructure layer.
//!
//! # Lifecycle (for beginners)
//!
//! ```text
//!            attach()                 detach()
//! Unattached ────────►  Attached  ───────────► Unattached
//!                         │  ▲
//!          set_buttons()  │  │  push full snapshot
//!          set_joystick() ▼  │  to the backend
//!                        snapshot
//! ```
//!
//! - `attach` registers a device with the backend, pushes the all-neutral
//!   snapshot, and hands back a [`ControllerHandle`].
//! - `set_buttons` / `set_joystick` mutate the retained snapshot and then push
//!   the *entire* snapshot.  The backend replaces state wholesale; it never
//!   receives deltas.
//! - `detach` unregisters the device.  Only a successful unregister frees the
//!   handle; on failure the bookkeeping stays so the caller can retry.
//!
//! # Divergence window
//!
//! A mutation is applied locally *before* it is pushed.  If the push fails the
//! local snapshot is already updated while the backend still shows the old
//! state.  The slot is then marked unsynced: [`VirtualControllerManager::is_synced`]
//! reports it, and [`VirtualControllerManager::resync`] (or the next successful
//! mutation) closes the window.
//!
//! # Concurrency
//!
//! A single mutex guards the handle table and is held across every
//! read-modify-push, so two callers can never interleave a mutation and a push
//! on the same controller.  Backend calls are synchronous and run under that
//! lock.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use vpad_core::{
    ButtonMask, ControllerHandle, ControllerIdentity, ControllerProfile, ControllerState,
    InvalidStickIndex, ResultCode, Stick, StickState,
};

// ── Backend contract ──────────────────────────────────────────────────────────

/// Platform-side identifier of a registered virtual device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BackendHandle(pub u64);

impl fmt::Display for BackendHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Platform capability that registers virtual input devices and accepts
/// input snapshots for them.
///
/// Every call can fail with the platform's raw [`ResultCode`].
#[cfg_attr(test, mockall::automock)]
pub trait DeviceBackend: Send + Sync {
    /// Registers a new virtual device with the given profile and colors.
    fn register_device(
        &self,
        profile: ControllerProfile,
        identity: ControllerIdentity,
    ) -> Result<BackendHandle, ResultCode>;

    /// Tears down a previously registered device.
    fn unregister_device(&self, device: BackendHandle) -> Result<(), ResultCode>;

    /// Reports whether the device is currently attached to the input subsystem.
    fn query_attached(&self, device: BackendHandle) -> Result<bool, ResultCode>;

    /// Replaces the device's input state with `state`.
    fn push_state(&self, device: BackendHandle, state: &ControllerState)
        -> Result<(), ResultCode>;
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Error type for controller lifecycle and update operations.
///
/// Backend failures render as `"<what failed>: 0x<code>"` with the code as
/// fixed-width hexadecimal; these strings are what scripts see.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    /// Device registration failed; no handle was created.
    #[error("Error attaching controller: {0}")]
    Registration(ResultCode),

    /// The device was registered but its initial snapshot could not be pushed.
    ///
    /// `retained` holds the handle when the device was left registered (and
    /// marked unsynced) and is `None` when registration was rolled back.
    #[error("Error setting controller state: {code}")]
    InitialPush {
        code: ResultCode,
        retained: Option<ControllerHandle>,
    },

    /// Unregistration failed; the handle is still tracked.
    #[error("Error disconnecting controller: {0}")]
    Unregistration(ResultCode),

    /// The attachment status could not be determined.
    #[error("Error checking if controller attached: {0}")]
    Query(ResultCode),

    /// The button update was applied locally but the push failed.
    #[error("Error setting button state: {0}")]
    ButtonPush(ResultCode),

    /// The stick update was applied locally but the push failed.
    #[error("Error setting joystick state: {0}")]
    JoystickPush(ResultCode),

    /// An explicit resync push failed.
    #[error("Error setting controller state: {0}")]
    Resync(ResultCode),

    /// The handle was never issued or has already been detached.
    #[error("Invalid controller handle: {0}")]
    InvalidHandle(ControllerHandle),

    /// The stick index was not 1 or 2.
    #[error("Invalid joystick index: {0}")]
    InvalidStickIndex(i64),

    /// The configured controller limit is reached.
    #[error("Too many controllers attached (limit {0})")]
    TooManyControllers(usize),
}

impl ControllerError {
    /// The backend status code, if the error came from the backend.
    pub fn code(&self) -> Option<ResultCode> {
        match self {
            Self::Registration(code)
            | Self::InitialPush { code, .. }
            | Self::Unregistration(code)
            | Self::Query(code)
            | Self::ButtonPush(code)
            | Self::JoystickPush(code)
            | Self::Resync(code) => Some(*code),
            Self::InvalidHandle(_) | Self::InvalidStickIndex(_) | Self::TooManyControllers(_) => {
                None
            }
        }
    }
}

impl From<InvalidStickIndex> for ControllerError {
    fn from(err: InvalidStickIndex) -> Self {
        Self::InvalidStickIndex(err.0)
    }
}

// ── Policy ────────────────────────────────────────────────────────────────────

/// What `attach` does when registration succeeds but the initial push fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachFailurePolicy {
    /// Keep the device registered and hand back an unsynced handle for retry.
    #[default]
    LeaveRegistered,
    /// Unregister the device and discard the handle.
    Rollback,
}

/// Tunables for [`VirtualControllerManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerOptions {
    pub attach_failure: AttachFailurePolicy,
    /// Maximum number of simultaneously attached controllers.
    pub max_controllers: usize,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            attach_failure: AttachFailurePolicy::default(),
            max_controllers: 8,
        }
    }
}

// ── Handle table ──────────────────────────────────────────────────────────────

struct ControllerEntry {
    device: BackendHandle,
    identity: ControllerIdentity,
    state: ControllerState,
    synced: bool,
}

#[derive(Default)]
struct Slot {
    generation: u32,
    entry: Option<ControllerEntry>,
}

/// Generation-checked slot table mapping handles to controller entries.
#[derive(Default)]
struct ControllerTable {
    slots: Vec<Slot>,
    live: usize,
}

impl ControllerTable {
    fn insert(&mut self, entry: ControllerEntry) -> ControllerHandle {
        let index = match self.slots.iter().position(|slot| slot.entry.is_none()) {
            Some(index) => index,
            None => {
                self.slots.push(Slot::default());
                self.slots.len() - 1
            }
        };
        let slot = &mut self.slots[index];
        slot.entry = Some(entry);
        self.live += 1;
        ControllerHandle::from_parts(index as u32, slot.generation)
    }

    fn slot(&self, handle: ControllerHandle) -> Option<&Slot> {
        self.slots
            .get(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
    }

    fn get(&self, handle: ControllerHandle) -> Option<&ControllerEntry> {
        self.slot(handle)?.entry.as_ref()
    }

    fn get_mut(&mut self, handle: ControllerHandle) -> Option<&mut ControllerEntry> {
        self.slots
            .get_mut(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())?
            .entry
            .as_mut()
    }

    fn remove(&mut self, handle: ControllerHandle) -> Option<ControllerEntry> {
        let slot = self
            .slots
            .get_mut(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())?;
        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.live -= 1;
        Some(entry)
    }

    fn handles(&self) -> Vec<ControllerHandle> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.entry.is_some())
            .map(|(index, slot)| ControllerHandle::from_parts(index as u32, slot.generation))
            .collect()
    }
}

// ── Manager ───────────────────────────────────────────────────────────────────

/// Owns every attached virtual controller and its input snapshot.
pub struct VirtualControllerManager {
    backend: Arc<dyn DeviceBackend>,
    options: ManagerOptions,
    table: Mutex<ControllerTable>,
}

impl VirtualControllerManager {
    /// Creates a manager with default options.
    pub fn new(backend: Arc<dyn DeviceBackend>) -> Self {
        Self::with_options(backend, ManagerOptions::default())
    }

    pub fn with_options(backend: Arc<dyn DeviceBackend>, options: ManagerOptions) -> Self {
        Self {
            backend,
            options,
            table: Mutex::new(ControllerTable::default()),
        }
    }

    /// The table is always left consistent before any early return, so a
    /// poisoned lock is safe to recover.
    fn table(&self) -> MutexGuard<'_, ControllerTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a new virtual controller and pushes its neutral snapshot.
    ///
    /// # Errors
    ///
    /// - [`ControllerError::TooManyControllers`] before any backend call when
    ///   the limit is reached.
    /// - [`ControllerError::Registration`] if the backend refuses the device;
    ///   nothing is retained.
    /// - [`ControllerError::InitialPush`] if the first push fails; see
    ///   [`AttachFailurePolicy`] for what happens to the device.
    pub fn attach(&self, identity: ControllerIdentity) -> Result<ControllerHandle, ControllerError> {
        let mut table = self.table();
        if table.live >= self.options.max_controllers {
            warn!(limit = self.options.max_controllers, "controller limit reached");
            return Err(ControllerError::TooManyControllers(self.options.max_controllers));
        }

        let device = self
            .backend
            .register_device(ControllerProfile::WIRELESS_GAMEPAD, identity)
            .map_err(|code| {
                warn!(%code, "device registration failed");
                ControllerError::Registration(code)
            })?;

        let state = ControllerState::default();
        match self.backend.push_state(device, &state) {
            Ok(()) => {
                let handle = table.insert(ControllerEntry {
                    device,
                    identity,
                    state,
                    synced: true,
                });
                info!(%handle, %device, "controller attached");
                Ok(handle)
            }
            Err(code) => match self.options.attach_failure {
                AttachFailurePolicy::LeaveRegistered => {
                    let handle = table.insert(ControllerEntry {
                        device,
                        identity,
                        state,
                        synced: false,
                    });
                    warn!(%handle, %device, %code, "initial state push failed; device left registered");
                    Err(ControllerError::InitialPush {
                        code,
                        retained: Some(handle),
                    })
                }
                AttachFailurePolicy::Rollback => {
                    warn!(%device, %code, "initial state push failed; rolling back registration");
                    if let Err(unregister_code) = self.backend.unregister_device(device) {
                        warn!(%device, code = %unregister_code, "rollback unregister failed");
                    }
                    Err(ControllerError::InitialPush {
                        code,
                        retained: None,
                    })
                }
            },
        }
    }

    /// Unregisters the controller and invalidates its handle.
    ///
    /// # Errors
    ///
    /// [`ControllerError::InvalidHandle`] for an unknown handle, or
    /// [`ControllerError::Unregistration`] if the backend fails, in which case
    /// the handle stays valid.
    pub fn detach(&self, handle: ControllerHandle) -> Result<(), ControllerError> {
        let mut table = self.table();
        let device = table
            .get(handle)
            .ok_or(ControllerError::InvalidHandle(handle))?
            .device;

        self.backend.unregister_device(device).map_err(|code| {
            warn!(%handle, %device, %code, "device unregistration failed");
            ControllerError::Unregistration(code)
        })?;

        table.remove(handle);
        info!(%handle, %device, "controller detached");
        Ok(())
    }

    /// Asks the backend whether the controller is attached.
    ///
    /// `None` and handles that are no longer tracked answer `false` without a
    /// backend call.
    ///
    /// # Errors
    ///
    /// [`ControllerError::Query`] if the backend cannot tell; this is "unknown",
    /// not "detached".
    pub fn is_attached(&self, handle: Option<ControllerHandle>) -> Result<bool, ControllerError> {
        let Some(handle) = handle else {
            return Ok(false);
        };
        let table = self.table();
        let Some(entry) = table.get(handle) else {
            return Ok(false);
        };

        self.backend.query_attached(entry.device).map_err(|code| {
            warn!(%handle, %code, "attachment query failed");
            ControllerError::Query(code)
        })
    }

    /// Replaces the whole button mask and pushes the snapshot.
    ///
    /// # Errors
    ///
    /// [`ControllerError::ButtonPush`] if the push fails.  The retained
    /// snapshot keeps the new mask and the controller is marked unsynced.
    pub fn set_buttons(
        &self,
        handle: ControllerHandle,
        buttons: ButtonMask,
    ) -> Result<(), ControllerError> {
        self.mutate_and_push(
            handle,
            |state| state.set_buttons(buttons),
            ControllerError::ButtonPush,
        )
    }

    /// Derives the new button mask from the current one and pushes the
    /// snapshot, all under one lock.
    ///
    /// # Errors
    ///
    /// As [`Self::set_buttons`].
    pub fn update_buttons(
        &self,
        handle: ControllerHandle,
        update: impl FnOnce(ButtonMask) -> ButtonMask,
    ) -> Result<(), ControllerError> {
        self.mutate_and_push(
            handle,
            |state| state.set_buttons(update(state.buttons())),
            ControllerError::ButtonPush,
        )
    }

    /// Replaces one stick's deflection, selected by its 1-based index, and
    /// pushes the snapshot.
    ///
    /// # Errors
    ///
    /// [`ControllerError::InvalidStickIndex`] for an index other than 1 or 2
    /// (nothing is changed or pushed), otherwise as [`Self::set_stick`].
    pub fn set_joystick(
        &self,
        handle: ControllerHandle,
        stick_index: i64,
        x: i32,
        y: i32,
    ) -> Result<(), ControllerError> {
        let stick = Stick::from_index(stick_index)?;
        self.set_stick(handle, stick, StickState::new(x, y))
    }

    /// Replaces one stick's deflection and pushes the snapshot.
    ///
    /// # Errors
    ///
    /// [`ControllerError::JoystickPush`] if the push fails.  The retained
    /// snapshot keeps the new deflection and the controller is marked unsynced.
    pub fn set_stick(
        &self,
        handle: ControllerHandle,
        stick: Stick,
        value: StickState,
    ) -> Result<(), ControllerError> {
        self.mutate_and_push(
            handle,
            |state| state.set_stick(stick, value),
            ControllerError::JoystickPush,
        )
    }

    /// Pushes the retained snapshot again and clears the unsynced mark.
    ///
    /// # Errors
    ///
    /// [`ControllerError::Resync`] if the push fails.
    pub fn resync(&self, handle: ControllerHandle) -> Result<(), ControllerError> {
        self.mutate_and_push(handle, |_| {}, ControllerError::Resync)
    }

    /// Returns `true` if the backend holds the retained snapshot.
    pub fn is_synced(&self, handle: ControllerHandle) -> Result<bool, ControllerError> {
        self.table()
            .get(handle)
            .map(|entry| entry.synced)
            .ok_or(ControllerError::InvalidHandle(handle))
    }

    /// Returns a copy of the retained snapshot.
    pub fn snapshot(&self, handle: ControllerHandle) -> Result<ControllerState, ControllerError> {
        self.table()
            .get(handle)
            .map(|entry| entry.state)
            .ok_or(ControllerError::InvalidHandle(handle))
    }

    pub fn identity(&self, handle: ControllerHandle) -> Result<ControllerIdentity, ControllerError> {
        self.table()
            .get(handle)
            .map(|entry| entry.identity)
            .ok_or(ControllerError::InvalidHandle(handle))
    }

    /// Handles of every tracked controller, in slot order.
    pub fn attached_handles(&self) -> Vec<ControllerHandle> {
        self.table().handles()
    }

    pub fn len(&self) -> usize {
        self.table().live
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Detaches every tracked controller, returning the ones that failed.
    pub fn detach_all(&self) -> Vec<(ControllerHandle, ControllerError)> {
        self.attached_handles()
            .into_iter()
            .filter_map(|handle| self.detach(handle).err().map(|err| (handle, err)))
            .collect()
    }

    fn mutate_and_push(
        &self,
        handle: ControllerHandle,
        mutate: impl FnOnce(&mut ControllerState),
        on_failure: fn(ResultCode) -> ControllerError,
    ) -> Result<(), ControllerError> {
        let mut table = self.table();
        let entry = table
            .get_mut(handle)
            .ok_or(ControllerError::InvalidHandle(handle))?;

        mutate(&mut entry.state);
        match self.backend.push_state(entry.device, &entry.state) {
            Ok(()) => {
                entry.synced = true;
                debug!(%handle, buttons = ?entry.state.buttons(), "state pushed");
                Ok(())
            }
            Err(code) => {
                entry.synced = false;
                warn!(%handle, %code, "state push failed; controller unsynced");
                Err(on_failure(code))
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
