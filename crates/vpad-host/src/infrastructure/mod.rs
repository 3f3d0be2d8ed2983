//! Infrastructure layer for the host application.
//!
//! Contains the adapters that touch the outside world: device backends and
//! configuration storage.
//!
//! **Dependency rule**: this layer may depend on `application` and `vpad_core`,
//! but MUST NOT be imported by the `application` or domain layers.
//!
//! # Sub-modules
//!
//! - **`device_backend`** – implementations of `DeviceBackend`.  The
//!   `InMemoryDeviceBackend` records registrations and pushes for tests and
//!   headless runs.
//!
//! - **`storage`** – TOML configuration loaded from the platform config
//!   directory.

pub mod device_backend;
pub mod storage;
