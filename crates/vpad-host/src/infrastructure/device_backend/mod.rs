//! Device backend implementations.
//!
//! A production build binds [`DeviceBackend`](crate::application::manage_controllers::DeviceBackend)
//! to the platform's virtual HID service.  The in-memory backend is used by
//! the tests and by the headless host binary.

pub mod in_memory;
