//! vpad-host library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does vpad-host do? (for beginners)
//!
//! The host lets a script drive *virtual game controllers*: gamepads that
//! exist only in software but look like real devices to everything reading
//! input on the machine.
//!
//! 1. A script asks for a controller with a given set of colors.  The host
//!    registers a wireless gamepad with the platform and returns a handle.
//! 2. The script presses buttons and moves sticks through the handle.  After
//!    each change the host pushes the controller's complete input snapshot to
//!    the platform.
//! 3. The script detaches the controller and the device disappears.
//!
//! Every platform failure is reported to the script with the raw status code
//! in hexadecimal; nothing is retried or silently swallowed.

/// Application layer: use cases for the host.
pub mod application;

/// Infrastructure layer: device backends and configuration storage.
pub mod infrastructure;
