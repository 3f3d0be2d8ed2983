//! Application layer use cases for the host.
//!
//! # What use cases does the host have?
//!
//! - **`manage_controllers`** – The `VirtualControllerManager`: attaches and
//!   detaches virtual controllers, keeps their input snapshots, and pushes the
//!   full snapshot to a `DeviceBackend` after every change.  The backend is
//!   injected at construction time.
//!
//! - **`script_api`** – The caller-facing surface a script host binds to.
//!   Converts raw script integers and forwards to the manager.
//!
//! - **`play_sequence`** – Replays a declarative TOML input sequence through
//!   the script surface, once or in a loop.

pub mod manage_controllers;
pub mod play_sequence;
pub mod script_api;
