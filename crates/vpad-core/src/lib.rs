//! # vpad-core
//!
//! Shared domain types for vpad: a host that lets scripts drive *virtual game
//! controllers* registered with the platform's input subsystem.
//!
//! This crate has zero dependencies on OS APIs, platform services, or async
//! runtimes.  Everything in here can be built and unit-tested anywhere.
//!
//! # Architecture overview (for beginners)
//!
//! A virtual controller is a software-emulated gamepad.  To the games and
//! menus reading input it is indistinguishable from a physical pad.  The host
//! application (`vpad-host`) owns the lifecycle of each virtual controller and
//! pushes its full input state to the platform every time a script changes it.
//!
//! This crate (`vpad-core`) is the shared vocabulary both sides agree on:
//!
//! - **`domain::controller`** – The cosmetic identity of a controller (its
//!   four colors), the representative device profile, and the live input
//!   snapshot (`ControllerState`: buttons, two sticks, battery).
//!
//! - **`domain::buttons`** – `ButtonMask`, a 64-bit bitmask where each bit is
//!   one logical button, with named constants for the standard layout.
//!
//! - **`domain::handle`** – `ControllerHandle`, the opaque value callers hold
//!   for an attached controller.
//!
//! - **`domain::result_code`** – `ResultCode`, the raw 32-bit status value the
//!   platform backend reports when a call fails.

pub mod domain;

// Re-export the most-used types at the crate root so callers can write
// `vpad_core::ControllerState` instead of `vpad_core::domain::controller::ControllerState`.
pub use domain::buttons::{ButtonMask, UnknownButton};
pub use domain::controller::{
    BatteryLevel, ControllerIdentity, ControllerProfile, ControllerState, DeviceType,
    InterfaceType, InvalidStickIndex, Stick, StickState,
};
pub use domain::handle::ControllerHandle;
pub use domain::result_code::ResultCode;
