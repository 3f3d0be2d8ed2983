//! Domain entities for vpad.
//!
//! This module contains pure data types with no infrastructure dependencies.
//!
//! # What is "domain" in Clean Architecture? (for beginners)
//!
//! Clean Architecture organises code into concentric layers.  The innermost
//! layer is called the **domain**.  Domain code has **no** imports from OS
//! APIs, platform services, or runtimes, so it can be compiled and tested on
//! any machine.  The host's application layer (the controller manager) and
//! infrastructure layer (device backends, config storage) depend on these
//! types, never the other way round.

/// Named bits of the 64-bit button mask.
pub mod buttons;

/// Controller identity, device profile, and the live input snapshot.
pub mod controller;

/// Generation-checked handles for attached controllers.
pub mod handle;

/// Raw status codes reported by the platform backend.
pub mod result_code;
