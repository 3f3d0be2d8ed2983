//! Persistent storage for the host application.
//!
//! Only configuration is persisted; controller state never outlives the
//! process.

pub mod config;
