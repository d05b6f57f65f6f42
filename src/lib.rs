//! Workspace entry crate.
//!
//! Re-exports the service façade so host applications can depend on
//! `albumcast-workspace` and pick features here instead of wiring each crate
//! individually.

#[cfg(feature = "desktop-shims")]
pub use core_service::*;
