//! # Core Runtime Module
//!
//! Foundational runtime infrastructure shared by the playback core:
//! - Logging and tracing setup ([`logging`])
//! - Configuration and bridge wiring ([`config`])
//! - Listener sets and the event bus ([`events`])

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
