//! # Playback Module
//!
//! Client-side playback engine for album streaming.
//!
//! ## Overview
//!
//! This module handles:
//! - [`MediaController`]: one host media element behind an explicit
//!   [`PlayerStatus`] state machine with de-duplicated load/start
//! - [`PlaylistSequencer`]: album/track sequencing, listener sets,
//!   auto-advance and OS media-session integration
//! - [`OfflineCacheResolver`](cache::OfflineCacheResolver): album downloads
//!   and transparent local-over-remote resolution

pub mod cache;
pub mod controller;
pub mod error;
pub mod sequencer;
pub mod status;

pub use cache::{DownloadProgress, OfflineCacheResolver, ResolvedSource};
pub use controller::{ControllerCallbacks, InFlight, MediaController, MediaSource};
pub use error::{PlaybackError, Result};
pub use sequencer::PlaylistSequencer;
pub use status::{Operation, PlayerStatus, Transition};
