//! # Catalog Module
//!
//! Album and track models plus the read-only catalog source.
//!
//! ## Overview
//!
//! This module manages:
//! - Deserialising the server's `albums.json` manifest into [`Album`]s with
//!   tracks ordered by disk and index
//! - Fetching the manifest through the host [`HttpClient`](bridge_traits::http::HttpClient)
//! - Display helpers (artist lines, durations, disk grouping, search, share links)

pub mod browse;
pub mod catalog;
pub mod error;
pub mod models;

pub use browse::{share_link, share_title, AlbumFilter};
pub use catalog::{CatalogSource, HttpCatalogSource};
pub use error::{LibraryError, Result};
pub use models::{
    format_duration, join_artists, parse_manifest, Album, AlbumId, CoverArt, Disk, Track, TrackId,
};
