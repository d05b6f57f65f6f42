//! Domain models for the album catalog
//!
//! Albums and tracks are built once from the catalog manifest and treated as
//! read-only afterwards. The only mutation is attaching a locally cached cover
//! reference after cache resolution.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{LibraryError, Result};

/// Content type assumed when the manifest does not declare one.
pub const DEFAULT_CONTENT_TYPE: &str = "audio/mpeg";

// =============================================================================
// ID Types
// =============================================================================

/// Catalog identifier of a track
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Catalog identifier of an album
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlbumId(pub String);

impl AlbumId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AlbumId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AlbumId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

// =============================================================================
// Domain Models
// =============================================================================

/// Playable track as exposed by the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    /// Display name
    pub name: String,
    /// Position within its disk
    pub index: u32,
    /// Disk number, 1-based
    pub disk_index: u32,
    /// Duration in seconds
    pub duration: f64,
    pub artists: Vec<String>,
    /// Remote audio URL
    pub url: String,
    /// MIME type used when the bytes are served from the local cache
    pub content_type: String,
    pub year: Option<i32>,
}

impl Track {
    /// Artists joined for display.
    pub fn artist_line(&self) -> String {
        join_artists(&self.artists)
    }
}

/// One resolution of an album's cover art
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverArt {
    pub url: String,
    /// Pixel width when the catalog reports it
    #[serde(default)]
    pub width: Option<u32>,
}

/// Album with its ordered track list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Album {
    pub id: AlbumId,
    pub name: String,
    pub artists: Vec<String>,
    pub year: Option<i32>,
    /// Sorted by disk index, then track index
    pub tracks: Vec<Track>,
    pub covers: Vec<CoverArt>,
    /// Local reference for the cover once it has been resolved from the cache
    pub cached_cover: Option<String>,
}

/// Tracks of one disk, each paired with its position in the album playlist.
#[derive(Debug, Clone, PartialEq)]
pub struct Disk<'a> {
    pub index: u32,
    pub tracks: Vec<(usize, &'a Track)>,
}

impl Album {
    /// Playlist position of a track id.
    pub fn track_index(&self, id: &TrackId) -> Option<usize> {
        self.tracks.iter().position(|t| &t.id == id)
    }

    pub fn track(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Highest-resolution cover. Covers without a width rank lowest; among
    /// equals the first listed wins.
    pub fn largest_cover(&self) -> Option<&CoverArt> {
        self.covers.iter().fold(None, |best: Option<&CoverArt>, cover| match best {
            Some(b) if b.width.unwrap_or(0) >= cover.width.unwrap_or(0) => Some(b),
            _ => Some(cover),
        })
    }

    /// Cover to display: the cached copy if attached, otherwise the largest
    /// remote cover.
    pub fn display_cover(&self) -> Option<&str> {
        self.cached_cover
            .as_deref()
            .or_else(|| self.largest_cover().map(|c| c.url.as_str()))
    }

    pub fn attach_cached_cover(&mut self, url: impl Into<String>) {
        self.cached_cover = Some(url.into());
    }

    /// Groups the track list by disk, preserving playlist order.
    pub fn disks(&self) -> Vec<Disk<'_>> {
        let mut disks: Vec<Disk<'_>> = Vec::new();
        for (position, track) in self.tracks.iter().enumerate() {
            match disks.last_mut() {
                Some(disk) if disk.index == track.disk_index => disk.tracks.push((position, track)),
                _ => disks.push(Disk {
                    index: track.disk_index,
                    tracks: vec![(position, track)],
                }),
            }
        }
        disks
    }

    /// Artists joined for display.
    pub fn artist_line(&self) -> String {
        join_artists(&self.artists)
    }

    /// Total duration in seconds.
    pub fn total_duration(&self) -> f64 {
        self.tracks.iter().map(|t| t.duration).sum()
    }
}

/// Joins artist names the way the catalog displays them.
pub fn join_artists(artists: &[String]) -> String {
    artists.join(" & ")
}

/// Renders seconds as `m:ss`. Negative and non-finite values render as `0:00`.
pub fn format_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}

// =============================================================================
// Manifest
// =============================================================================

/// Album entry as served in `albums.json`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestAlbum {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub songs: Vec<ManifestSong>,
    /// Single cover URL (current server)
    #[serde(default)]
    pub cover: Option<String>,
    /// Multi-resolution covers, when the server provides them
    #[serde(default)]
    pub covers: Vec<CoverArt>,
}

/// Song entry as served in `albums.json`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestSong {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub index: Option<u32>,
    #[serde(default)]
    pub disk_index: Option<u32>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub artists: Vec<String>,
    pub file: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
}

impl TryFrom<ManifestSong> for Track {
    type Error = LibraryError;

    fn try_from(song: ManifestSong) -> Result<Self> {
        if song.id.trim().is_empty() {
            return Err(invalid("song.id", "track id cannot be empty"));
        }
        if song.file.trim().is_empty() {
            return Err(invalid(
                "song.file",
                format!("track {} has no audio URL", song.id),
            ));
        }

        Ok(Track {
            id: TrackId(song.id),
            name: song.name,
            index: song.index.unwrap_or(0),
            disk_index: song.disk_index.filter(|d| *d > 0).unwrap_or(1),
            duration: song.duration.filter(|d| d.is_finite()).unwrap_or(0.0).max(0.0),
            artists: song.artists,
            url: song.file,
            content_type: song
                .content_type
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            year: song.year,
        })
    }
}

impl TryFrom<ManifestAlbum> for Album {
    type Error = LibraryError;

    fn try_from(album: ManifestAlbum) -> Result<Self> {
        if album.id.trim().is_empty() {
            return Err(invalid("album.id", "album id cannot be empty"));
        }

        let mut tracks = album
            .songs
            .into_iter()
            .map(Track::try_from)
            .collect::<Result<Vec<_>>>()?;
        // Stable, so equal keys keep manifest order.
        tracks.sort_by_key(|t| (t.disk_index, t.index));

        let mut covers = album.covers;
        if let Some(url) = album.cover.filter(|u| !u.is_empty()) {
            if !covers.iter().any(|c| c.url == url) {
                covers.push(CoverArt { url, width: None });
            }
        }

        Ok(Album {
            id: AlbumId(album.id),
            name: album.name,
            artists: album.artists,
            year: album.year,
            tracks,
            covers,
            cached_cover: None,
        })
    }
}

/// Parses an `albums.json` payload, keeping the manifest's album order.
pub fn parse_manifest(bytes: &[u8]) -> Result<Vec<Album>> {
    let entries: Vec<ManifestAlbum> = serde_json::from_slice(bytes)?;
    entries.into_iter().map(Album::try_from).collect()
}

fn invalid(field: &str, message: impl Into<String>) -> LibraryError {
    LibraryError::InvalidInput {
        field: field.to_string(),
        message: message.into(),
    }
}
