//! Operating-system media session integration.
//!
//! Lock-screen metadata, hardware media keys and position reporting. Hosts
//! map these calls to `navigator.mediaSession`, MPRIS, SMTC or
//! `MPNowPlayingInfoCenter`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Actions the OS can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaAction {
    Play,
    Pause,
    Stop,
    SeekTo,
    PreviousTrack,
    NextTrack,
}

impl MediaAction {
    pub const ALL: [MediaAction; 6] = [
        MediaAction::Play,
        MediaAction::Pause,
        MediaAction::Stop,
        MediaAction::SeekTo,
        MediaAction::PreviousTrack,
        MediaAction::NextTrack,
    ];
}

impl fmt::Display for MediaAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MediaAction::Play => "play",
            MediaAction::Pause => "pause",
            MediaAction::Stop => "stop",
            MediaAction::SeekTo => "seekto",
            MediaAction::PreviousTrack => "previoustrack",
            MediaAction::NextTrack => "nexttrack",
        };
        f.write_str(name)
    }
}

/// Details passed to an action handler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActionDetails {
    pub action: MediaAction,
    /// Target position for [`MediaAction::SeekTo`], in seconds.
    pub seek_time: Option<f64>,
    /// Host hint that the seek is part of a scrub gesture.
    pub fast_seek: bool,
}

impl ActionDetails {
    pub fn new(action: MediaAction) -> Self {
        Self {
            action,
            seek_time: None,
            fast_seek: false,
        }
    }

    pub fn seek_to(seconds: f64) -> Self {
        Self {
            action: MediaAction::SeekTo,
            seek_time: Some(seconds),
            fast_seek: true,
        }
    }
}

/// Callback invoked by the host when the user triggers an action.
pub type ActionHandler = Arc<dyn Fn(ActionDetails) + Send + Sync>;

/// Artwork image for the now-playing surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artwork {
    pub src: String,
    pub sizes: Option<String>,
    pub mime_type: Option<String>,
}

/// Album-level metadata; assigned once per album.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumMetadata {
    pub album: String,
    pub artwork: Vec<Artwork>,
}

/// Metadata update. `album: None` keeps whatever album/artwork is showing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataUpdate {
    pub title: String,
    pub artist: String,
    pub album: Option<AlbumMetadata>,
}

/// Position report for scrubbers on the now-playing surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionState {
    pub duration: f64,
    pub playback_rate: f64,
    pub position: f64,
}

/// Host media session.
pub trait MediaSession: Send + Sync {
    fn set_metadata(&self, update: MetadataUpdate);

    fn clear_metadata(&self);

    /// Install (`Some`) or remove (`None`) the handler for `action`.
    fn set_action_handler(&self, action: MediaAction, handler: Option<ActionHandler>);

    fn set_position_state(&self, state: PositionState);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_names_follow_web_media_session() {
        let names: Vec<String> = MediaAction::ALL.iter().map(|a| a.to_string()).collect();
        assert_eq!(
            names,
            vec!["play", "pause", "stop", "seekto", "previoustrack", "nexttrack"]
        );
    }

    #[test]
    fn seek_details_carry_position() {
        let details = ActionDetails::seek_to(42.0);
        assert_eq!(details.action, MediaAction::SeekTo);
        assert_eq!(details.seek_time, Some(42.0));
        assert!(details.fast_seek);
        assert_eq!(ActionDetails::new(MediaAction::Play).seek_time, None);
    }
}
