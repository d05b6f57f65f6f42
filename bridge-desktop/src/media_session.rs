//! Media session for hosts without an OS now-playing surface.

use bridge_traits::media_session::{
    ActionDetails, ActionHandler, AlbumMetadata, MediaAction, MediaSession, MetadataUpdate,
    PositionState,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::{debug, info};

#[derive(Default)]
struct SessionState {
    title: Option<String>,
    artist: Option<String>,
    album: Option<AlbumMetadata>,
    position: Option<PositionState>,
    handlers: HashMap<MediaAction, ActionHandler>,
}

/// Logs session updates through `tracing` and keeps the latest state so a
/// terminal front-end can render it and forward key presses via [`trigger`].
///
/// [`trigger`]: TracingMediaSession::trigger
#[derive(Default)]
pub struct TracingMediaSession {
    state: Mutex<SessionState>,
}

impl TracingMediaSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invoke the installed handler for `details.action`.
    ///
    /// Returns `false` when no handler is installed.
    pub fn trigger(&self, details: ActionDetails) -> bool {
        let handler = self.state.lock().handlers.get(&details.action).cloned();
        match handler {
            Some(handler) => {
                handler(details);
                true
            }
            None => false,
        }
    }

    pub fn has_handler(&self, action: MediaAction) -> bool {
        self.state.lock().handlers.contains_key(&action)
    }

    /// `(title, artist, album)` currently shown.
    pub fn now_playing(&self) -> Option<(String, String, Option<String>)> {
        let state = self.state.lock();
        let title = state.title.clone()?;
        Some((
            title,
            state.artist.clone().unwrap_or_default(),
            state.album.as_ref().map(|a| a.album.clone()),
        ))
    }

    pub fn position(&self) -> Option<PositionState> {
        self.state.lock().position
    }
}

impl MediaSession for TracingMediaSession {
    fn set_metadata(&self, update: MetadataUpdate) {
        info!(title = %update.title, artist = %update.artist, "Now playing");
        let mut state = self.state.lock();
        state.title = Some(update.title);
        state.artist = Some(update.artist);
        if let Some(album) = update.album {
            debug!(album = %album.album, artwork = album.artwork.len(), "Album metadata");
            state.album = Some(album);
        }
    }

    fn clear_metadata(&self) {
        debug!("Cleared now playing");
        let mut state = self.state.lock();
        state.title = None;
        state.artist = None;
        state.album = None;
        state.position = None;
    }

    fn set_action_handler(&self, action: MediaAction, handler: Option<ActionHandler>) {
        let mut state = self.state.lock();
        match handler {
            Some(handler) => {
                debug!(%action, "Installed action handler");
                state.handlers.insert(action, handler);
            }
            None => {
                debug!(%action, "Removed action handler");
                state.handlers.remove(&action);
            }
        }
    }

    fn set_position_state(&self, position: PositionState) {
        self.state.lock().position = Some(position);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_metadata_keeps_album_when_omitted() {
        let session = TracingMediaSession::new();
        session.set_metadata(MetadataUpdate {
            title: "One".into(),
            artist: "A".into(),
            album: Some(AlbumMetadata {
                album: "Record".into(),
                artwork: Vec::new(),
            }),
        });
        session.set_metadata(MetadataUpdate {
            title: "Two".into(),
            artist: "A & B".into(),
            album: None,
        });

        assert_eq!(
            session.now_playing(),
            Some(("Two".into(), "A & B".into(), Some("Record".into())))
        );

        session.clear_metadata();
        assert_eq!(session.now_playing(), None);
    }

    #[test]
    fn test_trigger_runs_installed_handler() {
        let session = TracingMediaSession::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        session.set_action_handler(
            MediaAction::NextTrack,
            Some(Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
        );

        assert!(session.trigger(ActionDetails::new(MediaAction::NextTrack)));
        assert!(!session.trigger(ActionDetails::new(MediaAction::PreviousTrack)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        session.set_action_handler(MediaAction::NextTrack, None);
        assert!(!session.has_handler(MediaAction::NextTrack));
    }
}
