//! Media element bridge traits.
//!
//! A [`MediaElement`] is the host's single-track audio resource (an
//! `HTMLAudioElement` on the web, a decoder plus output stream on desktop).
//! The core drives it through a small async surface and receives progress
//! and end-of-track notifications through registered listeners.

use crate::error::Result;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Kinds of notifications a media element emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaEventKind {
    /// Playback position advanced.
    TimeUpdate,
    /// Playback reached the natural end of the source.
    Ended,
}

/// Notification payload delivered to listeners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MediaEvent {
    TimeUpdate {
        /// Current position in seconds.
        position: f64,
        /// Source duration in seconds, `0.0` when unknown.
        duration: f64,
    },
    Ended,
}

impl MediaEvent {
    pub fn kind(&self) -> MediaEventKind {
        match self {
            MediaEvent::TimeUpdate { .. } => MediaEventKind::TimeUpdate,
            MediaEvent::Ended => MediaEventKind::Ended,
        }
    }
}

/// Listener callback registered on a media element.
pub type MediaListener = Arc<dyn Fn(&MediaEvent) + Send + Sync>;

/// Opaque handle returned by [`MediaElement::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(pub u64);

impl fmt::Display for ListenerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

/// Host audio resource playing exactly one source at a time.
///
/// Implementations must tolerate `pause`, `set_current_time` and `release`
/// being called in any order; the core guarantees it never calls `play`
/// before a `load` of the current source has completed.
#[async_trait]
pub trait MediaElement: Send + Sync {
    /// URL of the current source.
    fn source(&self) -> String;

    /// Point the element at a new source without reallocating it.
    fn set_source(&self, url: &str);

    /// Fetch enough of the current source to start playback.
    ///
    /// Resolves once the first frame is decodable.
    async fn load(&self) -> Result<()>;

    /// Start or resume playback.
    async fn play(&self) -> Result<()>;

    /// Pause playback, keeping the position.
    fn pause(&self);

    /// Current position in seconds.
    fn current_time(&self) -> f64;

    /// Duration in seconds, `0.0` when unknown.
    fn duration(&self) -> f64;

    /// Seek to an absolute position in seconds.
    fn set_current_time(&self, seconds: f64);

    /// Register a listener for one kind of notification.
    fn add_listener(&self, kind: MediaEventKind, listener: MediaListener) -> ListenerHandle;

    /// Remove a previously registered listener. Returns `false` if unknown.
    fn remove_listener(&self, handle: ListenerHandle) -> bool;

    /// Drop decoding resources held by the element.
    fn release(&self);

    /// Duration the catalog lists for the current source. Elements that
    /// cannot read a duration from the media fall back to it. Cleared by
    /// [`set_source`](Self::set_source).
    fn set_expected_duration(&self, _seconds: f64) {}
}

/// Factory for media elements, provided by the host.
pub trait AudioOutput: Send + Sync {
    /// Allocate a new element pointed at `url`. No I/O happens until `load`.
    fn create_element(&self, url: &str) -> Result<Arc<dyn MediaElement>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_event_kind_matches_variant() {
        let update = MediaEvent::TimeUpdate {
            position: 1.5,
            duration: 200.0,
        };
        assert_eq!(update.kind(), MediaEventKind::TimeUpdate);
        assert_eq!(MediaEvent::Ended.kind(), MediaEventKind::Ended);
    }

    #[test]
    fn listener_handle_display() {
        assert_eq!(ListenerHandle(7).to_string(), "listener#7");
    }
}
