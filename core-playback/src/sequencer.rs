//! # Playlist Sequencer
//!
//! Owns the playback session: the current album and the single active
//! [`MediaController`]. It turns "play track N" into a resolved, loaded and
//! announced playback state and advances on natural track end.
//!
//! ## Notifications
//!
//! Three [`ListenerSet`]s (time, song, album) carry zero-argument callbacks.
//! Time updates are dispatched synchronously from the element. Track-ended
//! notifications and OS media-session actions are queued and executed by
//! [`PlaylistSequencer::run`] or [`PlaylistSequencer::process_pending`], so
//! they are serialised with the caller's own calls.

use bridge_traits::media::{AudioOutput, MediaEvent, MediaListener};
use bridge_traits::media_session::{
    ActionDetails, ActionHandler, AlbumMetadata, Artwork, MediaAction, MediaSession,
    MetadataUpdate, PositionState,
};
use bridge_traits::object_url::ObjectUrlStore;
use core_library::models::{Album, AlbumId, Track, TrackId};
use core_runtime::events::{CoreEvent, EventBus, ListenerId, ListenerSet, PlaybackEvent};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tracing::{debug, info, instrument, warn};

use crate::cache::OfflineCacheResolver;
use crate::controller::{ControllerCallbacks, MediaController, MediaSource};
use crate::error::{PlaybackError, Result};
use crate::status::PlayerStatus;

const ARTWORK_MIME: &str = "image/jpeg";

enum Command {
    Action(ActionDetails),
    TrackEnded(TrackId),
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Edges {
    previous: bool,
    next: bool,
}

#[derive(Default)]
struct Session {
    album: Option<Arc<Album>>,
    controller: Option<MediaController>,
    /// Object URL backing the current track, revoked when it is replaced
    local_url: Option<String>,
    /// Album whose name and artwork are on the media session
    published_album: Option<AlbumId>,
    transport_handlers: bool,
    edges: Option<Edges>,
}

/// Playlist controller for one album at a time.
pub struct PlaylistSequencer {
    session: Mutex<Session>,
    output: Arc<dyn AudioOutput>,
    resolver: Arc<OfflineCacheResolver>,
    object_urls: Arc<dyn ObjectUrlStore>,
    media_session: Option<Arc<dyn MediaSession>>,
    event_bus: Option<EventBus>,

    time_listeners: Arc<ListenerSet>,
    song_listeners: ListenerSet,
    album_listeners: ListenerSet,

    callbacks: ControllerCallbacks,
    action_handler: ActionHandler,
    /// Track the element's ended notification refers to
    now_playing: Arc<Mutex<Option<TrackId>>>,
    commands: mpsc::UnboundedSender<Command>,
    inbox: AsyncMutex<mpsc::UnboundedReceiver<Command>>,
}

impl PlaylistSequencer {
    /// Create a sequencer. Pass `None` for `media_session` to run without OS
    /// integration.
    pub fn new(
        output: Arc<dyn AudioOutput>,
        resolver: Arc<OfflineCacheResolver>,
        object_urls: Arc<dyn ObjectUrlStore>,
        media_session: Option<Arc<dyn MediaSession>>,
    ) -> Self {
        let (commands, inbox) = mpsc::unbounded_channel();
        let time_listeners = Arc::new(ListenerSet::new());
        let now_playing = Arc::new(Mutex::new(None));

        let callbacks = ControllerCallbacks::new()
            .on_time_update(time_update_listener(
                media_session.clone(),
                time_listeners.clone(),
            ))
            .on_ended(ended_listener(commands.clone(), now_playing.clone()));

        let action_tx = commands.clone();
        let action_handler: ActionHandler = Arc::new(move |details: ActionDetails| {
            let _ = action_tx.send(Command::Action(details));
        });

        Self {
            session: Mutex::new(Session::default()),
            output,
            resolver,
            object_urls,
            media_session,
            event_bus: None,
            time_listeners,
            song_listeners: ListenerSet::new(),
            album_listeners: ListenerSet::new(),
            callbacks,
            action_handler,
            now_playing,
            commands,
            inbox: AsyncMutex::new(inbox),
        }
    }

    /// Set event bus for playback events.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    // ------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------

    pub fn add_time_update_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.time_listeners.add(listener)
    }

    pub fn remove_time_update_listener(&self, id: ListenerId) -> bool {
        self.time_listeners.remove(id)
    }

    pub fn add_song_update_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.song_listeners.add(listener)
    }

    pub fn remove_song_update_listener(&self, id: ListenerId) -> bool {
        self.song_listeners.remove(id)
    }

    pub fn add_album_update_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.album_listeners.add(listener)
    }

    pub fn remove_album_update_listener(&self, id: ListenerId) -> bool {
        self.album_listeners.remove(id)
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn album(&self) -> Option<Arc<Album>> {
        self.session.lock().album.clone()
    }

    fn controller(&self) -> Option<MediaController> {
        self.session.lock().controller.clone()
    }

    /// Playlist index of the playing track, looked up by the controller's
    /// track id in the current album.
    pub fn current_index(&self) -> Option<usize> {
        let (album, controller) = {
            let session = self.session.lock();
            (session.album.clone()?, session.controller.clone()?)
        };
        album.track_index(&controller.track_id()?)
    }

    pub fn current_track(&self) -> Option<Track> {
        let album = self.album()?;
        let index = self.current_index()?;
        album.track(index).cloned()
    }

    pub fn current_status(&self) -> Option<PlayerStatus> {
        self.controller().map(|c| c.status())
    }

    /// Whether the current track plays from the offline cache.
    pub fn is_offline(&self) -> bool {
        let session = self.session.lock();
        session.controller.is_some() && session.local_url.is_some()
    }

    pub fn current_time(&self) -> f64 {
        self.controller().map(|c| c.current_time()).unwrap_or(0.0)
    }

    pub fn duration(&self) -> f64 {
        self.controller().map(|c| c.duration()).unwrap_or(0.0)
    }

    pub fn set_current_time(&self, seconds: f64) {
        if let Some(controller) = self.controller() {
            controller.set_current_time(seconds);
        }
    }

    // ------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------

    /// Stop playback and adopt `album`. Does not start playing.
    pub fn set_album(&self, album: impl Into<Arc<Album>>) {
        self.stop();
        let album = album.into();
        info!(album = %album.id, tracks = album.len(), "Album selected");
        let album_id = album.id.to_string();
        self.session.lock().album = Some(album);
        self.emit(PlaybackEvent::AlbumChanged {
            album_id: Some(album_id),
        });
        self.album_listeners.notify();
    }

    /// Play the track at `index` of the current album.
    ///
    /// Song listeners fire as soon as the track is swapped in, before the
    /// element has loaded. Media-session handlers and metadata are published
    /// once playback has started.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::TrackNotFound`] when no album is set or `index` is out
    /// of range. Load and start failures surface as
    /// [`PlayerStatus::Error`], not as `Err`.
    #[instrument(skip(self))]
    pub async fn play_song(&self, index: usize) -> Result<()> {
        let album = self
            .album()
            .ok_or_else(|| PlaybackError::TrackNotFound("no album selected".to_string()))?;
        let track = album.track(index).cloned().ok_or_else(|| {
            PlaybackError::TrackNotFound(format!(
                "index {} of album {} ({} tracks)",
                index,
                album.id,
                album.len()
            ))
        })?;

        let resolved = self.resolver.resolve_track_url(&album, &track).await;
        let source = MediaSource::track(track.id.clone(), resolved.url.clone())
            .with_expected_duration(track.duration);

        let swapped = {
            let mut session = self.session.lock();
            if session.album.as_ref().is_some_and(|a| Arc::ptr_eq(a, &album)) {
                let previous_local = std::mem::replace(
                    &mut session.local_url,
                    resolved.is_local.then(|| resolved.url.clone()),
                );
                let reusable = session
                    .controller
                    .clone()
                    .filter(|c| !c.status().is_terminal());
                let (controller, reuse) = match reusable {
                    Some(controller) => (controller, true),
                    None => {
                        let controller = self.new_controller(source.clone());
                        session.controller = Some(controller.clone());
                        (controller, false)
                    }
                };
                Some((controller, reuse, previous_local))
            } else {
                None
            }
        };

        let Some((controller, reuse, previous_local)) = swapped else {
            debug!("Album changed while resolving; dropping request");
            if resolved.is_local {
                self.object_urls.revoke(&resolved.url);
            }
            return Ok(());
        };

        if let Some(url) = previous_local {
            self.object_urls.revoke(&url);
        }

        let controller = if reuse && controller.replace(source.clone()).is_err() {
            // Failed between the status check and the swap; start over.
            let fresh = self.new_controller(source);
            self.session.lock().controller = Some(fresh.clone());
            fresh
        } else {
            controller
        };
        // Only now does the element carry the new source; an end reported
        // before this point still names the previous track.
        *self.now_playing.lock() = Some(track.id.clone());

        info!(
            album = %album.id,
            track = %track.id,
            index,
            offline = resolved.is_local,
            "Playing track"
        );
        self.emit(PlaybackEvent::TrackChanged {
            album_id: album.id.to_string(),
            track_id: track.id.to_string(),
            index,
            offline: resolved.is_local,
        });
        self.song_listeners.notify();

        controller.play().await?;

        let still_current = self
            .controller()
            .is_some_and(|c| c.ptr_eq(&controller))
            && controller.track_id().as_ref() == Some(&track.id);
        if still_current && controller.status() == PlayerStatus::Playing {
            self.publish_now_playing(&album, &track, index);
        }
        Ok(())
    }

    /// Advance to the next track. No-op on the last track or when nothing
    /// is loaded.
    pub async fn next(&self) -> Result<()> {
        let Some((index, len)) = self.position() else {
            return Ok(());
        };
        if index + 1 >= len {
            debug!(index, "Already at the last track");
            return Ok(());
        }
        self.play_song(index + 1).await
    }

    /// Go back one track. No-op on the first track or when nothing is
    /// loaded.
    pub async fn prev(&self) -> Result<()> {
        let Some((index, _)) = self.position() else {
            return Ok(());
        };
        if index == 0 {
            debug!("Already at the first track");
            return Ok(());
        }
        self.play_song(index - 1).await
    }

    fn position(&self) -> Option<(usize, usize)> {
        let len = self.album()?.len();
        Some((self.current_index()?, len))
    }

    /// Pause, and push a time update so the paused position shows at once.
    pub fn pause(&self) {
        if let Some(controller) = self.controller() {
            controller.pause();
            self.publish_time_update(&controller);
        }
    }

    /// Resume the paused track.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::InvalidTransition`] unless the track is paused or
    /// starting.
    pub async fn resume(&self) -> Result<()> {
        match self.controller() {
            Some(controller) => controller.resume().await,
            None => Ok(()),
        }
    }

    /// Tear down playback and clear the album.
    pub fn stop(&self) {
        let (controller, local_url, had_album, published) = {
            let mut session = self.session.lock();
            let published = session.transport_handlers || session.published_album.is_some();
            session.transport_handlers = false;
            session.edges = None;
            session.published_album = None;
            (
                session.controller.take(),
                session.local_url.take(),
                session.album.take().is_some(),
                published,
            )
        };
        *self.now_playing.lock() = None;

        if let Some(controller) = &controller {
            controller.stop();
        }
        if let Some(url) = local_url {
            self.object_urls.revoke(&url);
        }
        if controller.is_some() || published {
            self.clear_media_session();
        }

        if let Some(controller) = controller {
            info!("Playback stopped");
            self.emit(PlaybackEvent::Stopped {
                track_id: controller.track_id().map(|id| id.to_string()),
            });
            self.song_listeners.notify();
        }
        if had_album {
            self.emit(PlaybackEvent::AlbumChanged { album_id: None });
            self.album_listeners.notify();
        }
    }

    async fn track_ended(&self, track_id: TrackId) -> Result<()> {
        let current = self.controller().and_then(|c| c.track_id());
        if current.as_ref() != Some(&track_id) {
            debug!(track = %track_id, "Ignoring end of a track no longer playing");
            return Ok(());
        }

        let Some((index, len)) = self.position() else {
            return Ok(());
        };
        if index + 1 < len {
            return self.play_song(index + 1).await;
        }

        let (controller, local_url) = {
            let mut session = self.session.lock();
            (session.controller.take(), session.local_url.take())
        };
        *self.now_playing.lock() = None;
        if let Some(controller) = &controller {
            controller.stop();
        }
        if let Some(url) = local_url {
            self.object_urls.revoke(&url);
        }
        info!(track = %track_id, "Reached the end of the album");
        self.emit(PlaybackEvent::Stopped {
            track_id: Some(track_id.to_string()),
        });
        self.song_listeners.notify();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Command queue
    // ------------------------------------------------------------------

    /// Execute queued media-session actions and track-ended notifications
    /// until the queue is empty. Returns how many ran.
    ///
    /// Returns `0` without waiting while [`run`](Self::run) owns the queue.
    pub async fn process_pending(&self) -> usize {
        let Ok(mut inbox) = self.inbox.try_lock() else {
            return 0;
        };
        let mut handled = 0;
        while let Ok(command) = inbox.try_recv() {
            if matches!(command, Command::Shutdown) {
                continue;
            }
            self.handle(command).await;
            handled += 1;
        }
        handled
    }

    /// Execute queued commands until [`shutdown`](Self::shutdown).
    pub async fn run(self: Arc<Self>) {
        let mut inbox = self.inbox.lock().await;
        debug!("Sequencer command loop started");
        while let Some(command) = inbox.recv().await {
            if matches!(command, Command::Shutdown) {
                break;
            }
            self.handle(command).await;
        }
        debug!("Sequencer command loop finished");
    }

    /// Ask [`run`](Self::run) to return.
    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }

    async fn handle(&self, command: Command) {
        let result = match command {
            Command::Action(details) => self.handle_action(details).await,
            Command::TrackEnded(track_id) => self.track_ended(track_id).await,
            Command::Shutdown => Ok(()),
        };
        if let Err(e) = result {
            warn!(error = %e, "Sequencer command failed");
        }
    }

    async fn handle_action(&self, details: ActionDetails) -> Result<()> {
        debug!(action = %details.action, "Media session action");
        match details.action {
            MediaAction::Play => match self.controller() {
                Some(controller) => controller.play().await,
                None => Ok(()),
            },
            MediaAction::Pause => {
                self.pause();
                Ok(())
            }
            MediaAction::Stop => {
                self.stop();
                Ok(())
            }
            MediaAction::SeekTo => {
                if let Some(seconds) = details.seek_time {
                    self.set_current_time(seconds);
                }
                Ok(())
            }
            MediaAction::PreviousTrack => self.prev().await,
            MediaAction::NextTrack => self.next().await,
        }
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn new_controller(&self, source: MediaSource) -> MediaController {
        MediaController::new(
            self.output.clone(),
            source,
            self.callbacks.clone(),
            self.event_bus.clone(),
        )
    }

    fn publish_time_update(&self, controller: &MediaController) {
        if let Some(session) = &self.media_session {
            session.set_position_state(PositionState {
                duration: controller.duration(),
                playback_rate: 1.0,
                position: controller.current_time(),
            });
        }
        self.time_listeners.notify();
    }

    fn publish_now_playing(&self, album: &Album, track: &Track, index: usize) {
        let Some(media_session) = &self.media_session else {
            return;
        };
        let edges = Edges {
            previous: index > 0,
            next: index + 1 < album.len(),
        };

        let (install_transport, previous_changed, next_changed, publish_album) = {
            let mut session = self.session.lock();
            let install_transport = !session.transport_handlers;
            session.transport_handlers = true;
            let old = session.edges.replace(edges);
            let publish_album = session.published_album.as_ref() != Some(&album.id);
            session.published_album = Some(album.id.clone());
            (
                install_transport,
                old.map_or(true, |o| o.previous != edges.previous),
                old.map_or(true, |o| o.next != edges.next),
                publish_album,
            )
        };

        if install_transport {
            for action in [
                MediaAction::Play,
                MediaAction::Pause,
                MediaAction::Stop,
                MediaAction::SeekTo,
            ] {
                media_session.set_action_handler(action, Some(self.action_handler.clone()));
            }
        }
        if previous_changed {
            media_session.set_action_handler(
                MediaAction::PreviousTrack,
                edges.previous.then(|| self.action_handler.clone()),
            );
        }
        if next_changed {
            media_session.set_action_handler(
                MediaAction::NextTrack,
                edges.next.then(|| self.action_handler.clone()),
            );
        }

        media_session.set_metadata(MetadataUpdate {
            title: track.name.clone(),
            artist: track.artist_line(),
            album: publish_album.then(|| AlbumMetadata {
                album: album.name.clone(),
                artwork: artwork_for(album),
            }),
        });
    }

    fn clear_media_session(&self) {
        if let Some(media_session) = &self.media_session {
            media_session.clear_metadata();
            for action in MediaAction::ALL {
                media_session.set_action_handler(action, None);
            }
        }
    }

    fn emit(&self, event: PlaybackEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Playback(event));
        }
    }
}

impl Drop for PlaylistSequencer {
    fn drop(&mut self) {
        let session = self.session.get_mut();
        if let Some(controller) = session.controller.take() {
            controller.stop();
        }
        if let Some(url) = session.local_url.take() {
            self.object_urls.revoke(&url);
        }
    }
}

fn time_update_listener(
    media_session: Option<Arc<dyn MediaSession>>,
    listeners: Arc<ListenerSet>,
) -> MediaListener {
    Arc::new(move |event: &MediaEvent| {
        if let MediaEvent::TimeUpdate { position, duration } = *event {
            if let Some(session) = &media_session {
                session.set_position_state(PositionState {
                    duration,
                    playback_rate: 1.0,
                    position,
                });
            }
            listeners.notify();
        }
    })
}

fn ended_listener(
    commands: mpsc::UnboundedSender<Command>,
    now_playing: Arc<Mutex<Option<TrackId>>>,
) -> MediaListener {
    Arc::new(move |event: &MediaEvent| {
        if matches!(event, MediaEvent::Ended) {
            if let Some(track_id) = now_playing.lock().clone() {
                let _ = commands.send(Command::TrackEnded(track_id));
            }
        }
    })
}

fn artwork_for(album: &Album) -> Vec<Artwork> {
    if let Some(cached) = &album.cached_cover {
        return vec![Artwork {
            src: cached.clone(),
            sizes: None,
            mime_type: Some(ARTWORK_MIME.to_string()),
        }];
    }
    album
        .covers
        .iter()
        .map(|cover| Artwork {
            src: cover.url.clone(),
            sizes: cover.width.map(|w| format!("{w}x{w}")),
            mime_type: Some(ARTWORK_MIME.to_string()),
        })
        .collect()
}
