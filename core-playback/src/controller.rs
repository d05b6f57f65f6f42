//! # Media Element Controller
//!
//! Wraps one host [`MediaElement`] behind the [`PlayerStatus`] state machine so
//! callers never have to guard against an element that is not ready yet.
//!
//! ## Concurrency
//!
//! - Overlapping `load`/`play` calls share one in-flight future per phase, so
//!   the element sees a single `load()` and a single `play()` per source.
//! - Every pending load or start captures the generation it was issued for.
//!   `replace` and `stop` bump the generation, which turns late completions
//!   into no-ops.
//! - The state lock is never held while calling into the element: elements
//!   may dispatch listeners synchronously and those listeners read back
//!   through this controller.

use bridge_traits::media::{
    AudioOutput, ListenerHandle, MediaElement, MediaEventKind, MediaListener,
};
use core_library::models::TrackId;
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

use crate::error::Result;
use crate::status::{Operation, PlayerStatus, Transition};

/// Shared handle to an in-flight load or start.
pub type InFlight = Shared<BoxFuture<'static, ()>>;

/// Source played by a controller.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaSource {
    pub url: String,
    /// Catalog track behind `url`, when there is one
    pub track_id: Option<TrackId>,
    /// Duration listed by the catalog, in seconds
    pub expected_duration: Option<f64>,
}

impl MediaSource {
    pub fn track(track_id: TrackId, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            track_id: Some(track_id),
            expected_duration: None,
        }
    }

    /// Ignored unless positive and finite.
    pub fn with_expected_duration(mut self, seconds: f64) -> Self {
        self.expected_duration = (seconds.is_finite() && seconds > 0.0).then_some(seconds);
        self
    }

    /// Point `element` at this source.
    fn apply(&self, element: &dyn MediaElement) {
        if element.source() != self.url {
            element.set_source(&self.url);
        }
        if let Some(seconds) = self.expected_duration {
            element.set_expected_duration(seconds);
        }
    }
}

impl From<&str> for MediaSource {
    fn from(url: &str) -> Self {
        MediaSource::from(url.to_string())
    }
}

impl From<String> for MediaSource {
    fn from(url: String) -> Self {
        Self {
            url,
            track_id: None,
            expected_duration: None,
        }
    }
}

/// Listeners registered on every element the controller attaches.
#[derive(Clone, Default)]
pub struct ControllerCallbacks {
    pub on_time_update: Option<MediaListener>,
    pub on_ended: Option<MediaListener>,
}

impl ControllerCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_time_update(mut self, listener: MediaListener) -> Self {
        self.on_time_update = Some(listener);
        self
    }

    pub fn on_ended(mut self, listener: MediaListener) -> Self {
        self.on_ended = Some(listener);
        self
    }

    fn register(&self, element: &Arc<dyn MediaElement>) -> Vec<ListenerHandle> {
        let mut handles = Vec::with_capacity(2);
        if let Some(listener) = &self.on_time_update {
            handles.push(element.add_listener(MediaEventKind::TimeUpdate, listener.clone()));
        }
        if let Some(listener) = &self.on_ended {
            handles.push(element.add_listener(MediaEventKind::Ended, listener.clone()));
        }
        handles
    }
}

/// Single-track playback state machine.
///
/// Cloning yields another handle to the same controller.
#[derive(Clone)]
pub struct MediaController {
    shared: Arc<ControllerShared>,
}

struct ControllerShared {
    state: Mutex<ControllerState>,
    output: Arc<dyn AudioOutput>,
    callbacks: ControllerCallbacks,
    events: Option<EventBus>,
}

struct ControllerState {
    status: PlayerStatus,
    source: MediaSource,
    element: Option<Arc<dyn MediaElement>>,
    listeners: Vec<ListenerHandle>,
    loading: Option<InFlight>,
    starting: Option<InFlight>,
    generation: u64,
}

/// Element work collected under the lock and applied after releasing it.
struct Teardown {
    element: Option<Arc<dyn MediaElement>>,
    listeners: Vec<ListenerHandle>,
    pause: bool,
}

impl Teardown {
    fn run(self) {
        let Some(element) = self.element else {
            return;
        };
        if self.pause {
            element.pause();
        }
        for handle in self.listeners {
            element.remove_listener(handle);
        }
        element.release();
    }
}

impl MediaController {
    /// Creates a controller in `New`. No element is allocated until the
    /// first `load`/`play`.
    pub fn new(
        output: Arc<dyn AudioOutput>,
        source: impl Into<MediaSource>,
        callbacks: ControllerCallbacks,
        events: Option<EventBus>,
    ) -> Self {
        Self {
            shared: Arc::new(ControllerShared {
                state: Mutex::new(ControllerState {
                    status: PlayerStatus::New,
                    source: source.into(),
                    element: None,
                    listeners: Vec::new(),
                    loading: None,
                    starting: None,
                    generation: 0,
                }),
                output,
                callbacks,
                events,
            }),
        }
    }

    /// Whether both handles drive the same controller.
    pub fn ptr_eq(&self, other: &MediaController) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    pub fn status(&self) -> PlayerStatus {
        self.shared.state.lock().status
    }

    pub fn url(&self) -> String {
        self.shared.state.lock().source.url.clone()
    }

    pub fn track_id(&self) -> Option<TrackId> {
        self.shared.state.lock().source.track_id.clone()
    }

    /// Position in seconds, `0.0` while no element is attached.
    pub fn current_time(&self) -> f64 {
        self.element().map(|e| e.current_time()).unwrap_or(0.0)
    }

    /// Duration in seconds, `0.0` while no element is attached or unknown.
    pub fn duration(&self) -> f64 {
        self.element()
            .map(|e| e.duration())
            .filter(|d| d.is_finite())
            .unwrap_or(0.0)
    }

    fn element(&self) -> Option<Arc<dyn MediaElement>> {
        self.shared.state.lock().element.clone()
    }

    /// Loads the current source. Concurrent calls share one load.
    pub async fn load(&self) -> Result<()> {
        let pending = {
            let mut state = self.shared.state.lock();
            match state.status.transition(Operation::Load)? {
                Transition::BeginLoad => self.shared.begin_load(&mut state),
                _ => return Ok(()),
            }
        };
        pending.await;
        Ok(())
    }

    /// Loads if needed, then starts playback.
    ///
    /// Start failures move the controller to `Error` and are not returned.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::InvalidTransition`](crate::PlaybackError::InvalidTransition)
    /// when called on a stopped or failed controller.
    pub async fn play(&self) -> Result<()> {
        self.drive(Operation::Play).await
    }

    /// `play` restricted to `Paused` (or joining a start in flight).
    pub async fn resume(&self) -> Result<()> {
        self.drive(Operation::Resume).await
    }

    async fn drive(&self, operation: Operation) -> Result<()> {
        let mut waited = false;
        loop {
            let (pending, last) = {
                let mut state = self.shared.state.lock();
                let transition = match state.status.transition(operation) {
                    Ok(transition) => transition,
                    // The controller failed or was stopped while we waited;
                    // that outcome is reported through the status.
                    Err(_) if waited && state.status.is_terminal() => return Ok(()),
                    Err(e) => return Err(e),
                };
                match transition {
                    Transition::BeginLoad => (self.shared.begin_load(&mut state), false),
                    Transition::BeginStart => (self.shared.begin_start(&mut state), true),
                    _ => return Ok(()),
                }
            };
            pending.await;
            if last {
                return Ok(());
            }
            waited = true;
        }
    }

    /// Pauses a playing element. No-op in any other status.
    pub fn pause(&self) {
        let element = {
            let mut state = self.shared.state.lock();
            match state.status.transition(Operation::Pause) {
                Ok(Transition::Pause) => {
                    self.shared.set_status(&mut state, PlayerStatus::Paused);
                    state.element.clone()
                }
                _ => None,
            }
        };
        if let Some(element) = element {
            element.pause();
        }
    }

    /// Releases the element and its listeners and moves to `Stopped`.
    /// Idempotent.
    pub fn stop(&self) {
        let teardown = {
            let mut state = self.shared.state.lock();
            match state.status.transition(Operation::Stop) {
                Ok(Transition::Stop { pause_first }) => {
                    let mut teardown = ControllerShared::detach(&mut state);
                    teardown.pause = pause_first;
                    self.shared.set_status(&mut state, PlayerStatus::Stopped);
                    teardown
                }
                _ => return,
            }
        };
        teardown.run();
    }

    /// Points the same element at another source.
    ///
    /// Any load or start in flight for the previous source is abandoned. The
    /// element is pointed at the new source before this returns. The
    /// controller resets to `New` and immediately starts loading; the
    /// returned future resolves when that load settles.
    pub fn replace(&self, source: impl Into<MediaSource>) -> Result<InFlight> {
        let source = source.into();
        let (pending, element) = {
            let mut state = self.shared.state.lock();
            state.status.transition(Operation::Replace)?;
            let pause = matches!(
                state.status,
                PlayerStatus::Playing | PlayerStatus::StartingPlayer
            );
            state.generation += 1;
            state.loading = None;
            state.starting = None;
            debug!(from = %state.source.url, to = %source.url, "Replacing source");
            state.source = source.clone();
            self.shared.set_status(&mut state, PlayerStatus::New);
            let pending = self.shared.begin_load(&mut state);
            (pending, state.element.clone().map(|element| (element, pause)))
        };
        // The element leaves the old source before this returns, so nothing
        // it reports afterwards belongs to the previous track.
        if let Some((element, pause)) = element {
            if pause {
                element.pause();
            }
            element.set_source(&source.url);
            source.apply(element.as_ref());
        }
        Ok(pending)
    }

    /// Seeks when a source is loaded. No-op otherwise.
    pub fn set_current_time(&self, seconds: f64) {
        let element = {
            let state = self.shared.state.lock();
            match state.status.transition(Operation::Seek) {
                Ok(Transition::Seek) => state.element.clone(),
                _ => None,
            }
        };
        if let Some(element) = element {
            element.set_current_time(seconds);
        }
    }
}

impl ControllerShared {
    fn set_status(&self, state: &mut ControllerState, status: PlayerStatus) {
        if state.status == status {
            return;
        }
        let previous = std::mem::replace(&mut state.status, status);
        let track_id = state.source.track_id.as_ref().map(|id| id.to_string());
        debug!(track = ?track_id, from = %previous, to = %status, "Player status changed");
        if let Some(events) = &self.events {
            let _ = events.emit(CoreEvent::Playback(PlaybackEvent::StatusChanged {
                track_id,
                status: status.as_str().to_string(),
            }));
        }
    }

    /// Moves to `Error` after a failed load or start.
    fn fail(&self, state: &mut ControllerState, message: String) -> Teardown {
        let track_id = state.source.track_id.as_ref().map(|id| id.to_string());
        warn!(track = ?track_id, url = %state.source.url, error = %message, "Playback failed");
        let teardown = Self::detach(state);
        self.set_status(state, PlayerStatus::Error);
        if let Some(events) = &self.events {
            let _ = events.emit(CoreEvent::Playback(PlaybackEvent::Error { track_id, message }));
        }
        teardown
    }

    /// Drops the element and in-flight work, invalidating pending completions.
    fn detach(state: &mut ControllerState) -> Teardown {
        state.generation += 1;
        state.loading = None;
        state.starting = None;
        Teardown {
            element: state.element.take(),
            listeners: std::mem::take(&mut state.listeners),
            pause: false,
        }
    }

    fn begin_load(self: &Arc<Self>, state: &mut ControllerState) -> InFlight {
        if let Some(pending) = &state.loading {
            return pending.clone();
        }

        self.set_status(state, PlayerStatus::Loading);
        let generation = state.generation;
        let source = state.source.clone();
        let weak = Arc::downgrade(self);

        let pending = async move {
            let Some(element) = Self::attach(&weak, generation, &source) else {
                return;
            };
            let result = element.load().await;
            if let Some(shared) = weak.upgrade() {
                shared.finish_load(generation, result.map_err(|e| e.to_string()));
            }
        }
        .boxed()
        .shared();

        state.loading = Some(pending.clone());
        pending
    }

    /// Returns the element to load on, creating it on first use.
    fn attach(
        weak: &Weak<Self>,
        generation: u64,
        source: &MediaSource,
    ) -> Option<Arc<dyn MediaElement>> {
        let shared = weak.upgrade()?;
        let existing = {
            let state = shared.state.lock();
            if state.generation != generation {
                return None;
            }
            state.element.clone()
        };

        if let Some(element) = existing {
            source.apply(element.as_ref());
            return Some(element);
        }

        let element = match shared.output.create_element(&source.url) {
            Ok(element) => element,
            Err(e) => {
                let teardown = {
                    let mut state = shared.state.lock();
                    if state.generation != generation {
                        return None;
                    }
                    shared.fail(&mut state, e.to_string())
                };
                teardown.run();
                return None;
            }
        };
        source.apply(element.as_ref());

        let listeners = shared.callbacks.register(&element);
        let mut state = shared.state.lock();
        if state.generation != generation {
            drop(state);
            Teardown {
                element: Some(element),
                listeners,
                pause: false,
            }
            .run();
            return None;
        }
        state.element = Some(element.clone());
        state.listeners = listeners;
        Some(element)
    }

    fn finish_load(&self, generation: u64, result: std::result::Result<(), String>) {
        let teardown = {
            let mut state = self.state.lock();
            if state.generation != generation || state.status != PlayerStatus::Loading {
                debug!(url = %state.source.url, "Ignoring stale load completion");
                return;
            }
            state.loading = None;
            match result {
                Ok(()) => {
                    self.set_status(&mut state, PlayerStatus::Loaded);
                    return;
                }
                Err(message) => self.fail(&mut state, message),
            }
        };
        teardown.run();
    }

    fn begin_start(self: &Arc<Self>, state: &mut ControllerState) -> InFlight {
        if let Some(pending) = &state.starting {
            return pending.clone();
        }

        let Some(element) = state.element.clone() else {
            // Loaded without an element cannot happen; treat it as a failed start.
            let teardown = self.fail(state, "no media element attached".to_string());
            return async move { teardown.run() }.boxed().shared();
        };

        self.set_status(state, PlayerStatus::StartingPlayer);
        let generation = state.generation;
        let weak = Arc::downgrade(self);

        let pending = async move {
            let result = element.play().await;
            if let Some(shared) = weak.upgrade() {
                shared.finish_start(generation, result.map_err(|e| e.to_string()));
            }
        }
        .boxed()
        .shared();

        state.starting = Some(pending.clone());
        pending
    }

    fn finish_start(&self, generation: u64, result: std::result::Result<(), String>) {
        let teardown = {
            let mut state = self.state.lock();
            if state.generation != generation || state.status != PlayerStatus::StartingPlayer {
                debug!(url = %state.source.url, "Ignoring stale start completion");
                return;
            }
            state.starting = None;
            match result {
                Ok(()) => {
                    self.set_status(&mut state, PlayerStatus::Playing);
                    return;
                }
                Err(message) => self.fail(&mut state, message),
            }
        };
        teardown.run();
    }
}

impl fmt::Debug for MediaController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("MediaController")
            .field("status", &state.status)
            .field("source", &state.source)
            .field("element", &state.element.is_some())
            .field("listeners", &state.listeners.len())
            .finish()
    }
}

