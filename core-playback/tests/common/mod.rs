//! In-memory host bridges shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use bridge_traits::media::{
    AudioOutput, ListenerHandle, MediaElement, MediaEvent, MediaEventKind, MediaListener,
};
use bridge_traits::media_session::{
    ActionDetails, ActionHandler, MediaAction, MediaSession, MetadataUpdate, PositionState,
};
use bridge_traits::object_url::{ObjectBlob, ObjectUrlStore};
use bridge_traits::storage::{FileSystemAccess, SettingsStore};
use bytes::Bytes;
use core_library::models::{Album, AlbumId, CoverArt, Track, TrackId};
use core_playback::OfflineCacheResolver;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

// ============================================================================
// Scheduling helpers
// ============================================================================

/// Yield to spawned tasks until `condition` holds.
pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}

pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

// ============================================================================
// Media element
// ============================================================================

type Gate = oneshot::Sender<BridgeResult<()>>;

#[derive(Default)]
struct ElementState {
    source: String,
    position: f64,
    duration: f64,
    expected_duration: Option<f64>,
    released: bool,
    pauses: usize,
    loads: Vec<String>,
    plays: usize,
    load_gates: Vec<Option<Gate>>,
    play_gates: Vec<Option<Gate>>,
    listeners: Vec<(u64, MediaEventKind, MediaListener)>,
    next_listener: u64,
}

/// Scriptable media element. Loads and plays complete immediately unless
/// gated, in which case the test resolves each call explicitly.
#[derive(Default)]
pub struct FakeElement {
    state: Mutex<ElementState>,
    gate_loads: AtomicBool,
    gate_plays: AtomicBool,
    fail_plays: AtomicBool,
    fail_loads: AtomicBool,
    end_on_pause: AtomicBool,
}

impl FakeElement {
    /// Report `Ended` from inside the next `pause`, as a track finishing
    /// exactly while the player swaps it out would.
    pub fn end_on_next_pause(&self) {
        self.end_on_pause.store(true, Ordering::SeqCst);
    }

    pub fn load_calls(&self) -> Vec<String> {
        self.state.lock().loads.clone()
    }

    pub fn play_calls(&self) -> usize {
        self.state.lock().plays
    }

    pub fn pause_calls(&self) -> usize {
        self.state.lock().pauses
    }

    pub fn expected_duration(&self) -> Option<f64> {
        self.state.lock().expected_duration
    }

    pub fn is_released(&self) -> bool {
        self.state.lock().released
    }

    pub fn listener_count(&self) -> usize {
        self.state.lock().listeners.len()
    }

    /// Resolve the `call`-th gated load.
    pub fn complete_load(&self, call: usize, result: BridgeResult<()>) {
        let gate = self.state.lock().load_gates.get_mut(call).and_then(Option::take);
        if let Some(gate) = gate {
            let _ = gate.send(result);
        }
    }

    /// Resolve the `call`-th gated play.
    pub fn complete_play(&self, call: usize, result: BridgeResult<()>) {
        let gate = self.state.lock().play_gates.get_mut(call).and_then(Option::take);
        if let Some(gate) = gate {
            let _ = gate.send(result);
        }
    }

    pub fn emit(&self, event: MediaEvent) {
        let targets: Vec<MediaListener> = self
            .state
            .lock()
            .listeners
            .iter()
            .filter(|(_, kind, _)| *kind == event.kind())
            .map(|(_, _, l)| l.clone())
            .collect();
        for listener in targets {
            listener(&event);
        }
    }

    /// Move the position and announce it.
    pub fn tick(&self, position: f64) {
        let duration = {
            let mut state = self.state.lock();
            state.position = position;
            state.duration
        };
        self.emit(MediaEvent::TimeUpdate { position, duration });
    }

    pub fn finish(&self) {
        self.emit(MediaEvent::Ended);
    }
}

#[async_trait]
impl MediaElement for FakeElement {
    fn source(&self) -> String {
        self.state.lock().source.clone()
    }

    fn set_source(&self, url: &str) {
        let mut state = self.state.lock();
        state.source = url.to_string();
        state.position = 0.0;
        state.expected_duration = None;
    }

    fn set_expected_duration(&self, seconds: f64) {
        self.state.lock().expected_duration = Some(seconds);
    }

    async fn load(&self) -> BridgeResult<()> {
        let gate = {
            let mut state = self.state.lock();
            let source = state.source.clone();
            state.loads.push(source);
            if self.gate_loads.load(Ordering::SeqCst) {
                let (tx, rx) = oneshot::channel();
                state.load_gates.push(Some(tx));
                Some(rx)
            } else {
                None
            }
        };
        let result = match gate {
            Some(rx) => rx
                .await
                .unwrap_or_else(|_| Err(BridgeError::Media("gate dropped".into()))),
            None if self.fail_loads.load(Ordering::SeqCst) => {
                Err(BridgeError::Media("MEDIA_ERR_SRC_NOT_SUPPORTED".into()))
            }
            None => Ok(()),
        };
        if result.is_ok() {
            self.state.lock().duration = 180.0;
        }
        result
    }

    async fn play(&self) -> BridgeResult<()> {
        let gate = {
            let mut state = self.state.lock();
            state.plays += 1;
            if self.gate_plays.load(Ordering::SeqCst) {
                let (tx, rx) = oneshot::channel();
                state.play_gates.push(Some(tx));
                Some(rx)
            } else {
                None
            }
        };
        match gate {
            Some(rx) => rx
                .await
                .unwrap_or_else(|_| Err(BridgeError::Media("gate dropped".into()))),
            None if self.fail_plays.load(Ordering::SeqCst) => {
                Err(BridgeError::Media("NotAllowedError".into()))
            }
            None => Ok(()),
        }
    }

    fn pause(&self) {
        self.state.lock().pauses += 1;
        if self.end_on_pause.swap(false, Ordering::SeqCst) {
            self.emit(MediaEvent::Ended);
        }
    }

    fn current_time(&self) -> f64 {
        self.state.lock().position
    }

    fn duration(&self) -> f64 {
        self.state.lock().duration
    }

    fn set_current_time(&self, seconds: f64) {
        self.state.lock().position = seconds;
    }

    fn add_listener(&self, kind: MediaEventKind, listener: MediaListener) -> ListenerHandle {
        let mut state = self.state.lock();
        state.next_listener += 1;
        let id = state.next_listener;
        state.listeners.push((id, kind, listener));
        ListenerHandle(id)
    }

    fn remove_listener(&self, handle: ListenerHandle) -> bool {
        let mut state = self.state.lock();
        let before = state.listeners.len();
        state.listeners.retain(|(id, _, _)| *id != handle.0);
        state.listeners.len() != before
    }

    fn release(&self) {
        self.state.lock().released = true;
    }
}

/// Audio output handing out [`FakeElement`]s.
#[derive(Default)]
pub struct FakeAudioOutput {
    elements: Mutex<Vec<Arc<FakeElement>>>,
    pub gate_loads: AtomicBool,
    pub gate_plays: AtomicBool,
    pub fail_plays: AtomicBool,
    pub fail_loads: AtomicBool,
}

impl FakeAudioOutput {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn created(&self) -> usize {
        self.elements.lock().len()
    }

    pub fn element(&self, index: usize) -> Arc<FakeElement> {
        self.elements.lock()[index].clone()
    }

    pub fn last(&self) -> Arc<FakeElement> {
        self.elements
            .lock()
            .last()
            .cloned()
            .expect("no element created")
    }
}

impl AudioOutput for FakeAudioOutput {
    fn create_element(&self, url: &str) -> BridgeResult<Arc<dyn MediaElement>> {
        let element = Arc::new(FakeElement::default());
        element.state.lock().source = url.to_string();
        for (from, to) in [
            (&self.gate_loads, &element.gate_loads),
            (&self.gate_plays, &element.gate_plays),
            (&self.fail_plays, &element.fail_plays),
            (&self.fail_loads, &element.fail_loads),
        ] {
            to.store(from.load(Ordering::SeqCst), Ordering::SeqCst);
        }
        self.elements.lock().push(element.clone());
        Ok(element)
    }
}

// ============================================================================
// Media session
// ============================================================================

#[derive(Default)]
pub struct FakeMediaSession {
    pub metadata: Mutex<Vec<MetadataUpdate>>,
    pub handler_calls: Mutex<Vec<(MediaAction, bool)>>,
    handlers: Mutex<HashMap<MediaAction, ActionHandler>>,
    pub positions: Mutex<Vec<PositionState>>,
    pub clears: AtomicUsize,
}

impl FakeMediaSession {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn has_handler(&self, action: MediaAction) -> bool {
        self.handlers.lock().contains_key(&action)
    }

    pub fn handler(&self, action: MediaAction) -> Option<ActionHandler> {
        self.handlers.lock().get(&action).cloned()
    }

    /// Invoke the registered handler like the OS would.
    pub fn trigger(&self, details: ActionDetails) -> bool {
        match self.handler(details.action) {
            Some(handler) => {
                handler(details);
                true
            }
            None => false,
        }
    }

    pub fn calls_for(&self, action: MediaAction) -> usize {
        self.handler_calls
            .lock()
            .iter()
            .filter(|(a, _)| *a == action)
            .count()
    }
}

impl MediaSession for FakeMediaSession {
    fn set_metadata(&self, update: MetadataUpdate) {
        self.metadata.lock().push(update);
    }

    fn clear_metadata(&self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
    }

    fn set_action_handler(&self, action: MediaAction, handler: Option<ActionHandler>) {
        self.handler_calls.lock().push((action, handler.is_some()));
        let mut handlers = self.handlers.lock();
        match handler {
            Some(handler) => {
                handlers.insert(action, handler);
            }
            None => {
                handlers.remove(&action);
            }
        }
    }

    fn set_position_state(&self, state: PositionState) {
        self.positions.lock().push(state);
    }
}

// ============================================================================
// Storage
// ============================================================================

#[derive(Default)]
struct FsState {
    files: BTreeMap<PathBuf, Bytes>,
    dirs: HashSet<PathBuf>,
}

/// In-memory filesystem. `direct == false` hides `write_file` behind
/// streams, like hosts without synchronous file access.
pub struct MemoryFileSystem {
    state: Arc<Mutex<FsState>>,
    direct: bool,
    pub direct_writes: AtomicUsize,
    pub stream_writes: AtomicUsize,
}

impl MemoryFileSystem {
    pub fn new(direct: bool) -> Arc<Self> {
        Arc::new(Self {
            state: Arc::new(Mutex::new(FsState::default())),
            direct,
            direct_writes: AtomicUsize::new(0),
            stream_writes: AtomicUsize::new(0),
        })
    }

    pub fn file(&self, path: &Path) -> Option<Bytes> {
        self.state.lock().files.get(path).cloned()
    }

    pub fn file_count(&self) -> usize {
        self.state.lock().files.len()
    }

    pub fn remove_file(&self, path: &Path) {
        self.state.lock().files.remove(path);
    }
}

fn not_found(path: &Path) -> BridgeError {
    BridgeError::Io(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("{} not found", path.display()),
    ))
}

#[async_trait]
impl FileSystemAccess for MemoryFileSystem {
    async fn exists(&self, path: &Path) -> BridgeResult<bool> {
        let state = self.state.lock();
        Ok(state.dirs.contains(path)
            || state.files.keys().any(|p| p == path || p.starts_with(path)))
    }

    async fn create_dir_all(&self, path: &Path) -> BridgeResult<()> {
        self.state.lock().dirs.insert(path.to_path_buf());
        Ok(())
    }

    async fn read_file(&self, path: &Path) -> BridgeResult<Bytes> {
        self.file(path).ok_or_else(|| not_found(path))
    }

    async fn write_file(&self, path: &Path, data: Bytes) -> BridgeResult<()> {
        self.direct_writes.fetch_add(1, Ordering::SeqCst);
        self.state.lock().files.insert(path.to_path_buf(), data);
        Ok(())
    }

    async fn delete_dir_all(&self, path: &Path) -> BridgeResult<()> {
        let mut state = self.state.lock();
        let had_dir = state.dirs.remove(path);
        let before = state.files.len();
        state.files.retain(|p, _| !p.starts_with(path));
        if !had_dir && state.files.len() == before {
            return Err(not_found(path));
        }
        Ok(())
    }

    async fn open_write_stream(
        &self,
        path: &Path,
    ) -> BridgeResult<Box<dyn tokio::io::AsyncWrite + Send + Unpin>> {
        self.stream_writes.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryWriteStream {
            path: path.to_path_buf(),
            buffer: Vec::new(),
            state: self.state.clone(),
        }))
    }

    fn supports_direct_write(&self) -> bool {
        self.direct
    }
}

struct MemoryWriteStream {
    path: PathBuf,
    buffer: Vec<u8>,
    state: Arc<Mutex<FsState>>,
}

impl tokio::io::AsyncWrite for MemoryWriteStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        self.buffer.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        let data = Bytes::from(self.buffer.clone());
        self.state.lock().files.insert(self.path.clone(), data);
        Poll::Ready(Ok(()))
    }
}

#[derive(Default)]
pub struct MemorySettings {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySettings {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn set_string(&self, key: &str, value: &str) -> BridgeResult<()> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get_string(&self, key: &str) -> BridgeResult<Option<String>> {
        Ok(self.values.lock().get(key).cloned())
    }

    async fn delete(&self, key: &str) -> BridgeResult<()> {
        self.values.lock().remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> BridgeResult<Vec<String>> {
        Ok(self.values.lock().keys().cloned().collect())
    }
}

#[derive(Default)]
pub struct MemoryObjectUrls {
    blobs: Mutex<HashMap<String, ObjectBlob>>,
    next: AtomicUsize,
    pub revoked: Mutex<Vec<String>>,
}

impl MemoryObjectUrls {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn live(&self) -> usize {
        self.blobs.lock().len()
    }
}

impl ObjectUrlStore for MemoryObjectUrls {
    fn create(&self, data: Bytes, content_type: &str) -> BridgeResult<String> {
        let id = self.next.fetch_add(1, Ordering::SeqCst);
        let url = format!("blob:test-{id}");
        self.blobs.lock().insert(
            url.clone(),
            ObjectBlob {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(url)
    }

    fn revoke(&self, url: &str) -> bool {
        self.revoked.lock().push(url.to_string());
        self.blobs.lock().remove(url).is_some()
    }

    fn get(&self, url: &str) -> Option<ObjectBlob> {
        self.blobs.lock().get(url).cloned()
    }
}

// ============================================================================
// HTTP
// ============================================================================

/// Serves fixed bodies by URL; unknown URLs answer 404.
#[derive(Default)]
pub struct FakeHttp {
    routes: Mutex<HashMap<String, (u16, Bytes)>>,
    /// URLs fetched with a buffered `execute`.
    pub requests: Mutex<Vec<String>>,
    /// URLs fetched with `download_stream`.
    pub streamed: Mutex<Vec<String>>,
}

impl FakeHttp {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn serve(&self, url: &str, status: u16, body: &'static [u8]) {
        self.routes
            .lock()
            .insert(url.to_string(), (status, Bytes::from_static(body)));
    }
}

#[async_trait]
impl HttpClient for FakeHttp {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        self.requests.lock().push(request.url.clone());
        let (status, body) = self
            .routes
            .lock()
            .get(&request.url)
            .cloned()
            .unwrap_or((404, Bytes::new()));
        Ok(HttpResponse {
            status,
            headers: HashMap::new(),
            body,
        })
    }

    async fn download_stream(
        &self,
        url: String,
    ) -> BridgeResult<Box<dyn tokio::io::AsyncRead + Send + Unpin>> {
        self.streamed.lock().push(url.clone());
        let (status, body) = self
            .routes
            .lock()
            .get(&url)
            .cloned()
            .unwrap_or((404, Bytes::new()));
        if !(200..300).contains(&status) {
            return Err(BridgeError::OperationFailed(format!("HTTP error: {status}")));
        }
        Ok(Box::new(std::io::Cursor::new(body)))
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub const BASE: &str = "https://music.example.com";

pub fn track(id: &str, index: u32) -> Track {
    Track {
        id: TrackId::from(id),
        name: format!("Song {id}"),
        index,
        disk_index: 1,
        duration: 180.0,
        artists: vec!["Artist".to_string()],
        url: format!("{BASE}/data/songs/{id}"),
        content_type: "audio/mpeg".to_string(),
        year: Some(2020),
    }
}

pub fn album(id: &str, track_ids: &[&str]) -> Album {
    Album {
        id: AlbumId::from(id),
        name: format!("Album {id}"),
        artists: vec!["Artist".to_string()],
        year: Some(2020),
        tracks: track_ids
            .iter()
            .enumerate()
            .map(|(i, t)| track(t, i as u32 + 1))
            .collect(),
        covers: vec![CoverArt {
            url: format!("{BASE}/data/images/{id}.jpg"),
            width: Some(600),
        }],
        cached_cover: None,
    }
}

/// Every bridge a resolver needs, backed by memory.
pub struct CacheHarness {
    pub fs: Arc<MemoryFileSystem>,
    pub settings: Arc<MemorySettings>,
    pub http: Arc<FakeHttp>,
    pub object_urls: Arc<MemoryObjectUrls>,
}

impl CacheHarness {
    pub fn new() -> Self {
        Self::with_direct_write(true)
    }

    pub fn with_direct_write(direct: bool) -> Self {
        Self {
            fs: MemoryFileSystem::new(direct),
            settings: MemorySettings::new(),
            http: FakeHttp::new(),
            object_urls: MemoryObjectUrls::new(),
        }
    }

    /// Serve the cover and every track of `album`.
    pub fn serve_album(&self, album: &Album) {
        for cover in &album.covers {
            self.http.serve(&cover.url, 200, b"JPEG");
        }
        for track in &album.tracks {
            self.http.serve(&track.url, 200, b"ID3-AUDIO");
        }
    }

    pub fn resolver(&self) -> OfflineCacheResolver {
        OfflineCacheResolver::new(
            self.fs.clone(),
            self.settings.clone(),
            self.http.clone(),
            self.object_urls.clone(),
            "/cache",
        )
    }
}
