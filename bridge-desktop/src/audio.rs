//! Headless audio output.
//!
//! Fetches and probes the source with Symphonia, then advances a wall-clock
//! position while "playing". Nothing is sent to a sound device; the element
//! exists so desktop front-ends and integration runs can drive the full
//! playback pipeline without audio hardware.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{HttpClient, HttpRequest},
    media::{AudioOutput, ListenerHandle, MediaElement, MediaEvent, MediaEventKind, MediaListener},
    object_url::ObjectUrlStore,
};
use bytes::Bytes;
use parking_lot::Mutex;
use std::io::Cursor;
use std::sync::{Arc, Weak};
use std::time::Duration;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

const DEFAULT_TICK: Duration = Duration::from_millis(250);

/// Factory for [`HeadlessElement`]s.
pub struct HeadlessAudioOutput {
    http: Arc<dyn HttpClient>,
    object_urls: Arc<dyn ObjectUrlStore>,
    tick: Duration,
}

impl HeadlessAudioOutput {
    pub fn new(http: Arc<dyn HttpClient>, object_urls: Arc<dyn ObjectUrlStore>) -> Self {
        Self {
            http,
            object_urls,
            tick: DEFAULT_TICK,
        }
    }

    /// Interval between time-update notifications.
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }
}

impl AudioOutput for HeadlessAudioOutput {
    fn create_element(&self, url: &str) -> Result<Arc<dyn MediaElement>> {
        Ok(Arc::new(HeadlessElement::new(
            url,
            self.http.clone(),
            self.object_urls.clone(),
            self.tick,
        )))
    }
}

#[derive(Default)]
struct ElementState {
    source: String,
    loaded: bool,
    duration: f64,
    /// Catalog duration, used when the media declares none
    expected_duration: Option<f64>,
    position: f64,
    clock: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(ListenerHandle, MediaEventKind, MediaListener)>,
}

struct Shared {
    state: Mutex<ElementState>,
    listeners: Mutex<Listeners>,
}

impl Shared {
    fn emit(&self, event: MediaEvent) {
        let targets: Vec<MediaListener> = self
            .listeners
            .lock()
            .entries
            .iter()
            .filter(|(_, kind, _)| *kind == event.kind())
            .map(|(_, _, listener)| listener.clone())
            .collect();
        for listener in targets {
            listener(&event);
        }
    }
}

/// Media element that keeps time without producing sound.
pub struct HeadlessElement {
    shared: Arc<Shared>,
    http: Arc<dyn HttpClient>,
    object_urls: Arc<dyn ObjectUrlStore>,
    tick: Duration,
}

impl HeadlessElement {
    fn new(
        url: &str,
        http: Arc<dyn HttpClient>,
        object_urls: Arc<dyn ObjectUrlStore>,
        tick: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(ElementState {
                    source: url.to_string(),
                    ..Default::default()
                }),
                listeners: Mutex::new(Listeners::default()),
            }),
            http,
            object_urls,
            tick,
        }
    }

    async fn fetch(&self, url: &str) -> Result<(Bytes, Option<String>)> {
        if self.object_urls.is_object_url(url) {
            let blob = self
                .object_urls
                .get(url)
                .ok_or_else(|| BridgeError::Media(format!("Object URL revoked: {}", url)))?;
            return Ok((blob.data, Some(blob.content_type)));
        }

        let response = self.http.execute(HttpRequest::get(url)).await?;
        if !response.is_success() {
            return Err(BridgeError::Media(format!(
                "Source returned HTTP {}",
                response.status
            )));
        }
        let content_type = response.content_type().map(str::to_string);
        Ok((response.body, content_type))
    }

    fn stop_clock(state: &mut ElementState) {
        if let Some(clock) = state.clock.take() {
            clock.abort();
        }
    }

    async fn run_clock(shared: Weak<Shared>, tick: Duration) {
        let mut interval = tokio::time::interval(tick);
        interval.tick().await;
        loop {
            interval.tick().await;
            let Some(shared) = shared.upgrade() else {
                return;
            };

            let (position, duration, ended) = {
                let mut state = shared.state.lock();
                state.position += tick.as_secs_f64();
                let ended = state.duration > 0.0 && state.position >= state.duration;
                if ended {
                    state.position = state.duration;
                    state.clock = None;
                }
                (state.position, state.duration, ended)
            };

            shared.emit(MediaEvent::TimeUpdate { position, duration });
            if ended {
                shared.emit(MediaEvent::Ended);
                return;
            }
        }
    }
}

/// Duration in seconds from the container headers, if declared.
pub fn probe_duration(data: Bytes, content_type: Option<&str>) -> Result<Option<f64>> {
    let mut hint = Hint::new();
    if let Some(mime) = content_type {
        hint.mime_type(mime);
    }

    let stream = MediaSourceStream::new(Box::new(Cursor::new(data)), Default::default());
    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            stream,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| BridgeError::Media(format!("Failed to probe format: {}", e)))?;

    let duration = probed.format.default_track().and_then(|track| {
        let params = &track.codec_params;
        match (params.n_frames, params.sample_rate) {
            (Some(frames), Some(rate)) if rate > 0 => Some(frames as f64 / rate as f64),
            _ => None,
        }
    });
    Ok(duration)
}

#[async_trait]
impl MediaElement for HeadlessElement {
    fn source(&self) -> String {
        self.shared.state.lock().source.clone()
    }

    fn set_source(&self, url: &str) {
        let mut state = self.shared.state.lock();
        Self::stop_clock(&mut state);
        state.source = url.to_string();
        state.loaded = false;
        state.duration = 0.0;
        state.expected_duration = None;
        state.position = 0.0;
    }

    fn set_expected_duration(&self, seconds: f64) {
        if seconds.is_finite() && seconds > 0.0 {
            self.shared.state.lock().expected_duration = Some(seconds);
        }
    }

    #[instrument(skip(self))]
    async fn load(&self) -> Result<()> {
        let (source, expected) = {
            let state = self.shared.state.lock();
            (state.source.clone(), state.expected_duration)
        };
        let (data, content_type) = self.fetch(&source).await?;
        let probed = match probe_duration(data, content_type.as_deref()) {
            Ok(duration) => duration,
            // Formats the prober does not know still play for the listed length.
            Err(e) if expected.is_some() => {
                debug!(source = %source, error = %e, "Probe failed");
                None
            }
            Err(e) => return Err(e),
        };

        let mut state = self.shared.state.lock();
        if state.source != source {
            return Err(BridgeError::Media("Source changed during load".to_string()));
        }
        let duration = probed.or(expected);
        if duration.is_none() {
            warn!(source = %source, "Source does not declare a duration");
        } else if probed.is_none() {
            debug!(source = %source, "Using catalog duration");
        }
        state.loaded = true;
        state.duration = duration.unwrap_or(0.0);
        state.position = 0.0;
        debug!(duration = state.duration, "Loaded source");
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        let mut state = self.shared.state.lock();
        if !state.loaded {
            return Err(BridgeError::Media("Source not loaded".to_string()));
        }
        if state.clock.is_none() {
            let shared = Arc::downgrade(&self.shared);
            state.clock = Some(tokio::spawn(Self::run_clock(shared, self.tick)));
        }
        Ok(())
    }

    fn pause(&self) {
        Self::stop_clock(&mut self.shared.state.lock());
    }

    fn current_time(&self) -> f64 {
        self.shared.state.lock().position
    }

    fn duration(&self) -> f64 {
        self.shared.state.lock().duration
    }

    fn set_current_time(&self, seconds: f64) {
        let mut state = self.shared.state.lock();
        let upper = if state.duration > 0.0 {
            state.duration
        } else {
            f64::MAX
        };
        state.position = seconds.clamp(0.0, upper);
    }

    fn add_listener(&self, kind: MediaEventKind, listener: MediaListener) -> ListenerHandle {
        let mut listeners = self.shared.listeners.lock();
        listeners.next_id += 1;
        let handle = ListenerHandle(listeners.next_id);
        listeners.entries.push((handle, kind, listener));
        handle
    }

    fn remove_listener(&self, handle: ListenerHandle) -> bool {
        let mut listeners = self.shared.listeners.lock();
        let before = listeners.entries.len();
        listeners.entries.retain(|(h, _, _)| *h != handle);
        listeners.entries.len() != before
    }

    fn release(&self) {
        let mut state = self.shared.state.lock();
        Self::stop_clock(&mut state);
        state.loaded = false;
    }
}

impl Drop for HeadlessElement {
    fn drop(&mut self) {
        Self::stop_clock(&mut self.shared.state.lock());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryObjectUrlStore;
    use bridge_traits::http::HttpResponse;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NoNetwork;

    #[async_trait]
    impl HttpClient for NoNetwork {
        async fn execute(&self, _request: HttpRequest) -> Result<HttpResponse> {
            Err(BridgeError::OperationFailed("offline".into()))
        }

        async fn download_stream(
            &self,
            _url: String,
        ) -> Result<Box<dyn tokio::io::AsyncRead + Send + Unpin>> {
            Err(BridgeError::OperationFailed("offline".into()))
        }
    }

    /// 16-bit mono PCM WAV with `samples` frames at 8 kHz.
    fn wav(samples: u32) -> Bytes {
        let rate: u32 = 8_000;
        let data_len = samples * 2;
        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVEfmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&rate.to_le_bytes());
        out.extend_from_slice(&(rate * 2).to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        out.resize(out.len() + data_len as usize, 0);
        Bytes::from(out)
    }

    /// Serves the same opaque body for every URL.
    struct OpaqueServer;

    #[async_trait]
    impl HttpClient for OpaqueServer {
        async fn execute(&self, _request: HttpRequest) -> Result<HttpResponse> {
            Ok(HttpResponse {
                status: 200,
                headers: Default::default(),
                body: Bytes::from_static(b"not a container symphonia knows"),
            })
        }

        async fn download_stream(
            &self,
            _url: String,
        ) -> Result<Box<dyn tokio::io::AsyncRead + Send + Unpin>> {
            Err(BridgeError::OperationFailed("unused".into()))
        }
    }

    fn output(store: Arc<MemoryObjectUrlStore>) -> HeadlessAudioOutput {
        HeadlessAudioOutput::new(Arc::new(NoNetwork), store).with_tick(Duration::from_millis(10))
    }

    #[test]
    fn test_probe_wav_duration() {
        let duration = probe_duration(wav(4_000), Some("audio/wav")).unwrap();
        assert_eq!(duration, Some(0.5));
    }

    #[test]
    fn test_probe_rejects_garbage() {
        assert!(probe_duration(Bytes::from_static(b"not audio"), None).is_err());
    }

    #[tokio::test]
    async fn test_play_requires_load() {
        let store = Arc::new(MemoryObjectUrlStore::new());
        let element = output(store).create_element("https://x/song.mp3").unwrap();
        assert!(element.play().await.is_err());
    }

    #[tokio::test]
    async fn test_revoked_object_url_fails_load() {
        let store = Arc::new(MemoryObjectUrlStore::new());
        let url = store.create(wav(800), "audio/wav").unwrap();
        store.revoke(&url);

        let element = output(store).create_element(&url).unwrap();
        assert!(element.load().await.is_err());
    }

    #[tokio::test]
    async fn test_plays_to_end() {
        let store = Arc::new(MemoryObjectUrlStore::new());
        let url = store.create(wav(400), "audio/wav").unwrap();
        let element = output(store).create_element(&url).unwrap();

        let ended = Arc::new(tokio::sync::Notify::new());
        let updates = Arc::new(AtomicUsize::new(0));
        let on_end = ended.clone();
        element.add_listener(
            MediaEventKind::Ended,
            Arc::new(move |_| on_end.notify_one()),
        );
        let counter = updates.clone();
        let handle = element.add_listener(
            MediaEventKind::TimeUpdate,
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        element.load().await.unwrap();
        assert_eq!(element.duration(), 0.05);
        element.play().await.unwrap();

        tokio::time::timeout(Duration::from_secs(2), ended.notified())
            .await
            .unwrap();
        assert!(updates.load(Ordering::SeqCst) > 0);
        assert_eq!(element.current_time(), 0.05);
        assert!(element.remove_listener(handle));
        assert!(!element.remove_listener(handle));
    }

    #[tokio::test]
    async fn test_catalog_duration_drives_unprobed_source_to_end() {
        let output = HeadlessAudioOutput::new(
            Arc::new(OpaqueServer),
            Arc::new(MemoryObjectUrlStore::new()),
        )
        .with_tick(Duration::from_millis(10));
        let element = output.create_element("https://x/song.mp3").unwrap();

        assert!(element.load().await.is_err());

        element.set_expected_duration(0.05);
        element.load().await.unwrap();
        assert_eq!(element.duration(), 0.05);

        let ended = Arc::new(tokio::sync::Notify::new());
        let on_end = ended.clone();
        element.add_listener(
            MediaEventKind::Ended,
            Arc::new(move |_| on_end.notify_one()),
        );
        element.play().await.unwrap();
        tokio::time::timeout(Duration::from_secs(2), ended.notified())
            .await
            .unwrap();

        element.set_source("https://x/other.mp3");
        assert!(element.load().await.is_err());
    }
}
