//! Fakes shared by the integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch, Semaphore};

use sessiontap::config::RecorderConfig;
use sessiontap::event::ConsoleLevel;
use sessiontap::host::{
    Body, FetchApi, FetchInput, FetchResponse, HostEnvironment, XhrPrototype, XmlHttpRequest,
};
use sessiontap::media::{
    AudioConstraints, DisplayConstraints, EncoderEvent, EncoderFactory, EncoderState, MediaDevices,
    MediaEncoder, MediaStream, MediaTrack, TrackKind,
};
use sessiontap::recorder::SessionRecorder;
use sessiontap::{Result, TapError};

/// Track that counts `stop()` calls and can be ended from outside
pub struct FakeTrack {
    kind: TrackKind,
    stops: AtomicUsize,
    ended: watch::Sender<bool>,
}

impl FakeTrack {
    pub fn new(kind: TrackKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            stops: AtomicUsize::new(0),
            ended: watch::channel(false).0,
        })
    }

    /// Simulate the user ending the share from the browser UI
    pub fn end(&self) {
        self.ended.send_replace(true);
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaTrack for FakeTrack {
    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }

    fn is_live(&self) -> bool {
        self.stop_count() == 0 && !*self.ended.borrow()
    }

    async fn ended(&self) {
        let mut ended = self.ended.subscribe();
        let _ = ended.wait_for(|ended| *ended).await;
    }
}

/// Display and microphone devices with switchable denial
pub struct FakeDevices {
    pub video: Arc<FakeTrack>,
    pub mic: Arc<FakeTrack>,
    pub deny_display: AtomicBool,
    pub deny_mic: AtomicBool,
    /// When set, display requests wait for `release_display`
    pub hold_display: AtomicBool,
    display_gate: Semaphore,
    pub display_calls: AtomicUsize,
}

impl FakeDevices {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            video: FakeTrack::new(TrackKind::Video),
            mic: FakeTrack::new(TrackKind::Audio),
            deny_display: AtomicBool::new(false),
            deny_mic: AtomicBool::new(false),
            hold_display: AtomicBool::new(false),
            display_gate: Semaphore::new(0),
            display_calls: AtomicUsize::new(0),
        })
    }

    /// Let `n` held display requests through
    pub fn release_display(&self, n: usize) {
        self.display_gate.add_permits(n);
    }
}

#[async_trait]
impl MediaDevices for FakeDevices {
    async fn get_display_media(&self, _: &DisplayConstraints) -> Result<MediaStream> {
        self.display_calls.fetch_add(1, Ordering::SeqCst);
        if self.hold_display.load(Ordering::SeqCst) {
            let permit = self
                .display_gate
                .acquire()
                .await
                .map_err(|e| TapError::Media(e.to_string()))?;
            permit.forget();
        }
        if self.deny_display.load(Ordering::SeqCst) {
            return Err(TapError::PermissionDenied("NotAllowedError".to_string()));
        }
        Ok(MediaStream::new(vec![self.video.clone() as Arc<dyn MediaTrack>]))
    }

    async fn get_user_media(&self, _: &AudioConstraints) -> Result<MediaStream> {
        if self.deny_mic.load(Ordering::SeqCst) {
            return Err(TapError::PermissionDenied("NotAllowedError".to_string()));
        }
        Ok(MediaStream::new(vec![self.mic.clone() as Arc<dyn MediaTrack>]))
    }
}

/// Counters shared between a factory and the encoders it builds
#[derive(Default)]
pub struct EncoderStats {
    pub created: AtomicUsize,
    pub pauses: AtomicUsize,
    pub resumes: AtomicUsize,
    pub stops: AtomicUsize,
}

struct FakeEncoder {
    events: mpsc::UnboundedSender<EncoderEvent>,
    state: Mutex<EncoderState>,
    chunk: Option<Bytes>,
    stats: Arc<EncoderStats>,
}

impl MediaEncoder for FakeEncoder {
    fn start(&self, _: Duration) -> Result<()> {
        *self.state.lock() = EncoderState::Recording;
        let _ = self.events.send(EncoderEvent::Started);
        Ok(())
    }

    fn pause(&self) {
        self.stats.pauses.fetch_add(1, Ordering::SeqCst);
        *self.state.lock() = EncoderState::Paused;
        let _ = self.events.send(EncoderEvent::Paused);
    }

    fn resume(&self) {
        self.stats.resumes.fetch_add(1, Ordering::SeqCst);
        *self.state.lock() = EncoderState::Recording;
        let _ = self.events.send(EncoderEvent::Resumed);
    }

    fn request_data(&self) {
        if let Some(chunk) = &self.chunk {
            let _ = self.events.send(EncoderEvent::Data(chunk.clone()));
        }
    }

    fn stop(&self) {
        self.stats.stops.fetch_add(1, Ordering::SeqCst);
        *self.state.lock() = EncoderState::Inactive;
        let _ = self.events.send(EncoderEvent::Stopped);
    }

    fn state(&self) -> EncoderState {
        *self.state.lock()
    }
}

/// Factory for encoders that emit `chunk` on every flush
pub struct FakeEncoders {
    pub supported: Vec<String>,
    pub chunk: Option<Bytes>,
    pub stats: Arc<EncoderStats>,
}

impl FakeEncoders {
    pub fn webm(chunk: Option<&'static [u8]>) -> Arc<Self> {
        Arc::new(Self {
            supported: vec!["video/webm".to_string()],
            chunk: chunk.map(Bytes::from_static),
            stats: Arc::default(),
        })
    }

    pub fn unsupported() -> Arc<Self> {
        Arc::new(Self {
            supported: Vec::new(),
            chunk: None,
            stats: Arc::default(),
        })
    }
}

impl EncoderFactory for FakeEncoders {
    fn is_type_supported(&self, mime_type: &str) -> bool {
        self.supported.iter().any(|m| m == mime_type)
    }

    fn create(
        &self,
        _: &MediaStream,
        _: &str,
        events: mpsc::UnboundedSender<EncoderEvent>,
    ) -> Result<Box<dyn MediaEncoder>> {
        self.stats.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeEncoder {
            events,
            state: Mutex::new(EncoderState::Inactive),
            chunk: self.chunk.clone(),
            stats: Arc::clone(&self.stats),
        }))
    }
}

/// Fetch backend that answers only once a permit is released
pub struct GatedFetch {
    gate: Semaphore,
    fail_with: Option<String>,
    pub calls: AtomicUsize,
}

impl GatedFetch {
    /// Answers `200 OK` with a JSON body
    pub fn ok() -> Arc<Self> {
        Arc::new(Self {
            gate: Semaphore::new(0),
            fail_with: None,
            calls: AtomicUsize::new(0),
        })
    }

    /// Rejects with a network error
    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            gate: Semaphore::new(0),
            fail_with: Some(message.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    /// Let `n` requests through
    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }
}

#[async_trait]
impl FetchApi for GatedFetch {
    async fn fetch(&self, _input: FetchInput) -> Result<FetchResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| TapError::Network(e.to_string()))?;
        permit.forget();
        match &self.fail_with {
            Some(message) => Err(TapError::Network(message.clone())),
            None => Ok(FetchResponse::new(200, "OK", r#"{"ok":true}"#)
                .with_header("content-type", "application/json")),
        }
    }
}

/// XHR transport that parks sends until the test settles them
#[derive(Default)]
pub struct ManualXhr {
    pub sent: Mutex<Vec<XmlHttpRequest>>,
}

impl XhrPrototype for ManualXhr {
    fn open(&self, xhr: &XmlHttpRequest, method: &str, url: &str) {
        xhr.set_target(method, url);
    }

    fn set_request_header(&self, xhr: &XmlHttpRequest, name: &str, value: &str) {
        xhr.append_request_header(name, value);
    }

    fn send(&self, xhr: &XmlHttpRequest, _body: Option<Body>) {
        xhr.mark_sent();
        self.sent.lock().push(xhr.clone());
    }
}

/// Everything a recorder test needs
pub struct Harness {
    pub host: Arc<HostEnvironment>,
    pub devices: Arc<FakeDevices>,
    pub encoders: Arc<FakeEncoders>,
    pub fetch: Arc<GatedFetch>,
    pub xhr: Arc<ManualXhr>,
    pub recorder: Arc<SessionRecorder>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(FakeEncoders::webm(Some(b"frame")), GatedFetch::ok(), RecorderConfig::default())
    }

    pub fn with(
        encoders: Arc<FakeEncoders>,
        fetch: Arc<GatedFetch>,
        config: RecorderConfig,
    ) -> Self {
        let xhr = Arc::new(ManualXhr::default());
        let host = Arc::new(
            HostEnvironment::builder()
                .fetch(fetch.clone())
                .xhr(xhr.clone())
                .build(),
        );
        let devices = FakeDevices::new();
        let recorder =
            SessionRecorder::new(Arc::clone(&host), devices.clone(), encoders.clone(), &config);
        Self {
            host,
            devices,
            encoders,
            fetch,
            xhr,
            recorder,
        }
    }

    /// Current implementation behind every wrappable host slot
    pub fn snapshot_host(&self) -> HostSnapshot {
        HostSnapshot {
            console: ConsoleLevel::ALL
                .iter()
                .map(|&level| self.host.console().method(level).get())
                .collect(),
            fetch: self.host.fetch_capability().get(),
            xhr: self.host.xhr_prototype().get(),
            storage: self.host.storage_prototype().get(),
            indexed_db: self.host.indexed_db().get(),
        }
    }
}

/// Pointer snapshot of the host's capability slots
pub struct HostSnapshot {
    console: Vec<Arc<dyn sessiontap::host::ConsoleMethod>>,
    fetch: Arc<dyn FetchApi>,
    xhr: Arc<dyn XhrPrototype>,
    storage: Arc<dyn sessiontap::host::StoragePrototype>,
    indexed_db: Arc<dyn sessiontap::host::IdbFactory>,
}

impl HostSnapshot {
    /// Number of slots still holding the snapshotted implementation
    pub fn unchanged_in(&self, host: &HostEnvironment) -> usize {
        let console = ConsoleLevel::ALL
            .iter()
            .zip(&self.console)
            .filter(|(level, method)| host.console().method(**level).is(method))
            .count();
        console
            + usize::from(host.fetch_capability().is(&self.fetch))
            + usize::from(host.xhr_prototype().is(&self.xhr))
            + usize::from(host.storage_prototype().is(&self.storage))
            + usize::from(host.indexed_db().is(&self.indexed_db))
    }

    /// Total number of slots
    pub fn len(&self) -> usize {
        self.console.len() + 4
    }
}

/// Poll `condition` until it holds, yielding to the runtime in between
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("condition not reached");
}
