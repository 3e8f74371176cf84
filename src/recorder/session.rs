//! Recording session lifecycle

use std::sync::{Arc, Weak};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::clock::SessionClock;
use crate::config::RecorderConfig;
use crate::event::{Event, EventLog, EventSink, EventSummary};
use crate::host::HostEnvironment;
use crate::intercept::InterceptorSet;
use crate::media::{
    CaptureSettings, CaptureStatus, EncoderFactory, MediaCaptureController, MediaDevices, VideoBlob,
};
use crate::{Result, TapError};

/// Output of one recording session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Artifact {
    /// Assembled video; `None` if no capture was running when stopped
    pub video: Option<VideoBlob>,
    /// Events in emission order
    pub events: Vec<Event>,
}

impl Artifact {
    /// Event counts per type
    #[must_use]
    pub fn summary(&self) -> EventSummary {
        EventSummary::from_events(&self.events)
    }

    /// Whether neither video nor events were captured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.video.is_none() && self.events.is_empty()
    }
}

type Finalization = Shared<BoxFuture<'static, Artifact>>;

enum Phase {
    Idle,
    Starting,
    Active {
        session: u64,
    },
    Stopping {
        session: u64,
        finalization: Finalization,
        claimed: bool,
    },
}

struct RecorderInner {
    phase: Phase,
    attempt: u64,
    interceptors: InterceptorSet,
    watcher: Option<JoinHandle<()>>,
    pending_artifact: Option<Artifact>,
    disposed: bool,
}

/// Captures a display recording together with a timeline of host activity.
///
/// Create with [`SessionRecorder::new`], then `start`/`stop` any number of
/// times. Dropping the last handle (or calling [`SessionRecorder::dispose`])
/// restores every wrapped host API and releases the capture devices.
pub struct SessionRecorder {
    host: Arc<HostEnvironment>,
    capture: MediaCaptureController,
    log: Arc<EventLog>,
    max_serialized_len: usize,
    inner: Mutex<RecorderInner>,
    this: Weak<SessionRecorder>,
}

static_assertions::assert_impl_all!(SessionRecorder: Send, Sync);
static_assertions::assert_impl_all!(Artifact: Send, Sync, Clone);

impl SessionRecorder {
    /// Recorder over `host`, capturing through `devices` and `encoders`
    #[must_use]
    pub fn new(
        host: Arc<HostEnvironment>,
        devices: Arc<dyn MediaDevices>,
        encoders: Arc<dyn EncoderFactory>,
        config: &RecorderConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            host,
            capture: MediaCaptureController::new(
                devices,
                encoders,
                CaptureSettings::from(&config.capture),
            ),
            log: Arc::new(EventLog::new()),
            max_serialized_len: config.limits.max_serialized_len,
            inner: Mutex::new(RecorderInner {
                phase: Phase::Idle,
                attempt: 0,
                interceptors: InterceptorSet::from_config(config),
                watcher: None,
                pending_artifact: None,
                disposed: false,
            }),
            this: this.clone(),
        })
    }

    /// Host environment being observed
    #[must_use]
    pub fn host(&self) -> &Arc<HostEnvironment> {
        &self.host
    }

    /// Current status
    #[must_use]
    pub fn status(&self) -> CaptureStatus {
        match self.inner.lock().phase {
            Phase::Idle | Phase::Stopping { .. } => CaptureStatus::Idle,
            Phase::Starting => CaptureStatus::Starting,
            Phase::Active { .. } => self.capture.status(),
        }
    }

    /// Events recorded so far in the active session
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.log.len()
    }

    /// Copy of the active session's timeline, pending network events included
    #[must_use]
    pub fn snapshot(&self) -> Vec<Event> {
        self.log.snapshot()
    }

    /// Begin a session.
    ///
    /// The capture is acquired first; the event timeline starts and the
    /// interceptors are installed only once it is running. A session in
    /// progress is discarded.
    ///
    /// # Errors
    ///
    /// Returns the capture's acquisition error (status stays idle and no host
    /// API is wrapped), or an error if the recorder was disposed or the start
    /// was superseded.
    pub async fn start(&self) -> Result<()> {
        let attempt = {
            let mut inner = self.inner.lock();
            if inner.disposed {
                return Err(TapError::Other("recorder has been disposed".to_string()));
            }
            if matches!(inner.phase, Phase::Active { .. }) {
                warn!("session already active, forcing cleanup");
                self.discard_session(&mut inner);
            }
            if inner.pending_artifact.take().is_some() {
                warn!("discarding unclaimed artifact from an implicit stop");
            }
            inner.attempt += 1;
            inner.phase = Phase::Starting;
            inner.attempt
        };

        let started = match self.capture.start().await {
            Ok(started) => started,
            Err(e) => {
                let mut inner = self.inner.lock();
                if inner.attempt == attempt {
                    inner.phase = Phase::Idle;
                }
                warn!("recording could not start: {e}");
                return Err(e);
            }
        };

        let mut inner = self.inner.lock();
        if inner.disposed {
            drop(inner);
            self.capture.cancel();
            return Err(TapError::Other("recorder has been disposed".to_string()));
        }
        if inner.attempt != attempt {
            // the newer start already reclaimed the controller
            return Err(TapError::Media(
                "recording start was superseded".to_string(),
            ));
        }

        let session = self.log.begin(SessionClock::start());
        let sink = EventSink::new(Arc::clone(&self.log), session, self.max_serialized_len);
        inner.interceptors.install_all(&self.host, &sink);
        inner.phase = Phase::Active { session };

        if let Some(track) = started.video_track {
            let recorder = self.this.clone();
            inner.watcher = Some(tokio::spawn(async move {
                track.ended().await;
                debug!(session, "video track ended");
                if let Some(recorder) = recorder.upgrade() {
                    recorder.stop_session(Some(session)).await;
                }
            }));
        }
        drop(inner);

        info!(session, mime_type = %started.mime_type, "recording started");
        Ok(())
    }

    /// Suspend encoding; no-op unless recording
    pub fn pause(&self) {
        if matches!(self.inner.lock().phase, Phase::Active { .. }) {
            self.capture.pause();
        }
    }

    /// Resume encoding; no-op unless paused
    pub fn resume(&self) {
        if matches!(self.inner.lock().phase, Phase::Active { .. }) {
            self.capture.resume();
        }
    }

    /// End the session and return its artifact.
    ///
    /// Concurrent callers share one finalization and receive equal
    /// artifacts. When idle, returns the artifact left by an implicit stop,
    /// or an empty one.
    pub async fn stop(&self) -> Artifact {
        match self.stop_session(None).await {
            Some(artifact) => artifact,
            None => {
                let pending = self.inner.lock().pending_artifact.take();
                pending.unwrap_or_default()
            }
        }
    }

    /// Shared stop path.
    ///
    /// `implicit_for` is the session whose video track ended; such a stop
    /// only applies to that session and keeps its artifact for the next
    /// `stop()` unless an explicit caller already shares it.
    async fn stop_session(&self, implicit_for: Option<u64>) -> Option<Artifact> {
        let implicit = implicit_for.is_some();
        let (session, finalization) = {
            let mut inner = self.inner.lock();
            match &mut inner.phase {
                Phase::Active { session } => {
                    let session = *session;
                    if implicit_for.is_some_and(|s| s != session) {
                        return None;
                    }
                    let finalization = self.begin_finalization(&mut inner, session, implicit);
                    (session, finalization)
                }
                Phase::Stopping {
                    session,
                    finalization,
                    claimed,
                } => {
                    if implicit {
                        return None;
                    }
                    *claimed = true;
                    (*session, finalization.clone())
                }
                Phase::Idle | Phase::Starting => return None,
            }
        };

        let artifact = finalization.await;

        let mut inner = self.inner.lock();
        if let Phase::Stopping {
            session: stopping,
            claimed,
            ..
        } = inner.phase
        {
            if stopping == session {
                if !claimed {
                    inner.pending_artifact = Some(artifact.clone());
                    info!(session, "artifact kept for the next stop()");
                }
                inner.phase = Phase::Idle;
            }
        }
        Some(artifact)
    }

    /// Unwrap the host, close the timeline, take the capture and spawn its
    /// finalization. Called with the session active.
    fn begin_finalization(
        &self,
        inner: &mut RecorderInner,
        session: u64,
        implicit: bool,
    ) -> Finalization {
        inner.interceptors.uninstall_all(&self.host);
        let events = self.log.finish();
        let pending = self.capture.begin_stop();

        if let Some(watcher) = inner.watcher.take() {
            // The implicit path runs on the watcher task itself
            if !implicit {
                watcher.abort();
            }
        }

        let summary = EventSummary::from_events(&events);
        info!(
            session,
            implicit,
            events = summary.total(),
            by_type = ?summary.counts(),
            "recording stopped"
        );

        let video = tokio::spawn(async move {
            match pending {
                Some(pending) => Some(pending.finish().await),
                None => None,
            }
        });
        let finalization: Finalization = async move {
            let video = video.await.unwrap_or_else(|e| {
                warn!("video finalization failed: {e}");
                None
            });
            Artifact { video, events }
        }
        .boxed()
        .shared();

        inner.phase = Phase::Stopping {
            session,
            finalization: finalization.clone(),
            claimed: !implicit,
        };
        finalization
    }

    /// Drop the active session without producing an artifact
    fn discard_session(&self, inner: &mut RecorderInner) {
        if let Some(watcher) = inner.watcher.take() {
            watcher.abort();
        }
        inner.interceptors.uninstall_all(&self.host);
        let dropped = self.log.finish();
        self.capture.cancel();
        inner.phase = Phase::Idle;
        if !dropped.is_empty() {
            debug!(events = dropped.len(), "discarded session events");
        }
    }

    /// Restore every wrapped host API and release the capture.
    ///
    /// The recorder cannot be started again afterwards.
    pub fn dispose(&self) {
        let mut inner = self.inner.lock();
        if inner.disposed {
            return;
        }
        inner.disposed = true;
        inner.attempt += 1;
        if !matches!(inner.phase, Phase::Stopping { .. }) {
            self.discard_session(&mut inner);
        }
        inner.pending_artifact = None;
        info!("recorder disposed");
    }
}

impl Drop for SessionRecorder {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for SessionRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRecorder")
            .field("status", &self.status())
            .field("events", &self.event_count())
            .field("interceptors", &self.inner.lock().interceptors)
            .finish_non_exhaustive()
    }
}
