//! Display capture state machine
//!
//! The controller owns at most one active capture. Status moves
//! `Idle -> Starting -> Recording <-> Paused -> Idle`; every exit path
//! (stop, cancel, failed start, drop) stops the captured tracks.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::CaptureConfig;
use crate::{Result, TapError};

use super::blob::VideoBlob;
use super::device::{
    AudioConstraints, DisplayConstraints, EncoderEvent, EncoderFactory, EncoderState, MediaDevices,
    MediaEncoder, MediaStream, MediaTrack,
};

/// Externally visible capture status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureStatus {
    /// Nothing captured
    Idle,
    /// Acquiring devices
    Starting,
    /// Encoding
    Recording,
    /// Encoding suspended
    Paused,
}

impl std::fmt::Display for CaptureStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Starting => write!(f, "starting"),
            Self::Recording => write!(f, "recording"),
            Self::Paused => write!(f, "paused"),
        }
    }
}

/// Controller settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSettings {
    /// Encoder chunk interval
    pub timeslice: Duration,
    /// Bound on waiting for the encoder's stop confirmation
    pub stop_timeout: Duration,
    /// Container/codec preferences, first supported wins
    pub mime_preferences: Vec<String>,
    /// Try to add microphone audio
    pub microphone: bool,
    /// Display request
    pub display: DisplayConstraints,
    /// Microphone request
    pub audio: AudioConstraints,
}

impl From<&CaptureConfig> for CaptureSettings {
    fn from(config: &CaptureConfig) -> Self {
        Self {
            timeslice: config.timeslice(),
            stop_timeout: config.stop_timeout(),
            mime_preferences: config.mime_preferences.clone(),
            microphone: config.microphone,
            display: DisplayConstraints {
                system_audio: config.system_audio,
                prefer_current_tab: config.prefer_current_tab,
                ..DisplayConstraints::default()
            },
            audio: AudioConstraints {
                echo_cancellation: config.echo_cancellation,
                noise_suppression: config.noise_suppression,
            },
        }
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self::from(&CaptureConfig::default())
    }
}

/// Result of a successful start
#[derive(Clone)]
pub struct CaptureStarted {
    /// Negotiated container/codec
    pub mime_type: String,
    /// Display video track, watched for external end
    pub video_track: Option<Arc<dyn MediaTrack>>,
    /// Number of audio tracks being encoded
    pub audio_tracks: usize,
}

impl std::fmt::Debug for CaptureStarted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureStarted")
            .field("mime_type", &self.mime_type)
            .field("video_track", &self.video_track.is_some())
            .field("audio_tracks", &self.audio_tracks)
            .finish()
    }
}

struct ActiveCapture {
    stream: MediaStream,
    encoder: Box<dyn MediaEncoder>,
    mime_type: String,
    chunks: Arc<Mutex<Vec<Bytes>>>,
    stopped: oneshot::Receiver<()>,
    pump: JoinHandle<()>,
}

impl Drop for ActiveCapture {
    fn drop(&mut self) {
        self.pump.abort();
        self.stream.stop_all();
    }
}

struct ControllerState {
    status: CaptureStatus,
    generation: u64,
    active: Option<ActiveCapture>,
}

/// Owns display capture and chunked encoding
pub struct MediaCaptureController {
    devices: Arc<dyn MediaDevices>,
    encoders: Arc<dyn EncoderFactory>,
    settings: CaptureSettings,
    state: Mutex<ControllerState>,
}

impl MediaCaptureController {
    /// Controller over host `devices` and `encoders`
    #[must_use]
    pub fn new(
        devices: Arc<dyn MediaDevices>,
        encoders: Arc<dyn EncoderFactory>,
        settings: CaptureSettings,
    ) -> Self {
        Self {
            devices,
            encoders,
            settings,
            state: Mutex::new(ControllerState {
                status: CaptureStatus::Idle,
                generation: 0,
                active: None,
            }),
        }
    }

    /// Current status
    #[must_use]
    pub fn status(&self) -> CaptureStatus {
        self.state.lock().status
    }

    /// Negotiated container/codec of the active capture
    #[must_use]
    pub fn mime_type(&self) -> Option<String> {
        self.state.lock().active.as_ref().map(|a| a.mime_type.clone())
    }

    /// Acquire the display (and optionally the microphone) and start encoding.
    ///
    /// A capture already in progress is cancelled first.
    ///
    /// # Errors
    ///
    /// Returns an acquisition error if the display is refused or no preferred
    /// format is supported, or a media error if the encoder fails to start or
    /// the start is superseded by a cancel.
    pub async fn start(&self) -> Result<CaptureStarted> {
        let generation = {
            let mut state = self.state.lock();
            if state.status != CaptureStatus::Idle || state.active.is_some() {
                warn!(status = %state.status, "capture not idle, forcing cleanup");
                Self::cancel_locked(&mut state);
            }
            state.generation += 1;
            state.status = CaptureStatus::Starting;
            state.generation
        };

        let mut stream = match self.devices.get_display_media(&self.settings.display).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("display capture refused: {e}");
                self.reset_if_current(generation);
                return Err(into_acquisition(e));
            }
        };
        debug!(
            video = stream.video_track().is_some(),
            audio = stream.audio_tracks().len(),
            "display stream acquired"
        );

        if self.settings.microphone {
            match self.devices.get_user_media(&self.settings.audio).await {
                Ok(mic) => {
                    for track in mic.audio_tracks() {
                        stream.add_track(track);
                    }
                    debug!("microphone audio added");
                }
                Err(e) => warn!("could not get microphone: {e}"),
            }
        }

        if self.state.lock().generation != generation {
            stream.stop_all();
            return Err(superseded());
        }

        let Some(mime_type) = self
            .settings
            .mime_preferences
            .iter()
            .find(|mime| self.encoders.is_type_supported(mime))
            .cloned()
        else {
            stream.stop_all();
            self.reset_if_current(generation);
            return Err(TapError::UnsupportedFormat(
                self.settings.mime_preferences.clone(),
            ));
        };

        let (events, receiver) = mpsc::unbounded_channel();
        let encoder = match self
            .encoders
            .create(&stream, &mime_type, events)
            .and_then(|encoder| encoder.start(self.settings.timeslice).map(|()| encoder))
        {
            Ok(encoder) => encoder,
            Err(e) => {
                stream.stop_all();
                self.reset_if_current(generation);
                return Err(e);
            }
        };

        let chunks = Arc::new(Mutex::new(Vec::new()));
        let (stopped_tx, stopped) = oneshot::channel();
        let pump = tokio::spawn(pump_encoder_events(
            receiver,
            Arc::clone(&chunks),
            stopped_tx,
        ));

        let started = CaptureStarted {
            mime_type: mime_type.clone(),
            video_track: stream.video_track(),
            audio_tracks: stream.audio_tracks().len(),
        };
        let active = ActiveCapture {
            stream,
            encoder,
            mime_type,
            chunks,
            stopped,
            pump,
        };

        let mut state = self.state.lock();
        if state.generation != generation {
            drop(state);
            active.encoder.stop();
            return Err(superseded());
        }
        state.active = Some(active);
        state.status = CaptureStatus::Recording;
        drop(state);

        info!(
            mime_type = %started.mime_type,
            audio_tracks = started.audio_tracks,
            timeslice_ms = self.settings.timeslice.as_millis() as u64,
            "capture started"
        );
        Ok(started)
    }

    /// Suspend encoding; no-op unless recording
    pub fn pause(&self) {
        let mut state = self.state.lock();
        if state.status != CaptureStatus::Recording {
            return;
        }
        if let Some(active) = &state.active {
            active.encoder.pause();
            state.status = CaptureStatus::Paused;
        }
    }

    /// Resume encoding; no-op unless paused
    pub fn resume(&self) {
        let mut state = self.state.lock();
        if state.status != CaptureStatus::Paused {
            return;
        }
        if let Some(active) = &state.active {
            active.encoder.resume();
            state.status = CaptureStatus::Recording;
        }
    }

    /// Take the active capture and ask the encoder to flush and stop.
    ///
    /// Returns `None` when nothing is being captured. At most one caller
    /// receives a [`PendingStop`] per capture.
    pub fn begin_stop(&self) -> Option<PendingStop> {
        let active = {
            let mut state = self.state.lock();
            let active = state.active.take()?;
            state.status = CaptureStatus::Idle;
            active
        };

        let encoder_state = active.encoder.state();
        let awaiting_confirmation =
            matches!(encoder_state, EncoderState::Recording | EncoderState::Paused);
        if awaiting_confirmation {
            debug!("requesting final data and stopping encoder");
            active.encoder.request_data();
            active.encoder.stop();
        } else {
            debug!(?encoder_state, "encoder already inactive");
        }

        Some(PendingStop {
            active,
            awaiting_confirmation,
            timeout: self.settings.stop_timeout,
        })
    }

    /// Stop capturing and return the assembled video
    pub async fn stop(&self) -> Option<VideoBlob> {
        let pending = self.begin_stop()?;
        Some(pending.finish().await)
    }

    /// Drop any capture without producing output.
    ///
    /// Also invalidates a start that is still acquiring devices.
    pub fn cancel(&self) {
        let mut state = self.state.lock();
        Self::cancel_locked(&mut state);
    }

    fn cancel_locked(state: &mut ControllerState) {
        state.generation += 1;
        state.status = CaptureStatus::Idle;
        if let Some(active) = state.active.take() {
            warn!(mime_type = %active.mime_type, "discarding active capture");
            if active.encoder.state() != EncoderState::Inactive {
                active.encoder.stop();
            }
        }
    }

    fn reset_if_current(&self, generation: u64) {
        let mut state = self.state.lock();
        if state.generation == generation {
            state.status = CaptureStatus::Idle;
        }
    }
}

impl Drop for MediaCaptureController {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if state.active.is_some() {
            Self::cancel_locked(state);
        }
    }
}

impl std::fmt::Debug for MediaCaptureController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaCaptureController")
            .field("status", &self.status())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// A capture taken out of the controller, waiting to be finalized
pub struct PendingStop {
    active: ActiveCapture,
    awaiting_confirmation: bool,
    timeout: Duration,
}

impl PendingStop {
    /// Negotiated container/codec
    #[must_use]
    pub fn mime_type(&self) -> &str {
        &self.active.mime_type
    }

    /// Wait for the encoder's final data, assemble the blob and release the
    /// tracks. The blob may be empty.
    pub async fn finish(mut self) -> VideoBlob {
        if self.awaiting_confirmation
            && tokio::time::timeout(self.timeout, &mut self.active.stopped)
                .await
                .is_err()
        {
            warn!(
                timeout_ms = self.timeout.as_millis() as u64,
                "encoder did not confirm stop, using chunks captured so far"
            );
        }

        let chunks = std::mem::take(&mut *self.active.chunks.lock());
        let blob = VideoBlob::assemble(&self.active.mime_type, &chunks);
        info!(
            bytes = blob.len(),
            chunks = chunks.len(),
            mime_type = %blob.mime_type(),
            "video assembled"
        );
        blob
    }
}

impl std::fmt::Debug for PendingStop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingStop")
            .field("mime_type", &self.active.mime_type)
            .field("awaiting_confirmation", &self.awaiting_confirmation)
            .finish_non_exhaustive()
    }
}

async fn pump_encoder_events(
    mut events: mpsc::UnboundedReceiver<EncoderEvent>,
    chunks: Arc<Mutex<Vec<Bytes>>>,
    stopped: oneshot::Sender<()>,
) {
    while let Some(event) = events.recv().await {
        match event {
            EncoderEvent::Data(chunk) => {
                if chunk.is_empty() {
                    continue;
                }
                let mut chunks = chunks.lock();
                chunks.push(chunk);
                debug!(total_chunks = chunks.len(), "chunk added");
            }
            EncoderEvent::Started => debug!("encoder started"),
            EncoderEvent::Paused => debug!("encoder paused"),
            EncoderEvent::Resumed => debug!("encoder resumed"),
            EncoderEvent::Stopped => {
                debug!("encoder stopped");
                break;
            }
            EncoderEvent::Error(message) => {
                error!("encoder error: {message}");
                break;
            }
        }
    }
    let _ = stopped.send(());
}

fn into_acquisition(e: TapError) -> TapError {
    if e.is_acquisition() {
        e
    } else {
        TapError::PermissionDenied(e.to_string())
    }
}

fn superseded() -> TapError {
    TapError::Media("capture start was superseded by a cancel".to_string())
}
