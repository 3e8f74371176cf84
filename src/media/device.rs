//! Host media interfaces: capture devices, tracks and encoders

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc::UnboundedSender;

use crate::Result;

/// Kind of media carried by a track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    /// Video frames
    Video,
    /// Audio samples
    Audio,
}

/// One live media track
#[async_trait]
pub trait MediaTrack: Send + Sync {
    /// Track kind
    fn kind(&self) -> TrackKind;

    /// Human-readable label
    fn label(&self) -> String {
        String::new()
    }

    /// Release the underlying device. Idempotent.
    fn stop(&self);

    /// Whether the track still produces media
    fn is_live(&self) -> bool;

    /// Resolves once the track ends for a reason other than [`MediaTrack::stop`]
    /// (e.g. the user ended the share from the host UI)
    async fn ended(&self);
}

/// A set of tracks captured together
#[derive(Clone, Default)]
pub struct MediaStream {
    tracks: Vec<Arc<dyn MediaTrack>>,
}

impl MediaStream {
    /// Stream over `tracks`
    #[must_use]
    pub fn new(tracks: Vec<Arc<dyn MediaTrack>>) -> Self {
        Self { tracks }
    }

    /// Every track
    #[must_use]
    pub fn tracks(&self) -> &[Arc<dyn MediaTrack>] {
        &self.tracks
    }

    /// First video track
    #[must_use]
    pub fn video_track(&self) -> Option<Arc<dyn MediaTrack>> {
        self.tracks
            .iter()
            .find(|t| t.kind() == TrackKind::Video)
            .cloned()
    }

    /// Audio tracks
    #[must_use]
    pub fn audio_tracks(&self) -> Vec<Arc<dyn MediaTrack>> {
        self.tracks
            .iter()
            .filter(|t| t.kind() == TrackKind::Audio)
            .cloned()
            .collect()
    }

    /// Add a track
    pub fn add_track(&mut self, track: Arc<dyn MediaTrack>) {
        self.tracks.push(track);
    }

    /// Stop every track
    pub fn stop_all(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }
}

impl fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kinds: Vec<TrackKind> = self.tracks.iter().map(|t| t.kind()).collect();
        f.debug_struct("MediaStream").field("tracks", &kinds).finish()
    }
}

/// Display capture request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayConstraints {
    /// Always draw the cursor
    pub cursor_always: bool,
    /// Ask for system audio
    pub system_audio: bool,
    /// Pre-select the current tab
    pub prefer_current_tab: bool,
    /// Offer the current tab as a choice
    pub include_self_surface: bool,
}

impl Default for DisplayConstraints {
    fn default() -> Self {
        Self {
            cursor_always: true,
            system_audio: true,
            prefer_current_tab: true,
            include_self_surface: true,
        }
    }
}

/// Microphone capture request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioConstraints {
    /// Echo cancellation
    pub echo_cancellation: bool,
    /// Noise suppression
    pub noise_suppression: bool,
}

impl Default for AudioConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
        }
    }
}

/// Host capture devices
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Prompt for a display surface
    ///
    /// # Errors
    ///
    /// Returns error if the user or host refuses
    async fn get_display_media(&self, constraints: &DisplayConstraints) -> Result<MediaStream>;

    /// Prompt for the microphone
    ///
    /// # Errors
    ///
    /// Returns error if the user or host refuses
    async fn get_user_media(&self, constraints: &AudioConstraints) -> Result<MediaStream>;
}

/// Encoder lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderState {
    /// Not started or stopped
    Inactive,
    /// Producing chunks
    Recording,
    /// Suspended
    Paused,
}

/// Notification from an encoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncoderEvent {
    /// Encoding began
    Started,
    /// A chunk of encoded media (may be empty)
    Data(Bytes),
    /// Encoding suspended
    Paused,
    /// Encoding resumed
    Resumed,
    /// Final data delivered, encoder is inactive
    Stopped,
    /// Encoder failed
    Error(String),
}

/// A chunked media encoder
pub trait MediaEncoder: Send + Sync {
    /// Begin encoding, emitting a chunk every `timeslice`
    ///
    /// # Errors
    ///
    /// Returns error if the encoder cannot start
    fn start(&self, timeslice: Duration) -> Result<()>;

    /// Suspend encoding
    fn pause(&self);

    /// Resume encoding
    fn resume(&self);

    /// Flush buffered media as a [`EncoderEvent::Data`]
    fn request_data(&self);

    /// Stop; ends with [`EncoderEvent::Stopped`]
    fn stop(&self);

    /// Current state
    fn state(&self) -> EncoderState;
}

/// Creates encoders for a stream
pub trait EncoderFactory: Send + Sync {
    /// Whether `mime_type` can be produced
    fn is_type_supported(&self, mime_type: &str) -> bool;

    /// Encoder over `stream` reporting to `events`
    ///
    /// # Errors
    ///
    /// Returns error if the encoder cannot be created
    fn create(
        &self,
        stream: &MediaStream,
        mime_type: &str,
        events: UnboundedSender<EncoderEvent>,
    ) -> Result<Box<dyn MediaEncoder>>;
}
