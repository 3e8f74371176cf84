//! Playable replay sources and object URL lifetime

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use dashmap::DashMap;
use tracing::debug;

use crate::media::VideoBlob;
use crate::{Result, TapError};

/// Scheme prefix of URLs issued by [`ObjectUrlRegistry`]
pub const OBJECT_URL_PREFIX: &str = "blob:sessiontap/";

const DATA_URL_MARKER: &str = ";base64,";

/// Standard alphabet, padding optional
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// What a replay is asked to play
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplaySource {
    /// In-memory video
    Blob(VideoBlob),
    /// `blob:`, `http(s):` or `data:` URL
    Url(String),
}

impl From<VideoBlob> for ReplaySource {
    fn from(blob: VideoBlob) -> Self {
        Self::Blob(blob)
    }
}

impl From<String> for ReplaySource {
    fn from(url: String) -> Self {
        Self::Url(url)
    }
}

impl From<&str> for ReplaySource {
    fn from(url: &str) -> Self {
        Self::Url(url.to_string())
    }
}

/// Issues and revokes object URLs for in-memory blobs
#[derive(Debug, Default)]
pub struct ObjectUrlRegistry {
    next_id: AtomicU64,
    entries: DashMap<String, VideoBlob>,
}

impl ObjectUrlRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register `blob`; the URL is revoked when the returned guard drops
    #[must_use]
    pub fn register(self: &Arc<Self>, blob: VideoBlob) -> ObjectUrl {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let url = format!("{OBJECT_URL_PREFIX}{id}");
        debug!(%url, bytes = blob.len(), "object URL created");
        self.entries.insert(url.clone(), blob);
        ObjectUrl {
            url,
            registry: Arc::clone(self),
        }
    }

    /// Blob behind `url`, if still registered
    #[must_use]
    pub fn resolve(&self, url: &str) -> Option<VideoBlob> {
        self.entries.get(url).map(|entry| entry.value().clone())
    }

    /// Revoke `url`; returns whether it was registered
    pub fn revoke(&self, url: &str) -> bool {
        let revoked = self.entries.remove(url).is_some();
        if revoked {
            debug!(%url, "object URL revoked");
        }
        revoked
    }

    /// Number of live URLs
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no URL is live
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A registered object URL, revoked on drop
#[derive(Debug)]
pub struct ObjectUrl {
    url: String,
    registry: Arc<ObjectUrlRegistry>,
}

impl ObjectUrl {
    /// The URL
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.url
    }
}

impl Drop for ObjectUrl {
    fn drop(&mut self) {
        self.registry.revoke(&self.url);
    }
}

/// A source the player can load directly
#[derive(Debug)]
pub enum PlayableSource {
    /// Object URL owned by the replay
    Owned(ObjectUrl),
    /// URL owned by someone else
    External(String),
}

impl PlayableSource {
    /// URL to hand to the player
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::Owned(url) => url.as_str(),
            Self::External(url) => url,
        }
    }
}

/// Decode a `data:<mime>;base64,<payload>` URL.
///
/// URL-safe characters and embedded whitespace are accepted and padding is
/// optional.
///
/// # Errors
///
/// Returns error if the URL is not a base64 data URL or the payload does not
/// decode
pub fn decode_data_url(url: &str) -> Result<VideoBlob> {
    let marker = url
        .find(DATA_URL_MARKER)
        .ok_or_else(|| TapError::InvalidSource("data URL is not base64-encoded".to_string()))?;
    let mime_type = url[..marker]
        .strip_prefix("data:")
        .ok_or_else(|| TapError::InvalidSource("missing data: scheme".to_string()))?;

    let payload: String = url[marker + DATA_URL_MARKER.len()..]
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();

    let data = LENIENT_BASE64
        .decode(payload.as_bytes())
        .map_err(|e| TapError::InvalidSource(format!("invalid base64 payload: {e}")))?;
    Ok(VideoBlob::new(mime_type, data))
}

/// Turn a replay source into something playable, registering blobs and
/// decoded data URLs with `registry`
///
/// # Errors
///
/// Returns error if a data URL cannot be decoded
pub fn normalize(source: ReplaySource, registry: &Arc<ObjectUrlRegistry>) -> Result<PlayableSource> {
    match source {
        ReplaySource::Blob(blob) => Ok(PlayableSource::Owned(registry.register(blob))),
        ReplaySource::Url(url) => {
            if ["blob:", "http://", "https://"]
                .iter()
                .any(|scheme| url.starts_with(scheme))
            {
                Ok(PlayableSource::External(url))
            } else if url.starts_with("data:") {
                let blob = decode_data_url(&url)?;
                Ok(PlayableSource::Owned(registry.register(blob)))
            } else {
                Ok(PlayableSource::External(url))
            }
        }
    }
}
