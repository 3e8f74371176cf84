//! Aligns a recorded event timeline with video playback position

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::event::Event;
use crate::recorder::Artifact;
use crate::Result;

use super::source::{normalize, ObjectUrlRegistry, PlayableSource, ReplaySource};

/// Indices of the events visible at `position_secs`.
///
/// For any positive position an event is visible once playback has reached
/// its timestamp (`timestamp <= position`). Position zero, negative or NaN is
/// treated as "not started" and shows nothing, so an event stamped at 0 ms is
/// hidden at position zero even though its timestamp has been reached. It
/// appears as soon as the position moves past zero.
#[must_use]
pub fn visible_at(events: &[Event], position_secs: f64) -> Vec<usize> {
    if position_secs.is_nan() || position_secs <= 0.0 {
        return Vec::new();
    }
    let position_ms = position_secs * 1000.0;
    events
        .iter()
        .enumerate()
        .filter(|(_, event)| event.timestamp() as f64 <= position_ms)
        .map(|(i, _)| i)
        .collect()
}

/// Render seconds as `m:ss`
#[must_use]
pub fn format_time(secs: f64) -> String {
    if !secs.is_finite() || secs < 0.0 {
        return "0:00".to_string();
    }
    #[allow(clippy::cast_sign_loss)]
    let whole = secs.floor() as u64;
    format!("{}:{:02}", whole / 60, whole % 60)
}

/// Snapshot of the replay at the current playback position
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayView<'a> {
    /// Events that have happened by `current_time`
    pub visible_events: Vec<&'a Event>,
    /// Playback position in seconds
    pub current_time: f64,
    /// Media duration in seconds, zero until known
    pub duration: f64,
    /// Position as a percentage of `duration`
    pub progress: f64,
}

/// Replay of one artifact: the playable source plus the event filter
pub struct ReplayCorrelator {
    registry: Arc<ObjectUrlRegistry>,
    source: Option<PlayableSource>,
    events: Vec<Event>,
    visible: Vec<usize>,
    current_time: f64,
    duration: f64,
}

impl ReplayCorrelator {
    /// Empty replay issuing object URLs from `registry`
    #[must_use]
    pub fn new(registry: Arc<ObjectUrlRegistry>) -> Self {
        Self {
            registry,
            source: None,
            events: Vec::new(),
            visible: Vec::new(),
            current_time: 0.0,
            duration: 0.0,
        }
    }

    /// Replace the source and timeline, rewinding to the start.
    ///
    /// The previous source is released first.
    ///
    /// # Errors
    ///
    /// Returns error if `source` is a malformed data URL; the replay is then
    /// left without a source but keeps `events`
    pub fn load(&mut self, source: Option<ReplaySource>, events: Vec<Event>) -> Result<()> {
        self.release();
        self.events = events;
        self.current_time = 0.0;
        self.duration = 0.0;
        self.recompute();

        if let Some(source) = source {
            match normalize(source, &self.registry) {
                Ok(playable) => {
                    debug!(url = playable.url(), events = self.events.len(), "replay loaded");
                    self.source = Some(playable);
                }
                Err(e) => {
                    warn!("replay source rejected: {e}");
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Load a recorder artifact
    ///
    /// # Errors
    ///
    /// Never fails for in-memory video; see [`ReplayCorrelator::load`]
    pub fn load_artifact(&mut self, artifact: &Artifact) -> Result<()> {
        self.load(
            artifact.video.clone().map(ReplaySource::Blob),
            artifact.events.clone(),
        )
    }

    /// Drop the current source, revoking its object URL if owned
    pub fn release(&mut self) {
        if let Some(source) = self.source.take() {
            debug!(url = source.url(), "replay source released");
        }
    }

    /// URL for the player, if a source is loaded
    #[must_use]
    pub fn source_url(&self) -> Option<&str> {
        self.source.as_ref().map(PlayableSource::url)
    }

    /// The full timeline
    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Media duration became known
    pub fn set_duration(&mut self, secs: f64) {
        self.duration = if secs.is_finite() && secs > 0.0 { secs } else { 0.0 };
    }

    /// Playback position changed
    pub fn on_time_update(&mut self, secs: f64) {
        self.current_time = if secs.is_nan() { 0.0 } else { secs.max(0.0) };
        self.recompute();
    }

    /// Jump to `secs`, clamped to the known duration
    pub fn seek(&mut self, secs: f64) {
        let target = if self.duration > 0.0 {
            secs.min(self.duration)
        } else {
            secs
        };
        self.on_time_update(target);
    }

    /// Jump to `fraction` of the duration; no-op until the duration is known
    pub fn seek_fraction(&mut self, fraction: f64) {
        if self.duration > 0.0 {
            self.seek(fraction.clamp(0.0, 1.0) * self.duration);
        }
    }

    /// Events visible at the current position
    pub fn visible_events(&self) -> impl Iterator<Item = &Event> {
        self.visible.iter().map(|&i| &self.events[i])
    }

    /// Current view
    #[must_use]
    pub fn view(&self) -> ReplayView<'_> {
        let progress = if self.duration > 0.0 {
            self.current_time / self.duration * 100.0
        } else {
            0.0
        };
        ReplayView {
            visible_events: self.visible_events().collect(),
            current_time: self.current_time,
            duration: self.duration,
            progress,
        }
    }

    fn recompute(&mut self) {
        self.visible = visible_at(&self.events, self.current_time);
    }
}

impl Default for ReplayCorrelator {
    fn default() -> Self {
        Self::new(ObjectUrlRegistry::new())
    }
}

impl std::fmt::Debug for ReplayCorrelator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayCorrelator")
            .field("source", &self.source_url())
            .field("events", &self.events.len())
            .field("visible", &self.visible.len())
            .field("current_time", &self.current_time)
            .finish_non_exhaustive()
    }
}
