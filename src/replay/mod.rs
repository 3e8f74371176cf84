//! Replay of a recorded artifact against video playback

mod correlator;
mod source;

pub use correlator::{format_time, visible_at, ReplayCorrelator, ReplayView};
pub use source::{
    decode_data_url, normalize, ObjectUrl, ObjectUrlRegistry, PlayableSource, ReplaySource,
    OBJECT_URL_PREFIX,
};
