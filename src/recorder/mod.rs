//! Session recorder: ties capture, timeline and interceptors together

mod session;

pub use crate::event::EventSummary;
pub use session::{Artifact, SessionRecorder};
