//! Media capture: host device traits, encoder plumbing and the capture
//! state machine

mod blob;
mod controller;
mod device;

pub use blob::VideoBlob;
pub use controller::{
    CaptureSettings, CaptureStarted, CaptureStatus, MediaCaptureController, PendingStop,
};
pub use device::{
    AudioConstraints, DisplayConstraints, EncoderEvent, EncoderFactory, EncoderState, MediaDevices,
    MediaEncoder, MediaStream, MediaTrack, TrackKind,
};
