//! Sessiontap - in-page session recorder and replay correlator
//!
//! Wraps host console, network, storage and `IndexedDB` capabilities to
//! build a timeline of events alongside a screen capture, then lines the
//! timeline up with video playback.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::cargo)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::field_reassign_with_default,
    clippy::multiple_crate_versions
)]

pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod host;
pub mod intercept;
pub mod media;
pub mod recorder;
pub mod replay;

pub use error::{Result, TapError};
