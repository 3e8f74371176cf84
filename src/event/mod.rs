//! Event timeline model
//!
//! Interceptors append [`Event`]s to the shared [`EventLog`] through an
//! [`EventSink`]; every event carries milliseconds since session start.

mod log;
pub mod stringify;
mod types;

pub use log::{EventId, EventLog, EventSink, EventSummary};
pub use stringify::{safe_stringify, DEFAULT_MAX_LEN, TRUNCATION_MARKER};
pub use types::{
    ConsoleEvent, ConsoleLevel, Event, EventKind, HttpPayload, IdbAction, IdbMode,
    IndexedDbEvent, NetworkEvent, NetworkSource, NetworkStatus, StorageAction, StorageEvent,
    StorageType,
};
