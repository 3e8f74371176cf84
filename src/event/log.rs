//! Append-only event arena for the active session

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::clock::SessionClock;

use super::stringify::{safe_stringify, stringify_args};
use super::types::{Event, EventKind, NetworkEvent};

/// Address of an appended event.
///
/// Stays valid only while its session is the active one; lookups for
/// other sessions resolve to nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId {
    session: u64,
    index: usize,
}

impl EventId {
    /// Session the event was appended to
    #[must_use]
    pub fn session(&self) -> u64 {
        self.session
    }

    /// Position within that session
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Event arena shared by all interceptors
#[derive(Debug, Default)]
pub struct EventLog {
    inner: Mutex<LogInner>,
}

#[derive(Debug, Default)]
struct LogInner {
    next_session: u64,
    active: Option<ActiveSession>,
}

#[derive(Debug)]
struct ActiveSession {
    id: u64,
    clock: SessionClock,
    events: Vec<Event>,
}

impl EventLog {
    /// Create an empty log with no active session
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new session, discarding anything left from a previous one
    pub fn begin(&self, clock: SessionClock) -> u64 {
        let mut inner = self.inner.lock();
        inner.next_session += 1;
        let id = inner.next_session;
        inner.active = Some(ActiveSession {
            id,
            clock,
            events: Vec::new(),
        });
        id
    }

    /// Copy out the session's events and end it.
    ///
    /// Appends and completions arriving afterwards are dropped.
    pub fn finish(&self) -> Vec<Event> {
        self.inner
            .lock()
            .active
            .take()
            .map(|session| session.events)
            .unwrap_or_default()
    }

    /// Id of the active session
    #[must_use]
    pub fn active_session(&self) -> Option<u64> {
        self.inner.lock().active.as_ref().map(|s| s.id)
    }

    /// Append an event built from the current timestamp.
    ///
    /// The timestamp is read under the same lock as the push, so emission
    /// order and timestamp order agree.
    pub fn append(&self, session: u64, build: impl FnOnce(u64) -> Event) -> Option<EventId> {
        let mut inner = self.inner.lock();
        let active = inner.active.as_mut().filter(|a| a.id == session)?;
        let timestamp = active.clock.now_ms();
        active.events.push(build(timestamp));
        Some(EventId {
            session,
            index: active.events.len() - 1,
        })
    }

    /// Mutate a previously appended event in place.
    ///
    /// Returns `false` when the event's session has ended.
    pub fn update(&self, id: EventId, apply: impl FnOnce(&mut Event)) -> bool {
        let mut inner = self.inner.lock();
        let Some(event) = inner
            .active
            .as_mut()
            .filter(|a| a.id == id.session)
            .and_then(|a| a.events.get_mut(id.index))
        else {
            return false;
        };
        apply(event);
        true
    }

    /// Copy of the active session's events
    #[must_use]
    pub fn snapshot(&self) -> Vec<Event> {
        self.inner
            .lock()
            .active
            .as_ref()
            .map(|a| a.events.clone())
            .unwrap_or_default()
    }

    /// Number of events in the active session
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().active.as_ref().map_or(0, |a| a.events.len())
    }

    /// Whether the active session has no events
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-type event counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EventSummary {
    counts: BTreeMap<String, usize>,
}

impl EventSummary {
    /// Count events by type
    #[must_use]
    pub fn from_events(events: &[Event]) -> Self {
        let mut by_kind: BTreeMap<EventKind, usize> = BTreeMap::new();
        for event in events {
            *by_kind.entry(event.kind()).or_default() += 1;
        }
        Self {
            counts: by_kind
                .into_iter()
                .map(|(kind, n)| (kind.to_string(), n))
                .collect(),
        }
    }

    /// Count for one type
    #[must_use]
    pub fn count(&self, kind: EventKind) -> usize {
        self.counts.get(&kind.to_string()).copied().unwrap_or(0)
    }

    /// Total events
    #[must_use]
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// Counts keyed by type name
    #[must_use]
    pub fn counts(&self) -> &BTreeMap<String, usize> {
        &self.counts
    }
}

/// An interceptor's handle into the log, bound to one session
#[derive(Debug, Clone)]
pub struct EventSink {
    log: Arc<EventLog>,
    session: u64,
    max_len: usize,
}

impl EventSink {
    /// Bind a sink to `session`
    #[must_use]
    pub fn new(log: Arc<EventLog>, session: u64, max_len: usize) -> Self {
        Self {
            log,
            session,
            max_len,
        }
    }

    /// Session this sink writes to
    #[must_use]
    pub fn session(&self) -> u64 {
        self.session
    }

    /// Whether appends through this sink still land
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.log.active_session() == Some(self.session)
    }

    /// Append an event; `None` once the session has ended
    pub fn record(&self, build: impl FnOnce(u64) -> Event) -> Option<EventId> {
        self.log.append(self.session, build)
    }

    /// Complete a pending network event in place
    pub fn complete_network(&self, id: EventId, apply: impl FnOnce(&mut NetworkEvent)) {
        let applied = self.log.update(id, |event| {
            if let Event::Network(network) = event {
                apply(network);
            }
        });
        if !applied {
            debug!(
                session = id.session(),
                index = id.index(),
                "network completion arrived after its session ended"
            );
        }
    }

    /// Capped serialization of any value
    pub fn stringify<T: Serialize + Debug + ?Sized>(&self, value: &T) -> String {
        safe_stringify(value, self.max_len)
    }

    /// Capped serialization of console arguments
    #[must_use]
    pub fn stringify_args(&self, args: &[Value]) -> String {
        stringify_args(args, self.max_len)
    }
}
