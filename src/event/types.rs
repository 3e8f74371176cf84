//! Event timeline records

use std::fmt;

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// One timestamped record of an intercepted host action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Event {
    /// Console output
    Console(ConsoleEvent),
    /// fetch or XHR request
    Network(NetworkEvent),
    /// localStorage / sessionStorage mutation
    Storage(StorageEvent),
    /// IndexedDB open, transaction or object store mutation
    #[serde(rename = "indexedDB")]
    IndexedDb(IndexedDbEvent),
}

impl Event {
    /// Milliseconds since the session started
    #[must_use]
    pub fn timestamp(&self) -> u64 {
        match self {
            Self::Console(e) => e.timestamp,
            Self::Network(e) => e.timestamp,
            Self::Storage(e) => e.timestamp,
            Self::IndexedDb(e) => e.timestamp,
        }
    }

    /// Discriminant without payload
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Console(_) => EventKind::Console,
            Self::Network(_) => EventKind::Network,
            Self::Storage(_) => EventKind::Storage,
            Self::IndexedDb(_) => EventKind::IndexedDb,
        }
    }

    /// Network payload, if this is a network event
    #[must_use]
    pub fn as_network(&self) -> Option<&NetworkEvent> {
        match self {
            Self::Network(e) => Some(e),
            _ => None,
        }
    }
}

/// Event type without payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    /// Console output
    Console,
    /// Network request
    Network,
    /// Web storage mutation
    Storage,
    /// IndexedDB action
    IndexedDb,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Console => write!(f, "console"),
            Self::Network => write!(f, "network"),
            Self::Storage => write!(f, "storage"),
            Self::IndexedDb => write!(f, "indexedDB"),
        }
    }
}

/// Console log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    /// `console.log`
    Log,
    /// `console.warn`
    Warn,
    /// `console.error`
    Error,
    /// `console.info`
    Info,
    /// `console.debug`
    Debug,
}

impl ConsoleLevel {
    /// Every level, in slot order
    pub const ALL: [Self; 5] = [Self::Log, Self::Warn, Self::Error, Self::Info, Self::Debug];

    /// Slot index of this level
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::Log => 0,
            Self::Warn => 1,
            Self::Error => 2,
            Self::Info => 3,
            Self::Debug => 4,
        }
    }

    /// Method name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Info => "info",
            Self::Debug => "debug",
        }
    }
}

impl fmt::Display for ConsoleLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Console output record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleEvent {
    /// Level the host logged at
    pub level: ConsoleLevel,
    /// Stringified arguments joined by spaces
    pub message: String,
    /// Milliseconds since session start
    pub timestamp: u64,
}

/// Which network API issued a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkSource {
    /// `fetch`
    Fetch,
    /// `XMLHttpRequest`
    Xhr,
}

/// Serialized headers and body of one side of an exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpPayload {
    /// JSON object of header name to value, capped
    pub headers: String,
    /// JSON-encoded body, capped
    pub body: String,
}

/// Outcome of a network request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    /// HTTP status code
    Code(u16),
    /// Transport failure, serialized as `"error"`
    Error,
}

impl Serialize for NetworkStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Code(code) => serializer.serialize_u16(*code),
            Self::Error => serializer.serialize_str("error"),
        }
    }
}

impl<'de> Deserialize<'de> for NetworkStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Code(u16),
            Label(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Code(code) => Ok(Self::Code(code)),
            Raw::Label(label) if label == "error" => Ok(Self::Error),
            Raw::Label(other) => Err(de::Error::custom(format!(
                "unknown network status '{other}'"
            ))),
        }
    }
}

/// Network request record.
///
/// Appended when the request is issued; the response fields are filled in
/// later, in place, when the request settles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkEvent {
    /// Issuing API
    pub source: NetworkSource,
    /// HTTP method
    pub method: String,
    /// Request URL
    pub url: String,
    /// Milliseconds since session start, at issuance
    pub timestamp: u64,
    /// Request headers and body
    pub request: HttpPayload,
    /// Response status, once settled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<NetworkStatus>,
    /// Response status text, once settled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    /// Milliseconds between issuance and settlement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    /// Failure message for transport errors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Response headers and body, once settled successfully
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<HttpPayload>,
}

impl NetworkEvent {
    /// Request-only record, as emitted at call time
    #[must_use]
    pub fn issued(
        source: NetworkSource,
        method: String,
        url: String,
        timestamp: u64,
        request: HttpPayload,
    ) -> Self {
        Self {
            source,
            method,
            url,
            timestamp,
            request,
            status: None,
            status_text: None,
            duration: None,
            error: None,
            response: None,
        }
    }

    /// Fill in a successful response
    pub fn complete(
        &mut self,
        status: u16,
        status_text: String,
        duration: u64,
        response: HttpPayload,
    ) {
        self.status = Some(NetworkStatus::Code(status));
        self.status_text = Some(status_text);
        self.duration = Some(duration);
        self.response = Some(response);
    }

    /// Fill in a transport failure
    pub fn fail(&mut self, error: String, duration: u64) {
        self.status = Some(NetworkStatus::Error);
        self.error = Some(error);
        self.duration = Some(duration);
    }

    /// Whether the request has settled
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.status.is_some()
    }
}

/// Which web storage area a mutation touched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageType {
    /// The host's persistent area
    #[serde(rename = "localStorage")]
    Local,
    /// The host's per-tab area
    #[serde(rename = "sessionStorage")]
    Session,
    /// Any other area sharing the prototype
    #[serde(rename = "unknown")]
    Unknown,
}

/// Web storage mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StorageAction {
    /// `setItem`
    SetItem,
    /// `removeItem`
    RemoveItem,
    /// `clear`
    Clear,
}

/// Web storage mutation record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageEvent {
    /// Area that was mutated
    pub storage_type: StorageType,
    /// Mutation performed
    pub action: StorageAction,
    /// Affected key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Stringified new value (setItem only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Milliseconds since session start
    pub timestamp: u64,
}

/// IndexedDB action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdbAction {
    /// `indexedDB.open`
    Open,
    /// `db.transaction`
    Transaction,
    /// `store.add`
    Add,
    /// `store.put`
    Put,
    /// `store.delete`
    Delete,
    /// `store.clear`
    Clear,
}

/// IndexedDB transaction mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdbMode {
    /// Reads only
    #[default]
    Readonly,
    /// Reads and writes
    Readwrite,
}

/// IndexedDB action record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexedDbEvent {
    /// Action performed
    pub action: IdbAction,
    /// Database name
    pub db_name: String,
    /// Object store, for store mutations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_name: Option<String>,
    /// Scope of a transaction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_names: Option<Vec<String>>,
    /// Mode of a transaction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<IdbMode>,
    /// Requested version on open
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    /// Stringified value (add/put) or key (delete)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// Milliseconds since session start
    pub timestamp: u64,
}

impl IndexedDbEvent {
    /// Record with only the action and database set
    #[must_use]
    pub fn new(action: IdbAction, db_name: String, timestamp: u64) -> Self {
        Self {
            action,
            db_name,
            store_name: None,
            store_names: None,
            mode: None,
            version: None,
            data: None,
            timestamp,
        }
    }
}
