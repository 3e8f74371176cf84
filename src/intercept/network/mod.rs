//! fetch and XMLHttpRequest interception
//!
//! A request event is appended when the call is issued and completed in
//! place, by id, once the request settles.

mod fetch;
mod xhr;

use std::sync::Arc;

use crate::event::stringify::headers_object;
use crate::event::{EventSink, HttpPayload};
use crate::host::{Body, FetchApi, HostEnvironment, XhrPrototype};

use super::Interceptor;

/// Recorded in place of a request body that cannot be read
pub const UNREADABLE_REQUEST_BODY: &str = "[Could not read or clone request body]";

/// Recorded in place of a response body that cannot be read
pub const UNREADABLE_RESPONSE_BODY: &str = "[Could not read response body]";

/// Recorded as the error of a failed XHR
pub const XHR_NETWORK_ERROR: &str = "Network error";

/// Records fetch calls and XHR sends
#[derive(Default)]
pub struct NetworkInterceptor {
    fetch: Option<Arc<dyn FetchApi>>,
    xhr: Option<Arc<dyn XhrPrototype>>,
}

impl NetworkInterceptor {
    /// Uninstalled interceptor
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Interceptor for NetworkInterceptor {
    fn name(&self) -> &'static str {
        "network"
    }

    fn install(&mut self, host: &HostEnvironment, sink: &EventSink) {
        if self.is_installed() {
            return;
        }
        self.fetch = Some(
            host.fetch_capability()
                .wrap(|original| Arc::new(fetch::RecordingFetch::new(original, sink.clone()))),
        );
        self.xhr = Some(
            host.xhr_prototype()
                .wrap(|original| Arc::new(xhr::RecordingXhr::new(original, sink.clone()))),
        );
    }

    fn uninstall(&mut self, host: &HostEnvironment) {
        if let Some(original) = self.fetch.take() {
            host.fetch_capability().replace(original);
        }
        if let Some(original) = self.xhr.take() {
            host.xhr_prototype().replace(original);
        }
    }

    fn is_installed(&self) -> bool {
        self.fetch.is_some() || self.xhr.is_some()
    }
}

/// Text of a body, or `placeholder` if it cannot be read
fn body_text(body: &Body, placeholder: &str) -> String {
    body.text().unwrap_or_else(|| placeholder.to_string())
}

/// Serialized headers and body of one side of an exchange
fn payload(sink: &EventSink, headers: &[(String, String)], body: Option<&str>) -> HttpPayload {
    HttpPayload {
        headers: sink.stringify(&headers_object(headers)),
        body: sink.stringify(&body),
    }
}

/// Parse a raw `Name: value\r\n` header block.
///
/// Names are lowercased; lines without `": "` are skipped; values keep any
/// further `": "` they contain.
#[must_use]
pub fn parse_raw_headers(raw: &str) -> Vec<(String, String)> {
    raw.trim()
        .split("\r\n")
        .filter_map(|line| line.split_once(": "))
        .filter(|(name, _)| !name.is_empty())
        .map(|(name, value)| (name.to_lowercase(), value.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_raw_headers() {
        let raw = "Content-Type: application/json\r\nX-Note: a: b\r\n\r\nbroken-line\r\n";
        assert_eq!(
            parse_raw_headers(raw),
            vec![
                ("content-type".to_string(), "application/json".to_string()),
                ("x-note".to_string(), "a: b".to_string()),
            ]
        );
        assert!(parse_raw_headers("").is_empty());
    }

    #[test]
    fn test_missing_body_serializes_as_null() {
        let log = std::sync::Arc::new(crate::event::EventLog::new());
        let sink = EventSink::new(log, 1, 500);
        let p = payload(&sink, &[], None);
        assert_eq!(p.body, "null");
        assert_eq!(p.headers, "{}");
    }
}
