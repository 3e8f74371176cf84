use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::clock::duration_ms;
use crate::event::{Event, EventId, EventSink, NetworkEvent, NetworkSource};
use crate::host::{Body, Headers, XhrEventKind, XhrPrototype, XmlHttpRequest};

use super::{body_text, parse_raw_headers, payload, UNREADABLE_REQUEST_BODY, XHR_NETWORK_ERROR};

/// The request an instance is waiting on
#[derive(Debug, Clone)]
struct InFlight {
    id: EventId,
    started: Instant,
    sink: EventSink,
}

/// Per-instance request data stashed by the wrapper
#[derive(Debug, Clone, Default)]
struct XhrTrace {
    method: Option<String>,
    url: Option<String>,
    headers: Headers,
    in_flight: Option<InFlight>,
    listening: bool,
}

/// XHR prototype wrapper installed by the network interceptor
pub(super) struct RecordingXhr {
    original: Arc<dyn XhrPrototype>,
    sink: EventSink,
}

impl RecordingXhr {
    pub(super) fn new(original: Arc<dyn XhrPrototype>, sink: EventSink) -> Self {
        Self { original, sink }
    }
}

/// Take the pending request off the instance, if any
fn settle(xhr: &XmlHttpRequest) -> Option<InFlight> {
    xhr.with_extension_mut::<XhrTrace, _>(|trace| trace.in_flight.take())
        .flatten()
}

fn on_load(xhr: &XmlHttpRequest) {
    let Some(InFlight { id, started, sink }) = settle(xhr) else {
        return;
    };
    let duration = duration_ms(started.elapsed());
    let headers = parse_raw_headers(&xhr.get_all_response_headers());
    let response = payload(&sink, &headers, xhr.response_text().as_deref());
    let status = xhr.status();
    let status_text = xhr.status_text();
    sink.complete_network(id, |event| {
        event.complete(status, status_text, duration, response);
    });
    debug!(status, "XHR completed");
}

fn on_error(xhr: &XmlHttpRequest) {
    let Some(InFlight { id, started, sink }) = settle(xhr) else {
        return;
    };
    let duration = duration_ms(started.elapsed());
    sink.complete_network(id, |event| {
        event.fail(XHR_NETWORK_ERROR.to_string(), duration);
    });
}

impl XhrPrototype for RecordingXhr {
    fn open(&self, xhr: &XmlHttpRequest, method: &str, url: &str) {
        let reopened = xhr.with_extension_mut::<XhrTrace, _>(|trace| {
            trace.method = Some(method.to_string());
            trace.url = Some(url.to_string());
            trace.headers.clear();
            trace.in_flight = None;
        });
        if reopened.is_none() {
            xhr.insert_extension(XhrTrace {
                method: Some(method.to_string()),
                url: Some(url.to_string()),
                ..XhrTrace::default()
            });
        }
        self.original.open(xhr, method, url);
    }

    fn set_request_header(&self, xhr: &XmlHttpRequest, name: &str, value: &str) {
        xhr.with_extension_mut::<XhrTrace, _>(|trace| {
            match trace.headers.iter_mut().find(|(n, _)| n == name) {
                Some(existing) => existing.1 = value.to_string(),
                None => trace.headers.push((name.to_string(), value.to_string())),
            }
        });
        self.original.set_request_header(xhr, name, value);
    }

    fn send(&self, xhr: &XmlHttpRequest, body: Option<Body>) {
        let trace = xhr.extension::<XhrTrace>().unwrap_or_default();
        let method = trace.method.clone().unwrap_or_else(|| "GET".to_string());
        let url = trace.url.clone().unwrap_or_default();
        let request_body = body.as_ref().map(|b| body_text(b, UNREADABLE_REQUEST_BODY));
        let request = payload(&self.sink, &trace.headers, request_body.as_deref());

        debug!(%method, %url, "captured XHR");
        let id = self.sink.record(|timestamp| {
            Event::Network(NetworkEvent::issued(
                NetworkSource::Xhr,
                method,
                url,
                timestamp,
                request,
            ))
        });

        if let Some(id) = id {
            let in_flight = InFlight {
                id,
                started: Instant::now(),
                sink: self.sink.clone(),
            };
            if !trace.listening {
                xhr.add_event_listener(XhrEventKind::Load, on_load);
                xhr.add_event_listener(XhrEventKind::Error, on_error);
            }
            xhr.insert_extension(XhrTrace {
                in_flight: Some(in_flight),
                listening: true,
                ..trace
            });
        }

        self.original.send(xhr, body);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SessionClock;
    use crate::event::{EventLog, NetworkStatus};
    use crate::host::{Capability, XhrResponse};
    use parking_lot::Mutex;

    /// Transport that records sends and settles only when told to
    #[derive(Default)]
    struct ManualXhr {
        sent: Mutex<Vec<XmlHttpRequest>>,
    }

    impl XhrPrototype for ManualXhr {
        fn open(&self, xhr: &XmlHttpRequest, method: &str, url: &str) {
            xhr.set_target(method, url);
        }

        fn set_request_header(&self, xhr: &XmlHttpRequest, name: &str, value: &str) {
            xhr.append_request_header(name, value);
        }

        fn send(&self, xhr: &XmlHttpRequest, _body: Option<Body>) {
            xhr.mark_sent();
            self.sent.lock().push(xhr.clone());
        }
    }

    fn setup() -> (Arc<EventLog>, Arc<Capability<dyn XhrPrototype>>) {
        let log = Arc::new(EventLog::new());
        let session = log.begin(SessionClock::start());
        let sink = EventSink::new(Arc::clone(&log), session, 500);
        let slot: Arc<Capability<dyn XhrPrototype>> = Arc::new(Capability::new(Arc::new(
            RecordingXhr::new(Arc::new(ManualXhr::default()), sink),
        )));
        (log, slot)
    }

    #[test]
    fn test_load_completes_with_parsed_headers() {
        let (log, slot) = setup();
        let xhr = XmlHttpRequest::new(slot);
        let caller_saw = Arc::new(Mutex::new(None));
        let seen = Arc::clone(&caller_saw);
        xhr.add_event_listener(XhrEventKind::Load, move |req| {
            *seen.lock() = Some(req.status());
        });

        xhr.open("POST", "/api/save");
        xhr.set_request_header("Content-Type", "text/plain");
        xhr.send(Some(Body::from("hi")));

        let pending = log.snapshot();
        assert!(!pending[0].as_network().unwrap().is_settled());

        xhr.complete(XhrResponse {
            status: 200,
            status_text: "OK".to_string(),
            headers: vec![("Content-Type".to_string(), "text/plain".to_string())],
            text: Some("done".to_string()),
        });

        assert_eq!(*caller_saw.lock(), Some(200));
        let events = log.snapshot();
        let event = events[0].as_network().unwrap();
        assert_eq!(event.source, NetworkSource::Xhr);
        assert_eq!(event.request.headers, r#"{"Content-Type":"text/plain"}"#);
        assert_eq!(event.request.body, r#""hi""#);
        assert_eq!(event.status, Some(NetworkStatus::Code(200)));
        let response = event.response.as_ref().unwrap();
        assert_eq!(response.headers, r#"{"content-type":"text/plain"}"#);
        assert_eq!(response.body, r#""done""#);
    }

    #[test]
    fn test_error_records_network_error() {
        let (log, slot) = setup();
        let xhr = XmlHttpRequest::new(slot);
        xhr.open("GET", "/api/down");
        xhr.send(None);
        xhr.fail();

        let events = log.snapshot();
        let event = events[0].as_network().unwrap();
        assert_eq!(event.request.body, "null");
        assert_eq!(event.status, Some(NetworkStatus::Error));
        assert_eq!(event.error.as_deref(), Some(XHR_NETWORK_ERROR));
    }

    #[test]
    fn test_reused_instance_completes_only_latest_request() {
        let (log, slot) = setup();
        let xhr = XmlHttpRequest::new(slot);

        xhr.open("GET", "/first");
        xhr.send(None);
        xhr.fail();

        xhr.open("GET", "/second");
        xhr.send(None);
        xhr.complete(XhrResponse {
            status: 204,
            ..XhrResponse::default()
        });

        let events = log.snapshot();
        assert_eq!(events[0].as_network().unwrap().status, Some(NetworkStatus::Error));
        assert_eq!(events[1].as_network().unwrap().status, Some(NetworkStatus::Code(204)));
    }

    #[test]
    fn test_unreadable_response_text_is_null() {
        let (log, slot) = setup();
        let xhr = XmlHttpRequest::new(slot);
        xhr.open("GET", "/api/blob");
        xhr.send(None);
        xhr.complete(XhrResponse {
            status: 200,
            text: None,
            ..XhrResponse::default()
        });

        let events = log.snapshot();
        let response = events[0].as_network().unwrap().response.clone().unwrap();
        assert_eq!(response.body, "null");
        assert_eq!(response.headers, "{}");
    }

    #[test]
    fn test_listeners_registered_once_per_instance() {
        let (log, slot) = setup();
        let xhr = XmlHttpRequest::new(slot);

        for i in 0..4 {
            xhr.open("GET", &format!("/poll/{i}"));
            xhr.send(None);
            xhr.complete(XhrResponse {
                status: 200,
                text: Some("ok".to_string()),
                ..XhrResponse::default()
            });
        }

        assert_eq!(xhr.listener_count(), 2);
        let events = log.snapshot();
        assert_eq!(events.len(), 4);
        assert!(events
            .iter()
            .all(|e| e.as_network().unwrap().status == Some(NetworkStatus::Code(200))));
    }
}
