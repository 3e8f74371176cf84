//! XMLHttpRequest capability
//!
//! Request instances share one swappable [`XhrPrototype`]; per-instance state
//! (target, headers, response, listeners) lives on [`XmlHttpRequest`].

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use super::capability::Capability;
use super::fetch::{Body, FetchApi, FetchInput, Headers, HttpRequest};

/// Shared behaviour of every request instance
pub trait XhrPrototype: Send + Sync {
    /// `xhr.open(method, url)`
    fn open(&self, xhr: &XmlHttpRequest, method: &str, url: &str);
    /// `xhr.setRequestHeader(name, value)`
    fn set_request_header(&self, xhr: &XmlHttpRequest, name: &str, value: &str);
    /// `xhr.send(body)`
    fn send(&self, xhr: &XmlHttpRequest, body: Option<Body>);
}

/// Events a request dispatches to its listeners
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XhrEventKind {
    /// Response received
    Load,
    /// Transport failure
    Error,
}

/// Lifecycle of a request instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    /// Created, not opened
    Unsent,
    /// `open` called
    Opened,
    /// `send` called, waiting
    Loading,
    /// Settled
    Done,
}

/// Response delivered to a request instance
#[derive(Debug, Clone, Default)]
pub struct XhrResponse {
    /// HTTP status code
    pub status: u16,
    /// Reason phrase
    pub status_text: String,
    /// Response headers
    pub headers: Headers,
    /// Response text, `None` if it cannot be read
    pub text: Option<String>,
}

type Listener = Arc<dyn Fn(&XmlHttpRequest) + Send + Sync>;

/// One request instance
#[derive(Clone)]
pub struct XmlHttpRequest {
    inner: Arc<XhrInner>,
}

struct XhrInner {
    prototype: Arc<Capability<dyn XhrPrototype>>,
    state: Mutex<XhrState>,
    listeners: Mutex<Vec<(XhrEventKind, Listener)>>,
    extensions: Mutex<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
}

#[derive(Debug)]
struct XhrState {
    ready_state: ReadyState,
    method: Option<String>,
    url: Option<String>,
    request_headers: Headers,
    response: Option<XhrResponse>,
}

impl XmlHttpRequest {
    /// New instance dispatching through `prototype`
    #[must_use]
    pub fn new(prototype: Arc<Capability<dyn XhrPrototype>>) -> Self {
        Self {
            inner: Arc::new(XhrInner {
                prototype,
                state: Mutex::new(XhrState {
                    ready_state: ReadyState::Unsent,
                    method: None,
                    url: None,
                    request_headers: Vec::new(),
                    response: None,
                }),
                listeners: Mutex::new(Vec::new()),
                extensions: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// `open`, via the prototype
    pub fn open(&self, method: &str, url: &str) {
        self.inner.prototype.get().open(self, method, url);
    }

    /// `setRequestHeader`, via the prototype
    pub fn set_request_header(&self, name: &str, value: &str) {
        self.inner.prototype.get().set_request_header(self, name, value);
    }

    /// `send`, via the prototype
    pub fn send(&self, body: Option<Body>) {
        self.inner.prototype.get().send(self, body);
    }

    /// Register a listener
    pub fn add_event_listener(
        &self,
        kind: XhrEventKind,
        listener: impl Fn(&XmlHttpRequest) + Send + Sync + 'static,
    ) {
        self.inner.listeners.lock().push((kind, Arc::new(listener)));
    }

    /// Number of registered listeners
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    /// Record the target of the request (native `open` behaviour)
    pub fn set_target(&self, method: &str, url: &str) {
        let mut state = self.inner.state.lock();
        state.method = Some(method.to_string());
        state.url = Some(url.to_string());
        state.request_headers.clear();
        state.response = None;
        state.ready_state = ReadyState::Opened;
    }

    /// Add a request header (native `setRequestHeader` behaviour)
    pub fn append_request_header(&self, name: &str, value: &str) {
        self.inner
            .state
            .lock()
            .request_headers
            .push((name.to_string(), value.to_string()));
    }

    /// Mark the request in flight (native `send` behaviour)
    pub fn mark_sent(&self) {
        self.inner.state.lock().ready_state = ReadyState::Loading;
    }

    /// Deliver a response and dispatch `load`
    pub fn complete(&self, response: XhrResponse) {
        {
            let mut state = self.inner.state.lock();
            state.response = Some(response);
            state.ready_state = ReadyState::Done;
        }
        self.dispatch(XhrEventKind::Load);
    }

    /// Settle as a transport failure and dispatch `error`
    pub fn fail(&self) {
        self.inner.state.lock().ready_state = ReadyState::Done;
        self.dispatch(XhrEventKind::Error);
    }

    fn dispatch(&self, kind: XhrEventKind) {
        // Listeners may register more listeners
        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .lock()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(self);
        }
    }

    /// Current lifecycle state
    #[must_use]
    pub fn ready_state(&self) -> ReadyState {
        self.inner.state.lock().ready_state
    }

    /// Method given to `open`
    #[must_use]
    pub fn method(&self) -> Option<String> {
        self.inner.state.lock().method.clone()
    }

    /// URL given to `open`
    #[must_use]
    pub fn url(&self) -> Option<String> {
        self.inner.state.lock().url.clone()
    }

    /// Headers set since `open`
    #[must_use]
    pub fn request_headers(&self) -> Headers {
        self.inner.state.lock().request_headers.clone()
    }

    /// Response status, 0 until loaded
    #[must_use]
    pub fn status(&self) -> u16 {
        self.inner.state.lock().response.as_ref().map_or(0, |r| r.status)
    }

    /// Response reason phrase
    #[must_use]
    pub fn status_text(&self) -> String {
        self.inner
            .state
            .lock()
            .response
            .as_ref()
            .map(|r| r.status_text.clone())
            .unwrap_or_default()
    }

    /// Response text, `None` if not readable
    #[must_use]
    pub fn response_text(&self) -> Option<String> {
        self.inner
            .state
            .lock()
            .response
            .as_ref()
            .and_then(|r| r.text.clone())
    }

    /// Raw `Name: value\r\n` header block
    #[must_use]
    pub fn get_all_response_headers(&self) -> String {
        self.inner
            .state
            .lock()
            .response
            .as_ref()
            .map(|r| {
                r.headers
                    .iter()
                    .map(|(name, value)| format!("{name}: {value}\r\n"))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Attach a typed value to this instance, replacing any of the same type
    pub fn insert_extension<T: Any + Send + Sync>(&self, value: T) {
        self.inner
            .extensions
            .lock()
            .insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Copy of the attached value of type `T`
    #[must_use]
    pub fn extension<T: Any + Send + Sync + Clone>(&self) -> Option<T> {
        self.inner
            .extensions
            .lock()
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref::<T>())
            .cloned()
    }

    /// Mutate the attached value of type `T`, if present
    pub fn with_extension_mut<T: Any + Send + Sync, R>(
        &self,
        apply: impl FnOnce(&mut T) -> R,
    ) -> Option<R> {
        self.inner
            .extensions
            .lock()
            .get_mut(&TypeId::of::<T>())
            .and_then(|v| v.downcast_mut::<T>())
            .map(apply)
    }
}

impl fmt::Debug for XmlHttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XmlHttpRequest")
            .field("state", &*self.inner.state.lock())
            .finish_non_exhaustive()
    }
}

/// Native prototype that performs requests through a fetch backend
pub struct FetchXhr {
    fetch: Arc<dyn FetchApi>,
}

impl FetchXhr {
    /// Prototype sending through `fetch`
    #[must_use]
    pub fn new(fetch: Arc<dyn FetchApi>) -> Self {
        Self { fetch }
    }
}

impl XhrPrototype for FetchXhr {
    fn open(&self, xhr: &XmlHttpRequest, method: &str, url: &str) {
        xhr.set_target(method, url);
    }

    fn set_request_header(&self, xhr: &XmlHttpRequest, name: &str, value: &str) {
        xhr.append_request_header(name, value);
    }

    fn send(&self, xhr: &XmlHttpRequest, body: Option<Body>) {
        let (Some(method), Some(url)) = (xhr.method(), xhr.url()) else {
            warn!("send() called before open()");
            xhr.fail();
            return;
        };
        xhr.mark_sent();

        let mut request = HttpRequest::new(method, url).with_body(body.unwrap_or_default());
        request.headers = xhr.request_headers();

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("XHR send outside of a tokio runtime");
            xhr.fail();
            return;
        };

        let fetch = Arc::clone(&self.fetch);
        let xhr = xhr.clone();
        runtime.spawn(async move {
            match fetch.fetch(FetchInput::Request(request)).await {
                Ok(response) => xhr.complete(XhrResponse {
                    status: response.status,
                    status_text: response.status_text,
                    headers: response.headers,
                    text: response.body.text(),
                }),
                Err(e) => {
                    warn!("XHR transport failed: {e}");
                    xhr.fail();
                }
            }
        });
    }
}
