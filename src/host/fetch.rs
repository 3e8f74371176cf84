//! fetch capability and request/response types

use async_trait::async_trait;
use bytes::Bytes;

use crate::Result;

/// Header name/value pairs, in insertion order
pub type Headers = Vec<(String, String)>;

/// Request or response body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Body {
    /// No body
    #[default]
    Empty,
    /// Buffered bytes; cloning is cheap
    Bytes(Bytes),
    /// One-shot stream that cannot be read without consuming it
    Stream,
}

impl Body {
    /// Body as text, or `None` if it cannot be read without consuming it
    #[must_use]
    pub fn text(&self) -> Option<String> {
        match self {
            Self::Empty => Some(String::new()),
            Self::Bytes(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
            Self::Stream => None,
        }
    }

    /// Buffered bytes, if any
    #[must_use]
    pub fn bytes(&self) -> Option<Bytes> {
        match self {
            Self::Empty => Some(Bytes::new()),
            Self::Bytes(bytes) => Some(bytes.clone()),
            Self::Stream => None,
        }
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Self::Bytes(Bytes::copy_from_slice(text.as_bytes()))
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Self::Bytes(Bytes::from(text))
    }
}

impl From<Vec<u8>> for Body {
    fn from(data: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(data))
    }
}

impl From<Bytes> for Body {
    fn from(data: Bytes) -> Self {
        Self::Bytes(data)
    }
}

/// Self-contained request descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// HTTP method
    pub method: String,
    /// Absolute URL
    pub url: String,
    /// Request headers
    pub headers: Headers,
    /// Request body
    pub body: Body,
}

impl HttpRequest {
    /// Request with no headers or body
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: Vec::new(),
            body: Body::Empty,
        }
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }
}

/// Options for the URL call shape
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// HTTP method, `GET` when absent
    pub method: Option<String>,
    /// Request headers
    pub headers: Headers,
    /// Request body
    pub body: Option<Body>,
}

/// Argument of a fetch call: a request descriptor or a URL plus options
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchInput {
    /// `fetch(request)`
    Request(HttpRequest),
    /// `fetch(url, options)`
    Url {
        /// Target URL
        url: String,
        /// Optional init options
        options: Option<FetchOptions>,
    },
}

impl FetchInput {
    /// URL call shape with options
    pub fn with_options(url: impl Into<String>, options: FetchOptions) -> Self {
        Self::Url {
            url: url.into(),
            options: Some(options),
        }
    }

    /// Target URL
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::Request(request) => &request.url,
            Self::Url { url, .. } => url,
        }
    }

    /// Effective method
    #[must_use]
    pub fn method(&self) -> &str {
        match self {
            Self::Request(request) => &request.method,
            Self::Url { options, .. } => options
                .as_ref()
                .and_then(|o| o.method.as_deref())
                .unwrap_or("GET"),
        }
    }

    /// Effective headers
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        match self {
            Self::Request(request) => &request.headers,
            Self::Url { options, .. } => options.as_ref().map_or(&[][..], |o| o.headers.as_slice()),
        }
    }

    /// Body, if one was supplied
    #[must_use]
    pub fn body(&self) -> Option<&Body> {
        match self {
            Self::Request(request) => Some(&request.body),
            Self::Url { options, .. } => options.as_ref().and_then(|o| o.body.as_ref()),
        }
    }

    /// Flatten into a request descriptor
    #[must_use]
    pub fn into_request(self) -> HttpRequest {
        match self {
            Self::Request(request) => request,
            Self::Url { url, options } => {
                let options = options.unwrap_or_default();
                HttpRequest {
                    method: options.method.unwrap_or_else(|| "GET".to_string()),
                    url,
                    headers: options.headers,
                    body: options.body.unwrap_or_default(),
                }
            }
        }
    }
}

impl From<&str> for FetchInput {
    fn from(url: &str) -> Self {
        Self::Url {
            url: url.to_string(),
            options: None,
        }
    }
}

impl From<String> for FetchInput {
    fn from(url: String) -> Self {
        Self::Url { url, options: None }
    }
}

impl From<HttpRequest> for FetchInput {
    fn from(request: HttpRequest) -> Self {
        Self::Request(request)
    }
}

/// Settled fetch response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// HTTP status code
    pub status: u16,
    /// Reason phrase
    pub status_text: String,
    /// Response headers
    pub headers: Headers,
    /// Response body
    pub body: Body,
}

impl FetchResponse {
    /// Response with a status and buffered body
    pub fn new(status: u16, status_text: impl Into<String>, body: impl Into<Body>) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// The host's fetch entry point
#[async_trait]
pub trait FetchApi: Send + Sync {
    /// Perform a request
    ///
    /// # Errors
    ///
    /// Returns error if the request cannot be completed
    async fn fetch(&self, input: FetchInput) -> Result<FetchResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_shape_defaults() {
        let input = FetchInput::from("http://example.com/items");
        assert_eq!(input.method(), "GET");
        assert!(input.headers().is_empty());
        assert!(input.body().is_none());

        let request = input.into_request();
        assert_eq!(request.method, "GET");
        assert_eq!(request.body, Body::Empty);
    }

    #[test]
    fn test_url_shape_with_options() {
        let input = FetchInput::with_options(
            "http://example.com/items",
            FetchOptions {
                method: Some("POST".to_string()),
                headers: vec![("Content-Type".to_string(), "application/json".to_string())],
                body: Some(Body::from("{\"a\":1}")),
            },
        );
        assert_eq!(input.method(), "POST");
        assert_eq!(input.headers().len(), 1);
        assert_eq!(input.body().and_then(Body::text).as_deref(), Some("{\"a\":1}"));
    }

    #[test]
    fn test_request_shape() {
        let input = FetchInput::from(
            HttpRequest::new("PUT", "http://example.com/x")
                .with_header("X-Trace", "1")
                .with_body(Body::Stream),
        );
        assert_eq!(input.method(), "PUT");
        assert_eq!(input.url(), "http://example.com/x");
        assert_eq!(input.body().and_then(Body::text), None);
    }
}
