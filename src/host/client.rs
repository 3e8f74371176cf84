//! Default fetch backend: hyper client over plain HTTP

use std::time::Duration;

use async_trait::async_trait;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body as HttpBody, Bytes};
use hyper::{Method, Request, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tracing::{debug, warn};

use crate::{Result, TapError};

use super::fetch::{Body, FetchApi, FetchInput, FetchResponse, HttpRequest};

/// Default cap on buffered response bodies
pub const DEFAULT_MAX_RESPONSE_SIZE: usize = 16 * 1024 * 1024;

/// fetch backed by a pooled hyper client
pub struct HttpFetch {
    client: Client<HttpConnector, Full<Bytes>>,
    max_response_size: usize,
}

impl HttpFetch {
    /// Create a new client
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_response_size(DEFAULT_MAX_RESPONSE_SIZE)
    }

    /// Create a client that rejects response bodies above `max_response_size` bytes
    #[must_use]
    pub fn with_max_response_size(max_response_size: usize) -> Self {
        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .build_http();

        Self {
            client,
            max_response_size,
        }
    }
}

impl Default for HttpFetch {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FetchApi for HttpFetch {
    async fn fetch(&self, input: FetchInput) -> Result<FetchResponse> {
        let request = build_request(input.into_request())?;

        debug!("Sending {} {}", request.method(), request.uri());

        let response = self.client.request(request).await.map_err(|e| {
            warn!("Request failed: {e}");
            TapError::Network(format!("Request failed: {e}"))
        })?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    value.to_str().unwrap_or("<invalid>").to_string(),
                )
            })
            .collect();

        let body = collect_limited(response.into_body(), self.max_response_size).await?;

        Ok(FetchResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body: Body::Bytes(body),
        })
    }
}

/// Buffer `body`, giving up as soon as more than `limit` bytes have arrived
async fn collect_limited<B>(body: B, limit: usize) -> Result<Bytes>
where
    B: HttpBody,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    let declared = usize::try_from(body.size_hint().lower()).unwrap_or(usize::MAX);
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => Err(TapError::DataTooLarge {
            size: declared.max(limit.saturating_add(1)),
            limit,
        }),
        Err(e) => Err(TapError::Network(format!("Failed to read response body: {e}"))),
    }
}

/// Convert a request descriptor into a hyper request
fn build_request(request: HttpRequest) -> Result<Request<Full<Bytes>>> {
    let uri = request
        .url
        .parse::<Uri>()
        .map_err(|e| TapError::Network(format!("Invalid URL '{}': {e}", request.url)))?;

    let method = request.method.to_uppercase().parse::<Method>().map_err(|e| {
        TapError::Network(format!("Invalid HTTP method '{}': {e}", request.method))
    })?;

    let body = request.body.bytes().ok_or_else(|| {
        TapError::Network("Request body stream was already consumed".to_string())
    })?;

    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in &request.headers {
        builder = builder.header(name, value);
    }

    builder
        .body(Full::new(body))
        .map_err(|e| TapError::Network(format!("Failed to build request: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_request_simple() {
        let request = build_request(HttpRequest::new("get", "http://example.com:80/api/test")).unwrap();
        assert_eq!(request.method(), Method::GET);
        assert_eq!(request.uri().to_string(), "http://example.com:80/api/test");
    }

    #[test]
    fn test_build_request_with_headers() {
        let request = build_request(
            HttpRequest::new("POST", "http://example.com/api")
                .with_header("Content-Type", "application/json")
                .with_body("{}"),
        )
        .unwrap();
        assert_eq!(request.headers()["content-type"], "application/json");
    }

    #[test]
    fn test_build_request_rejects_consumed_stream() {
        let result = build_request(HttpRequest::new("POST", "http://example.com").with_body(Body::Stream));
        assert!(matches!(result, Err(TapError::Network(_))));
    }

    #[test]
    fn test_build_request_rejects_bad_url() {
        assert!(build_request(HttpRequest::new("GET", "not a url")).is_err());
    }

    #[tokio::test]
    async fn test_collect_limited_stops_at_cap() {
        let body = Full::new(Bytes::from(vec![0u8; 10]));
        let result = collect_limited(body, 4).await;
        assert!(matches!(result, Err(TapError::DataTooLarge { size: 10, limit: 4 })));

        let body = Full::new(Bytes::from(vec![7u8; 10]));
        let bytes = collect_limited(body, 16).await.unwrap();
        assert_eq!(bytes.len(), 10);
    }

    #[test]
    fn test_http_fetch_creation() {
        let client = HttpFetch::new();
        assert!(std::mem::size_of_val(&client) > 0);
    }
}
