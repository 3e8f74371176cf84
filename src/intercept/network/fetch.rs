use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::debug;

use crate::clock::duration_ms;
use crate::event::{Event, EventSink, NetworkEvent, NetworkSource};
use crate::host::{FetchApi, FetchInput, FetchResponse};
use crate::Result;

use super::{body_text, payload, UNREADABLE_REQUEST_BODY, UNREADABLE_RESPONSE_BODY};

/// fetch wrapper installed by the network interceptor
pub(super) struct RecordingFetch {
    original: Arc<dyn FetchApi>,
    sink: EventSink,
}

impl RecordingFetch {
    pub(super) fn new(original: Arc<dyn FetchApi>, sink: EventSink) -> Self {
        Self { original, sink }
    }
}

#[async_trait]
impl FetchApi for RecordingFetch {
    async fn fetch(&self, input: FetchInput) -> Result<FetchResponse> {
        let method = input.method().to_string();
        let url = input.url().to_string();
        let body = input.body().map(|b| body_text(b, UNREADABLE_REQUEST_BODY));
        let request = payload(&self.sink, input.headers(), body.as_deref());

        debug!(%method, %url, "captured fetch");
        let id = self.sink.record(|timestamp| {
            Event::Network(NetworkEvent::issued(
                NetworkSource::Fetch,
                method.clone(),
                url.clone(),
                timestamp,
                request,
            ))
        });

        let started = Instant::now();
        let result = self.original.fetch(input).await;
        let duration = duration_ms(started.elapsed());

        let Some(id) = id else {
            return result;
        };

        match &result {
            Ok(response) => {
                let body = body_text(&response.body, UNREADABLE_RESPONSE_BODY);
                let response_payload = payload(&self.sink, &response.headers, Some(&body));
                let status = response.status;
                let status_text = response.status_text.clone();
                self.sink.complete_network(id, |event| {
                    event.complete(status, status_text, duration, response_payload);
                });
                debug!(%method, %url, status, "fetch completed");
            }
            Err(e) => {
                let message = e.to_string();
                debug!(%method, %url, error = %message, "fetch failed");
                self.sink
                    .complete_network(id, |event| event.fail(message, duration));
            }
        }
        result
    }
}
