//! Modern transport: the `fetch(endpoint, { keepalive: true })` path.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use tracker_core::{Completion, DeliveryOutcome, DeliveryRequest, Transport};

use crate::DeliveryResult;

/// Async HTTP transport running on the ambient tokio runtime.
///
/// Connections are kept alive in the client pool so that an event fired while
/// the page is going away still has a warm socket to ride on. When no runtime
/// is reachable the send is dropped silently, the same way a modern build
/// degrades when `fetch` is missing.
pub struct FetchTransport {
    client: reqwest::Client,
    runtime: Option<Handle>,
}

impl FetchTransport {
    pub fn new() -> DeliveryResult<Self> {
        let client = reqwest::Client::builder()
            .tcp_keepalive(Duration::from_secs(60))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            runtime: Handle::try_current().ok(),
        }
    }

    /// Pin the transport to a specific runtime.
    pub fn on_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }
}

impl Transport for FetchTransport {
    fn name(&self) -> &'static str {
        "fetch"
    }

    fn send(&self, request: DeliveryRequest, completion: Completion) {
        let Some(runtime) = self.runtime.clone().or_else(|| Handle::try_current().ok()) else {
            debug!(endpoint = %request.endpoint, "fetch unavailable, event not sent");
            return;
        };

        let client = self.client.clone();
        runtime.spawn(async move {
            let result = client
                .post(request.endpoint.clone())
                .header(CONTENT_TYPE, tracker_core::CONTENT_TYPE)
                .body(request.body)
                .send()
                .await;

            match result {
                Ok(response) => {
                    let status = response.status().as_u16();
                    debug!(endpoint = %request.endpoint, status, "event delivered");
                    completion.resolve(Some(DeliveryOutcome::Status(status)));
                }
                Err(e) => {
                    warn!(endpoint = %request.endpoint, error = %e, "event delivery failed");
                    completion.resolve(Some(DeliveryOutcome::Error(e.to_string())));
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{closed_endpoint, spawn_collector};
    use tracker_core::{EventPayload, PAGEVIEW};

    fn request(endpoint: url::Url) -> DeliveryRequest {
        let payload = EventPayload::new(
            PAGEVIEW,
            "https://example.com/blog/post",
            "example.com",
            None,
        );
        DeliveryRequest::new(endpoint, &payload).unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_posts_plain_text_json() {
        let (endpoint, seen) = spawn_collector().await;
        let transport = FetchTransport::new().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel();

        transport.send(
            request(endpoint),
            Completion::from_fn(move |outcome| {
                let _ = tx.send(outcome);
            }),
        );

        let outcome = rx.await.unwrap();
        assert_eq!(outcome, Some(DeliveryOutcome::Status(202)));

        let seen = seen.lock().clone();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "text/plain");
        let body: serde_json::Value = serde_json::from_str(&seen[0].1).unwrap();
        assert_eq!(body["n"], "pageview");
        assert_eq!(body["d"], "example.com");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_network_failure_reports_error() {
        let endpoint = closed_endpoint().await;
        let transport = FetchTransport::new().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel();

        transport.send(
            request(endpoint),
            Completion::from_fn(move |outcome| {
                let _ = tx.send(outcome);
            }),
        );

        let outcome = rx.await.unwrap();
        assert!(outcome.unwrap().is_error());
    }

    #[test]
    fn test_without_runtime_is_silent_noop() {
        let client = reqwest::Client::new();
        let transport = FetchTransport::with_client(client);
        let completion = Completion::none();
        transport.send(
            request(url::Url::parse("http://127.0.0.1:9/api/event").unwrap()),
            completion.clone(),
        );
        assert!(!completion.is_resolved());
    }
}
