//! Compatibility transport: the `XMLHttpRequest` path for legacy builds.
//!
//! Request setup (method, endpoint, headers) happens synchronously on the
//! caller's turn; the exchange itself runs on a short-lived worker thread and
//! reports back through the completion once the request reaches `DONE`.

use std::thread;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use tracing::{debug, warn};

use tracker_core::{Completion, DeliveryOutcome, DeliveryRequest, Transport};

/// Status reported for a request that never got a response.
pub const NETWORK_ERROR_STATUS: u16 = 0;

/// Map the status of a `DONE` request onto the callback outcome. A zero
/// status means the browser never received a response.
pub fn ready_state_outcome(status: u16) -> DeliveryOutcome {
    if status == NETWORK_ERROR_STATUS {
        DeliveryOutcome::Error("Network error".to_string())
    } else {
        DeliveryOutcome::Status(status)
    }
}

#[derive(Debug, Clone)]
pub struct XhrTransport {
    timeout: Duration,
}

impl Default for XhrTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl XhrTransport {
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static(tracker_core::CONTENT_TYPE),
        );
        headers
    }

    fn exchange(request: DeliveryRequest, headers: HeaderMap, timeout: Duration) -> u16 {
        let client = match reqwest::blocking::Client::builder().timeout(timeout).build() {
            Ok(client) => client,
            Err(e) => {
                warn!(error = %e, "failed to build compat client");
                return NETWORK_ERROR_STATUS;
            }
        };
        match client
            .post(request.endpoint.clone())
            .headers(headers)
            .body(request.body)
            .send()
        {
            Ok(response) => response.status().as_u16(),
            Err(e) => {
                debug!(endpoint = %request.endpoint, error = %e, "compat request failed");
                NETWORK_ERROR_STATUS
            }
        }
    }
}

impl Transport for XhrTransport {
    fn name(&self) -> &'static str {
        "xhr"
    }

    fn send(&self, request: DeliveryRequest, completion: Completion) {
        let headers = Self::headers();
        let timeout = self.timeout;
        let on_done = completion.clone();

        let spawned = thread::Builder::new()
            .name("tracker-xhr".into())
            .spawn(move || {
                let status = Self::exchange(request, headers, timeout);
                on_done.resolve(Some(ready_state_outcome(status)));
            });

        if let Err(e) = spawned {
            warn!(error = %e, "could not dispatch compat request");
            completion.resolve(Some(ready_state_outcome(NETWORK_ERROR_STATUS)));
        }
    }
}
