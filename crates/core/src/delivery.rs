//! Delivery contract: the seam between the tracker runtime and whatever
//! actually puts bytes on the wire.
//!
//! The runtime hands every payload to an `Arc<dyn Transport>`. A send is
//! fire-and-forget: exactly one network call, no retries, no queue. The only
//! caller-visible signal is the optional callback carried by a [`Completion`],
//! which fires at most once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use url::Url;

use crate::types::EventPayload;

/// Content type used for every event POST.
pub const CONTENT_TYPE: &str = "text/plain";

/// What the caller's callback receives once a request settles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The endpoint answered (any HTTP status).
    Status(u16),
    /// The request never produced a response.
    Error(String),
}

impl DeliveryOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, DeliveryOutcome::Error(_))
    }
}

/// Caller-supplied completion callback. `None` means the event was ignored
/// before reaching the transport.
pub type EventCallback = Box<dyn FnOnce(Option<DeliveryOutcome>) + Send + 'static>;

struct CompletionInner {
    resolved: AtomicBool,
    callback: Mutex<Option<EventCallback>>,
}

/// Single-shot completion handle. Cloning shares the same guard, so any
/// number of failure and success paths may race to resolve it and only the
/// first one wins.
#[derive(Clone)]
pub struct Completion {
    inner: Arc<CompletionInner>,
}

impl Completion {
    pub fn new(callback: Option<EventCallback>) -> Self {
        Self {
            inner: Arc::new(CompletionInner {
                resolved: AtomicBool::new(false),
                callback: Mutex::new(callback),
            }),
        }
    }

    pub fn none() -> Self {
        Self::new(None)
    }

    pub fn from_fn<F>(callback: F) -> Self
    where
        F: FnOnce(Option<DeliveryOutcome>) + Send + 'static,
    {
        Self::new(Some(Box::new(callback)))
    }

    /// Resolve the completion. Returns `false` if it was already resolved.
    pub fn resolve(&self, outcome: Option<DeliveryOutcome>) -> bool {
        if self.inner.resolved.swap(true, Ordering::SeqCst) {
            return false;
        }
        let callback = self.inner.callback.lock().take();
        if let Some(callback) = callback {
            callback(outcome);
        }
        true
    }

    pub fn is_resolved(&self) -> bool {
        self.inner.resolved.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

/// One `POST <endpoint>` with a JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryRequest {
    pub endpoint: Url,
    pub body: String,
}

impl DeliveryRequest {
    pub fn new(endpoint: Url, payload: &EventPayload) -> serde_json::Result<Self> {
        Ok(Self {
            endpoint,
            body: payload.to_body()?,
        })
    }

    /// Decode the body back into a payload.
    pub fn payload(&self) -> serde_json::Result<EventPayload> {
        serde_json::from_str(&self.body)
    }
}

/// Sends event payloads to the collection endpoint.
pub trait Transport: Send + Sync {
    /// Short transport name used in logs.
    fn name(&self) -> &'static str;

    /// Issue exactly one network call for `request` and resolve `completion`
    /// when it settles. Must never block the caller.
    fn send(&self, request: DeliveryRequest, completion: Completion);
}

/// Transport for hosts with no network capability. Sends nothing and never
/// calls back, matching a modern build running where `fetch` is missing.
pub struct NoOpTransport;

impl Transport for NoOpTransport {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn send(&self, request: DeliveryRequest, _completion: Completion) {
        tracing::debug!(endpoint = %request.endpoint, "no transport available, dropping event");
    }
}

/// How a [`CaptureTransport`] settles the requests it records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureMode {
    /// Resolve immediately with this status.
    Respond(u16),
    /// Resolve immediately with a network error.
    Fail(String),
    /// Keep completions pending until [`CaptureTransport::complete_pending`].
    Hold,
}

/// In-memory transport that records requests for testing.
pub struct CaptureTransport {
    requests: Mutex<Vec<DeliveryRequest>>,
    pending: Mutex<Vec<Completion>>,
    mode: Mutex<CaptureMode>,
}

impl Default for CaptureTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureTransport {
    pub fn new() -> Self {
        Self::with_mode(CaptureMode::Respond(202))
    }

    pub fn with_mode(mode: CaptureMode) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            pending: Mutex::new(Vec::new()),
            mode: Mutex::new(mode),
        }
    }

    pub fn set_mode(&self, mode: CaptureMode) {
        *self.mode.lock() = mode;
    }

    pub fn requests(&self) -> Vec<DeliveryRequest> {
        self.requests.lock().clone()
    }

    /// Decoded payloads, in send order. Undecodable bodies are skipped.
    pub fn payloads(&self) -> Vec<EventPayload> {
        self.requests
            .lock()
            .iter()
            .filter_map(|r| r.payload().ok())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn count_named(&self, name: &str) -> usize {
        self.payloads().iter().filter(|p| p.name == name).count()
    }

    pub fn clear(&self) {
        self.requests.lock().clear();
        self.pending.lock().clear();
    }

    /// Resolve every held completion with `outcome`; returns how many fired.
    pub fn complete_pending(&self, outcome: DeliveryOutcome) -> usize {
        let pending = std::mem::take(&mut *self.pending.lock());
        pending
            .into_iter()
            .filter(|c| c.resolve(Some(outcome.clone())))
            .count()
    }
}

impl Transport for CaptureTransport {
    fn name(&self) -> &'static str {
        "capture"
    }

    fn send(&self, request: DeliveryRequest, completion: Completion) {
        self.requests.lock().push(request);
        let mode = self.mode.lock().clone();
        match mode {
            CaptureMode::Respond(status) => {
                completion.resolve(Some(DeliveryOutcome::Status(status)));
            }
            CaptureMode::Fail(message) => {
                completion.resolve(Some(DeliveryOutcome::Error(message)));
            }
            CaptureMode::Hold => self.pending.lock().push(completion),
        }
    }
}

/// Convenience: a transport that sends nothing.
pub fn noop_transport() -> Arc<dyn Transport> {
    Arc::new(NoOpTransport)
}

/// Convenience: create a capture transport for tests.
pub fn capture_transport() -> Arc<CaptureTransport> {
    Arc::new(CaptureTransport::new())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::PAGEVIEW;
    use std::sync::atomic::AtomicUsize;

    fn request(name: &str) -> DeliveryRequest {
        let payload = EventPayload::new(name, "https://example.com/", "example.com", None);
        DeliveryRequest::new(Url::parse("https://plausible.io/api/event").unwrap(), &payload)
            .unwrap()
    }

    #[test]
    fn test_completion_fires_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let completion = Completion::from_fn(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let twin = completion.clone();

        assert!(completion.resolve(Some(DeliveryOutcome::Status(202))));
        assert!(!twin.resolve(Some(DeliveryOutcome::Error("late".into()))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(twin.is_resolved());
    }

    #[test]
    fn test_capture_transport_responds() {
        let transport = capture_transport();
        let seen = Arc::new(Mutex::new(None));
        let slot = seen.clone();
        transport.send(
            request(PAGEVIEW),
            Completion::from_fn(move |outcome| *slot.lock() = outcome),
        );

        assert_eq!(transport.count(), 1);
        assert_eq!(transport.count_named(PAGEVIEW), 1);
        assert_eq!(*seen.lock(), Some(DeliveryOutcome::Status(202)));
    }

    #[test]
    fn test_capture_transport_hold() {
        let transport = CaptureTransport::with_mode(CaptureMode::Hold);
        let completion = Completion::none();
        transport.send(request("Signup"), completion.clone());
        assert!(!completion.is_resolved());

        assert_eq!(transport.complete_pending(DeliveryOutcome::Status(202)), 1);
        assert!(completion.is_resolved());
        assert_eq!(transport.complete_pending(DeliveryOutcome::Status(202)), 0);
    }

    #[test]
    fn test_noop_transport() {
        let transport = noop_transport();
        let completion = Completion::none();
        transport.send(request(PAGEVIEW), completion.clone());
        assert!(!completion.is_resolved());
    }
}
