//! Network transports for the tracker.
//!
//! - [`fetch`]: async transport used by modern builds
//! - [`xhr`]: compatibility transport, compiled only into `compat` builds
//!
//! Both are best-effort: one call per event, no retries, no queueing.

pub mod fetch;
#[cfg(feature = "compat")]
pub mod xhr;

use std::sync::Arc;

use thiserror::Error;
use tracker_core::Transport;

pub use fetch::FetchTransport;
#[cfg(feature = "compat")]
pub use xhr::{ready_state_outcome, XhrTransport};

pub type DeliveryResult<T> = Result<T, DeliveryError>;

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

/// Transport selected by the build: XHR for compat builds, fetch otherwise.
#[cfg(feature = "compat")]
pub fn default_transport() -> DeliveryResult<Arc<dyn Transport>> {
    Ok(Arc::new(XhrTransport::new()))
}

/// Transport selected by the build: XHR for compat builds, fetch otherwise.
#[cfg(not(feature = "compat"))]
pub fn default_transport() -> DeliveryResult<Arc<dyn Transport>> {
    Ok(Arc::new(FetchTransport::new()?))
}
