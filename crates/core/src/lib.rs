//! Shared building blocks for the tracker: the error taxonomy, the wire
//! payload, event options, the delivery contract, and clocks.

pub mod clock;
pub mod delivery;
pub mod error;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use delivery::{
    capture_transport, noop_transport, CaptureMode, CaptureTransport, Completion,
    DeliveryOutcome, DeliveryRequest, EventCallback, NoOpTransport, Transport, CONTENT_TYPE,
};
pub use error::{TrackerError, TrackerResult};
pub use types::{props, EventOptions, EventPayload, Props, Revenue, ENGAGEMENT, PAGEVIEW};
