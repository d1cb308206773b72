//! Embedded analytics tracker runtime: pageview autocapture, engagement
//! measurement, custom-event detection, and delivery to a collection
//! endpoint.
//!
//! # Modules
//!
//! - [`config`]: Script-tag, injected and `init()` configuration
//! - [`tracker`]: Per-page tracker instance and the event pipeline
//! - [`plausible`]: Public call contract with queue replay
//! - [`engagement`]: Engaged time and scroll depth
//! - [`custom_events`]: Outbound links, downloads, tagged elements, forms
//! - [`navigation`]: SPA navigation sources
//! - [`features`]: Compile-time feature gates and artifact markers
//!
//! Optional behaviour is selected with Cargo features and compiled out when
//! disabled; with the `config` feature each compiled feature is additionally
//! switched by runtime config.

pub mod automation;
pub mod config;
pub mod custom_events;
pub mod engagement;
pub mod events;
#[cfg(feature = "exclusions")]
pub mod exclusions;
pub mod features;
#[cfg(feature = "compat")]
pub mod follow;
pub mod navigation;
pub mod page;
pub mod plausible;
pub mod timers;
pub mod tracker;

pub use automation::{AutomationDetector, KnownMarkersDetector, NeverAutomated};
pub use config::{Config, ConfigOverrides, ConfigResolver, ConfigSource, CustomProperties, ScriptTag};
pub use custom_events::{CustomEventDetector, DetectedEvent, EventClass, FollowAction};
pub use engagement::{EngagementPhase, EngagementReport, EngagementTracker};
pub use events::{Disposition, DomEvent, Element, Interaction, InteractionKind, Modifiers};
#[cfg(feature = "hash")]
pub use navigation::HashSource;
pub use navigation::{HistorySource, NavigationSource, NavigationWatcher};
pub use page::{Location, Page, SimulatedPage, VisibilityState};
pub use plausible::{Plausible, QueuedCall};
pub use tracker::{Environment, IgnoreReason, TrackOutcome, TrackerInstance};
