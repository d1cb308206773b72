//! Line-delimited JSON commands read from stdin, and the replies written
//! back to stdout.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use tracker_core::{EventOptions, Props, Revenue};
use tracker_web_sdk::{ConfigOverrides, Disposition, DomEvent, TrackOutcome, VisibilityState};

#[derive(Debug, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum HostCommand {
    /// Replace the page URL without a navigation, as `pushState` does.
    SetUrl { url: String },
    SetReferrer { referrer: Option<String> },
    SetVisibility { state: VisibilityState },
    SetFocus { focused: bool },
    SetMetrics {
        document_height: f64,
        viewport_height: f64,
        #[serde(default)]
        scroll_y: f64,
    },
    ScrollTo { y: f64 },
    SetStorage { key: String, value: String },
    /// `plausible.init(overrides)`
    Init {
        #[serde(default)]
        overrides: Option<ConfigOverrides>,
    },
    /// `plausible(name, options)`
    Call {
        name: String,
        #[serde(default)]
        options: CallOptions,
    },
    Dispatch { event: DomEvent },
    RunTimers,
}

impl HostCommand {
    pub fn parse(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line)
    }
}

/// The serialisable part of [`EventOptions`].
#[derive(Debug, Default, Deserialize)]
pub struct CallOptions {
    pub props: Option<Props>,
    pub revenue: Option<Revenue>,
    pub interactive: Option<bool>,
    pub meta: Option<Value>,
    pub url: Option<String>,
}

impl From<CallOptions> for EventOptions {
    fn from(options: CallOptions) -> Self {
        EventOptions {
            props: options.props,
            revenue: options.revenue,
            interactive: options.interactive,
            meta: options.meta,
            url: options.url,
            ..EventOptions::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Reply {
    Ok,
    Queued,
    Sent,
    Ignored { reason: String },
    Dispatched { disposition: Disposition },
    TimersRun { fired: usize },
    Error { message: String },
}

impl From<Option<TrackOutcome>> for Reply {
    fn from(outcome: Option<TrackOutcome>) -> Self {
        match outcome {
            None => Reply::Queued,
            Some(TrackOutcome::Sent) => Reply::Sent,
            Some(TrackOutcome::Ignored(reason)) => Reply::Ignored {
                reason: reason.to_string(),
            },
        }
    }
}
