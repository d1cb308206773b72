use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::delivery::{DeliveryOutcome, EventCallback};

/// Version stamp sent as `v` with every payload.
pub const TRACKER_VERSION: u32 = 1;

pub const PAGEVIEW: &str = "pageview";
pub const ENGAGEMENT: &str = "engagement";

/// Custom event properties (`p` on the wire).
pub type Props = Map<String, Value>;

/// Revenue fields (`$` on the wire), e.g. `{"currency": "EUR", "amount": 10}`.
pub type Revenue = Map<String, Value>;

/// Body of a single `POST` to the collection endpoint. Built fresh for
/// every event and never reused.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventPayload {
    #[serde(rename = "n")]
    pub name: String,
    #[serde(rename = "v")]
    pub version: u32,
    #[serde(rename = "u")]
    pub url: String,
    #[serde(rename = "d")]
    pub domain: String,
    /// Always serialised; `null` when the document has no referrer.
    #[serde(rename = "r")]
    pub referrer: Option<String>,
    #[serde(rename = "p", default, skip_serializing_if = "Option::is_none")]
    pub props: Option<Props>,
    /// `meta` option, JSON-encoded as a string.
    #[serde(rename = "m", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<String>,
    #[serde(rename = "i", default, skip_serializing_if = "Option::is_none")]
    pub interactive: Option<bool>,
    #[serde(rename = "$", default, skip_serializing_if = "Option::is_none")]
    pub revenue: Option<Revenue>,
    #[serde(rename = "h", default, skip_serializing_if = "Option::is_none")]
    pub hash_routing: Option<u8>,
    /// Scroll depth percentage, engagement events only.
    #[serde(rename = "sd", default, skip_serializing_if = "Option::is_none")]
    pub scroll_depth: Option<i64>,
    /// Engaged time in milliseconds, engagement events only.
    #[serde(rename = "e", default, skip_serializing_if = "Option::is_none")]
    pub engagement_time: Option<u64>,
}

impl EventPayload {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        domain: impl Into<String>,
        referrer: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: TRACKER_VERSION,
            url: url.into(),
            domain: domain.into(),
            referrer: referrer.filter(|r| !r.is_empty()),
            props: None,
            meta: None,
            interactive: None,
            revenue: None,
            hash_routing: None,
            scroll_depth: None,
            engagement_time: None,
        }
    }

    pub fn is_pageview(&self) -> bool {
        self.name == PAGEVIEW
    }

    pub fn is_engagement(&self) -> bool {
        self.name == ENGAGEMENT
    }

    /// Serialise to the `text/plain` JSON body.
    pub fn to_body(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Options accepted by `plausible(eventName, options)`.
#[derive(Default)]
pub struct EventOptions {
    pub props: Option<Props>,
    pub revenue: Option<Revenue>,
    pub interactive: Option<bool>,
    pub callback: Option<EventCallback>,
    pub meta: Option<Value>,
    /// Overrides the page URL (`u`).
    pub url: Option<String>,
}

impl EventOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_props(mut self, props: Props) -> Self {
        self.props = Some(props);
        self
    }

    pub fn with_revenue(mut self, revenue: Revenue) -> Self {
        self.revenue = Some(revenue);
        self
    }

    pub fn with_interactive(mut self, interactive: bool) -> Self {
        self.interactive = Some(interactive);
        self
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(Option<DeliveryOutcome>) + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
        self
    }
}

impl std::fmt::Debug for EventOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventOptions")
            .field("props", &self.props)
            .field("revenue", &self.revenue)
            .field("interactive", &self.interactive)
            .field("callback", &self.callback.is_some())
            .field("meta", &self.meta)
            .field("url", &self.url)
            .finish()
    }
}

/// Build a `Props` map from string pairs.
pub fn props<K, V, I>(pairs: I) -> Props
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
