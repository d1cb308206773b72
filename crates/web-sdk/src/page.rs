//! The page the tracker is embedded in.
//!
//! Everything the tracker needs from `window`/`document` goes through the
//! [`Page`] trait so the runtime never touches browser globals directly.
//! [`SimulatedPage`] is a headless implementation for hosts without a DOM.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::Deserialize;
use url::Url;

use tracker_core::TrackerResult;

use crate::events::Element;

/// The parts of `window.location` the tracker reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub href: String,
    /// Scheme with trailing colon, e.g. `https:`.
    pub protocol: String,
    /// Hostname plus port when one is present.
    pub host: String,
    pub hostname: String,
    pub pathname: String,
    /// Fragment including `#`, or empty.
    pub hash: String,
    pub origin: String,
}

impl Location {
    pub fn parse(href: &str) -> TrackerResult<Self> {
        Ok(Self::from_url(&Url::parse(href)?))
    }

    pub fn from_url(url: &Url) -> Self {
        let hostname = url.host_str().unwrap_or_default().to_string();
        let host = match url.port() {
            Some(port) => format!("{hostname}:{port}"),
            None => hostname.clone(),
        };
        Self {
            href: url.as_str().to_string(),
            protocol: format!("{}:", url.scheme()),
            host,
            hostname,
            pathname: url.path().to_string(),
            hash: url.fragment().map(|f| format!("#{f}")).unwrap_or_default(),
            origin: url.origin().ascii_serialization(),
        }
    }

    /// `localhost`, IPv4 loopback literals, IPv6 loopback, or a `file:` page.
    pub fn is_local(&self) -> bool {
        self.protocol == "file:"
            || self.hostname == "localhost"
            || self.hostname == "[::1]"
            || self.hostname == "[::]"
            || is_ipv4_loopback_literal(&self.hostname)
    }
}

/// Matches `127(.N){0,2}.N`.
fn is_ipv4_loopback_literal(hostname: &str) -> bool {
    let mut parts = hostname.split('.');
    if parts.next() != Some("127") {
        return false;
    }
    let rest: Vec<&str> = parts.collect();
    (1..=3).contains(&rest.len())
        && rest
            .iter()
            .all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisibilityState {
    Visible,
    Hidden,
    Prerender,
}

/// `scrollHeight`/`offsetHeight`/`clientHeight` of one element.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoxHeights {
    pub scroll: f64,
    pub offset: f64,
    pub client: f64,
}

impl BoxHeights {
    pub fn uniform(height: f64) -> Self {
        Self {
            scroll: height,
            offset: height,
            client: height,
        }
    }

    fn max(&self) -> f64 {
        self.scroll.max(self.offset).max(self.client)
    }
}

/// Raw document geometry as read from the DOM. Zero stands for "missing",
/// the same way the browser properties are falsy when absent.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DocumentMetrics {
    pub body: BoxHeights,
    pub root: BoxHeights,
    /// `window.innerHeight`
    pub inner_height: f64,
    /// `window.scrollY`
    pub scroll_y: f64,
    pub root_scroll_top: f64,
    pub body_scroll_top: f64,
}

impl DocumentMetrics {
    /// A document of `document_height` seen through a viewport of
    /// `viewport_height`, scrolled to `scroll_y`.
    pub fn new(document_height: f64, viewport_height: f64, scroll_y: f64) -> Self {
        Self {
            body: BoxHeights::uniform(document_height),
            root: BoxHeights {
                client: viewport_height,
                ..BoxHeights::uniform(document_height)
            },
            inner_height: viewport_height,
            scroll_y,
            ..Default::default()
        }
    }

    pub fn document_height(&self) -> f64 {
        self.body.max().max(self.root.max())
    }

    pub fn viewport_height(&self) -> f64 {
        first_truthy(&[self.inner_height, self.root.client])
    }

    pub fn scroll_top(&self) -> f64 {
        first_truthy(&[self.scroll_y, self.root_scroll_top, self.body_scroll_top])
    }

    /// Lowest visible pixel, capped at the document height for documents
    /// that fit in the viewport.
    pub fn scroll_depth_px(&self, document_height: f64) -> f64 {
        let viewport = self.viewport_height();
        if document_height <= viewport {
            document_height
        } else {
            self.scroll_top() + viewport
        }
    }
}

fn first_truthy(values: &[f64]) -> f64 {
    values.iter().copied().find(|v| *v != 0.0).unwrap_or(0.0)
}

/// Signals left behind by automation and headless browsers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AutomationSignals {
    /// `window._phantom`
    pub phantom: bool,
    /// `window.__nightmare`
    pub nightmare: bool,
    /// `navigator.webdriver`
    pub webdriver: bool,
    /// `window.Cypress`
    pub cypress: bool,
    /// `window.__plausible`, set by test harnesses that want events anyway.
    pub tracking_override: bool,
}

/// The browsing context hosting the tracker.
pub trait Page: Send + Sync {
    fn location(&self) -> Location;

    /// `document.referrer`, `None` when empty.
    fn referrer(&self) -> Option<String>;

    fn visibility(&self) -> VisibilityState;

    /// `document.hasFocus()`
    fn has_focus(&self) -> bool;

    fn metrics(&self) -> DocumentMetrics;

    /// `localStorage` lookup; inaccessible storage reads as `None`.
    fn storage_item(&self, key: &str) -> Option<String>;

    fn automation(&self) -> AutomationSignals;

    /// Whether `history.pushState` exists.
    fn supports_history(&self) -> bool {
        true
    }

    /// `window.location = href`
    fn navigate(&self, href: &str);

    /// `form.submit()`
    fn submit_form(&self, form: &Element);
}

#[derive(Debug)]
struct SimulatedState {
    location: Location,
    referrer: Option<String>,
    visibility: VisibilityState,
    focused: bool,
    metrics: DocumentMetrics,
    storage: HashMap<String, String>,
    automation: AutomationSignals,
    supports_history: bool,
    navigations: Vec<String>,
    submitted_forms: Vec<Element>,
}

/// Headless page whose state is set explicitly by the host.
#[derive(Debug)]
pub struct SimulatedPage {
    state: Mutex<SimulatedState>,
}

impl SimulatedPage {
    pub fn new(href: &str) -> TrackerResult<Self> {
        Ok(Self {
            state: Mutex::new(SimulatedState {
                location: Location::parse(href)?,
                referrer: None,
                visibility: VisibilityState::Visible,
                focused: true,
                metrics: DocumentMetrics::new(1000.0, 1000.0, 0.0),
                storage: HashMap::new(),
                automation: AutomationSignals::default(),
                supports_history: true,
                navigations: Vec::new(),
                submitted_forms: Vec::new(),
            }),
        })
    }

    /// Change the current URL without recording a navigation, as
    /// `history.pushState` does.
    pub fn set_url(&self, href: &str) -> TrackerResult<()> {
        self.state.lock().location = Location::parse(href)?;
        Ok(())
    }

    pub fn set_referrer(&self, referrer: Option<&str>) {
        self.state.lock().referrer = referrer.map(str::to_string);
    }

    pub fn set_visibility(&self, visibility: VisibilityState) {
        self.state.lock().visibility = visibility;
    }

    pub fn set_focus(&self, focused: bool) {
        self.state.lock().focused = focused;
    }

    pub fn set_metrics(&self, metrics: DocumentMetrics) {
        self.state.lock().metrics = metrics;
    }

    pub fn scroll_to(&self, scroll_y: f64) {
        self.state.lock().metrics.scroll_y = scroll_y;
    }

    pub fn set_storage_item(&self, key: &str, value: &str) {
        self.state
            .lock()
            .storage
            .insert(key.to_string(), value.to_string());
    }

    pub fn set_automation(&self, signals: AutomationSignals) {
        self.state.lock().automation = signals;
    }

    pub fn set_supports_history(&self, supported: bool) {
        self.state.lock().supports_history = supported;
    }

    /// Hrefs passed to [`Page::navigate`], in order.
    pub fn navigations(&self) -> Vec<String> {
        self.state.lock().navigations.clone()
    }

    pub fn submitted_forms(&self) -> Vec<Element> {
        self.state.lock().submitted_forms.clone()
    }
}

impl Page for SimulatedPage {
    fn location(&self) -> Location {
        self.state.lock().location.clone()
    }

    fn referrer(&self) -> Option<String> {
        self.state.lock().referrer.clone()
    }

    fn visibility(&self) -> VisibilityState {
        self.state.lock().visibility
    }

    fn has_focus(&self) -> bool {
        self.state.lock().focused
    }

    fn metrics(&self) -> DocumentMetrics {
        self.state.lock().metrics
    }

    fn storage_item(&self, key: &str) -> Option<String> {
        self.state.lock().storage.get(key).cloned()
    }

    fn automation(&self) -> AutomationSignals {
        self.state.lock().automation
    }

    fn supports_history(&self) -> bool {
        self.state.lock().supports_history
    }

    fn navigate(&self, href: &str) {
        self.state.lock().navigations.push(href.to_string());
    }

    fn submit_form(&self, form: &Element) {
        self.state.lock().submitted_forms.push(form.clone());
    }
}
