//! Engaged time and scroll depth per pageview.
//!
//! One [`EngagementTracker`] lives for the whole document. Every accepted
//! pageview restarts it; the page it replaces is closed first, which may
//! produce an [`EngagementReport`]. Reports also come out of visibility and
//! focus changes. The tracker never sends anything itself.

use tracing::debug;

use tracker_core::{EventPayload, Props, ENGAGEMENT};

use crate::page::{DocumentMetrics, VisibilityState};

/// Engaged time that justifies a report on its own.
pub const ENGAGEMENT_THRESHOLD_MS: u64 = 3000;
pub const RESAMPLE_INTERVAL_MS: u64 = 200;
/// Height resamples after `load` before the interval stops itself.
pub const RESAMPLE_TICKS: u32 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngagementPhase {
    /// No pageview yet.
    Idle,
    /// Visible and focused, clock running.
    Active,
    /// Hidden or unfocused, time banked.
    Suspended,
    /// The current pageview was ignored.
    Closed,
}

/// What one engagement event reports.
#[derive(Debug, Clone, PartialEq)]
pub struct EngagementReport {
    pub url: String,
    pub props: Option<Props>,
    /// Percent of the document seen.
    pub scroll_depth: i64,
    pub engaged_ms: u64,
}

impl EngagementReport {
    pub fn into_payload(self, domain: &str, hash_routing: bool) -> EventPayload {
        let mut payload = EventPayload::new(ENGAGEMENT, self.url, domain, None);
        payload.props = self.props;
        payload.scroll_depth = Some(self.scroll_depth);
        payload.engagement_time = Some(self.engaged_ms);
        #[cfg(feature = "hash")]
        if hash_routing {
            payload.hash_routing = Some(1);
        }
        #[cfg(not(feature = "hash"))]
        let _ = hash_routing;
        payload
    }
}

pub fn scroll_percentage(depth_px: f64, document_height: f64) -> i64 {
    if document_height <= 0.0 {
        return 0;
    }
    (depth_px / document_height * 100.0).round() as i64
}

#[derive(Debug)]
pub struct EngagementTracker {
    url: String,
    props: Option<Props>,
    ignored: bool,
    listening: bool,
    document_height: f64,
    max_scroll_depth_px: f64,
    /// Depth at the last report, -1 before the first one so that closing a
    /// page always reports at least once.
    last_emitted_depth_px: f64,
    accumulated_ms: u64,
    running_since: Option<u64>,
    resample_ticks: u32,
}

impl EngagementTracker {
    pub fn new(metrics: &DocumentMetrics) -> Self {
        let document_height = metrics.document_height();
        Self {
            url: String::new(),
            props: None,
            ignored: false,
            listening: false,
            document_height,
            max_scroll_depth_px: metrics.scroll_depth_px(document_height),
            last_emitted_depth_px: -1.0,
            accumulated_ms: 0,
            running_since: None,
            resample_ticks: 0,
        }
    }

    pub fn phase(&self) -> EngagementPhase {
        if !self.listening {
            EngagementPhase::Idle
        } else if self.ignored {
            EngagementPhase::Closed
        } else if self.running_since.is_some() {
            EngagementPhase::Active
        } else {
            EngagementPhase::Suspended
        }
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    pub fn is_ignored(&self) -> bool {
        self.ignored
    }

    pub fn document_height(&self) -> f64 {
        self.document_height
    }

    pub fn max_scroll_depth_px(&self) -> f64 {
        self.max_scroll_depth_px
    }

    /// Banked time plus the running stretch, if any.
    pub fn engaged_ms(&self, now_ms: u64) -> u64 {
        match self.running_since {
            Some(start) => self.accumulated_ms + now_ms.saturating_sub(start),
            None => self.accumulated_ms,
        }
    }

    /// `load` fired: take a fresh height and restart the resample count.
    pub fn on_load(&mut self, metrics: &DocumentMetrics) {
        self.document_height = metrics.document_height();
        self.resample_ticks = 0;
    }

    /// One resample tick. Returns `false` once the interval should stop.
    pub fn resample(&mut self, metrics: &DocumentMetrics) -> bool {
        self.document_height = metrics.document_height();
        self.resample_ticks += 1;
        self.resample_ticks < RESAMPLE_TICKS
    }

    pub fn on_scroll(&mut self, metrics: &DocumentMetrics) {
        self.document_height = metrics.document_height();
        let depth = metrics.scroll_depth_px(self.document_height);
        if depth > self.max_scroll_depth_px {
            self.max_scroll_depth_px = depth;
        }
    }

    /// `visibilitychange`, `focus` and `blur` all land here.
    pub fn on_visibility(
        &mut self,
        visibility: VisibilityState,
        focused: bool,
        now_ms: u64,
    ) -> Option<EngagementReport> {
        if !self.listening {
            return None;
        }
        if visibility == VisibilityState::Visible && focused && self.running_since.is_none() {
            self.running_since = Some(now_ms);
            None
        } else if visibility == VisibilityState::Hidden || !focused {
            self.accumulated_ms = self.engaged_ms(now_ms);
            self.running_since = None;
            self.try_emit(now_ms)
        } else {
            None
        }
    }

    /// Close the current page ahead of a new pageview, then re-measure the
    /// document for the next one.
    pub fn before_pageview(
        &mut self,
        metrics: &DocumentMetrics,
        now_ms: u64,
    ) -> Option<EngagementReport> {
        if !self.listening {
            return None;
        }
        let report = self.try_emit(now_ms);
        self.document_height = metrics.document_height();
        self.max_scroll_depth_px = metrics.scroll_depth_px(self.document_height);
        report
    }

    /// An accepted pageview opens a new page. Returns `true` the first time,
    /// when the host should start forwarding visibility and focus events.
    pub fn start_page(&mut self, url: String, props: Option<Props>, now_ms: u64) -> bool {
        self.ignored = false;
        self.url = url;
        self.props = props;
        self.last_emitted_depth_px = -1.0;
        self.accumulated_ms = 0;
        self.running_since = Some(now_ms);
        let first = !self.listening;
        self.listening = true;
        first
    }

    /// No report is ever produced for an ignored pageview.
    pub fn mark_ignored(&mut self) {
        self.ignored = true;
    }

    fn try_emit(&mut self, now_ms: u64) -> Option<EngagementReport> {
        let engaged_ms = self.engaged_ms(now_ms);
        let deeper = self.last_emitted_depth_px < self.max_scroll_depth_px;
        if self.ignored || !(deeper || engaged_ms >= ENGAGEMENT_THRESHOLD_MS) {
            return None;
        }

        self.last_emitted_depth_px = self.max_scroll_depth_px;
        self.running_since = None;
        self.accumulated_ms = 0;

        let report = EngagementReport {
            url: self.url.clone(),
            props: self.props.clone(),
            scroll_depth: scroll_percentage(self.max_scroll_depth_px, self.document_height),
            engaged_ms,
        };
        debug!(
            url = %report.url,
            sd = report.scroll_depth,
            e = report.engaged_ms,
            "engagement report"
        );
        Some(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_page() -> DocumentMetrics {
        DocumentMetrics::new(4000.0, 1000.0, 0.0)
    }

    fn opened(now: u64) -> EngagementTracker {
        let mut tracker = EngagementTracker::new(&long_page());
        assert!(tracker.start_page("https://example.com/".into(), None, now));
        tracker
    }

    #[test]
    fn test_first_close_reports() {
        let mut tracker = opened(0);
        assert_eq!(tracker.phase(), EngagementPhase::Active);
        let report = tracker
            .on_visibility(VisibilityState::Hidden, true, 500)
            .unwrap();
        assert_eq!(report.engaged_ms, 500);
        assert_eq!(report.scroll_depth, 25);
        assert_eq!(tracker.phase(), EngagementPhase::Suspended);
    }

    #[test]
    fn test_threshold_without_scroll() {
        let mut tracker = opened(0);
        tracker.on_visibility(VisibilityState::Hidden, true, 100);

        // Depth unchanged, under the threshold: nothing.
        tracker.on_visibility(VisibilityState::Visible, true, 1_000);
        assert!(tracker
            .on_visibility(VisibilityState::Hidden, true, 3_999)
            .is_none());
        assert_eq!(tracker.engaged_ms(3_999), 2_999);

        // One more millisecond crosses it exactly once.
        tracker.on_visibility(VisibilityState::Visible, true, 5_000);
        let report = tracker
            .on_visibility(VisibilityState::Hidden, true, 5_001)
            .unwrap();
        assert_eq!(report.engaged_ms, 3_000);
        assert!(tracker
            .on_visibility(VisibilityState::Hidden, true, 6_000)
            .is_none());
    }

    #[test]
    fn test_deeper_scroll_reports_again() {
        let mut tracker = opened(0);
        tracker.on_visibility(VisibilityState::Hidden, true, 100);
        tracker.on_visibility(VisibilityState::Visible, true, 200);
        tracker.on_scroll(&DocumentMetrics::new(4000.0, 1000.0, 1000.0));
        let report = tracker
            .on_visibility(VisibilityState::Visible, false, 300)
            .unwrap();
        assert_eq!(report.scroll_depth, 50);
        assert_eq!(report.engaged_ms, 100);
    }

    #[test]
    fn test_scrolling_up_keeps_max() {
        let mut tracker = opened(0);
        tracker.on_scroll(&DocumentMetrics::new(4000.0, 1000.0, 3000.0));
        tracker.on_scroll(&DocumentMetrics::new(4000.0, 1000.0, 0.0));
        assert_eq!(tracker.max_scroll_depth_px(), 4000.0);
    }

    #[test]
    fn test_ignored_page_never_reports() {
        let mut tracker = opened(0);
        tracker.mark_ignored();
        tracker.on_scroll(&DocumentMetrics::new(4000.0, 1000.0, 3000.0));
        assert_eq!(tracker.phase(), EngagementPhase::Closed);
        assert!(tracker
            .on_visibility(VisibilityState::Hidden, true, 10_000)
            .is_none());
        assert!(tracker.before_pageview(&long_page(), 20_000).is_none());
    }

    #[test]
    fn test_before_pageview_closes_previous_page() {
        let mut tracker = opened(0);
        let report = tracker.before_pageview(&long_page(), 4_000).unwrap();
        assert_eq!(report.url, "https://example.com/");
        assert_eq!(report.engaged_ms, 4_000);

        assert!(!tracker.start_page("https://example.com/next".into(), None, 4_000));
        let next = tracker
            .on_visibility(VisibilityState::Hidden, true, 4_010)
            .unwrap();
        assert_eq!(next.url, "https://example.com/next");
        assert_eq!(next.engaged_ms, 10);
    }

    #[test]
    fn test_idle_ignores_visibility() {
        let mut tracker = EngagementTracker::new(&long_page());
        assert_eq!(tracker.phase(), EngagementPhase::Idle);
        assert!(tracker
            .on_visibility(VisibilityState::Hidden, false, 5_000)
            .is_none());
        assert!(tracker.before_pageview(&long_page(), 5_000).is_none());
    }

    #[test]
    fn test_resample_stops_after_fifteen_ticks() {
        let mut tracker = opened(0);
        tracker.on_load(&long_page());
        let ticks = (0..20)
            .take_while(|_| tracker.resample(&long_page()))
            .count();
        assert_eq!(ticks, RESAMPLE_TICKS as usize - 1);
    }

    #[test]
    fn test_payload_shape() {
        let payload = EngagementReport {
            url: "https://example.com/#/a".into(),
            props: None,
            scroll_depth: 40,
            engaged_ms: 3_200,
        }
        .into_payload("example.com", true);
        assert!(payload.is_engagement());
        assert_eq!(payload.scroll_depth, Some(40));
        assert_eq!(payload.engagement_time, Some(3_200));
        #[cfg(feature = "hash")]
        assert_eq!(payload.hash_routing, Some(1));
        #[cfg(not(feature = "hash"))]
        assert_eq!(payload.hash_routing, None);
        assert_eq!(scroll_percentage(10.0, 0.0), 0);
    }
}
