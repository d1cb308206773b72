//! Pageview autocapture: one pageview per logical navigation.
//!
//! The host forwards navigation-related [`DomEvent`]s instead of the tracker
//! patching `history.pushState`. Which events count is decided by a
//! [`NavigationSource`] chosen once at start.

use tracing::debug;

use crate::events::DomEvent;
use crate::page::{Page, VisibilityState};

/// Where SPA navigations come from.
pub trait NavigationSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether `event` is a navigation for this source.
    fn is_navigation(&self, event: &DomEvent) -> bool;

    /// Whether a navigation to the path already tracked is dropped.
    fn dedups_by_path(&self) -> bool;
}

/// `pushState` and `popstate`. Without History API support nothing is
/// subscribed.
#[derive(Debug, Clone, Copy)]
pub struct HistorySource {
    supported: bool,
}

impl HistorySource {
    pub fn new(supported: bool) -> Self {
        Self { supported }
    }
}

impl NavigationSource for HistorySource {
    fn name(&self) -> &'static str {
        "history"
    }

    fn is_navigation(&self, event: &DomEvent) -> bool {
        self.supported && matches!(event, DomEvent::PushState | DomEvent::PopState)
    }

    fn dedups_by_path(&self) -> bool {
        true
    }
}

/// `hashchange`; every change is a pageview, even back to the same path.
#[cfg(feature = "hash")]
#[derive(Debug, Clone, Copy, Default)]
pub struct HashSource;

#[cfg(feature = "hash")]
impl NavigationSource for HashSource {
    fn name(&self) -> &'static str {
        "hashchange"
    }

    fn is_navigation(&self, event: &DomEvent) -> bool {
        matches!(event, DomEvent::HashChange)
    }

    fn dedups_by_path(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationTrigger {
    InitialLoad,
    Spa,
    /// `pageshow` from the back/forward cache.
    Restore,
}

pub struct NavigationWatcher {
    source: Box<dyn NavigationSource>,
    last_page: Option<String>,
    awaiting_visible: bool,
}

impl NavigationWatcher {
    pub fn new(source: Box<dyn NavigationSource>) -> Self {
        Self {
            source,
            last_page: None,
            awaiting_visible: false,
        }
    }

    /// Hash routing is only honoured by builds with the `hash` feature.
    pub fn for_page(page: &dyn Page, hash_routing: bool) -> Self {
        #[cfg(feature = "hash")]
        if hash_routing {
            return Self::new(Box::new(HashSource));
        }
        #[cfg(not(feature = "hash"))]
        let _ = hash_routing;
        Self::new(Box::new(HistorySource::new(page.supports_history())))
    }

    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    /// Initial page: tracked now when visible, otherwise on the first
    /// `visibilitychange` to visible.
    pub fn start(&mut self, page: &dyn Page) -> Option<NavigationTrigger> {
        if page.visibility() == VisibilityState::Visible {
            self.record(page);
            Some(NavigationTrigger::InitialLoad)
        } else {
            debug!(visibility = ?page.visibility(), "deferring initial pageview");
            self.awaiting_visible = true;
            None
        }
    }

    pub fn handle(&mut self, event: &DomEvent, page: &dyn Page) -> Option<NavigationTrigger> {
        match event {
            DomEvent::VisibilityChange if self.awaiting_visible => {
                if self.last_page.is_some() || page.visibility() != VisibilityState::Visible {
                    return None;
                }
                self.awaiting_visible = false;
                self.record(page);
                Some(NavigationTrigger::InitialLoad)
            }
            DomEvent::PageShow { persisted: true } => {
                self.record(page);
                Some(NavigationTrigger::Restore)
            }
            event if self.source.is_navigation(event) => {
                let path = page.location().pathname;
                if self.source.dedups_by_path() && self.last_page.as_deref() == Some(path.as_str()) {
                    debug!(path = %path, "navigation to current path ignored");
                    return None;
                }
                self.last_page = Some(path);
                Some(NavigationTrigger::Spa)
            }
            _ => None,
        }
    }

    fn record(&mut self, page: &dyn Page) {
        self.last_page = Some(page.location().pathname);
    }
}

impl std::fmt::Debug for NavigationWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NavigationWatcher")
            .field("source", &self.source.name())
            .field("last_page", &self.last_page)
            .field("awaiting_visible", &self.awaiting_visible)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::SimulatedPage;

    fn page(href: &str) -> SimulatedPage {
        SimulatedPage::new(href).unwrap()
    }

    #[test]
    fn test_history_dedups_same_path() {
        let page = page("https://example.com/");
        let mut watcher = NavigationWatcher::for_page(&page, false);
        assert_eq!(watcher.start(&page), Some(NavigationTrigger::InitialLoad));

        page.set_url("https://example.com/a").unwrap();
        assert_eq!(
            watcher.handle(&DomEvent::PushState, &page),
            Some(NavigationTrigger::Spa)
        );
        page.set_url("https://example.com/a?tab=2").unwrap();
        assert_eq!(watcher.handle(&DomEvent::PushState, &page), None);
        assert_eq!(watcher.handle(&DomEvent::PopState, &page), None);
        assert_eq!(watcher.handle(&DomEvent::HashChange, &page), None);
    }

    #[cfg(feature = "hash")]
    #[test]
    fn test_hash_fires_every_change() {
        let page = page("https://example.com/#/a");
        let mut watcher = NavigationWatcher::for_page(&page, true);
        assert_eq!(watcher.source_name(), "hashchange");
        watcher.start(&page);
        for _ in 0..2 {
            assert_eq!(
                watcher.handle(&DomEvent::HashChange, &page),
                Some(NavigationTrigger::Spa)
            );
        }
        assert_eq!(watcher.handle(&DomEvent::PushState, &page), None);
    }

    #[test]
    fn test_no_history_support() {
        let page = page("https://example.com/");
        page.set_supports_history(false);
        let mut watcher = NavigationWatcher::for_page(&page, false);
        watcher.start(&page);
        page.set_url("https://example.com/b").unwrap();
        assert_eq!(watcher.handle(&DomEvent::PushState, &page), None);
    }

    #[test]
    fn test_hidden_start_waits_for_visible() {
        let page = page("https://example.com/");
        page.set_visibility(VisibilityState::Prerender);
        let mut watcher = NavigationWatcher::for_page(&page, false);
        assert_eq!(watcher.start(&page), None);
        assert_eq!(watcher.handle(&DomEvent::VisibilityChange, &page), None);

        page.set_visibility(VisibilityState::Visible);
        assert_eq!(
            watcher.handle(&DomEvent::VisibilityChange, &page),
            Some(NavigationTrigger::InitialLoad)
        );
        page.set_visibility(VisibilityState::Hidden);
        page.set_visibility(VisibilityState::Visible);
        assert_eq!(watcher.handle(&DomEvent::VisibilityChange, &page), None);
    }

    #[test]
    fn test_bfcache_restore_bypasses_dedup() {
        let page = page("https://example.com/");
        let mut watcher = NavigationWatcher::for_page(&page, false);
        watcher.start(&page);
        assert_eq!(
            watcher.handle(&DomEvent::PageShow { persisted: true }, &page),
            Some(NavigationTrigger::Restore)
        );
        assert_eq!(
            watcher.handle(&DomEvent::PageShow { persisted: false }, &page),
            None
        );
    }
}
