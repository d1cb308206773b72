//! Automation and headless-browser detection.

use crate::page::AutomationSignals;

pub trait AutomationDetector: Send + Sync {
    fn is_automated(&self, signals: &AutomationSignals) -> bool;
}

/// Flags PhantomJS, Nightmare, WebDriver and Cypress unless the page set the
/// explicit tracking override.
#[derive(Debug, Default, Clone, Copy)]
pub struct KnownMarkersDetector;

impl AutomationDetector for KnownMarkersDetector {
    fn is_automated(&self, signals: &AutomationSignals) -> bool {
        let marked = signals.phantom || signals.nightmare || signals.webdriver || signals.cypress;
        marked && !signals.tracking_override
    }
}

/// Treats every browser as a real user.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverAutomated;

impl AutomationDetector for NeverAutomated {
    fn is_automated(&self, _signals: &AutomationSignals) -> bool {
        false
    }
}
