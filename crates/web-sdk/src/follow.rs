//! Navigation held back until its event is delivered (compat builds).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::custom_events::FollowAction;
use crate::page::Page;

/// Delay before a held-back navigation proceeds without a delivery callback.
pub const FOLLOW_THROUGH_DELAY_MS: u64 = 5000;

/// A navigation performed at most once, by whichever of the delivery
/// callback and the fallback timer gets there first.
#[derive(Debug, Clone)]
pub struct FollowThrough {
    action: FollowAction,
    done: Arc<AtomicBool>,
}

impl FollowThrough {
    pub fn new(action: FollowAction) -> Self {
        Self {
            action,
            done: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn action(&self) -> &FollowAction {
        &self.action
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Perform the navigation unless it already happened.
    pub fn run(&self, page: &dyn Page) -> bool {
        if self.done.swap(true, Ordering::AcqRel) {
            return false;
        }
        match &self.action {
            FollowAction::Navigate(href) => {
                debug!(href = %href, "following held-back link");
                page.navigate(href);
            }
            FollowAction::SubmitForm(form) => {
                debug!(form = ?form.id, "submitting held-back form");
                page.submit_form(form);
            }
        }
        true
    }
}
