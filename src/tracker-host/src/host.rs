//! Applies host commands to one page and its tracker.

use std::sync::Arc;

use tracing::debug;

use tracker_core::TrackerResult;
use tracker_web_sdk::page::DocumentMetrics;
use tracker_web_sdk::{ConfigSource, Environment, Plausible, SimulatedPage};

use crate::commands::{HostCommand, Reply};

pub struct Host {
    page: Arc<SimulatedPage>,
    plausible: Plausible,
}

impl Host {
    pub fn new(page: Arc<SimulatedPage>, source: ConfigSource, env: Environment) -> Self {
        Self {
            page,
            plausible: Plausible::new(source, env),
        }
    }

    pub fn plausible(&self) -> &Plausible {
        &self.plausible
    }

    /// Run the script: script-tag and injected builds configure themselves
    /// on load, library builds wait for an `init` command.
    pub fn load(&mut self, source_is_library: bool) -> TrackerResult<()> {
        if source_is_library {
            return Ok(());
        }
        self.plausible.load()
    }

    /// Apply one command. Errors are reported in the reply.
    pub fn apply(&mut self, command: HostCommand) -> Reply {
        debug!(?command, "host command");
        match self.try_apply(command) {
            Ok(reply) => reply,
            Err(e) => Reply::Error {
                message: e.to_string(),
            },
        }
    }

    fn try_apply(&mut self, command: HostCommand) -> TrackerResult<Reply> {
        let reply = match command {
            HostCommand::SetUrl { url } => {
                self.page.set_url(&url)?;
                Reply::Ok
            }
            HostCommand::SetReferrer { referrer } => {
                self.page.set_referrer(referrer.as_deref());
                Reply::Ok
            }
            HostCommand::SetVisibility { state } => {
                self.page.set_visibility(state);
                Reply::Ok
            }
            HostCommand::SetFocus { focused } => {
                self.page.set_focus(focused);
                Reply::Ok
            }
            HostCommand::SetMetrics {
                document_height,
                viewport_height,
                scroll_y,
            } => {
                self.page.set_metrics(DocumentMetrics::new(
                    document_height,
                    viewport_height,
                    scroll_y,
                ));
                Reply::Ok
            }
            HostCommand::ScrollTo { y } => {
                self.page.scroll_to(y);
                Reply::Ok
            }
            HostCommand::SetStorage { key, value } => {
                self.page.set_storage_item(&key, &value);
                Reply::Ok
            }
            HostCommand::Init { overrides } => {
                self.plausible.init(overrides)?;
                Reply::Ok
            }
            HostCommand::Call { name, options } => {
                Reply::from(self.plausible.call(name, options.into())?)
            }
            HostCommand::Dispatch { event } => Reply::Dispatched {
                disposition: self.plausible.dispatch(event)?,
            },
            HostCommand::RunTimers => Reply::TimersRun {
                fired: self.plausible.run_timers(),
            },
        };
        Ok(reply)
    }
}
