//! The public call contract: `plausible(name, options)`, `plausible.init()`
//! and the `plausible.l` flag, with calls made before initialisation queued
//! and replayed in order.

use tracing::{debug, info, warn};

use tracker_core::{EventOptions, TrackerError, TrackerResult};

use crate::config::{ConfigOverrides, ConfigResolver, ConfigSource};
use crate::events::{Disposition, DomEvent};
use crate::tracker::{Environment, TrackOutcome, TrackerInstance};

/// A call made before the tracker was initialised (`plausible.q`).
#[derive(Debug)]
pub struct QueuedCall {
    pub name: String,
    pub options: EventOptions,
}

#[derive(Debug)]
pub struct Plausible {
    resolver: ConfigResolver,
    env: Option<Environment>,
    tracker: Option<TrackerInstance>,
    queue: Vec<QueuedCall>,
}

impl Plausible {
    pub fn new(source: ConfigSource, env: Environment) -> Self {
        Self {
            resolver: ConfigResolver::new(source),
            env: Some(env),
            tracker: None,
            queue: Vec::new(),
        }
    }

    /// Script-tag builds configure themselves as soon as the script runs.
    pub fn load(&mut self) -> TrackerResult<()> {
        self.init(None)
    }

    /// Resolve the config, fire the initial pageview and replay the queue.
    /// Fails on a second call and when no domain is known. Nothing is
    /// committed until the tracker has started, so a failed call can be
    /// retried; a queued call that fails is logged and skipped.
    pub fn init(&mut self, overrides: Option<ConfigOverrides>) -> TrackerResult<()> {
        let env = match &self.env {
            Some(env) => env.clone(),
            None => return Err(TrackerError::AlreadyInitialized),
        };
        let config = self.resolver.prepare(&env.page.location(), overrides)?;

        info!(domain = %config.domain, "plausible initialised");
        let mut tracker = TrackerInstance::new(config, env)?;
        tracker.start()?;

        self.resolver.mark_initialized();
        self.env = None;
        let tracker = self.tracker.insert(tracker);

        let queued = std::mem::take(&mut self.queue);
        if !queued.is_empty() {
            debug!(count = queued.len(), "replaying queued calls");
        }
        for call in queued {
            if let Err(e) = tracker.track(&call.name, call.options) {
                warn!(event = %call.name, error = %e, "queued call failed");
            }
        }
        Ok(())
    }

    /// `plausible.l`
    pub fn is_loaded(&self) -> bool {
        self.tracker.is_some()
    }

    /// `plausible(name, options)`. Before initialisation the call is queued
    /// and `None` is returned.
    pub fn call(
        &mut self,
        name: impl Into<String>,
        options: EventOptions,
    ) -> TrackerResult<Option<TrackOutcome>> {
        let name = name.into();
        match self.tracker.as_mut() {
            Some(tracker) => tracker.track(&name, options).map(Some),
            None => {
                self.queue.push(QueuedCall { name, options });
                Ok(None)
            }
        }
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Forward a DOM event. Nothing is listening before initialisation.
    pub fn dispatch(&mut self, event: DomEvent) -> TrackerResult<Disposition> {
        match self.tracker.as_mut() {
            Some(tracker) => tracker.dispatch(event),
            None => Ok(Disposition::Proceed),
        }
    }

    pub fn run_timers(&mut self) -> usize {
        self.tracker.as_mut().map_or(0, TrackerInstance::run_timers)
    }

    pub fn tracker(&self) -> Option<&TrackerInstance> {
        self.tracker.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::ScriptTag;
    use crate::page::SimulatedPage;
    use tracker_core::CaptureTransport;

    fn env(href: &str) -> (Environment, Arc<CaptureTransport>) {
        let page = Arc::new(SimulatedPage::new(href).unwrap());
        let transport = Arc::new(CaptureTransport::new());
        (Environment::new(page, transport.clone()), transport)
    }

    #[test]
    fn test_init_twice_fails() {
        let (env, _) = env("https://example.com/");
        let mut plausible = Plausible::new(ConfigSource::Library, env);
        plausible
            .init(Some(ConfigOverrides::domain("example.com")))
            .unwrap();
        assert!(plausible.is_loaded());
        assert!(matches!(
            plausible.init(Some(ConfigOverrides::domain("example.com"))),
            Err(TrackerError::AlreadyInitialized)
        ));
    }

    #[test]
    fn test_missing_domain_keeps_tracker_unloaded() {
        let (env, _) = env("https://example.com/");
        let mut plausible = Plausible::new(ConfigSource::Library, env);
        assert!(matches!(
            plausible.init(None),
            Err(TrackerError::MissingDomain)
        ));
        assert!(!plausible.is_loaded());
        plausible
            .init(Some(ConfigOverrides::domain("example.com")))
            .unwrap();
        assert!(plausible.is_loaded());
    }

    #[test]
    #[cfg(feature = "exclusions")]
    fn test_failed_init_can_be_retried() {
        let (env, transport) = env("https://example.com/");
        let mut plausible = Plausible::new(ConfigSource::Library, env);
        plausible.call("Queued", EventOptions::new()).unwrap();

        // Over the regex size limit, so the tracker fails to build after the
        // config itself resolved.
        let oversized = ConfigOverrides {
            exclude_paths: Some(vec!["/*".repeat(200_000)]),
            ..ConfigOverrides::domain("example.com")
        };
        assert!(matches!(
            plausible.init(Some(oversized)),
            Err(TrackerError::InvalidPattern(_))
        ));
        assert!(!plausible.is_loaded());
        assert_eq!(plausible.queued(), 1);
        assert_eq!(transport.count(), 0);

        plausible
            .init(Some(ConfigOverrides::domain("example.com")))
            .unwrap();
        assert!(plausible.is_loaded());
        assert_eq!(plausible.queued(), 0);
        let names: Vec<String> = transport.payloads().into_iter().map(|p| p.name).collect();
        assert_eq!(names.last().map(String::as_str), Some("Queued"));
    }

    #[test]
    fn test_queue_replayed_after_initial_pageview() {
        let (env, transport) = env("https://example.com/");
        let mut plausible = Plausible::new(
            ConfigSource::ScriptTag(ScriptTag::new("/js/script.js").attr("data-domain", "example.com")),
            env,
        );
        assert_eq!(plausible.call("First", EventOptions::new()).unwrap(), None);
        assert_eq!(plausible.call("Second", EventOptions::new()).unwrap(), None);
        assert_eq!(plausible.queued(), 2);

        plausible.load().unwrap();
        let names: Vec<String> = transport.payloads().into_iter().map(|p| p.name).collect();
        let expected: Vec<&str> = if crate::features::MANUAL {
            vec!["First", "Second"]
        } else {
            vec!["pageview", "First", "Second"]
        };
        assert_eq!(names, expected);
        assert_eq!(plausible.queued(), 0);
        assert_eq!(
            plausible.call("Third", EventOptions::new()).unwrap(),
            Some(TrackOutcome::Sent)
        );
    }

    #[test]
    fn test_dispatch_before_init() {
        let (env, transport) = env("https://example.com/");
        let mut plausible = Plausible::new(ConfigSource::Library, env);
        assert_eq!(
            plausible.dispatch(DomEvent::PushState).unwrap(),
            Disposition::Proceed
        );
        assert_eq!(plausible.run_timers(), 0);
        assert_eq!(transport.count(), 0);
    }
}
