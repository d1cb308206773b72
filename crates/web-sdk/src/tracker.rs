//! One tracker per page context. Owns the resolved config and the
//! engagement state, and turns DOM events and explicit calls into payloads.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use tracker_core::{
    Clock, Completion, DeliveryRequest, EventOptions, EventPayload, Props, SystemClock,
    Transport, TrackerResult, PAGEVIEW,
};

use crate::automation::{AutomationDetector, KnownMarkersDetector};
use crate::config::Config;
use crate::custom_events::{CustomEventDetector, DetectorSettings};
use crate::engagement::{EngagementReport, EngagementTracker, RESAMPLE_INTERVAL_MS};
use crate::events::{Disposition, DomEvent, Interaction, InteractionKind};
#[cfg(feature = "exclusions")]
use crate::exclusions::{match_subject, ExclusionRules};
use crate::features;
#[cfg(feature = "compat")]
use crate::follow::{FollowThrough, FOLLOW_THROUGH_DELAY_MS};
use crate::navigation::NavigationWatcher;
use crate::page::{Location, Page};
use crate::timers::{TimerId, TimerQueue, TimerTask};

/// `localStorage` key that opts a browser out of tracking.
pub const OPT_OUT_KEY: &str = "plausible_ignore";

/// Everything the tracker needs from its host.
#[derive(Clone)]
pub struct Environment {
    pub page: Arc<dyn Page>,
    pub transport: Arc<dyn Transport>,
    pub clock: Arc<dyn Clock>,
    pub automation: Arc<dyn AutomationDetector>,
}

impl Environment {
    pub fn new(page: Arc<dyn Page>, transport: Arc<dyn Transport>) -> Self {
        Self {
            page,
            transport,
            clock: Arc::new(SystemClock),
            automation: Arc::new(KnownMarkersDetector),
        }
    }

    /// Wall clock, known-marker automation detection and the transport the
    /// build selects.
    pub fn browser(page: Arc<dyn Page>) -> TrackerResult<Self> {
        let transport = tracker_delivery::default_transport().map_err(anyhow::Error::from)?;
        Ok(Self::new(page, transport))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_automation(mut self, detector: Arc<dyn AutomationDetector>) -> Self {
        self.automation = detector;
        self
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("location", &self.page.location().href)
            .field("transport", &self.transport.name())
            .finish()
    }
}

/// Why an event was dropped before delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    Localhost,
    FileProtocol,
    Automation,
    OptOut,
    Excluded,
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            IgnoreReason::Localhost => "localhost",
            IgnoreReason::FileProtocol => "file:// protocol",
            IgnoreReason::Automation => "automated browser",
            IgnoreReason::OptOut => "localStorage flag",
            IgnoreReason::Excluded => "exclusion rule",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOutcome {
    Sent,
    Ignored(IgnoreReason),
}

pub struct TrackerInstance {
    config: Config,
    env: Environment,
    engagement: EngagementTracker,
    detector: CustomEventDetector,
    navigation: NavigationWatcher,
    timers: TimerQueue,
    resample_timer: Option<TimerId>,
    #[cfg(feature = "exclusions")]
    exclusions: ExclusionRules,
    started: bool,
}

impl TrackerInstance {
    pub fn new(config: Config, env: Environment) -> TrackerResult<Self> {
        let detector = CustomEventDetector::new(DetectorSettings::from_config(&config))?;
        #[cfg(feature = "exclusions")]
        let exclusions = ExclusionRules::new(&config.include_paths, &config.exclude_paths)?;
        let navigation = NavigationWatcher::for_page(env.page.as_ref(), config.hash_routing());
        let engagement = EngagementTracker::new(&env.page.metrics());

        Ok(Self {
            config,
            env,
            engagement,
            detector,
            navigation,
            timers: TimerQueue::new(),
            resample_timer: None,
            #[cfg(feature = "exclusions")]
            exclusions,
            started: false,
        })
    }

    /// Fire the initial pageview when autocapture is on. Idempotent.
    pub fn start(&mut self) -> TrackerResult<()> {
        if self.started {
            return Ok(());
        }
        self.started = true;
        info!(
            domain = %self.config.domain,
            endpoint = %self.config.endpoint,
            transport = self.env.transport.name(),
            navigation = self.navigation.source_name(),
            features = ?features::compiled_features(),
            "tracker started"
        );

        if self.config.autocaptures_pageviews()
            && self.navigation.start(self.env.page.as_ref()).is_some()
        {
            self.track(PAGEVIEW, EventOptions::default())?;
        }
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn engagement(&self) -> &EngagementTracker {
        &self.engagement
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Track one event. Pageviews first close the previous page's
    /// engagement.
    pub fn track(&mut self, name: &str, options: EventOptions) -> TrackerResult<TrackOutcome> {
        let is_pageview = name == PAGEVIEW;
        let now = self.env.clock.now_ms();

        if is_pageview {
            let metrics = self.env.page.metrics();
            if let Some(report) = self.engagement.before_pageview(&metrics, now) {
                self.send_engagement(report)?;
            }
        }

        let location = self.env.page.location();
        if let Some(reason) = self.ignore_reason(&location, is_pageview) {
            if self.config.logging {
                warn!(event = name, reason = %reason, "Ignoring Event");
            }
            if let Some(callback) = options.callback {
                callback(None);
            }
            if is_pageview {
                self.engagement.mark_ignored();
            }
            return Ok(TrackOutcome::Ignored(reason));
        }

        let EventOptions {
            props,
            revenue,
            interactive,
            callback,
            meta,
            url,
        } = options;

        let url = url.unwrap_or_else(|| location.href.clone());
        let mut payload = EventPayload::new(name, url, &self.config.domain, self.env.page.referrer());
        if let Some(meta) = meta {
            payload.meta = Some(serde_json::to_string(&meta)?);
        }
        if interactive == Some(false) {
            payload.interactive = Some(false);
        }
        #[cfg(feature = "revenue")]
        if self.config.tracks_revenue() {
            payload.revenue = revenue;
        }
        #[cfg(not(feature = "revenue"))]
        let _ = revenue;
        payload.props = self.merge_props(name, props);
        #[cfg(feature = "hash")]
        if self.config.hash_routing() {
            payload.hash_routing = Some(1);
        }

        let page_url = payload.url.clone();
        let page_props = payload.props.clone();
        self.deliver(&payload, Completion::new(callback))?;

        if is_pageview && self.engagement.start_page(page_url, page_props, now) {
            debug!("engagement listeners registered");
        }
        Ok(TrackOutcome::Sent)
    }

    /// Route one DOM event. Only interactions may ask for the default action
    /// to be prevented.
    pub fn dispatch(&mut self, event: DomEvent) -> TrackerResult<Disposition> {
        let now = self.env.clock.now_ms();
        match &event {
            DomEvent::Load => {
                self.engagement.on_load(&self.env.page.metrics());
                if let Some(previous) = self.resample_timer.take() {
                    self.timers.cancel(previous);
                }
                self.resample_timer = Some(self.timers.schedule_interval(
                    now,
                    RESAMPLE_INTERVAL_MS,
                    TimerTask::ResampleHeight,
                ));
            }
            DomEvent::Scroll => self.engagement.on_scroll(&self.env.page.metrics()),
            DomEvent::VisibilityChange | DomEvent::Focus | DomEvent::Blur => {
                let report = self.engagement.on_visibility(
                    self.env.page.visibility(),
                    self.env.page.has_focus(),
                    now,
                );
                if let Some(report) = report {
                    self.send_engagement(report)?;
                }
            }
            DomEvent::Interaction(interaction) => return self.handle_interaction(interaction),
            _ => {}
        }

        if self.config.autocaptures_pageviews() {
            if let Some(trigger) = self.navigation.handle(&event, self.env.page.as_ref()) {
                debug!(?trigger, "navigation");
                self.track(PAGEVIEW, EventOptions::default())?;
            }
        }
        Ok(Disposition::Proceed)
    }

    /// Run every timer due now. Returns how many fired.
    pub fn run_timers(&mut self) -> usize {
        let now = self.env.clock.now_ms();
        let mut fired = 0;
        while let Some((id, task)) = self.timers.pop_due(now) {
            fired += 1;
            match task {
                TimerTask::ResampleHeight => {
                    if !self.engagement.resample(&self.env.page.metrics()) {
                        self.timers.cancel(id);
                        self.resample_timer = None;
                    }
                }
                #[cfg(feature = "compat")]
                TimerTask::FollowThrough(follow) => {
                    if follow.run(self.env.page.as_ref()) {
                        debug!("delivery did not call back in time, followed anyway");
                    }
                }
            }
        }
        fired
    }

    fn handle_interaction(&mut self, interaction: &Interaction) -> TrackerResult<Disposition> {
        let settings = self.detector.settings();
        let listening = match interaction.kind {
            InteractionKind::Submit => settings.listens_for_submits(),
            InteractionKind::Click | InteractionKind::AuxClick => settings.listens_for_clicks(),
        };
        if !listening {
            return Ok(Disposition::Proceed);
        }

        let host = self.env.page.location().host;
        let Some(detected) = self.detector.classify(interaction, &host) else {
            return Ok(Disposition::Proceed);
        };
        debug!(class = ?detected.class, name = %detected.name, "custom event");

        let mut options = EventOptions::new();
        if !detected.props.is_empty() {
            options = options.with_props(detected.props);
        }
        if let Some(revenue) = detected.revenue {
            options = options.with_revenue(revenue);
        }

        #[cfg(feature = "compat")]
        if let Some(action) = detected.follow {
            let follow = FollowThrough::new(action);
            let page = self.env.page.clone();
            let on_delivered = follow.clone();
            options = options.with_callback(move |_| {
                on_delivered.run(page.as_ref());
            });
            let now = self.env.clock.now_ms();
            self.timers
                .schedule_once(now, FOLLOW_THROUGH_DELAY_MS, TimerTask::FollowThrough(follow));
            self.track(&detected.name, options)?;
            return Ok(Disposition::PreventDefault);
        }

        self.track(&detected.name, options)?;
        Ok(Disposition::Proceed)
    }

    fn ignore_reason(&self, location: &Location, is_pageview: bool) -> Option<IgnoreReason> {
        if location.is_local() && !self.config.captures_on_localhost() {
            return Some(if location.protocol == "file:" {
                IgnoreReason::FileProtocol
            } else {
                IgnoreReason::Localhost
            });
        }
        if self.env.automation.is_automated(&self.env.page.automation()) {
            return Some(IgnoreReason::Automation);
        }
        if self.env.page.storage_item(OPT_OUT_KEY).as_deref() == Some("true") {
            return Some(IgnoreReason::OptOut);
        }
        #[cfg(feature = "exclusions")]
        if is_pageview && self.config.applies_exclusions() {
            let subject = match_subject(location, self.config.hash_routing());
            if !self.exclusions.is_pageview_allowed(&subject) {
                return Some(IgnoreReason::Excluded);
            }
        }
        #[cfg(not(feature = "exclusions"))]
        let _ = is_pageview;
        None
    }

    /// Custom properties under static script props under explicit props.
    fn merge_props(&self, name: &str, explicit: Option<Props>) -> Option<Props> {
        let mut merged = self
            .config
            .custom_properties
            .resolve(name)
            .unwrap_or_default();
        #[cfg(feature = "pageview-props")]
        if self.config.sends_pageview_props() {
            merged.extend(self.config.static_props.clone());
        }
        let had_explicit = explicit.is_some();
        if let Some(explicit) = explicit {
            merged.extend(explicit);
        }
        (had_explicit || !merged.is_empty()).then_some(merged)
    }

    fn send_engagement(&self, report: EngagementReport) -> TrackerResult<()> {
        let payload = report.into_payload(&self.config.domain, self.config.hash_routing());
        self.deliver(&payload, Completion::none())
    }

    fn deliver(&self, payload: &EventPayload, completion: Completion) -> TrackerResult<()> {
        let request = DeliveryRequest::new(self.config.endpoint.clone(), payload)?;
        debug!(
            event = %payload.name,
            transport = self.env.transport.name(),
            "sending event"
        );
        self.env.transport.send(request, completion);
        Ok(())
    }
}

impl fmt::Debug for TrackerInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackerInstance")
            .field("domain", &self.config.domain)
            .field("engagement", &self.engagement.phase())
            .field("navigation", &self.navigation)
            .field("pending_timers", &self.timers.len())
            .finish()
    }
}
