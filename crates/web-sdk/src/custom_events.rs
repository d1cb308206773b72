//! Custom-event detection: turns clicks and submits into outbound-link,
//! file-download, tagged, or form-submission events. Each detection is only
//! compiled into builds that enable its feature.

#[cfg(feature = "tagged-events")]
use regex::Regex;
#[cfg(feature = "outbound-links")]
use url::Url;

#[cfg(any(feature = "outbound-links", feature = "file-downloads"))]
use tracker_core::props;
use tracker_core::{Props, Revenue, TrackerResult};

use crate::config::Config;
use crate::events::{Element, Interaction, InteractionKind};

#[cfg(feature = "file-downloads")]
pub const DEFAULT_FILE_TYPES: &[&str] = &[
    "pdf", "xlsx", "docx", "txt", "rtf", "csv", "exe", "key", "pps", "ppt", "pptx", "7z", "pkg",
    "rar", "gz", "zip", "avi", "mov", "mp4", "mpeg", "wmv", "midi", "mp3", "wav", "wma", "dmg",
];

/// How many ancestors above an element are searched for tags.
pub const PARENTS_TO_SEARCH_LIMIT: usize = 3;
pub const MIDDLE_MOUSE_BUTTON: u16 = 1;

#[cfg(feature = "outbound-links")]
pub const OUTBOUND_LINK_CLICK: &str = "Outbound Link: Click";
#[cfg(feature = "file-downloads")]
pub const FILE_DOWNLOAD: &str = "File Download";
#[cfg(feature = "form-submissions")]
pub const FORM_SUBMISSION: &str = "Form: Submission";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventClass {
    #[cfg(feature = "outbound-links")]
    OutboundLink,
    #[cfg(feature = "file-downloads")]
    FileDownload,
    #[cfg(feature = "tagged-events")]
    TaggedElement,
    #[cfg(feature = "tagged-events")]
    TaggedLink,
    #[cfg(feature = "tagged-events")]
    TaggedForm,
    #[cfg(feature = "form-submissions")]
    FormSubmission,
}

/// The browser default an interaction would have performed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowAction {
    Navigate(String),
    SubmitForm(Element),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectedEvent {
    pub class: EventClass,
    pub name: String,
    pub props: Props,
    pub revenue: Option<Revenue>,
    /// Set when the interaction navigates the current browsing context, so
    /// compat builds can hold it back until the event is sent.
    pub follow: Option<FollowAction>,
}

/// Which detections are live, resolved from build flags and config.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectorSettings {
    pub outbound_links: bool,
    pub file_downloads: bool,
    pub tagged_events: bool,
    pub revenue: bool,
    pub form_submissions: bool,
    #[cfg(feature = "file-downloads")]
    pub file_types: Vec<String>,
}

impl DetectorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            outbound_links: config.tracks_outbound_links(),
            file_downloads: config.tracks_file_downloads(),
            tagged_events: config.tracks_tagged_events(),
            revenue: config.tracks_revenue(),
            form_submissions: config.tracks_form_submissions(),
            #[cfg(feature = "file-downloads")]
            file_types: config.file_types.clone(),
        }
    }

    pub fn listens_for_clicks(&self) -> bool {
        self.outbound_links || self.file_downloads || self.tagged_events
    }

    pub fn listens_for_submits(&self) -> bool {
        self.tagged_events || self.form_submissions
    }
}

/// Name, props and revenue read from `plausible-event-*` and
/// `plausible-revenue-*` classes.
#[cfg(feature = "tagged-events")]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaggedAttributes {
    pub name: Option<String>,
    pub props: Props,
    pub revenue: Revenue,
}

#[cfg(feature = "tagged-events")]
#[derive(Debug, Clone)]
pub struct TagParser {
    event: Regex,
    #[cfg(feature = "revenue")]
    revenue: Regex,
    name_marker: Regex,
}

#[cfg(feature = "tagged-events")]
impl TagParser {
    pub fn new() -> TrackerResult<Self> {
        Ok(Self {
            event: Regex::new(r"plausible-event-(.+)(=|--)(.+)")?,
            #[cfg(feature = "revenue")]
            revenue: Regex::new(r"plausible-revenue-(.+)(=|--)(.+)")?,
            name_marker: Regex::new(r"plausible-event-name(=|--)(.+)")?,
        })
    }

    pub fn is_tagged(&self, element: &Element) -> bool {
        element.classes.iter().any(|c| self.name_marker.is_match(c))
    }

    /// Whether `path[0]` or one of its nearest ancestors is tagged.
    pub fn is_element_or_parent_tagged(&self, path: &[Element]) -> bool {
        path.iter()
            .take(PARENTS_TO_SEARCH_LIMIT + 1)
            .any(|e| self.is_tagged(e))
    }

    /// Read the tags of `element`, or of `parent` when the element itself
    /// carries no event name. Revenue classes are read only in revenue
    /// builds.
    pub fn attributes(
        &self,
        element: &Element,
        parent: Option<&Element>,
        with_revenue: bool,
    ) -> TaggedAttributes {
        let tagged = if self.is_tagged(element) {
            Some(element)
        } else {
            parent
        };
        let mut attrs = TaggedAttributes::default();
        let Some(tagged) = tagged else {
            return attrs;
        };

        for class in &tagged.classes {
            if let Some(caps) = self.event.captures(class) {
                let key = &caps[1];
                let value = caps[3].replace('+', " ");
                if key.eq_ignore_ascii_case("name") {
                    attrs.name = Some(value);
                } else {
                    attrs.props.insert(key.to_string(), value.into());
                }
            }
            #[cfg(feature = "revenue")]
            if with_revenue {
                if let Some(caps) = self.revenue.captures(class) {
                    attrs
                        .revenue
                        .insert(caps[1].to_string(), caps[3].to_string().into());
                }
            }
        }
        #[cfg(not(feature = "revenue"))]
        let _ = with_revenue;
        attrs
    }
}

/// Nearest element on the path that is a link with a non-empty `href`.
#[cfg(any(feature = "outbound-links", feature = "file-downloads"))]
pub fn resolve_link(path: &[Element]) -> Option<(usize, &Element)> {
    path.iter()
        .enumerate()
        .find(|(_, e)| e.is_link() && e.href().is_some())
}

#[cfg(feature = "outbound-links")]
pub fn is_outbound_link(href: &str, page_host: &str) -> bool {
    match Url::parse(href) {
        Ok(url) => {
            let Some(hostname) = url.host_str() else {
                return false;
            };
            let host = match url.port() {
                Some(port) => format!("{hostname}:{port}"),
                None => hostname.to_string(),
            };
            host != page_host
        }
        Err(_) => false,
    }
}

#[cfg(feature = "file-downloads")]
pub fn strip_query(href: &str) -> &str {
    href.split('?').next().unwrap_or(href)
}

/// Extension after the last dot matches one of `file_types`.
#[cfg(feature = "file-downloads")]
pub fn is_download(url_without_query: &str, file_types: &[String]) -> bool {
    match url_without_query.rsplit_once('.') {
        Some((_, extension)) => file_types.iter().any(|t| t == extension),
        None => false,
    }
}

/// A regular left click on a link that opens in the current browsing
/// context and has not been cancelled.
#[cfg(any(
    feature = "outbound-links",
    feature = "file-downloads",
    feature = "tagged-events"
))]
pub fn should_follow_link(interaction: &Interaction, link: &Element) -> bool {
    if interaction.default_prevented {
        return false;
    }
    let targets_current_window = match link.target.as_deref() {
        None | Some("") => true,
        Some(target) => ["_self", "_parent", "_top"]
            .iter()
            .any(|t| t.eq_ignore_ascii_case(target)),
    };
    let is_regular_click =
        !interaction.modifiers.any() && interaction.kind == InteractionKind::Click;
    targets_current_window && is_regular_click
}

#[cfg(any(
    feature = "outbound-links",
    feature = "file-downloads",
    feature = "tagged-events"
))]
fn follow_link(interaction: &Interaction, link: &Element) -> Option<FollowAction> {
    let href = link.href()?;
    should_follow_link(interaction, link).then(|| FollowAction::Navigate(href.to_string()))
}

#[cfg(feature = "tagged-events")]
fn non_empty(revenue: Revenue) -> Option<Revenue> {
    (!revenue.is_empty()).then_some(revenue)
}

#[derive(Debug, Clone)]
pub struct CustomEventDetector {
    settings: DetectorSettings,
    #[cfg(feature = "tagged-events")]
    tags: TagParser,
}

impl CustomEventDetector {
    pub fn new(settings: DetectorSettings) -> TrackerResult<Self> {
        Ok(Self {
            settings,
            #[cfg(feature = "tagged-events")]
            tags: TagParser::new()?,
        })
    }

    pub fn settings(&self) -> &DetectorSettings {
        &self.settings
    }

    /// Classify one interaction into at most one event.
    pub fn classify(&self, interaction: &Interaction, page_host: &str) -> Option<DetectedEvent> {
        match interaction.kind {
            InteractionKind::Submit => self.classify_submit(interaction),
            InteractionKind::AuxClick if interaction.button != MIDDLE_MOUSE_BUTTON => None,
            InteractionKind::Click | InteractionKind::AuxClick => {
                self.classify_click(interaction, page_host)
            }
        }
    }

    fn classify_click(&self, interaction: &Interaction, page_host: &str) -> Option<DetectedEvent> {
        #[cfg(feature = "tagged-events")]
        if self.settings.tagged_events {
            if let Some(event) = self.tagged_click(interaction) {
                return Some(event);
            }
        }

        #[cfg(any(feature = "outbound-links", feature = "file-downloads"))]
        if let Some(event) = self.link_click(interaction, page_host) {
            return Some(event);
        }
        #[cfg(not(feature = "outbound-links"))]
        let _ = page_host;
        #[cfg(not(any(
            feature = "outbound-links",
            feature = "file-downloads",
            feature = "tagged-events"
        )))]
        let _ = interaction;

        None
    }

    #[cfg(any(feature = "outbound-links", feature = "file-downloads"))]
    fn link_click(&self, interaction: &Interaction, page_host: &str) -> Option<DetectedEvent> {
        let (index, link) = resolve_link(&interaction.path)?;

        // Tagged links belong to the tagged handler.
        #[cfg(feature = "tagged-events")]
        if self.settings.tagged_events
            && self.tags.is_element_or_parent_tagged(&interaction.path[index..])
        {
            return None;
        }
        #[cfg(not(feature = "tagged-events"))]
        let _ = index;

        let href = link.href()?;

        #[cfg(feature = "outbound-links")]
        if self.settings.outbound_links && is_outbound_link(href, page_host) {
            return Some(DetectedEvent {
                class: EventClass::OutboundLink,
                name: OUTBOUND_LINK_CLICK.to_string(),
                props: props([("url", href)]),
                revenue: None,
                follow: follow_link(interaction, link),
            });
        }
        #[cfg(not(feature = "outbound-links"))]
        let _ = page_host;

        #[cfg(feature = "file-downloads")]
        {
            let without_query = strip_query(href);
            if self.settings.file_downloads
                && is_download(without_query, &self.settings.file_types)
            {
                return Some(DetectedEvent {
                    class: EventClass::FileDownload,
                    name: FILE_DOWNLOAD.to_string(),
                    props: props([("url", without_query)]),
                    revenue: None,
                    follow: follow_link(interaction, link),
                });
            }
        }

        None
    }

    #[cfg(feature = "tagged-events")]
    fn tagged_click(&self, interaction: &Interaction) -> Option<DetectedEvent> {
        let mut clicked_link = None;
        let mut tagged = None;
        for (i, element) in interaction
            .path
            .iter()
            .take(PARENTS_TO_SEARCH_LIMIT + 1)
            .enumerate()
        {
            // Tagged forms are tracked on submit.
            if element.is_form() {
                return None;
            }
            if element.is_link() {
                clicked_link = Some(element);
            }
            if self.tags.is_tagged(element) {
                tagged = Some(i);
            }
        }

        let index = tagged?;
        let attrs = self.tags.attributes(
            &interaction.path[index],
            interaction.path.get(index + 1),
            self.settings.revenue,
        );
        let name = attrs.name?;
        let mut props = attrs.props;

        match clicked_link {
            Some(link) => {
                if let Some(href) = link.href() {
                    props.insert("url".to_string(), href.into());
                }
                Some(DetectedEvent {
                    class: EventClass::TaggedLink,
                    name,
                    props,
                    revenue: non_empty(attrs.revenue),
                    follow: follow_link(interaction, link),
                })
            }
            None => Some(DetectedEvent {
                class: EventClass::TaggedElement,
                name,
                props,
                revenue: non_empty(attrs.revenue),
                follow: None,
            }),
        }
    }

    fn classify_submit(&self, interaction: &Interaction) -> Option<DetectedEvent> {
        let form = interaction.target().filter(|e| e.is_form())?;

        #[cfg(feature = "tagged-events")]
        if self.settings.tagged_events {
            let attrs = self
                .tags
                .attributes(form, interaction.path.get(1), self.settings.revenue);
            if let Some(name) = attrs.name {
                return Some(DetectedEvent {
                    class: EventClass::TaggedForm,
                    name,
                    props: attrs.props,
                    revenue: non_empty(attrs.revenue),
                    follow: Some(FollowAction::SubmitForm(form.clone())),
                });
            }
        }

        #[cfg(feature = "form-submissions")]
        if self.settings.form_submissions && (form.novalidate || form.valid) {
            return Some(DetectedEvent {
                class: EventClass::FormSubmission,
                name: FORM_SUBMISSION.to_string(),
                props: Props::new(),
                revenue: None,
                follow: None,
            });
        }
        #[cfg(not(any(feature = "tagged-events", feature = "form-submissions")))]
        let _ = form;

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[allow(unused_imports)]
    use crate::events::Modifiers;

    #[allow(dead_code)]
    const HOST: &str = "example.com";

    #[allow(dead_code)]
    fn detector() -> CustomEventDetector {
        CustomEventDetector::new(DetectorSettings {
            outbound_links: true,
            file_downloads: true,
            tagged_events: true,
            revenue: true,
            form_submissions: true,
            #[cfg(feature = "file-downloads")]
            file_types: crate::config::default_file_types(),
        })
        .unwrap()
    }

    #[test]
    fn test_disabled_detections() {
        let d = CustomEventDetector::new(DetectorSettings::default()).unwrap();
        let path = vec![Element::link("https://other.org/report.pdf")];
        assert!(d.classify(&Interaction::click(path), HOST).is_none());
        assert!(!d.settings().listens_for_clicks());
    }

    #[test]
    fn test_internal_link_is_plain_click() {
        let path = vec![Element::link("https://example.com/about")];
        assert!(detector().classify(&Interaction::click(path), HOST).is_none());
    }

    #[cfg(feature = "file-downloads")]
    #[test]
    fn test_file_download_classification() {
        let types = crate::config::default_file_types();
        assert!(is_download(strip_query("https://x.com/a/report.pdf?x=1"), &types));
        assert!(!is_download(strip_query("https://x.com/a/report.pdfx"), &types));
        assert!(!is_download("https://x.com/a/report", &types));
    }

    #[cfg(feature = "file-downloads")]
    #[test]
    fn test_file_download_strips_query() {
        let path = vec![Element::link("https://example.com/files/report.pdf?x=1")];
        let event = detector()
            .classify(&Interaction::click(path), HOST)
            .unwrap();
        assert_eq!(event.class, EventClass::FileDownload);
        assert_eq!(event.props["url"], "https://example.com/files/report.pdf");
    }

    #[cfg(not(feature = "file-downloads"))]
    #[test]
    fn test_download_link_ignored_without_feature() {
        let path = vec![Element::link("https://example.com/files/report.pdf")];
        assert!(detector().classify(&Interaction::click(path), HOST).is_none());
    }

    #[cfg(feature = "outbound-links")]
    mod outbound {
        use super::*;

        #[test]
        fn test_outbound_link_click() {
            let path = vec![
                Element::new("span"),
                Element::link("https://other.org/page"),
                Element::new("nav"),
            ];
            let event = detector()
                .classify(&Interaction::click(path), HOST)
                .unwrap();
            assert_eq!(event.class, EventClass::OutboundLink);
            assert_eq!(event.name, OUTBOUND_LINK_CLICK);
            assert_eq!(event.props["url"], "https://other.org/page");
            assert_eq!(
                event.follow,
                Some(FollowAction::Navigate("https://other.org/page".into()))
            );
        }

        #[test]
        fn test_auxclick_only_middle_button() {
            let path = vec![Element::link("https://other.org/")];
            let d = detector();
            assert!(d
                .classify(&Interaction::aux_click(path.clone(), 2), HOST)
                .is_none());
            let event = d
                .classify(&Interaction::aux_click(path, MIDDLE_MOUSE_BUTTON), HOST)
                .unwrap();
            assert_eq!(event.follow, None);
        }

        #[test]
        fn test_modified_or_new_tab_clicks_do_not_follow() {
            let d = detector();
            let ctrl = Interaction::click(vec![Element::link("https://other.org/")])
                .with_modifiers(Modifiers {
                    ctrl: true,
                    ..Default::default()
                });
            assert_eq!(d.classify(&ctrl, HOST).unwrap().follow, None);

            let blank = Interaction::click(vec![
                Element::link("https://other.org/").with_target("_blank")
            ]);
            assert_eq!(d.classify(&blank, HOST).unwrap().follow, None);

            let top =
                Interaction::click(vec![Element::link("https://other.org/").with_target("_TOP")]);
            assert!(d.classify(&top, HOST).unwrap().follow.is_some());

            let prevented =
                Interaction::click(vec![Element::link("https://other.org/")]).prevented();
            assert_eq!(d.classify(&prevented, HOST).unwrap().follow, None);
        }

        #[cfg(feature = "tagged-events")]
        #[test]
        fn test_tagged_ancestor_beyond_search_limit() {
            let mut path = vec![Element::link("https://other.org/")];
            path.extend((0..4).map(|_| Element::new("div")));
            path.push(Element::new("section").with_classes("plausible-event-name=Far"));
            let event = detector().classify(&Interaction::click(path), HOST).unwrap();
            assert_eq!(event.class, EventClass::OutboundLink);
        }
    }

    #[cfg(not(feature = "outbound-links"))]
    #[test]
    fn test_outbound_link_ignored_without_feature() {
        let path = vec![Element::link("https://other.org/page")];
        assert!(detector().classify(&Interaction::click(path), HOST).is_none());
    }

    #[cfg(feature = "form-submissions")]
    #[test]
    fn test_plain_form_submission() {
        let d = detector();
        let event = d
            .classify(&Interaction::submit(vec![Element::form()]), HOST)
            .unwrap();
        assert_eq!(event.class, EventClass::FormSubmission);
        assert_eq!(event.name, FORM_SUBMISSION);

        let invalid = Interaction::submit(vec![Element::form().invalid()]);
        assert!(d.classify(&invalid, HOST).is_none());

        let novalidate = Interaction::submit(vec![Element::form().invalid().with_novalidate()]);
        assert!(d.classify(&novalidate, HOST).is_some());
    }

    #[cfg(not(any(feature = "form-submissions", feature = "tagged-events")))]
    #[test]
    fn test_form_submit_ignored_without_feature() {
        let submit = Interaction::submit(vec![Element::form()]);
        assert!(detector().classify(&submit, HOST).is_none());
    }

    #[cfg(feature = "tagged-events")]
    mod tagged {
        use super::*;

        #[test]
        fn test_tagged_classes_round_trip() {
            let parser = TagParser::new().unwrap();
            let element =
                Element::new("button").with_classes("plausible-event-name--Signup plausible-event-plan--Pro");
            let attrs = parser.attributes(&element, None, true);
            assert_eq!(attrs.name.as_deref(), Some("Signup"));
            assert_eq!(attrs.props, tracker_core::props([("plan", "Pro")]));
        }

        #[test]
        fn test_tag_values() {
            let parser = TagParser::new().unwrap();
            let element = Element::new("button").with_classes(
                "plausible-event-NAME=Sign+Up plausible-revenue-currency=EUR plausible-revenue-amount--10.5",
            );
            assert!(!parser.is_tagged(&element));
            let parent = Element::new("div").with_classes("plausible-event-name=Parent");
            let attrs = parser.attributes(&element, Some(&parent), true);
            assert_eq!(attrs.name.as_deref(), Some("Parent"));

            let direct = parser.attributes(
                &Element::new("button").with_classes("plausible-event-name=Sign+Up"),
                None,
                true,
            );
            assert_eq!(direct.name.as_deref(), Some("Sign Up"));

            let without_revenue = parser.attributes(
                &Element::new("button")
                    .with_classes("plausible-event-name=Buy plausible-revenue-currency=EUR"),
                None,
                false,
            );
            assert!(without_revenue.revenue.is_empty());
        }

        #[cfg(feature = "revenue")]
        #[test]
        fn test_revenue_classes() {
            let parser = TagParser::new().unwrap();
            let attrs = parser.attributes(
                &Element::new("button").with_classes(
                    "plausible-event-name=Buy plausible-revenue-currency=EUR plausible-revenue-amount--10.5",
                ),
                None,
                true,
            );
            assert_eq!(attrs.revenue["currency"], "EUR");
            assert_eq!(attrs.revenue["amount"], "10.5");
        }

        #[cfg(not(feature = "revenue"))]
        #[test]
        fn test_revenue_classes_ignored_without_feature() {
            let parser = TagParser::new().unwrap();
            let attrs = parser.attributes(
                &Element::new("button")
                    .with_classes("plausible-event-name=Buy plausible-revenue-currency=EUR"),
                None,
                true,
            );
            assert!(attrs.revenue.is_empty());
        }

        #[test]
        fn test_tagged_element_click() {
            let path = vec![
                Element::new("span"),
                Element::new("button").with_classes("plausible-event-name--Signup plausible-event-plan--Pro"),
            ];
            let event = detector().classify(&Interaction::click(path), HOST).unwrap();
            assert_eq!(event.class, EventClass::TaggedElement);
            assert_eq!(event.name, "Signup");
            assert_eq!(event.props, tracker_core::props([("plan", "Pro")]));
            assert_eq!(event.follow, None);
        }

        #[test]
        fn test_tagged_outbound_link_is_not_duplicated() {
            let path = vec![Element::link("https://other.org/report.pdf")
                .with_classes("plausible-event-name=Download")];
            let event = detector().classify(&Interaction::click(path), HOST).unwrap();
            assert_eq!(event.class, EventClass::TaggedLink);
            assert_eq!(event.name, "Download");
            assert_eq!(event.props["url"], "https://other.org/report.pdf");
            assert!(event.follow.is_some());
        }

        #[test]
        fn test_click_inside_tagged_form_waits_for_submit() {
            let path = vec![
                Element::new("button"),
                Element::form().with_classes("plausible-event-name=Subscribe"),
            ];
            assert!(detector().classify(&Interaction::click(path), HOST).is_none());
        }

        #[test]
        fn test_tagged_form_submit_claims_form() {
            let form = Element::form()
                .with_id("newsletter")
                .with_classes("plausible-event-name=Subscribe plausible-event-list=weekly");
            let event = detector()
                .classify(&Interaction::submit(vec![form.clone()]), HOST)
                .unwrap();
            assert_eq!(event.class, EventClass::TaggedForm);
            assert_eq!(event.name, "Subscribe");
            assert_eq!(event.follow, Some(FollowAction::SubmitForm(form)));
        }
    }
}
