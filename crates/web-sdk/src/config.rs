//! Tracker configuration and its three sources: script-tag attributes, a
//! config object injected at serve time, or a one-time `init()` call.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use url::Url;

use tracker_core::{Props, TrackerError, TrackerResult};

#[cfg(feature = "file-downloads")]
use crate::custom_events::DEFAULT_FILE_TYPES;
use crate::features::{self, gate};
use crate::page::Location;

/// Collection endpoint used when `init()` does not name one.
pub const DEFAULT_ENDPOINT: &str = "https://plausible.io/api/event";

/// Path appended to the script origin for script-tag builds.
pub const EVENT_PATH: &str = "/api/event";

/// Properties merged into every event, either fixed or computed per event
/// name.
#[derive(Clone, Default)]
pub enum CustomProperties {
    #[default]
    None,
    Static(Props),
    Dynamic(Arc<dyn Fn(&str) -> Props + Send + Sync>),
}

impl CustomProperties {
    pub fn dynamic<F>(f: F) -> Self
    where
        F: Fn(&str) -> Props + Send + Sync + 'static,
    {
        CustomProperties::Dynamic(Arc::new(f))
    }

    pub fn resolve(&self, event_name: &str) -> Option<Props> {
        match self {
            CustomProperties::None => None,
            CustomProperties::Static(props) => Some(props.clone()),
            CustomProperties::Dynamic(f) => Some(f(event_name)),
        }
    }
}

impl fmt::Debug for CustomProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CustomProperties::None => f.write_str("None"),
            CustomProperties::Static(props) => f.debug_tuple("Static").field(props).finish(),
            CustomProperties::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub endpoint: Url,
    pub domain: String,
    pub hash_based_routing: bool,
    pub outbound_links: bool,
    pub file_downloads: bool,
    pub tagged_events: bool,
    pub revenue: bool,
    pub pageview_props: bool,
    pub exclusions: bool,
    pub form_submissions: bool,
    pub manual: bool,
    pub capture_on_localhost: bool,
    pub auto_capture_pageviews: bool,
    /// Warn through `tracing` when an event is ignored.
    pub logging: bool,
    pub custom_properties: CustomProperties,
    #[cfg(feature = "file-downloads")]
    pub file_types: Vec<String>,
    pub include_paths: Vec<String>,
    pub exclude_paths: Vec<String>,
    /// `event-<key>` script attributes.
    pub static_props: Props,
    pub initialized: bool,
}

impl Config {
    /// Defaults for `init()`-driven builds.
    pub fn library_defaults() -> TrackerResult<Self> {
        Ok(Self {
            endpoint: Url::parse(DEFAULT_ENDPOINT)?,
            domain: String::new(),
            hash_based_routing: false,
            outbound_links: false,
            file_downloads: false,
            tagged_events: true,
            revenue: true,
            pageview_props: true,
            exclusions: true,
            form_submissions: false,
            manual: false,
            capture_on_localhost: false,
            auto_capture_pageviews: true,
            logging: true,
            custom_properties: CustomProperties::None,
            #[cfg(feature = "file-downloads")]
            file_types: default_file_types(),
            include_paths: Vec::new(),
            exclude_paths: Vec::new(),
            static_props: Props::new(),
            initialized: false,
        })
    }

    /// Read a script tag. Script-tag variants select features by build, so
    /// every compiled feature is switched on, except hash routing which
    /// changes how navigations are observed and needs `data-hash-routing` in
    /// runtime-configurable builds.
    pub fn from_script(tag: &ScriptTag, location: &Location) -> TrackerResult<Self> {
        let script_url = Url::parse(&location.href)?.join(&tag.src)?;
        let endpoint = match tag.get("data-api") {
            Some(api) => script_url.join(api)?,
            None => Url::parse(&script_url.origin().ascii_serialization())?.join(EVENT_PATH)?,
        };
        let domain = tag
            .get("data-domain")
            .map(str::to_string)
            .unwrap_or_else(|| location.hostname.clone());

        #[cfg(feature = "pageview-props")]
        let static_props = tag
            .attributes
            .iter()
            .filter_map(|(name, value)| {
                name.strip_prefix("event-")
                    .map(|key| (key.to_string(), value.clone().into()))
            })
            .collect();
        #[cfg(not(feature = "pageview-props"))]
        let static_props = Props::new();

        Ok(Self {
            endpoint,
            domain,
            hash_based_routing: tag.attributes.contains_key("data-hash-routing"),
            outbound_links: true,
            file_downloads: true,
            tagged_events: true,
            revenue: true,
            pageview_props: true,
            exclusions: true,
            form_submissions: true,
            manual: false,
            capture_on_localhost: false,
            auto_capture_pageviews: true,
            logging: true,
            custom_properties: CustomProperties::None,
            #[cfg(feature = "file-downloads")]
            file_types: file_types(tag.get("file-types"), tag.get("add-file-types")),
            include_paths: tag.get("data-include").map(split_list).unwrap_or_default(),
            exclude_paths: tag.get("data-exclude").map(split_list).unwrap_or_default(),
            static_props,
            initialized: true,
        })
    }

    /// Merge `overrides` over the current values.
    pub fn apply(&mut self, overrides: ConfigOverrides) -> TrackerResult<()> {
        if let Some(domain) = overrides.domain {
            self.domain = domain;
        }
        if let Some(endpoint) = overrides.endpoint {
            self.endpoint = Url::parse(&endpoint)?;
        }
        let flags = [
            (overrides.hash_based_routing, &mut self.hash_based_routing),
            (overrides.outbound_links, &mut self.outbound_links),
            (overrides.file_downloads, &mut self.file_downloads),
            (overrides.tagged_events, &mut self.tagged_events),
            (overrides.revenue, &mut self.revenue),
            (overrides.pageview_props, &mut self.pageview_props),
            (overrides.exclusions, &mut self.exclusions),
            (overrides.form_submissions, &mut self.form_submissions),
            (overrides.manual, &mut self.manual),
            (overrides.capture_on_localhost, &mut self.capture_on_localhost),
            (overrides.auto_capture_pageviews, &mut self.auto_capture_pageviews),
            (overrides.logging, &mut self.logging),
        ];
        for (value, slot) in flags {
            if let Some(value) = value {
                *slot = value;
            }
        }
        #[cfg(feature = "file-downloads")]
        if let Some(file_types) = overrides.file_types {
            self.file_types = file_types;
        }
        if let Some(include) = overrides.include_paths {
            self.include_paths = include;
        }
        if let Some(exclude) = overrides.exclude_paths {
            self.exclude_paths = exclude;
        }
        if let Some(custom) = overrides.custom_properties {
            self.custom_properties = custom;
        }
        Ok(())
    }

    pub fn hash_routing(&self) -> bool {
        gate(features::HASH, self.hash_based_routing)
    }

    pub fn tracks_outbound_links(&self) -> bool {
        gate(features::OUTBOUND_LINKS, self.outbound_links)
    }

    pub fn tracks_file_downloads(&self) -> bool {
        gate(features::FILE_DOWNLOADS, self.file_downloads)
    }

    pub fn tracks_tagged_events(&self) -> bool {
        gate(features::TAGGED_EVENTS, self.tagged_events)
    }

    pub fn tracks_revenue(&self) -> bool {
        gate(features::REVENUE, self.revenue)
    }

    pub fn sends_pageview_props(&self) -> bool {
        gate(features::PAGEVIEW_PROPS, self.pageview_props)
    }

    pub fn applies_exclusions(&self) -> bool {
        gate(features::EXCLUSIONS, self.exclusions)
    }

    pub fn tracks_form_submissions(&self) -> bool {
        gate(features::FORM_SUBMISSIONS, self.form_submissions)
    }

    pub fn captures_on_localhost(&self) -> bool {
        features::LOCAL || self.capture_on_localhost
    }

    /// Whether pageviews fire without explicit calls.
    pub fn autocaptures_pageviews(&self) -> bool {
        !features::MANUAL && !self.manual && self.auto_capture_pageviews
    }
}

/// A `<script>` element: its `src` and attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptTag {
    pub src: String,
    pub attributes: BTreeMap<String, String>,
}

impl ScriptTag {
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Attribute value, `None` when missing or empty.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// Values accepted by `init()` and by an injected config object.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigOverrides {
    pub domain: Option<String>,
    pub endpoint: Option<String>,
    pub hash_based_routing: Option<bool>,
    pub outbound_links: Option<bool>,
    pub file_downloads: Option<bool>,
    pub tagged_events: Option<bool>,
    pub revenue: Option<bool>,
    pub pageview_props: Option<bool>,
    pub exclusions: Option<bool>,
    pub form_submissions: Option<bool>,
    pub manual: Option<bool>,
    pub capture_on_localhost: Option<bool>,
    pub auto_capture_pageviews: Option<bool>,
    pub logging: Option<bool>,
    pub file_types: Option<Vec<String>>,
    pub include_paths: Option<Vec<String>>,
    pub exclude_paths: Option<Vec<String>>,
    #[serde(skip)]
    pub custom_properties: Option<CustomProperties>,
}

impl ConfigOverrides {
    pub fn from_json(json: &str) -> TrackerResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn domain(domain: impl Into<String>) -> Self {
        Self {
            domain: Some(domain.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub enum ConfigSource {
    ScriptTag(ScriptTag),
    /// Config object inlined by the server; `init()` may adjust everything
    /// but the domain.
    Injected(ConfigOverrides),
    /// Embeddable library configured solely through `init()`.
    Library,
}

/// Turns a [`ConfigSource`] into a [`Config`], at most once.
#[derive(Debug)]
pub struct ConfigResolver {
    source: ConfigSource,
    initialized: bool,
}

impl ConfigResolver {
    pub fn new(source: ConfigSource) -> Self {
        Self {
            source,
            initialized: false,
        }
    }

    pub fn source(&self) -> &ConfigSource {
        &self.source
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Resolve and mark the resolver initialized.
    pub fn resolve(
        &mut self,
        location: &Location,
        overrides: Option<ConfigOverrides>,
    ) -> TrackerResult<Config> {
        let config = self.prepare(location, overrides)?;
        self.mark_initialized();
        Ok(config)
    }

    /// Resolve without committing, so a caller can finish its own setup
    /// before [`ConfigResolver::mark_initialized`].
    pub fn prepare(
        &self,
        location: &Location,
        overrides: Option<ConfigOverrides>,
    ) -> TrackerResult<Config> {
        if self.initialized {
            return Err(TrackerError::AlreadyInitialized);
        }

        let mut config = match &self.source {
            ConfigSource::ScriptTag(tag) => {
                if overrides.is_some() {
                    return Err(TrackerError::Config(
                        "script-tag builds are configured through attributes".into(),
                    ));
                }
                Config::from_script(tag, location)?
            }
            ConfigSource::Library => {
                let overrides = overrides.unwrap_or_default();
                if overrides.domain.as_deref().map_or(true, str::is_empty) {
                    return Err(TrackerError::MissingDomain);
                }
                let mut config = Config::library_defaults()?;
                config.apply(overrides)?;
                config
            }
            ConfigSource::Injected(injected) => {
                if injected.domain.as_deref().map_or(true, str::is_empty) {
                    return Err(TrackerError::MissingDomain);
                }
                let mut config = Config::library_defaults()?;
                config.apply(injected.clone())?;
                if let Some(overrides) = overrides {
                    if overrides.domain.is_some() {
                        return Err(TrackerError::Config(
                            "domain is fixed by the injected configuration".into(),
                        ));
                    }
                    config.apply(overrides)?;
                }
                config
            }
        };

        config.initialized = true;
        Ok(config)
    }

    pub fn mark_initialized(&mut self) {
        self.initialized = true;
    }
}

/// Split a comma-separated attribute value.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(feature = "file-downloads")]
pub fn default_file_types() -> Vec<String> {
    DEFAULT_FILE_TYPES.iter().map(|t| t.to_string()).collect()
}

/// `file-types` replaces the default list, `add-file-types` extends it.
#[cfg(feature = "file-downloads")]
pub fn file_types(replace: Option<&str>, add: Option<&str>) -> Vec<String> {
    let mut types = replace.map(split_list).unwrap_or_else(default_file_types);
    if let Some(add) = add {
        types.extend(split_list(add));
    }
    types
}
