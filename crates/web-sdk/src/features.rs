//! Build-time feature gates.
//!
//! Every optional capability is a Cargo feature. Code belonging to a disabled
//! feature is removed with `#[cfg]`, and each enabled feature leaves exactly
//! one `tracker-feature:<name>` marker in the artifact so that variant tooling
//! can prove nothing of a disabled feature survived.
//!
//! With the `config` meta-feature the compiled-in capabilities are
//! additionally switched by runtime configuration, which lets one full build
//! behave like any narrower one.

/// Prefix shared by all artifact markers.
pub const MARKER_PREFIX: &str = "tracker-feature:";

pub const HASH: bool = cfg!(feature = "hash");
pub const OUTBOUND_LINKS: bool = cfg!(feature = "outbound-links");
pub const FILE_DOWNLOADS: bool = cfg!(feature = "file-downloads");
pub const TAGGED_EVENTS: bool = cfg!(feature = "tagged-events");
pub const REVENUE: bool = cfg!(feature = "revenue");
pub const PAGEVIEW_PROPS: bool = cfg!(feature = "pageview-props");
pub const EXCLUSIONS: bool = cfg!(feature = "exclusions");
pub const FORM_SUBMISSIONS: bool = cfg!(feature = "form-submissions");
pub const COMPAT: bool = cfg!(feature = "compat");
pub const MANUAL: bool = cfg!(feature = "manual");
pub const LOCAL: bool = cfg!(feature = "local");
pub const RUNTIME_CONFIG: bool = cfg!(feature = "config");

/// A compiled-in capability is live when it was built and, for
/// runtime-configurable builds, also switched on in the config.
#[inline(always)]
pub const fn gate(compiled: bool, runtime: bool) -> bool {
    compiled && (!RUNTIME_CONFIG || runtime)
}

macro_rules! feature_markers {
    ($($feature:tt => $marker:ident),* $(,)?) => {
        $(
            #[cfg(feature = $feature)]
            #[used]
            static $marker: &str = concat!("tracker-feature:", $feature);
        )*

        /// Markers of every feature compiled into this artifact.
        pub fn compiled_markers() -> Vec<&'static str> {
            compiled().into_iter().map(|(_, marker)| marker).collect()
        }

        /// Names of the features compiled into this artifact.
        pub fn compiled_features() -> Vec<&'static str> {
            compiled().into_iter().map(|(name, _)| name).collect()
        }

        // Names are kept apart from markers so the bare prefix never lands in
        // the artifact next to other data.
        fn compiled() -> Vec<(&'static str, &'static str)> {
            #[allow(unused_mut)]
            let mut compiled = Vec::new();
            $(
                #[cfg(feature = $feature)]
                compiled.push(($feature, $marker));
            )*
            compiled
        }
    };
}

feature_markers! {
    "hash" => HASH_MARKER,
    "outbound-links" => OUTBOUND_LINKS_MARKER,
    "file-downloads" => FILE_DOWNLOADS_MARKER,
    "tagged-events" => TAGGED_EVENTS_MARKER,
    "revenue" => REVENUE_MARKER,
    "pageview-props" => PAGEVIEW_PROPS_MARKER,
    "exclusions" => EXCLUSIONS_MARKER,
    "form-submissions" => FORM_SUBMISSIONS_MARKER,
    "compat" => COMPAT_MARKER,
    "manual" => MANUAL_MARKER,
    "local" => LOCAL_MARKER,
    "config" => CONFIG_MARKER,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markers_follow_compiled_flags() {
        let compiled = compiled_features();
        let flags = [
            ("hash", HASH),
            ("outbound-links", OUTBOUND_LINKS),
            ("file-downloads", FILE_DOWNLOADS),
            ("tagged-events", TAGGED_EVENTS),
            ("revenue", REVENUE),
            ("pageview-props", PAGEVIEW_PROPS),
            ("exclusions", EXCLUSIONS),
            ("form-submissions", FORM_SUBMISSIONS),
            ("compat", COMPAT),
            ("manual", MANUAL),
            ("local", LOCAL),
            ("config", RUNTIME_CONFIG),
        ];
        for (name, enabled) in flags {
            assert_eq!(compiled.contains(&name), enabled, "marker mismatch for {name}");
        }
    }

    #[test]
    fn test_markers_carry_prefix() {
        for (marker, name) in compiled_markers().into_iter().zip(compiled_features()) {
            assert_eq!(marker.strip_prefix(MARKER_PREFIX), Some(name));
        }
    }

    #[test]
    fn test_gate() {
        assert!(!gate(false, true));
        assert!(gate(true, true));
        assert_eq!(gate(true, false), !RUNTIME_CONFIG);
    }
}
