//! Golden residue check: an artifact must carry the marker of every enabled
//! feature, and neither the marker nor any residue string of a disabled one.

use serde::Serialize;
use tracing::warn;

use crate::manifest::Manifest;
use crate::variant::Variant;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResidueReport {
    pub variant: String,
    /// Markers of disabled features found in the artifact, then their
    /// residue strings as `<feature>: <string>`.
    pub leaked: Vec<String>,
    /// Markers of enabled features absent from the artifact.
    pub missing: Vec<String>,
}

impl ResidueReport {
    pub fn is_clean(&self) -> bool {
        self.leaked.is_empty() && self.missing.is_empty()
    }
}

pub fn scan(manifest: &Manifest, variant: &Variant, artifact: &[u8]) -> ResidueReport {
    let mut report = ResidueReport {
        variant: variant.name(),
        ..Default::default()
    };
    for feature in &manifest.features {
        let marker = manifest.marker(&feature.name);
        let present = contains(artifact, marker.as_bytes());
        match (variant.has(&feature.name), present) {
            (true, false) => report.missing.push(marker),
            (false, true) => report.leaked.push(marker),
            _ => {}
        }
    }
    for feature in manifest.features.iter().filter(|f| !variant.has(&f.name)) {
        for residue in &feature.residue {
            if contains(artifact, residue.as_bytes()) {
                report.leaked.push(format!("{}: {residue}", feature.name));
            }
        }
    }
    if !report.is_clean() {
        warn!(
            variant = %report.variant,
            leaked = ?report.leaked,
            missing = ?report.missing,
            "residue check failed"
        );
    }
    report
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_manifest;

    #[test]
    fn test_clean_artifact() {
        let manifest = sample_manifest();
        let variant = Variant::parse(&manifest, "script.hash").unwrap();
        let report = scan(&manifest, &variant, b"\0\0tracker-feature:hash\0code");
        assert!(report.is_clean());
    }

    #[test]
    fn test_leaked_and_missing_markers() {
        let manifest = sample_manifest();
        let variant = Variant::parse(&manifest, "script.hash").unwrap();
        let report = scan(
            &manifest,
            &variant,
            b"tracker-feature:outbound-links tracker-feature:compat",
        );
        assert_eq!(
            report.leaked,
            vec!["tracker-feature:outbound-links", "tracker-feature:compat"]
        );
        assert_eq!(report.missing, vec!["tracker-feature:hash"]);
    }

    #[test]
    fn test_feature_code_without_marker_leaks() {
        let manifest = sample_manifest();
        let variant = Variant::parse(&manifest, "script.hash").unwrap();
        let report = scan(
            &manifest,
            &variant,
            b"tracker-feature:hash\0Outbound Link: Click\0",
        );
        assert_eq!(report.leaked, vec!["outbound-links: Outbound Link: Click"]);
        assert!(report.missing.is_empty());

        let enabled = Variant::parse(&manifest, "script.outbound-links").unwrap();
        let report = scan(
            &manifest,
            &enabled,
            b"tracker-feature:outbound-links\0Outbound Link: Click\0",
        );
        assert!(report.is_clean());
    }
}
