//! `variants.toml`: the named build features of the tracker and the
//! variants that get published.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::error::{VariantError, VariantResult};
use crate::variant::Variant;

#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    pub build: BuildSection,
    #[serde(default)]
    pub features: Vec<FeatureSpec>,
    #[serde(default)]
    pub variants: Vec<VariantSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuildSection {
    /// Cargo package the variants are built from.
    pub package: String,
    #[serde(default = "default_profile")]
    pub profile: String,
    /// File name of the artifact under `target/<profile>/`.
    pub artifact: String,
    /// First segment of every variant name.
    #[serde(default = "default_base_name")]
    pub base_name: String,
    #[serde(default = "default_marker_prefix")]
    pub marker_prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeatureSpec {
    /// Cargo feature name, also the variant name segment.
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Whether the feature is an axis of the full cross-product.
    #[serde(default = "default_true")]
    pub matrix: bool,
    /// Strings only code of this feature puts in the artifact.
    #[serde(default)]
    pub residue: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VariantSpec {
    #[serde(default)]
    pub features: Vec<String>,
}

fn default_profile() -> String {
    "variant".to_string()
}

fn default_base_name() -> String {
    "script".to_string()
}

fn default_marker_prefix() -> String {
    "tracker-feature:".to_string()
}

fn default_true() -> bool {
    true
}

impl Manifest {
    pub fn load(path: &Path) -> VariantResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> VariantResult<Self> {
        let manifest: Manifest = toml::from_str(raw)?;
        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> VariantResult<()> {
        if self.features.is_empty() {
            return Err(VariantError::Manifest("no features declared".into()));
        }
        let mut seen = HashSet::new();
        for feature in &self.features {
            if feature.name.is_empty() || feature.name.contains('.') {
                return Err(VariantError::Manifest(format!(
                    "invalid feature name '{}'",
                    feature.name
                )));
            }
            if !seen.insert(feature.name.as_str()) {
                return Err(VariantError::Manifest(format!(
                    "feature '{}' declared twice",
                    feature.name
                )));
            }
            if feature.residue.iter().any(String::is_empty) {
                return Err(VariantError::Manifest(format!(
                    "empty residue string for feature '{}'",
                    feature.name
                )));
            }
        }
        for spec in &self.variants {
            Variant::from_features(self, &spec.features)?;
        }
        Ok(())
    }

    pub fn feature_names(&self) -> Vec<&str> {
        self.features.iter().map(|f| f.name.as_str()).collect()
    }

    /// Position of `name` in declaration order.
    pub fn feature_index(&self, name: &str) -> Option<usize> {
        self.features.iter().position(|f| f.name == name)
    }

    pub fn feature(&self, name: &str) -> Option<&FeatureSpec> {
        self.features.iter().find(|f| f.name == name)
    }

    pub fn marker(&self, feature: &str) -> String {
        format!("{}{}", self.build.marker_prefix, feature)
    }

    /// The published variants, deduplicated by content.
    pub fn declared_variants(&self) -> VariantResult<Vec<Variant>> {
        let mut seen = HashSet::new();
        let mut variants = Vec::new();
        for spec in &self.variants {
            let variant = Variant::from_features(self, &spec.features)?;
            if seen.insert(variant.clone()) {
                variants.push(variant);
            }
        }
        Ok(variants)
    }
}
