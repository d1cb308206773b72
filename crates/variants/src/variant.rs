//! A variant is a set of enabled features. Its name lists them in manifest
//! order after the base name, so `script.outbound-links.hash` and
//! `script.hash.outbound-links` are the same variant.

use std::fmt;

use crate::error::{VariantError, VariantResult};
use crate::manifest::Manifest;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Variant {
    base: String,
    /// Enabled features, in manifest order.
    features: Vec<String>,
}

impl Variant {
    pub fn from_features<S: AsRef<str>>(manifest: &Manifest, features: &[S]) -> VariantResult<Self> {
        let mut indices = Vec::with_capacity(features.len());
        for feature in features {
            let feature = feature.as_ref();
            let index = manifest
                .feature_index(feature)
                .ok_or_else(|| VariantError::UnknownFeature {
                    variant: requested_name(manifest, features),
                    feature: feature.to_string(),
                })?;
            indices.push(index);
        }
        indices.sort_unstable();
        indices.dedup();

        Ok(Self {
            base: manifest.build.base_name.clone(),
            features: indices
                .into_iter()
                .map(|i| manifest.features[i].name.clone())
                .collect(),
        })
    }

    /// Parse a variant name in any feature order. A trailing `.js` is
    /// accepted for file names.
    pub fn parse(manifest: &Manifest, name: &str) -> VariantResult<Self> {
        let name = name.strip_suffix(".js").unwrap_or(name);
        let mut segments = name.split('.');
        if segments.next() != Some(manifest.build.base_name.as_str()) {
            return Err(VariantError::Manifest(format!(
                "variant name '{name}' must start with '{}'",
                manifest.build.base_name
            )));
        }
        let features: Vec<&str> = segments.collect();
        Self::from_features(manifest, &features)
    }

    pub fn name(&self) -> String {
        if self.features.is_empty() {
            self.base.clone()
        } else {
            format!("{}.{}", self.base, self.features.join("."))
        }
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn has(&self, feature: &str) -> bool {
        self.features.iter().any(|f| f == feature)
    }

    /// Value for `cargo build --features`.
    pub fn cargo_features(&self) -> String {
        self.features.join(",")
    }

    /// Declared features this variant leaves out.
    pub fn disabled<'m>(&self, manifest: &'m Manifest) -> Vec<&'m str> {
        manifest
            .feature_names()
            .into_iter()
            .filter(|f| !self.has(f))
            .collect()
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

fn requested_name<S: AsRef<str>>(manifest: &Manifest, features: &[S]) -> String {
    std::iter::once(manifest.build.base_name.as_str())
        .chain(features.iter().map(AsRef::as_ref))
        .collect::<Vec<_>>()
        .join(".")
}
