//! Full cross-product of the independent features.

use tracing::debug;

use crate::error::{VariantError, VariantResult};
use crate::manifest::Manifest;
use crate::variant::Variant;

/// Axis count above which the product is refused.
pub const MAX_AXES: usize = 16;

pub fn axes(manifest: &Manifest) -> Vec<&str> {
    manifest
        .features
        .iter()
        .filter(|f| f.matrix)
        .map(|f| f.name.as_str())
        .collect()
}

/// Every combination of the matrix features, smallest first.
pub fn full_matrix(manifest: &Manifest) -> VariantResult<Vec<Variant>> {
    let axes = axes(manifest);
    if axes.len() > MAX_AXES {
        return Err(VariantError::Manifest(format!(
            "{} matrix features exceed the limit of {MAX_AXES}",
            axes.len()
        )));
    }

    let mut variants = (0u32..1 << axes.len())
        .map(|mask| {
            let enabled: Vec<&str> = axes
                .iter()
                .enumerate()
                .filter(|(bit, _)| mask & (1 << bit) != 0)
                .map(|(_, name)| *name)
                .collect();
            Variant::from_features(manifest, &enabled)
        })
        .collect::<VariantResult<Vec<_>>>()?;
    variants.sort_by_key(|v| (v.features().len(), v.name()));

    debug!(axes = axes.len(), variants = variants.len(), "feature matrix");
    Ok(variants)
}
