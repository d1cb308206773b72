use std::path::PathBuf;

use thiserror::Error;

pub type VariantResult<T> = Result<T, VariantError>;

#[derive(Error, Debug)]
pub enum VariantError {
    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("Unknown feature '{feature}' in variant '{variant}'")]
    UnknownFeature { variant: String, feature: String },

    #[error("Build failed for variant '{variant}': {reason}")]
    BuildFailed { variant: String, reason: String },

    #[error("Artifact not found: {0}")]
    MissingArtifact(PathBuf),

    #[error("Variant '{variant}' is not reproducible: {first} != {second}")]
    NotReproducible {
        variant: String,
        first: String,
        second: String,
    },

    #[error("Variant '{variant}' contains code of disabled features: {}", leaked.join(", "))]
    Residue { variant: String, leaked: Vec<String> },

    #[error("Manifest parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
