use std::path::PathBuf;

use serde::Deserialize;

/// Settings of the variant tooling. Loaded from environment variables with
/// the prefix `TRACKER_VARIANTS__`; command-line flags override them.
#[derive(Debug, Clone, Deserialize)]
pub struct VariantsSettings {
    #[serde(default = "default_manifest")]
    pub manifest: PathBuf,
    /// Directory cargo is invoked from.
    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,
    #[serde(default = "default_baseline")]
    pub baseline: PathBuf,
    /// Gzip growth, in percent, tolerated before a size regression fails.
    #[serde(default = "default_threshold_pct")]
    pub threshold_pct: f64,
}

fn default_manifest() -> PathBuf {
    PathBuf::from("variants.toml")
}
fn default_workspace_root() -> PathBuf {
    PathBuf::from(".")
}
fn default_out_dir() -> PathBuf {
    PathBuf::from("target/variants")
}
fn default_baseline() -> PathBuf {
    PathBuf::from("variant-sizes.json")
}
fn default_threshold_pct() -> f64 {
    1.0
}

impl Default for VariantsSettings {
    fn default() -> Self {
        Self {
            manifest: default_manifest(),
            workspace_root: default_workspace_root(),
            out_dir: default_out_dir(),
            baseline: default_baseline(),
            threshold_pct: default_threshold_pct(),
        }
    }
}

impl VariantsSettings {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from(config::Environment::with_prefix("TRACKER_VARIANTS"))
    }

    fn load_from(env: config::Environment) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(env.separator("__").try_parsing(true))
            .build()?
            .try_deserialize()
    }
}
