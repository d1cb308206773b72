//! Raw and gzip sizes per variant, and the comparison against a committed
//! baseline.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::VariantResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeEntry {
    pub raw: u64,
    pub gzip: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SizeReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub variants: BTreeMap<String, SizeEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SizeDelta {
    pub variant: String,
    pub baseline: Option<u64>,
    pub current: u64,
    pub change_pct: f64,
    pub regression: bool,
}

pub fn gzip_size(bytes: &[u8]) -> VariantResult<u64> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?.len() as u64)
}

impl SizeReport {
    pub fn new() -> Self {
        Self {
            generated_at: Some(Utc::now()),
            variants: BTreeMap::new(),
        }
    }

    pub fn record(&mut self, variant: &str, bytes: &[u8]) -> VariantResult<SizeEntry> {
        let entry = SizeEntry {
            raw: bytes.len() as u64,
            gzip: gzip_size(bytes)?,
        };
        self.variants.insert(variant.to_string(), entry);
        Ok(entry)
    }

    pub fn load(path: &Path) -> VariantResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn save(&self, path: &Path) -> VariantResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!(path = %path.display(), variants = self.variants.len(), "size report written");
        Ok(())
    }

    /// Gzip size changes against `baseline`. Growth above `threshold_pct`
    /// percent is a regression; variants new to the baseline never are.
    pub fn diff(&self, baseline: &SizeReport, threshold_pct: f64) -> Vec<SizeDelta> {
        self.variants
            .iter()
            .map(|(variant, entry)| {
                let previous = baseline.variants.get(variant).map(|e| e.gzip);
                let change_pct = match previous {
                    Some(0) | None => 0.0,
                    Some(base) => (entry.gzip as f64 - base as f64) / base as f64 * 100.0,
                };
                let regression = previous.is_some() && change_pct > threshold_pct;
                if regression {
                    warn!(
                        variant = %variant,
                        baseline = ?previous,
                        current = entry.gzip,
                        change_pct,
                        "size regression"
                    );
                }
                SizeDelta {
                    variant: variant.clone(),
                    baseline: previous,
                    current: entry.gzip,
                    change_pct,
                    regression,
                }
            })
            .collect()
    }
}
