//! The build pass: compile each variant in its own target directory, check
//! its residue, and publish it under its canonical name.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::compiler::Compiler;
use crate::digest::file_digest;
use crate::error::{VariantError, VariantResult};
use crate::manifest::Manifest;
use crate::residue;
use crate::sizes::{gzip_size, SizeEntry, SizeReport};
use crate::variant::Variant;

#[derive(Debug, Clone, Serialize)]
pub struct BuiltVariant {
    pub variant: String,
    pub path: PathBuf,
    pub digest: String,
    pub size: SizeEntry,
}

pub struct VariantBuilder<C: Compiler> {
    manifest: Manifest,
    compiler: C,
    out_dir: PathBuf,
}

impl<C: Compiler> VariantBuilder<C> {
    pub fn new(manifest: Manifest, compiler: C, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            manifest,
            compiler,
            out_dir: out_dir.into(),
        }
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    fn target_dir(&self, variant: &Variant, run: &str) -> PathBuf {
        self.out_dir
            .join("target")
            .join(format!("{}{run}", variant.name()))
    }

    fn published_path(&self, variant: &Variant, artifact: &Path) -> PathBuf {
        let name = match artifact.extension() {
            Some(ext) => format!("{}.{}", variant.name(), ext.to_string_lossy()),
            None => variant.name(),
        };
        self.out_dir.join(name)
    }

    pub fn build(&self, variant: &Variant) -> VariantResult<BuiltVariant> {
        let artifact = self
            .compiler
            .compile(&self.manifest, variant, &self.target_dir(variant, ""))?;
        let bytes = std::fs::read(&artifact)?;

        let report = residue::scan(&self.manifest, variant, &bytes);
        if !report.is_clean() {
            let mut markers = report.leaked;
            markers.extend(report.missing.into_iter().map(|m| format!("missing {m}")));
            return Err(VariantError::Residue {
                variant: variant.name(),
                leaked: markers,
            });
        }

        std::fs::create_dir_all(&self.out_dir)?;
        let path = self.published_path(variant, &artifact);
        std::fs::write(&path, &bytes)?;

        let built = BuiltVariant {
            variant: variant.name(),
            digest: file_digest(&path)?,
            size: SizeEntry {
                raw: bytes.len() as u64,
                gzip: gzip_size(&bytes)?,
            },
            path,
        };
        info!(
            variant = %built.variant,
            raw = built.size.raw,
            gzip = built.size.gzip,
            digest = %built.digest,
            "variant published"
        );
        Ok(built)
    }

    /// Build every variant, stopping at the first failure.
    pub fn build_all(&self, variants: &[Variant]) -> VariantResult<Vec<BuiltVariant>> {
        variants.iter().map(|v| self.build(v)).collect()
    }

    /// Compile `variant` twice in fresh target directories and compare the
    /// artifacts byte for byte.
    pub fn check_reproducible(&self, variant: &Variant) -> VariantResult<String> {
        let mut digests = Vec::with_capacity(2);
        for run in ["-a", "-b"] {
            let target = self.target_dir(variant, run);
            if target.exists() {
                std::fs::remove_dir_all(&target)?;
            }
            let artifact = self.compiler.compile(&self.manifest, variant, &target)?;
            digests.push(file_digest(&artifact)?);
        }
        let second = digests.pop().unwrap_or_default();
        let first = digests.pop().unwrap_or_default();
        if first != second {
            return Err(VariantError::NotReproducible {
                variant: variant.name(),
                first,
                second,
            });
        }
        debug!(variant = %variant, digest = %first, "reproducible");
        Ok(first)
    }
}

pub fn size_report(built: &[BuiltVariant]) -> SizeReport {
    let mut report = SizeReport::new();
    for b in built {
        report.variants.insert(b.variant.clone(), b.size);
    }
    report
}
