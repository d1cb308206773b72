//! Compiling one variant. [`CargoCompiler`] shells out to cargo with the
//! variant's feature set; anything else implementing [`Compiler`] can stand
//! in for it.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use crate::error::{VariantError, VariantResult};
use crate::manifest::Manifest;
use crate::variant::Variant;

/// Path prefixes written into artifacts instead of the real checkout and
/// target locations.
const REMAPPED_SOURCE: &str = "/tracker";
const REMAPPED_TARGET: &str = "/target";

pub trait Compiler {
    /// Build `variant` with its own `target_dir` and return the artifact.
    fn compile(
        &self,
        manifest: &Manifest,
        variant: &Variant,
        target_dir: &Path,
    ) -> VariantResult<PathBuf>;
}

#[derive(Debug, Clone)]
pub struct CargoCompiler {
    workspace_root: PathBuf,
    cargo: OsString,
}

impl CargoCompiler {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            cargo: std::env::var_os("CARGO").unwrap_or_else(|| "cargo".into()),
        }
    }

    /// `cargo build -p <package> --no-default-features --features … --profile …`
    /// with build paths remapped so output does not depend on where it ran.
    pub fn command(&self, manifest: &Manifest, variant: &Variant, target_dir: &Path) -> Command {
        let mut cmd = Command::new(&self.cargo);
        cmd.current_dir(&self.workspace_root)
            .arg("build")
            .args(["-p", &manifest.build.package])
            .arg("--no-default-features")
            .args(["--profile", &manifest.build.profile])
            .arg("--target-dir")
            .arg(target_dir);
        let features = variant.cargo_features();
        if !features.is_empty() {
            cmd.args(["--features", &features]);
        }

        let rustflags = [
            format!(
                "--remap-path-prefix={}={REMAPPED_SOURCE}",
                self.workspace_root.display()
            ),
            format!("--remap-path-prefix={}={REMAPPED_TARGET}", target_dir.display()),
        ]
        .join("\x1f");
        cmd.env("CARGO_ENCODED_RUSTFLAGS", rustflags)
            .env("CARGO_INCREMENTAL", "0")
            .env_remove("RUSTFLAGS");
        cmd
    }
}

impl Compiler for CargoCompiler {
    fn compile(
        &self,
        manifest: &Manifest,
        variant: &Variant,
        target_dir: &Path,
    ) -> VariantResult<PathBuf> {
        info!(variant = %variant, features = %variant.cargo_features(), "building variant");
        let output = self.command(manifest, variant, target_dir).output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let lines: Vec<&str> = stderr.lines().collect();
            let reason = lines[lines.len().saturating_sub(20)..].join("\n");
            return Err(VariantError::BuildFailed {
                variant: variant.name(),
                reason: format!("{}: {reason}", output.status),
            });
        }

        let artifact = target_dir
            .join(&manifest.build.profile)
            .join(&manifest.build.artifact);
        if !artifact.is_file() {
            return Err(VariantError::MissingArtifact(artifact));
        }
        debug!(variant = %variant, path = %artifact.display(), "artifact ready");
        Ok(artifact)
    }
}
