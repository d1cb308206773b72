//! Variant tooling for the tracker.
//!
//! A variant is the tracker built with a fixed set of Cargo features. This
//! crate reads the feature manifest, names variants canonically, expands the
//! full matrix, builds each combination, and checks the results for
//! reproducibility, residue of disabled features and size regressions.

pub mod builder;
pub mod compiler;
pub mod digest;
pub mod error;
pub mod manifest;
pub mod matrix;
pub mod residue;
pub mod settings;
pub mod sizes;
pub mod variant;

pub use builder::{size_report, BuiltVariant, VariantBuilder};
pub use compiler::{CargoCompiler, Compiler};
pub use error::{VariantError, VariantResult};
pub use manifest::Manifest;
pub use matrix::full_matrix;
pub use residue::ResidueReport;
pub use settings::VariantsSettings;
pub use sizes::{SizeDelta, SizeEntry, SizeReport};
pub use variant::Variant;

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::{Path, PathBuf};

    use crate::compiler::Compiler;
    use crate::error::VariantResult;
    use crate::manifest::Manifest;
    use crate::variant::Variant;

    pub const SAMPLE: &str = r#"
[build]
package = "tracker-host"
artifact = "tracker-host"

[[features]]
name = "hash"

[[features]]
name = "outbound-links"
residue = ["Outbound Link: Click"]

[[features]]
name = "compat"
matrix = false

[[variants]]
features = []

[[variants]]
features = ["outbound-links", "hash"]

[[variants]]
features = ["hash", "outbound-links"]
"#;

    pub fn sample_manifest() -> Manifest {
        Manifest::parse(SAMPLE).unwrap()
    }

    /// Fresh, empty directory under the system temp dir.
    pub fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("tracker_variants_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    /// Writes an artifact holding the markers and residue strings of the
    /// enabled features.
    #[derive(Debug, Default)]
    pub struct FakeCompiler {
        pub leak: Option<String>,
        pub embed_target_dir: bool,
    }

    impl Compiler for FakeCompiler {
        fn compile(
            &self,
            manifest: &Manifest,
            variant: &Variant,
            target_dir: &Path,
        ) -> VariantResult<PathBuf> {
            let mut bytes = b"\x7fcode".to_vec();
            for feature in variant.features().iter().chain(self.leak.iter()) {
                bytes.push(0);
                bytes.extend_from_slice(manifest.marker(feature).as_bytes());
                for residue in manifest.feature(feature).iter().flat_map(|f| &f.residue) {
                    bytes.push(0);
                    bytes.extend_from_slice(residue.as_bytes());
                }
            }
            if self.embed_target_dir {
                bytes.extend_from_slice(target_dir.to_string_lossy().as_bytes());
            }

            let dir = target_dir.join(&manifest.build.profile);
            std::fs::create_dir_all(&dir)?;
            let path = dir.join(&manifest.build.artifact);
            std::fs::write(&path, bytes)?;
            Ok(path)
        }
    }
}
