//! tracker-variants: list, build and check the tracker's build variants.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracker_variants::{
    full_matrix, size_report, CargoCompiler, Manifest, SizeReport, Variant, VariantBuilder,
    VariantsSettings,
};

#[derive(Parser, Debug)]
#[command(name = "tracker-variants")]
#[command(about = "Build and verify the tracker's feature variants")]
#[command(version)]
struct Cli {
    /// Feature manifest (overrides config)
    #[arg(long, env = "TRACKER_VARIANTS__MANIFEST")]
    manifest: Option<PathBuf>,

    /// Output directory for published variants (overrides config)
    #[arg(long, env = "TRACKER_VARIANTS__OUT_DIR")]
    out_dir: Option<PathBuf>,

    /// Size baseline JSON (overrides config)
    #[arg(long, env = "TRACKER_VARIANTS__BASELINE")]
    baseline: Option<PathBuf>,

    /// Allowed gzip growth in percent (overrides config)
    #[arg(long, env = "TRACKER_VARIANTS__THRESHOLD_PCT")]
    threshold: Option<f64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the published variants
    List,
    /// Print every combination of the matrix features
    Matrix,
    /// Build variants and publish them to the output directory
    Build {
        /// Variant name; repeatable. Defaults to every published variant.
        #[arg(long = "variant")]
        variants: Vec<String>,
        /// Build the full matrix instead of the published list
        #[arg(long, default_value_t = false)]
        all: bool,
    },
    /// Build a variant twice and compare the artifacts
    Check {
        #[arg(long = "variant")]
        variants: Vec<String>,
    },
    /// Build the full matrix and compare gzip sizes with the baseline
    Sizes {
        /// Overwrite the baseline with the new sizes
        #[arg(long, default_value_t = false)]
        update_baseline: bool,
    },
}

fn select(manifest: &Manifest, names: &[String]) -> anyhow::Result<Vec<Variant>> {
    if names.is_empty() {
        return Ok(manifest.declared_variants()?);
    }
    names
        .iter()
        .map(|n| Variant::parse(manifest, n).map_err(anyhow::Error::from))
        .collect()
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tracker_variants=info".into()),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();

    let mut settings = VariantsSettings::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load settings, using defaults");
        VariantsSettings::default()
    });
    if let Some(manifest) = cli.manifest {
        settings.manifest = manifest;
    }
    if let Some(out_dir) = cli.out_dir {
        settings.out_dir = out_dir;
    }
    if let Some(baseline) = cli.baseline {
        settings.baseline = baseline;
    }
    if let Some(threshold) = cli.threshold {
        settings.threshold_pct = threshold;
    }

    let manifest = Manifest::load(&settings.manifest)
        .with_context(|| format!("loading {}", settings.manifest.display()))?;
    info!(
        manifest = %settings.manifest.display(),
        features = manifest.features.len(),
        out_dir = %settings.out_dir.display(),
        "Manifest loaded"
    );

    match cli.command {
        Command::List => {
            for variant in manifest.declared_variants()? {
                println!("{variant}");
            }
        }
        Command::Matrix => {
            for variant in full_matrix(&manifest)? {
                println!("{variant}");
            }
        }
        Command::Build { variants, all } => {
            let selected = if all {
                full_matrix(&manifest)?
            } else {
                select(&manifest, &variants)?
            };
            let compiler = CargoCompiler::new(&settings.workspace_root);
            let builder = VariantBuilder::new(manifest, compiler, &settings.out_dir);
            let built = builder.build_all(&selected)?;
            println!("{}", serde_json::to_string_pretty(&built)?);
        }
        Command::Check { variants } => {
            let selected = select(&manifest, &variants)?;
            let compiler = CargoCompiler::new(&settings.workspace_root);
            let builder = VariantBuilder::new(manifest, compiler, &settings.out_dir);
            for variant in &selected {
                let digest = builder.check_reproducible(variant)?;
                println!("{variant} {digest}");
            }
        }
        Command::Sizes { update_baseline } => {
            let compiler = CargoCompiler::new(&settings.workspace_root);
            let selected = full_matrix(&manifest)?;
            let builder = VariantBuilder::new(manifest, compiler, &settings.out_dir);
            let report = size_report(&builder.build_all(&selected)?);

            if update_baseline {
                report.save(&settings.baseline)?;
                return Ok(());
            }

            let baseline = if settings.baseline.is_file() {
                SizeReport::load(&settings.baseline)?
            } else {
                warn!(baseline = %settings.baseline.display(), "No baseline, nothing to compare");
                SizeReport::default()
            };
            let deltas = report.diff(&baseline, settings.threshold_pct);
            println!("{}", serde_json::to_string_pretty(&deltas)?);

            let regressions = deltas.iter().filter(|d| d.regression).count();
            if regressions > 0 {
                bail!(
                    "{regressions} variant(s) grew by more than {}%",
                    settings.threshold_pct
                );
            }
        }
    }

    Ok(())
}
