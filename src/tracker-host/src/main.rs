//! tracker-host: runs one tracker build against a headless page driven by
//! JSON commands on stdin. Published tracker variants are builds of this
//! binary.

mod commands;
mod host;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracker_web_sdk::{features, ConfigOverrides, ConfigSource, Environment, ScriptTag, SimulatedPage};

use crate::commands::{HostCommand, Reply};
use crate::host::Host;

#[derive(Parser, Debug)]
#[command(name = "tracker-host")]
#[command(about = "Run the tracker against a headless page")]
#[command(version)]
struct Cli {
    /// URL of the page the tracker is embedded in
    #[arg(long, env = "TRACKER_HOST__PAGE", default_value = "https://example.com/")]
    page: String,

    /// Script `src`, resolved against the page URL
    #[arg(long, env = "TRACKER_HOST__SRC", default_value = "/js/script.js")]
    src: String,

    /// Script attribute as `name=value`; repeatable
    #[arg(long = "attr", value_parser = parse_attr)]
    attrs: Vec<(String, String)>,

    /// Configuration object injected at serve time, as JSON
    #[arg(long, conflicts_with = "library")]
    injected: Option<String>,

    /// Configure only through an `init` command
    #[arg(long, default_value_t = false)]
    library: bool,
}

fn parse_attr(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) => Ok((name.to_string(), value.to_string())),
        None => Ok((raw.to_string(), String::new())),
    }
}

impl Cli {
    fn source(&self) -> anyhow::Result<ConfigSource> {
        if self.library {
            return Ok(ConfigSource::Library);
        }
        if let Some(injected) = &self.injected {
            let overrides =
                ConfigOverrides::from_json(injected).context("parsing injected configuration")?;
            return Ok(ConfigSource::Injected(overrides));
        }
        let tag = self
            .attrs
            .iter()
            .fold(ScriptTag::new(&self.src), |tag, (name, value)| {
                tag.attr(name, value)
            });
        Ok(ConfigSource::ScriptTag(tag))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tracker_host=info,tracker_web_sdk=info".into()),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();
    let page = Arc::new(
        SimulatedPage::new(&cli.page).with_context(|| format!("invalid page URL {}", cli.page))?,
    );
    let env = Environment::browser(page.clone())?;
    info!(
        page = %cli.page,
        features = ?features::compiled_features(),
        "Tracker host starting"
    );

    let mut host = Host::new(page, cli.source()?, env);
    if let Err(e) = host.load(cli.library) {
        warn!(error = %e, "Tracker failed to load");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let reply = match HostCommand::parse(&line) {
            Ok(command) => host.apply(command),
            Err(e) => Reply::Error {
                message: format!("invalid command: {e}"),
            },
        };
        println!("{}", serde_json::to_string(&reply)?);
    }

    Ok(())
}
