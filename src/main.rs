//! heartbus binary: load plugins, emit startup signals, run until terminated.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use heartbus::{Config, LogWriter, RuntimeBuilder, Subscribe, init_logging};

const DEFAULT_CONFIG: &str = "heartbus.toml";

/// In-process signal dispatcher with plugin-registered handlers
#[derive(Parser)]
#[command(name = "heartbus")]
#[command(version)]
#[command(about = "In-process signal dispatcher with plugin-registered handlers", long_about = None)]
struct Cli {
    /// Config file (default: ./heartbus.toml when present)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Plugin directory, overrides `plugins_dir`
    #[arg(long, short = 'p')]
    plugins: Option<PathBuf>,

    /// Log filter directive, overrides `logging.level`
    #[arg(long)]
    log_level: Option<String>,
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut cfg = match &cli.config {
        Some(path) => Config::load(path)?,
        None if Path::new(DEFAULT_CONFIG).is_file() => Config::load(DEFAULT_CONFIG)?,
        None => Config::default(),
    };
    if let Some(dir) = &cli.plugins {
        cfg.plugins_dir = dir.clone();
    }
    if let Some(level) = &cli.log_level {
        cfg.logging.level = level.clone();
    }
    Ok(cfg)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = load_config(&cli).context("loading configuration")?;
    let _guard = init_logging(&cfg.logging)?;

    info!(
        plugins_dir = %cfg.plugins_dir.display(),
        config = ?cfg.source,
        "heartbus starting"
    );

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let rt = RuntimeBuilder::new(cfg).with_subscribers(subs).build();

    if let Err(e) = rt.run().await {
        error!(label = e.as_label(), "{e}");
        return Err(e.into());
    }
    info!("heartbus stopped");
    Ok(())
}
