use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use listr_cli::cli::{init_tracing, RunOptions, Runner};
use listr_core::ListrConfig;
use tokio::io::BufReader;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "listr")]
#[command(about = "Play chat events against an in-memory listr channel host")]
struct Cli {
    /// Path to JSON config file (default: ~/.listr/config.json, created if missing)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Read events from this file instead of stdin
    #[arg(long, short = 's')]
    script: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long, short)]
    pretty: bool,

    /// Run events as concurrent tasks
    #[arg(long)]
    concurrent: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_tracing() {
        eprintln!("Warning: Failed to set up logging: {:#}", e);
    }

    let config = match load_config(cli.config.clone()) {
        Ok(config) => config,
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&cli, config).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

/// An explicit path must exist; the default one is bootstrapped with defaults.
fn load_config(path: Option<PathBuf>) -> Result<ListrConfig> {
    let (path, create) = match path {
        Some(path) => (path, false),
        None => (ListrConfig::default_path(), true),
    };
    let config = ListrConfig::load(&path, create)
        .with_context(|| format!("Could not load config from {}", path.display()))?;
    info!(path = %path.display(), style = ?config.style, "Loaded config");
    Ok(config)
}

async fn run(cli: &Cli, config: ListrConfig) -> Result<()> {
    let runner = Runner::new(config);
    let options = RunOptions {
        pretty: cli.pretty,
        concurrent: cli.concurrent,
    };
    let mut stdout = tokio::io::stdout();

    let events = async {
        match &cli.script {
            Some(path) => {
                let file = tokio::fs::File::open(path)
                    .await
                    .with_context(|| format!("Could not open script {}", path.display()))?;
                runner.run(BufReader::new(file), &mut stdout, options).await
            }
            None => {
                let stdin = BufReader::new(tokio::io::stdin());
                runner.run(stdin, &mut stdout, options).await
            }
        }
    };

    tokio::select! {
        result = events => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, cancelling in-flight scans");
            runner.cancel();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_explicit_missing_config_fails() {
        let dir = tempdir().unwrap();
        let err = load_config(Some(dir.path().join("missing.json"))).unwrap_err();
        assert!(format!("{:#}", err).contains("Could not load config"));
    }

    #[test]
    fn test_explicit_config_is_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"style":"reaction-recreate","commandPrefix":"?"}"#).unwrap();

        let config = load_config(Some(path)).unwrap();
        assert_eq!(config.style, listr_core::ListStyle::ReactionRecreate);
        assert_eq!(config.command_prefix, "?");
    }
}
