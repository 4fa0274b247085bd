use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crucible::config::Config;
use crucible::terminal::Terminal;

/// Crucible - an interactive shell extended by Lua plugins
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Load plugins from this directory instead of the configured one
    #[arg(short, long)]
    extensions: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so they never interleave with command output.
    // RUST_LOG overrides the level picked by --debug.
    let default_level = if args.debug { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set global default subscriber")?;

    let mut config = if let Some(config_path) = args.config {
        Config::load_from_file(&config_path)?
    } else {
        Config::load_default()?
    };

    if let Some(dir) = args.extensions {
        config.paths.extensions_dir = dir.into();
    }

    let mut terminal = Terminal::new(config)?;
    if let Err(e) = terminal.run() {
        eprintln!("\nCrucible encountered an error: {e:#}");
        return Err(e);
    }

    Ok(())
}
