use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cliprelay::config::Config;

mod commands;

#[derive(Parser)]
#[command(
    name = "cliprelay",
    version,
    about = "Republishes the most-viewed stream clips of tracked channels, each exactly once",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); defaults to the configured format
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all source supervisors until Ctrl-C
    Run {
        /// Skip the fetch cycle that normally runs at startup
        #[arg(long, default_value = "false")]
        no_initial_fetch: bool,
    },

    /// Run one fetch cycle for a source, then exit
    Fetch {
        /// Source (channel login) to fetch
        #[arg(short, long)]
        source: String,
    },

    /// Run one fetch cycle and one publish cycle for a source
    Publish {
        /// Source (channel login) to publish for
        #[arg(short, long)]
        source: String,
    },

    /// Inspect the published-clip ledger
    Ledger {
        /// Source whose ledger to open when ledgers are per source
        #[arg(short, long)]
        source: Option<String>,

        /// Check whether a clip id was published
        #[arg(long)]
        contains: Option<String>,

        /// List every recorded clip id
        #[arg(long, default_value = "false")]
        list: bool,
    },

    /// Check the configuration and show upcoming firings
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let dotenv = dotenvy::dotenv();
    let config_exists = cli.config.exists();
    let config = Config::load(&cli.config);

    // Logging settings come from the config when it loaded, CLI flags win
    let logging = config
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_default();
    let format = cli.log_format.as_deref().unwrap_or(&logging.format);
    setup_tracing(format, cli.verbose, &logging.level)?;

    if let Ok(path) = &dotenv {
        tracing::debug!(path = %path.display(), "Loaded environment file");
    }
    if !config_exists {
        tracing::warn!(path = %cli.config.display(), "Config file not found, using defaults and environment");
    }

    let config = config?;

    tracing::info!("cliprelay starting");

    match cli.command {
        Commands::Run { no_initial_fetch } => {
            tracing::info!(initial_fetch = !no_initial_fetch, "Starting run command");
            commands::run(config, !no_initial_fetch).await?;
        }

        Commands::Fetch { source } => {
            tracing::info!(source = %source, "Starting fetch command");
            commands::fetch(config, source).await?;
        }

        Commands::Publish { source } => {
            tracing::info!(source = %source, "Starting publish command");
            commands::publish(config, source).await?;
        }

        Commands::Ledger {
            source,
            contains,
            list,
        } => {
            commands::ledger(config, source, contains, list).await?;
        }

        Commands::Validate => {
            commands::validate(config)?;
        }
    }

    tracing::info!("cliprelay stopped");
    Ok(())
}

fn setup_tracing(format: &str, verbose: bool, level: &str) -> Result<()> {
    let default_filter = if verbose {
        "cliprelay=debug,info".to_string()
    } else {
        format!("cliprelay={level},warn")
    };

    // RUST_LOG overrides the configured level
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&default_filter))?;

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
