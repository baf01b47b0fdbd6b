use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "slowq")]
#[command(about = "Slow-query log to warehouse loader", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Process the preceding fully elapsed hour
    Run {
        /// Reference instant (RFC 3339) instead of the current time;
        /// the run targets the hour before it
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Init {
        #[arg(long)]
        stdout: bool,
    },
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "slowq=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config_path = slowq::config::resolve_config_path(cli.config.as_deref());

    match cli.command {
        Some(Commands::Run { at }) => {
            slowq::cli::run::run(config_path, at).await;
        }
        None => {
            // Default behavior is to run
            slowq::cli::run::run(config_path, None).await;
        }
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init { stdout } => {
                slowq::cli::config::init(stdout)?;
            }
            ConfigAction::Validate => {
                slowq::cli::config::validate(config_path)?;
            }
        },
    }

    Ok(())
}
