//! VitalChat CLI, the main entry point.
//!
//! Commands:
//! - `init`            Create the config directory and a default config
//! - `ask`             Answer one question
//! - `chat`            Interactive conversation
//! - `process-mobile`  Turn a HealthKit export into processed metrics
//! - `config`          Show, locate or validate the configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "vitalchat",
    about = "VitalChat: answers grounded in the web and your own health data",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration
    Init,

    /// Ask a single question
    Ask {
        /// The question
        question: String,

        /// Print the synthesized prompt instead of generating an answer
        #[arg(long)]
        dry_run: bool,
    },

    /// Chat interactively
    Chat,

    /// Process a HealthKit JSON-Lines export
    ProcessMobile {
        /// Directory holding the export files
        #[arg(short, long)]
        input: PathBuf,

        /// Where to write the processed metrics
        #[arg(short, long)]
        output: PathBuf,

        /// Shift every sample date by this many days
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        offset_days: i64,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the config file path
    Path,
    /// Check the configuration for errors
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init => commands::init::run().await?,
        Commands::Ask { question, dry_run } => commands::ask::run(&question, dry_run).await?,
        Commands::Chat => commands::chat::run().await?,
        Commands::ProcessMobile {
            input,
            output,
            offset_days,
        } => commands::process_mobile::run(&input, &output, offset_days).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
            ConfigAction::Validate => commands::config_cmd::validate().await?,
        },
    }

    Ok(())
}
