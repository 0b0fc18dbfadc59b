//! Captionist CLI - AI image captioning with provider fallback.
//!
//! Every image gets a concise caption and a creative caption from the first
//! configured caption provider that answers. Results are stored per user and
//! written to stdout (or a file) as JSON or JSON Lines.
//!
//! # Usage
//!
//! ```bash
//! # Create an account and sign in (the session is remembered)
//! captionist account signup --email ada@example.com --name "Ada"
//! captionist account login --email ada@example.com
//!
//! # Caption one image, or a whole directory
//! captionist caption cat.jpg
//! captionist caption ./photos/ --parallel 4 --format jsonl --output captions.jsonl
//!
//! # Browse earlier results
//! captionist history --limit 10
//! captionist show 3f6c2a1e-8b4d-4c7a-9e21-5d0b7f9a1c42
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// Captionist - AI image captioning with provider fallback.
#[derive(Parser, Debug)]
#[command(name = "captionist")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Caption an image file or every image in a directory
    Caption(cli::caption::CaptionArgs),

    /// List your captioned images, newest first
    History(cli::history::HistoryArgs),

    /// Show one caption record with time-limited image URLs
    Show(cli::history::ShowArgs),

    /// Sign up, sign in, and manage your account
    Account(cli::account::AccountArgs),

    /// Show caption providers in fallback order
    Providers,

    /// Service-wide statistics and retention purge
    Admin(cli::admin::AdminArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config warnings go through eprintln.
    let config = match captionist_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `captionist config path`."
            );
            captionist_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Captionist v{}", captionist_core::VERSION);

    match cli.command {
        Commands::Caption(args) => cli::caption::execute(args, config).await,
        Commands::History(args) => cli::history::execute_history(args, config).await,
        Commands::Show(args) => cli::history::execute_show(args, config).await,
        Commands::Account(args) => cli::account::execute(args, config).await,
        Commands::Providers => cli::providers::execute(config),
        Commands::Admin(args) => cli::admin::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args, config),
    }
}
