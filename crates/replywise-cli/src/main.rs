//! `replywise` -- terminal host for the reply-suggestion pipeline.
//!
//! Provides the following subcommands:
//!
//! - `replywise send` -- Dispatch one prompt and stream the reply.
//! - `replywise check` -- Probe the selected provider's endpoint and key.
//! - `replywise providers` -- Show the resolved configuration of every provider.
//! - `replywise history` -- Show recorded requests.

use clap::{Parser, Subcommand};

mod commands;

/// replywise reply-suggestion CLI.
#[derive(Parser)]
#[command(name = "replywise", about = "replywise reply-suggestion CLI", version)]
struct Cli {
    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path (overrides auto-discovery).
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Send one prompt and print the reply as it streams.
    Send(commands::send::SendArgs),

    /// Check that the selected provider is reachable and the key is accepted.
    Check(commands::check::CheckArgs),

    /// Show the resolved configuration of every provider.
    Providers,

    /// Show recorded requests, most recent last.
    History(commands::history_cmd::HistoryArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = commands::load_config(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Send(args) => commands::send::run(args, config).await?,
        Commands::Check(args) => commands::check::run(args, config).await?,
        Commands::Providers => commands::providers::run(&config),
        Commands::History(args) => commands::history_cmd::run(args).await?,
    }

    Ok(())
}
