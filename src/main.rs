use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use busy::config::BusyConfig;
use busy::memory::DEFAULT_THRESHOLD;

#[derive(Parser)]
#[command(name = "busy", version, about = "Memory-backed chat assistant")]
struct Cli {
    /// Config file (defaults to ~/.busy/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP API
    Serve,
    /// Run the line-JSON tool server on stdin/stdout
    Tools,
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Semantic search over a user's memories
    Search {
        /// Owner of the memories
        #[arg(long)]
        email: String,
        query: String,
        #[arg(long, default_value_t = 5)]
        limit: i64,
        #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
        threshold: f64,
    },
    /// Check database health
    Doctor,
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a user that can log in to the HTTP API
    Create {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => BusyConfig::load_from(path)?,
        None => BusyConfig::load()?,
    };

    // Log to stderr so stdout stays clean for the tool server.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve => busy::server::serve_http(config).await?,
        Command::Tools => busy::tools::run_stdio(&config).await?,
        Command::User { action } => match action {
            UserAction::Create {
                email,
                password,
                name,
            } => busy::cli::create_user(&config, &email, &password, name.as_deref())?,
        },
        Command::Search {
            email,
            query,
            limit,
            threshold,
        } => busy::cli::search(&config, &email, &query, limit, threshold).await?,
        Command::Doctor => busy::cli::doctor(&config)?,
    }

    Ok(())
}
