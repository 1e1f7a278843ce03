use anyhow::Result;
use clap::{Parser, Subcommand};
use std::str::FromStr;
use tracing::{info, Level};

use sts_auth::commands::{ClientCommand, ServerCommand, WhoamiCommand};
use sts_auth::{client, server};

#[derive(Parser)]
#[command(
    name = "sts-auth",
    about = "Authenticate HTTP callers through AWS STS GetCallerIdentity",
    version = env!("CARGO_PKG_VERSION"),
    author = "ktruck"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve a handler protected by STS authentication
    Server(ServerCommand),
    /// Call a protected server with a signed assertion
    Client(ClientCommand),
    /// Sign an assertion and verify it against STS
    Whoami(WhoamiCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { cli.log_level.as_str() };
    let level = Level::from_str(log_level).unwrap_or(Level::INFO);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Server(server_cmd) => {
            info!("Starting STS auth server");
            server::run(server_cmd).await?;
        }
        Commands::Client(client_cmd) => {
            client::run(client_cmd).await?;
        }
        Commands::Whoami(whoami_cmd) => {
            client::whoami(whoami_cmd).await?;
        }
    }

    Ok(())
}
