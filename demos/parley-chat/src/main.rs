//! Parley chat: run a relay or talk to one from the terminal.
//!
//! Run with:
//!   cargo run -p parley-chat -- serve --port 11111
//!   cargo run -p parley-chat -- connect --name alice
//!
//! Client commands:
//!   /w <name> <text>   private message
//!   /quit              leave and exit
//!   anything else      chat to everyone

mod client;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use parley::prelude::*;
use tracing_subscriber::EnvFilter;

/// Minimal TCP chat relay and terminal client
#[derive(Parser, Debug)]
#[command(name = "parley-chat", version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the relay server
    Serve {
        /// Port to listen on (all interfaces)
        #[arg(short, long, default_value_t = 11111)]
        port: u16,
    },
    /// Connect to a relay and chat
    Connect {
        /// Server host
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Server port
        #[arg(short, long, default_value_t = 11111)]
        port: u16,
        /// Display name to request
        #[arg(short, long, default_value = "")]
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so they never mix with rendered chat on stdout.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::Serve { port } => serve(port).await,
        Command::Connect { host, port, name } => {
            client::run(&format!("{host}:{port}"), &name).await
        }
    }
}

async fn serve(port: u16) -> Result<()> {
    let server = ParleyServer::builder()
        .bind(&format!("0.0.0.0:{port}"))
        .build()
        .await
        .context("failed to start server")?;

    let shutdown = server.shutdown_token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("interrupt received"),
            Err(e) => tracing::error!(error = %e, "failed to listen for ctrl-c"),
        }
        shutdown.cancel();
    });

    server.run().await?;
    Ok(())
}
