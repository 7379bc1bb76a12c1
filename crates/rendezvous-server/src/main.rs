//! rendezvous-server: signaling relay for peer-to-peer connection setup.
//!
//! Peers register a name over WebSocket, learn who else is online, and swap
//! offers, answers and ICE candidates through the relay until they can talk
//! directly.

mod config;
mod relay;
mod server;
mod transport;

use clap::Parser;
use config::ServerConfig;
use server::RendezvousServer;
use std::path::PathBuf;
use tracing::{error, info};

/// rendezvous-server: signaling relay
#[derive(Parser, Debug)]
#[command(name = "rendezvous-server", version, about = "WebRTC-style signaling relay")]
struct Cli {
    /// Listen port (overrides the config file)
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Bind address (overrides the config file)
    #[arg(long)]
    bind: Option<String>,

    /// Config file path
    #[arg(long, default_value = "~/.rendezvous/config.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    use tracing_subscriber::EnvFilter;
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        protocol = rendezvous_core::PROTOCOL_VERSION,
        "starting rendezvous-server"
    );

    let config_path = PathBuf::from(&cli.config);
    let server_config = match ServerConfig::load(Some(&config_path), cli.port, cli.bind.as_deref())
    {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "failed to load config");
            std::process::exit(1);
        }
    };

    let server = RendezvousServer::new(server_config);
    if let Err(e) = server.run(shutdown_signal()).await {
        error!(error = %e, "server error");
        std::process::exit(1);
    }

    info!("rendezvous-server stopped");
}

/// Wait for SIGTERM or SIGINT (Ctrl+C).
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }

    info!("received shutdown signal");
}
