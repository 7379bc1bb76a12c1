//! rdv: rendezvous relay client CLI.
//!
//! Joins a relay under an identity and streams relay events, lists who is
//! online, and sends one-off offers, answers or ICE candidates.

mod commands;
mod config;

use clap::{Parser, Subcommand};
use rendezvous_core::WireFormat;
use tracing::error;

/// rdv: rendezvous relay client
#[derive(Parser)]
#[command(name = "rdv", version, about = "Signaling relay client: join, list peers, send signals")]
struct Cli {
    /// Relay URL (ws://, wss://, http(s):// or host:port)
    #[arg(short, long, global = true)]
    url: Option<String>,

    /// Send CBOR binary frames instead of JSON text frames
    #[arg(long, global = true)]
    cbor: bool,

    /// Config file path
    #[arg(long = "config", global = true)]
    config: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register under an identity and print relay events until Ctrl+C
    Join {
        /// Identity to register
        identity: String,
    },

    /// List identities currently registered on the relay
    Peers,

    /// Relay one offer, answer or ICE candidate
    Send {
        /// offer, answer or ice-candidate
        kind: String,
        /// Identity to deliver to
        target: String,
        /// Message body as JSON
        body: String,
        /// Sender identity placed in `from`
        #[arg(long)]
        from: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing.
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("rdv=debug,rendezvous_cli=debug,rendezvous_client=debug,rendezvous_core=debug")
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("rdv=warn,rendezvous_cli=warn")
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| config::default_path().to_string_lossy().to_string());
    let cfg = match config::Config::load(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("rdv: {e:#}");
            std::process::exit(1);
        }
    };

    // CLI flag overrides the config file.
    let url = cli.url.clone().unwrap_or(cfg.default.url);
    let format = if cli.cbor || cfg.default.cbor {
        WireFormat::Cbor
    } else {
        WireFormat::Json
    };

    let result = match cli.command {
        Command::Join { identity } => commands::join::run(&url, format, &identity).await,
        Command::Peers => commands::peers::run(&url, format).await,
        Command::Send {
            kind,
            target,
            body,
            from,
        } => commands::send::run(&url, format, &kind, &target, &body, &from).await,
    };

    if let Err(e) = result {
        error!("{:#}", e);
        eprintln!("rdv: {e:#}");
        std::process::exit(1);
    }
}
