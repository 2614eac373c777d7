// ============================================
// File: crates/burrow-client/src/main.rs
// ============================================
//! # burrow-client
//!
//! ```bash
//! burrow-client genkey                                  # new base64 key, same on the peer
//! burrow-client validate -c /etc/burrow/client.toml
//! burrow-client connect -c /etc/burrow/client.toml      # until SIGINT/SIGTERM
//! burrow-client connect -s vpn.example.com -p 9000      # peer from the CLI
//! ```
//!
//! Exit status is 0 only when `connect` ended on a signal. Startup
//! failures and sessions that ended on an error exit with 1.
//!
//! ## ⚠️ Important Note for Next Developer
//! - `connect` installs its signal handlers before the handshake. A
//!   Ctrl+C while waiting for Accept is held until the tunnel is up and
//!   then ends the session through the normal restore path
//!
//! ## Last Modified
//! v0.1.0 - Initial CLI implementation

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use burrow_client::config::DEFAULT_CONFIG_PATH;
use burrow_client::ClientConfig;
use burrow_core::PresharedKey;

/// Burrow encrypted tunnel client
#[derive(Parser, Debug)]
#[command(name = "burrow-client", author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect to the peer and relay traffic until interrupted
    Connect {
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Peer host, replaces `peer.host`
        #[arg(short, long)]
        server: Option<String>,

        /// Peer UDP port, replaces `peer.port`
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Check a configuration file and print it with defaults filled in
    /// and key material redacted
    Validate {
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },

    /// Print a new random pre-shared key (base64)
    Genkey,
}

#[tokio::main]
async fn main() -> ExitCode {
    let outcome = match Cli::parse().command {
        Command::Connect {
            config,
            server,
            port,
        } => connect(&config, server, port).await,
        Command::Validate { config } => {
            init_logging("info");
            validate(&config).await.map(|()| true)
        }
        Command::Genkey => {
            println!("{}", PresharedKey::generate().to_base64());
            Ok(true)
        }
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            // connect may fail before its config picked a level
            init_logging("info");
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// One session. `Ok(true)` if a signal ended it.
#[cfg(target_os = "linux")]
async fn connect(path: &Path, server: Option<String>, port: Option<u16>) -> anyhow::Result<bool> {
    use burrow_client::{Client, OsSignals};

    let mut config = if path.exists() {
        ClientConfig::read(path).await?
    } else {
        ClientConfig::default()
    };
    config.peer.host = server.unwrap_or(config.peer.host);
    config.peer.port = port.unwrap_or(config.peer.port);
    config.validate()?;

    init_logging(&config.logging.level);
    if !path.exists() {
        info!("{} not found, peer taken from the command line", path.display());
    }

    let signals = OsSignals::new()?;
    let report = Client::from_config(&config).await?.run(signals).await?;

    info!(address = %report.address, "Session ended: {}", report.cause);
    for failure in report.restore.failures() {
        warn!(step = %failure.step, "Routing not fully restored: {}", failure.error);
    }
    Ok(report.cause.is_signal())
}

#[cfg(not(target_os = "linux"))]
async fn connect(_path: &Path, _server: Option<String>, _port: Option<u16>) -> anyhow::Result<bool> {
    anyhow::bail!("connect needs a Linux TUN device")
}

async fn validate(path: &Path) -> anyhow::Result<()> {
    let config = ClientConfig::load(path).await?;

    println!("✅ {} is valid (key: {})", path.display(), config.crypto.source());
    println!();
    print!("{}", config.to_toml());
    Ok(())
}

/// `RUST_LOG` wins over `level`. Later calls are no-ops.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init()
        .ok();
}
