//! Burrow - SOCKS5 proxy server
//!
//! Thin driver around [`burrow::Server`]: parses flags and the optional
//! config file, installs the log subscriber, and serves until interrupted.

use anyhow::Result;
use burrow::config::{load_config, FileConfig};
use burrow::server::{Config, Server};
use burrow::socks::StaticCredentials;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Burrow - a SOCKS5 proxy server
#[derive(Parser, Debug)]
#[command(name = "burrow")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Listen address (default 0.0.0.0:1080)
    #[arg(short, long)]
    listen: Option<String>,

    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging format
    #[arg(long)]
    json_log: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(&args.log_level, args.json_log)?;

    let file = match &args.config {
        Some(path) => {
            let config = load_config(path)?;
            info!(path = ?path, "configuration loaded");
            config
        }
        None => FileConfig::default(),
    };

    let listen = listen_address(&args, &file);

    let mut config = Config::default();
    if !file.users.is_empty() {
        config = config.with_credentials(Arc::new(StaticCredentials::from(file.users.clone())));
    }
    if let Some(secs) = file.connect_timeout {
        config = config.with_connect_timeout(Duration::from_secs(secs));
    }
    if let Some(ip) = file.bind_ip {
        config = config.with_bind_ip(ip);
    }

    let server = Arc::new(Server::new(config));

    info!("burrow v{}", burrow::VERSION);

    // Ctrl+C and SIGTERM trigger a graceful stop.
    let handle = server.clone();
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm =
                signal(SignalKind::terminate()).expect("failed to setup SIGTERM handler");

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("received Ctrl+C, shutting down");
                }
                _ = sigterm.recv() => {
                    info!("received SIGTERM, shutting down");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
            info!("received Ctrl+C, shutting down");
        }

        handle.shutdown();
    });

    server.listen_and_serve(&listen).await
}

/// Pick the listen address: `--listen` beats the config file beats the
/// default, and `PROXY_PORT` overrides the port of whichever won.
fn listen_address(args: &Args, file: &FileConfig) -> String {
    let base = args
        .listen
        .clone()
        .or_else(|| file.listen.clone())
        .unwrap_or_else(|| "0.0.0.0:1080".to_string());
    match std::env::var("PROXY_PORT") {
        Ok(port) if !port.is_empty() => {
            let host = base.rsplit_once(':').map(|(h, _)| h).unwrap_or("0.0.0.0");
            format!("{host}:{port}")
        }
        _ => base,
    }
}

/// Setup logging based on configuration
fn setup_logging(level: &str, json: bool) -> Result<()> {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    if json {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(())
}
