//! tagbridge server binary.
//!
//! # Usage
//!
//! ```bash
//! # Listen on the default reader port with rfid_config.json from the cwd
//! tagbridge-server
//!
//! # Custom registry and inventory endpoint
//! tagbridge-server --registry /etc/tagbridge/readers.json \
//!     --endpoint https://inventory.example.org/api/rfid-update
//! ```

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use tagbridge_core::SessionConfig;
use tagbridge_server::{
    DEFAULT_BIND_ADDRESS, DEFAULT_ENDPOINT, DEFAULT_READ_BUFFER, DEFAULT_REGISTRY_PATH,
    DriverConfig, Server, ServerRuntimeConfig,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// RFID reader bridge
#[derive(Parser, Debug)]
#[command(name = "tagbridge-server")]
#[command(about = "Bridges RFID shelf and return-box readers to the inventory service")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = DEFAULT_BIND_ADDRESS)]
    bind: String,

    /// Path to the reader registry (JSON)
    #[arg(short, long, default_value = DEFAULT_REGISTRY_PATH)]
    registry: PathBuf,

    /// Inventory service URL events are posted to
    #[arg(short, long, default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Seconds a tag must be unseen before it is reported gone at disconnect
    #[arg(long, default_value = "5")]
    stale_after_secs: u64,

    /// Bytes requested per socket read (one read is one frame)
    #[arg(long, default_value_t = DEFAULT_READ_BUFFER)]
    read_buffer: usize,

    /// HTTP request timeout in seconds
    #[arg(long, default_value = "10")]
    forward_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn into_config(self) -> ServerRuntimeConfig {
        ServerRuntimeConfig {
            bind_address: self.bind,
            registry_path: self.registry,
            endpoint: self.endpoint,
            forward_timeout: Duration::from_secs(self.forward_timeout_secs),
            driver: DriverConfig {
                session: SessionConfig { stale_after: Duration::from_secs(self.stale_after_secs) },
                read_buffer: self.read_buffer,
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("tagbridge server starting");
    tracing::info!("Binding to {}", args.bind);
    tracing::info!("Forwarding events to {}", args.endpoint);

    let server = Server::bind(args.into_config()).await?;

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(shutdown.clone()));

    server.run(shutdown).await;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Cancel `token` on Ctrl-C or SIGTERM.
async fn cancel_on_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutting down...");
    token.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults() {
        let config = Args::parse_from(["tagbridge-server"]).into_config();

        assert_eq!(config.bind_address, "0.0.0.0:5000");
        assert_eq!(config.registry_path, PathBuf::from("rfid_config.json"));
        assert_eq!(config.driver.session.stale_after, Duration::from_secs(5));
        assert_eq!(config.driver.read_buffer, 1024);
        assert_eq!(config.forward_timeout, Duration::from_secs(10));
    }

    #[test]
    fn cli_overrides() {
        let config = Args::parse_from([
            "tagbridge-server",
            "--bind",
            "127.0.0.1:6000",
            "--stale-after-secs",
            "30",
            "--endpoint",
            "http://localhost:3000/api/rfid-update",
        ])
        .into_config();

        assert_eq!(config.bind_address, "127.0.0.1:6000");
        assert_eq!(config.driver.session.stale_after, Duration::from_secs(30));
        assert_eq!(config.endpoint, "http://localhost:3000/api/rfid-update");
    }
}
