//! Line relay.
//!
//! Copies newline-delimited records from a TCP or Unix socket to stdout.
//!
//! # Architecture Overview
//!
//! ```text
//!   client ─┐
//!   client ─┼─▶ listener ─▶ acceptor ─▶ line reader (one per connection)
//!   client ─┘                                   │
//!                                               ▼
//!                                  relay queue (bounded) ─▶ writer ─▶ stdout
//!
//!   SIGINT/SIGTERM ─▶ shutdown coordinator ─▶ stop aux endpoint, close listener
//!   aux endpoint: GET /healthz, GET /metrics
//! ```
//!
//! # Usage
//!
//! ```bash
//! # TCP on the default address
//! line-relay
//!
//! # Unix socket (takes precedence over --addr)
//! line-relay --unix /var/run/relay.sock
//!
//! # With a config file
//! line-relay --config relay.toml
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use line_relay::config::RelayConfig;
use line_relay::observability::logging::init_logging;
use line_relay::observability::metrics::{install_recorder, PrometheusSink};
use line_relay::Server;

/// Copy lines from a socket to stdout.
#[derive(Parser, Debug)]
#[command(name = "line-relay")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// TCP address [default: 127.0.0.1:4444].
    #[arg(long)]
    addr: Option<String>,

    /// Unix socket path. Takes precedence if both unix and tcp are set.
    #[arg(long)]
    unix: Option<String>,

    /// Listen address for the aux handler: metrics, health checks [default: :9090].
    #[arg(long = "aux-addr")]
    aux_addr: Option<String>,

    /// Relay queue capacity [default: 1].
    #[arg(long)]
    queue_capacity: Option<usize>,

    /// Log level or filter directive [default: info].
    #[arg(long)]
    log_level: Option<String>,

    /// Log format: text or json [default: text].
    #[arg(long)]
    log_format: Option<String>,

    /// Enable debug logging.
    #[arg(short, long)]
    debug: bool,
}

impl Args {
    fn apply(self, config: &mut RelayConfig) {
        if let Some(addr) = self.addr {
            config.listener.tcp_address = addr;
        }
        if let Some(unix) = self.unix {
            config.listener.unix_address = unix;
        }
        if let Some(aux_addr) = self.aux_addr {
            config.admin.bind_address = aux_addr;
        }
        if let Some(capacity) = self.queue_capacity {
            config.queue.capacity = capacity;
        }
        if let Some(level) = self.log_level {
            config.observability.log_level = level;
        }
        if let Some(format) = self.log_format {
            config.observability.log_format = format;
        }
        if self.debug {
            config.observability.log_level = "debug".to_string();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = Args::parse();

    let mut config = RelayConfig::load(args.config.take().as_deref())?;
    args.apply(&mut config);

    init_logging(&config.observability)?;

    tracing::info!(
        tcp_address = %config.listener.tcp_address,
        unix_address = %config.listener.unix_address,
        aux_address = %config.admin.bind_address,
        queue_capacity = config.queue.capacity,
        "line-relay v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let handle = install_recorder()?;
    let server = Server::new(config, Arc::new(PrometheusSink::new()))?.with_prometheus(handle);

    if let Err(e) = server.run().await {
        tracing::error!(error = %e, "Unable to run relay");
        return Err(e.into());
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
