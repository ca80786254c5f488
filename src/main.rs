//! Docker Registry Proxy
//!
//! Serves several upstream registries behind one set of hostnames.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────┐
//!                        │               REGISTRY PROXY                 │
//!                        │                                              │
//!     Client Request     │  ┌─────────┐   ┌──────────┐   ┌──────────┐  │
//!     ───────────────────┼─▶│  http   │──▶│ routing  │──▶│  proxy   │──┼──▶ Upstream
//!                        │  │ server  │   │ dispatch │   │  relay   │  │    registry
//!                        │  └─────────┘   └──────────┘   └────┬─────┘  │
//!                        │                                    │        │
//!                        │                              ┌─────▼─────┐  │
//!                        │                              │ registry  │  │
//!                        │                              │ challenge │  │
//!                        │                              │ namespace │  │
//!                        │                              │  token    │  │
//!                        │                              └───────────┘  │
//!                        └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use registry_proxy::config::{self, Mode, ProxyConfig};
use registry_proxy::observability::{logging, metrics};
use registry_proxy::routing::RouteTable;
use registry_proxy::{HttpServer, Shutdown};

#[derive(Parser, Debug)]
#[command(name = "registry-proxy")]
#[command(about = "Reverse proxy for Docker Registry v2 upstreams", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long, env = "REGISTRY_PROXY_CONFIG")]
    config: Option<PathBuf>,

    /// production or debug.
    #[arg(long, env = "MODE")]
    mode: Option<Mode>,

    /// Upstream for unmapped hosts in debug mode.
    #[arg(long, env = "TARGET_UPSTREAM")]
    target_upstream: Option<String>,

    /// Seed the standard route table under this domain.
    #[arg(long, env = "CUSTOM_DOMAIN")]
    custom_domain: Option<String>,

    #[arg(long, env = "BIND_ADDRESS")]
    bind: Option<String>,

    /// Print the resolved route table as JSON and exit.
    #[arg(long)]
    print_routes: bool,
}

impl Cli {
    fn apply(self, config: &mut ProxyConfig) {
        if let Some(mode) = self.mode {
            config.registry.mode = mode;
        }
        if let Some(target) = self.target_upstream {
            config.registry.target_upstream = Some(target);
        }
        if let Some(domain) = self.custom_domain {
            config.registry.custom_domain = Some(domain);
        }
        if let Some(bind) = self.bind {
            config.listener.bind_address = bind;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut cli = Cli::parse();
    let print_routes = cli.print_routes;
    let path = cli.config.take();
    let config = config::load_config(path.as_deref(), |config| cli.apply(config))?;

    if print_routes {
        let table = RouteTable::from_config(&config);
        println!("{}", serde_json::to_string_pretty(&table)?);
        return Ok(());
    }

    logging::init_logging(&config.observability);

    tracing::info!("registry-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        mode = ?config.registry.mode,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();

    let server = HttpServer::new(config)?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
