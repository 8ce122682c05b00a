//! `mallard-proxy` binary entrypoint.
//!
//! Starts the Actix server using configuration from environment variables,
//! layered with `mallard.yml` when one is present.

use std::path::Path;

use mallard_proxy::{serve, ProxyConfig};

const CONFIG_FILE: &str = "mallard.yml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Respect `RUST_LOG` if set; otherwise default to relay-friendly info.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = if Path::new(CONFIG_FILE).exists() {
        ProxyConfig::from_yaml_file(CONFIG_FILE)?
    } else {
        ProxyConfig::default()
    };

    serve(config).await
}
