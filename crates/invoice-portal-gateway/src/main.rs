//! `invoice-portal` - public invoice portal gateway binary.

use anyhow::{Context, Result};
use clap::Parser;
use invoice_portal_gateway::{telemetry, GatewayConfig, GatewayService};
use std::path::PathBuf;
use tracing::info;

/// Public invoice portal gateway
#[derive(Parser, Debug)]
#[command(name = "invoice-portal")]
#[command(about = "Token-gated public access to invoices", long_about = None)]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "PORTAL_CONFIG")]
    config: Option<PathBuf>,

    /// HTTP listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Base URL of the token/invoice authority
    #[arg(long)]
    authority_url: Option<String>,

    /// Base URL of the document storage authority
    #[arg(long)]
    storage_url: Option<String>,
}

impl Args {
    /// File, then `PORTAL_*` environment, then flags.
    fn load_config(&self) -> Result<GatewayConfig> {
        let mut config = match &self.config {
            Some(path) => GatewayConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => GatewayConfig::default(),
        };
        config.apply_env();

        if let Some(port) = self.port {
            config.http.port = port;
        }
        if let Some(url) = &self.authority_url {
            config.upstream.authority_url = url.clone();
        }
        if let Some(url) = &self.storage_url {
            config.upstream.storage_url = url.clone();
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.load_config()?;

    telemetry::init_tracing(&config.logging).context("initializing logging")?;
    info!(
        version = invoice_portal_gateway::VERSION,
        addr = %config.http_addr(),
        "Starting invoice portal gateway"
    );

    let service = GatewayService::new(config).context("building gateway")?;
    service.run().await.context("serving")?;
    Ok(())
}
