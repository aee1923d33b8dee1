use clap::Parser;
use parley::{Registry, config, net::tcp};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "parley", about = "Multi-client TCP chat relay")]
struct Args {
    /// Read config from a TOML file instead of the environment
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the listen address
    #[arg(long)]
    tcp_addr: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = Args::parse();

    let mut cfg = match &args.config {
        Some(path) => config::Config::load(path)?,
        None => config::Config::from_env()?,
    };
    if let Some(addr) = args.tcp_addr {
        cfg.tcp_addr = addr;
    }

    let cfg = Arc::new(cfg);
    let registry = Arc::new(Registry::new(cfg.clone()));

    let tcp_addr: SocketAddr = cfg.tcp_addr.parse()?;
    tracing::info!(%tcp_addr, "parley relay listening");
    tcp::serve(tcp_addr, registry).await?;

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, prelude::*};

    color_eyre::install().unwrap();

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_timer(tracing_subscriber::fmt::time::uptime()),
        )
        .with(tracing_error::ErrorLayer::default())
        .init();
}
