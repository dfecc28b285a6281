//! Mock encryption network and auction backend server for local testing.

use std::net::SocketAddr;

use anyhow::Result;
use chrono::{Duration, Utc};
use clap::Parser;
use rand::rngs::OsRng;
use tracing::info;

use mock_services::{sealed_auction, MockServices, MockState};

#[derive(Parser)]
#[command(name = "mock-services")]
#[command(about = "Mock encryption network and auction backend")]
struct Cli {
    /// Listen address
    #[arg(long, default_value = "127.0.0.1:3001")]
    addr: SocketAddr,

    /// Minutes until the seeded demo auction closes
    #[arg(long, default_value_t = 60)]
    demo_minutes: i64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mock_services=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let expiration = Utc::now() + Duration::minutes(cli.demo_minutes);
    let state = MockState::new(&mut OsRng).with_auction(sealed_auction(
        1,
        "demo-sealed",
        "Demo sealed auction",
        expiration,
    ));

    let server = MockServices::bind(cli.addr, state).await?;
    info!("Encryption network: {}", server.shutter_url());
    info!("Auction backend: {}", server.backend_url());
    info!("Mock services running. Press Ctrl+C to stop.");

    tokio::signal::ctrl_c().await?;

    info!("Shutting down...");
    server.shutdown();

    Ok(())
}
