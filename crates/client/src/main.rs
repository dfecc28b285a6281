//! CLI for bidding in sealed-bid auctions.
//!
//! This binary provides commands for:
//! - Looking up auctions
//! - Submitting sealed bids
//! - Viewing results
//! - Fetching released decryption keys and revealing bids

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use auction_client::config::ClientConfig;
use auction_client::{
    AuctionQuery, BackendClient, BidForm, BidFormInput, LocalWallet, ShutterClient,
};
use auction_types::{format_decryption_time, Auction, SealedBid};

#[derive(Parser)]
#[command(name = "auction-cli")]
#[command(about = "CLI for sealed-bid auctions")]
struct Cli {
    /// Auction backend API base URL [default: $BACKEND_API_BASE or the public backend]
    #[arg(long)]
    backend_url: Option<String>,

    /// Encryption network API base URL [default: $SHUTTER_API_BASE or Chiado staging]
    #[arg(long)]
    shutter_url: Option<String>,

    /// Require the contact to be an email address (also set by $REQUIRE_EMAIL)
    #[arg(long)]
    require_email: bool,

    /// Per-request timeout in seconds [default: $REQUEST_TIMEOUT_SECS or 30]
    #[arg(long)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Get auction details
    Auction {
        #[arg(long)]
        slug: String,
    },

    /// List sealed-bid auctions
    Sealed,

    /// Submit a sealed bid
    Bid {
        #[arg(long)]
        slug: String,

        /// Bidder name
        #[arg(long)]
        name: String,

        /// Email or Telegram handle
        #[arg(long, default_value = "")]
        contact: String,

        /// Bid amount (will be encrypted)
        #[arg(long)]
        amount: String,

        /// Hex private key of the bidding wallet
        #[arg(long, env = "BIDDER_PRIVATE_KEY", hide_env_values = true)]
        private_key: String,
    },

    /// Get results of a sealed-bid auction
    Results {
        #[arg(long)]
        slug: String,
    },

    /// Get the released decryption key of an identity
    DecryptionKey {
        #[arg(long)]
        identity: String,
    },

    /// Decrypt a sealed bid through the encryption network
    Reveal {
        #[arg(long)]
        identity: String,

        /// Hex ciphertext
        #[arg(long)]
        ciphertext: String,
    },
}

impl Cli {
    /// Apply command-line overrides on top of `base`.
    fn config(&self, base: ClientConfig) -> ClientConfig {
        ClientConfig {
            backend_url: self.backend_url.clone().unwrap_or(base.backend_url),
            shutter_url: self.shutter_url.clone().unwrap_or(base.shutter_url),
            require_email: self.require_email || base.require_email,
            request_timeout_secs: self.timeout.unwrap_or(base.request_timeout_secs),
        }
    }
}

fn print_auction(a: &Auction) {
    println!("Auction {} ({}):", a.slug, a.id);
    println!("  Name: {}", a.name);
    println!("  Type: {}", a.auction_type);
    println!("  Expires: {}", a.expiration_time.to_rfc3339());
    println!("  Wallet: {}", a.wallet_address);
    if let Some(winner) = &a.winner_wallet_address {
        println!("  Winner: {}", winner);
    }
}

fn print_sealed_bid(index: usize, bid: &SealedBid) {
    println!("  [{}] Bidder: {}", index, bid.wallet_address);
    if let Some(name) = &bid.name {
        println!("      Name: {}", name);
    }
    match &bid.decrypted_bid_amount {
        Some(amount) => println!("      Amount: {}", amount),
        None => println!(
            "      Sealed until {}",
            format_decryption_time(bid.decryption_timestamp)
        ),
    }
}

async fn get_auction_cmd(backend: &BackendClient, slug: &str) -> Result<()> {
    let auction = backend.auction_by_slug(slug).await?;
    print_auction(&auction);
    Ok(())
}

async fn list_sealed_cmd(backend: &BackendClient) -> Result<()> {
    let auctions = backend.sealed_auctions().await?;

    if auctions.is_empty() {
        println!("No sealed auctions found");
    } else {
        println!("Sealed auctions:");
        for a in auctions {
            println!(
                "  [{}] {} - {} (expires {})",
                a.id,
                a.slug,
                a.name,
                a.expiration_time.to_rfc3339()
            );
        }
    }

    Ok(())
}

async fn submit_bid_cmd(
    config: &ClientConfig,
    slug: &str,
    input: BidFormInput,
    private_key: &str,
) -> Result<()> {
    let backend = BackendClient::from_config(config)?;
    let network = ShutterClient::from_config(config)?;
    let wallet = LocalWallet::from_private_key(private_key)?;

    let auction = backend.auction_by_slug(slug).await?;
    let mut form =
        BidForm::new(auction, network, backend, wallet).require_email(config.require_email);

    let receipt = form
        .submit(input)
        .await
        .map_err(|e| anyhow!(e.user_message()))?;

    info!("Bid submitted for auction {}", slug);
    println!("Bid submitted successfully");
    println!("  Auction: {}", slug);
    println!("  Wallet: {}", receipt.payload.wallet_address);
    println!("  Identity: {}", receipt.identity.identity);
    println!(
        "  Revealed at: {}",
        format_decryption_time(receipt.payload.decryption_timestamp)
    );
    if let Some(bid_id) = receipt.ack.bid_id {
        println!("  Bid ID: {}", bid_id);
    }

    Ok(())
}

async fn get_results_cmd(backend: &BackendClient, slug: &str) -> Result<()> {
    let results = backend.sealed_auction_results(slug).await?;
    print_auction(&results.auction);

    if results.attendees.is_empty() {
        println!("No bids for auction {}", slug);
    } else {
        println!("Bids:");
        for (i, bid) in results.attendees.iter().enumerate() {
            print_sealed_bid(i, bid);
        }
    }

    match results.winner {
        Some(winner) => println!(
            "Winner: {} with {}",
            winner.wallet_address,
            winner.decrypted_bid_amount.as_deref().unwrap_or("?")
        ),
        None => println!("No winner yet"),
    }

    Ok(())
}

async fn decryption_key_cmd(network: &ShutterClient, identity: &str) -> Result<()> {
    match network.get_decryption_key(identity).await? {
        Some(release) => {
            println!("Decryption key:");
            println!("  Key: {}", release.decryption_key);
            println!(
                "  Released for: {}",
                format_decryption_time(release.decryption_timestamp)
            );
        }
        None => println!("Decryption key not yet released"),
    }
    Ok(())
}

async fn reveal_cmd(network: &ShutterClient, identity: &str, ciphertext: &str) -> Result<()> {
    let bid = network.decrypt_commitment(identity, ciphertext).await?;
    println!("Revealed bid:");
    println!("  Auction: {}", bid.auction_slug);
    println!("  Name: {}", bid.name);
    println!("  Wallet: {}", bid.wallet_address);
    println!("  Amount: {}", bid.bid_amount);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("auction_cli=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.config(ClientConfig::from_env());

    match cli.command {
        Commands::Auction { slug } => {
            get_auction_cmd(&BackendClient::from_config(&config)?, &slug).await?;
        }

        Commands::Sealed => {
            list_sealed_cmd(&BackendClient::from_config(&config)?).await?;
        }

        Commands::Bid {
            slug,
            name,
            contact,
            amount,
            private_key,
        } => {
            let input = BidFormInput {
                name,
                contact,
                bid_amount: amount,
            };
            submit_bid_cmd(&config, &slug, input, &private_key).await?;
        }

        Commands::Results { slug } => {
            get_results_cmd(&BackendClient::from_config(&config)?, &slug).await?;
        }

        Commands::DecryptionKey { identity } => {
            decryption_key_cmd(&ShutterClient::from_config(&config)?, &identity).await?;
        }

        Commands::Reveal {
            identity,
            ciphertext,
        } => {
            reveal_cmd(&ShutterClient::from_config(&config)?, &identity, &ciphertext).await?;
        }
    }

    Ok(())
}
