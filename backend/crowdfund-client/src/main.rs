use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use crowdfund_client::{wallet::KeystoreWallet, DonationClient, Settings};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "crowdfund", version, about = "Donate to and watch a Soroban crowdfund")]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Read the campaign once and print it
    Status,

    /// Keep the campaign in sync and print every change until Ctrl-C
    Watch,

    /// Pay the campaign owner and record the donation in the contract
    Donate {
        /// Amount in XLM, e.g. 10 or 2.5
        amount: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.settings.client_config();
    info!(rpc = %config.rpc_url, contract = ?config.contract_id, "crowdfund client starting");

    let wallet = match cli.settings.wallet_secret() {
        Some(secret) => {
            KeystoreWallet::from_secrets([secret]).context("WALLET_SECRET is not a valid secret key")?
        }
        None => KeystoreWallet::empty(),
    };
    let client = DonationClient::with_network(config, Arc::new(wallet))
        .context("failed to build the ledger HTTP clients")?;

    match cli.command {
        Command::Status => {
            client.connect().await;
            client.refresh().await;
            println!("{}", client.snapshot().await);
        }
        Command::Watch => {
            client.connect().await;
            let mut changes = client.subscribe();
            let sync = client.start_sync();
            println!("{}", client.snapshot().await);

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    changed = changes.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        println!("{}", client.snapshot().await);
                    }
                }
            }
            sync.shutdown().await;
        }
        Command::Donate { amount } => {
            if client.connect().await.is_none() {
                anyhow::bail!(
                    "{}",
                    client.snapshot().await.notice.unwrap_or_default()
                );
            }
            let attempt = client
                .donate(&amount)
                .await
                .map_err(|e| anyhow::anyhow!(e.user_message()))?;
            info!(status = ?attempt.status(), "donation finished");
            println!("{}", client.snapshot().await);
        }
    }

    Ok(())
}
