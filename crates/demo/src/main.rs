//! Demo binary: connect a wallet, preview a delayed payment, and submit it to
//! the relay registry.
//!
//! Without `--rpc-url` it runs against the in-memory demo wallet.

use std::path::PathBuf;

use alloy_primitives::Address;
use chrono::{Local, TimeZone};
use clap::Parser;
use relaypay_client::{
    ConnectionManager, DeploymentConfig, PaymentIntent, RpcConnector, TransactionComposer,
};
use relaypay_types::{from_smallest_unit, to_smallest_unit, SubmissionEvent, WalletConnector};
use relaypay_wallet_mock::{DemoAccounts, DemoScenario};
use serde::Serialize;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "relaypay-demo",
    about = "Schedule a delayed ETH payment through the relay registry"
)]
struct Cli {
    /// JSON-RPC node with unlocked accounts. Omit to use the in-memory wallet.
    #[arg(long, env = "RPC_URL")]
    rpc_url: Option<String>,

    /// Deployment JSON file; replaces the address, network and fee flags.
    #[arg(long)]
    deployment: Option<PathBuf>,

    /// Registry contract address.
    #[arg(long, env = "REGISTRY_ADDRESS")]
    registry: Option<Address>,

    /// Sender contract address.
    #[arg(long, env = "SENDER_ADDRESS")]
    sender: Option<Address>,

    /// Network id that accepts submissions.
    #[arg(long, env = "ACCEPTED_NETWORK", default_value = "3")]
    accepted_network: u64,

    /// Protocol fee in ether.
    #[arg(long, default_value = "0.01")]
    fee: String,

    /// Execution time, `YYYY-MM-DDTHH:MM[:SS]`.
    #[arg(long, default_value = "2025-01-01T00:00:00")]
    at: String,

    /// Payment recipient. Defaults to Bob with the in-memory wallet.
    #[arg(long)]
    recipient: Option<String>,

    /// Amount in ether.
    #[arg(long, default_value = "1.5")]
    amount: String,

    /// Read `--at` in the host time zone instead of UTC.
    #[arg(long)]
    local_time: bool,
}

#[derive(Debug, Serialize)]
struct PaymentPreview {
    execute_at: u64,
    recipient: Address,
    amount_wei: String,
    fee_wei: String,
    total_wei: String,
    total_eth: String,
    payload: String,
}

fn deployment_config(
    cli: &Cli,
    defaults: Option<&DemoAccounts>,
) -> Result<DeploymentConfig, Box<dyn std::error::Error>> {
    if let Some(path) = &cli.deployment {
        let raw = std::fs::read_to_string(path)?;
        return Ok(serde_json::from_str(&raw)?);
    }
    let registry = cli
        .registry
        .or(defaults.map(|accounts| accounts.registry))
        .ok_or("--registry (or REGISTRY_ADDRESS) is required with --rpc-url")?;
    let sender = cli
        .sender
        .or(defaults.map(|accounts| accounts.sender))
        .ok_or("--sender (or SENDER_ADDRESS) is required with --rpc-url")?;
    Ok(DeploymentConfig::new(registry, sender)
        .with_accepted_network(cli.accepted_network)
        .with_protocol_fee(to_smallest_unit(&cli.fee)?))
}

async fn schedule<C, Tz>(
    manager: &ConnectionManager<C>,
    composer: &TransactionComposer<Tz>,
    intent: &PaymentIntent,
) -> Result<(), Box<dyn std::error::Error>>
where
    C: WalletConnector,
    Tz: TimeZone,
{
    let sender = manager.sender().ok_or("wallet session closed")?;
    let request = composer.compose(sender.address(), manager.config().protocol_fee, intent)?;
    let preview = PaymentPreview {
        execute_at: request.execute_at,
        recipient: request.recipient,
        amount_wei: request.amount.to_string(),
        fee_wei: request.fee.to_string(),
        total_wei: request.total_value.to_string(),
        total_eth: from_smallest_unit(request.total_value),
        payload: format!("0x{}", hex::encode(&request.payload)),
    };
    println!("{}", serde_json::to_string_pretty(&preview)?);

    let mut submission = composer.submit(manager, intent).await?;
    while let Some(event) = submission.next_event().await {
        match event {
            SubmissionEvent::Submitted { tx_hash } => info!(%tx_hash, "registry request submitted"),
            SubmissionEvent::Confirmed(receipt) => info!(
                tx_hash = %receipt.tx_hash,
                block = ?receipt.block_number,
                "registry request confirmed"
            ),
            SubmissionEvent::Error(err) => {
                warn!(reason = err.reason.as_str(), "registry request failed");
                return Err(err.into());
            }
        }
    }
    Ok(())
}

async fn run<C: WalletConnector>(
    connector: C,
    config: DeploymentConfig,
    intent: PaymentIntent,
    local_time: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut manager = ConnectionManager::new(connector, config);
    let mut session_events = manager.subscribe();

    let session_id = manager.connect().await?;
    let accounts = manager.accounts().await?;
    info!(
        session_id,
        chain_id = ?manager.chain_id(),
        accepted = manager.is_on_accepted_network(),
        accounts = accounts.len(),
        "wallet session ready"
    );
    manager.drain_provider_events().await;

    let outcome = if local_time {
        schedule(&manager, &TransactionComposer::with_timezone(Local), &intent).await
    } else {
        schedule(&manager, &TransactionComposer::new(), &intent).await
    };

    manager.disconnect();
    while let Ok(event) = session_events.try_recv() {
        debug!(?event, "session event");
    }
    outcome
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match &cli.rpc_url {
        Some(url) => {
            let config = deployment_config(&cli, None)?;
            let recipient = cli
                .recipient
                .clone()
                .ok_or("--recipient is required with --rpc-url")?;
            let intent = PaymentIntent::new(cli.at.clone(), recipient, cli.amount.clone());
            run(RpcConnector::new(url.clone()), config, intent, cli.local_time).await
        }
        None => {
            let scenario = DemoScenario::default();
            info!(
                alice = %scenario.accounts.alice,
                network_id = scenario.network_id,
                "using in-memory demo wallet"
            );
            let config = deployment_config(&cli, Some(&scenario.accounts))?;
            let recipient = cli
                .recipient
                .clone()
                .unwrap_or_else(|| scenario.accounts.bob.to_string());
            let intent = PaymentIntent::new(cli.at.clone(), recipient, cli.amount.clone());
            run(scenario.wallet.clone(), config, intent, cli.local_time).await?;
            info!(calls = scenario.wallet.sent_calls().len(), "demo wallet settled");
            Ok(())
        }
    }
}
