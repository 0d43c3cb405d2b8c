//! JSON-RPC wallet: the provider boundary over an Ethereum node that signs for
//! its unlocked accounts (`eth_accounts`, `net_version`, `eth_sendTransaction`).
//!
//! A plain node never switches networks, so no `ChainChanged` is emitted.

use std::cell::RefCell;

use alloy_primitives::Address;
use alloy_provider::{network::ReceiptResponse, DynProvider, Provider, ProviderBuilder};
use alloy_rpc_types_eth::TransactionRequest;
use async_trait::async_trait;
use relaypay_types::{
    CallRequest, ChainId, ProviderError, ProviderEvent, Receipt, Submission, WalletConnector,
    WalletProvider,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Connects to a node by URL (`http(s)://`, `ws(s)://`).
#[derive(Debug, Clone)]
pub struct RpcConnector {
    url: String,
}

impl RpcConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait(?Send)]
impl WalletConnector for RpcConnector {
    type Provider = RpcWallet;

    async fn request_provider(&self) -> Result<RpcWallet, ProviderError> {
        info!(url = self.url.as_str(), "connecting to JSON-RPC node");
        let provider = ProviderBuilder::new()
            .connect(&self.url)
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;
        Ok(RpcWallet {
            provider: provider.erased(),
            listeners: RefCell::new(Vec::new()),
        })
    }

    fn clear_cached_credential(&self) {
        // Node-held keys; nothing cached locally.
        debug!("no cached credential for JSON-RPC wallet");
    }
}

pub struct RpcWallet {
    provider: DynProvider,
    // Held so subscriptions stay open for the life of the session.
    listeners: RefCell<Vec<mpsc::UnboundedSender<ProviderEvent>>>,
}

#[async_trait(?Send)]
impl WalletProvider for RpcWallet {
    async fn accounts(&self) -> Result<Vec<Address>, ProviderError> {
        self.provider
            .get_accounts()
            .await
            .map_err(|e| ProviderError::Internal(e.to_string()))
    }

    async fn network_id(&self) -> Result<ChainId, ProviderError> {
        self.provider
            .get_net_version()
            .await
            .map_err(|e| ProviderError::Internal(e.to_string()))
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<ProviderEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(ProviderEvent::Connect);
        let mut listeners = self.listeners.borrow_mut();
        listeners.retain(|listener| !listener.is_closed());
        listeners.push(tx);
        rx
    }

    fn send_transaction(&self, request: CallRequest) -> Submission {
        let (reporter, submission) = Submission::channel();
        let provider = self.provider.clone();
        let tx = TransactionRequest::default()
            .from(request.from)
            .to(request.to)
            .value(request.value)
            .input(request.input.into());

        tokio::spawn(async move {
            let pending = match provider.send_transaction(tx).await {
                Ok(pending) => pending,
                Err(e) => {
                    warn!(error = %e, "eth_sendTransaction rejected");
                    reporter.failed(e.to_string());
                    return;
                }
            };
            let tx_hash = *pending.tx_hash();
            info!(tx_hash = %tx_hash, "transaction submitted");
            reporter.submitted(tx_hash);

            match pending.get_receipt().await {
                Ok(receipt) if receipt.status() => {
                    info!(tx_hash = %tx_hash, block = ?receipt.block_number(), "transaction confirmed");
                    reporter.confirmed(Receipt {
                        tx_hash,
                        block_number: receipt.block_number(),
                    });
                }
                Ok(_) => {
                    warn!(tx_hash = %tx_hash, "transaction reverted");
                    reporter.failed(format!("transaction {tx_hash} reverted"));
                }
                Err(e) => {
                    warn!(tx_hash = %tx_hash, error = %e, "receipt unavailable");
                    reporter.failed(e.to_string());
                }
            }
        });
        submission
    }
}
