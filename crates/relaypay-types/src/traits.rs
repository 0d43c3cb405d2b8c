//! Wallet-provider boundary consumed by the connection manager.
//!
//! Implementations may be in-memory mocks, a JSON-RPC node, or a bridge to an
//! external signer. Everything runs on a single cooperative thread, so the
//! futures are not required to be `Send`.

use alloy_primitives::Address;
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{
    error::ProviderError,
    events::{ProviderEvent, Submission},
    ids::{CallRequest, ChainId},
};

/// Handle to an approved wallet provider.
#[async_trait(?Send)]
pub trait WalletProvider {
    /// Accounts exposed by the wallet, signing account first.
    async fn accounts(&self) -> Result<Vec<Address>, ProviderError>;

    async fn network_id(&self) -> Result<ChainId, ProviderError>;

    /// Registers a listener for `connect`, `chainChanged`, and `disconnect`.
    /// Dropping the receiver unsubscribes.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<ProviderEvent>;

    /// Signs and broadcasts a call. Rejections are reported through the
    /// returned submission, never as an error here.
    fn send_transaction(&self, request: CallRequest) -> Submission;
}

/// Wallet-connection layer that negotiates access to a provider.
#[async_trait(?Send)]
pub trait WalletConnector {
    type Provider: WalletProvider;

    /// May suspend while the user approves the connection in the wallet UI.
    async fn request_provider(&self) -> Result<Self::Provider, ProviderError>;

    fn clear_cached_credential(&self);
}
