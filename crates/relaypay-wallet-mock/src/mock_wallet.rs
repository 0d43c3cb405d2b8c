//! MockWallet: in-memory wallet connector with scripted approval, network
//! switching, provider notifications, and submission outcomes.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use alloy_primitives::{keccak256, Address};
use async_trait::async_trait;
use relaypay_types::{
    CallRequest, ChainId, ProviderError, ProviderEvent, Receipt, Submission, SubmissionReporter,
    WalletConnector, WalletProvider,
};
use tokio::sync::mpsc;

/// How the mock answers the next `request_provider` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionResponse {
    Approve,
    Reject,
    Unavailable,
}

/// How the mock settles each submitted call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Confirm,
    RejectBeforeMining(String),
    RevertAfterSubmit(String),
    /// Reports the hash and never settles.
    StayPending,
}

#[derive(Debug)]
struct WalletInner {
    response: ConnectionResponse,
    accounts: Vec<Address>,
    network_id: ChainId,
    fail_network_query: bool,
    outcome: SubmissionOutcome,
    sent: Vec<CallRequest>,
    listeners: Vec<mpsc::UnboundedSender<ProviderEvent>>,
    unsettled: Vec<SubmissionReporter>,
    provider_requests: usize,
    network_queries: usize,
    credential_clears: usize,
    block_number: u64,
}

/// Connector side of the mock. Clones share state, so a test can keep one
/// handle for scripting while the connection manager owns another.
#[derive(Debug, Clone)]
pub struct MockWallet {
    inner: Arc<Mutex<WalletInner>>,
}

/// Provider handle issued by [`MockWallet`] after an approved connection.
#[derive(Debug, Clone)]
pub struct MockProvider {
    inner: Arc<Mutex<WalletInner>>,
}

fn lock(inner: &Mutex<WalletInner>) -> MutexGuard<'_, WalletInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockWallet {
    pub fn new(accounts: Vec<Address>, network_id: ChainId) -> Self {
        Self {
            inner: Arc::new(Mutex::new(WalletInner {
                response: ConnectionResponse::Approve,
                accounts,
                network_id,
                fail_network_query: false,
                outcome: SubmissionOutcome::Confirm,
                sent: Vec::new(),
                listeners: Vec::new(),
                unsettled: Vec::new(),
                provider_requests: 0,
                network_queries: 0,
                credential_clears: 0,
                block_number: 1,
            })),
        }
    }

    pub fn set_connection_response(&self, response: ConnectionResponse) {
        lock(&self.inner).response = response;
    }

    pub fn set_accounts(&self, accounts: Vec<Address>) {
        lock(&self.inner).accounts = accounts;
    }

    /// Changes the network silently, without notifying listeners.
    pub fn set_network_id(&self, network_id: ChainId) {
        lock(&self.inner).network_id = network_id;
    }

    pub fn fail_network_query(&self, fail: bool) {
        lock(&self.inner).fail_network_query = fail;
    }

    pub fn set_submission_outcome(&self, outcome: SubmissionOutcome) {
        lock(&self.inner).outcome = outcome;
    }

    /// Switches network and emits `chainChanged` with the hex id as payload.
    pub fn switch_network(&self, network_id: ChainId) {
        self.set_network_id(network_id);
        self.emit(ProviderEvent::ChainChanged {
            reported: format!("{network_id:#x}"),
        });
    }

    /// Simulates the wallet ending the session on its side.
    pub fn drop_connection(&self) {
        self.emit(ProviderEvent::Disconnect);
    }

    pub fn emit(&self, event: ProviderEvent) {
        let mut inner = lock(&self.inner);
        inner.listeners.retain(|listener| !listener.is_closed());
        for listener in &inner.listeners {
            let _ = listener.send(event.clone());
        }
    }

    pub fn sent_calls(&self) -> Vec<CallRequest> {
        lock(&self.inner).sent.clone()
    }

    pub fn active_subscriptions(&self) -> usize {
        lock(&self.inner)
            .listeners
            .iter()
            .filter(|listener| !listener.is_closed())
            .count()
    }

    pub fn provider_requests(&self) -> usize {
        lock(&self.inner).provider_requests
    }

    pub fn network_queries(&self) -> usize {
        lock(&self.inner).network_queries
    }

    pub fn credential_clears(&self) -> usize {
        lock(&self.inner).credential_clears
    }
}

#[async_trait(?Send)]
impl WalletConnector for MockWallet {
    type Provider = MockProvider;

    async fn request_provider(&self) -> Result<MockProvider, ProviderError> {
        let mut inner = lock(&self.inner);
        inner.provider_requests += 1;
        match inner.response {
            ConnectionResponse::Approve => Ok(MockProvider {
                inner: Arc::clone(&self.inner),
            }),
            ConnectionResponse::Reject => Err(ProviderError::Rejected(
                "user rejected the connection request".to_string(),
            )),
            ConnectionResponse::Unavailable => Err(ProviderError::Unavailable(
                "no wallet provider found".to_string(),
            )),
        }
    }

    fn clear_cached_credential(&self) {
        lock(&self.inner).credential_clears += 1;
    }
}

#[async_trait(?Send)]
impl WalletProvider for MockProvider {
    async fn accounts(&self) -> Result<Vec<Address>, ProviderError> {
        Ok(lock(&self.inner).accounts.clone())
    }

    async fn network_id(&self) -> Result<ChainId, ProviderError> {
        let mut inner = lock(&self.inner);
        inner.network_queries += 1;
        if inner.fail_network_query {
            return Err(ProviderError::Unavailable(
                "network id not available yet".to_string(),
            ));
        }
        Ok(inner.network_id)
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<ProviderEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.inner).listeners.push(tx);
        rx
    }

    fn send_transaction(&self, request: CallRequest) -> Submission {
        let mut inner = lock(&self.inner);
        let nonce = inner.sent.len() as u64;
        let mut preimage = request.from.to_vec();
        preimage.extend_from_slice(&nonce.to_be_bytes());
        let tx_hash = keccak256(preimage);
        inner.sent.push(request);

        let (reporter, submission) = Submission::channel();
        match inner.outcome.clone() {
            SubmissionOutcome::Confirm => {
                inner.block_number += 1;
                reporter.submitted(tx_hash);
                reporter.confirmed(Receipt {
                    tx_hash,
                    block_number: Some(inner.block_number),
                });
            }
            SubmissionOutcome::RejectBeforeMining(reason) => reporter.failed(reason),
            SubmissionOutcome::RevertAfterSubmit(reason) => {
                reporter.submitted(tx_hash);
                reporter.failed(reason);
            }
            SubmissionOutcome::StayPending => {
                reporter.submitted(tx_hash);
                inner.unsettled.push(reporter);
            }
        }
        submission
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{Address, Bytes, U256};
    use relaypay_types::{
        CallRequest, ProviderError, ProviderEvent, SubmissionEvent, WalletConnector,
        WalletProvider,
    };

    use super::{ConnectionResponse, MockWallet, SubmissionOutcome};

    fn call(from: Address) -> CallRequest {
        CallRequest {
            from,
            to: Address::repeat_byte(0x22),
            value: U256::from(1),
            input: Bytes::new(),
        }
    }

    #[tokio::test]
    async fn rejects_connection_when_scripted() {
        let wallet = MockWallet::new(vec![Address::repeat_byte(0x01)], 3);
        wallet.set_connection_response(ConnectionResponse::Reject);
        let err = wallet.request_provider().await.unwrap_err();
        assert!(matches!(err, ProviderError::Rejected(_)));
        assert_eq!(wallet.provider_requests(), 1);
    }

    #[tokio::test]
    async fn switch_network_notifies_live_listeners_only() {
        let wallet = MockWallet::new(vec![Address::repeat_byte(0x01)], 3);
        let provider = wallet.request_provider().await.unwrap();
        let mut live = provider.subscribe();
        let dropped = provider.subscribe();
        drop(dropped);
        assert_eq!(wallet.active_subscriptions(), 1);

        wallet.switch_network(1);
        assert_eq!(
            live.recv().await,
            Some(ProviderEvent::ChainChanged {
                reported: "0x1".to_string()
            })
        );
        assert_eq!(provider.network_id().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn records_calls_and_scripts_outcomes() {
        let from = Address::repeat_byte(0x01);
        let wallet = MockWallet::new(vec![from], 3);
        let provider = wallet.request_provider().await.unwrap();

        let receipt = provider.send_transaction(call(from)).wait().await.unwrap();
        assert_eq!(receipt.block_number, Some(2));

        wallet.set_submission_outcome(SubmissionOutcome::RevertAfterSubmit("reverted".into()));
        let mut submission = provider.send_transaction(call(from));
        assert!(matches!(
            submission.next_event().await,
            Some(SubmissionEvent::Submitted { .. })
        ));
        assert!(matches!(
            submission.next_event().await,
            Some(SubmissionEvent::Error(_))
        ));
        assert_eq!(wallet.sent_calls().len(), 2);
    }
}
