//! ConnectionManager: wallet-session lifecycle and the single source of truth
//! for "is a usable, correctly-networked session active".

use std::fmt;
use std::rc::Rc;

use alloy_primitives::Address;
use relaypay_types::{
    ChainId, ProviderError, ProviderEvent, SessionEvent, SessionId, WalletConnector,
    WalletProvider,
};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::{
    abi::{ContractInterface, Registry, Sender},
    binder::{ContractBinder, ContractBinding, SessionCore},
    config::DeploymentConfig,
    network::NetworkValidator,
};

const SESSION_EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("wallet connection refused: {0}")]
    Refused(#[from] ProviderError),
}

/// One open wallet session: provider, current network, event subscription,
/// and the bindings derived from it.
pub struct Session<P> {
    core: Rc<SessionCore<P>>,
    chain_id: Option<ChainId>,
    accepted: bool,
    events: mpsc::UnboundedReceiver<ProviderEvent>,
    binder: ContractBinder<P>,
    registry: ContractBinding<Registry, P>,
    sender: ContractBinding<Sender, P>,
}

impl<P> fmt::Debug for Session<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.core.id)
            .field("chain_id", &self.chain_id)
            .field("accepted", &self.accepted)
            .field("bindings", &self.binder.len())
            .finish()
    }
}

impl<P: WalletProvider> Session<P> {
    pub fn id(&self) -> SessionId {
        self.core.id
    }

    pub fn chain_id(&self) -> Option<ChainId> {
        self.chain_id
    }

    pub fn is_on_accepted_network(&self) -> bool {
        self.accepted
    }

    pub fn registry(&self) -> ContractBinding<Registry, P> {
        self.registry.clone()
    }

    pub fn sender(&self) -> ContractBinding<Sender, P> {
        self.sender.clone()
    }

    pub fn bind<I: ContractInterface>(&mut self, address: Address) -> ContractBinding<I, P> {
        self.binder.bind(address)
    }

    pub async fn accounts(&self) -> Result<Vec<Address>, ProviderError> {
        self.core.provider.accounts().await
    }
}

/// Owns the wallet connector, the deployment configuration, and at most one
/// open [`Session`]. Observers receive every transition as a [`SessionEvent`].
pub struct ConnectionManager<C: WalletConnector> {
    connector: C,
    config: DeploymentConfig,
    validator: NetworkValidator,
    state: ConnectionState,
    session: Option<Session<C::Provider>>,
    next_session_id: SessionId,
    observers: broadcast::Sender<SessionEvent>,
}

impl<C: WalletConnector> ConnectionManager<C> {
    pub fn new(connector: C, config: DeploymentConfig) -> Self {
        let (observers, _) = broadcast::channel(SESSION_EVENT_CAPACITY);
        Self {
            connector,
            validator: config.network_validator(),
            config,
            state: ConnectionState::Disconnected,
            session: None,
            next_session_id: 1,
            observers,
        }
    }

    pub fn config(&self) -> &DeploymentConfig {
        &self.config
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn session(&self) -> Option<&Session<C::Provider>> {
        self.session.as_ref()
    }

    pub fn chain_id(&self) -> Option<ChainId> {
        self.session.as_ref().and_then(Session::chain_id)
    }

    pub fn is_on_accepted_network(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(Session::is_on_accepted_network)
    }

    pub fn registry(&self) -> Option<ContractBinding<Registry, C::Provider>> {
        self.session.as_ref().map(Session::registry)
    }

    pub fn sender(&self) -> Option<ContractBinding<Sender, C::Provider>> {
        self.session.as_ref().map(Session::sender)
    }

    /// Accounts exposed by the session's provider.
    pub async fn accounts(&self) -> Result<Vec<Address>, ProviderError> {
        match &self.session {
            Some(session) => session.accounts().await,
            None => Err(ProviderError::Unavailable(
                "no open wallet session".to_string(),
            )),
        }
    }

    /// Session-scoped binding for any interface; `None` while disconnected.
    pub fn bind<I: ContractInterface>(
        &mut self,
        address: Address,
    ) -> Option<ContractBinding<I, C::Provider>> {
        self.session.as_mut().map(|session| session.bind(address))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.observers.subscribe()
    }

    /// Opens a session. An already open session is torn down first and its
    /// bindings become stale. On refusal the manager stays disconnected with
    /// no partial state.
    pub async fn connect(&mut self) -> Result<SessionId, ConnectionError> {
        if self.session.is_some() {
            info!("replacing open wallet session");
            self.teardown();
        }

        // Dropped mid-await, the attempt falls back to Disconnected.
        let attempt = ConnectAttempt::begin(&mut self.state);
        let provider = match self.connector.request_provider().await {
            Ok(provider) => provider,
            Err(err) => {
                warn!(error = %err, "wallet connection refused");
                return Err(ConnectionError::Refused(err));
            }
        };

        let events = provider.subscribe();
        let session_id = self.next_session_id;
        self.next_session_id += 1;
        let core = Rc::new(SessionCore {
            id: session_id,
            provider,
        });

        let chain_id = query_network_id(&core.provider).await;
        let accepted = self.validator.is_accepted(chain_id);

        let mut binder = ContractBinder::new(&core);
        let registry = binder.bind::<Registry>(self.config.registry_address);
        let sender = binder.bind::<Sender>(self.config.sender_address);

        attempt.finish(ConnectionState::Connected);
        self.session = Some(Session {
            core,
            chain_id,
            accepted,
            events,
            binder,
            registry,
            sender,
        });
        info!(session_id, chain_id = ?chain_id, accepted, "wallet connected");
        if !accepted {
            warn!(
                chain_id = ?chain_id,
                accepted_network = self.validator.accepted_network(),
                "wallet is on a network that does not accept submissions"
            );
        }
        self.publish(SessionEvent::Connected {
            session_id,
            chain_id,
            accepted,
        });
        Ok(session_id)
    }

    /// Clears the cached credential and releases the session. Without an open
    /// session it only resets the state to `Disconnected`.
    pub fn disconnect(&mut self) {
        if self.session.is_none() {
            debug!("disconnect without an open session");
            self.state = ConnectionState::Disconnected;
            return;
        }
        self.connector.clear_cached_credential();
        self.teardown();
    }

    /// Waits for the next provider notification and applies it. Returns
    /// `None` immediately while disconnected.
    pub async fn next_provider_event(&mut self) -> Option<SessionEvent> {
        let event = self.session.as_mut()?.events.recv().await;
        match event {
            Some(event) => self.handle_provider_event(event).await,
            None => {
                warn!("provider closed its event stream");
                self.teardown()
            }
        }
    }

    /// Applies every provider notification already queued, without waiting.
    pub async fn drain_provider_events(&mut self) -> Vec<SessionEvent> {
        let mut applied = Vec::new();
        while let Some(session) = self.session.as_mut() {
            let next = match session.events.try_recv() {
                Ok(event) => self.handle_provider_event(event).await,
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    warn!("provider closed its event stream");
                    self.teardown()
                }
            };
            applied.extend(next);
        }
        applied
    }

    async fn handle_provider_event(&mut self, event: ProviderEvent) -> Option<SessionEvent> {
        match event {
            ProviderEvent::Connect => {
                debug!("provider reported connect");
                None
            }
            ProviderEvent::ChainChanged { reported } => {
                let validator = self.validator;
                let session = self.session.as_mut()?;
                // The payload may arrive before the provider is ready; ask it directly.
                let chain_id = query_network_id(&session.core.provider).await;
                session.chain_id = chain_id;
                session.accepted = validator.is_accepted(chain_id);
                let event = SessionEvent::ChainChanged {
                    session_id: session.core.id,
                    chain_id,
                    accepted: session.accepted,
                };
                info!(
                    reported = %reported,
                    chain_id = ?chain_id,
                    accepted = session.accepted,
                    "wallet network changed"
                );
                self.publish(event.clone());
                Some(event)
            }
            ProviderEvent::Disconnect => {
                info!("wallet ended the session");
                self.teardown()
            }
        }
    }

    /// Drops the session (provider, subscription, bindings) and publishes `Disconnected`.
    fn teardown(&mut self) -> Option<SessionEvent> {
        self.state = ConnectionState::Disconnected;
        let session = self.session.take()?;
        let session_id = session.id();
        drop(session);
        info!(session_id, "wallet session closed");
        let event = SessionEvent::Disconnected { session_id };
        self.publish(event.clone());
        Some(event)
    }

    fn publish(&self, event: SessionEvent) {
        // No observers is fine.
        let _ = self.observers.send(event);
    }
}

/// Holds the manager in `Connecting` until finished; dropping it unfinished
/// (refusal or a cancelled future) resets the state to `Disconnected`.
struct ConnectAttempt<'a> {
    state: &'a mut ConnectionState,
    finished: bool,
}

impl<'a> ConnectAttempt<'a> {
    fn begin(state: &'a mut ConnectionState) -> Self {
        *state = ConnectionState::Connecting;
        Self {
            state,
            finished: false,
        }
    }

    fn finish(mut self, state: ConnectionState) {
        *self.state = state;
        self.finished = true;
    }
}

impl Drop for ConnectAttempt<'_> {
    fn drop(&mut self) {
        if !self.finished {
            *self.state = ConnectionState::Disconnected;
        }
    }
}

async fn query_network_id<P: WalletProvider>(provider: &P) -> Option<ChainId> {
    match provider.network_id().await {
        Ok(chain_id) => Some(chain_id),
        Err(err) => {
            warn!(error = %err, "network id query failed");
            None
        }
    }
}
