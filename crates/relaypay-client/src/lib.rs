//! Relay payment client library.
//!
//! This crate exposes:
//! - wallet-session lifecycle (`ConnectionManager`, `Session`) with network validation,
//! - session-scoped contract handles (`ContractBinder`, `ContractBinding`),
//! - scheduled-payment composition and submission (`TransactionComposer`),
//! - a JSON-RPC wallet adapter for native targets (`RpcConnector`).

pub mod abi;
pub mod binder;
pub mod composer;
pub mod config;
pub mod connection;
pub mod network;
#[cfg(not(target_arch = "wasm32"))]
pub mod rpc;

pub use abi::{ContractInterface, IRegistry, ISender, Registry, Sender};
pub use binder::{BindingError, ContractBinder, ContractBinding, SendOptions};
pub use composer::{
    to_unix_seconds, ComposeError, PaymentIntent, ScheduledPaymentRequest, TransactionComposer,
};
pub use config::{DeploymentConfig, DEFAULT_PROTOCOL_FEE_WEI, ROPSTEN_NETWORK_ID};
pub use connection::{ConnectionError, ConnectionManager, ConnectionState, Session};
pub use network::{is_accepted, NetworkValidator};
#[cfg(not(target_arch = "wasm32"))]
pub use rpc::{RpcConnector, RpcWallet};
