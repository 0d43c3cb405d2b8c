use alloy_primitives::{Address, Bytes, TxHash, U256};
use serde::{Deserialize, Serialize};

pub type ChainId = u64;

/// Monotonic identifier assigned to each wallet session opened by a manager.
pub type SessionId = u64;

/// A state-changing call handed to the wallet provider for signing and broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRequest {
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub input: Bytes,
}

/// Minimal receipt surfaced once a submitted call has been mined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
}
