//! Deployment configuration: contract addresses, accepted network, protocol fee.
//!
//! Built once at startup and handed to the connection manager.

use alloy_primitives::{Address, U256};
use relaypay_types::ChainId;
use serde::{Deserialize, Serialize};

use crate::network::NetworkValidator;

/// Network id of the reference deployment (Ropsten).
pub const ROPSTEN_NETWORK_ID: ChainId = 3;

/// Flat registry fee in wei (0.01 ether).
pub const DEFAULT_PROTOCOL_FEE_WEI: u64 = 10_000_000_000_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    pub registry_address: Address,
    pub sender_address: Address,
    #[serde(default = "default_accepted_network")]
    pub accepted_network: ChainId,
    #[serde(default = "default_protocol_fee")]
    pub protocol_fee: U256,
}

fn default_accepted_network() -> ChainId {
    ROPSTEN_NETWORK_ID
}

fn default_protocol_fee() -> U256 {
    U256::from(DEFAULT_PROTOCOL_FEE_WEI)
}

impl DeploymentConfig {
    pub fn new(registry_address: Address, sender_address: Address) -> Self {
        Self {
            registry_address,
            sender_address,
            accepted_network: default_accepted_network(),
            protocol_fee: default_protocol_fee(),
        }
    }

    pub fn with_accepted_network(mut self, accepted_network: ChainId) -> Self {
        self.accepted_network = accepted_network;
        self
    }

    // TODO: read the fee from the registry contract once it exposes a getter.
    pub fn with_protocol_fee(mut self, protocol_fee: U256) -> Self {
        self.protocol_fee = protocol_fee;
        self
    }

    pub fn network_validator(&self) -> NetworkValidator {
        NetworkValidator::new(self.accepted_network)
    }
}
