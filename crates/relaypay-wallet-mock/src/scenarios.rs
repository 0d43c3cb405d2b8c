use alloy_primitives::Address;
use relaypay_types::ChainId;

use crate::mock_wallet::MockWallet;

/// Network id of the reference deployment (Ropsten).
pub const DEMO_NETWORK_ID: ChainId = 3;

#[derive(Debug, Clone, Copy)]
pub struct DemoAccounts {
    pub alice: Address,
    pub bob: Address,
    pub registry: Address,
    pub sender: Address,
}

/// Alice's wallet connected to the reference network, with Bob as the
/// usual recipient and fixed registry/sender contract addresses.
#[derive(Debug, Clone)]
pub struct DemoScenario {
    pub accounts: DemoAccounts,
    pub network_id: ChainId,
    pub wallet: MockWallet,
}

impl DemoScenario {
    pub fn new(network_id: ChainId) -> Self {
        let accounts = DemoAccounts {
            alice: Address::repeat_byte(0x01),
            bob: Address::repeat_byte(0xaa),
            registry: Address::repeat_byte(0xe1),
            sender: Address::repeat_byte(0xe2),
        };
        let wallet = MockWallet::new(vec![accounts.alice], network_id);
        Self {
            accounts,
            network_id,
            wallet,
        }
    }
}

impl Default for DemoScenario {
    fn default() -> Self {
        Self::new(DEMO_NETWORK_ID)
    }
}
