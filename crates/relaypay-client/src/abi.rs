//! Contract interfaces for the relay registry and the ETH sender.

use alloy_sol_types::{sol, SolInterface};

sol! {
    /// Scheduling registry: stores a delayed-call request and relays it later.
    #[derive(Debug, PartialEq, Eq)]
    #[sol(extra_methods)]
    interface IRegistry {
        function newReq(
            address target,
            address referer,
            bytes callData,
            uint112 ethForCall,
            bool verifyUser,
            bool insertFeeAmount
        ) external payable returns (uint256 id);
    }

    /// Sender contract invoked by the registry when the request is executed.
    #[derive(Debug, PartialEq, Eq)]
    #[sol(extra_methods)]
    interface ISender {
        function sendEthAtTime(uint256 callTime, address recipient) external payable;
    }
}

/// Static description of a contract interface: its name and the closed set of
/// calls a binding for it accepts.
pub trait ContractInterface: 'static {
    const NAME: &'static str;

    type Calls: SolInterface;
}

#[derive(Debug)]
pub enum Registry {}

impl ContractInterface for Registry {
    const NAME: &'static str = "Registry";

    type Calls = IRegistry::IRegistryCalls;
}

#[derive(Debug)]
pub enum Sender {}

impl ContractInterface for Sender {
    const NAME: &'static str = "Sender";

    type Calls = ISender::ISenderCalls;
}
