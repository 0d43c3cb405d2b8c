//! Scriptable in-memory wallet provider for tests and demos without a real wallet.

pub mod mock_wallet;
pub mod scenarios;

pub use mock_wallet::{ConnectionResponse, MockProvider, MockWallet, SubmissionOutcome};
pub use scenarios::{DemoAccounts, DemoScenario, DEMO_NETWORK_ID};
