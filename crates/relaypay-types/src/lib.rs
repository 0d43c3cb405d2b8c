//! Shared types for relaypay: ids, errors, unit math, lifecycle events, and
//! the wallet-provider boundary traits.

pub mod error;
pub mod events;
pub mod ids;
pub mod traits;
pub mod units;

pub use alloy_primitives::{Address, Bytes, TxHash, U256};
pub use error::{ProviderError, SubmissionError, ValidationError};
pub use events::{ProviderEvent, SessionEvent, Submission, SubmissionEvent, SubmissionReporter};
pub use ids::{CallRequest, ChainId, Receipt, SessionId};
pub use traits::{WalletConnector, WalletProvider};
pub use units::{from_smallest_unit, to_smallest_unit, total_value, BASE_UNIT_DECIMALS};
