//! Error types for input validation, the wallet provider boundary, and submissions.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid amount `{input}`: {reason}")]
    InvalidAmount { input: String, reason: &'static str },
    #[error("invalid date-time `{input}`: {reason}")]
    InvalidDateTime { input: String, reason: &'static str },
    #[error("invalid address `{0}`")]
    InvalidAddress(String),
    #[error("invalid field `{0}`")]
    InvalidField(&'static str),
}

/// Failures reported by the wallet provider or the wallet-connection layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("request rejected by wallet: {0}")]
    Rejected(String),
    #[error("wallet provider unavailable: {0}")]
    Unavailable(String),
    #[error("internal provider error: {0}")]
    Internal(String),
}

/// Terminal failure of a submitted call, reported verbatim from the provider.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("submission failed: {reason}")]
pub struct SubmissionError {
    pub reason: String,
}

impl SubmissionError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}
