//! Tagged lifecycle events for wallet providers, sessions, and submissions.

use alloy_primitives::TxHash;
use tokio::sync::mpsc;

use crate::{
    error::SubmissionError,
    ids::{ChainId, Receipt, SessionId},
};

/// Notifications pushed by a wallet provider to its subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    Connect,
    /// `reported` is the raw payload of the notification, e.g. `"0x3"`.
    ChainChanged { reported: String },
    Disconnect,
}

/// State transitions published by the connection manager to its observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Connected {
        session_id: SessionId,
        chain_id: Option<ChainId>,
        accepted: bool,
    },
    ChainChanged {
        session_id: SessionId,
        chain_id: Option<ChainId>,
        accepted: bool,
    },
    Disconnected { session_id: SessionId },
}

/// Lifecycle signals of one submitted call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionEvent {
    /// The call never became a live transaction, or failed before confirmation.
    Error(SubmissionError),
    /// Accepted by the network; hash known, not yet mined.
    Submitted { tx_hash: TxHash },
    /// Mined and observed with at least one confirmation.
    Confirmed(Receipt),
}

impl SubmissionEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error(_) | Self::Confirmed(_))
    }
}

/// Provider-side half of a submission. Terminal signals consume the reporter,
/// so at most one of them can be emitted.
#[derive(Debug)]
pub struct SubmissionReporter {
    events: mpsc::UnboundedSender<SubmissionEvent>,
}

impl SubmissionReporter {
    pub fn submitted(&self, tx_hash: TxHash) {
        // A closed channel means the caller stopped listening; the on-chain effect is unchanged.
        let _ = self.events.send(SubmissionEvent::Submitted { tx_hash });
    }

    pub fn confirmed(self, receipt: Receipt) {
        let _ = self.events.send(SubmissionEvent::Confirmed(receipt));
    }

    pub fn failed(self, reason: impl Into<String>) {
        let _ = self
            .events
            .send(SubmissionEvent::Error(SubmissionError::new(reason)));
    }
}

/// Caller-side handle of a submitted call.
///
/// Yields `Error`, or `Submitted` followed by `Confirmed` or `Error`. Nothing is
/// yielded after a terminal signal. Dropping the handle only stops local
/// listening.
#[derive(Debug)]
pub struct Submission {
    events: mpsc::UnboundedReceiver<SubmissionEvent>,
    tx_hash: Option<TxHash>,
    outcome: Option<Result<Receipt, SubmissionError>>,
}

impl Submission {
    pub fn channel() -> (SubmissionReporter, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            SubmissionReporter { events: tx },
            Self {
                events: rx,
                tx_hash: None,
                outcome: None,
            },
        )
    }

    pub fn tx_hash(&self) -> Option<TxHash> {
        self.tx_hash
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    /// Terminal result, once it has been read.
    pub fn outcome(&self) -> Option<&Result<Receipt, SubmissionError>> {
        self.outcome.as_ref()
    }

    pub async fn next_event(&mut self) -> Option<SubmissionEvent> {
        if self.outcome.is_some() {
            return None;
        }
        let event = self.events.recv().await.unwrap_or_else(|| {
            SubmissionEvent::Error(SubmissionError::new(
                "provider dropped the submission before it settled",
            ))
        });
        match &event {
            SubmissionEvent::Submitted { tx_hash } => self.tx_hash = Some(*tx_hash),
            SubmissionEvent::Error(err) => self.outcome = Some(Err(err.clone())),
            SubmissionEvent::Confirmed(receipt) => self.outcome = Some(Ok(*receipt)),
        }
        Some(event)
    }

    /// Waits for the terminal signal, or returns it if already read through
    /// [`Submission::next_event`]. There is no built-in timeout.
    pub async fn wait(mut self) -> Result<Receipt, SubmissionError> {
        loop {
            if let Some(outcome) = self.outcome.take() {
                return outcome;
            }
            self.next_event().await;
        }
    }
}
