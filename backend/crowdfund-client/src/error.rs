//! Donation failure taxonomy.
//!
//! Every failure a donation can hit is a [`DonationError`]. The orchestrator
//! turns it into a `Failed` attempt using [`DonationError::kind`] and
//! [`DonationError::user_message`]; nothing propagates past that boundary.

use thiserror::Error;

use crate::{envelope::EnvelopeError, ledger::LedgerError, wallet::WalletError};

/// Classification shown alongside a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    WalletUnavailable,
    UserCancelled,
    PreconditionFailed,
    SimulationRejected,
    SubmissionRejected,
    OnChainFailure,
    /// No terminal status within the polling bound. The transaction's fate is
    /// unknown, which is not the same as rejected.
    ConfirmationTimeout,
    Network,
}

/// Checks that run before any network call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PreconditionFailure {
    #[error("Set CONTRACT_ID before donating.")]
    MissingContractId,

    #[error("Set OWNER_ADDRESS before donating.")]
    MissingRecipient,

    #[error("Connect a wallet before donating.")]
    NotConnected,

    #[error("Enter a valid donation amount.")]
    InvalidAmount,

    #[error("Insufficient balance for this donation amount.")]
    InsufficientBalance,
}

#[derive(Debug, Error)]
pub enum DonationError {
    #[error(transparent)]
    Precondition(#[from] PreconditionFailure),

    /// A previous attempt has not reached a terminal state.
    #[error("a donation is already in progress")]
    AttemptInFlight,

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error("simulation failed: {0}")]
    SimulationRejected(String),

    #[error("transaction rejected: {status}")]
    SubmissionRejected {
        status: String,
        detail: Option<String>,
    },

    #[error("payment submission returned no transaction hash")]
    MissingHash,

    #[error("transaction {hash} failed on-chain")]
    OnChainFailure { hash: String },

    #[error("no final status for {hash} after {attempts} checks")]
    ConfirmationTimeout { hash: String, attempts: u32 },

    /// A ledger call outlived the request deadline.
    #[error("{call} did not answer in time")]
    Unresponsive { call: &'static str },

    #[error(transparent)]
    Ledger(LedgerError),

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    /// Phase A landed but Phase B did not. Funds moved; the contract has no
    /// record of them.
    #[error("payment {payment_hash} succeeded but recording failed: {source}")]
    RecordingFailed {
        payment_hash: String,
        #[source]
        source: Box<DonationError>,
    },
}

impl From<LedgerError> for DonationError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Rejected { code, result_xdr } => Self::SubmissionRejected {
                status: code,
                detail: result_xdr,
            },
            other => Self::Ledger(other),
        }
    }
}

impl DonationError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Precondition(_) | Self::AttemptInFlight | Self::Envelope(_) => {
                FailureKind::PreconditionFailed
            }
            Self::Wallet(WalletError::Unavailable(_) | WalletError::TimedOut(_)) => {
                FailureKind::WalletUnavailable
            }
            Self::Wallet(WalletError::Cancelled | WalletError::SigningRejected(_)) => {
                FailureKind::UserCancelled
            }
            Self::SimulationRejected(_) => FailureKind::SimulationRejected,
            Self::SubmissionRejected { .. } | Self::MissingHash => FailureKind::SubmissionRejected,
            Self::OnChainFailure { .. } => FailureKind::OnChainFailure,
            Self::ConfirmationTimeout { .. } => FailureKind::ConfirmationTimeout,
            Self::Ledger(_) | Self::Unresponsive { .. } => FailureKind::Network,
            Self::RecordingFailed { source, .. } => source.kind(),
        }
    }

    /// Message for the person donating.
    pub fn user_message(&self) -> String {
        match self {
            Self::Precondition(failure) => failure.to_string(),
            Self::AttemptInFlight => "A donation is already in progress.".into(),
            Self::Wallet(WalletError::Unavailable(_)) => {
                "Wallet not found. Connect a supported wallet first.".into()
            }
            Self::Wallet(WalletError::TimedOut(_)) => {
                "The wallet did not respond. Try the donation again.".into()
            }
            Self::Wallet(_) => "Transaction signing was rejected.".into(),
            Self::SimulationRejected(detail) => format!("Simulation failed: {detail}"),
            Self::SubmissionRejected { status, detail } => match detail {
                Some(xdr) => format!("Transaction rejected: {status}. Error XDR: {xdr}"),
                None => format!("Transaction rejected: {status}."),
            },
            Self::MissingHash => "Payment failed: no transaction hash returned.".into(),
            Self::OnChainFailure { .. } => "Transaction failed on-chain.".into(),
            Self::ConfirmationTimeout { .. } => {
                "Transaction timed out while waiting for final status.".into()
            }
            Self::Ledger(e) => format!("Donation failed. {e}"),
            Self::Unresponsive { .. } => {
                "Donation failed. The network did not respond in time.".into()
            }
            Self::Envelope(e) => format!("Donation failed. {e}"),
            Self::RecordingFailed {
                payment_hash,
                source,
            } => match source.as_ref() {
                Self::ConfirmationTimeout { .. } => format!(
                    "Payment {payment_hash} was sent, but the donation record is unconfirmed. {}",
                    source.user_message()
                ),
                _ => format!(
                    "Payment {payment_hash} was sent, but recording the donation failed. {}",
                    source.user_message()
                ),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn rejected_submission_is_not_a_network_error() {
        let error = DonationError::from(LedgerError::Rejected {
            code: "tx_bad_seq".into(),
            result_xdr: Some("AAAA".into()),
        });
        assert_eq!(error.kind(), FailureKind::SubmissionRejected);
        assert_eq!(
            error.user_message(),
            "Transaction rejected: tx_bad_seq. Error XDR: AAAA"
        );

        let error = DonationError::from(LedgerError::Malformed("no result".into()));
        assert_eq!(error.kind(), FailureKind::Network);
    }

    #[test]
    fn wallet_errors_classify_by_variant() {
        let unavailable = DonationError::from(WalletError::Unavailable("gone".into()));
        assert_eq!(unavailable.kind(), FailureKind::WalletUnavailable);
        assert_eq!(
            unavailable.user_message(),
            "Wallet not found. Connect a supported wallet first."
        );

        let rejected = DonationError::from(WalletError::SigningRejected("no".into()));
        assert_eq!(rejected.kind(), FailureKind::UserCancelled);
        assert_eq!(rejected.user_message(), "Transaction signing was rejected.");

        let silent = DonationError::from(WalletError::TimedOut(Duration::from_secs(120)));
        assert_eq!(silent.kind(), FailureKind::WalletUnavailable);
        assert!(silent.user_message().contains("did not respond"));
    }

    #[test]
    fn timeout_is_distinct_from_rejection() {
        let error = DonationError::ConfirmationTimeout {
            hash: "abc".into(),
            attempts: 20,
        };
        assert_eq!(error.kind(), FailureKind::ConfirmationTimeout);
        assert_eq!(
            error.user_message(),
            "Transaction timed out while waiting for final status."
        );
    }

    #[test]
    fn recording_failure_keeps_inner_kind_and_mentions_payment() {
        let error = DonationError::RecordingFailed {
            payment_hash: "pay123".into(),
            source: Box::new(DonationError::SimulationRejected("Error(Contract, #2)".into())),
        };
        assert_eq!(error.kind(), FailureKind::SimulationRejected);
        let message = error.user_message();
        assert!(message.contains("pay123"));
        assert!(message.contains("recording the donation failed"));
        assert!(message.contains("Simulation failed: Error(Contract, #2)"));
    }

    #[test]
    fn unconfirmed_recording_is_not_reported_as_failed() {
        let error = DonationError::RecordingFailed {
            payment_hash: "pay123".into(),
            source: Box::new(DonationError::ConfirmationTimeout {
                hash: "rec456".into(),
                attempts: 20,
            }),
        };
        assert_eq!(error.kind(), FailureKind::ConfirmationTimeout);
        assert!(error.user_message().contains("timed out"));
        assert!(!error.user_message().contains("recording the donation failed"));
    }

    #[test]
    fn preconditions_carry_their_own_message() {
        let error = DonationError::from(PreconditionFailure::MissingRecipient);
        assert_eq!(error.kind(), FailureKind::PreconditionFailed);
        assert_eq!(error.user_message(), "Set OWNER_ADDRESS before donating.");
    }
}
