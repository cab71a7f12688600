//! Typed boundaries to the remote ledger.
//!
//! The donation core never talks HTTP directly. It sees two capabilities:
//!
//! - [`LedgerRpc`]: contract-aware RPC (simulate, send, poll status, events).
//! - [`AccountLedger`]: account state and classic transaction submission.
//!
//! [`SorobanRpc`] and [`HorizonClient`] are the network implementations.

mod horizon;
mod rpc;

pub use horizon::HorizonClient;
pub use rpc::{SorobanRpc, EVENT_LOOKBACK_LEDGERS};

use std::time::Duration;

use async_trait::async_trait;
use stellar_xdr::curr::{ScVal, SorobanAuthorizationEntry, SorobanTransactionData, TransactionEnvelope};
use thiserror::Error;

use crate::{amount, envelope::EnvelopeError};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("request failed with status {status}: {detail}")]
    Status { status: u16, detail: String },

    /// The ledger refused a submitted transaction.
    #[error("transaction rejected: {code}")]
    Rejected {
        code: String,
        result_xdr: Option<String>,
    },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
}

// ─────────────────────────────────────────────────────────
// Shapes
// ─────────────────────────────────────────────────────────

/// Result of dry-running a contract invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Simulation {
    /// Set when the invocation would fail.
    pub error: Option<String>,
    pub transaction_data: Option<SorobanTransactionData>,
    pub min_resource_fee: u64,
    pub auth: Vec<SorobanAuthorizationEntry>,
    /// Return value of the invoked function.
    pub retval: Option<ScVal>,
}

/// Status reported by `sendTransaction`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendStatus {
    Pending,
    Duplicate,
    TryAgainLater,
    Error,
    Other(String),
}

impl SendStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "PENDING" => Self::Pending,
            "DUPLICATE" => Self::Duplicate,
            "TRY_AGAIN_LATER" => Self::TryAgainLater,
            "ERROR" => Self::Error,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "PENDING",
            Self::Duplicate => "DUPLICATE",
            Self::TryAgainLater => "TRY_AGAIN_LATER",
            Self::Error => "ERROR",
            Self::Other(raw) => raw,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOutcome {
    pub hash: Option<String>,
    pub status: SendStatus,
    pub error_result_xdr: Option<String>,
}

/// Status reported by `getTransaction`. Only `Success` and `Failed` are
/// terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStatus {
    Success,
    Failed,
    NotFound,
    Other(String),
}

impl TxStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "SUCCESS" => Self::Success,
            "FAILED" => Self::Failed,
            "NOT_FOUND" => Self::NotFound,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractEvent {
    pub id: String,
    pub ledger: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Balance {
    pub asset_type: String,
    /// Decimal string as reported by Horizon, e.g. `"100.0000000"`.
    pub balance: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    pub sequence: i64,
    pub balances: Vec<Balance>,
}

impl AccountInfo {
    /// Native balance in stroops, 0 if the account holds none.
    pub fn native_balance(&self) -> i128 {
        self.balances
            .iter()
            .find(|b| b.asset_type == "native")
            .map(|b| amount::to_minor_units(&b.balance))
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub hash: Option<String>,
}

/// HTTP client for the adapters. Each request, connect included, is cut off
/// after `timeout`.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, LedgerError> {
    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .build()?)
}

// ─────────────────────────────────────────────────────────
// Capabilities
// ─────────────────────────────────────────────────────────

#[async_trait]
pub trait LedgerRpc: Send + Sync {
    async fn simulate_transaction(
        &self,
        envelope: &TransactionEnvelope,
    ) -> Result<Simulation, LedgerError>;

    async fn send_transaction(
        &self,
        envelope: &TransactionEnvelope,
    ) -> Result<SendOutcome, LedgerError>;

    async fn get_transaction(&self, hash: &str) -> Result<TxStatus, LedgerError>;

    /// The newest events emitted by `contract_id`, at most `limit`, oldest
    /// first. An adapter may resume where its previous call ended and return
    /// only events newer than that.
    async fn get_events(
        &self,
        contract_id: &str,
        limit: u32,
    ) -> Result<Vec<ContractEvent>, LedgerError>;
}

#[async_trait]
pub trait AccountLedger: Send + Sync {
    async fn load_account(&self, address: &str) -> Result<AccountInfo, LedgerError>;

    async fn submit_transaction(
        &self,
        envelope: &TransactionEnvelope,
    ) -> Result<SubmitOutcome, LedgerError>;
}
