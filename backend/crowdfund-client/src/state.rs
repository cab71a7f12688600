//! Named state cells shared between the orchestrator, the synchronizer and
//! the presentation facade.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::{error::FailureKind, ledger::AccountLedger};

/// Campaign summary as last read from the contract. Replaced wholesale on
/// every successful read and never adjusted locally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CampaignAggregate {
    pub goal: i128,
    pub raised: i128,
    pub donors: u32,
}

impl CampaignAggregate {
    /// Whole-number progress towards the goal, capped at 100.
    pub fn progress_percent(&self) -> u8 {
        if self.goal <= 0 || self.raised <= 0 {
            return 0;
        }
        let percent = match self.raised.checked_mul(100) {
            Some(scaled) => scaled / self.goal,
            None => self.raised / (self.goal / 100).max(1),
        };
        percent.min(100) as u8
    }

    pub fn goal_reached(&self) -> bool {
        self.goal > 0 && self.raised >= self.goal
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptStatus {
    Idle,
    Pending,
    Success,
    Failed,
}

/// State of the most recent donation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TransactionAttempt {
    #[default]
    Idle,
    Pending {
        message: String,
        tx_hash: Option<String>,
    },
    Success {
        message: String,
        tx_hash: String,
    },
    Failed {
        kind: FailureKind,
        message: String,
        tx_hash: Option<String>,
    },
}

impl TransactionAttempt {
    pub fn status(&self) -> AttemptStatus {
        match self {
            Self::Idle => AttemptStatus::Idle,
            Self::Pending { .. } => AttemptStatus::Pending,
            Self::Success { .. } => AttemptStatus::Success,
            Self::Failed { .. } => AttemptStatus::Failed,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Idle => "",
            Self::Pending { message, .. }
            | Self::Success { message, .. }
            | Self::Failed { message, .. } => message,
        }
    }

    pub fn tx_hash(&self) -> Option<&str> {
        match self {
            Self::Idle => None,
            Self::Success { tx_hash, .. } => Some(tx_hash),
            Self::Pending { tx_hash, .. } | Self::Failed { tx_hash, .. } => tx_hash.as_deref(),
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Failed { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Cached native balance of the connected account, in stroops.
pub struct NativeBalance {
    accounts: Arc<dyn AccountLedger>,
    stroops: RwLock<i128>,
}

impl NativeBalance {
    pub fn new(accounts: Arc<dyn AccountLedger>) -> Self {
        Self {
            accounts,
            stroops: RwLock::new(0),
        }
    }

    /// Reload from the ledger. Any failure resets the cache to 0.
    pub async fn reload(&self, address: &str) -> i128 {
        let balance = match self.accounts.load_account(address).await {
            Ok(account) => account.native_balance(),
            Err(e) => {
                warn!(%address, error = %e, "failed to load balance");
                0
            }
        };
        debug!(%address, balance, "native balance");
        *self.stroops.write().await = balance;
        balance
    }

    pub async fn reset(&self) {
        *self.stroops.write().await = 0;
    }

    pub async fn get(&self) -> i128 {
        *self.stroops.read().await
    }
}
