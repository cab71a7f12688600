//! Presentation facade: one object holding the session, the synchronizer and
//! the orchestrator, exposing what a front end renders and the three things a
//! user can do.

use std::{fmt, sync::Arc};

use tokio::sync::{watch, RwLock};
use tracing::info;

use crate::{
    amount,
    config::ClientConfig,
    error::DonationError,
    ledger::{AccountLedger, HorizonClient, LedgerError, LedgerRpc, SorobanRpc},
    orchestrator::DonationOrchestrator,
    state::{CampaignAggregate, NativeBalance, TransactionAttempt},
    sync::{CampaignSync, SyncHandle},
    wallet::{ConnectOutcome, Session, WalletError, WalletProvider, WalletSession},
};

const CONNECT_CANCELLED: &str = "Wallet connection was rejected or cancelled.";
const WALLET_MISSING: &str = "Wallet not found. Install or enable a supported Stellar wallet.";

/// Everything a front end needs to draw one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub aggregate: CampaignAggregate,
    pub progress_percent: u8,
    pub goal: String,
    pub raised: String,
    pub address: Option<String>,
    pub short_address: Option<String>,
    /// Native balance in stroops; 0 while disconnected.
    pub balance: i128,
    pub attempt: TransactionAttempt,
    /// Connection-level notice, e.g. a cancelled wallet selection.
    pub notice: Option<String>,
}

impl Snapshot {
    pub fn is_connected(&self) -> bool {
        self.address.is_some()
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "raised {} / {} XLM ({}%), {} donors",
            self.raised, self.goal, self.progress_percent, self.aggregate.donors
        )?;
        match &self.short_address {
            Some(address) => writeln!(
                f,
                "wallet {address}, balance {} XLM",
                amount::to_decimal_display(self.balance)
            )?,
            None => writeln!(f, "wallet not connected")?,
        }
        if let Some(notice) = &self.notice {
            writeln!(f, "{notice}")?;
        }
        if self.attempt != TransactionAttempt::Idle {
            write!(f, "donation {:?}: {}", self.attempt.status(), self.attempt.message())?;
            if let Some(hash) = self.attempt.tx_hash() {
                write!(f, " ({hash})")?;
            }
        }
        Ok(())
    }
}

pub struct DonationClient {
    session: Arc<WalletSession>,
    balance: Arc<NativeBalance>,
    sync: Arc<CampaignSync>,
    orchestrator: DonationOrchestrator,
    notice: RwLock<Option<String>>,
}

impl DonationClient {
    pub fn new(
        config: ClientConfig,
        rpc: Arc<dyn LedgerRpc>,
        accounts: Arc<dyn AccountLedger>,
        wallet: Arc<dyn WalletProvider>,
    ) -> Self {
        let config = Arc::new(config);
        let session = Arc::new(WalletSession::new(wallet).with_sign_timeout(config.wallet_timeout));
        let balance = Arc::new(NativeBalance::new(Arc::clone(&accounts)));
        let sync = Arc::new(CampaignSync::new(
            Arc::clone(&config),
            Arc::clone(&rpc),
            Arc::clone(&accounts),
            Arc::clone(&session),
        ));
        let orchestrator = DonationOrchestrator::new(
            config,
            rpc,
            accounts,
            Arc::clone(&session),
            Arc::clone(&balance),
            Arc::clone(&sync),
        );

        Self {
            session,
            balance,
            sync,
            orchestrator,
            notice: RwLock::new(None),
        }
    }

    /// Client talking to the configured Soroban RPC and Horizon endpoints.
    pub fn with_network(
        config: ClientConfig,
        wallet: Arc<dyn WalletProvider>,
    ) -> Result<Self, LedgerError> {
        let rpc = Arc::new(SorobanRpc::new(config.rpc_url.clone(), config.request_timeout)?);
        let accounts = Arc::new(HorizonClient::new(
            config.horizon_url.clone(),
            config.request_timeout,
        )?);
        Ok(Self::new(config, rpc, accounts, wallet))
    }

    /// Select a wallet. On success the balance is loaded and the campaign
    /// re-read straight away. A failed selection sets a notice, except that
    /// cancelling while already connected is silent.
    pub async fn connect(&self) -> Option<Session> {
        match self.session.connect().await {
            Ok(ConnectOutcome::Connected(session)) => {
                *self.notice.write().await = None;
                self.balance.reload(&session.address).await;
                self.sync.refresh_aggregate().await;
                Some(session)
            }
            Ok(ConnectOutcome::Cancelled) | Err(WalletError::Cancelled) => {
                if self.session.current().await.is_none() {
                    self.set_notice(CONNECT_CANCELLED).await;
                }
                None
            }
            Err(WalletError::Unavailable(reason)) => {
                info!(%reason, "no wallet available");
                self.set_notice(WALLET_MISSING).await;
                None
            }
            Err(e @ (WalletError::SigningRejected(_) | WalletError::TimedOut(_))) => {
                info!(error = %e, "wallet refused connection");
                self.set_notice(CONNECT_CANCELLED).await;
                None
            }
        }
    }

    pub async fn disconnect(&self) {
        self.session.disconnect().await;
        self.balance.reset().await;
        self.orchestrator.reset();
        *self.notice.write().await = None;
    }

    pub async fn donate(&self, amount: &str) -> Result<TransactionAttempt, DonationError> {
        self.orchestrator.donate(amount).await
    }

    /// Re-read the campaign now, outside the periodic schedule.
    pub async fn refresh(&self) -> Option<CampaignAggregate> {
        self.sync.refresh_aggregate().await
    }

    pub async fn reload_balance(&self) -> Option<i128> {
        let address = self.session.address().await?;
        Some(self.balance.reload(&address).await)
    }

    /// Start periodic refresh and event polling. Keep the handle alive for as
    /// long as the sync should run.
    pub fn start_sync(&self) -> SyncHandle {
        self.sync.spawn()
    }

    pub fn subscribe(&self) -> watch::Receiver<CampaignAggregate> {
        self.sync.subscribe()
    }

    pub fn subscribe_attempt(&self) -> watch::Receiver<TransactionAttempt> {
        self.orchestrator.subscribe()
    }

    pub async fn snapshot(&self) -> Snapshot {
        let aggregate = self.sync.aggregate();
        let address = self.session.address().await;
        Snapshot {
            aggregate,
            progress_percent: aggregate.progress_percent(),
            goal: amount::to_decimal_display(aggregate.goal),
            raised: amount::to_decimal_display(aggregate.raised),
            short_address: address.as_deref().map(shorten),
            address,
            balance: self.balance.get().await,
            attempt: self.orchestrator.attempt(),
            notice: self.notice.read().await.clone(),
        }
    }

    async fn set_notice(&self, notice: &str) {
        *self.notice.write().await = Some(notice.to_string());
    }
}

/// `GABCDE...WXYZ` for display; short strings pass through.
pub fn shorten(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() < 12 {
        return address.to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}
