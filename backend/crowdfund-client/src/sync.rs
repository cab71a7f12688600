//! Campaign state synchronizer.
//!
//! Keeps a cached [`CampaignAggregate`] in step with the contract by
//! re-reading it wholesale on a fixed period, and by watching the contract's
//! event feed so new donations show up without waiting a full period.
//!
//! - Reads simulate `get_campaign` under the connected account, or the
//!   configured read-only account when nobody is connected.
//! - Read failures and reads that outlive the request deadline are logged,
//!   and the previous aggregate is kept.
//! - The event cursor only decides whether to re-read; it never feeds
//!   numbers into the aggregate.

use std::{future::Future, sync::Arc, time::Duration};

use thiserror::Error;
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    config::ClientConfig,
    envelope::{self, CampaignFields, EnvelopeError, SourceAccount},
    ledger::{AccountLedger, LedgerError, LedgerRpc},
    state::CampaignAggregate,
    wallet::WalletSession,
};

/// Events fetched per poll.
pub const EVENT_FETCH_LIMIT: u32 = 20;

/// Why a background read produced nothing. Never shown to the user.
#[derive(Debug, Error)]
pub enum ReadUnavailable {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error("simulation failed: {0}")]
    Simulation(String),

    #[error("simulation returned no value")]
    NoReturnValue,

    #[error("no answer within {0:?}")]
    TimedOut(Duration),
}

pub struct CampaignSync {
    config: Arc<ClientConfig>,
    rpc: Arc<dyn LedgerRpc>,
    accounts: Arc<dyn AccountLedger>,
    session: Arc<WalletSession>,
    aggregate: watch::Sender<CampaignAggregate>,
    cursor: Mutex<Option<String>>,
}

impl CampaignSync {
    pub fn new(
        config: Arc<ClientConfig>,
        rpc: Arc<dyn LedgerRpc>,
        accounts: Arc<dyn AccountLedger>,
        session: Arc<WalletSession>,
    ) -> Self {
        let (aggregate, _) = watch::channel(CampaignAggregate {
            goal: config.goal,
            ..CampaignAggregate::default()
        });
        Self {
            config,
            rpc,
            accounts,
            session,
            aggregate,
            cursor: Mutex::new(None),
        }
    }

    pub fn aggregate(&self) -> CampaignAggregate {
        *self.aggregate.borrow()
    }

    /// Receiver that wakes whenever the aggregate actually changes.
    pub fn subscribe(&self) -> watch::Receiver<CampaignAggregate> {
        self.aggregate.subscribe()
    }

    pub async fn last_seen_event(&self) -> Option<String> {
        self.cursor.lock().await.clone()
    }

    /// Re-read the campaign and replace the cached aggregate.
    ///
    /// Returns `None` without touching the cache when there is no contract,
    /// no account to simulate under, or the read fails.
    pub async fn refresh_aggregate(&self) -> Option<CampaignAggregate> {
        let contract_id = self.config.contract_id.as_deref()?;

        let source = match self.session.address().await {
            Some(address) => address,
            None => self.config.readonly_account.clone()?,
        };

        let limit = self.config.request_timeout;
        let read = time::timeout(limit, self.read_campaign(contract_id, &source));
        let fields = match read.await.unwrap_or(Err(ReadUnavailable::TimedOut(limit))) {
            Ok(fields) => fields,
            Err(e) => {
                warn!(error = %e, "campaign read failed, keeping previous state");
                return None;
            }
        };

        let mut fresh = CampaignAggregate::default();
        self.aggregate.send_if_modified(|current| {
            fresh = CampaignAggregate {
                goal: fields.goal.filter(|goal| *goal > 0).unwrap_or(current.goal),
                raised: fields.total_raised,
                donors: fields.donors,
            };
            if *current == fresh {
                return false;
            }
            *current = fresh;
            true
        });
        debug!(?fresh, "campaign refreshed");
        Some(fresh)
    }

    async fn read_campaign(
        &self,
        contract_id: &str,
        source: &str,
    ) -> Result<CampaignFields, ReadUnavailable> {
        let account = self.accounts.load_account(source).await?;
        let source = SourceAccount {
            address: source.to_string(),
            sequence: account.sequence,
        };
        let tx = envelope::invoke_contract(&source, contract_id, "get_campaign", vec![])?;

        let simulation = self.rpc.simulate_transaction(&tx).await?;
        if let Some(error) = simulation.error {
            return Err(ReadUnavailable::Simulation(error));
        }
        let value = simulation.retval.ok_or(ReadUnavailable::NoReturnValue)?;
        Ok(envelope::decode_campaign(&value)?)
    }

    /// Check the event feed and refresh only if the newest event is one we
    /// have not seen. Returns whether a refresh was triggered.
    pub async fn poll_for_new_activity(&self) -> bool {
        let Some(contract_id) = self.config.contract_id.as_deref() else {
            return false;
        };

        let limit = self.config.request_timeout;
        let fetch = time::timeout(limit, self.rpc.get_events(contract_id, EVENT_FETCH_LIMIT));
        let events = match fetch.await {
            Ok(Ok(events)) => events,
            Ok(Err(e)) => {
                warn!(error = %e, "event poll failed");
                return false;
            }
            Err(_) => {
                warn!(?limit, "event poll timed out");
                return false;
            }
        };
        let Some(newest) = events.last() else {
            return false;
        };

        {
            let mut cursor = self.cursor.lock().await;
            if cursor.as_deref() == Some(newest.id.as_str()) {
                return false;
            }
            info!(event = %newest.id, ledger = newest.ledger, "new campaign activity");
            *cursor = Some(newest.id.clone());
        }

        self.refresh_aggregate().await;
        true
    }

    /// Run both reads on the configured period until the returned handle is
    /// shut down or dropped. The first tick of each fires immediately.
    pub fn spawn(self: &Arc<Self>) -> SyncHandle {
        let token = CancellationToken::new();
        let period = self.config.sync_interval;

        let refresh = {
            let sync = Arc::clone(self);
            schedule(period, token.clone(), move || {
                let sync = Arc::clone(&sync);
                async move {
                    sync.refresh_aggregate().await;
                }
            })
        };
        let events = {
            let sync = Arc::clone(self);
            schedule(period, token.clone(), move || {
                let sync = Arc::clone(&sync);
                async move {
                    sync.poll_for_new_activity().await;
                }
            })
        };

        SyncHandle {
            token,
            tasks: vec![refresh, events],
        }
    }
}

fn schedule<F, Fut>(period: Duration, token: CancellationToken, mut tick: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    tokio::spawn(async move {
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = interval.tick() => {}
            }
            // A tick stuck on the network must not hold up shutdown.
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = tick() => {}
            }
        }
    })
}

/// Owner of the background sync tasks. Dropping it cancels them.
pub struct SyncHandle {
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl SyncHandle {
    /// Cancel both tasks and wait for them to stop.
    pub async fn shutdown(mut self) {
        self.token.cancel();
        for task in std::mem::take(&mut self.tasks) {
            if let Err(e) = task.await {
                warn!(error = %e, "sync task ended abnormally");
            }
        }
        debug!("sync stopped");
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
