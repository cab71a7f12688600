//! Wallet session: the connected identity and its ability to sign.
//!
//! The actual wallet sits behind [`WalletProvider`]. [`WalletSession`] owns
//! the single live session and guards signing when nothing is connected.

mod keystore;

pub use keystore::KeystoreWallet;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use thiserror::Error;
use tokio::{sync::RwLock, time};
use tracing::{info, warn};

use crate::config::DEFAULT_WALLET_TIMEOUT;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WalletError {
    #[error("no compatible wallet is available: {0}")]
    Unavailable(String),

    #[error("wallet selection was closed without a choice")]
    Cancelled,

    #[error("signing was rejected: {0}")]
    SigningRejected(String),

    /// The prompt got no answer in time. The session stays connected.
    #[error("wallet did not answer within {0:?}")]
    TimedOut(Duration),
}

/// Outcome of the wallet-selection flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Chosen(String),
    Closed,
}

/// What a signature request is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignContext {
    pub address: String,
    pub network_passphrase: String,
}

/// External wallet capability. Envelopes cross this boundary as base64 XDR.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    async fn open_selection(&self) -> Result<Selection, WalletError>;

    async fn set_active(&self, wallet_id: &str) -> Result<(), WalletError>;

    async fn address(&self) -> Result<String, WalletError>;

    async fn sign(&self, envelope_xdr: &str, context: &SignContext) -> Result<String, WalletError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub wallet_id: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    Connected(Session),
    Cancelled,
}

pub struct WalletSession {
    provider: Arc<dyn WalletProvider>,
    session: RwLock<Option<Session>>,
    sign_timeout: Duration,
}

impl WalletSession {
    pub fn new(provider: Arc<dyn WalletProvider>) -> Self {
        Self {
            provider,
            session: RwLock::new(None),
            sign_timeout: DEFAULT_WALLET_TIMEOUT,
        }
    }

    /// Give up on a signature prompt after `limit`.
    pub fn with_sign_timeout(mut self, limit: Duration) -> Self {
        self.sign_timeout = limit;
        self
    }

    /// Run the selection flow. A closed flow leaves any existing session in
    /// place and resolves to [`ConnectOutcome::Cancelled`].
    pub async fn connect(&self) -> Result<ConnectOutcome, WalletError> {
        let wallet_id = match self.provider.open_selection().await? {
            Selection::Chosen(id) => id,
            Selection::Closed => {
                info!("wallet selection closed without a choice");
                return Ok(ConnectOutcome::Cancelled);
            }
        };

        self.provider.set_active(&wallet_id).await?;
        let address = self.provider.address().await?;
        if address.trim().is_empty() {
            return Err(WalletError::Unavailable(format!(
                "wallet {wallet_id} returned no address"
            )));
        }

        let session = Session { wallet_id, address };
        info!(wallet = %session.wallet_id, address = %session.address, "wallet connected");
        *self.session.write().await = Some(session.clone());
        Ok(ConnectOutcome::Connected(session))
    }

    /// Ask the active wallet to sign. Fails with `Unavailable` when no session
    /// is active; an `Unavailable` from the wallet itself ends the session.
    /// A prompt left unanswered past the sign timeout is `TimedOut`.
    pub async fn sign(
        &self,
        envelope_xdr: &str,
        network_passphrase: &str,
    ) -> Result<String, WalletError> {
        let Some(session) = self.current().await else {
            return Err(WalletError::Unavailable("no active wallet session".into()));
        };

        let context = SignContext {
            address: session.address,
            network_passphrase: network_passphrase.to_string(),
        };
        let prompt = self.provider.sign(envelope_xdr, &context);
        let Ok(answer) = time::timeout(self.sign_timeout, prompt).await else {
            warn!(limit = ?self.sign_timeout, "signature prompt went unanswered");
            return Err(WalletError::TimedOut(self.sign_timeout));
        };
        match answer {
            Err(WalletError::Unavailable(reason)) => {
                warn!(%reason, "wallet became unavailable, dropping session");
                self.disconnect().await;
                Err(WalletError::Unavailable(reason))
            }
            other => other,
        }
    }

    pub async fn disconnect(&self) {
        if self.session.write().await.take().is_some() {
            info!("wallet disconnected");
        }
    }

    pub async fn current(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    pub async fn address(&self) -> Option<String> {
        self.session.read().await.as_ref().map(|s| s.address.clone())
    }
}
