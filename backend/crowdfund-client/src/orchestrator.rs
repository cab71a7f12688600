//! Two-phase donation.
//!
//! A donation is a native payment to the campaign owner (phase A) followed by
//! a `donate` call that records it in the contract (phase B). The phases are
//! not atomic: if A lands and B does not, the funds have moved and the
//! attempt ends `Failed` with a message saying so. Nothing is rolled back.
//!
//! One attempt runs at a time. A call made while another is `Pending` is
//! refused with [`DonationError::AttemptInFlight`] and leaves the running
//! attempt untouched. Every ledger call and wallet prompt is bounded, so a
//! claimed attempt always reaches a terminal state.

use std::{future::Future, sync::Arc};

use stellar_xdr::curr::TransactionEnvelope;
use tokio::{sync::watch, time};
use tracing::{debug, info, warn};

use crate::{
    amount,
    config::ClientConfig,
    envelope::{self, SourceAccount},
    error::{DonationError, PreconditionFailure},
    ledger::{AccountLedger, LedgerRpc, SendStatus, TxStatus},
    state::{NativeBalance, TransactionAttempt},
    sync::CampaignSync,
    wallet::WalletSession,
};

const SENDING_PAYMENT: &str = "Sending payment to campaign owner...";
const RECORDING: &str = "Payment sent. Recording donation on-chain...";
const CONFIRMING: &str = "Waiting for the donation to be confirmed...";
const SUCCEEDED: &str = "Donation successful.";

/// Everything a donation needs once preconditions hold.
struct Ready {
    contract_id: String,
    recipient: String,
    donor: String,
    stroops: i128,
}

pub struct DonationOrchestrator {
    config: Arc<ClientConfig>,
    rpc: Arc<dyn LedgerRpc>,
    accounts: Arc<dyn AccountLedger>,
    session: Arc<WalletSession>,
    balance: Arc<NativeBalance>,
    sync: Arc<CampaignSync>,
    attempt: watch::Sender<TransactionAttempt>,
}

impl DonationOrchestrator {
    pub fn new(
        config: Arc<ClientConfig>,
        rpc: Arc<dyn LedgerRpc>,
        accounts: Arc<dyn AccountLedger>,
        session: Arc<WalletSession>,
        balance: Arc<NativeBalance>,
        sync: Arc<CampaignSync>,
    ) -> Self {
        let (attempt, _) = watch::channel(TransactionAttempt::Idle);
        Self {
            config,
            rpc,
            accounts,
            session,
            balance,
            sync,
            attempt,
        }
    }

    pub fn attempt(&self) -> TransactionAttempt {
        self.attempt.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TransactionAttempt> {
        self.attempt.subscribe()
    }

    /// Back to `Idle` unless an attempt is still running.
    pub fn reset(&self) {
        self.attempt.send_if_modified(|attempt| {
            if attempt.is_pending() || *attempt == TransactionAttempt::Idle {
                return false;
            }
            *attempt = TransactionAttempt::Idle;
            true
        });
    }

    /// Donate `amount` (decimal XLM as typed by the user).
    ///
    /// Every outcome other than an overlapping call ends in a terminal attempt
    /// which is also returned.
    pub async fn donate(&self, amount: &str) -> Result<TransactionAttempt, DonationError> {
        if self.attempt.borrow().is_pending() {
            return Err(DonationError::AttemptInFlight);
        }

        let next = match self.check_preconditions(amount).await {
            Ok(ready) => Ok(ready),
            Err(failure) => Err(DonationError::from(failure)),
        };

        // Claim the slot atomically; the check above is only a fast path.
        let mut claimed = false;
        self.attempt.send_if_modified(|attempt| {
            if attempt.is_pending() {
                return false;
            }
            *attempt = match &next {
                Ok(_) => TransactionAttempt::Pending {
                    message: SENDING_PAYMENT.into(),
                    tx_hash: None,
                },
                Err(e) => failed(e, None),
            };
            claimed = true;
            true
        });
        if !claimed {
            return Err(DonationError::AttemptInFlight);
        }

        let ready = match next {
            Ok(ready) => ready,
            Err(e) => {
                info!(reason = %e, "donation refused before submission");
                return Ok(self.attempt());
            }
        };

        info!(
            donor = %ready.donor,
            amount = %amount::to_decimal_string(ready.stroops),
            "donation started"
        );
        let outcome = self.run(&ready).await;
        let last_hash = self.attempt.borrow().tx_hash().map(str::to_string);

        let terminal = match outcome {
            Ok(tx_hash) => {
                info!(%tx_hash, "donation confirmed");
                self.attempt.send_replace(TransactionAttempt::Success {
                    message: SUCCEEDED.into(),
                    tx_hash,
                });
                self.sync.refresh_aggregate().await;
                self.balance.reload(&ready.donor).await;
                self.attempt()
            }
            Err(e) => {
                warn!(error = %e, kind = ?e.kind(), "donation failed");
                let attempt = failed(&e, last_hash);
                self.attempt.send_replace(attempt.clone());
                attempt
            }
        };
        Ok(terminal)
    }

    async fn check_preconditions(&self, amount: &str) -> Result<Ready, PreconditionFailure> {
        let contract_id = self
            .config
            .contract_id
            .clone()
            .ok_or(PreconditionFailure::MissingContractId)?;
        let recipient = self
            .config
            .recipient
            .clone()
            .ok_or(PreconditionFailure::MissingRecipient)?;
        let donor = self
            .session
            .address()
            .await
            .ok_or(PreconditionFailure::NotConnected)?;

        let stroops = amount::to_minor_units(amount);
        if stroops <= 0 {
            return Err(PreconditionFailure::InvalidAmount);
        }
        if self.balance.get().await < stroops {
            return Err(PreconditionFailure::InsufficientBalance);
        }

        Ok(Ready {
            contract_id,
            recipient,
            donor,
            stroops,
        })
    }

    /// Both phases plus confirmation. Returns the hash of the `donate` call.
    async fn run(&self, ready: &Ready) -> Result<String, DonationError> {
        let payment_hash = self.send_payment(ready).await?;
        info!(%payment_hash, "payment accepted");
        self.set_pending(RECORDING, Some(payment_hash.clone()));

        self.record_donation(ready)
            .await
            .map_err(|e| DonationError::RecordingFailed {
                payment_hash,
                source: Box::new(e),
            })
    }

    async fn send_payment(&self, ready: &Ready) -> Result<String, DonationError> {
        let source = self.source_account(&ready.donor).await?;
        let tx = envelope::payment(&source, &ready.recipient, ready.stroops)?;
        let signed = self.sign(&tx).await?;

        let submitted = self
            .bounded("payment submission", self.accounts.submit_transaction(&signed))
            .await?;
        submitted.hash.ok_or(DonationError::MissingHash)
    }

    async fn record_donation(&self, ready: &Ready) -> Result<String, DonationError> {
        let source = self.source_account(&ready.donor).await?;
        let args = vec![
            envelope::address_arg(&ready.donor)?,
            envelope::i128_arg(ready.stroops),
        ];
        let tx = envelope::invoke_contract(&source, &ready.contract_id, "donate", args)?;

        let simulation = self
            .bounded("simulation", self.rpc.simulate_transaction(&tx))
            .await?;
        if let Some(error) = simulation.error.clone() {
            return Err(DonationError::SimulationRejected(error));
        }
        let tx = envelope::assemble(tx, &simulation)?;
        let signed = self.sign(&tx).await?;

        let sent = self
            .bounded("send", self.rpc.send_transaction(&signed))
            .await?;
        if let Some(hash) = &sent.hash {
            self.set_pending(CONFIRMING, Some(hash.clone()));
        }
        if sent.status != SendStatus::Pending {
            return Err(DonationError::SubmissionRejected {
                status: sent.status.as_str().to_string(),
                detail: sent.error_result_xdr,
            });
        }
        let hash = sent.hash.ok_or(DonationError::MissingHash)?;

        self.confirm(&hash).await?;
        Ok(hash)
    }

    /// Poll until the transaction is final or the attempt bound runs out.
    /// Failed or unanswered checks count as not final.
    async fn confirm(&self, hash: &str) -> Result<(), DonationError> {
        let policy = self.config.confirmation;
        for check in 1..=policy.attempts {
            let status = time::timeout(policy.check_timeout, self.rpc.get_transaction(hash)).await;
            match status {
                Ok(Ok(TxStatus::Success)) => return Ok(()),
                Ok(Ok(TxStatus::Failed)) => {
                    return Err(DonationError::OnChainFailure {
                        hash: hash.to_string(),
                    })
                }
                Ok(Ok(status)) => debug!(%hash, check, ?status, "not final yet"),
                Ok(Err(e)) => warn!(%hash, check, error = %e, "status check failed"),
                Err(_) => warn!(%hash, check, "status check timed out"),
            }
            if check < policy.attempts {
                time::sleep(policy.delay).await;
            }
        }
        Err(DonationError::ConfirmationTimeout {
            hash: hash.to_string(),
            attempts: policy.attempts,
        })
    }

    async fn source_account(&self, address: &str) -> Result<SourceAccount, DonationError> {
        let account = self
            .bounded("account lookup", self.accounts.load_account(address))
            .await?;
        Ok(SourceAccount {
            address: address.to_string(),
            sequence: account.sequence,
        })
    }

    async fn sign(&self, tx: &TransactionEnvelope) -> Result<TransactionEnvelope, DonationError> {
        let unsigned = envelope::encode(tx)?;
        let signed = self
            .session
            .sign(&unsigned, &self.config.network_passphrase)
            .await?;
        Ok(envelope::decode(&signed)?)
    }

    async fn bounded<T, E>(
        &self,
        call: &'static str,
        request: impl Future<Output = Result<T, E>>,
    ) -> Result<T, DonationError>
    where
        DonationError: From<E>,
    {
        match time::timeout(self.config.request_timeout, request).await {
            Ok(answer) => Ok(answer?),
            Err(_) => Err(DonationError::Unresponsive { call }),
        }
    }

    fn set_pending(&self, message: &str, tx_hash: Option<String>) {
        self.attempt.send_replace(TransactionAttempt::Pending {
            message: message.to_string(),
            tx_hash,
        });
    }
}

fn failed(error: &DonationError, tx_hash: Option<String>) -> TransactionAttempt {
    TransactionAttempt::Failed {
        kind: error.kind(),
        message: error.user_message(),
        tx_hash,
    }
}
