#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use crowdfund_client::{
    ledger::{
        AccountInfo, AccountLedger, Balance, ContractEvent, LedgerError, LedgerRpc, SendOutcome,
        SendStatus, Simulation, SubmitOutcome, TxStatus,
    },
    wallet::{Selection, SignContext, WalletError, WalletProvider},
    ClientConfig, ConfirmationPolicy, DonationClient,
};
use stellar_xdr::curr::{
    HostFunction, Int128Parts, OperationBody, ScMap, ScMapEntry, ScSymbol, ScVal, StringM,
    TransactionEnvelope,
};
use tokio::sync::Semaphore;

pub const PAYMENT_HASH: &str = "payment-hash";
pub const RECORD_HASH: &str = "record-hash";

pub fn account(seed: u8) -> String {
    format!("{}", stellar_strkey::ed25519::PublicKey([seed; 32]))
}

pub fn contract(seed: u8) -> String {
    format!("{}", stellar_strkey::Contract([seed; 32]))
}

pub fn donor() -> String {
    account(1)
}

pub fn config() -> ClientConfig {
    ClientConfig {
        contract_id: Some(contract(7)),
        recipient: Some(account(2)),
        readonly_account: Some(account(3)),
        goal: 1_000_000_000,
        confirmation: ConfirmationPolicy {
            attempts: 20,
            delay: Duration::from_millis(1500),
            check_timeout: Duration::from_secs(5),
        },
        ..ClientConfig::default()
    }
}

pub fn campaign_value(goal: Option<i128>, raised: i128, donors: u32) -> ScVal {
    let mut entries = vec![
        ScMapEntry {
            key: symbol("donors"),
            val: ScVal::U32(donors),
        },
        ScMapEntry {
            key: symbol("total_raised"),
            val: i128_val(raised),
        },
    ];
    if let Some(goal) = goal {
        entries.push(ScMapEntry {
            key: symbol("goal"),
            val: i128_val(goal),
        });
    }
    ScVal::Map(Some(ScMap(entries.try_into().unwrap())))
}

fn symbol(name: &str) -> ScVal {
    ScVal::Symbol(ScSymbol(StringM::try_from(name).unwrap()))
}

fn i128_val(value: i128) -> ScVal {
    ScVal::I128(Int128Parts {
        hi: (value >> 64) as i64,
        lo: value as u64,
    })
}

fn invoked(envelope: &TransactionEnvelope) -> Option<(String, Vec<ScVal>)> {
    let TransactionEnvelope::Tx(v1) = envelope else {
        return None;
    };
    let OperationBody::InvokeHostFunction(op) = &v1.tx.operations.first()?.body else {
        return None;
    };
    let HostFunction::InvokeContract(call) = &op.host_function else {
        return None;
    };
    Some((
        call.function_name.0.to_utf8_string_lossy(),
        call.args.to_vec(),
    ))
}

// ─────────────────────────────────────────────────────────
// Ledger
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Calls {
    pub load_account: usize,
    pub submit: usize,
    pub simulate_campaign: usize,
    pub simulate_donate: usize,
    pub send: usize,
    pub get_transaction: usize,
    pub get_events: usize,
}

impl Calls {
    pub fn network_total(&self) -> usize {
        self.load_account
            + self.submit
            + self.simulate_campaign
            + self.simulate_donate
            + self.send
            + self.get_transaction
            + self.get_events
    }
}

/// In-memory ledger with scripted answers for both ledger capabilities.
pub struct FakeLedger {
    pub sequence: i64,
    pub native_balance: Mutex<String>,
    pub campaign: Mutex<ScVal>,
    pub fail_reads: Mutex<bool>,
    /// Campaign reads never answer.
    pub hang_reads: Mutex<bool>,
    /// Status checks never answer.
    pub hang_status: Mutex<bool>,
    pub donate_error: Mutex<Option<String>>,
    pub payment_hash: Mutex<Option<String>>,
    pub send_status: Mutex<SendStatus>,
    pub statuses: Mutex<VecDeque<TxStatus>>,
    pub default_status: Mutex<TxStatus>,
    pub events: Mutex<Result<Vec<ContractEvent>, String>>,
    pub calls: Mutex<Calls>,
    pub loaded_accounts: Mutex<Vec<String>>,
    pub donated: Mutex<Vec<ScVal>>,
}

impl Default for FakeLedger {
    fn default() -> Self {
        Self {
            sequence: 100,
            native_balance: Mutex::new("100.0000000".into()),
            campaign: Mutex::new(campaign_value(Some(1_000_000_000), 250_000_000, 2)),
            fail_reads: Mutex::new(false),
            hang_reads: Mutex::new(false),
            hang_status: Mutex::new(false),
            donate_error: Mutex::new(None),
            payment_hash: Mutex::new(Some(PAYMENT_HASH.into())),
            send_status: Mutex::new(SendStatus::Pending),
            statuses: Mutex::new(VecDeque::new()),
            default_status: Mutex::new(TxStatus::Success),
            events: Mutex::new(Ok(vec![])),
            calls: Mutex::new(Calls::default()),
            loaded_accounts: Mutex::new(vec![]),
            donated: Mutex::new(vec![]),
        }
    }
}

impl FakeLedger {
    pub fn calls(&self) -> Calls {
        self.calls.lock().unwrap().clone()
    }

    pub fn set_campaign(&self, goal: Option<i128>, raised: i128, donors: u32) {
        *self.campaign.lock().unwrap() = campaign_value(goal, raised, donors);
    }

    pub fn set_events(&self, ids: &[&str]) {
        self.set_event_ids(ids.iter().map(|id| id.to_string()));
    }

    pub fn set_event_ids(&self, ids: impl IntoIterator<Item = String>) {
        *self.events.lock().unwrap() = Ok(ids
            .into_iter()
            .enumerate()
            .map(|(i, id)| ContractEvent {
                id,
                ledger: 1_000 + i as u32,
            })
            .collect());
    }

    pub fn script_statuses(&self, statuses: impl IntoIterator<Item = TxStatus>) {
        self.statuses.lock().unwrap().extend(statuses);
    }
}

#[async_trait]
impl LedgerRpc for FakeLedger {
    async fn simulate_transaction(
        &self,
        envelope: &TransactionEnvelope,
    ) -> Result<Simulation, LedgerError> {
        let (function, args) = invoked(envelope)
            .ok_or_else(|| LedgerError::Malformed("not a contract call".into()))?;

        match function.as_str() {
            "get_campaign" => {
                self.calls.lock().unwrap().simulate_campaign += 1;
                let hang = *self.hang_reads.lock().unwrap();
                if hang {
                    std::future::pending::<()>().await;
                }
                if *self.fail_reads.lock().unwrap() {
                    return Err(LedgerError::Malformed("rpc unavailable".into()));
                }
                Ok(Simulation {
                    retval: Some(self.campaign.lock().unwrap().clone()),
                    ..Simulation::default()
                })
            }
            "donate" => {
                self.calls.lock().unwrap().simulate_donate += 1;
                if let Some(error) = self.donate_error.lock().unwrap().clone() {
                    return Ok(Simulation {
                        error: Some(error),
                        ..Simulation::default()
                    });
                }
                self.donated.lock().unwrap().extend(args);
                Ok(Simulation {
                    min_resource_fee: 50_000,
                    retval: Some(ScVal::Void),
                    ..Simulation::default()
                })
            }
            other => Err(LedgerError::Malformed(format!("unexpected call {other}"))),
        }
    }

    async fn send_transaction(
        &self,
        _envelope: &TransactionEnvelope,
    ) -> Result<SendOutcome, LedgerError> {
        self.calls.lock().unwrap().send += 1;
        let status = self.send_status.lock().unwrap().clone();
        let error_result_xdr =
            (status == SendStatus::Error).then(|| String::from("AAAAAAAAAGT////7AAAAAA=="));
        Ok(SendOutcome {
            hash: Some(RECORD_HASH.into()),
            status,
            error_result_xdr,
        })
    }

    async fn get_transaction(&self, _hash: &str) -> Result<TxStatus, LedgerError> {
        self.calls.lock().unwrap().get_transaction += 1;
        let hang = *self.hang_status.lock().unwrap();
        if hang {
            std::future::pending::<()>().await;
        }
        let scripted = self.statuses.lock().unwrap().pop_front();
        Ok(scripted.unwrap_or_else(|| self.default_status.lock().unwrap().clone()))
    }

    /// Like the RPC adapter, answers with the newest `limit` events.
    async fn get_events(
        &self,
        _contract_id: &str,
        limit: u32,
    ) -> Result<Vec<ContractEvent>, LedgerError> {
        self.calls.lock().unwrap().get_events += 1;
        let events = self
            .events
            .lock()
            .unwrap()
            .clone()
            .map_err(LedgerError::Malformed)?;
        let skip = events.len().saturating_sub(limit as usize);
        Ok(events[skip..].to_vec())
    }
}

#[async_trait]
impl AccountLedger for FakeLedger {
    async fn load_account(&self, address: &str) -> Result<AccountInfo, LedgerError> {
        self.calls.lock().unwrap().load_account += 1;
        self.loaded_accounts.lock().unwrap().push(address.to_string());
        Ok(AccountInfo {
            sequence: self.sequence,
            balances: vec![Balance {
                asset_type: "native".into(),
                balance: self.native_balance.lock().unwrap().clone(),
            }],
        })
    }

    async fn submit_transaction(
        &self,
        _envelope: &TransactionEnvelope,
    ) -> Result<SubmitOutcome, LedgerError> {
        self.calls.lock().unwrap().submit += 1;
        Ok(SubmitOutcome {
            hash: self.payment_hash.lock().unwrap().clone(),
        })
    }
}

// ─────────────────────────────────────────────────────────
// Wallet
// ─────────────────────────────────────────────────────────

/// Wallet that picks a scripted selection and "signs" by echoing the
/// envelope back.
pub struct FakeWallet {
    pub selection: Mutex<Result<Selection, WalletError>>,
    pub address: String,
    pub sign_error: Mutex<Option<WalletError>>,
    pub sign_calls: Mutex<usize>,
    /// When set, every signature waits for a permit.
    pub gate: Option<Arc<Semaphore>>,
}

impl FakeWallet {
    pub fn connected_as(address: String) -> Self {
        Self {
            selection: Mutex::new(Ok(Selection::Chosen("fake".into()))),
            address,
            sign_error: Mutex::new(None),
            sign_calls: Mutex::new(0),
            gate: None,
        }
    }

    pub fn closing() -> Self {
        let wallet = Self::connected_as(donor());
        *wallet.selection.lock().unwrap() = Ok(Selection::Closed);
        wallet
    }

    pub fn missing() -> Self {
        let wallet = Self::connected_as(donor());
        *wallet.selection.lock().unwrap() =
            Err(WalletError::Unavailable("no extension installed".into()));
        wallet
    }

    pub fn sign_calls(&self) -> usize {
        *self.sign_calls.lock().unwrap()
    }
}

#[async_trait]
impl WalletProvider for FakeWallet {
    async fn open_selection(&self) -> Result<Selection, WalletError> {
        self.selection.lock().unwrap().clone()
    }

    async fn set_active(&self, _wallet_id: &str) -> Result<(), WalletError> {
        Ok(())
    }

    async fn address(&self) -> Result<String, WalletError> {
        Ok(self.address.clone())
    }

    async fn sign(&self, envelope_xdr: &str, context: &SignContext) -> Result<String, WalletError> {
        assert_eq!(context.address, self.address);
        *self.sign_calls.lock().unwrap() += 1;
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|_| WalletError::Unavailable("gate closed".into()))?
                .forget();
        }
        if let Some(error) = self.sign_error.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(envelope_xdr.to_string())
    }
}

pub fn client(ledger: &Arc<FakeLedger>, wallet: &Arc<FakeWallet>) -> DonationClient {
    client_with(config(), ledger, wallet)
}

pub fn client_with(
    config: ClientConfig,
    ledger: &Arc<FakeLedger>,
    wallet: &Arc<FakeWallet>,
) -> DonationClient {
    DonationClient::new(
        config,
        Arc::clone(ledger) as Arc<dyn LedgerRpc>,
        Arc::clone(ledger) as Arc<dyn AccountLedger>,
        Arc::clone(wallet) as Arc<dyn WalletProvider>,
    )
}
