use std::{
    collections::{HashMap, VecDeque},
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use stellar_xdr::curr::{
    ScVal, SorobanAuthorizationEntry, SorobanTransactionData, TransactionEnvelope,
};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{
    http_client, ContractEvent, LedgerError, LedgerRpc, SendOutcome, SendStatus, Simulation,
    TxStatus,
};
use crate::envelope;

/// How far back `getEvents` looks, in ledgers (~1 hour at 5s per ledger).
pub const EVENT_LOOKBACK_LEDGERS: u32 = 720;

/// Most `getEvents` pages walked by one call.
const MAX_EVENT_PAGES: usize = 50;

/// JSON-RPC 2.0 client for a Soroban RPC endpoint.
///
/// `get_events` remembers the paging cursor it ended on per contract and
/// resumes from it on the next call.
pub struct SorobanRpc {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
    event_cursors: Mutex<HashMap<String, String>>,
}

#[derive(Serialize)]
struct RpcRequest<'a, P> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<P>,
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResult {
    error: Option<String>,
    transaction_data: Option<String>,
    min_resource_fee: Option<String>,
    #[serde(default)]
    results: Vec<SimulateHostFunctionResult>,
}

#[derive(Deserialize)]
struct SimulateHostFunctionResult {
    #[serde(default)]
    auth: Vec<String>,
    xdr: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendResult {
    status: String,
    hash: Option<String>,
    error_result_xdr: Option<String>,
}

#[derive(Deserialize)]
struct GetTransactionResult {
    status: String,
}

#[derive(Deserialize)]
struct LatestLedger {
    sequence: u32,
}

#[derive(Deserialize)]
struct GetEventsResult {
    #[serde(default)]
    events: Vec<EventInfo>,
    cursor: Option<String>,
}

#[derive(Deserialize)]
struct EventInfo {
    id: String,
    #[serde(default)]
    ledger: u32,
}

enum EventsFrom {
    Ledger(u32),
    Cursor(String),
}

/// Newest events seen while paging, plus where paging stopped.
struct EventWalk {
    tail: Vec<ContractEvent>,
    cursor: Option<String>,
}

impl SorobanRpc {
    /// Client whose requests each give up after `timeout`.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, LedgerError> {
        Ok(Self::with_client(http_client(timeout)?, url))
    }

    pub fn with_client(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
            next_id: AtomicU64::new(1),
            event_cursors: Mutex::new(HashMap::new()),
        }
    }

    async fn call<P, T>(&self, method: &str, params: Option<P>) -> Result<T, LedgerError>
    where
        P: Serialize + Send,
        T: DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(method, id, "rpc request");

        let response: RpcResponse<T> = self
            .http
            .post(&self.url)
            .json(&RpcRequest {
                jsonrpc: "2.0",
                id,
                method,
                params,
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(error) = response.error {
            return Err(LedgerError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        response
            .result
            .ok_or_else(|| LedgerError::Malformed(format!("{method}: response has no result")))
    }

    async fn latest_ledger(&self) -> Result<u32, LedgerError> {
        let latest: LatestLedger = self.call("getLatestLedger", None::<()>).await?;
        Ok(latest.sequence)
    }

    async fn window_start(&self) -> Result<EventsFrom, LedgerError> {
        let start = self
            .latest_ledger()
            .await?
            .saturating_sub(EVENT_LOOKBACK_LEDGERS)
            .max(1);
        Ok(EventsFrom::Ledger(start))
    }

    /// Page forward until a short page, keeping only the last `limit` events.
    async fn walk_events(
        &self,
        contract_id: &str,
        limit: u32,
        mut from: EventsFrom,
    ) -> Result<EventWalk, LedgerError> {
        let limit = limit.max(1);
        let keep = limit as usize;
        let filters = json!([{ "type": "contract", "contractIds": [contract_id] }]);

        let mut tail: VecDeque<ContractEvent> = VecDeque::with_capacity(keep);
        let mut cursor = None;
        let mut pages = 0;
        loop {
            pages += 1;
            let params = match &from {
                EventsFrom::Ledger(start) => json!({
                    "startLedger": start,
                    "filters": filters,
                    "pagination": { "limit": limit },
                }),
                EventsFrom::Cursor(after) => json!({
                    "filters": filters,
                    "pagination": { "cursor": after, "limit": limit },
                }),
            };
            let page: GetEventsResult = self.call("getEvents", Some(params)).await?;

            let full = page.events.len() >= keep;
            let next = page
                .cursor
                .filter(|c| !c.is_empty())
                .or_else(|| page.events.last().map(|e| e.id.clone()));
            for event in page.events {
                if tail.len() == keep {
                    tail.pop_front();
                }
                tail.push_back(ContractEvent {
                    id: event.id,
                    ledger: event.ledger,
                });
            }
            if next.is_some() {
                cursor = next.clone();
            }

            let Some(next) = next.filter(|_| full) else {
                break;
            };
            if pages == MAX_EVENT_PAGES {
                warn!(contract_id, pages, "event feed not exhausted, resuming next call");
                break;
            }
            from = EventsFrom::Cursor(next);
        }

        Ok(EventWalk {
            tail: tail.into(),
            cursor,
        })
    }
}

#[async_trait]
impl LedgerRpc for SorobanRpc {
    async fn simulate_transaction(
        &self,
        envelope: &TransactionEnvelope,
    ) -> Result<Simulation, LedgerError> {
        let transaction = envelope::encode(envelope)?;
        let result: SimulateResult = self
            .call("simulateTransaction", Some(json!({ "transaction": transaction })))
            .await?;

        if let Some(error) = result.error {
            return Ok(Simulation {
                error: Some(error),
                ..Simulation::default()
            });
        }

        let transaction_data: Option<SorobanTransactionData> = result
            .transaction_data
            .as_deref()
            .map(envelope::decode_xdr)
            .transpose()?;
        let min_resource_fee: u64 = match result.min_resource_fee.as_deref() {
            Some(fee) => fee
                .parse()
                .map_err(|_| LedgerError::Malformed(format!("minResourceFee {fee:?}")))?,
            None => 0,
        };

        let mut auth: Vec<SorobanAuthorizationEntry> = Vec::new();
        let mut retval: Option<ScVal> = None;
        if let Some(first) = result.results.into_iter().next() {
            for entry in first.auth.iter() {
                auth.push(envelope::decode_xdr(entry)?);
            }
            retval = first.xdr.as_deref().map(envelope::decode_xdr).transpose()?;
        }

        Ok(Simulation {
            error: None,
            transaction_data,
            min_resource_fee,
            auth,
            retval,
        })
    }

    async fn send_transaction(
        &self,
        envelope: &TransactionEnvelope,
    ) -> Result<SendOutcome, LedgerError> {
        let transaction = envelope::encode(envelope)?;
        let result: SendResult = self
            .call("sendTransaction", Some(json!({ "transaction": transaction })))
            .await?;

        Ok(SendOutcome {
            hash: result.hash.filter(|h| !h.is_empty()),
            status: SendStatus::parse(&result.status),
            error_result_xdr: result.error_result_xdr,
        })
    }

    async fn get_transaction(&self, hash: &str) -> Result<TxStatus, LedgerError> {
        let result: GetTransactionResult = self
            .call("getTransaction", Some(json!({ "hash": hash })))
            .await?;
        Ok(TxStatus::parse(&result.status))
    }

    async fn get_events(
        &self,
        contract_id: &str,
        limit: u32,
    ) -> Result<Vec<ContractEvent>, LedgerError> {
        let resume = self.event_cursors.lock().await.get(contract_id).cloned();
        let walk = match resume {
            Some(after) => {
                match self
                    .walk_events(contract_id, limit, EventsFrom::Cursor(after))
                    .await
                {
                    Ok(walk) => walk,
                    // Cursors fall out of the RPC's retention window.
                    Err(e @ LedgerError::Rpc { .. }) => {
                        debug!(error = %e, "event cursor refused, rescanning lookback window");
                        let from = self.window_start().await?;
                        self.walk_events(contract_id, limit, from).await?
                    }
                    Err(e) => return Err(e),
                }
            }
            None => {
                let from = self.window_start().await?;
                self.walk_events(contract_id, limit, from).await?
            }
        };

        if let Some(cursor) = walk.cursor {
            self.event_cursors
                .lock()
                .await
                .insert(contract_id.to_string(), cursor);
        }
        Ok(walk.tail)
    }
}
