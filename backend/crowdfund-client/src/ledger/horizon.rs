use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use stellar_xdr::curr::TransactionEnvelope;
use tracing::debug;

use super::{http_client, AccountInfo, AccountLedger, Balance, LedgerError, SubmitOutcome};
use crate::envelope;

/// REST client for a Horizon server.
pub struct HorizonClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct AccountResponse {
    sequence: String,
    #[serde(default)]
    balances: Vec<BalanceResponse>,
}

#[derive(Deserialize)]
struct BalanceResponse {
    asset_type: String,
    balance: String,
}

#[derive(Deserialize)]
struct SubmitResponse {
    hash: Option<String>,
}

/// Horizon problem document; `extras` is present on failed submissions.
#[derive(Deserialize)]
struct Problem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    detail: String,
    extras: Option<ProblemExtras>,
}

#[derive(Deserialize)]
struct ProblemExtras {
    result_codes: Option<ResultCodes>,
    result_xdr: Option<String>,
}

#[derive(Deserialize)]
struct ResultCodes {
    transaction: Option<String>,
    #[serde(default)]
    operations: Vec<String>,
}

impl HorizonClient {
    /// Client whose requests each give up after `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, LedgerError> {
        Ok(Self::with_client(http_client(timeout)?, base_url))
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn problem(response: reqwest::Response) -> LedgerError {
        let status = response.status().as_u16();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return LedgerError::Http(e),
        };

        match serde_json::from_str::<Problem>(&body) {
            Ok(Problem {
                extras:
                    Some(ProblemExtras {
                        result_codes: Some(codes),
                        result_xdr,
                    }),
                ..
            }) => {
                let mut code = codes.transaction.unwrap_or_else(|| "unknown".into());
                if !codes.operations.is_empty() {
                    code = format!("{code} [{}]", codes.operations.join(", "));
                }
                LedgerError::Rejected { code, result_xdr }
            }
            Ok(problem) => LedgerError::Status {
                status,
                detail: format!("{} {}", problem.title, problem.detail).trim().to_string(),
            },
            Err(_) => LedgerError::Status {
                status,
                detail: body,
            },
        }
    }
}

#[async_trait]
impl AccountLedger for HorizonClient {
    async fn load_account(&self, address: &str) -> Result<AccountInfo, LedgerError> {
        let url = format!("{}/accounts/{address}", self.base_url);
        debug!(%url, "loading account");

        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(Self::problem(response).await);
        }

        let account: AccountResponse = response.json().await?;
        let sequence = account
            .sequence
            .parse()
            .map_err(|_| LedgerError::Malformed(format!("sequence {:?}", account.sequence)))?;

        Ok(AccountInfo {
            sequence,
            balances: account
                .balances
                .into_iter()
                .map(|b| Balance {
                    asset_type: b.asset_type,
                    balance: b.balance,
                })
                .collect(),
        })
    }

    async fn submit_transaction(
        &self,
        envelope: &TransactionEnvelope,
    ) -> Result<SubmitOutcome, LedgerError> {
        let tx = envelope::encode(envelope)?;
        let url = format!("{}/transactions", self.base_url);

        let response = self.http.post(&url).form(&[("tx", tx)]).send().await?;
        if !response.status().is_success() {
            return Err(Self::problem(response).await);
        }

        let submitted: SubmitResponse = response.json().await?;
        Ok(SubmitOutcome {
            hash: submitted.hash.filter(|h| !h.is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::SourceAccount;
    use mockito::Matcher;
    use serde_json::json;

    fn account(seed: u8) -> String {
        format!("{}", stellar_strkey::ed25519::PublicKey([seed; 32]))
    }

    fn payment() -> TransactionEnvelope {
        let source = SourceAccount {
            address: account(1),
            sequence: 7,
        };
        envelope::payment(&source, &account(2), 10_000_000).unwrap()
    }

    #[tokio::test]
    async fn loads_sequence_and_balances() {
        let mut server = mockito::Server::new_async().await;
        let address = account(1);
        let mock = server
            .mock("GET", format!("/accounts/{address}").as_str())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "id": address,
                    "sequence": "4294967296",
                    "balances": [
                        { "asset_type": "credit_alphanum4", "balance": "3.0000000" },
                        { "asset_type": "native", "balance": "99.5000000" }
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let horizon = HorizonClient::new(format!("{}/", server.url()), Duration::from_secs(5)).unwrap();
        let loaded = horizon.load_account(&address).await.unwrap();

        mock.assert_async().await;
        assert_eq!(loaded.sequence, 4_294_967_296);
        assert_eq!(loaded.native_balance(), 995_000_000);
    }

    #[tokio::test]
    async fn missing_account_is_status_error() {
        let mut server = mockito::Server::new_async().await;
        let address = account(3);
        server
            .mock("GET", format!("/accounts/{address}").as_str())
            .with_status(404)
            .with_body(json!({ "title": "Resource Missing", "detail": "not found" }).to_string())
            .create_async()
            .await;

        let horizon = HorizonClient::new(server.url(), Duration::from_secs(5)).unwrap();
        match horizon.load_account(&address).await {
            Err(LedgerError::Status { status, detail }) => {
                assert_eq!(status, 404);
                assert_eq!(detail, "Resource Missing not found");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn submit_returns_hash() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/transactions")
            .match_body(Matcher::Regex("^tx=".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "hash": "deadbeef", "successful": true }).to_string())
            .create_async()
            .await;

        let horizon = HorizonClient::new(server.url(), Duration::from_secs(5)).unwrap();
        let outcome = horizon.submit_transaction(&payment()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(outcome.hash.as_deref(), Some("deadbeef"));
    }

    #[tokio::test]
    async fn failed_submission_reports_result_codes() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/transactions")
            .with_status(400)
            .with_header("content-type", "application/problem+json")
            .with_body(
                json!({
                    "title": "Transaction Failed",
                    "extras": {
                        "result_codes": { "transaction": "tx_failed", "operations": ["op_underfunded"] },
                        "result_xdr": "AAAAAAAAAGT////6AAAAAA=="
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let horizon = HorizonClient::new(server.url(), Duration::from_secs(5)).unwrap();
        match horizon.submit_transaction(&payment()).await {
            Err(LedgerError::Rejected { code, result_xdr }) => {
                assert_eq!(code, "tx_failed [op_underfunded]");
                assert_eq!(result_xdr.as_deref(), Some("AAAAAAAAAGT////6AAAAAA=="));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
