use std::time::Duration;

use clap::Args;

use crate::amount;

pub const TESTNET_RPC_URL: &str = "https://soroban-testnet.stellar.org";
pub const TESTNET_HORIZON_URL: &str = "https://horizon-testnet.stellar.org";
pub const TESTNET_PASSPHRASE: &str = "Test SDF Network ; September 2015";

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_WALLET_TIMEOUT: Duration = Duration::from_secs(120);

/// Process settings, from flags or the environment (a `.env` file is loaded
/// first when present).
#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// Soroban RPC endpoint
    #[arg(long, env = "STELLAR_RPC_URL", default_value = TESTNET_RPC_URL)]
    pub rpc_url: String,

    /// Horizon endpoint used for accounts and payment submission
    #[arg(long, env = "HORIZON_URL", default_value = TESTNET_HORIZON_URL)]
    pub horizon_url: String,

    /// Network passphrase signatures are bound to
    #[arg(long, env = "STELLAR_NETWORK_PASSPHRASE", default_value = TESTNET_PASSPHRASE)]
    pub network_passphrase: String,

    /// Crowdfund contract id (C...)
    #[arg(long, env = "CONTRACT_ID")]
    pub contract_id: Option<String>,

    /// Funding goal in whole XLM, used until the contract reports its own
    #[arg(long, env = "CAMPAIGN_GOAL_XLM", default_value = "100", value_name = "XLM")]
    pub goal_xlm: String,

    /// Funded account used as the source of read-only simulations when no
    /// wallet is connected
    #[arg(long, env = "READONLY_ACCOUNT")]
    pub readonly_account: Option<String>,

    /// Campaign owner; receives the payment half of every donation
    #[arg(long, env = "OWNER_ADDRESS")]
    pub owner_address: Option<String>,

    /// Secret key (S...) of the local signing wallet
    #[arg(long, env = "WALLET_SECRET", hide_env_values = true)]
    pub wallet_secret: Option<String>,

    /// Seconds between background refreshes
    #[arg(long, env = "SYNC_INTERVAL_SECS", default_value_t = 5)]
    pub sync_interval_secs: u64,

    /// Status checks before a submitted transaction is given up on
    #[arg(long, env = "CONFIRM_ATTEMPTS", default_value_t = 20)]
    pub confirm_attempts: u32,

    /// Delay between status checks, in milliseconds
    #[arg(long, env = "CONFIRM_DELAY_MS", default_value_t = 1500)]
    pub confirm_delay_ms: u64,

    /// Deadline for one status check, in milliseconds
    #[arg(long, env = "CONFIRM_CHECK_TIMEOUT_MS", default_value_t = 5000)]
    pub confirm_check_timeout_ms: u64,

    /// Deadline for a single RPC or Horizon request, in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// How long a signature prompt may stay unanswered, in seconds
    #[arg(long, env = "WALLET_TIMEOUT_SECS", default_value_t = 120)]
    pub wallet_timeout_secs: u64,
}

impl Settings {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            rpc_url: self.rpc_url.clone(),
            horizon_url: self.horizon_url.clone(),
            network_passphrase: self.network_passphrase.clone(),
            contract_id: present(&self.contract_id),
            goal: amount::to_minor_units(&self.goal_xlm),
            readonly_account: present(&self.readonly_account),
            recipient: present(&self.owner_address),
            sync_interval: Duration::from_secs(self.sync_interval_secs.max(1)),
            confirmation: ConfirmationPolicy {
                attempts: self.confirm_attempts.max(1),
                delay: Duration::from_millis(self.confirm_delay_ms),
                check_timeout: Duration::from_millis(self.confirm_check_timeout_ms.max(1)),
            },
            request_timeout: Duration::from_secs(self.request_timeout_secs.max(1)),
            wallet_timeout: Duration::from_secs(self.wallet_timeout_secs.max(1)),
        }
    }

    pub fn wallet_secret(&self) -> Option<String> {
        present(&self.wallet_secret)
    }
}

fn present(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// How long a submitted transaction is polled for a final status.
///
/// A check that outlives `check_timeout` counts as not final, so the whole
/// poll ends within `attempts * (check_timeout + delay)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    pub attempts: u32,
    pub delay: Duration,
    pub check_timeout: Duration,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            attempts: 20,
            delay: Duration::from_millis(1500),
            check_timeout: Duration::from_secs(5),
        }
    }
}

/// Immutable client configuration, read once at start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub rpc_url: String,
    pub horizon_url: String,
    pub network_passphrase: String,
    pub contract_id: Option<String>,
    /// Goal in stroops; the contract's own figure wins once read.
    pub goal: i128,
    pub readonly_account: Option<String>,
    /// Destination of the payment phase.
    pub recipient: Option<String>,
    pub sync_interval: Duration,
    pub confirmation: ConfirmationPolicy,
    /// Upper bound on any one ledger call, status checks included.
    pub request_timeout: Duration,
    pub wallet_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rpc_url: TESTNET_RPC_URL.into(),
            horizon_url: TESTNET_HORIZON_URL.into(),
            network_passphrase: TESTNET_PASSPHRASE.into(),
            contract_id: None,
            goal: 100 * amount::STROOPS_PER_XLM,
            readonly_account: None,
            recipient: None,
            sync_interval: Duration::from_secs(5),
            confirmation: ConfirmationPolicy::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            wallet_timeout: DEFAULT_WALLET_TIMEOUT,
        }
    }
}
