//! Client core for the crowdfund contract.
//!
//! - [`amount`]: decimal XLM strings to stroops and back.
//! - [`wallet`]: the connected identity and its signer.
//! - [`sync`]: keeps the cached campaign figures in step with the contract.
//! - [`orchestrator`]: the two-phase donation (payment, then `donate`).
//! - [`client`]: the facade a front end drives.

pub mod amount;
pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod ledger;
pub mod orchestrator;
pub mod state;
pub mod sync;
pub mod wallet;

pub use client::{DonationClient, Snapshot};
pub use config::{ClientConfig, ConfirmationPolicy, Settings};
pub use error::{DonationError, FailureKind, PreconditionFailure};
pub use state::{AttemptStatus, CampaignAggregate, TransactionAttempt};
pub use sync::SyncHandle;
