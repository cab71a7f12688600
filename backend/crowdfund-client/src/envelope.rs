//! Transaction envelope construction and contract value decoding.
//!
//! Envelopes cross the wallet boundary as base64 XDR; everything else in the
//! crate handles them as typed `stellar_xdr` values.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha256};
use stellar_xdr::curr::{
    AccountId, Asset, ContractId, DecoratedSignature, Hash, HostFunction, Int128Parts,
    InvokeContractArgs, InvokeHostFunctionOp, Limits, Memo, MuxedAccount, Operation,
    OperationBody, PaymentOp, Preconditions, PublicKey, ReadXdr, ScAddress, ScSymbol, ScVal,
    SequenceNumber, StringM, TimeBounds, TimePoint, Transaction, TransactionEnvelope,
    TransactionExt, TransactionSignaturePayload, TransactionSignaturePayloadTaggedTransaction,
    TransactionV1Envelope, Uint256, VecM, WriteXdr,
};
use thiserror::Error;

use crate::ledger::Simulation;

/// Inclusion fee per operation, in stroops.
pub const BASE_FEE: u32 = 100;

/// Upper time bound placed on every envelope.
pub const TX_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("invalid account address {0}")]
    InvalidAccount(String),

    #[error("invalid contract id {0}")]
    InvalidContract(String),

    #[error("amount {0} stroops does not fit a payment operation")]
    AmountOutOfRange(i128),

    #[error("only v1 transaction envelopes are supported")]
    UnsupportedEnvelope,

    #[error("unexpected contract value: {0}")]
    UnexpectedValue(String),

    #[error("xdr: {0}")]
    Xdr(#[from] stellar_xdr::curr::Error),

    #[error("base64: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Account an envelope is sourced from, with its current on-ledger sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceAccount {
    pub address: String,
    pub sequence: i64,
}

/// Campaign figures as returned by the contract's `get_campaign`.
/// `goal` is optional because older deployments may not report it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CampaignFields {
    pub goal: Option<i128>,
    pub total_raised: i128,
    pub donors: u32,
}

// ─────────────────────────────────────────────────────────
// Builders
// ─────────────────────────────────────────────────────────

/// Native-asset payment from `source` to `destination`.
pub fn payment(
    source: &SourceAccount,
    destination: &str,
    stroops: i128,
) -> Result<TransactionEnvelope, EnvelopeError> {
    let amount = i64::try_from(stroops)
        .ok()
        .filter(|amount| *amount > 0)
        .ok_or(EnvelopeError::AmountOutOfRange(stroops))?;

    let op = Operation {
        source_account: None,
        body: OperationBody::Payment(PaymentOp {
            destination: muxed_account(destination)?,
            asset: Asset::Native,
            amount,
        }),
    };
    build(source, op, BASE_FEE)
}

/// Contract invocation of `function` with `args`. Resource data and auth are
/// left empty; run the result through a simulation and [`assemble`].
pub fn invoke_contract(
    source: &SourceAccount,
    contract_id: &str,
    function: &str,
    args: Vec<ScVal>,
) -> Result<TransactionEnvelope, EnvelopeError> {
    let function_name = ScSymbol(StringM::try_from(function)?);
    let op = Operation {
        source_account: None,
        body: OperationBody::InvokeHostFunction(InvokeHostFunctionOp {
            host_function: HostFunction::InvokeContract(InvokeContractArgs {
                contract_address: contract_address(contract_id)?,
                function_name,
                args: args.try_into()?,
            }),
            auth: VecM::default(),
        }),
    };
    build(source, op, BASE_FEE)
}

/// Apply a simulation to an unsigned invocation: resource footprint, the
/// resource fee on top of the inclusion fee and any authorization entries
/// the simulation produced.
pub fn assemble(
    envelope: TransactionEnvelope,
    simulation: &Simulation,
) -> Result<TransactionEnvelope, EnvelopeError> {
    let TransactionEnvelope::Tx(mut v1) = envelope else {
        return Err(EnvelopeError::UnsupportedEnvelope);
    };

    if let Some(data) = &simulation.transaction_data {
        v1.tx.ext = TransactionExt::V1(data.clone());
    }

    let resource_fee = u32::try_from(simulation.min_resource_fee).unwrap_or(u32::MAX);
    v1.tx.fee = v1.tx.fee.saturating_add(resource_fee);

    if !simulation.auth.is_empty() {
        let mut operations = v1.tx.operations.to_vec();
        for op in operations.iter_mut() {
            if let OperationBody::InvokeHostFunction(invoke) = &mut op.body {
                if invoke.auth.is_empty() {
                    invoke.auth = simulation.auth.clone().try_into()?;
                }
            }
        }
        v1.tx.operations = operations.try_into()?;
    }

    Ok(TransactionEnvelope::Tx(v1))
}

fn build(
    source: &SourceAccount,
    op: Operation,
    fee: u32,
) -> Result<TransactionEnvelope, EnvelopeError> {
    let tx = Transaction {
        source_account: muxed_account(&source.address)?,
        fee,
        seq_num: SequenceNumber(source.sequence.saturating_add(1)),
        cond: Preconditions::Time(TimeBounds {
            min_time: TimePoint(0),
            max_time: TimePoint(unix_now().saturating_add(TX_TIMEOUT_SECS)),
        }),
        memo: Memo::None,
        operations: vec![op].try_into()?,
        ext: TransactionExt::V0,
    };
    Ok(TransactionEnvelope::Tx(TransactionV1Envelope {
        tx,
        signatures: VecM::default(),
    }))
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

// ─────────────────────────────────────────────────────────
// Addresses and arguments
// ─────────────────────────────────────────────────────────

fn account_key(address: &str) -> Result<[u8; 32], EnvelopeError> {
    stellar_strkey::ed25519::PublicKey::from_string(address)
        .map(|key| key.0)
        .map_err(|_| EnvelopeError::InvalidAccount(address.to_string()))
}

fn muxed_account(address: &str) -> Result<MuxedAccount, EnvelopeError> {
    Ok(MuxedAccount::Ed25519(Uint256(account_key(address)?)))
}

fn contract_address(contract_id: &str) -> Result<ScAddress, EnvelopeError> {
    let contract = stellar_strkey::Contract::from_string(contract_id)
        .map_err(|_| EnvelopeError::InvalidContract(contract_id.to_string()))?;
    Ok(ScAddress::Contract(ContractId(Hash(contract.0))))
}

/// `Address` argument for an account (`G...`) strkey.
pub fn address_arg(address: &str) -> Result<ScVal, EnvelopeError> {
    Ok(ScVal::Address(ScAddress::Account(AccountId(
        PublicKey::PublicKeyTypeEd25519(Uint256(account_key(address)?)),
    ))))
}

pub fn i128_arg(value: i128) -> ScVal {
    ScVal::I128(Int128Parts {
        hi: (value >> 64) as i64,
        lo: value as u64,
    })
}

// ─────────────────────────────────────────────────────────
// Encoding
// ─────────────────────────────────────────────────────────

pub fn encode(envelope: &TransactionEnvelope) -> Result<String, EnvelopeError> {
    Ok(STANDARD.encode(envelope.to_xdr(Limits::none())?))
}

pub fn decode(xdr: &str) -> Result<TransactionEnvelope, EnvelopeError> {
    decode_xdr(xdr)
}

/// Decode any base64 XDR value returned by the RPC.
pub fn decode_xdr<T: ReadXdr>(xdr: &str) -> Result<T, EnvelopeError> {
    let bytes = STANDARD.decode(xdr.trim())?;
    Ok(T::from_xdr(bytes, Limits::none())?)
}

// ─────────────────────────────────────────────────────────
// Signing payload
// ─────────────────────────────────────────────────────────

/// Network id: SHA-256 of the network passphrase.
pub fn network_id(passphrase: &str) -> [u8; 32] {
    Sha256::digest(passphrase.as_bytes()).into()
}

/// Hash that signers sign for `tx` on the given network.
pub fn transaction_hash(tx: &Transaction, passphrase: &str) -> Result<[u8; 32], EnvelopeError> {
    let payload = TransactionSignaturePayload {
        network_id: Hash(network_id(passphrase)),
        tagged_transaction: TransactionSignaturePayloadTaggedTransaction::Tx(tx.clone()),
    };
    Ok(Sha256::digest(payload.to_xdr(Limits::none())?).into())
}

/// Append a signature to a v1 envelope.
pub fn add_signature(
    envelope: TransactionEnvelope,
    signature: DecoratedSignature,
) -> Result<TransactionEnvelope, EnvelopeError> {
    let TransactionEnvelope::Tx(mut v1) = envelope else {
        return Err(EnvelopeError::UnsupportedEnvelope);
    };
    let mut signatures = v1.signatures.to_vec();
    signatures.push(signature);
    v1.signatures = signatures.try_into()?;
    Ok(TransactionEnvelope::Tx(v1))
}

// ─────────────────────────────────────────────────────────
// Contract values
// ─────────────────────────────────────────────────────────

/// Decode the `Campaign` map returned by `get_campaign`.
pub fn decode_campaign(value: &ScVal) -> Result<CampaignFields, EnvelopeError> {
    let ScVal::Map(Some(map)) = value else {
        return Err(EnvelopeError::UnexpectedValue(format!(
            "expected campaign map, got {value:?}"
        )));
    };

    let mut goal = None;
    let mut total_raised = None;
    let mut donors = None;
    for entry in map.0.iter() {
        let ScVal::Symbol(key) = &entry.key else {
            continue;
        };
        match key.0.to_utf8_string_lossy().as_str() {
            "goal" => goal = scval_to_i128(&entry.val),
            "total_raised" => {
                total_raised = Some(scval_to_i128(&entry.val).ok_or_else(|| {
                    EnvelopeError::UnexpectedValue(format!("total_raised is {:?}", entry.val))
                })?)
            }
            "donors" => donors = scval_to_i128(&entry.val).and_then(|n| u32::try_from(n).ok()),
            _ => {}
        }
    }

    // A campaign that has not recorded anything yet may omit the total.
    let total_raised = total_raised.unwrap_or(0);
    if total_raised < 0 {
        return Err(EnvelopeError::UnexpectedValue(format!(
            "negative total_raised {total_raised}"
        )));
    }

    Ok(CampaignFields {
        goal: goal.filter(|goal| *goal >= 0),
        total_raised,
        donors: donors.unwrap_or_default(),
    })
}

fn scval_to_i128(value: &ScVal) -> Option<i128> {
    match value {
        ScVal::I128(parts) => Some(((parts.hi as i128) << 64) | parts.lo as i128),
        ScVal::U32(n) => Some(i128::from(*n)),
        ScVal::I32(n) => Some(i128::from(*n)),
        ScVal::U64(n) => Some(i128::from(*n)),
        ScVal::I64(n) => Some(i128::from(*n)),
        _ => None,
    }
}
