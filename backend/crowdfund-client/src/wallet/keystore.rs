use async_trait::async_trait;
use ed25519_dalek::{Signer, SigningKey};
use stellar_xdr::curr::{
    DecoratedSignature, Signature as XdrSignature, SignatureHint, TransactionEnvelope,
};
use tokio::sync::RwLock;
use tracing::debug;

use super::{Selection, SignContext, WalletError, WalletProvider};
use crate::envelope;

/// Local wallet backed by ed25519 secret seeds (`S...` strkeys).
///
/// Selection offers the active key; `set_active` switches between the loaded
/// keys by address.
pub struct KeystoreWallet {
    keys: Vec<Key>,
    active: RwLock<usize>,
}

struct Key {
    address: String,
    signing: SigningKey,
}

impl KeystoreWallet {
    pub fn from_secrets<I, S>(secrets: I) -> Result<Self, WalletError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut keys = Vec::new();
        for secret in secrets {
            let secret = secret.as_ref().trim();
            let seed = stellar_strkey::ed25519::PrivateKey::from_string(secret)
                .map_err(|_| WalletError::Unavailable("invalid secret key".into()))?;
            let signing = SigningKey::from_bytes(&seed.0);
            let address = format!(
                "{}",
                stellar_strkey::ed25519::PublicKey(signing.verifying_key().to_bytes())
            );
            keys.push(Key { address, signing });
        }
        Ok(Self {
            keys,
            active: RwLock::new(0),
        })
    }

    /// A wallet with nothing to offer; every selection reports `Unavailable`.
    pub fn empty() -> Self {
        Self {
            keys: Vec::new(),
            active: RwLock::new(0),
        }
    }

    async fn active_key(&self) -> Result<&Key, WalletError> {
        let index = *self.active.read().await;
        self.keys
            .get(index)
            .ok_or_else(|| WalletError::Unavailable("no signing keys configured".into()))
    }
}

#[async_trait]
impl WalletProvider for KeystoreWallet {
    async fn open_selection(&self) -> Result<Selection, WalletError> {
        let key = self.active_key().await?;
        Ok(Selection::Chosen(key.address.clone()))
    }

    async fn set_active(&self, wallet_id: &str) -> Result<(), WalletError> {
        let index = self
            .keys
            .iter()
            .position(|key| key.address == wallet_id)
            .ok_or_else(|| WalletError::Unavailable(format!("unknown key {wallet_id}")))?;
        *self.active.write().await = index;
        Ok(())
    }

    async fn address(&self) -> Result<String, WalletError> {
        Ok(self.active_key().await?.address.clone())
    }

    async fn sign(&self, envelope_xdr: &str, context: &SignContext) -> Result<String, WalletError> {
        let key = self.active_key().await?;
        if key.address != context.address {
            return Err(WalletError::SigningRejected(format!(
                "active key is {}, not {}",
                key.address, context.address
            )));
        }

        let rejected = |e: envelope::EnvelopeError| WalletError::SigningRejected(e.to_string());
        let envelope = envelope::decode(envelope_xdr).map_err(rejected)?;
        let TransactionEnvelope::Tx(v1) = &envelope else {
            return Err(WalletError::SigningRejected(
                "only v1 transaction envelopes are supported".into(),
            ));
        };

        let hash = envelope::transaction_hash(&v1.tx, &context.network_passphrase)
            .map_err(rejected)?;
        let public = key.signing.verifying_key().to_bytes();
        let mut hint = [0u8; 4];
        hint.copy_from_slice(&public[28..]);
        let signature = key.signing.sign(&hash).to_bytes();

        let decorated = DecoratedSignature {
            hint: SignatureHint(hint),
            signature: XdrSignature(
                signature
                    .to_vec()
                    .try_into()
                    .map_err(|_| WalletError::SigningRejected("signature too long".into()))?,
            ),
        };
        debug!(address = %key.address, "signed envelope");

        let signed = envelope::add_signature(envelope, decorated).map_err(rejected)?;
        envelope::encode(&signed).map_err(rejected)
    }
}
