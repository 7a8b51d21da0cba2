use secp256k1::PublicKey;
use secp256k1::Secp256k1;
use secp256k1::SecretKey;
use serde::Deserialize;
use serde::Serialize;

use crate::config_models::network::Network;
use crate::models::blockchain::address::Address;

/// Which of the wallet's two keys owns a coin.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum KeyRole {
    /// ordinary balance
    #[default]
    Primary,

    /// swap escrows and swap proceeds
    Swap,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum KeyError {
    #[error("invalid WIF encoding: {0}")]
    Wif(String),

    #[error("WIF key is for a different network")]
    WrongNetwork,

    #[error("key does not match the wallet's {0} address")]
    Mismatch(KeyRole),

    #[error("secp256k1: {0}")]
    Secp256k1(#[from] secp256k1::Error),
}

/// Decode a compressed-pubkey WIF private key.
pub fn secret_key_from_wif(wif: &str, network: Network) -> Result<SecretKey, KeyError> {
    let bytes = bs58::decode(wif.trim())
        .with_check(None)
        .into_vec()
        .map_err(|e| KeyError::Wif(e.to_string()))?;
    let (version, key) = match bytes.as_slice() {
        [version, key @ .., 0x01] if key.len() == 32 => (*version, key),
        [version, key @ ..] if key.len() == 32 => (*version, key),
        _ => return Err(KeyError::Wif(format!("unexpected length {}", bytes.len()))),
    };
    if version != network.wif_version() {
        return Err(KeyError::WrongNetwork);
    }
    Ok(SecretKey::from_slice(key)?)
}

/// WIF encoding of `key` with the compressed-pubkey flag.
pub fn secret_key_to_wif(key: &SecretKey, network: Network) -> String {
    let mut payload = Vec::with_capacity(34);
    payload.push(network.wif_version());
    payload.extend_from_slice(&key.secret_bytes());
    payload.push(0x01);
    bs58::encode(payload).with_check().into_string()
}

/// Private key material of an unlocked wallet.
#[derive(Clone)]
pub struct WalletKeys {
    primary: SecretKey,
    swap: SecretKey,
}

// never print key material
impl std::fmt::Debug for WalletKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletKeys").finish_non_exhaustive()
    }
}

impl WalletKeys {
    pub fn new(primary: SecretKey, swap: SecretKey) -> Self {
        Self { primary, swap }
    }

    pub fn from_wif(primary: &str, swap: &str, network: Network) -> Result<Self, KeyError> {
        Ok(Self::new(
            secret_key_from_wif(primary, network)?,
            secret_key_from_wif(swap, network)?,
        ))
    }

    pub fn secret_key(&self, role: KeyRole) -> &SecretKey {
        match role {
            KeyRole::Primary => &self.primary,
            KeyRole::Swap => &self.swap,
        }
    }

    pub fn public_key(&self, role: KeyRole) -> PublicKey {
        PublicKey::from_secret_key(&Secp256k1::signing_only(), self.secret_key(role))
    }

    pub fn address(&self, role: KeyRole, network: Network) -> Address {
        Address::from_public_key(network, &self.public_key(role))
    }
}
