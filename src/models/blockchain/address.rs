use std::fmt;
use std::str::FromStr;

use ripemd::Ripemd160;
use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;

use crate::config_models::network::Network;

/// ripemd160(sha256(data))
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(data);
    Ripemd160::digest(sha).into()
}

/// errors from parsing a base58check address
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum AddressError {
    #[error("base58check decoding failed: {0}")]
    Base58(String),

    #[error("expected 21 bytes, got {0}")]
    Length(usize),

    #[error("unknown address version byte {0:#04x}")]
    UnknownVersion(u8),
}

/// A pay-to-pubkey-hash address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Address {
    network: Network,
    pubkey_hash: [u8; 20],
}

impl Address {
    pub fn new(network: Network, pubkey_hash: [u8; 20]) -> Self {
        Self {
            network,
            pubkey_hash,
        }
    }

    pub fn from_public_key(network: Network, public_key: &secp256k1::PublicKey) -> Self {
        Self::new(network, hash160(&public_key.serialize()))
    }

    pub fn pubkey_hash(&self) -> &[u8; 20] {
        &self.pubkey_hash
    }

    pub fn network(&self) -> Network {
        self.network
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut payload = Vec::with_capacity(21);
        payload.push(self.network.address_version());
        payload.extend_from_slice(&self.pubkey_hash);
        write!(f, "{}", bs58::encode(payload).with_check().into_string())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s)
            .with_check(None)
            .into_vec()
            .map_err(|e| AddressError::Base58(e.to_string()))?;
        if bytes.len() != 21 {
            return Err(AddressError::Length(bytes.len()));
        }
        let network =
            Network::from_address_version(bytes[0]).ok_or(AddressError::UnknownVersion(bytes[0]))?;
        let mut pubkey_hash = [0u8; 20];
        pubkey_hash.copy_from_slice(&bytes[1..]);
        Ok(Self::new(network, pubkey_hash))
    }
}

impl Serialize for Address {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
