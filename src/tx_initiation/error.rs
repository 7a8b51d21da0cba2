//! provides error types related to building and settling transactions.

use serde::Deserialize;
use serde::Serialize;

use crate::models::blockchain::address::AddressError;
use crate::models::blockchain::encoding::DecodeError;
use crate::models::blockchain::outpoint::TokenRef;
use crate::models::blockchain::payload::PayloadError;
use crate::models::blockchain::sighash::SigningError;
use crate::models::state::swap::swap_store::StoreError;
use crate::models::state::wallet::keys::KeyError;
use crate::models::state::wallet::WalletError;

/// enumerates the reasons a swap cannot be built or combined
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[non_exhaustive]
pub enum SwapError {
    #[error("asset no longer held: {0}")]
    AssetNotHeld(String),

    #[error("malformed swap proposal: {0}")]
    Malformed(String),

    #[error("invalid script pairing: {0}")]
    InvalidPairing(String),

    #[error("swap {0} is not pending")]
    NotPending(u64),

    #[error("no swap record with id {0}")]
    UnknownSwap(u64),
}

/// Structured tag of an [EngineError], for callers that render their own
/// messages.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
pub enum ErrorKind {
    InsufficientFunds,
    TokenNotFound,
    InvalidAddress,
    RelationNotOwned,
    PayloadTooLarge,
    WalletLocked,
    SwapError,
    NetworkError,
    EncodingError,
    PersistenceError,
}

/// enumerates everything that can go wrong building, signing, broadcasting
/// or reconciling a transaction
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[non_exhaustive]
pub enum EngineError {
    #[error(
        "insufficient funds. requested: {}, available: {}",
        requested,
        available
    )]
    InsufficientFunds { requested: u64, available: u64 },

    #[error("no spendable coin holds token {token_ref}")]
    TokenNotFound { token_ref: TokenRef },

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("relation {token_ref} is not held by this wallet")]
    RelationNotOwned { token_ref: TokenRef },

    #[error("payload too large: {size} bytes exceeds {max}")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("wallet is locked")]
    WalletLocked,

    #[error(transparent)]
    Swap(#[from] SwapError),

    #[error("network error: {0}")]
    Network(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("persistence error: {0}")]
    Persistence(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            Self::TokenNotFound { .. } => ErrorKind::TokenNotFound,
            Self::InvalidAddress(_) => ErrorKind::InvalidAddress,
            Self::RelationNotOwned { .. } => ErrorKind::RelationNotOwned,
            Self::PayloadTooLarge { .. } => ErrorKind::PayloadTooLarge,
            Self::WalletLocked => ErrorKind::WalletLocked,
            Self::Swap(_) => ErrorKind::SwapError,
            Self::Network(_) => ErrorKind::NetworkError,
            Self::Encoding(_) => ErrorKind::EncodingError,
            Self::Persistence(_) => ErrorKind::PersistenceError,
        }
    }

    /// shorthand for a [SwapError::AssetNotHeld]
    pub fn asset_not_held(reason: impl Into<String>) -> Self {
        Self::Swap(SwapError::AssetNotHeld(reason.into()))
    }

    pub fn malformed_swap(reason: impl Into<String>) -> Self {
        Self::Swap(SwapError::Malformed(reason.into()))
    }
}

impl From<WalletError> for EngineError {
    fn from(e: WalletError) -> Self {
        match e {
            WalletError::Locked => Self::WalletLocked,
            WalletError::Signing(s) => Self::Encoding(s.to_string()),
        }
    }
}

impl From<SigningError> for EngineError {
    fn from(e: SigningError) -> Self {
        Self::Encoding(e.to_string())
    }
}

impl From<DecodeError> for EngineError {
    fn from(e: DecodeError) -> Self {
        Self::Encoding(e.to_string())
    }
}

impl From<PayloadError> for EngineError {
    fn from(e: PayloadError) -> Self {
        Self::Encoding(e.to_string())
    }
}

impl From<AddressError> for EngineError {
    fn from(e: AddressError) -> Self {
        Self::InvalidAddress(e.to_string())
    }
}

impl From<KeyError> for EngineError {
    fn from(e: KeyError) -> Self {
        Self::InvalidAddress(e.to_string())
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::UnknownSwap(id) => Self::Swap(SwapError::UnknownSwap(id)),
            other => Self::Persistence(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_wallet_maps_to_wallet_locked() {
        let e: EngineError = WalletError::Locked.into();
        assert_eq!(ErrorKind::WalletLocked, e.kind());
        assert_eq!("wallet is locked", e.to_string());
    }

    #[test]
    fn swap_errors_render_their_cause() {
        let e = EngineError::asset_not_held("escrow spent");
        assert_eq!(ErrorKind::SwapError, e.kind());
        assert_eq!("asset no longer held: escrow spent", e.to_string());
    }

    #[test]
    fn errors_serialize_with_kind_and_detail() {
        let e = EngineError::InsufficientFunds {
            requested: 10,
            available: 3,
        };
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(10, json["InsufficientFunds"]["requested"]);
        assert_eq!("InsufficientFunds", e.kind().to_string());
    }
}
