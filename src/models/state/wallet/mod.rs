pub mod keys;
pub mod wallet_identity;

use secp256k1::PublicKey;

use crate::models::blockchain::script::Script;
use crate::models::blockchain::sighash::SighashType;
use crate::models::blockchain::sighash::SigningError;
use crate::models::blockchain::transaction::Transaction;
use keys::KeyRole;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum WalletError {
    #[error("wallet is locked")]
    Locked,

    #[error(transparent)]
    Signing(#[from] SigningError),
}

/// Produces signatures for inputs owned by one of the wallet's keys.
///
/// Implementations without key material available must fail with
/// [WalletError::Locked]; callers retry the whole build after unlocking.
pub trait SigningService {
    fn public_key(&self, role: KeyRole) -> Result<PublicKey, WalletError>;

    /// DER signature plus hash type byte for input `index` of `tx`, spending
    /// an output locked by `script_code` that holds `value`.
    fn sign(
        &self,
        role: KeyRole,
        tx: &Transaction,
        index: usize,
        script_code: &Script,
        value: u64,
        sighash_type: SighashType,
    ) -> Result<Vec<u8>, WalletError>;
}
