use secp256k1::PublicKey;
use serde::Deserialize;
use serde::Serialize;
use tracing::info;

use super::keys::KeyError;
use super::keys::KeyRole;
use super::keys::WalletKeys;
use super::SigningService;
use super::WalletError;
use crate::config_models::network::Network;
use crate::models::blockchain::address::Address;
use crate::models::blockchain::glyph::ContractType;
use crate::models::blockchain::outpoint::TokenRef;
use crate::models::blockchain::script::p2pkh_script;
use crate::models::blockchain::script::script_for;
use crate::models::blockchain::script::Script;
use crate::models::blockchain::sighash::sign_input;
use crate::models::blockchain::sighash::SighashType;
use crate::models::blockchain::transaction::Transaction;

/// The public half of a wallet, plus its keys while unlocked.
///
/// Builders only need the addresses to select and price a transaction; the
/// keys are consulted when signing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletIdentity {
    pub address: Address,
    pub swap_address: Address,

    #[serde(skip)]
    keys: Option<WalletKeys>,
}

impl WalletIdentity {
    /// Unlocked wallet over `keys`.
    pub fn from_keys(keys: WalletKeys, network: Network) -> Self {
        Self {
            address: keys.address(KeyRole::Primary, network),
            swap_address: keys.address(KeyRole::Swap, network),
            keys: Some(keys),
        }
    }

    /// Locked wallet that can select and price but not sign.
    pub fn watch_only(address: Address, swap_address: Address) -> Self {
        Self {
            address,
            swap_address,
            keys: None,
        }
    }

    pub fn network(&self) -> Network {
        self.address.network()
    }

    pub fn is_locked(&self) -> bool {
        self.keys.is_none()
    }

    pub fn lock(&mut self) {
        if self.keys.take().is_some() {
            info!(address = %self.address, "wallet locked");
        }
    }

    /// Install key material, checking that it matches both addresses.
    pub fn unlock(&mut self, keys: WalletKeys) -> Result<(), KeyError> {
        for role in [KeyRole::Primary, KeyRole::Swap] {
            let expected = self.address_for(role);
            if keys.address(role, self.network()).pubkey_hash() != expected.pubkey_hash() {
                return Err(KeyError::Mismatch(role));
            }
        }
        self.keys = Some(keys);
        info!(address = %self.address, "wallet unlocked");
        Ok(())
    }

    pub fn address_for(&self, role: KeyRole) -> &Address {
        match role {
            KeyRole::Primary => &self.address,
            KeyRole::Swap => &self.swap_address,
        }
    }

    /// role of the key with this pubkey hash, if it is one of ours
    pub fn role_of(&self, pubkey_hash: &[u8; 20]) -> Option<KeyRole> {
        if self.address.pubkey_hash() == pubkey_hash {
            Some(KeyRole::Primary)
        } else if self.swap_address.pubkey_hash() == pubkey_hash {
            Some(KeyRole::Swap)
        } else {
            None
        }
    }

    /// role owning a locking script, if it is one of ours
    pub fn owner_of(&self, script: &Script) -> Option<KeyRole> {
        self.role_of(script.classify().pubkey_hash()?)
    }

    /// Script a coin of `contract_type` would have under `role`.
    pub fn script_for(
        &self,
        role: KeyRole,
        contract_type: ContractType,
        token_ref: Option<&TokenRef>,
    ) -> Option<Script> {
        script_for(contract_type, self.address_for(role), token_ref)
    }

    pub fn native_script(&self, role: KeyRole) -> Script {
        p2pkh_script(self.address_for(role))
    }

    fn keys(&self) -> Result<&WalletKeys, WalletError> {
        self.keys.as_ref().ok_or(WalletError::Locked)
    }
}

impl SigningService for WalletIdentity {
    fn public_key(&self, role: KeyRole) -> Result<PublicKey, WalletError> {
        Ok(self.keys()?.public_key(role))
    }

    fn sign(
        &self,
        role: KeyRole,
        tx: &Transaction,
        index: usize,
        script_code: &Script,
        value: u64,
        sighash_type: SighashType,
    ) -> Result<Vec<u8>, WalletError> {
        let keys = self.keys()?;
        Ok(sign_input(
            tx,
            index,
            script_code,
            value,
            sighash_type,
            keys.secret_key(role),
        )?)
    }
}
