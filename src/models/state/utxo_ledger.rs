//! Local record of wallet coins and the claims in-flight builds hold on them.
//!
//! A coin is selectable only while it is `Unspent` and carries no claim. A
//! claim is taken in the same critical section as selection (callers hold the
//! ledger lock across both), so two concurrent builds can never return
//! transactions spending the same coin.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fmt::Display;

use itertools::Itertools;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::warn;

use super::coin::Coin;
use super::coin::CoinOrigin;
use super::coin::SpendState;
use crate::models::blockchain::glyph::ContractType;
use crate::models::blockchain::outpoint::Outpoint;
use crate::models::blockchain::outpoint::TokenRef;
use crate::models::blockchain::outpoint::Txid;
use crate::models::blockchain::script::Script;

/// Identifies one in-flight build.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClaimId(u64);

impl Display for ClaimId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "claim#{}", self.0)
    }
}

/// Who holds a reservation on a coin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Claim {
    /// a transaction built but not yet broadcast or abandoned
    Build(ClaimId),

    /// the escrow of a pending swap proposal, keyed by swap record id
    Swap(u64),
}

impl Display for Claim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Build(id) => write!(f, "{id}"),
            Self::Swap(id) => write!(f, "swap#{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum LedgerError {
    #[error("coin {outpoint} is already claimed by {holder}")]
    AlreadyClaimed { outpoint: Outpoint, holder: Claim },

    #[error("coin {0} is not in the ledger")]
    UnknownCoin(Outpoint),

    #[error("coin {0} is already spent")]
    AlreadySpent(Outpoint),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "LedgerSnapshot", into = "LedgerSnapshot")]
pub struct UtxoLedger {
    coins: BTreeMap<Outpoint, Coin>,
    claims: HashMap<Outpoint, Claim>,
    next_claim: u64,
}

/// Serialized form of the ledger. Claims are process-local and not kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LedgerSnapshot {
    coins: Vec<Coin>,
}

impl From<LedgerSnapshot> for UtxoLedger {
    fn from(snapshot: LedgerSnapshot) -> Self {
        Self::from_coins(snapshot.coins)
    }
}

impl From<UtxoLedger> for LedgerSnapshot {
    fn from(ledger: UtxoLedger) -> Self {
        Self {
            coins: ledger.coins.into_values().collect(),
        }
    }
}

impl UtxoLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_coins(coins: impl IntoIterator<Item = Coin>) -> Self {
        let mut ledger = Self::new();
        for coin in coins {
            ledger.insert(coin);
        }
        ledger
    }

    /// Insert a coin.
    ///
    /// A coin already present keeps its spend state; only a confirmed origin
    /// replaces an unconfirmed one.
    pub fn insert(&mut self, coin: Coin) {
        match self.coins.get_mut(&coin.outpoint) {
            Some(existing) => {
                if coin.origin.is_confirmed() {
                    existing.origin = CoinOrigin::Confirmed;
                }
            }
            None => {
                debug!(outpoint = %coin.outpoint, contract_type = %coin.contract_type, value = coin.value, "ledger insert");
                self.coins.insert(coin.outpoint, coin);
            }
        }
    }

    pub fn get(&self, outpoint: &Outpoint) -> Option<&Coin> {
        self.coins.get(outpoint)
    }

    pub fn coins(&self) -> impl Iterator<Item = &Coin> {
        self.coins.values()
    }

    pub fn len(&self) -> usize {
        self.coins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coins.is_empty()
    }

    pub fn claim_of(&self, outpoint: &Outpoint) -> Option<Claim> {
        self.claims.get(outpoint).copied()
    }

    /// Unspent, unclaimed coins of `contract_type` (and `token_ref` for
    /// tokens) locked by one of `scripts`.
    pub fn available<'a>(
        &'a self,
        contract_type: ContractType,
        token_ref: Option<&'a TokenRef>,
        scripts: &'a [Script],
    ) -> impl Iterator<Item = &'a Coin> + 'a {
        self.coins.values().filter(move |c| {
            !c.spent()
                && !self.claims.contains_key(&c.outpoint)
                && c.holds(contract_type, token_ref)
                && scripts.contains(&c.script)
        })
    }

    /// Sum of [Self::available] values.
    pub fn balance(
        &self,
        contract_type: ContractType,
        token_ref: Option<&TokenRef>,
        scripts: &[Script],
    ) -> u64 {
        self.available(contract_type, token_ref, scripts)
            .map(|c| c.value)
            .sum()
    }

    /// Reserve a fresh build claim id.
    pub fn new_claim_id(&mut self) -> ClaimId {
        self.next_claim += 1;
        ClaimId(self.next_claim)
    }

    /// Claim every outpoint for `claim`, or none of them.
    pub fn claim(&mut self, outpoints: &[Outpoint], claim: Claim) -> Result<(), LedgerError> {
        for outpoint in outpoints {
            let coin = self
                .coins
                .get(outpoint)
                .ok_or(LedgerError::UnknownCoin(*outpoint))?;
            if coin.spent() {
                return Err(LedgerError::AlreadySpent(*outpoint));
            }
            if let Some(holder) = self.claims.get(outpoint).filter(|h| **h != claim) {
                return Err(LedgerError::AlreadyClaimed {
                    outpoint: *outpoint,
                    holder: *holder,
                });
            }
        }
        for outpoint in outpoints {
            self.claims.insert(*outpoint, claim);
        }
        debug!(%claim, coins = outpoints.len(), "claimed");
        Ok(())
    }

    /// Move every reservation held by `from` to `to`.
    pub fn transfer_claim(&mut self, from: Claim, to: Claim) {
        for holder in self.claims.values_mut().filter(|h| **h == from) {
            *holder = to;
        }
    }

    /// Drop every reservation held by `claim`. Returns how many were held.
    pub fn release(&mut self, claim: Claim) -> usize {
        let before = self.claims.len();
        self.claims.retain(|_, holder| *holder != claim);
        let released = before - self.claims.len();
        if released > 0 {
            debug!(%claim, released, "released claim");
        }
        released
    }

    /// Drop the reservations on `outpoints`, whoever holds them.
    pub fn release_outpoints(&mut self, outpoints: &[Outpoint]) {
        for outpoint in outpoints {
            self.claims.remove(outpoint);
        }
    }

    /// Outpoints currently held by `claim`, in order.
    pub fn claimed_by(&self, claim: Claim) -> Vec<Outpoint> {
        self.claims
            .iter()
            .filter(|(_, holder)| **holder == claim)
            .map(|(outpoint, _)| *outpoint)
            .sorted()
            .collect()
    }

    /// Record that `txid`, spending `outpoints`, was handed to the network.
    pub fn mark_submitted(&mut self, outpoints: &[Outpoint], txid: Txid) {
        for outpoint in outpoints {
            match self.coins.get_mut(outpoint) {
                Some(coin) if coin.spend.is_unspent() => coin.spend = SpendState::Submitted(txid),
                Some(coin) => warn!(%outpoint, spend = ?coin.spend, "submitting an already spent coin"),
                None => {}
            }
        }
    }

    /// Settle a spend observed on chain.
    ///
    /// The coin's claim, if any, is dropped: a settled coin can never be
    /// selected again.
    pub fn mark_spent(&mut self, outpoint: &Outpoint, txid: Txid) {
        if let Some(coin) = self.coins.get_mut(outpoint) {
            coin.spend = SpendState::Spent(txid);
        }
        self.claims.remove(outpoint);
    }

    /// Revert a submitted spend that never reached the chain.
    pub fn revert_submitted(&mut self, outpoint: &Outpoint) {
        if let Some(coin) = self.coins.get_mut(outpoint) {
            if coin.spend.is_submitted() {
                debug!(%outpoint, "reverting dropped spend");
                coin.spend = SpendState::Unspent;
            }
        }
    }

    /// Drop an unconfirmed coin whose creating transaction never reached the
    /// chain. Confirmed or claimed coins are kept.
    pub fn remove_unconfirmed(&mut self, outpoint: &Outpoint) -> bool {
        let removable = self.coins.get(outpoint).is_some_and(|c| c.origin.is_unconfirmed())
            && !self.claims.contains_key(outpoint);
        if removable {
            debug!(%outpoint, "removing vanished coin");
            self.coins.remove(outpoint);
        }
        removable
    }

    pub fn mark_confirmed(&mut self, outpoint: &Outpoint) {
        if let Some(coin) = self.coins.get_mut(outpoint) {
            coin.origin = CoinOrigin::Confirmed;
        }
    }

    /// Txid of this wallet's submitted or settled spend of `outpoint`.
    pub fn own_spend_of(&self, outpoint: &Outpoint) -> Option<Txid> {
        match self.coins.get(outpoint)?.spend {
            SpendState::Submitted(txid) | SpendState::Spent(txid) => Some(txid),
            SpendState::Unspent => None,
        }
    }

    /// Coins whose state depends on a pending network outcome.
    pub fn unsettled(&self) -> Vec<Coin> {
        self.coins
            .values()
            .filter(|c| c.spend.is_submitted() || c.origin.is_unconfirmed())
            .cloned()
            .collect()
    }
}
