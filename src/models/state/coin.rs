use std::fmt::Display;

use serde::Deserialize;
use serde::Serialize;

use crate::models::blockchain::glyph::ContractType;
use crate::models::blockchain::outpoint::Outpoint;
use crate::models::blockchain::outpoint::TokenRef;
use crate::models::blockchain::outpoint::Txid;
use crate::models::blockchain::script::Script;
use crate::models::blockchain::transaction::TxOutput;

/// Whether the transaction that created a coin is known to be confirmed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::EnumIs)]
#[serde(rename_all = "snake_case")]
pub enum CoinOrigin {
    Confirmed,

    /// created by a transaction this wallet broadcast, not yet observed
    /// confirmed
    Unconfirmed,
}

/// Spend state of a coin.
///
/// `Submitted` and `Spent` are kept apart: a submitted spend may still be
/// dropped by the network, in which case reconciliation reverts the coin to
/// `Unspent`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::EnumIs)]
#[serde(rename_all = "snake_case", tag = "state", content = "txid")]
pub enum SpendState {
    Unspent,
    Submitted(Txid),
    Spent(Txid),
}

/// An output known to the wallet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Coin {
    pub outpoint: Outpoint,
    pub contract_type: ContractType,
    pub script: Script,
    pub value: u64,

    /// present iff `contract_type` is not native
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_ref: Option<TokenRef>,

    pub origin: CoinOrigin,
    pub spend: SpendState,
}

impl Coin {
    /// Coin for a spendable wallet output.
    ///
    /// Returns `None` for scripts that are not native, fungible or
    /// non-fungible, such as mint commitments.
    pub fn from_output(outpoint: Outpoint, output: &TxOutput, origin: CoinOrigin) -> Option<Self> {
        let kind = output.script.classify();
        Some(Self {
            outpoint,
            contract_type: kind.contract_type()?,
            script: output.script.clone(),
            value: output.value,
            token_ref: kind.token_ref(),
            origin,
            spend: SpendState::Unspent,
        })
    }

    pub fn spent(&self) -> bool {
        !self.spend.is_unspent()
    }

    pub fn owner_pubkey_hash(&self) -> Option<[u8; 20]> {
        self.script.classify().pubkey_hash().copied()
    }

    pub fn as_tx_output(&self) -> TxOutput {
        TxOutput::new(self.value, self.script.clone())
    }

    /// matches `contract_type` and, for tokens, `token_ref`
    pub fn holds(&self, contract_type: ContractType, token_ref: Option<&TokenRef>) -> bool {
        self.contract_type == contract_type
            && (contract_type.is_native() || self.token_ref.as_ref() == token_ref)
    }
}

impl Display for Coin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let token = match self.token_ref {
            Some(r) => format!(" ref {}", r.outpoint().short_ref()),
            None => String::new(),
        };
        let spend = match self.spend {
            SpendState::Unspent => "unspent".to_owned(),
            SpendState::Submitted(txid) => format!("submitted in {txid}"),
            SpendState::Spent(txid) => format!("spent in {txid}"),
        };
        write!(
            f,
            "{} {} {}{} ({:?}, {})",
            self.outpoint.short_ref(),
            self.contract_type,
            self.value,
            token,
            self.origin,
            spend
        )
    }
}
