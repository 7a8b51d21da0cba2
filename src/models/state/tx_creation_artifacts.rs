use serde::Deserialize;
use serde::Serialize;

use super::coin::Coin;
use super::utxo_ledger::ClaimId;
use crate::models::blockchain::outpoint::Outpoint;
use crate::models::blockchain::outpoint::Txid;
use crate::models::blockchain::transaction::Transaction;

/// Wallet coins a transaction consumes and creates.
///
/// This is what reconciliation applies to the ledger once the transaction
/// is handed to the network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selected {
    /// wallet coins spent, in input order
    pub inputs: Vec<Coin>,

    /// outputs locked to one of the wallet's keys, as unconfirmed coins
    pub outputs: Vec<Coin>,
}

impl Selected {
    pub fn input_outpoints(&self) -> Vec<Outpoint> {
        self.inputs.iter().map(|c| c.outpoint).collect()
    }
}

/// Objects created by the transaction builders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxCreationArtifacts {
    pub transaction: Transaction,
    pub selected: Selected,

    /// sum of inputs minus sum of outputs
    pub fee: u64,

    /// fee-basis size: the serialized length with worst case signatures
    pub size: usize,

    /// reservation held on the consumed coins until broadcast or abandon.
    /// `None` for dry runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim: Option<ClaimId>,
}

impl TxCreationArtifacts {
    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    pub fn txid(&self) -> Txid {
        self.transaction.txid()
    }

    pub fn to_hex(&self) -> String {
        self.transaction.to_hex()
    }

    pub fn is_dry_run(&self) -> bool {
        self.claim.is_none()
    }
}
