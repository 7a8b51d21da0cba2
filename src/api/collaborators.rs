//! Services the engine consumes but does not implement.
//!
//! The engine never talks to a node or a content host directly. Callers
//! supply implementations of these traits: an electrum-style client in the
//! wallet, an in-memory chain in tests.

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;

use crate::models::blockchain::outpoint::Outpoint;
use crate::models::blockchain::outpoint::Txid;
use crate::models::blockchain::transaction::Transaction;
use crate::models::blockchain::transaction::TxOutput;
use crate::tx_initiation::error::EngineError;

/// What the chain knows about one output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputStatus {
    pub output: TxOutput,

    /// transaction spending the output, confirmed or in the mempool
    pub spent_by: Option<Txid>,

    /// whether the transaction creating the output is confirmed
    pub confirmed: bool,
}

/// Broadcast and query access to the chain.
///
/// Implementations report rejections and transport failures as
/// [EngineError::Network]. A timed out broadcast must be reported as an
/// error as well: the engine treats it as an unknown outcome and settles it
/// from chain state later.
#[async_trait]
pub trait ChainService: Send + Sync {
    /// Submit a raw transaction, returning its txid.
    async fn broadcast(&self, raw_tx_hex: &str) -> Result<Txid, EngineError>;

    /// Status of `outpoint`, or `None` if no known transaction created it.
    async fn fetch_output(&self, outpoint: Outpoint) -> Result<Option<OutputStatus>, EngineError>;

    /// A transaction by id, or `None` if the service has never seen it.
    async fn fetch_transaction(&self, txid: Txid) -> Result<Option<Transaction>, EngineError>;

    /// Whether `txid` is confirmed. `None` if the transaction is unknown.
    async fn is_confirmed(&self, txid: Txid) -> Result<Option<bool>, EngineError> {
        let Some(tx) = self.fetch_transaction(txid).await? else {
            return Ok(None);
        };
        if tx.outputs.is_empty() {
            return Ok(Some(false));
        }
        Ok(self
            .fetch_output(Outpoint::new(txid, 0))
            .await?
            .map(|status| status.confirmed))
    }
}

/// Remote storage for mint content too large to embed.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Content address `bytes` would be stored under, computed locally.
    fn address_of(&self, bytes: &[u8]) -> String;

    /// Store `bytes`, returning their content address.
    async fn upload(&self, bytes: Vec<u8>) -> Result<String, EngineError>;
}
