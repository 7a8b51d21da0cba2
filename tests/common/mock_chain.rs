use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use glyph_engine::api::export::ChainService;
use glyph_engine::api::export::Coin;
use glyph_engine::api::export::CoinOrigin;
use glyph_engine::api::export::EngineError;
use glyph_engine::api::export::Outpoint;
use glyph_engine::api::export::OutputStatus;
use glyph_engine::api::export::Transaction;
use glyph_engine::api::export::Txid;
use glyph_engine::models::blockchain::script::Script;
use glyph_engine::models::blockchain::sighash::verify_input;
use glyph_engine::models::blockchain::transaction::TxOutput;

#[derive(Debug, Default)]
struct ChainState {
    outputs: HashMap<Outpoint, (TxOutput, Option<Txid>)>,
    transactions: HashMap<Txid, Transaction>,
    confirmed: HashSet<Txid>,
    next_funding: u32,
    lose_replies: bool,
}

/// In-memory chain: accepts a transaction only if every input exists, is
/// unspent and carries a valid signature, and outputs do not exceed inputs.
#[derive(Debug, Default)]
pub struct MockChain {
    state: Mutex<ChainState>,
}

impl MockChain {
    /// Create a confirmed output paying `value` to `script`.
    pub fn fund(&self, script: Script, value: u64) -> Coin {
        let mut state = self.state.lock().unwrap();
        state.next_funding += 1;
        let tx = Transaction {
            outputs: vec![TxOutput::new(value, script)],
            lock_time: state.next_funding,
            ..Default::default()
        };
        let txid = tx.txid();
        let outpoint = tx.outpoint(0);
        state.outputs.insert(outpoint, (tx.outputs[0].clone(), None));
        state.transactions.insert(txid, tx.clone());
        state.confirmed.insert(txid);
        Coin::from_output(outpoint, &tx.outputs[0], CoinOrigin::Confirmed).unwrap()
    }

    /// Confirm every known transaction.
    pub fn mine(&self) {
        let mut state = self.state.lock().unwrap();
        let txids: Vec<Txid> = state.transactions.keys().copied().collect();
        state.confirmed.extend(txids);
    }

    /// Forget an unconfirmed transaction, as a mempool eviction would.
    pub fn evict(&self, txid: Txid) {
        let mut state = self.state.lock().unwrap();
        if state.confirmed.contains(&txid) {
            return;
        }
        if let Some(tx) = state.transactions.remove(&txid) {
            for input in &tx.inputs {
                if let Some((_, spent_by)) = state.outputs.get_mut(&input.prev_out) {
                    *spent_by = None;
                }
            }
            for vout in 0..tx.outputs.len() as u32 {
                state.outputs.remove(&Outpoint::new(txid, vout));
            }
        }
    }

    /// While set, broadcasts are applied but answered with a timeout.
    pub fn lose_replies(&self, lose: bool) {
        self.state.lock().unwrap().lose_replies = lose;
    }

    pub fn transaction(&self, txid: Txid) -> Option<Transaction> {
        self.state.lock().unwrap().transactions.get(&txid).cloned()
    }

    pub fn broadcast_count(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.transactions.values().filter(|tx| !tx.inputs.is_empty()).count()
    }
}

#[async_trait]
impl ChainService for MockChain {
    async fn broadcast(&self, raw_tx_hex: &str) -> Result<Txid, EngineError> {
        let tx = Transaction::from_hex(raw_tx_hex).map_err(|e| EngineError::Network(e.to_string()))?;
        let txid = tx.txid();
        let mut state = self.state.lock().unwrap();

        let mut total_in = 0u64;
        for (index, input) in tx.inputs.iter().enumerate() {
            let Some((prev, spent_by)) = state.outputs.get(&input.prev_out) else {
                return Err(EngineError::Network(format!("missing input {}", input.prev_out)));
            };
            if let Some(spender) = spent_by {
                return Err(EngineError::Network(format!(
                    "input {} already spent by {spender}",
                    input.prev_out
                )));
            }
            let owner = prev
                .script
                .classify()
                .pubkey_hash()
                .copied()
                .ok_or_else(|| EngineError::Network("unspendable input".into()))?;
            verify_input(&tx, index, &prev.script, prev.value, &owner)
                .map_err(|e| EngineError::Network(format!("bad signature: {e}")))?;
            total_in += prev.value;
        }
        if total_in < tx.total_output_value() {
            return Err(EngineError::Network("outputs exceed inputs".into()));
        }

        for input in &tx.inputs {
            if let Some((_, spent_by)) = state.outputs.get_mut(&input.prev_out) {
                *spent_by = Some(txid);
            }
        }
        for (vout, output) in tx.outputs.iter().enumerate() {
            state
                .outputs
                .insert(Outpoint::new(txid, vout as u32), (output.clone(), None));
        }
        state.transactions.insert(txid, tx);
        if state.lose_replies {
            return Err(EngineError::Network("timed out".into()));
        }
        Ok(txid)
    }

    async fn fetch_output(&self, outpoint: Outpoint) -> Result<Option<OutputStatus>, EngineError> {
        let state = self.state.lock().unwrap();
        Ok(state.outputs.get(&outpoint).map(|(output, spent_by)| OutputStatus {
            output: output.clone(),
            spent_by: *spent_by,
            confirmed: state.confirmed.contains(&outpoint.txid),
        }))
    }

    async fn fetch_transaction(&self, txid: Txid) -> Result<Option<Transaction>, EngineError> {
        Ok(self.state.lock().unwrap().transactions.get(&txid).cloned())
    }

    async fn is_confirmed(&self, txid: Txid) -> Result<Option<bool>, EngineError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .transactions
            .contains_key(&txid)
            .then(|| state.confirmed.contains(&txid)))
    }
}
