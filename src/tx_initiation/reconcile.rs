//! Settling submitted spends and unconfirmed coins against the chain.
//!
//! Chain queries run without the ledger lock; the settlements they produce
//! are applied afterwards under it, and only where the coin is still in the
//! state that was observed.

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::info;

use super::error::EngineError;
use crate::api::collaborators::ChainService;
use crate::models::blockchain::outpoint::Outpoint;
use crate::models::blockchain::outpoint::Txid;
use crate::models::state::coin::Coin;
use crate::models::state::coin::SpendState;
use crate::models::state::tx_creation_artifacts::TxCreationArtifacts;
use crate::models::state::utxo_ledger::UtxoLedger;

/// One observed change to a ledger coin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// a confirmed transaction spends the coin
    Spent { outpoint: Outpoint, txid: Txid },

    /// the submitted spend `txid` is unknown to the network and the coin is
    /// unspent
    Dropped { outpoint: Outpoint, txid: Txid },

    /// the transaction creating the coin confirmed
    Confirmed(Outpoint),

    /// the transaction creating an unconfirmed coin is unknown to the
    /// network
    Vanished(Outpoint),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub spent: usize,
    pub reverted: usize,
    pub confirmed: usize,
    pub vanished: usize,
}

/// Apply a transaction the network accepted as `txid`.
///
/// Inputs become submitted, owned outputs are inserted as unconfirmed, and
/// the inputs' claims are dropped. Claims on coins the transaction does not
/// spend, such as relations held for a pending reveal, are kept.
pub fn record_broadcast(ledger: &mut UtxoLedger, artifacts: &TxCreationArtifacts, txid: Txid) {
    let inputs = artifacts.selected.input_outpoints();
    ledger.mark_submitted(&inputs, txid);
    for coin in &artifacts.selected.outputs {
        ledger.insert(coin.clone());
    }
    ledger.release_outpoints(&inputs);
    debug!(%txid, spent = inputs.len(), created = artifacts.selected.outputs.len(), "recorded broadcast");
}

/// Apply a transaction whose broadcast reply was lost.
///
/// The network may or may not hold it, so the inputs become submitted
/// under the built txid and the owned outputs are inserted as unconfirmed,
/// exactly as for an accepted broadcast. [observe] later settles the inputs
/// as spent or dropped and the outputs as confirmed or vanished. The build
/// claim is kept until the caller abandons it.
pub fn record_unknown_outcome(ledger: &mut UtxoLedger, artifacts: &TxCreationArtifacts) {
    let txid = artifacts.txid();
    let inputs = artifacts.selected.input_outpoints();
    ledger.mark_submitted(&inputs, txid);
    for coin in &artifacts.selected.outputs {
        ledger.insert(coin.clone());
    }
    debug!(%txid, spent = inputs.len(), "recorded broadcast with unknown outcome");
}

/// Query the chain about each unsettled coin.
pub async fn observe(
    chain: &dyn ChainService,
    coins: &[Coin],
) -> Result<Vec<Settlement>, EngineError> {
    let mut settlements = vec![];
    for coin in coins {
        let outpoint = coin.outpoint;

        if let SpendState::Submitted(txid) = coin.spend {
            let status = chain.fetch_output(outpoint).await?;
            match status.and_then(|s| s.spent_by) {
                Some(spender) => {
                    if chain.is_confirmed(spender).await? == Some(true) {
                        settlements.push(Settlement::Spent {
                            outpoint,
                            txid: spender,
                        });
                    }
                }
                None => {
                    if chain.fetch_transaction(txid).await?.is_none() {
                        settlements.push(Settlement::Dropped { outpoint, txid });
                    }
                }
            }
        }

        if coin.origin.is_unconfirmed() {
            match chain.is_confirmed(outpoint.txid).await? {
                Some(true) => settlements.push(Settlement::Confirmed(outpoint)),
                Some(false) => {}
                None => settlements.push(Settlement::Vanished(outpoint)),
            }
        }
    }
    Ok(settlements)
}

/// Apply `settlements` to `ledger`.
pub fn apply(ledger: &mut UtxoLedger, settlements: &[Settlement]) -> ReconcileReport {
    let mut report = ReconcileReport::default();
    for settlement in settlements {
        match *settlement {
            Settlement::Spent { outpoint, txid } => {
                ledger.mark_spent(&outpoint, txid);
                report.spent += 1;
            }
            Settlement::Dropped { outpoint, txid } => {
                // a rebroadcast since observing may have replaced the spend
                if ledger.own_spend_of(&outpoint) == Some(txid) {
                    ledger.revert_submitted(&outpoint);
                    report.reverted += 1;
                }
            }
            Settlement::Confirmed(outpoint) => {
                ledger.mark_confirmed(&outpoint);
                report.confirmed += 1;
            }
            Settlement::Vanished(outpoint) => {
                if ledger.remove_unconfirmed(&outpoint) {
                    report.vanished += 1;
                }
            }
        }
    }
    if report == ReconcileReport::default() {
        debug!("ledger already settled");
    } else {
        info!(
            spent = report.spent,
            reverted = report.reverted,
            confirmed = report.confirmed,
            vanished = report.vanished,
            "reconciled ledger"
        );
    }
    report
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::collections::HashSet;

    use async_trait::async_trait;

    use super::*;
    use crate::api::collaborators::OutputStatus;
    use crate::config_models::network::Network;
    use crate::models::blockchain::address::Address;
    use crate::models::blockchain::script::p2pkh_script;
    use crate::models::blockchain::transaction::Transaction;
    use crate::models::blockchain::transaction::TxOutput;
    use crate::models::state::coin::CoinOrigin;
    use crate::models::state::utxo_ledger::Claim;

    #[derive(Default)]
    struct FixedChain {
        outputs: HashMap<Outpoint, OutputStatus>,
        transactions: HashMap<Txid, Transaction>,
        confirmed: HashSet<Txid>,
    }

    #[async_trait]
    impl ChainService for FixedChain {
        async fn broadcast(&self, _raw_tx_hex: &str) -> Result<Txid, EngineError> {
            Err(EngineError::Network("read only".into()))
        }

        async fn fetch_output(&self, outpoint: Outpoint) -> Result<Option<OutputStatus>, EngineError> {
            Ok(self.outputs.get(&outpoint).cloned())
        }

        async fn fetch_transaction(&self, txid: Txid) -> Result<Option<Transaction>, EngineError> {
            Ok(self.transactions.get(&txid).cloned())
        }

        async fn is_confirmed(&self, txid: Txid) -> Result<Option<bool>, EngineError> {
            Ok(self
                .transactions
                .contains_key(&txid)
                .then(|| self.confirmed.contains(&txid)))
        }
    }

    fn output() -> TxOutput {
        TxOutput::new(5_000, p2pkh_script(&Address::new(Network::RegTest, [4; 20])))
    }

    fn coin(n: u8, spend: SpendState, origin: CoinOrigin) -> Coin {
        let mut coin = Coin::from_output(Outpoint::new(Txid([n; 32]), 0), &output(), origin).unwrap();
        coin.spend = spend;
        coin
    }

    #[tokio::test]
    async fn dropped_spend_is_reverted_and_confirmed_spend_settles() {
        let dropped = Txid([0xd0; 32]);
        let mined = Txid([0xe0; 32]);
        let a = coin(1, SpendState::Submitted(dropped), CoinOrigin::Confirmed);
        let b = coin(2, SpendState::Submitted(mined), CoinOrigin::Confirmed);

        let mut chain = FixedChain::default();
        for (c, spent_by) in [(&a, None), (&b, Some(mined))] {
            chain.outputs.insert(
                c.outpoint,
                OutputStatus {
                    output: output(),
                    spent_by,
                    confirmed: true,
                },
            );
        }
        chain.transactions.insert(mined, Transaction::default());
        chain.confirmed.insert(mined);

        let mut ledger = UtxoLedger::from_coins([a.clone(), b.clone()]);
        let settlements = observe(&chain, &ledger.unsettled()).await.unwrap();
        let report = apply(&mut ledger, &settlements);

        assert_eq!(1, report.spent);
        assert_eq!(1, report.reverted);
        assert_eq!(SpendState::Unspent, ledger.get(&a.outpoint).unwrap().spend);
        assert_eq!(SpendState::Spent(mined), ledger.get(&b.outpoint).unwrap().spend);
        assert!(ledger.unsettled().is_empty());
    }

    #[tokio::test]
    async fn unknown_outcome_is_left_alone() {
        let pending = Txid([0xf0; 32]);
        let a = coin(1, SpendState::Submitted(pending), CoinOrigin::Unconfirmed);

        let mut chain = FixedChain::default();
        chain.transactions.insert(pending, Transaction::default());
        chain.transactions.insert(a.outpoint.txid, Transaction::default());

        let mut ledger = UtxoLedger::from_coins([a.clone()]);
        let settlements = observe(&chain, &ledger.unsettled()).await.unwrap();
        assert_eq!(ReconcileReport::default(), apply(&mut ledger, &settlements));
        assert_eq!(vec![a], ledger.unsettled());
    }

    #[tokio::test]
    async fn output_of_a_vanished_transaction_is_removed_unless_claimed() {
        let free = coin(1, SpendState::Unspent, CoinOrigin::Unconfirmed);
        let held = coin(2, SpendState::Unspent, CoinOrigin::Unconfirmed);
        let mut ledger = UtxoLedger::from_coins([free.clone(), held.clone()]);
        ledger.claim(&[held.outpoint], Claim::Swap(7)).unwrap();

        let settlements = observe(&FixedChain::default(), &ledger.unsettled()).await.unwrap();
        assert_eq!(2, settlements.len());
        assert_eq!(1, apply(&mut ledger, &settlements).vanished);
        assert!(ledger.get(&free.outpoint).is_none());
        assert!(ledger.get(&held.outpoint).is_some());
    }

    #[test]
    fn stale_drop_does_not_revert_a_newer_spend() {
        let old = Txid([1; 32]);
        let newer = Txid([2; 32]);
        let a = coin(1, SpendState::Submitted(newer), CoinOrigin::Confirmed);
        let mut ledger = UtxoLedger::from_coins([a.clone()]);

        let report = apply(
            &mut ledger,
            &[Settlement::Dropped {
                outpoint: a.outpoint,
                txid: old,
            }],
        );
        assert_eq!(0, report.reverted);
        assert_eq!(Some(newer), ledger.own_spend_of(&a.outpoint));
    }
}
