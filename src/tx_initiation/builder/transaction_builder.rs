//! a builder for signed [Transaction]s and [TxCreationArtifacts].
//!
//! A [SpendPlan] fixes every input, output and the fee. This builder only
//! fills in unlocking scripts: real signatures when a signer is supplied,
//! worst case placeholders otherwise. Both variants have the same fee basis,
//! so a dry run reports exactly the fee and size of the real build.
//!
//! ```text
//! let plan = SpendPlanBuilder::new()
//!     .fixed_output(recipient)
//!     .native_candidates(coins)
//!     .change_script(wallet.native_script(KeyRole::Primary))
//!     .fee_rate(fee_rate)
//!     .build()?;
//!
//! let artifacts = TransactionBuilder::new(plan)
//!     .signer(&wallet)
//!     .build_tx_artifacts(&wallet, Some(claim))?;
//! ```

use tracing::debug;

use super::spend_plan::InputSigner;
use super::spend_plan::SpendPlan;
use crate::models::blockchain::sighash::unlocking_script;
use crate::models::blockchain::transaction::Transaction;
use crate::models::state::coin::Coin;
use crate::models::state::coin::CoinOrigin;
use crate::models::state::tx_creation_artifacts::Selected;
use crate::models::state::tx_creation_artifacts::TxCreationArtifacts;
use crate::models::state::utxo_ledger::ClaimId;
use crate::models::state::wallet::wallet_identity::WalletIdentity;
use crate::models::state::wallet::SigningService;
use crate::tx_initiation::error::EngineError;

/// Signs a [SpendPlan].
///
/// see module docs for details and example usage.
pub struct TransactionBuilder<'a> {
    plan: SpendPlan,
    signer: Option<&'a dyn SigningService>,
}

impl std::fmt::Debug for TransactionBuilder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionBuilder")
            .field("plan", &self.plan)
            .field("signed", &self.signer.is_some())
            .finish()
    }
}

impl<'a> TransactionBuilder<'a> {
    pub fn new(plan: SpendPlan) -> Self {
        Self { plan, signer: None }
    }

    /// sign wallet inputs with `signer`. Without one the build is a dry run.
    pub fn signer(mut self, signer: &'a dyn SigningService) -> Self {
        self.signer = Some(signer);
        self
    }

    /// the plan being built
    pub fn plan(&self) -> &SpendPlan {
        &self.plan
    }

    /// Build the transaction.
    ///
    /// Every signature is produced before anything is returned, so a locked
    /// wallet fails with [EngineError::WalletLocked] and leaves no partial
    /// result behind.
    pub fn build(&self) -> Result<Transaction, EngineError> {
        let Some(signer) = self.signer else {
            return Ok(self.plan.placeholder_transaction());
        };

        let mut tx = self.plan.unsigned_transaction();
        let mut unlocks = Vec::with_capacity(tx.inputs.len());
        for (index, input) in self.plan.inputs.iter().enumerate() {
            let InputSigner::Wallet {
                role,
                sighash_type,
                extra_pushes,
            } = &input.signer
            else {
                continue;
            };
            let signature = signer.sign(
                *role,
                &tx,
                index,
                &input.prev_output.script,
                input.prev_output.value,
                *sighash_type,
            )?;
            let public_key = signer.public_key(*role)?;
            let extra: Vec<&[u8]> = extra_pushes.iter().map(Vec::as_slice).collect();
            unlocks.push((index, unlocking_script(&signature, &public_key, &extra)));
        }
        for (index, script_sig) in unlocks {
            tx.inputs[index].script_sig = script_sig;
        }

        debug!(
            txid = %tx.txid(),
            size = tx.size(),
            fee_basis = self.plan.fee_basis_size,
            "signed transaction"
        );
        Ok(tx)
    }

    /// Build the transaction together with the coins it moves for `wallet`.
    pub fn build_tx_artifacts(
        self,
        wallet: &WalletIdentity,
        claim: Option<ClaimId>,
    ) -> Result<TxCreationArtifacts, EngineError> {
        let transaction = self.build()?;

        let inputs = self
            .plan
            .inputs
            .iter()
            .filter(|i| i.is_wallet_signed())
            .filter_map(|i| Coin::from_output(i.outpoint, &i.prev_output, CoinOrigin::Confirmed))
            .collect();
        let outputs = transaction
            .outputs
            .iter()
            .enumerate()
            .filter(|(_, o)| wallet.owner_of(&o.script).is_some())
            .filter_map(|(vout, o)| {
                let vout = u32::try_from(vout).ok()?;
                Coin::from_output(transaction.outpoint(vout), o, CoinOrigin::Unconfirmed)
            })
            .collect();

        Ok(TxCreationArtifacts {
            transaction,
            selected: Selected { inputs, outputs },
            fee: self.plan.fee,
            size: self.plan.fee_basis_size,
            claim,
        })
    }
}

#[cfg(test)]
mod tests {
    use secp256k1::SecretKey;

    use super::*;
    use crate::config_models::network::Network;
    use crate::models::blockchain::fee::FeeRate;
    use crate::models::blockchain::outpoint::Outpoint;
    use crate::models::blockchain::outpoint::Txid;
    use crate::models::blockchain::script::p2pkh_script;
    use crate::models::blockchain::sighash::verify_input;
    use crate::models::blockchain::sighash::SighashType;
    use crate::models::blockchain::transaction::TxOutput;
    use crate::models::state::wallet::keys::KeyRole;
    use crate::models::state::wallet::keys::WalletKeys;
    use crate::tx_initiation::builder::spend_plan::SpendInput;
    use crate::tx_initiation::builder::spend_plan::SpendPlanBuilder;

    fn wallet() -> WalletIdentity {
        WalletIdentity::from_keys(
            WalletKeys::new(
                SecretKey::from_slice(&[5; 32]).unwrap(),
                SecretKey::from_slice(&[6; 32]).unwrap(),
            ),
            Network::Testnet,
        )
    }

    fn plan(wallet: &WalletIdentity) -> SpendPlan {
        let coin = Coin::from_output(
            Outpoint::new(Txid([3; 32]), 1),
            &TxOutput::new(200_000, wallet.native_script(KeyRole::Primary)),
            CoinOrigin::Confirmed,
        )
        .unwrap();
        SpendPlanBuilder::new()
            .fixed_output(TxOutput::new(
                10_000,
                p2pkh_script(&wallet.swap_address),
            ))
            .native_candidates([SpendInput::from_coin(&coin, KeyRole::Primary)])
            .change_script(wallet.native_script(KeyRole::Primary))
            .fee_rate(FeeRate::new(3))
            .dust_threshold(546)
            .build()
            .unwrap()
    }

    #[test]
    fn signed_inputs_verify_and_fit_the_fee_basis() {
        let wallet = wallet();
        let plan = plan(&wallet);
        let prev = plan.inputs[0].prev_output.clone();
        let tx = TransactionBuilder::new(plan.clone())
            .signer(&wallet)
            .build()
            .unwrap();

        let sighash = verify_input(&tx, 0, &prev.script, prev.value, wallet.address.pubkey_hash());
        assert_eq!(Ok(SighashType::All), sighash);
        assert!(tx.size() <= plan.fee_basis_size);
    }

    #[test]
    fn dry_run_and_real_build_report_the_same_fee_and_size() {
        let wallet = wallet();
        let dry = TransactionBuilder::new(plan(&wallet))
            .build_tx_artifacts(&wallet, None)
            .unwrap();
        let real = TransactionBuilder::new(plan(&wallet))
            .signer(&wallet)
            .build_tx_artifacts(&wallet, None)
            .unwrap();

        assert_eq!(dry.fee, real.fee);
        assert_eq!(dry.size, real.size);
        assert_eq!(dry.size, dry.transaction.size());
    }

    #[test]
    fn selected_tracks_consumed_and_owned_outputs() {
        let wallet = wallet();
        let artifacts = TransactionBuilder::new(plan(&wallet))
            .signer(&wallet)
            .build_tx_artifacts(&wallet, None)
            .unwrap();

        assert_eq!(1, artifacts.selected.inputs.len());
        // recipient is our own swap address, change is primary
        assert_eq!(2, artifacts.selected.outputs.len());
        assert!(artifacts
            .selected
            .outputs
            .iter()
            .all(|c| c.origin.is_unconfirmed() && c.outpoint.txid == artifacts.txid()));
    }

    #[test]
    fn locked_wallet_fails_without_partial_result() {
        let mut wallet = wallet();
        let plan = plan(&wallet);
        wallet.lock();
        let result = TransactionBuilder::new(plan).signer(&wallet).build();
        assert_eq!(Err(EngineError::WalletLocked), result);
    }
}
