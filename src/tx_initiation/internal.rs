//! Helpers shared by the transfer, mint and swap builders.

use tracing::warn;

use crate::models::blockchain::address::Address;
use crate::models::blockchain::glyph::ContractType;
use crate::models::blockchain::outpoint::Outpoint;
use crate::models::state::tx_creation_artifacts::TxCreationArtifacts;
use crate::models::state::utxo_ledger::Claim;
use crate::models::state::utxo_ledger::ClaimId;
use crate::models::state::utxo_ledger::LedgerError;
use crate::models::state::utxo_ledger::UtxoLedger;
use crate::models::state::wallet::keys::KeyRole;
use crate::models::state::wallet::wallet_identity::WalletIdentity;
use crate::tx_initiation::builder::spend_plan::SpendInput;
use crate::tx_initiation::builder::spend_plan::SpendPlan;
use crate::tx_initiation::builder::transaction_builder::TransactionBuilder;
use crate::tx_initiation::error::EngineError;

/// Unclaimed native coins of `roles`, ready to pay fees.
pub(crate) fn native_candidates(
    ledger: &UtxoLedger,
    wallet: &WalletIdentity,
    roles: &[KeyRole],
) -> Vec<SpendInput> {
    roles
        .iter()
        .flat_map(|role| {
            let scripts = [wallet.native_script(*role)];
            ledger
                .available(ContractType::Native, None, &scripts)
                .map(|c| SpendInput::from_coin(c, *role))
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Reject addresses of a network the wallet does not share addresses with.
pub(crate) fn ensure_same_network(
    wallet: &WalletIdentity,
    address: &Address,
) -> Result<(), EngineError> {
    if wallet.network().shares_addresses_with(address.network()) {
        Ok(())
    } else {
        Err(EngineError::InvalidAddress(format!(
            "{address} is not a {} address",
            wallet.network()
        )))
    }
}

/// Sign `plan` with the wallet's keys, or fill placeholders for a dry run.
pub(crate) fn sign_plan(
    plan: SpendPlan,
    wallet: &WalletIdentity,
    dry_run: bool,
) -> Result<TxCreationArtifacts, EngineError> {
    let builder = TransactionBuilder::new(plan);
    if dry_run {
        builder.build_tx_artifacts(wallet, None)
    } else {
        builder.signer(wallet).build_tx_artifacts(wallet, None)
    }
}

/// Take a fresh build claim on `outpoints`.
pub(crate) fn claim_build(
    ledger: &mut UtxoLedger,
    outpoints: &[Outpoint],
) -> Result<ClaimId, LedgerError> {
    let id = ledger.new_claim_id();
    ledger.claim(outpoints, Claim::Build(id))?;
    Ok(id)
}

/// Claim the coins an artifact consumes and record the claim on it.
///
/// Selection and claim run under one ledger lock, so a conflict here means
/// the caller skipped [UtxoLedger::available]; it is reported as missing
/// funds, the same as losing the race during selection.
pub(crate) fn claim_artifacts(
    ledger: &mut UtxoLedger,
    artifacts: &mut TxCreationArtifacts,
) -> Result<(), EngineError> {
    let outpoints = artifacts.selected.input_outpoints();
    let requested = artifacts.selected.inputs.iter().map(|c| c.value).sum();
    let id = claim_build(ledger, &outpoints).map_err(|e| claim_conflict(&e, requested))?;
    artifacts.claim = Some(id);
    Ok(())
}

/// A claim lost to a concurrent build, reported as missing funds.
pub(crate) fn claim_conflict(e: &LedgerError, requested: u64) -> EngineError {
    warn!(%e, "selected coin could not be claimed");
    EngineError::InsufficientFunds {
        requested,
        available: 0,
    }
}
