//! Two-party atomic swaps from partially signed transactions.
//!
//! The proposer first moves the offered asset into an escrow coin at their
//! swap address. The proposal is a one-input, one-output transaction that
//! spends the escrow and pays the requested asset to the proposer, signed
//! `SINGLE|ANYONECANPAY`: the signature covers only that input and output 0.
//!
//! The acceptor appends their own inputs and outputs, signs them `ALL`, and
//! broadcasts. Neither half is valid on its own terms without the other:
//! the proposer's signature demands output 0, and the acceptor's signature
//! covers the whole combined transaction.
//!
//! Cancelling is an ordinary spend of the escrow back to the proposer. The
//! first of the two to be accepted by the network wins.

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::builder::coin_selector::select_token_coins;
use super::builder::coin_selector::SelectionPriority;
use super::builder::spend_plan::InputSigner;
use super::builder::spend_plan::SpendInput;
use super::builder::spend_plan::SpendPlan;
use super::builder::spend_plan::SpendPlanBuilder;
use super::builder::transaction_builder::TransactionBuilder;
use super::error::EngineError;
use super::error::SwapError;
use super::internal::claim_artifacts;
use super::internal::native_candidates;
use super::internal::sign_plan;
use crate::api::collaborators::OutputStatus;
use crate::models::blockchain::fee::FeeRate;
use crate::models::blockchain::glyph::Asset;
use crate::models::blockchain::glyph::ContractType;
use crate::models::blockchain::glyph::Glyph;
use crate::models::blockchain::outpoint::Outpoint;
use crate::models::blockchain::outpoint::Txid;
use crate::models::blockchain::sighash::verify_input;
use crate::models::blockchain::sighash::InputSignature;
use crate::models::blockchain::sighash::SighashType;
use crate::models::blockchain::transaction::Transaction;
use crate::models::blockchain::transaction::TxOutput;
use crate::models::state::coin::Coin;
use crate::models::state::swap::SwapStatus;
use crate::models::state::swap::TokenSwap;
use crate::models::state::tx_creation_artifacts::TxCreationArtifacts;
use crate::models::state::utxo_ledger::UtxoLedger;
use crate::models::state::wallet::keys::KeyRole;
use crate::models::state::wallet::wallet_identity::WalletIdentity;

/// A counterparty's proposal, checked against the chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapOffer {
    /// the half-signed proposal
    pub transaction: Transaction,

    pub escrow: Outpoint,
    pub escrow_output: TxOutput,

    /// what the proposer gives
    pub offered: Asset,

    /// what the proposer wants in return, paid to output 0
    pub requested: Asset,

    #[serde(with = "hex::serde")]
    pub proposer: [u8; 20],
}

/// A combined swap transaction ready to broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptedSwap {
    pub artifacts: TxCreationArtifacts,
    pub offer: SwapOffer,
}

impl AcceptedSwap {
    /// The record the acceptor keeps once the swap is broadcast.
    pub fn completed_record(&self) -> TokenSwap {
        TokenSwap {
            status: SwapStatus::Completed,
            ..TokenSwap::pending(
                &self.offer.requested,
                &self.offer.offered,
                self.artifacts.to_hex(),
                self.artifacts.txid(),
            )
        }
    }
}

/// The asset a script and value represent, if the script is a coin script.
pub fn asset_of_output(output: &TxOutput) -> Option<Asset> {
    let kind = output.script.classify();
    let value = output.value;
    Some(match kind.contract_type()? {
        ContractType::Native => Asset::Native { value },
        ContractType::Fungible => Asset::Fungible {
            glyph: Glyph::new(kind.token_ref()?),
            value,
        },
        ContractType::NonFungible => Asset::NonFungible {
            glyph: Glyph::new(kind.token_ref()?),
            value,
        },
    })
}

/// Output paying `asset` to this wallet's `role` key.
fn output_for(asset: &Asset, wallet: &WalletIdentity, role: KeyRole) -> Result<TxOutput, EngineError> {
    let token_ref = asset.token_ref();
    let script = wallet
        .script_for(role, asset.contract_type(), token_ref.as_ref())
        .ok_or_else(|| SwapError::InvalidPairing(format!("{asset} has no token reference")))?;
    Ok(TxOutput::new(asset.value(), script))
}

/// Sign the proposal spending `escrow`, which must be a wallet coin at the
/// swap address holding exactly the offered asset.
pub fn build_proposal(
    wallet: &WalletIdentity,
    escrow: &Coin,
    requested: &Asset,
) -> Result<Transaction, EngineError> {
    if wallet.owner_of(&escrow.script) != Some(KeyRole::Swap) {
        return Err(SwapError::AssetNotHeld(format!(
            "escrow {} is not held by the swap key",
            escrow.outpoint
        ))
        .into());
    }
    let plan = SpendPlan {
        inputs: vec![SpendInput::from_coin(escrow, KeyRole::Swap)
            .with_sighash(SighashType::SingleAnyoneCanPay)],
        outputs: vec![output_for(requested, wallet, KeyRole::Swap)?],
        change_index: None,
        fee: 0,
        fee_basis_size: 0,
    };
    let tx = TransactionBuilder::new(plan).signer(wallet).build()?;
    debug!(escrow = %escrow.outpoint, %requested, "signed swap proposal");
    Ok(tx)
}

/// Decode a proposal and run the checks that need no chain access: its
/// shape and the hash type of its one signature.
pub fn decode_proposal(raw_tx_hex: &str) -> Result<Transaction, EngineError> {
    let tx = Transaction::from_hex(raw_tx_hex)
        .map_err(|e| EngineError::malformed_swap(format!("cannot decode: {e}")))?;
    ensure_proposal_shape(&tx)?;
    let signature = InputSignature::parse(&tx, 0)
        .map_err(|e| EngineError::malformed_swap(e.to_string()))?;
    if signature.sighash_type != SighashType::SingleAnyoneCanPay {
        return Err(EngineError::malformed_swap(format!(
            "proposal is signed {}, not {}",
            signature.sighash_type,
            SighashType::SingleAnyoneCanPay
        )));
    }
    Ok(tx)
}

/// A proposal spends exactly the escrow and pays exactly the requested
/// output.
fn ensure_proposal_shape(tx: &Transaction) -> Result<(), EngineError> {
    if tx.inputs.len() != 1 || tx.outputs.len() != 1 {
        return Err(EngineError::malformed_swap(format!(
            "expected 1 input and 1 output, found {} and {}",
            tx.inputs.len(),
            tx.outputs.len()
        )));
    }
    Ok(())
}

/// Check a decoded proposal against the chain's view of its escrow.
pub fn check_offer(tx: Transaction, escrow_status: Option<OutputStatus>) -> Result<SwapOffer, EngineError> {
    ensure_proposal_shape(&tx)?;
    let escrow = tx.inputs[0].prev_out;
    let status = escrow_status
        .ok_or_else(|| EngineError::asset_not_held(format!("escrow {escrow} does not exist")))?;
    if let Some(txid) = status.spent_by {
        return Err(EngineError::asset_not_held(format!(
            "escrow {escrow} was spent by {txid}"
        )));
    }

    let escrow_output = status.output;
    let offered = asset_of_output(&escrow_output)
        .ok_or_else(|| EngineError::malformed_swap("escrow is not a coin script"))?;
    let proposer = *escrow_output
        .script
        .classify()
        .pubkey_hash()
        .ok_or_else(|| EngineError::malformed_swap("escrow has no owner"))?;
    match verify_input(&tx, 0, &escrow_output.script, escrow_output.value, &proposer) {
        Ok(SighashType::SingleAnyoneCanPay) => {}
        Ok(other) => {
            return Err(EngineError::malformed_swap(format!("unexpected sighash {other}")))
        }
        Err(e) => return Err(EngineError::malformed_swap(e.to_string())),
    }
    let requested = asset_of_output(&tx.outputs[0])
        .ok_or_else(|| EngineError::malformed_swap("requested output is not a coin script"))?;

    Ok(SwapOffer {
        transaction: tx,
        escrow,
        escrow_output,
        offered,
        requested,
        proposer,
    })
}

/// Whether `mine` can pay what `offer` requests.
fn ensure_pairing(offer: &SwapOffer, mine: &Asset) -> Result<(), SwapError> {
    let requested = &offer.requested;
    let paired = match (requested, mine) {
        (Asset::NonFungible { .. }, Asset::NonFungible { .. }) => {
            requested.token_ref() == mine.token_ref()
        }
        _ => requested.same_as(mine),
    };
    if paired {
        Ok(())
    } else {
        Err(SwapError::InvalidPairing(format!(
            "proposal requests {requested}, offered {mine}"
        )))
    }
}

/// Combine `offer` with the wallet's payment of `mine`, sign and claim it.
///
/// Outputs are: the proposer's output 0, then the offered asset at this
/// wallet's swap address when it is a token, then token change. Native
/// proceeds arrive as change at the swap address, less the fee.
pub fn build_acceptance(
    ledger: &mut UtxoLedger,
    wallet: &WalletIdentity,
    offer: SwapOffer,
    mine: &Asset,
    fee_rate: FeeRate,
    dust_threshold: u64,
) -> Result<AcceptedSwap, EngineError> {
    ensure_proposal_shape(&offer.transaction)?;
    ensure_pairing(&offer, mine)?;
    if ledger.get(&offer.escrow).is_some() {
        return Err(SwapError::InvalidPairing("cannot accept a proposal of this wallet".into()).into());
    }

    let escrow = SpendInput {
        outpoint: offer.escrow,
        prev_output: offer.escrow_output.clone(),
        signer: InputSigner::Presigned(offer.transaction.inputs[0].script_sig.clone()),
    };
    let mut builder = SpendPlanBuilder::new()
        .fixed_input(escrow)
        .fixed_output(offer.transaction.outputs[0].clone());

    let mut token_change = None;
    match mine {
        Asset::Native { .. } => {}
        Asset::Fungible { glyph, value } => {
            let scripts: Vec<_> = wallet
                .script_for(KeyRole::Primary, ContractType::Fungible, Some(&glyph.token_ref))
                .into_iter()
                .collect();
            let coins = ledger
                .available(ContractType::Fungible, Some(&glyph.token_ref), &scripts)
                .cloned()
                .collect();
            let chosen =
                select_token_coins(coins, &glyph.token_ref, *value, SelectionPriority::default())?;
            let total: u64 = chosen.iter().map(|c| c.value).sum();
            if total > *value {
                token_change = Some(TxOutput::new(total - value, chosen[0].script.clone()));
            }
            builder = builder.fixed_inputs(
                chosen
                    .iter()
                    .map(|c| SpendInput::from_coin(c, KeyRole::Primary)),
            );
        }
        Asset::NonFungible { glyph, .. } => {
            let scripts: Vec<_> = wallet
                .script_for(KeyRole::Primary, ContractType::NonFungible, Some(&glyph.token_ref))
                .into_iter()
                .collect();
            let coin = ledger
                .available(ContractType::NonFungible, Some(&glyph.token_ref), &scripts)
                .next()
                .ok_or(EngineError::TokenNotFound {
                    token_ref: glyph.token_ref,
                })?;
            builder = builder.fixed_input(SpendInput::from_coin(coin, KeyRole::Primary));
        }
    }

    let change_script = match &offer.offered {
        Asset::Native { .. } => wallet.native_script(KeyRole::Swap),
        token => {
            let receive = TxOutput::new(
                offer.escrow_output.value,
                output_for(token, wallet, KeyRole::Swap)?.script,
            );
            builder = builder.fixed_output(receive);
            wallet.native_script(KeyRole::Primary)
        }
    };
    if let Some(change) = token_change {
        builder = builder.fixed_output(change);
    }

    let plan = builder
        .native_candidates(native_candidates(ledger, wallet, &[KeyRole::Primary]))
        .change_script(change_script)
        .fee_rate(fee_rate)
        .dust_threshold(dust_threshold)
        .build()?;
    // offered photons arrive as the swap-address change, net of the fee
    if matches!(offer.offered, Asset::Native { .. }) && plan.change_index.is_none() {
        warn!(
            escrow = %offer.escrow,
            offered = offer.escrow_output.value,
            fee = plan.fee,
            "offered photons are absorbed into the fee"
        );
    }
    let mut artifacts = sign_plan(plan, wallet, false)?;
    claim_artifacts(ledger, &mut artifacts)?;

    info!(
        escrow = %offer.escrow,
        offered = %offer.offered,
        requested = %offer.requested,
        txid = %artifacts.txid(),
        fee = artifacts.fee,
        "accepted swap"
    );
    Ok(AcceptedSwap { artifacts, offer })
}

/// Spend the escrow of `record` back to the primary address.
///
/// Fee coins come from unclaimed primary coins. Claiming them, and moving
/// the escrow from its swap claim, is left to the caller.
pub fn build_cancel(
    ledger: &UtxoLedger,
    wallet: &WalletIdentity,
    record: &TokenSwap,
    fee_rate: FeeRate,
    dust_threshold: u64,
) -> Result<TxCreationArtifacts, EngineError> {
    let escrow = ledger
        .get(&record.escrow())
        .filter(|c| !c.spent())
        .ok_or_else(|| EngineError::asset_not_held(format!("escrow {} is gone", record.escrow())))?;

    let mut builder = SpendPlanBuilder::new()
        .fixed_input(SpendInput::from_coin(escrow, KeyRole::Swap))
        .native_candidates(native_candidates(ledger, wallet, &[KeyRole::Primary]))
        .change_script(wallet.native_script(KeyRole::Primary))
        .fee_rate(fee_rate)
        .dust_threshold(dust_threshold);
    if !escrow.contract_type.is_native() {
        let back = wallet
            .script_for(KeyRole::Primary, escrow.contract_type, escrow.token_ref.as_ref())
            .ok_or_else(|| EngineError::malformed_swap("token escrow without a reference"))?;
        builder = builder.fixed_output(TxOutput::new(escrow.value, back));
    }

    let plan = builder.build()?;
    if plan.outputs.is_empty() {
        return Err(EngineError::InsufficientFunds {
            requested: plan.fee.saturating_add(dust_threshold),
            available: escrow.value,
        });
    }
    sign_plan(plan, wallet, false)
}

/// Terminal status of a pending proposal whose escrow was spent by
/// `spender`.
///
/// * the spender pays the committed output at the escrow input's index:
///   `Completed`
/// * this wallet submitted the spender itself: `Cancel`
/// * anything else: `Missing`
pub fn resolve_spent_escrow(
    record: &TokenSwap,
    spender_txid: Txid,
    spender: Option<&Transaction>,
    own_spend: Option<Txid>,
) -> SwapStatus {
    let committed = Transaction::from_hex(&record.raw_transaction)
        .ok()
        .and_then(|tx| tx.outputs.into_iter().next());
    let escrow = record.escrow();

    let completed = spender.zip(committed).is_some_and(|(tx, committed)| {
        tx.inputs
            .iter()
            .position(|i| i.prev_out == escrow)
            .and_then(|index| tx.outputs.get(index))
            .is_some_and(|output| *output == committed)
    });
    if completed {
        SwapStatus::Completed
    } else if own_spend == Some(spender_txid) {
        SwapStatus::Cancel
    } else {
        SwapStatus::Missing
    }
}

/// Index of the output `spender` pays to the proposer of `record`.
pub fn proceeds_index(record: &TokenSwap, spender: &Transaction) -> Option<u32> {
    let index = spender.inputs.iter().position(|i| i.prev_out == record.escrow())?;
    u32::try_from(index).ok()
}
