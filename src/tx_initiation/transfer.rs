//! Transfers of native coin, fungible and non-fungible tokens.
//!
//! All three share one shape: token coins (if any) are fixed inputs, the
//! recipient output comes first, token change follows, and native coins of
//! the wallet are selected to pay the fee with change back to the primary
//! address.

use serde::Deserialize;
use serde::Serialize;
use tracing::info;

use super::builder::coin_selector::select_token_coins;
use super::builder::coin_selector::SelectionPriority;
use super::builder::spend_plan::SpendInput;
use super::builder::spend_plan::SpendPlan;
use super::builder::spend_plan::SpendPlanBuilder;
use super::error::EngineError;
use super::internal::claim_artifacts;
use super::internal::ensure_same_network;
use super::internal::native_candidates;
use super::internal::sign_plan;
use crate::models::blockchain::address::Address;
use crate::models::blockchain::fee::FeeRate;
use crate::models::blockchain::glyph::Asset;
use crate::models::blockchain::glyph::ContractType;
use crate::models::blockchain::outpoint::TokenRef;
use crate::models::blockchain::script::ft_script;
use crate::models::blockchain::script::nft_script;
use crate::models::blockchain::script::p2pkh_script;
use crate::models::blockchain::transaction::TxOutput;
use crate::models::state::tx_creation_artifacts::TxCreationArtifacts;
use crate::models::state::utxo_ledger::UtxoLedger;
use crate::models::state::wallet::keys::KeyRole;
use crate::models::state::wallet::wallet_identity::WalletIdentity;

/// What to send, and to whom.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    pub asset: Asset,
    pub recipient: Address,

    /// key whose coins are spent. Fee coins always include the primary key's.
    #[serde(default)]
    pub source: KeyRole,
}

impl TransferRequest {
    pub fn new(asset: Asset, recipient: Address) -> Self {
        Self {
            asset,
            recipient,
            source: KeyRole::Primary,
        }
    }

    pub fn from_role(mut self, source: KeyRole) -> Self {
        self.source = source;
        self
    }
}

/// Price a transfer without touching the ledger's claims.
pub fn plan_transfer(
    ledger: &UtxoLedger,
    wallet: &WalletIdentity,
    request: &TransferRequest,
    fee_rate: FeeRate,
    dust_threshold: u64,
) -> Result<SpendPlan, EngineError> {
    ensure_same_network(wallet, &request.recipient)?;
    let source = request.source;
    let fee_roles: &[KeyRole] = match source {
        KeyRole::Primary => &[KeyRole::Primary],
        KeyRole::Swap => &[KeyRole::Swap, KeyRole::Primary],
    };

    let builder = match &request.asset {
        Asset::Native { value } => SpendPlanBuilder::new()
            .fixed_output(TxOutput::new(*value, p2pkh_script(&request.recipient))),
        Asset::Fungible { glyph, value } => {
            fungible_legs(ledger, wallet, source, &request.recipient, &glyph.token_ref, *value)?
        }
        Asset::NonFungible { glyph, .. } => {
            non_fungible_legs(ledger, wallet, source, &request.recipient, &glyph.token_ref)?
        }
    };

    builder
        .native_candidates(native_candidates(ledger, wallet, fee_roles))
        .change_script(wallet.native_script(KeyRole::Primary))
        .fee_rate(fee_rate)
        .dust_threshold(dust_threshold)
        .build()
}

/// Select, sign and claim a transfer.
///
/// The caller holds the ledger lock across this call, which makes selection
/// and claim one step.
pub fn build_transfer(
    ledger: &mut UtxoLedger,
    wallet: &WalletIdentity,
    request: &TransferRequest,
    fee_rate: FeeRate,
    dust_threshold: u64,
) -> Result<TxCreationArtifacts, EngineError> {
    let plan = plan_transfer(ledger, wallet, request, fee_rate, dust_threshold)?;
    let mut artifacts = sign_plan(plan, wallet, false)?;
    claim_artifacts(ledger, &mut artifacts)?;

    info!(
        asset = %request.asset,
        recipient = %request.recipient,
        txid = %artifacts.txid(),
        fee = artifacts.fee,
        size = artifacts.size,
        "built transfer"
    );
    Ok(artifacts)
}

fn fungible_legs(
    ledger: &UtxoLedger,
    wallet: &WalletIdentity,
    source: KeyRole,
    recipient: &Address,
    token_ref: &TokenRef,
    value: u64,
) -> Result<SpendPlanBuilder, EngineError> {
    let scripts: Vec<_> = wallet
        .script_for(source, ContractType::Fungible, Some(token_ref))
        .into_iter()
        .collect();
    let coins = ledger
        .available(ContractType::Fungible, Some(token_ref), &scripts)
        .cloned()
        .collect();
    let chosen = select_token_coins(coins, token_ref, value, SelectionPriority::default())?;
    let total: u64 = chosen.iter().map(|c| c.value).sum();

    let mut builder = SpendPlanBuilder::new()
        .fixed_inputs(chosen.iter().map(|c| SpendInput::from_coin(c, source)))
        .fixed_output(TxOutput::new(value, ft_script(recipient, token_ref)));
    if total > value {
        builder = builder.fixed_output(TxOutput::new(
            total - value,
            ft_script(&wallet.address, token_ref),
        ));
    }
    Ok(builder)
}

fn non_fungible_legs(
    ledger: &UtxoLedger,
    wallet: &WalletIdentity,
    source: KeyRole,
    recipient: &Address,
    token_ref: &TokenRef,
) -> Result<SpendPlanBuilder, EngineError> {
    let scripts: Vec<_> = wallet
        .script_for(source, ContractType::NonFungible, Some(token_ref))
        .into_iter()
        .collect();
    let coin = ledger
        .available(ContractType::NonFungible, Some(token_ref), &scripts)
        .next()
        .ok_or(EngineError::TokenNotFound {
            token_ref: *token_ref,
        })?;

    Ok(SpendPlanBuilder::new()
        .fixed_input(SpendInput::from_coin(coin, source))
        .fixed_output(TxOutput::new(coin.value, nft_script(recipient, token_ref))))
}

#[cfg(test)]
mod tests {
    use secp256k1::SecretKey;
    use tracing_test::traced_test;

    use super::*;
    use crate::config_models::network::Network;
    use crate::models::blockchain::outpoint::Outpoint;
    use crate::models::blockchain::outpoint::Txid;
    use crate::models::blockchain::script::ScriptKind;
    use crate::models::state::coin::Coin;
    use crate::models::state::coin::CoinOrigin;
    use crate::models::state::wallet::keys::WalletKeys;

    const RATE: FeeRate = FeeRate::new(1);
    const DUST: u64 = 546;

    fn wallet() -> WalletIdentity {
        WalletIdentity::from_keys(
            WalletKeys::new(
                SecretKey::from_slice(&[11; 32]).unwrap(),
                SecretKey::from_slice(&[12; 32]).unwrap(),
            ),
            Network::RegTest,
        )
    }

    fn token() -> TokenRef {
        TokenRef(Outpoint::new(Txid([0xab; 32]), 0))
    }

    fn coin(n: u8, output: TxOutput) -> Coin {
        Coin::from_output(Outpoint::new(Txid([n; 32]), 0), &output, CoinOrigin::Confirmed).unwrap()
    }

    fn ledger(wallet: &WalletIdentity) -> UtxoLedger {
        let primary = &wallet.address;
        UtxoLedger::from_coins([
            coin(1, TxOutput::new(50_000, p2pkh_script(primary))),
            coin(2, TxOutput::new(8_000, p2pkh_script(primary))),
            coin(3, TxOutput::new(30, ft_script(primary, &token()))),
            coin(4, TxOutput::new(45, ft_script(primary, &token()))),
            coin(5, TxOutput::new(1, nft_script(primary, &token()))),
        ])
    }

    fn recipient() -> Address {
        Address::new(Network::RegTest, [0x77; 20])
    }

    #[traced_test]
    #[test]
    fn native_transfer_pays_value_plus_fee() {
        let wallet = wallet();
        let mut ledger = ledger(&wallet);
        let request = TransferRequest::new(Asset::native(20_000), recipient());
        let artifacts = build_transfer(&mut ledger, &wallet, &request, RATE, DUST).unwrap();

        let tx = &artifacts.transaction;
        assert_eq!(20_000, tx.outputs[0].value);
        assert_eq!(1, tx.inputs.len());
        let input_total: u64 = artifacts.selected.inputs.iter().map(|c| c.value).sum();
        assert_eq!(input_total, tx.total_output_value() + artifacts.fee);
        assert!(artifacts.claim.is_some());
    }

    #[test]
    fn fungible_transfer_returns_token_change() {
        let wallet = wallet();
        let mut ledger = ledger(&wallet);
        let request = TransferRequest::new(Asset::fungible(token(), 50), recipient());
        let artifacts = build_transfer(&mut ledger, &wallet, &request, RATE, DUST).unwrap();

        let tx = &artifacts.transaction;
        let token_out: Vec<(u64, ScriptKind)> = tx
            .outputs
            .iter()
            .filter(|o| o.script.classify().token_ref().is_some())
            .map(|o| (o.value, o.script.classify()))
            .collect();
        assert_eq!(50, token_out[0].0);
        assert_eq!(25, token_out[1].0);
        assert_eq!(Some(wallet.address.pubkey_hash()), token_out[1].1.pubkey_hash());

        let token_in: u64 = artifacts
            .selected
            .inputs
            .iter()
            .filter(|c| c.contract_type.is_fungible())
            .map(|c| c.value)
            .sum();
        assert_eq!(75, token_in);
    }

    #[test]
    fn non_fungible_transfer_moves_the_whole_coin() {
        let wallet = wallet();
        let mut ledger = ledger(&wallet);
        let request = TransferRequest::new(Asset::non_fungible(token()), recipient());
        let artifacts = build_transfer(&mut ledger, &wallet, &request, RATE, DUST).unwrap();

        let nft_outputs: Vec<_> = artifacts
            .transaction
            .outputs
            .iter()
            .filter(|o| o.script.classify().contract_type() == Some(ContractType::NonFungible))
            .collect();
        assert_eq!(1, nft_outputs.len());
        assert_eq!(Some(recipient().pubkey_hash()), nft_outputs[0].script.classify().pubkey_hash());
    }

    #[test]
    fn unknown_token_is_token_not_found() {
        let wallet = wallet();
        let mut ledger = ledger(&wallet);
        let other = TokenRef(Outpoint::new(Txid([0xcd; 32]), 1));
        for asset in [Asset::fungible(other, 1), Asset::non_fungible(other)] {
            let request = TransferRequest::new(asset, recipient());
            assert_eq!(
                Err(EngineError::TokenNotFound { token_ref: other }),
                build_transfer(&mut ledger, &wallet, &request, RATE, DUST).map(|_| ())
            );
        }
    }

    #[test]
    fn second_build_cannot_reuse_claimed_coins() {
        let wallet = wallet();
        let mut ledger = ledger(&wallet);
        let request = TransferRequest::new(Asset::non_fungible(token()), recipient());
        build_transfer(&mut ledger, &wallet, &request, RATE, DUST).unwrap();

        assert!(matches!(
            build_transfer(&mut ledger, &wallet, &request, RATE, DUST),
            Err(EngineError::TokenNotFound { .. })
        ));
    }

    #[test]
    fn foreign_network_recipient_is_invalid() {
        let wallet = wallet();
        let mut ledger = ledger(&wallet);
        let request =
            TransferRequest::new(Asset::native(1_000), Address::new(Network::Main, [1; 20]));
        assert!(matches!(
            build_transfer(&mut ledger, &wallet, &request, RATE, DUST),
            Err(EngineError::InvalidAddress(_))
        ));
    }
}
