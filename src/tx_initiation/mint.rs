//! Token creation by commit and reveal.
//!
//! The commit transaction is an ordinary native payment to a commit script
//! that binds the hash of the payload. The reveal spends that output,
//! pushing the payload in its unlocking script, and creates the token
//! output. The token's reference is the commit's output 0.
//!
//! The commit output carries the token value plus the reveal's fee, so the
//! reveal needs no further funding and its fee can be fixed before the
//! commit is built. Relation tokens (authors and containers) are spent by
//! the reveal and recreated unchanged, proving the minter holds them.

use itertools::Itertools;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::info;

use super::builder::spend_plan::InputSigner;
use super::builder::spend_plan::SpendInput;
use super::builder::spend_plan::SpendPlan;
use super::builder::spend_plan::SpendPlanBuilder;
use super::error::EngineError;
use super::internal::claim_build;
use super::internal::claim_conflict;
use super::internal::native_candidates;
use super::internal::sign_plan;
use crate::api::collaborators::ContentStore;
use crate::config_models::engine_config::EngineConfig;
use crate::models::blockchain::encoding::sha256d;
use crate::models::blockchain::fee::FeeRate;
use crate::models::blockchain::glyph::ContractType;
use crate::models::blockchain::outpoint::Outpoint;
use crate::models::blockchain::outpoint::TokenRef;
use crate::models::blockchain::payload::content_hash;
use crate::models::blockchain::payload::GlyphPayload;
use crate::models::blockchain::payload::MainContent;
use crate::models::blockchain::script::commit_script;
use crate::models::blockchain::script::script_for;
use crate::models::blockchain::script::GLYPH_MAGIC;
use crate::models::blockchain::sighash::SighashType;
use crate::models::blockchain::transaction::TxOutput;
use crate::models::state::coin::Coin;
use crate::models::state::tx_creation_artifacts::TxCreationArtifacts;
use crate::models::state::utxo_ledger::UtxoLedger;
use crate::models::state::wallet::keys::KeyRole;
use crate::models::state::wallet::wallet_identity::WalletIdentity;

/// Both halves of a mint and what they cost.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MintArtifacts {
    pub commit: TxCreationArtifacts,
    pub reveal: TxCreationArtifacts,

    /// `[commit fee, reveal fee]`
    pub fees: [u64; 2],

    /// reference of the new token. Provisional for dry runs, whose commit
    /// txid is that of the unsigned placeholder.
    pub token_ref: TokenRef,

    /// commit plus reveal fee-basis size
    pub size: usize,

    pub dry_run: bool,
}

impl MintArtifacts {
    pub fn total_fee(&self) -> u64 {
        self.fees.iter().sum()
    }
}

/// Resolve oversized content and encode the payload.
///
/// Embedded content above the inline limit is moved to the content store
/// and replaced by its `ipfs://` address and sha256. Dry runs compute the
/// address without uploading.
pub async fn prepare_payload(
    payload: &GlyphPayload,
    config: &EngineConfig,
    content_store: Option<&dyn ContentStore>,
    dry_run: bool,
) -> Result<Vec<u8>, EngineError> {
    let mut payload = payload.clone();
    if let Some(bytes) = payload.content.as_ref().and_then(MainContent::inline_bytes) {
        if bytes.len() > config.max_content_size {
            return Err(EngineError::PayloadTooLarge {
                size: bytes.len(),
                max: config.max_content_size,
            });
        }
    }

    if let Some(MainContent::Embedded { extension, bytes }) = &payload.content {
        if bytes.len() > config.inline_content_limit {
            let store = content_store.ok_or_else(|| {
                EngineError::Network("content exceeds the inline limit and no content store is configured".into())
            })?;
            let address = if dry_run {
                store.address_of(bytes)
            } else {
                store.upload(bytes.clone()).await?
            };
            debug!(%address, size = bytes.len(), dry_run, "mint content stored remotely");
            payload.content = Some(MainContent::Remote {
                extension: extension.clone(),
                url: format!("ipfs://{address}"),
                sha256: Some(content_hash(bytes)),
            });
        }
    }

    let encoded = payload.encode()?;
    if encoded.len() > config.max_payload_size {
        return Err(EngineError::PayloadTooLarge {
            size: encoded.len(),
            max: config.max_payload_size,
        });
    }
    Ok(encoded)
}

/// Build the commit and reveal of a mint.
///
/// `encoded` is the output of [prepare_payload]. Outside a dry run the commit
/// inputs and relation coins are claimed together under one claim, recorded
/// on both artifacts.
pub fn build_mint(
    ledger: &mut UtxoLedger,
    wallet: &WalletIdentity,
    payload: &GlyphPayload,
    encoded: Vec<u8>,
    fee_rate: FeeRate,
    dust_threshold: u64,
    dry_run: bool,
) -> Result<MintArtifacts, EngineError> {
    let token_value = payload.token_value();
    let relations = relation_inputs(ledger, wallet, payload)?;
    let commit_lock = commit_script(&wallet.address, &sha256d(&encoded));

    // the reveal's size does not depend on the commit txid or token ref
    let provisional = reveal_plan(
        wallet,
        payload.contract_type,
        Outpoint::default(),
        TxOutput::new(token_value, commit_lock.clone()),
        token_value,
        &relations,
        &encoded,
    )?;
    let reveal_size = provisional.placeholder_transaction().size();
    let reveal_fee = fee_rate.fee_for(reveal_size);
    let commit_value = token_value.saturating_add(reveal_fee);

    let commit_plan = SpendPlanBuilder::new()
        .fixed_output(TxOutput::new(commit_value, commit_lock))
        .native_candidates(native_candidates(ledger, wallet, &[KeyRole::Primary]))
        .change_script(wallet.native_script(KeyRole::Primary))
        .fee_rate(fee_rate)
        .dust_threshold(dust_threshold)
        .build()?;
    let mut commit = sign_plan(commit_plan, wallet, dry_run)?;

    let commit_out = commit.transaction.outpoint(0);
    let token_ref = TokenRef(commit_out);
    let mut plan = reveal_plan(
        wallet,
        payload.contract_type,
        commit_out,
        commit.transaction.outputs[0].clone(),
        token_value,
        &relations,
        &encoded,
    )?;
    plan.fee = reveal_fee;
    plan.fee_basis_size = reveal_size;
    let mut reveal = sign_plan(plan, wallet, dry_run)?;

    if !dry_run {
        let outpoints = commit
            .selected
            .input_outpoints()
            .into_iter()
            .chain(relations.iter().map(|c| c.outpoint))
            .collect_vec();
        let id = claim_build(ledger, &outpoints).map_err(|e| claim_conflict(&e, commit_value))?;
        commit.claim = Some(id);
        reveal.claim = Some(id);
    }

    let artifacts = MintArtifacts {
        fees: [commit.fee, reveal.fee],
        size: commit.size + reveal.size,
        commit,
        reveal,
        token_ref,
        dry_run,
    };
    info!(
        token_ref = %artifacts.token_ref,
        contract_type = %payload.contract_type,
        commit_fee = artifacts.fees[0],
        reveal_fee = artifacts.fees[1],
        size = artifacts.size,
        dry_run,
        "built mint"
    );
    Ok(artifacts)
}

/// Unclaimed coins proving the wallet holds every relation of `payload`.
fn relation_inputs(
    ledger: &UtxoLedger,
    wallet: &WalletIdentity,
    payload: &GlyphPayload,
) -> Result<Vec<Coin>, EngineError> {
    payload
        .relations()
        .unique()
        .map(|token_ref| {
            let scripts: Vec<_> = [KeyRole::Primary, KeyRole::Swap]
                .into_iter()
                .filter_map(|role| wallet.script_for(role, ContractType::NonFungible, Some(token_ref)))
                .collect();
            let held = ledger
                .available(ContractType::NonFungible, Some(token_ref), &scripts)
                .next()
                .cloned();
            held.ok_or(EngineError::RelationNotOwned {
                token_ref: *token_ref,
            })
        })
        .collect()
}

fn reveal_plan(
    wallet: &WalletIdentity,
    contract_type: ContractType,
    commit_out: Outpoint,
    commit_output: TxOutput,
    token_value: u64,
    relations: &[Coin],
    encoded: &[u8],
) -> Result<SpendPlan, EngineError> {
    let token_ref = TokenRef(commit_out);
    let token_script = script_for(contract_type, &wallet.address, Some(&token_ref))
        .filter(|_| !contract_type.is_native())
        .ok_or_else(|| EngineError::Encoding(format!("cannot mint a {contract_type} token")))?;

    let mut inputs = vec![SpendInput {
        outpoint: commit_out,
        prev_output: commit_output,
        signer: InputSigner::Wallet {
            role: KeyRole::Primary,
            sighash_type: SighashType::All,
            extra_pushes: vec![GLYPH_MAGIC.to_vec(), encoded.to_vec()],
        },
    }];
    let mut outputs = vec![TxOutput::new(token_value, token_script)];
    for coin in relations {
        let role = wallet.owner_of(&coin.script).unwrap_or_default();
        inputs.push(SpendInput::from_coin(coin, role));
        outputs.push(coin.as_tx_output());
    }

    Ok(SpendPlan {
        inputs,
        outputs,
        change_index: None,
        fee: 0,
        fee_basis_size: 0,
    })
}

#[cfg(test)]
mod tests {
    use secp256k1::SecretKey;
    use tracing_test::traced_test;

    use super::*;
    use crate::config_models::network::Network;
    use crate::models::blockchain::outpoint::Txid;
    use crate::models::blockchain::script::nft_script;
    use crate::models::blockchain::script::p2pkh_script;
    use crate::models::blockchain::script::ScriptKind;
    use crate::models::blockchain::sighash::verify_input;
    use crate::models::state::coin::CoinOrigin;
    use crate::models::state::wallet::keys::WalletKeys;

    const RATE: FeeRate = FeeRate::new(2);

    fn wallet() -> WalletIdentity {
        WalletIdentity::from_keys(
            WalletKeys::new(
                SecretKey::from_slice(&[21; 32]).unwrap(),
                SecretKey::from_slice(&[22; 32]).unwrap(),
            ),
            Network::RegTest,
        )
    }

    fn author() -> TokenRef {
        TokenRef(Outpoint::new(Txid([0x5a; 32]), 1))
    }

    fn ledger(wallet: &WalletIdentity) -> UtxoLedger {
        let coin = |n: u8, output: TxOutput| {
            Coin::from_output(Outpoint::new(Txid([n; 32]), 0), &output, CoinOrigin::Confirmed)
                .unwrap()
        };
        UtxoLedger::from_coins([
            coin(1, TxOutput::new(400_000, p2pkh_script(&wallet.address))),
            coin(2, TxOutput::new(1, nft_script(&wallet.address, &author()))),
        ])
    }

    fn payload() -> GlyphPayload {
        let mut payload = GlyphPayload::non_fungible("Lantern");
        payload.authors.push(author());
        payload.content = Some(MainContent::Text {
            text: "a small light".into(),
        });
        payload
    }

    #[traced_test]
    #[tokio::test]
    async fn dry_run_matches_real_mint() {
        let wallet = wallet();
        let config = EngineConfig::default();
        let encoded = prepare_payload(&payload(), &config, None, true).await.unwrap();

        let mut ledger = ledger(&wallet);
        let dry = build_mint(&mut ledger, &wallet, &payload(), encoded.clone(), RATE, 546, true)
            .unwrap();
        assert_eq!(None, ledger.claim_of(&Outpoint::new(Txid([1; 32]), 0)));

        let real = build_mint(&mut ledger, &wallet, &payload(), encoded, RATE, 546, false).unwrap();
        assert_eq!(dry.fees, real.fees);
        assert_eq!(dry.size, real.size);
        assert!(real.commit.claim.is_some());
        assert_eq!(real.commit.claim, real.reveal.claim);
    }

    #[tokio::test]
    async fn reveal_spends_commit_and_recreates_relation() {
        let wallet = wallet();
        let encoded = prepare_payload(&payload(), &EngineConfig::default(), None, false)
            .await
            .unwrap();
        let mut ledger = ledger(&wallet);
        let mint = build_mint(&mut ledger, &wallet, &payload(), encoded, RATE, 546, false).unwrap();

        let reveal = &mint.reveal.transaction;
        assert_eq!(mint.token_ref.outpoint(), reveal.inputs[0].prev_out);
        assert_eq!(
            ScriptKind::NonFungible {
                pubkey_hash: *wallet.address.pubkey_hash(),
                token_ref: mint.token_ref
            },
            reveal.outputs[0].script.classify()
        );
        assert_eq!(1, reveal.outputs[0].value);
        assert_eq!(Some(author()), reveal.outputs[1].script.classify().token_ref());

        let commit_out = &mint.commit.transaction.outputs[0];
        let sighash = verify_input(
            reveal,
            0,
            &commit_out.script,
            commit_out.value,
            wallet.address.pubkey_hash(),
        );
        assert_eq!(Ok(SighashType::All), sighash);
        assert_eq!(commit_out.value - 1, mint.fees[1]);
    }

    #[test]
    fn missing_relation_is_not_owned() {
        let wallet = wallet();
        let mut payload = payload();
        let container = TokenRef(Outpoint::new(Txid([0x6b; 32]), 0));
        payload.containers.push(container);
        let mut ledger = ledger(&wallet);

        let err = build_mint(&mut ledger, &wallet, &payload, vec![0xa0], RATE, 546, false)
            .unwrap_err();
        assert_eq!(
            EngineError::RelationNotOwned {
                token_ref: container
            },
            err
        );
    }

    #[tokio::test]
    async fn oversized_content_is_rejected() {
        let config = EngineConfig {
            max_content_size: 8,
            ..EngineConfig::default()
        };
        let mut payload = payload();
        payload.content = Some(MainContent::Embedded {
            extension: "bin".into(),
            bytes: vec![0; 9],
        });
        assert_eq!(
            Err(EngineError::PayloadTooLarge { size: 9, max: 8 }),
            prepare_payload(&payload, &config, None, true).await
        );
    }
}
