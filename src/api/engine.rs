// private module.  no need for module docs.

use std::sync::Arc;

use tracing::info;
use tracing::warn;

use crate::api::collaborators::ChainService;
use crate::api::collaborators::ContentStore;
use crate::config_models::engine_config::EngineConfig;
use crate::locks::tokio::AtomicMutex;
use crate::models::blockchain::fee::FeeRate;
use crate::models::blockchain::glyph::Asset;
use crate::models::blockchain::glyph::ContractType;
use crate::models::blockchain::outpoint::TokenRef;
use crate::models::blockchain::outpoint::Txid;
use crate::models::blockchain::payload::GlyphPayload;
use crate::models::state::coin::Coin;
use crate::models::state::coin::CoinOrigin;
use crate::models::state::swap::swap_store::Transition;
use crate::models::state::swap::SwapStatus;
use crate::models::state::swap::SwapStore;
use crate::models::state::swap::TokenSwap;
use crate::models::state::tx_creation_artifacts::TxCreationArtifacts;
use crate::models::state::utxo_ledger::Claim;
use crate::models::state::utxo_ledger::ClaimId;
use crate::models::state::utxo_ledger::UtxoLedger;
use crate::models::state::wallet::keys::KeyRole;
use crate::models::state::wallet::wallet_identity::WalletIdentity;
use crate::tx_initiation::error::EngineError;
use crate::tx_initiation::error::SwapError;
use crate::tx_initiation::internal::claim_build;
use crate::tx_initiation::internal::claim_conflict;
use crate::tx_initiation::internal::sign_plan;
use crate::tx_initiation::mint;
use crate::tx_initiation::mint::MintArtifacts;
use crate::tx_initiation::reconcile;
use crate::tx_initiation::reconcile::ReconcileReport;
use crate::tx_initiation::swap;
use crate::tx_initiation::swap::AcceptedSwap;
use crate::tx_initiation::swap::SwapOffer;
use crate::tx_initiation::transfer;
use crate::tx_initiation::transfer::TransferRequest;

/// Transaction and swap engine over one wallet's ledger.
///
/// The engine owns the UTXO ledger and the swap store; the wallet identity
/// and fee rate are passed to every call. Clones share state.
///
/// Coin selection and the claim on the selected coins happen under one
/// acquisition of the ledger lock, so concurrent builds never select the
/// same coin. When both locks are needed the ledger is locked first.
#[derive(Clone)]
pub struct Engine {
    config: EngineConfig,
    chain: Arc<dyn ChainService>,
    content_store: Option<Arc<dyn ContentStore>>,
    ledger: AtomicMutex<UtxoLedger>,
    swaps: AtomicMutex<SwapStore>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("content_store", &self.content_store.is_some())
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Engine over `ledger` and `swaps`.
    ///
    /// Escrows of pending swap records are claimed again, so ordinary
    /// builds cannot spend them.
    pub fn new(
        config: EngineConfig,
        chain: Arc<dyn ChainService>,
        mut ledger: UtxoLedger,
        swaps: SwapStore,
    ) -> Self {
        reserve_escrows(&mut ledger, &swaps);
        Self {
            config,
            chain,
            content_store: None,
            ledger: ledger.into(),
            swaps: swaps.into(),
        }
    }

    pub fn with_content_store(mut self, store: Arc<dyn ContentStore>) -> Self {
        self.content_store = Some(store);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// copy of the ledger, for persistence or inspection
    pub async fn ledger_snapshot(&self) -> UtxoLedger {
        self.ledger.lock(|l| l.clone()).await
    }

    /// Add coins discovered outside the engine, such as wallet history.
    pub async fn insert_coins(&self, coins: impl IntoIterator<Item = Coin>) {
        let mut ledger = self.ledger.lock_guard_mut().await;
        for coin in coins {
            ledger.insert(coin);
        }
    }

    /// Spendable balance of `role`'s coins of one asset class.
    pub async fn balance(
        &self,
        wallet: &WalletIdentity,
        role: KeyRole,
        contract_type: ContractType,
        token_ref: Option<&TokenRef>,
    ) -> u64 {
        let scripts: Vec<_> = wallet.script_for(role, contract_type, token_ref).into_iter().collect();
        self.ledger
            .lock(|l| l.balance(contract_type, token_ref, &scripts))
            .await
    }

    /// Price a transfer. Nothing is claimed and nothing is signed.
    pub async fn plan_transfer(
        &self,
        wallet: &WalletIdentity,
        request: &TransferRequest,
        fee_rate: FeeRate,
    ) -> Result<TxCreationArtifacts, EngineError> {
        let dust = self.config.dust_threshold;
        let ledger = self.ledger.lock_guard_mut().await;
        let plan = transfer::plan_transfer(&ledger, wallet, request, fee_rate, dust)?;
        sign_plan(plan, wallet, true)
    }

    /// Select, sign and claim a transfer, ready for [Self::broadcast].
    pub async fn select_and_build_transfer(
        &self,
        wallet: &WalletIdentity,
        request: &TransferRequest,
        fee_rate: FeeRate,
    ) -> Result<TxCreationArtifacts, EngineError> {
        let dust = self.config.dust_threshold;
        let mut ledger = self.ledger.lock_guard_mut().await;
        transfer::build_transfer(&mut ledger, wallet, request, fee_rate, dust)
    }

    /// Hand a built transaction to the network and record it.
    ///
    /// On failure the claim is kept: the caller may retry, or release the
    /// coins with [Self::abandon].
    ///
    /// A [EngineError::Network] failure does not prove the network refused
    /// the transaction, so its inputs are recorded as submitted under the
    /// built txid and stay out of selection until [Self::reconcile] settles
    /// them as spent or dropped.
    pub async fn broadcast(&self, artifacts: &TxCreationArtifacts) -> Result<Txid, EngineError> {
        if artifacts.is_dry_run() {
            return Err(EngineError::Encoding("a dry run cannot be broadcast".into()));
        }
        let txid = match self.chain.broadcast(&artifacts.to_hex()).await {
            Ok(txid) => txid,
            Err(e @ EngineError::Network(_)) => {
                self.ledger
                    .lock_mut(|l| reconcile::record_unknown_outcome(l, artifacts))
                    .await;
                warn!(built = %artifacts.txid(), %e, "broadcast outcome unknown");
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        if txid != artifacts.txid() {
            warn!(reported = %txid, built = %artifacts.txid(), "chain reported a different txid");
        }
        self.ledger
            .lock_mut(|l| reconcile::record_broadcast(l, artifacts, txid))
            .await;
        info!(%txid, fee = artifacts.fee, "broadcast transaction");
        Ok(txid)
    }

    /// Release the coins of a built transaction that will not be broadcast.
    pub async fn abandon(&self, claim: ClaimId) -> usize {
        let released = self.ledger.lock_mut(|l| l.release(Claim::Build(claim))).await;
        info!(%claim, released, "abandoned build");
        released
    }

    /// Settle submitted spends and unconfirmed coins against the chain.
    ///
    /// Escrows freed by a dropped cancellation are reserved for their swap
    /// again.
    pub async fn reconcile(&self) -> Result<ReconcileReport, EngineError> {
        let unsettled = self.ledger.lock(|l| l.unsettled()).await;
        let settlements = reconcile::observe(self.chain.as_ref(), &unsettled).await?;
        let mut ledger = self.ledger.lock_guard_mut().await;
        let report = reconcile::apply(&mut ledger, &settlements);
        if report.reverted > 0 {
            let swaps = self.swaps.lock_guard_mut().await;
            reserve_escrows(&mut ledger, &swaps);
        }
        Ok(report)
    }

    /// Build the commit and reveal of a new token.
    ///
    /// A dry run claims nothing, uploads nothing and leaves placeholder
    /// signatures, but reports exactly the fees and size of the real build.
    pub async fn build_mint(
        &self,
        wallet: &WalletIdentity,
        payload: &GlyphPayload,
        fee_rate: FeeRate,
        dry_run: bool,
    ) -> Result<MintArtifacts, EngineError> {
        let encoded = mint::prepare_payload(
            payload,
            &self.config,
            self.content_store.as_deref(),
            dry_run,
        )
        .await?;
        let dust = self.config.dust_threshold;
        let mut ledger = self.ledger.lock_guard_mut().await;
        mint::build_mint(&mut ledger, wallet, payload, encoded, fee_rate, dust, dry_run)
    }

    /// Broadcast the commit, then the reveal.
    ///
    /// If the reveal fails the commit stays broadcast and the relation
    /// coins stay claimed; retry with [Self::broadcast] on `mint.reveal`.
    pub async fn broadcast_mint(&self, mint: &MintArtifacts) -> Result<[Txid; 2], EngineError> {
        let commit = self.broadcast(&mint.commit).await?;
        let reveal = self.broadcast(&mint.reveal).await?;
        info!(token_ref = %mint.token_ref, %commit, %reveal, "minted token");
        Ok([commit, reveal])
    }

    /// Escrow `offered` at the swap address and record a proposal for
    /// `requested`.
    ///
    /// The returned record's raw transaction is what the counterparty
    /// accepts. `fee_rate` prices the escrow transfer; the proposal itself
    /// carries no fee.
    pub async fn propose_swap(
        &self,
        wallet: &WalletIdentity,
        offered: &Asset,
        requested: &Asset,
        fee_rate: FeeRate,
    ) -> Result<TokenSwap, EngineError> {
        let request = TransferRequest::new(offered.clone(), wallet.swap_address);
        let escrow_tx = self.select_and_build_transfer(wallet, &request, fee_rate).await?;
        let escrow_txid = match self.broadcast(&escrow_tx).await {
            Ok(txid) => txid,
            Err(e) => {
                if let Some(claim) = escrow_tx.claim {
                    self.abandon(claim).await;
                }
                return Err(e);
            }
        };
        let escrow_out = escrow_tx.transaction.outpoint(0);

        let mut ledger = self.ledger.lock_guard_mut().await;
        let escrow = ledger
            .get(&escrow_out)
            .cloned()
            .ok_or_else(|| EngineError::asset_not_held(format!("escrow {escrow_out} was not recorded")))?;
        let proposal = swap::build_proposal(wallet, &escrow, requested)?;
        let claim = claim_build(&mut ledger, &[escrow_out])
            .map_err(|e| claim_conflict(&e, escrow.value))?;

        let offered = swap::asset_of_output(&escrow.as_tx_output()).unwrap_or_else(|| offered.clone());
        let record = TokenSwap::pending(&offered, requested, proposal.to_hex(), escrow_txid);
        let inserted = self.swaps.lock_mut(|s| s.insert(record.clone())).await;
        match inserted {
            Ok(id) => {
                ledger.transfer_claim(Claim::Build(claim), Claim::Swap(id));
                info!(swap = id, %offered, %requested, escrow = %escrow_out, "proposed swap");
                Ok(TokenSwap { id, ..record })
            }
            Err(e) => {
                ledger.release(Claim::Build(claim));
                Err(e.into())
            }
        }
    }

    /// Decode a counterparty's proposal and check it against the chain.
    pub async fn load_swap(&self, raw_tx_hex: &str) -> Result<SwapOffer, EngineError> {
        let tx = swap::decode_proposal(raw_tx_hex)?;
        let escrow = self.chain.fetch_output(tx.inputs[0].prev_out).await?;
        swap::check_offer(tx, escrow)
    }

    /// Complete `offer` with this wallet's payment of `mine`.
    ///
    /// The returned swap is fully signed and its coins claimed; hand it to
    /// [Self::complete_swap].
    pub async fn accept_swap(
        &self,
        wallet: &WalletIdentity,
        offer: SwapOffer,
        mine: &Asset,
        fee_rate: FeeRate,
    ) -> Result<AcceptedSwap, EngineError> {
        let dust = self.config.dust_threshold;
        let mut ledger = self.ledger.lock_guard_mut().await;
        swap::build_acceptance(&mut ledger, wallet, offer, mine, fee_rate, dust)
    }

    /// Broadcast an accepted swap and record it as completed.
    pub async fn complete_swap(&self, accepted: &AcceptedSwap) -> Result<TokenSwap, EngineError> {
        let txid = self.broadcast(&accepted.artifacts).await?;
        let record = accepted.completed_record();
        let id = self.swaps.lock_mut(|s| s.insert(record.clone())).await?;
        info!(swap = id, %txid, "completed swap");
        Ok(TokenSwap { id, ..record })
    }

    /// Spend the escrow of pending swap `id` back to the primary address.
    ///
    /// This races the counterparty: whichever spend of the escrow the
    /// network accepts first wins, and the loser's broadcast fails. If the
    /// cancellation loses, the record stays pending until
    /// [Self::refresh_swaps] observes the completion. A cancellation whose
    /// outcome is unknown is settled the same way, and if the network never
    /// saw it [Self::reconcile] reserves the escrow for the swap again.
    pub async fn cancel_swap(
        &self,
        wallet: &WalletIdentity,
        id: u64,
        fee_rate: FeeRate,
    ) -> Result<TxCreationArtifacts, EngineError> {
        let dust = self.config.dust_threshold;
        let (artifacts, claim, escrow) = {
            let mut ledger = self.ledger.lock_guard_mut().await;
            let swaps = self.swaps.lock_guard_mut().await;
            let record = swaps.get(id).ok_or(SwapError::UnknownSwap(id))?;
            if !record.status.is_pending() {
                return Err(SwapError::NotPending(id).into());
            }
            let escrow = record.escrow();
            if matches!(ledger.claim_of(&escrow), Some(Claim::Build(_))) {
                // a cancellation is already in flight
                return Err(SwapError::NotPending(id).into());
            }

            let mut artifacts = swap::build_cancel(&ledger, wallet, record, fee_rate, dust)?;
            let claim = ledger.new_claim_id();
            ledger.transfer_claim(Claim::Swap(id), Claim::Build(claim));
            if let Err(e) = ledger.claim(&artifacts.selected.input_outpoints(), Claim::Build(claim)) {
                ledger.release(Claim::Build(claim));
                if let Err(reclaim) = ledger.claim(&[escrow], Claim::Swap(id)) {
                    warn!(swap = id, %reclaim, "cannot reserve escrow again");
                }
                return Err(claim_conflict(&e, artifacts.fee));
            }
            artifacts.claim = Some(claim);
            (artifacts, claim, escrow)
        };

        match self.broadcast(&artifacts).await {
            Ok(txid) => {
                let transition = self.swaps.lock_mut(|s| s.transition(id, SwapStatus::Cancel)).await?;
                if let Transition::AlreadyTerminal(status) = transition {
                    warn!(swap = id, %status, "cancelled swap had already settled");
                }
                info!(swap = id, %txid, "cancelled swap");
                Ok(artifacts)
            }
            Err(e) => {
                let mut ledger = self.ledger.lock_guard_mut().await;
                ledger.release(Claim::Build(claim));
                // a cancellation that may have reached the network keeps the
                // escrow submitted, so refresh_swaps can still recognize it
                if ledger.own_spend_of(&escrow).is_none() {
                    if let Err(reclaim) = ledger.claim(&[escrow], Claim::Swap(id)) {
                        warn!(swap = id, %reclaim, "cannot reserve escrow again");
                    }
                }
                warn!(swap = id, %e, "cancellation was not accepted");
                Err(e)
            }
        }
    }

    /// Settle pending proposals whose escrow has been spent.
    ///
    /// Returns the records that changed status.
    pub async fn refresh_swaps(&self) -> Result<Vec<TokenSwap>, EngineError> {
        let pending = self.swaps.lock(|s| s.list(Some(SwapStatus::Pending))).await;
        let mut changed = vec![];

        for record in pending {
            let escrow = record.escrow();
            let resolved = match self.chain.fetch_output(escrow).await? {
                None => Some((SwapStatus::Missing, None)),
                Some(status) => match status.spent_by {
                    None => None,
                    Some(spender_txid) => {
                        let spender = self.chain.fetch_transaction(spender_txid).await?;
                        let own = self.ledger.lock(|l| l.own_spend_of(&escrow)).await;
                        let status =
                            swap::resolve_spent_escrow(&record, spender_txid, spender.as_ref(), own);
                        Some((status, Some((spender_txid, spender))))
                    }
                },
            };
            let Some((status, spend)) = resolved else {
                continue;
            };

            let mut ledger = self.ledger.lock_guard_mut().await;
            let mut swaps = self.swaps.lock_guard_mut().await;
            if let Some((spender_txid, spender)) = &spend {
                ledger.mark_spent(&escrow, *spender_txid);
                if let (SwapStatus::Completed, Some(tx)) = (status, spender) {
                    if let Some(vout) = swap::proceeds_index(&record, tx) {
                        let outpoint = tx.outpoint(vout);
                        let proceeds = tx.outputs.get(vout as usize).and_then(|o| {
                            Coin::from_output(outpoint, o, CoinOrigin::Unconfirmed)
                        });
                        if let Some(coin) = proceeds {
                            ledger.insert(coin);
                        }
                    }
                }
            }
            ledger.release(Claim::Swap(record.id));

            if swaps.transition(record.id, status)? == Transition::Applied {
                info!(swap = record.id, %status, "swap settled");
                changed.push(TokenSwap { status, ..record });
            }
        }
        Ok(changed)
    }

    /// Swap records with `status`, or all records.
    pub async fn list_swaps(&self, status: Option<SwapStatus>) -> Vec<TokenSwap> {
        self.swaps.lock(|s| s.list(status)).await
    }
}

/// Claim the unspent escrow of each pending swap for that swap.
///
/// Escrows that are already claimed or carry a spend of ours are left
/// alone.
fn reserve_escrows(ledger: &mut UtxoLedger, swaps: &SwapStore) {
    for record in swaps.list(Some(SwapStatus::Pending)) {
        let escrow = record.escrow();
        if ledger.claim_of(&escrow).is_some() || ledger.own_spend_of(&escrow).is_some() {
            continue;
        }
        if let Err(e) = ledger.claim(&[escrow], Claim::Swap(record.id)) {
            warn!(swap = record.id, %e, "cannot reserve escrow of pending swap");
        }
    }
}
