mod common;

use std::sync::Arc;

use common::engine;
use common::logging;
use common::mock_chain::MockChain;
use common::stranger;
use common::wallet;
use glyph_engine::api::export::Asset;
use glyph_engine::api::export::ContractType;
use glyph_engine::api::export::EngineError;
use glyph_engine::api::export::ErrorKind;
use glyph_engine::api::export::FeeRate;
use glyph_engine::api::export::GlyphPayload;
use glyph_engine::api::export::KeyRole;
use glyph_engine::api::export::MainContent;
use glyph_engine::api::export::TransferRequest;
use glyph_engine::models::blockchain::script::p2pkh_script;

/// test: a dry run prices a mint exactly like the real build, and the real
/// build is accepted by the network.
#[tokio::test]
async fn dry_run_matches_real_build() -> anyhow::Result<()> {
    logging::tracing_logger();
    let chain = Arc::new(MockChain::default());
    let wallet = wallet(11);
    let engine = engine(&chain);
    engine
        .insert_coins([chain.fund(p2pkh_script(&wallet.address), 500_000)])
        .await;

    let mut payload = GlyphPayload::non_fungible("Compass");
    payload.content = Some(MainContent::Text {
        text: "points north".into(),
    });
    let rate = FeeRate::new(10);

    let dry = engine.build_mint(&wallet, &payload, rate, true).await?;
    assert!(dry.dry_run);
    assert_eq!(0, chain.broadcast_count());

    let mint = engine.build_mint(&wallet, &payload, rate, false).await?;
    assert_eq!(dry.fees, mint.fees);
    assert_eq!(dry.size, mint.size);
    assert!(mint.total_fee() >= rate.fee_for(mint.size));

    engine.broadcast_mint(&mint).await?;
    assert_eq!(2, chain.broadcast_count());

    chain.mine();
    let report = engine.reconcile().await?;
    assert_eq!(1, report.spent);
    assert_eq!(2, report.confirmed);
    assert_eq!(
        1,
        engine
            .balance(&wallet, KeyRole::Primary, ContractType::NonFungible, Some(&mint.token_ref))
            .await
    );
    Ok(())
}

/// test: inputs equal outputs plus fee, and the fee is the size-based fee
/// plus at most a sub-dust remainder.
#[tokio::test]
async fn transfer_conserves_value() -> anyhow::Result<()> {
    logging::tracing_logger();
    let chain = Arc::new(MockChain::default());
    let wallet = wallet(12);
    let engine = engine(&chain);
    engine
        .insert_coins([
            chain.fund(p2pkh_script(&wallet.address), 3_000),
            chain.fund(p2pkh_script(&wallet.address), 4_000),
        ])
        .await;

    let rate = FeeRate::new(2);
    let request = TransferRequest::new(Asset::native(5_000), stranger());
    let artifacts = engine
        .select_and_build_transfer(&wallet, &request, rate)
        .await?;

    let spent: u64 = artifacts.selected.inputs.iter().map(|c| c.value).sum();
    assert_eq!(spent, artifacts.transaction.total_output_value() + artifacts.fee);
    let size_fee = rate.fee_for(artifacts.size);
    assert!(artifacts.fee >= size_fee);
    assert!(artifacts.fee < size_fee + engine.config().dust_threshold);

    engine.broadcast(&artifacts).await?;
    let change = 7_000 - 5_000 - artifacts.fee;
    assert_eq!(
        change,
        engine
            .balance(&wallet, KeyRole::Primary, ContractType::Native, None)
            .await
    );
    Ok(())
}

/// test: two concurrent builds never select the same coin
#[tokio::test]
async fn concurrent_builds_do_not_share_coins() -> anyhow::Result<()> {
    logging::tracing_logger();
    let chain = Arc::new(MockChain::default());
    let wallet = wallet(13);
    let engine = engine(&chain);
    engine
        .insert_coins([chain.fund(p2pkh_script(&wallet.address), 20_000)])
        .await;

    let request = TransferRequest::new(Asset::native(15_000), stranger());
    let rate = FeeRate::new(1);
    let (first, second) = tokio::join!(
        engine.select_and_build_transfer(&wallet, &request, rate),
        engine.select_and_build_transfer(&wallet, &request, rate),
    );

    let (built, failed) = match (first, second) {
        (Ok(built), Err(e)) | (Err(e), Ok(built)) => (built, e),
        (a, b) => anyhow::bail!("expected exactly one build to succeed: {a:?} {b:?}"),
    };
    assert_eq!(ErrorKind::InsufficientFunds, failed.kind());

    // abandoning returns the coin for the next build
    engine.abandon(built.claim.unwrap()).await;
    engine
        .select_and_build_transfer(&wallet, &request, rate)
        .await?;
    Ok(())
}

/// test: a broadcast the network later forgets is undone by reconciliation
#[tokio::test]
async fn dropped_broadcast_is_reverted() -> anyhow::Result<()> {
    logging::tracing_logger();
    let chain = Arc::new(MockChain::default());
    let wallet = wallet(14);
    let engine = engine(&chain);
    engine
        .insert_coins([chain.fund(p2pkh_script(&wallet.address), 20_000)])
        .await;

    let request = TransferRequest::new(Asset::native(6_000), stranger());
    let artifacts = engine
        .select_and_build_transfer(&wallet, &request, FeeRate::new(1))
        .await?;
    let txid = engine.broadcast(&artifacts).await?;
    assert_ne!(
        20_000,
        engine
            .balance(&wallet, KeyRole::Primary, ContractType::Native, None)
            .await
    );

    // nothing to settle while the spend is still in the mempool
    assert_eq!(0, engine.reconcile().await?.reverted);

    chain.evict(txid);
    let report = engine.reconcile().await?;
    assert_eq!(1, report.reverted);
    assert_eq!(1, report.vanished);
    assert_eq!(
        20_000,
        engine
            .balance(&wallet, KeyRole::Primary, ContractType::Native, None)
            .await
    );
    Ok(())
}

/// test: a broadcast whose reply is lost keeps its inputs out of selection
/// until the chain shows what happened to them.
///
/// scenario:
/// 1. the chain accepts a transfer but the reply times out.
/// 2. the build is abandoned, yet its coin cannot be selected again.
/// 3. once mined, reconciliation settles the spend and the change.
#[tokio::test]
async fn timed_out_broadcast_settles_from_chain() -> anyhow::Result<()> {
    logging::tracing_logger();
    let chain = Arc::new(MockChain::default());
    let wallet = wallet(15);
    let engine = engine(&chain);
    engine
        .insert_coins([chain.fund(p2pkh_script(&wallet.address), 20_000)])
        .await;

    let request = TransferRequest::new(Asset::native(6_000), stranger());
    let artifacts = engine
        .select_and_build_transfer(&wallet, &request, FeeRate::new(1))
        .await?;
    chain.lose_replies(true);
    let failed = engine.broadcast(&artifacts).await;
    assert!(matches!(failed, Err(EngineError::Network(_))));
    chain.lose_replies(false);
    assert!(chain.transaction(artifacts.txid()).is_some());

    assert_eq!(1, engine.abandon(artifacts.claim.unwrap()).await);
    let again = TransferRequest::new(Asset::native(15_000), stranger());
    let rebuilt = engine
        .select_and_build_transfer(&wallet, &again, FeeRate::new(1))
        .await;
    assert_eq!(ErrorKind::InsufficientFunds, rebuilt.unwrap_err().kind());

    chain.mine();
    let report = engine.reconcile().await?;
    assert_eq!(1, report.spent);
    assert_eq!(1, report.confirmed);
    assert_eq!(0, report.reverted);
    assert_eq!(
        20_000 - 6_000 - artifacts.fee,
        engine
            .balance(&wallet, KeyRole::Primary, ContractType::Native, None)
            .await
    );
    Ok(())
}
