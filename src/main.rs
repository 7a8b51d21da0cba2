use std::fs;
use std::path::Path;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use glyph_engine::api::export::Address;
use glyph_engine::api::export::EngineConfig;
use glyph_engine::api::export::FeeRate;
use glyph_engine::api::export::GlyphPayload;
use glyph_engine::api::export::SwapStore;
use glyph_engine::api::export::Transaction;
use glyph_engine::api::export::UtxoLedger;
use glyph_engine::api::export::WalletIdentity;
use glyph_engine::config_models::cli_args;
use glyph_engine::config_models::cli_args::Command;
use glyph_engine::config_models::data_directory::DataDirectory;
use glyph_engine::tx_initiation::mint;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
pub async fn main() -> Result<()> {
    let args = cli_args::Args::parse();

    // Configure logger to use ISO-8601, of which rfc3339 is a subset.
    // Accepted `RUST_LOG` values are `trace`, `debug`, `info`, `warn`,
    // and `error`.
    let info_env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_env_filter(info_env_filter)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set trace subscriber")?;

    let config = EngineConfig::from(&args);
    let data_directory = DataDirectory::get(args.data_dir.clone(), args.network)?;

    match args.command {
        None => {
            info!(network = %args.network, data_dir = %data_directory, "nothing to do; see --help");
            Ok(())
        }
        Some(Command::Inspect { hex }) => inspect(&hex),
        Some(Command::PreviewMint {
            payload,
            ledger,
            address,
            swap_address,
        }) => {
            let ledger = ledger.unwrap_or_else(|| data_directory.ledger_snapshot_file_path());
            preview_mint(&config, &payload, &ledger, &address, swap_address.as_deref()).await
        }
        Some(Command::Swaps { status }) => {
            let store = SwapStore::open(&data_directory.swap_store_file_path())?;
            for record in store.list(status) {
                println!("{record}");
            }
            Ok(())
        }
    }
}

fn inspect(hex: &str) -> Result<()> {
    let tx = Transaction::from_hex(hex).context("not a transaction")?;
    println!("{tx}");
    for (i, input) in tx.inputs.iter().enumerate() {
        println!("  in  {i}: {} ({} byte unlock)", input.prev_out, input.script_sig.len());
    }
    for (i, output) in tx.outputs.iter().enumerate() {
        println!("  out {i}: {} {:?}", output.value, output.script.classify());
    }
    Ok(())
}

async fn preview_mint(
    config: &EngineConfig,
    payload: &Path,
    ledger: &Path,
    address: &str,
    swap_address: Option<&str>,
) -> Result<()> {
    let payload: GlyphPayload = serde_json::from_slice(
        &fs::read(payload).with_context(|| format!("cannot read {}", payload.display()))?,
    )
    .context("invalid payload")?;
    let mut ledger: UtxoLedger = serde_json::from_slice(
        &fs::read(ledger).with_context(|| format!("cannot read {}", ledger.display()))?,
    )
    .context("invalid ledger snapshot")?;

    let address: Address = address.parse()?;
    let swap_address: Address = swap_address.map_or(Ok(address), str::parse)?;
    let wallet = WalletIdentity::watch_only(address, swap_address);

    let fee_rate: FeeRate = config.default_fee_rate;
    let encoded = mint::prepare_payload(&payload, config, None, true).await?;
    let preview = mint::build_mint(
        &mut ledger,
        &wallet,
        &payload,
        encoded,
        fee_rate,
        config.dust_threshold,
        true,
    )?;

    println!("token ref:  {}", preview.token_ref);
    println!("commit fee: {}", preview.fees[0]);
    println!("reveal fee: {}", preview.fees[1]);
    println!("total fee:  {}", preview.total_fee());
    println!("size:       {} bytes", preview.size);
    Ok(())
}
