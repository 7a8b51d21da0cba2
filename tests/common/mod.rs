#![allow(dead_code)]

pub mod logging;
pub mod mock_chain;

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use glyph_engine::api::export::Address;
use glyph_engine::api::export::Engine;
use glyph_engine::api::export::EngineConfig;
use glyph_engine::api::export::Network;
use glyph_engine::api::export::SwapStore;
use glyph_engine::api::export::UtxoLedger;
use glyph_engine::api::export::WalletIdentity;
use glyph_engine::api::export::WalletKeys;
use glyph_engine::config_models::data_directory::DataDirectory;
use mock_chain::MockChain;
use rand::distr::Alphanumeric;
use rand::distr::SampleString;
use secp256k1::SecretKey;

/// Create a randomly named `DataDirectory` so filesystem-bound tests can run
/// in parallel.
pub fn integration_test_data_directory(network: Network) -> anyhow::Result<DataDirectory> {
    let mut rng = rand::rng();
    let user = std::env::var("USER").unwrap_or_else(|_| "default".to_string());
    let tmp_root: PathBuf = std::env::temp_dir()
        .join(format!("glyph-engine-integration-tests-{}", user))
        .join(Path::new(&Alphanumeric.sample_string(&mut rng, 16)));

    DataDirectory::get(Some(tmp_root), network)
}

/// Low dust so that small test values still produce change.
pub fn test_config() -> EngineConfig {
    EngineConfig {
        dust_threshold: 100,
        ..EngineConfig::for_network(Network::RegTest)
    }
}

pub fn wallet(seed: u8) -> WalletIdentity {
    let primary = SecretKey::from_slice(&[seed; 32]).unwrap();
    let swap = SecretKey::from_slice(&[seed.wrapping_add(100); 32]).unwrap();
    WalletIdentity::from_keys(WalletKeys::new(primary, swap), Network::RegTest)
}

/// A wallet's engine over an in-memory swap store.
pub fn engine(chain: &Arc<MockChain>) -> Engine {
    Engine::new(
        test_config(),
        chain.clone(),
        UtxoLedger::new(),
        SwapStore::in_memory(),
    )
}

pub fn stranger() -> Address {
    Address::new(Network::RegTest, [0x5e; 20])
}
