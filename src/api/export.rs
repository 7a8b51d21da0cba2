//! types used by the public api, exported in one location for caller
//! convenience.

pub use crate::api::collaborators::ChainService;
pub use crate::api::collaborators::ContentStore;
pub use crate::api::collaborators::OutputStatus;
pub use crate::api::Engine;
pub use crate::config_models::engine_config::EngineConfig;
pub use crate::config_models::network::Network;
pub use crate::models::blockchain::address::Address;
pub use crate::models::state::coin::Coin;
pub use crate::models::state::coin::CoinOrigin;
pub use crate::models::state::swap::SwapStatus;
pub use crate::models::state::swap::SwapStore;
pub use crate::models::state::swap::TokenSwap;
pub use crate::models::state::utxo_ledger::UtxoLedger;
pub use crate::models::state::wallet::keys::KeyRole;
pub use crate::models::state::wallet::keys::WalletKeys;
pub use crate::models::state::wallet::wallet_identity::WalletIdentity;
pub use crate::tx_initiation::export::*;
