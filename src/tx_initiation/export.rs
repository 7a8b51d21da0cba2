//! These are types used in the tx_initiation public API, including inputs,
//! outputs, and errors.
//!
//! They are exported here in one location for caller convenience.

pub use crate::models::blockchain::fee::FeeRate;
pub use crate::models::blockchain::glyph::Asset;
pub use crate::models::blockchain::glyph::ContractType;
pub use crate::models::blockchain::glyph::Glyph;
pub use crate::models::blockchain::outpoint::Outpoint;
pub use crate::models::blockchain::outpoint::TokenRef;
pub use crate::models::blockchain::outpoint::Txid;
pub use crate::models::blockchain::payload::GlyphPayload;
pub use crate::models::blockchain::payload::MainContent;
pub use crate::models::blockchain::payload::TokenKind;
pub use crate::models::blockchain::transaction::Transaction;
pub use crate::models::state::tx_creation_artifacts::Selected;
pub use crate::models::state::tx_creation_artifacts::TxCreationArtifacts;
pub use crate::models::state::utxo_ledger::ClaimId;
pub use crate::tx_initiation::builder::coin_selector::SelectionPriority;
pub use crate::tx_initiation::error::EngineError;
pub use crate::tx_initiation::error::ErrorKind;
pub use crate::tx_initiation::error::SwapError;
pub use crate::tx_initiation::mint::MintArtifacts;
pub use crate::tx_initiation::reconcile::ReconcileReport;
pub use crate::tx_initiation::swap::AcceptedSwap;
pub use crate::tx_initiation::swap::SwapOffer;
pub use crate::tx_initiation::transfer::TransferRequest;
