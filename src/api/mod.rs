//! public api for building, broadcasting and tracking glyph transactions.
//!
//! [Engine] is the entry point: it owns the UTXO ledger and the swap store
//! and drives the builders in [tx_initiation](crate::tx_initiation) against
//! a [ChainService](collaborators::ChainService). Everything a caller needs
//! is re-exported from [export].
pub mod collaborators;
pub mod export;

mod engine;

pub use engine::Engine;
