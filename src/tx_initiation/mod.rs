//! Building, signing and settling wallet transactions.
//!
//! The builders here are synchronous functions over a borrowed
//! [UtxoLedger](crate::models::state::utxo_ledger::UtxoLedger); the
//! [Engine](crate::api::Engine) supplies the lock and the network.

// these represent the public tx_initiation API
pub mod builder;
pub mod error;
pub mod export;
pub mod mint;
pub mod reconcile;
pub mod swap;
pub mod transfer;

// for internal crate usage
pub(crate) mod internal;
