#![deny(clippy::shadow_unrelated)]
//
// If code coverage tool `cargo-llvm-cov` is running with the nightly toolchain,
// enable the unstable "coverage" attribute. Annotate `#[cfg(test)]` modules
// with `#[cfg_attr(coverage_nightly, coverage(off))]` to exclude them.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Multi-asset UTXO transaction construction and atomic swap settlement for
//! glyph tokens.
//!
//! Start with [api::Engine]; the types it speaks are re-exported from
//! [api::export].

pub mod api;
pub mod config_models;
pub mod locks;
pub mod models;
pub mod tx_initiation;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
