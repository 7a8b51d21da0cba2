pub mod coin;
pub mod swap;
pub mod tx_creation_artifacts;
pub mod utxo_ledger;
pub mod wallet;
