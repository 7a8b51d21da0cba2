//! Building blocks shared by the transfer, mint and swap builders.
//!
//! -----------
//!
//! A transfer is built in three steps:
//!
//! 1. coin selection: [coin_selector] picks token coins covering the target
//!    and, fee-aware, the native coins that pay for everything.
//! 2. planning: [spend_plan::SpendPlanBuilder] fixes input and output order,
//!    adds native change above dust and prices the result.
//! 3. signing: [transaction_builder::TransactionBuilder] fills in unlocking
//!    scripts, or placeholders for a dry run.
//!
//! The selected coins are claimed in the ledger after step 3 succeeds, under
//! the same lock acquisition as the selection in step 1. A build that fails
//! to sign therefore holds nothing.

pub mod coin_selector;
pub mod spend_plan;
pub mod transaction_builder;
