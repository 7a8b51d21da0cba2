pub mod swap_store;
pub mod token_swap;

pub use swap_store::SwapStore;
pub use token_swap::SwapStatus;
pub use token_swap::TokenSwap;
