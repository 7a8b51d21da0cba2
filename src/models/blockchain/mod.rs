pub mod address;
pub mod encoding;
pub mod fee;
pub mod glyph;
pub mod outpoint;
pub mod payload;
pub mod script;
pub mod sighash;
pub mod transaction;
