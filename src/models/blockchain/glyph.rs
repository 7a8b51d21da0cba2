use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use super::outpoint::TokenRef;

/// The three kinds of value a coin can carry.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::EnumIs,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum ContractType {
    Native,
    Fungible,
    NonFungible,
}

/// On-chain identity of a token.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Glyph {
    pub token_ref: TokenRef,

    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
}

impl Glyph {
    pub fn new(token_ref: TokenRef) -> Self {
        Self {
            token_ref,
            name: String::new(),
            ticker: None,
        }
    }

    pub fn named(token_ref: TokenRef, name: impl Into<String>, ticker: Option<String>) -> Self {
        Self {
            token_ref,
            name: name.into(),
            ticker,
        }
    }
}

/// A value-bearing reference to native coin or a token.
///
/// Equality of the token part is by reference only; names and tickers are
/// display metadata.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Asset {
    Native { value: u64 },
    Fungible { glyph: Glyph, value: u64 },

    /// NFT coins move whole; `value` is the native value the coin carries.
    NonFungible { glyph: Glyph, value: u64 },
}

impl Asset {
    pub fn native(value: u64) -> Self {
        Self::Native { value }
    }

    pub fn fungible(token_ref: TokenRef, value: u64) -> Self {
        Self::Fungible {
            glyph: Glyph::new(token_ref),
            value,
        }
    }

    /// NFT carrying the conventional singleton value of 1.
    pub fn non_fungible(token_ref: TokenRef) -> Self {
        Self::NonFungible {
            glyph: Glyph::new(token_ref),
            value: 1,
        }
    }

    pub fn contract_type(&self) -> ContractType {
        match self {
            Self::Native { .. } => ContractType::Native,
            Self::Fungible { .. } => ContractType::Fungible,
            Self::NonFungible { .. } => ContractType::NonFungible,
        }
    }

    pub fn value(&self) -> u64 {
        match self {
            Self::Native { value }
            | Self::Fungible { value, .. }
            | Self::NonFungible { value, .. } => *value,
        }
    }

    pub fn glyph(&self) -> Option<&Glyph> {
        match self {
            Self::Native { .. } => None,
            Self::Fungible { glyph, .. } | Self::NonFungible { glyph, .. } => Some(glyph),
        }
    }

    pub fn token_ref(&self) -> Option<TokenRef> {
        self.glyph().map(|g| g.token_ref)
    }

    /// same contract type, token and value
    pub fn same_as(&self, other: &Asset) -> bool {
        self.contract_type() == other.contract_type()
            && self.token_ref() == other.token_ref()
            && self.value() == other.value()
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native { value } => write!(f, "{} photons", value),
            Self::Fungible { glyph, value } => {
                let unit = glyph.ticker.as_deref().unwrap_or("FT");
                write!(f, "{} {} ({})", value, unit, glyph.token_ref.outpoint().short_ref())
            }
            Self::NonFungible { glyph, .. } => {
                let name = if glyph.name.is_empty() {
                    "NFT"
                } else {
                    glyph.name.as_str()
                };
                write!(f, "{} ({})", name, glyph.token_ref.outpoint().short_ref())
            }
        }
    }
}
