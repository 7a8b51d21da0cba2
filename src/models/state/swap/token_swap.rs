use std::fmt::Display;

use serde::Deserialize;
use serde::Serialize;

use crate::models::blockchain::glyph::Asset;
use crate::models::blockchain::glyph::ContractType;
use crate::models::blockchain::glyph::Glyph;
use crate::models::blockchain::outpoint::Outpoint;
use crate::models::blockchain::outpoint::TokenRef;
use crate::models::blockchain::outpoint::Txid;

/// Lifecycle of a swap proposal made by this wallet.
///
/// Only `Pending` has outgoing transitions; each terminal status is entered
/// at most once.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::EnumIs,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SwapStatus {
    Pending,
    Completed,
    Cancel,
    Missing,
}

impl SwapStatus {
    pub fn is_terminal(&self) -> bool {
        !self.is_pending()
    }
}

/// Persisted record of one swap proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenSwap {
    pub id: u64,

    pub from: ContractType,
    pub from_value: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_glyph_ref: Option<TokenRef>,

    pub to: ContractType,
    pub to_value: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_glyph_ref: Option<TokenRef>,

    /// the half-signed proposal, hex encoded
    pub raw_transaction: String,

    /// For proposals, the escrow transaction; the escrow is its output 0.
    /// For accepted swaps, the combined swap transaction.
    pub txid: Txid,

    pub status: SwapStatus,
}

impl TokenSwap {
    /// A new pending record; the store assigns `id`.
    pub fn pending(offered: &Asset, requested: &Asset, raw_transaction: String, escrow_txid: Txid) -> Self {
        Self {
            id: 0,
            from: offered.contract_type(),
            from_value: offered.value(),
            from_glyph_ref: offered.token_ref(),
            to: requested.contract_type(),
            to_value: requested.value(),
            to_glyph_ref: requested.token_ref(),
            raw_transaction,
            txid: escrow_txid,
            status: SwapStatus::Pending,
        }
    }

    pub fn escrow(&self) -> Outpoint {
        Outpoint::new(self.txid, 0)
    }

    pub fn offered(&self) -> Option<Asset> {
        asset_of(self.from, self.from_value, self.from_glyph_ref)
    }

    pub fn requested(&self) -> Option<Asset> {
        asset_of(self.to, self.to_value, self.to_glyph_ref)
    }
}

fn asset_of(contract_type: ContractType, value: u64, token_ref: Option<TokenRef>) -> Option<Asset> {
    Some(match contract_type {
        ContractType::Native => Asset::Native { value },
        ContractType::Fungible => Asset::Fungible {
            glyph: Glyph::new(token_ref?),
            value,
        },
        ContractType::NonFungible => Asset::NonFungible {
            glyph: Glyph::new(token_ref?),
            value,
        },
    })
}

impl Display for TokenSwap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let side = |asset: Option<Asset>| match asset {
            Some(a) => a.to_string(),
            None => "<malformed>".to_owned(),
        };
        write!(
            f,
            "#{} {} -> {} [{}] escrow {}",
            self.id,
            side(self.offered()),
            side(self.requested()),
            self.status,
            self.escrow().short_ref()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_json_uses_camel_case_and_upper_status() {
        let token = TokenRef(Outpoint::new(Txid([4; 32]), 0));
        let record = TokenSwap::pending(
            &Asset::native(1000),
            &Asset::fungible(token, 50),
            "00".into(),
            Txid([5; 32]),
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!("PENDING", json["status"]);
        assert_eq!("NATIVE", json["from"]);
        assert_eq!(50, json["toValue"]);
        assert!(json.get("fromGlyphRef").is_none());
        assert!(json["rawTransaction"].is_string());

        let back: TokenSwap = serde_json::from_value(json).unwrap();
        assert_eq!(record, back);
        assert!(back.requested().unwrap().same_as(&Asset::fungible(token, 50)));
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!(SwapStatus::Cancel, "CANCEL".parse().unwrap());
        assert_eq!(SwapStatus::Missing, "missing".parse().unwrap());
        assert!(SwapStatus::Completed.is_terminal());
        assert!(!SwapStatus::Pending.is_terminal());
    }
}
