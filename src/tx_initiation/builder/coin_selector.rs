//! Deterministic coin selection with fee re-estimation.
//!
//! The fee of a transaction depends on its size, which depends on how many
//! coins are selected and whether a change output is needed. Candidates are
//! therefore accumulated one at a time, and after each coin the fee is
//! re-estimated both with and without change. Selection stops at the first
//! prefix that pays for everything.

use std::cmp::Reverse;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::models::blockchain::fee::FeeRate;
use crate::models::blockchain::outpoint::Outpoint;
use crate::models::blockchain::outpoint::TokenRef;
use crate::models::state::coin::Coin;
use crate::tx_initiation::error::EngineError;

/// Order in which candidate coins are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SelectionPriority {
    /// largest first, ties broken by outpoint
    #[default]
    ByValueDescending,

    /// smallest first, ties broken by outpoint
    ByValueAscending,

    /// the order the caller supplied
    ByProvidedOrder,
}

impl SelectionPriority {
    pub fn sort<T>(&self, items: &mut [T], key: impl Fn(&T) -> (u64, Outpoint)) {
        match self {
            Self::ByValueDescending => items.sort_by_key(|i| {
                let (value, outpoint) = key(i);
                (Reverse(value), outpoint)
            }),
            Self::ByValueAscending => items.sort_by_key(|i| key(i)),
            Self::ByProvidedOrder => {}
        }
    }
}

/// Result of a fee-aware selection over sorted candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    /// how many leading candidates are spent
    pub count: usize,

    /// value of the change output, if one is created
    pub change: Option<u64>,

    /// inputs minus outputs; includes any sub-dust remainder
    pub fee: u64,

    /// fee-basis size of the chosen shape
    pub size: usize,
}

/// Pick the shortest prefix of `candidates` that, together with `fixed_in`,
/// covers `fixed_out` plus the fee.
///
/// `size_of(n, with_change)` must return the fee-basis size of the
/// transaction spending the first `n` candidates, with or without a change
/// output.
pub fn select_prefix(
    candidates: &[u64],
    fixed_in: u64,
    fixed_out: u64,
    fee_rate: FeeRate,
    dust_threshold: u64,
    size_of: impl Fn(usize, bool) -> usize,
) -> Result<Selection, EngineError> {
    let mut total_in = u128::from(fixed_in);
    let fixed_out = u128::from(fixed_out);

    for count in 0..=candidates.len() {
        if count > 0 {
            total_in += u128::from(candidates[count - 1]);
        }

        let bare_size = size_of(count, false);
        let bare_need = fixed_out + u128::from(fee_rate.fee_for(bare_size));
        if total_in < bare_need {
            if count == candidates.len() {
                let requested = u64::try_from(bare_need).unwrap_or(u64::MAX);
                let available = u64::try_from(total_in).unwrap_or(u64::MAX);
                debug!(requested, available, "coin selection exhausted");
                return Err(EngineError::InsufficientFunds {
                    requested,
                    available,
                });
            }
            continue;
        }

        let change_size = size_of(count, true);
        let change_need = fixed_out + u128::from(fee_rate.fee_for(change_size));
        let change = total_in
            .checked_sub(change_need)
            .filter(|c| *c >= u128::from(dust_threshold))
            .and_then(|c| u64::try_from(c).ok());

        let (fee, size) = match change {
            Some(c) => (total_in - fixed_out - u128::from(c), change_size),
            None => (total_in - fixed_out, bare_size),
        };
        let fee = u64::try_from(fee).map_err(|_| EngineError::Encoding("fee overflows u64".into()))?;

        debug!(count, ?change, fee, size, "coin selection converged");
        return Ok(Selection {
            count,
            change,
            fee,
            size,
        });
    }

    // candidates.len() is always visited above
    Err(EngineError::InsufficientFunds {
        requested: u64::try_from(fixed_out).unwrap_or(u64::MAX),
        available: u64::try_from(total_in).unwrap_or(u64::MAX),
    })
}

/// Choose fungible coins of `token_ref` covering `target` token units.
///
/// Token units are not interchangeable with native value, so no fee is
/// considered here.
pub fn select_token_coins(
    mut candidates: Vec<Coin>,
    token_ref: &TokenRef,
    target: u64,
    priority: SelectionPriority,
) -> Result<Vec<Coin>, EngineError> {
    if candidates.is_empty() {
        return Err(EngineError::TokenNotFound {
            token_ref: *token_ref,
        });
    }
    priority.sort(&mut candidates, |c| (c.value, c.outpoint));

    let mut total = 0u64;
    let mut chosen = vec![];
    for coin in candidates {
        if total >= target && !chosen.is_empty() {
            break;
        }
        total = total.saturating_add(coin.value);
        chosen.push(coin);
    }
    if total < target {
        return Err(EngineError::InsufficientFunds {
            requested: target,
            available: total,
        });
    }
    Ok(chosen)
}
