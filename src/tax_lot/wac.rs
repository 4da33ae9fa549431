// Copyright (c) 2024 MoonTrack

//! Weighted-average-cost refresh (§4.11): folds every open lot for a
//! `(account_id, asset)` position into a single display figure in
//! `position_wac`, so reads of "what's my average cost on this position"
//! don't have to walk every lot on every request.

use num_bigint::BigInt;
use uuid::Uuid;

use crate::{
    db::{
        models::{NewPositionWac, PositionWac, TaxLot},
        position_wac::PositionWacModel,
        tax_lot::TaxLotModel,
        Conn,
    },
    error::TaxLotError,
    money::Money,
};

/// Recomputes and persists the weighted average cost for every open lot
/// under `(account_id, asset)`. The linked-transfer chain is resolved one
/// level deep per lot (matching [`TaxLot::effective_cost_basis`]) before
/// folding it into the weighted sum.
pub fn refresh(account_id: Uuid, asset: &str, conn: &mut Conn) -> Result<PositionWac, TaxLotError> {
    let lots = TaxLot::list_all(account_id, asset, conn)?;

    let mut weighted_sum = BigInt::from(0);
    let mut total_remaining = Money::zero();

    for lot in &lots {
        if lot.quantity_remaining.is_zero() {
            continue;
        }
        let linked_source = match lot.linked_source_lot_id {
            Some(source_id) => Some(TaxLot::get(source_id, conn)?),
            None => None,
        };
        let cost_basis = lot.effective_cost_basis(linked_source.as_ref());
        weighted_sum += lot.quantity_remaining.as_bigint() * cost_basis.as_bigint();
        total_remaining = &total_remaining + &lot.quantity_remaining;
    }

    let weighted_avg_cost_per_unit = if total_remaining.is_zero() {
        Money::zero()
    } else {
        Money::from_bigint(weighted_sum / total_remaining.as_bigint())
    };

    let new_wac = NewPositionWac {
        account_id,
        asset,
        weighted_avg_cost_per_unit,
        total_remaining,
    };
    PositionWac::upsert(&new_wac, conn).map_err(Into::into)
}
