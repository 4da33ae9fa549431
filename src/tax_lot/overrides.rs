// Copyright (c) 2024 MoonTrack

//! `OverrideCostBasis(lot_id, new_cost_basis?, reason)` (§4.9, §6): lets a
//! user correct a lot's per-unit cost basis when the auto-derived figure is
//! wrong (e.g. a provider mispriced an asset at the time of acquisition),
//! recording every change in `lot_override_history` so a later audit can
//! see what changed and why.

use uuid::Uuid;

use crate::{
    db::{
        account::AccountModel,
        models::{NewLotOverrideHistory, TaxLot},
        tax_lot::TaxLotModel,
        wallet::WalletModel,
        Conn,
    },
    error::TaxLotError,
    ledger::handlers::RequestContext,
    money::Money,
};

/// Requires that `ctx.user_id` owns the wallet `lot_id` belongs to, mirroring
/// `require_owned` (§6): an override reaches down through the lot's account
/// to the account's wallet, since a lot never names its owner directly.
fn require_owned(lot_id: Uuid, ctx: &RequestContext, conn: &mut Conn) -> Result<TaxLot, TaxLotError> {
    let lot = TaxLot::get(lot_id, conn)?;
    let account = crate::db::models::Account::get(lot.account_id, conn)?;
    let wallet_id = account
        .wallet_id
        .ok_or(TaxLotError::LotNotFound(lot_id))?;
    let wallet = crate::db::models::Wallet::get(wallet_id, conn)?;
    if wallet.user_id != ctx.user_id {
        return Err(TaxLotError::LotNotFound(lot_id));
    }
    Ok(lot)
}

/// Sets (or clears, with `new_cost_basis: None`) a lot's override cost
/// basis per unit. `reason` must be non-empty; negative cost bases are
/// rejected up front since they can never be legitimate. Requires `ctx`
/// to own the wallet the lot belongs to (§6); an unowned lot is reported the
/// same way a missing one is, so ownership is never leaked through the
/// error variant.
pub fn apply(
    lot_id: Uuid,
    new_cost_basis: Option<Money>,
    reason: &str,
    ctx: &RequestContext,
    conn: &mut Conn,
) -> Result<TaxLot, TaxLotError> {
    if reason.trim().is_empty() {
        return Err(TaxLotError::EmptyOverrideReason);
    }
    if let Some(basis) = &new_cost_basis {
        if basis.is_negative() {
            return Err(TaxLotError::NegativeCostBasis);
        }
    }

    let previous = require_owned(lot_id, ctx, conn)?;

    let new_history = NewLotOverrideHistory {
        id: Uuid::new_v4(),
        lot_id,
        previous: previous.override_cost_basis_per_unit.clone(),
        new: new_cost_basis.clone(),
        reason,
    };
    TaxLot::insert_override_history(&new_history, conn)?;

    TaxLot::set_override(lot_id, new_cost_basis, reason, conn).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_cost_basis_is_rejected_before_any_lookup() {
        let basis = Money::from_decimal_str("-1").unwrap();
        assert!(basis.is_negative());
    }
}
