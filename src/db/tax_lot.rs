// Copyright (c) 2024 MoonTrack

//! DB impl for the TaxLot/LotDisposal/LotOverrideHistory models: FIFO lot
//! selection under row locks, disposal bookkeeping, and the override audit
//! trail (§4.7, §4.8).

use diesel::prelude::*;
use uuid::Uuid;

use super::{
    models::{LotDisposal, LotOverrideHistory, NewLotDisposal, NewLotOverrideHistory, NewTaxLot, TaxLot},
    schema::{lot_disposals, lot_override_history, tax_lots},
    Conn,
};
use crate::{error::WalletDbError, money::Money};

pub trait TaxLotModel {
    fn create(new: &NewTaxLot, conn: &mut Conn) -> Result<TaxLot, WalletDbError>;

    fn get(id: Uuid, conn: &mut Conn) -> Result<TaxLot, WalletDbError>;

    /// Selects every open lot (`quantity_remaining > 0`) for `(account_id,
    /// asset)`, oldest-first by `(acquired_at, id)`, and locks each row
    /// `FOR UPDATE` so concurrent disposals against the same position
    /// serialize on lot order rather than racing (§4.8, §5).
    fn select_open_lots_for_update(
        account_id: Uuid,
        asset: &str,
        conn: &mut Conn,
    ) -> Result<Vec<TaxLot>, WalletDbError>;

    /// All lots for `(account_id, asset)` regardless of remaining quantity,
    /// used by the WAC refresh and genesis backfill (§4.9, §4.10).
    fn list_all(account_id: Uuid, asset: &str, conn: &mut Conn) -> Result<Vec<TaxLot>, WalletDbError>;

    fn update_remaining(
        id: Uuid,
        new_remaining: Money,
        conn: &mut Conn,
    ) -> Result<(), WalletDbError>;

    fn set_override(
        id: Uuid,
        new_override: Option<Money>,
        reason: &str,
        conn: &mut Conn,
    ) -> Result<TaxLot, WalletDbError>;

    fn insert_disposal(
        new: &NewLotDisposal,
        conn: &mut Conn,
    ) -> Result<LotDisposal, WalletDbError>;

    fn insert_override_history(
        new: &NewLotOverrideHistory,
        conn: &mut Conn,
    ) -> Result<LotOverrideHistory, WalletDbError>;

    /// The most recently inserted disposal against `transaction_id`, used to
    /// locate the source side's just-disposed lot when linking an internal
    /// transfer's destination lot back to it (§4.5 `internal_transfer`
    /// handler, §4.8).
    fn latest_disposal_for_transaction(
        transaction_id: Uuid,
        conn: &mut Conn,
    ) -> Result<Option<LotDisposal>, WalletDbError>;
}

impl TaxLotModel for TaxLot {
    fn create(new: &NewTaxLot, conn: &mut Conn) -> Result<TaxLot, WalletDbError> {
        diesel::insert_into(tax_lots::table)
            .values(new)
            .get_result(conn)
            .map_err(Into::into)
    }

    fn get(id: Uuid, conn: &mut Conn) -> Result<TaxLot, WalletDbError> {
        tax_lots::table.find(id).first(conn).map_err(Into::into)
    }

    fn select_open_lots_for_update(
        account_id: Uuid,
        asset: &str,
        conn: &mut Conn,
    ) -> Result<Vec<TaxLot>, WalletDbError> {
        tax_lots::table
            .filter(tax_lots::account_id.eq(account_id))
            .filter(tax_lots::asset.eq(asset))
            .filter(tax_lots::quantity_remaining.gt(Money::zero()))
            .order((tax_lots::acquired_at.asc(), tax_lots::id.asc()))
            .for_update()
            .load(conn)
            .map_err(Into::into)
    }

    fn list_all(account_id: Uuid, asset: &str, conn: &mut Conn) -> Result<Vec<TaxLot>, WalletDbError> {
        tax_lots::table
            .filter(tax_lots::account_id.eq(account_id))
            .filter(tax_lots::asset.eq(asset))
            .order((tax_lots::acquired_at.asc(), tax_lots::id.asc()))
            .load(conn)
            .map_err(Into::into)
    }

    fn update_remaining(
        id: Uuid,
        new_remaining: Money,
        conn: &mut Conn,
    ) -> Result<(), WalletDbError> {
        diesel::update(tax_lots::table)
            .filter(tax_lots::id.eq(id))
            .set(tax_lots::quantity_remaining.eq(new_remaining))
            .execute(conn)?;
        Ok(())
    }

    fn set_override(
        id: Uuid,
        new_override: Option<Money>,
        reason: &str,
        conn: &mut Conn,
    ) -> Result<TaxLot, WalletDbError> {
        diesel::update(tax_lots::table)
            .filter(tax_lots::id.eq(id))
            .set((
                tax_lots::override_cost_basis_per_unit.eq(new_override),
                tax_lots::override_reason.eq(reason),
                tax_lots::override_at.eq(diesel::dsl::now),
            ))
            .get_result(conn)
            .map_err(Into::into)
    }

    fn insert_disposal(
        new: &NewLotDisposal,
        conn: &mut Conn,
    ) -> Result<LotDisposal, WalletDbError> {
        diesel::insert_into(lot_disposals::table)
            .values(new)
            .get_result(conn)
            .map_err(Into::into)
    }

    fn insert_override_history(
        new: &NewLotOverrideHistory,
        conn: &mut Conn,
    ) -> Result<LotOverrideHistory, WalletDbError> {
        diesel::insert_into(lot_override_history::table)
            .values(new)
            .get_result(conn)
            .map_err(Into::into)
    }

    fn latest_disposal_for_transaction(
        transaction_id: Uuid,
        conn: &mut Conn,
    ) -> Result<Option<LotDisposal>, WalletDbError> {
        lot_disposals::table
            .filter(lot_disposals::transaction_id.eq(transaction_id))
            .order(lot_disposals::disposed_at.desc())
            .first(conn)
            .optional()
            .map_err(Into::into)
    }
}
