// Copyright (c) 2024 MoonTrack

//! `GetRealisedPnL(account_id?, start?, end?)` (§6): reads back every
//! disposal in range and folds it into a total, treating `internal_
//! transfer` disposals as contributing zero regardless of any cost-basis
//! override made afterward on either side of the transfer.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    db::{
        models::{DisposalType, LotDisposal, TaxLot},
        schema::{lot_disposals, tax_lots},
        tax_lot::TaxLotModel,
        Conn,
    },
    error::TaxLotError,
    money::Money,
};

pub struct DisposalPnl {
    pub disposal_id: Uuid,
    pub lot_id: Uuid,
    pub transaction_id: Uuid,
    pub disposed_at: DateTime<Utc>,
    pub quantity: Money,
    pub pnl_scaled: Money,
}

pub struct RealisedPnl {
    pub total_scaled: Money,
    pub per_disposal: Vec<DisposalPnl>,
}

pub fn get_realised_pnl(
    account_id: Option<Uuid>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    conn: &mut Conn,
) -> Result<RealisedPnl, TaxLotError> {
    let mut query = lot_disposals::table
        .inner_join(tax_lots::table.on(lot_disposals::lot_id.eq(tax_lots::id)))
        .into_boxed();

    if let Some(account_id) = account_id {
        query = query.filter(tax_lots::account_id.eq(account_id));
    }
    if let Some(start) = start {
        query = query.filter(lot_disposals::disposed_at.ge(start));
    }
    if let Some(end) = end {
        query = query.filter(lot_disposals::disposed_at.le(end));
    }

    let rows: Vec<(LotDisposal, TaxLot)> = query.load(conn)?;

    let mut total_scaled = Money::zero();
    let mut per_disposal = Vec::with_capacity(rows.len());

    for (disposal, lot) in rows {
        let pnl_scaled = if disposal.disposal_type() == DisposalType::InternalTransfer {
            Money::zero()
        } else {
            let linked_source = match lot.linked_source_lot_id {
                Some(source_id) => Some(TaxLot::get(source_id, conn)?),
                None => None,
            };
            let effective_cost = lot.effective_cost_basis(linked_source.as_ref());
            let per_unit_gain = &disposal.proceeds_per_unit - &effective_cost;
            Money::from_bigint(per_unit_gain.as_bigint() * disposal.quantity_disposed.as_bigint())
        };

        total_scaled = &total_scaled + &pnl_scaled;
        per_disposal.push(DisposalPnl {
            disposal_id: disposal.id,
            lot_id: lot.id,
            transaction_id: disposal.transaction_id,
            disposed_at: disposal.disposed_at,
            quantity: disposal.quantity_disposed.clone(),
            pnl_scaled,
        });
    }

    Ok(RealisedPnl { total_scaled, per_disposal })
}
