// Copyright (c) 2024 MoonTrack

//! `asset_adjustment` handler (§4.6): a manual balancing entry against a
//! fixed `income.adjustment`/`expense.adjustment` account, used to correct
//! drift that the sync pipeline cannot explain on its own.

use chrono::{DateTime, Utc};

use super::{
    entry, require_not_future, require_owned, require_positive, AssetAdjustmentPayload, GeneratedEntry,
    RequestContext, TransactionHandler, TransactionPayload,
};
use crate::{
    db::{
        models::{DebitOrCredit, EntryType, TransactionType},
        Conn,
    },
    error::ValidationError,
};

pub struct AssetAdjustmentHandler;

impl AssetAdjustmentHandler {
    fn payload(payload: &TransactionPayload) -> Result<&AssetAdjustmentPayload, ValidationError> {
        match payload {
            TransactionPayload::AssetAdjustment(p) => Ok(p),
            _ => Err(ValidationError::MalformedPayload("expected asset_adjustment payload".into())),
        }
    }
}

impl TransactionHandler for AssetAdjustmentHandler {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::AssetAdjustment
    }

    fn validate(&self, payload: &TransactionPayload, ctx: &RequestContext, conn: &mut Conn) -> Result<(), ValidationError> {
        let p = Self::payload(payload)?;
        require_owned(p.wallet_id, ctx, conn)?;
        require_positive(&p.leg.amount, "asset_adjustment.amount")?;
        if p.reason.trim().is_empty() {
            return Err(ValidationError::MalformedPayload("asset_adjustment.reason must not be empty".into()));
        }
        Ok(())
    }

    fn generate_entries(
        &self,
        payload: &TransactionPayload,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<GeneratedEntry>, ValidationError> {
        let p = Self::payload(payload)?;
        require_not_future(occurred_at)?;

        let asset_id = p.leg.asset_id();
        let entries = if p.increase {
            vec![
                entry(
                    format!("wallet.{}.{}", p.wallet_id, p.leg.asset_symbol),
                    asset_id,
                    DebitOrCredit::Debit,
                    EntryType::AssetIncrease,
                    p.leg.amount.clone(),
                    p.leg.usd_rate.clone(),
                    p.leg.decimals,
                    occurred_at,
                ),
                entry(
                    "income.adjustment",
                    asset_id,
                    DebitOrCredit::Credit,
                    EntryType::Income,
                    p.leg.amount.clone(),
                    p.leg.usd_rate.clone(),
                    p.leg.decimals,
                    occurred_at,
                ),
            ]
        } else {
            vec![
                entry(
                    "expense.adjustment",
                    asset_id,
                    DebitOrCredit::Debit,
                    EntryType::Expense,
                    p.leg.amount.clone(),
                    p.leg.usd_rate.clone(),
                    p.leg.decimals,
                    occurred_at,
                ),
                entry(
                    format!("wallet.{}.{}", p.wallet_id, p.leg.asset_symbol),
                    asset_id,
                    DebitOrCredit::Credit,
                    EntryType::AssetDecrease,
                    p.leg.amount.clone(),
                    p.leg.usd_rate.clone(),
                    p.leg.decimals,
                    occurred_at,
                ),
            ]
        };

        Ok(entries)
    }
}
