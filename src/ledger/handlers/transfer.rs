// Copyright (c) 2024 MoonTrack

//! `transfer_in` / `transfer_out` handlers (§4.6).

use chrono::{DateTime, Utc};

use super::{
    entry, require_not_future, require_owned, require_positive, GeneratedEntry, RequestContext,
    TransactionHandler, TransactionPayload, TransferInPayload, TransferOutPayload,
};
use crate::{
    db::{
        models::{DebitOrCredit, EntryType, TransactionType},
        Conn,
    },
    error::ValidationError,
};

pub struct TransferInHandler;

impl TransactionHandler for TransferInHandler {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::TransferIn
    }

    fn validate(&self, payload: &TransactionPayload, ctx: &RequestContext, conn: &mut Conn) -> Result<(), ValidationError> {
        let TransactionPayload::TransferIn(p) = payload else {
            return Err(ValidationError::MalformedPayload("expected transfer_in payload".into()));
        };
        require_owned(p.wallet_id, ctx, conn)?;
        require_positive(&p.leg.amount, "transfer_in.amount")?;
        Ok(())
    }

    fn generate_entries(
        &self,
        payload: &TransactionPayload,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<GeneratedEntry>, ValidationError> {
        let TransactionPayload::TransferIn(p) = payload else {
            return Err(ValidationError::MalformedPayload("expected transfer_in payload".into()));
        };
        require_not_future(occurred_at)?;

        let asset_id = p.leg.asset_id();
        Ok(vec![
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
                format!("income.{}.{}", p.chain_id, p.leg.asset_symbol),
                asset_id,
                DebitOrCredit::Credit,
                EntryType::Income,
                p.leg.amount.clone(),
                p.leg.usd_rate.clone(),
                p.leg.decimals,
                occurred_at,
            ),
        ])
    }
}

pub struct TransferOutHandler;

impl TransactionHandler for TransferOutHandler {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::TransferOut
    }

    fn validate(&self, payload: &TransactionPayload, ctx: &RequestContext, conn: &mut Conn) -> Result<(), ValidationError> {
        let TransactionPayload::TransferOut(p) = payload else {
            return Err(ValidationError::MalformedPayload("expected transfer_out payload".into()));
        };
        require_owned(p.wallet_id, ctx, conn)?;
        require_positive(&p.leg.amount, "transfer_out.amount")?;
        if let Some(gas) = &p.gas {
            require_positive(&gas.amount, "transfer_out.gas.amount")?;
        }
        Ok(())
    }

    fn generate_entries(
        &self,
        payload: &TransactionPayload,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<GeneratedEntry>, ValidationError> {
        let TransactionPayload::TransferOut(p) = payload else {
            return Err(ValidationError::MalformedPayload("expected transfer_out payload".into()));
        };
        require_not_future(occurred_at)?;

        let asset_id = p.leg.asset_id();
        let mut entries = vec![
            entry(
                format!("expense.{}.{}", p.chain_id, p.leg.asset_symbol),
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
        ];

        if let Some(gas) = &p.gas {
            let gas_asset_id = super::super::account_resolver::asset_id_for(p.chain_id, &gas.asset_symbol);
            entries.push(entry(
                format!("gas.{}.{}", p.chain_id, gas.asset_symbol),
                gas_asset_id,
                DebitOrCredit::Debit,
                EntryType::GasFee,
                gas.amount.clone(),
                gas.usd_rate.clone(),
                gas.decimals,
                occurred_at,
            ));
            entries.push(entry(
                format!("wallet.{}.{}", p.wallet_id, gas.asset_symbol),
                gas_asset_id,
                DebitOrCredit::Credit,
                EntryType::AssetDecrease,
                gas.amount.clone(),
                gas.usd_rate.clone(),
                gas.decimals,
                occurred_at,
            ));
        }

        Ok(entries)
    }
}
