// Copyright (c) 2024 MoonTrack

//! `swap` handler (§4.6): bought leg in, sold leg out, routed through the
//! chain-scoped `swap_clearing` account so the transaction balances
//! globally even though it moves two different assets.

use chrono::{DateTime, Utc};

use super::{
    entry, require_not_future, require_owned, require_positive, GeneratedEntry, RequestContext, SwapPayload,
    TransactionHandler, TransactionPayload,
};
use crate::{
    db::{
        models::{DebitOrCredit, EntryType, TransactionType},
        Conn,
    },
    error::ValidationError,
};

pub struct SwapHandler;

impl SwapHandler {
    fn payload(payload: &TransactionPayload) -> Result<&SwapPayload, ValidationError> {
        match payload {
            TransactionPayload::Swap(p) => Ok(p),
            _ => Err(ValidationError::MalformedPayload("expected swap payload".into())),
        }
    }
}

impl TransactionHandler for SwapHandler {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::Swap
    }

    fn validate(&self, payload: &TransactionPayload, ctx: &RequestContext, conn: &mut Conn) -> Result<(), ValidationError> {
        let p = Self::payload(payload)?;
        require_owned(p.wallet_id, ctx, conn)?;
        require_positive(&p.bought.amount, "swap.bought.amount")?;
        require_positive(&p.sold.amount, "swap.sold.amount")?;
        if let Some(gas) = &p.gas {
            require_positive(&gas.amount, "swap.gas.amount")?;
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

        let clearing_code = format!("swap_clearing.{}", p.chain_id);
        let bought_asset_id = p.bought.asset_id();
        let sold_asset_id = p.sold.asset_id();

        let mut entries = vec![
            entry(
                format!("wallet.{}.{}", p.wallet_id, p.bought.asset_symbol),
                bought_asset_id,
                DebitOrCredit::Debit,
                EntryType::AssetIncrease,
                p.bought.amount.clone(),
                p.bought.usd_rate.clone(),
                p.bought.decimals,
                occurred_at,
            ),
            entry(
                clearing_code.clone(),
                bought_asset_id,
                DebitOrCredit::Credit,
                EntryType::Clearing,
                p.bought.amount.clone(),
                p.bought.usd_rate.clone(),
                p.bought.decimals,
                occurred_at,
            ),
            entry(
                clearing_code,
                sold_asset_id,
                DebitOrCredit::Debit,
                EntryType::Clearing,
                p.sold.amount.clone(),
                p.sold.usd_rate.clone(),
                p.sold.decimals,
                occurred_at,
            ),
            entry(
                format!("wallet.{}.{}", p.wallet_id, p.sold.asset_symbol),
                sold_asset_id,
                DebitOrCredit::Credit,
                EntryType::AssetDecrease,
                p.sold.amount.clone(),
                p.sold.usd_rate.clone(),
                p.sold.decimals,
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
