// Copyright (c) 2024 MoonTrack

//! `internal_transfer` handler (§4.6). Dedup (the sending side owns
//! recording) is the sync processor's responsibility (§4.9/§4.10), not
//! this handler's: by the time `internal_transfer` reaches the ledger
//! service it is always recorded exactly once.

use chrono::{DateTime, Utc};

use super::{
    entry, require_not_future, require_owned, require_positive, GeneratedEntry, InternalTransferPayload,
    RequestContext, TransactionHandler, TransactionPayload,
};
use crate::{
    db::{
        models::{DebitOrCredit, EntryType, TransactionType},
        Conn,
    },
    error::ValidationError,
};

pub struct InternalTransferHandler;

impl InternalTransferHandler {
    fn payload(payload: &TransactionPayload) -> Result<&InternalTransferPayload, ValidationError> {
        match payload {
            TransactionPayload::InternalTransfer(p) => Ok(p),
            _ => Err(ValidationError::MalformedPayload("expected internal_transfer payload".into())),
        }
    }
}

impl TransactionHandler for InternalTransferHandler {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::InternalTransfer
    }

    fn validate(&self, payload: &TransactionPayload, ctx: &RequestContext, conn: &mut Conn) -> Result<(), ValidationError> {
        let p = Self::payload(payload)?;
        require_owned(p.source_wallet_id, ctx, conn)?;
        require_owned(p.destination_wallet_id, ctx, conn)?;
        require_positive(&p.leg.amount, "internal_transfer.amount")?;
        if let Some(gas) = &p.gas {
            require_positive(&gas.amount, "internal_transfer.gas.amount")?;
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
        let mut entries = vec![
            entry(
                format!("wallet.{}.{}", p.destination_wallet_id, p.leg.asset_symbol),
                asset_id,
                DebitOrCredit::Debit,
                EntryType::AssetIncrease,
                p.leg.amount.clone(),
                p.leg.usd_rate.clone(),
                p.leg.decimals,
                occurred_at,
            ),
            entry(
                format!("wallet.{}.{}", p.source_wallet_id, p.leg.asset_symbol),
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
                format!("wallet.{}.{}", p.source_wallet_id, gas.asset_symbol),
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
