// Copyright (c) 2024 MoonTrack

//! `defi_deposit` / `defi_withdraw` / `defi_claim` handlers (§4.6).
//!
//! `defi_withdraw` is a structural mirror of `defi_deposit`: both move a
//! `received` leg through `wallet debit / clearing credit` and a `sent` leg
//! through `clearing debit / wallet credit`, just with the LP and
//! underlying legs swapped between `received` and `sent` by the caller
//! building the payload. The two handlers therefore share one entry
//! generator and differ only in `transaction_type()`.

use chrono::{DateTime, Utc};

use super::{
    entry, require_not_future, require_owned, require_positive, DefiClaimPayload, DefiPayload, GeneratedEntry,
    RequestContext, TransactionHandler, TransactionPayload,
};
use crate::{
    db::{
        models::{DebitOrCredit, EntryType, TransactionType},
        Conn,
    },
    error::ValidationError,
};

fn validate_defi(p: &DefiPayload, ctx: &RequestContext, conn: &mut Conn) -> Result<(), ValidationError> {
    require_owned(p.wallet_id, ctx, conn)?;
    for leg in p.received.iter().chain(p.sent.iter()) {
        require_positive(&leg.amount, "defi.leg.amount")?;
    }
    if let Some(gas) = &p.gas {
        require_positive(&gas.amount, "defi.gas.amount")?;
    }
    Ok(())
}

fn generate_defi_entries(p: &DefiPayload, occurred_at: DateTime<Utc>) -> Vec<GeneratedEntry> {
    let clearing_code = format!("swap_clearing.{}", p.chain_id);
    let mut entries = Vec::with_capacity(2 * (p.received.len() + p.sent.len()) + 2);

    for leg in &p.received {
        let asset_id = leg.asset_id();
        entries.push(entry(
            format!("wallet.{}.{}", p.wallet_id, leg.asset_symbol),
            asset_id,
            DebitOrCredit::Debit,
            EntryType::AssetIncrease,
            leg.amount.clone(),
            leg.usd_rate.clone(),
            leg.decimals,
            occurred_at,
        ));
        entries.push(entry(
            clearing_code.clone(),
            asset_id,
            DebitOrCredit::Credit,
            EntryType::Clearing,
            leg.amount.clone(),
            leg.usd_rate.clone(),
            leg.decimals,
            occurred_at,
        ));
    }

    for leg in &p.sent {
        let asset_id = leg.asset_id();
        entries.push(entry(
            clearing_code.clone(),
            asset_id,
            DebitOrCredit::Debit,
            EntryType::Clearing,
            leg.amount.clone(),
            leg.usd_rate.clone(),
            leg.decimals,
            occurred_at,
        ));
        entries.push(entry(
            format!("wallet.{}.{}", p.wallet_id, leg.asset_symbol),
            asset_id,
            DebitOrCredit::Credit,
            EntryType::AssetDecrease,
            leg.amount.clone(),
            leg.usd_rate.clone(),
            leg.decimals,
            occurred_at,
        ));
    }

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

    entries
}

pub struct DefiDepositHandler;

impl TransactionHandler for DefiDepositHandler {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::DefiDeposit
    }

    fn validate(&self, payload: &TransactionPayload, ctx: &RequestContext, conn: &mut Conn) -> Result<(), ValidationError> {
        match payload {
            TransactionPayload::DefiDeposit(p) => validate_defi(p, ctx, conn),
            _ => Err(ValidationError::MalformedPayload("expected defi_deposit payload".into())),
        }
    }

    fn generate_entries(
        &self,
        payload: &TransactionPayload,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<GeneratedEntry>, ValidationError> {
        match payload {
            TransactionPayload::DefiDeposit(p) => {
                require_not_future(occurred_at)?;
                Ok(generate_defi_entries(p, occurred_at))
            }
            _ => Err(ValidationError::MalformedPayload("expected defi_deposit payload".into())),
        }
    }
}

pub struct DefiWithdrawHandler;

impl TransactionHandler for DefiWithdrawHandler {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::DefiWithdraw
    }

    fn validate(&self, payload: &TransactionPayload, ctx: &RequestContext, conn: &mut Conn) -> Result<(), ValidationError> {
        match payload {
            TransactionPayload::DefiWithdraw(p) => validate_defi(p, ctx, conn),
            _ => Err(ValidationError::MalformedPayload("expected defi_withdraw payload".into())),
        }
    }

    fn generate_entries(
        &self,
        payload: &TransactionPayload,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<GeneratedEntry>, ValidationError> {
        match payload {
            TransactionPayload::DefiWithdraw(p) => {
                require_not_future(occurred_at)?;
                Ok(generate_defi_entries(p, occurred_at))
            }
            _ => Err(ValidationError::MalformedPayload("expected defi_withdraw payload".into())),
        }
    }
}

pub struct DefiClaimHandler;

impl DefiClaimHandler {
    fn payload(payload: &TransactionPayload) -> Result<&DefiClaimPayload, ValidationError> {
        match payload {
            TransactionPayload::DefiClaim(p) => Ok(p),
            _ => Err(ValidationError::MalformedPayload("expected defi_claim payload".into())),
        }
    }
}

impl TransactionHandler for DefiClaimHandler {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::DefiClaim
    }

    fn validate(&self, payload: &TransactionPayload, ctx: &RequestContext, conn: &mut Conn) -> Result<(), ValidationError> {
        let p = Self::payload(payload)?;
        require_owned(p.wallet_id, ctx, conn)?;
        require_positive(&p.reward.amount, "defi_claim.reward.amount")?;
        if let Some(gas) = &p.gas {
            require_positive(&gas.amount, "defi_claim.gas.amount")?;
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

        let asset_id = p.reward.asset_id();
        let mut entries = vec![
            entry(
                format!("wallet.{}.{}", p.wallet_id, p.reward.asset_symbol),
                asset_id,
                DebitOrCredit::Debit,
                EntryType::AssetIncrease,
                p.reward.amount.clone(),
                p.reward.usd_rate.clone(),
                p.reward.decimals,
                occurred_at,
            ),
            entry(
                format!("income.defi.{}.{}", p.chain_id, p.protocol),
                asset_id,
                DebitOrCredit::Credit,
                EntryType::Income,
                p.reward.amount.clone(),
                p.reward.usd_rate.clone(),
                p.reward.decimals,
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
