// Copyright (c) 2024 MoonTrack

//! One-shot genesis-lot backfill (§4.12): for every `CRYPTO_WALLET` account
//! holding a positive balance that has no tax lots yet, synthesizes a single
//! lot covering the whole balance at its current fair-market value. Run once
//! at adoption time from an operator task, never from the sync loop.

use chrono::Utc;
use diesel::prelude::*;
use tracing::info;
use uuid::Uuid;

use crate::{
    db::{
        models::{Account, AccountBalance, AccountType, NewTaxLot, NewTransaction, TaxLot, Transaction},
        schema::{account_balances, accounts},
        tax_lot::TaxLotModel,
        transaction::TransactionModel,
        Conn,
    },
    error::TaxLotError,
    money::{Money, USD_SCALE},
};

fn asset_symbol_from_wallet_code(code: &str) -> &str {
    code.rsplit('.').next().unwrap_or(code)
}

/// Backfills genesis lots for every `(CRYPTO_WALLET account, asset)` pair
/// with a positive stored balance and no existing lots. Returns the number
/// of lots created. Safe to re-run: pairs that already have a lot (from a
/// prior run, or from having transacted since) are left untouched.
pub fn backfill_all(conn: &mut Conn) -> Result<usize, TaxLotError> {
    let candidates: Vec<(Account, AccountBalance)> = accounts::table
        .inner_join(account_balances::table.on(account_balances::account_id.eq(accounts::id)))
        .filter(accounts::type_.eq(AccountType::CryptoWallet.to_string()))
        .filter(account_balances::balance.gt(Money::zero()))
        .load(conn)?;

    let mut created = 0;
    for (account, balance) in candidates {
        let symbol = asset_symbol_from_wallet_code(&account.code).to_string();

        if !TaxLot::list_all(account.id, &symbol, conn)?.is_empty() {
            continue;
        }

        let scale = num_bigint::BigInt::from(10u64).pow(USD_SCALE);
        let cost_per_unit = Money::from_bigint((balance.usd_value.as_bigint() * &scale) / balance.balance.as_bigint());

        let external_id = format!("genesis.{}.{}", account.id, symbol);
        let new_transaction = NewTransaction {
            id: Uuid::new_v4(),
            type_: "genesis",
            source: "genesis_backfill",
            external_id: Some(&external_id),
            occurred_at: Utc::now(),
            status: "completed",
            raw_data: serde_json::json!({ "account_id": account.id, "asset": symbol }),
        };
        let transaction = Transaction::insert(&new_transaction, conn)?;

        let new_lot = NewTaxLot {
            id: Uuid::new_v4(),
            transaction_id: transaction.id,
            account_id: account.id,
            asset: &symbol,
            quantity_acquired: balance.balance.clone(),
            quantity_remaining: balance.balance.clone(),
            acquired_at: Utc::now(),
            auto_cost_basis_per_unit: cost_per_unit,
            auto_cost_basis_source: "fmv_at_transfer",
            linked_source_lot_id: None,
        };
        TaxLot::create(&new_lot, conn)?;
        created += 1;

        info!(account_id = %account.id, asset = %symbol, "created genesis lot");
    }

    Ok(created)
}
