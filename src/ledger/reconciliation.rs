// Copyright (c) 2024 MoonTrack

//! Clearing-account reconciliation job (§4.7): hourly sweep asserting that
//! every `CLEARING` account nets to zero, since that invariant is enforced
//! only by handler shape, not by a DB constraint.

use diesel::prelude::*;
use tracing::error;
use uuid::Uuid;

use crate::{
    db::{
        models::{Account, AccountType, DebitOrCredit, NewReconciliationAlert},
        schema::{accounts, entries, reconciliation_alerts},
        Conn, LedgerDb,
    },
    error::WalletDbError,
    money::Money,
};

pub struct ClearingMismatch {
    pub account_id: Uuid,
    pub net: Money,
}

/// Walks every `CLEARING` account and checks `Σ debit - Σ credit = 0`
/// across all of its entries. Returns the accounts that failed the check,
/// after persisting a `reconciliation_alerts` row (kind
/// `clearing_nonzero`) for each one so the mismatch survives past the log
/// line.
pub fn reconcile_clearing_accounts(db: &LedgerDb) -> Result<Vec<ClearingMismatch>, WalletDbError> {
    let mut conn = db.get_conn()?;
    let clearing_accounts: Vec<Account> = accounts::table
        .filter(accounts::type_.eq(AccountType::Clearing.to_string()))
        .load(&mut conn)?;

    let mut mismatches = Vec::new();
    for account in clearing_accounts {
        let net = net_for_account(account.id, &mut conn)?;
        if !net.is_zero() {
            error!(account_id = %account.id, net = %net, "clearing account does not net to zero");
            persist_alert(account.id, &net, &mut conn)?;
            mismatches.push(ClearingMismatch { account_id: account.id, net });
        }
    }
    Ok(mismatches)
}

fn net_for_account(account_id: Uuid, conn: &mut Conn) -> Result<Money, WalletDbError> {
    let rows: Vec<(Money, String)> = entries::table
        .filter(entries::account_id.eq(account_id))
        .select((entries::amount, entries::debit_or_credit))
        .load(conn)?;

    let mut net = Money::zero();
    for (amount, debit_or_credit) in rows {
        net = if debit_or_credit == debit_str(DebitOrCredit::Debit) {
            &net + &amount
        } else {
            &net - &amount
        };
    }
    Ok(net)
}

fn debit_str(v: DebitOrCredit) -> &'static str {
    match v {
        DebitOrCredit::Debit => "debit",
        DebitOrCredit::Credit => "credit",
    }
}

fn persist_alert(account_id: Uuid, net: &Money, conn: &mut Conn) -> Result<(), WalletDbError> {
    let details = format!("clearing account net balance is {net}, expected 0");
    let new_alert = NewReconciliationAlert {
        id: Uuid::new_v4(),
        account_id,
        asset_id: None,
        kind: "clearing_nonzero",
        details: &details,
    };
    diesel::insert_into(reconciliation_alerts::table)
        .values(&new_alert)
        .execute(conn)?;
    Ok(())
}

/// Persists a `balance_mismatch` alert for `ReconcileBalance` (§6) once a
/// caller has already detected the divergence.
pub fn persist_balance_mismatch_alert(
    account_id: Uuid,
    asset_id: Uuid,
    stored: &Money,
    recomputed: &Money,
    conn: &mut Conn,
) -> Result<(), WalletDbError> {
    let details = format!("stored balance {stored} != recomputed balance {recomputed}");
    let new_alert = NewReconciliationAlert {
        id: Uuid::new_v4(),
        account_id,
        asset_id: Some(asset_id),
        kind: "balance_mismatch",
        details: &details,
    };
    diesel::insert_into(reconciliation_alerts::table)
        .values(&new_alert)
        .execute(conn)?;
    Ok(())
}
