// Copyright (c) 2024 MoonTrack

//! DB impl for the AccountBalance model: per-`(account_id, asset_id)`
//! aggregates updated under a row-level lock held for the duration of one
//! ledger DB transaction (§4.5 step 8, §5).

use diesel::prelude::*;
use displaydoc::Display;
use uuid::Uuid;

use super::{models::AccountBalance, schema::account_balances, Conn};
use crate::{error::WalletDbError, money::Money};

/// Error from a balance update, distinguishing the policy rejection (would
/// go negative) from an ordinary DB failure so the ledger service can map
/// it to `LedgerServiceError::InsufficientBalance` instead of a generic
/// database error.
#[derive(Display, Debug)]
pub enum BalanceUpdateError {
    /// database error: {0}
    Database(WalletDbError),
    /// applying this delta would move the balance negative
    WouldGoNegative,
}

impl From<WalletDbError> for BalanceUpdateError {
    fn from(src: WalletDbError) -> Self {
        Self::Database(src)
    }
}

impl From<diesel::result::Error> for BalanceUpdateError {
    fn from(src: diesel::result::Error) -> Self {
        Self::Database(src.into())
    }
}

pub trait AccountBalanceModel {
    /// Ensures a `(account_id, asset_id)` row exists (inserting a zero row
    /// if not), then locks it `FOR UPDATE` for the remainder of the
    /// enclosing transaction.
    fn lock_or_init(
        account_id: Uuid,
        asset_id: Uuid,
        conn: &mut Conn,
    ) -> Result<AccountBalance, WalletDbError>;

    fn get(
        account_id: Uuid,
        asset_id: Uuid,
        conn: &mut Conn,
    ) -> Result<AccountBalance, WalletDbError>;

    /// Applies `amount_delta`/`usd_delta` to the locked balance row. When
    /// `enforce_non_negative` is set (always true for `CRYPTO_WALLET`
    /// accounts) and the resulting balance would be negative, the update is
    /// not written and `WouldGoNegative` is returned so the caller can abort
    /// the enclosing transaction.
    fn apply_delta(
        account_id: Uuid,
        asset_id: Uuid,
        amount_delta: Money,
        usd_delta: Money,
        enforce_non_negative: bool,
        conn: &mut Conn,
    ) -> Result<AccountBalance, BalanceUpdateError>;

    /// Recomputes the balance directly from `entries`, for the
    /// reconciliation law `CalculateBalanceFromEntries(account, asset) ==
    /// AccountBalance.balance` (§8) and for `ReconcileBalance` (§6).
    fn recompute_from_entries(
        account_id: Uuid,
        asset_id: Uuid,
        conn: &mut Conn,
    ) -> Result<Money, WalletDbError>;
}

impl AccountBalanceModel for AccountBalance {
    fn lock_or_init(
        account_id: Uuid,
        asset_id: Uuid,
        conn: &mut Conn,
    ) -> Result<AccountBalance, WalletDbError> {
        diesel::insert_into(account_balances::table)
            .values((
                account_balances::account_id.eq(account_id),
                account_balances::asset_id.eq(asset_id),
                account_balances::balance.eq(Money::zero()),
                account_balances::usd_value.eq(Money::zero()),
            ))
            .on_conflict((account_balances::account_id, account_balances::asset_id))
            .do_nothing()
            .execute(conn)?;

        account_balances::table
            .filter(account_balances::account_id.eq(account_id))
            .filter(account_balances::asset_id.eq(asset_id))
            .for_update()
            .first(conn)
            .map_err(Into::into)
    }

    fn get(
        account_id: Uuid,
        asset_id: Uuid,
        conn: &mut Conn,
    ) -> Result<AccountBalance, WalletDbError> {
        account_balances::table
            .filter(account_balances::account_id.eq(account_id))
            .filter(account_balances::asset_id.eq(asset_id))
            .first(conn)
            .map_err(Into::into)
    }

    fn apply_delta(
        account_id: Uuid,
        asset_id: Uuid,
        amount_delta: Money,
        usd_delta: Money,
        enforce_non_negative: bool,
        conn: &mut Conn,
    ) -> Result<AccountBalance, BalanceUpdateError> {
        let current = Self::lock_or_init(account_id, asset_id, conn)?;
        let new_balance = &current.balance + &amount_delta;
        let new_usd_value = &current.usd_value + &usd_delta;

        if enforce_non_negative && new_balance.is_negative() {
            return Err(BalanceUpdateError::WouldGoNegative);
        }

        diesel::update(account_balances::table)
            .filter(account_balances::account_id.eq(account_id))
            .filter(account_balances::asset_id.eq(asset_id))
            .set((
                account_balances::balance.eq(new_balance),
                account_balances::usd_value.eq(new_usd_value),
                account_balances::last_updated_at.eq(diesel::dsl::now),
            ))
            .get_result(conn)
            .map_err(|e| BalanceUpdateError::Database(e.into()))
    }

    fn recompute_from_entries(
        account_id: Uuid,
        asset_id: Uuid,
        conn: &mut Conn,
    ) -> Result<Money, WalletDbError> {
        use super::schema::entries;

        let debit_total: Option<Money> = entries::table
            .filter(entries::account_id.eq(account_id))
            .filter(entries::asset_id.eq(asset_id))
            .filter(entries::entry_type.ne("clearing"))
            .filter(entries::debit_or_credit.eq("debit"))
            .select(diesel::dsl::sum(entries::amount))
            .first(conn)?;

        let credit_total: Option<Money> = entries::table
            .filter(entries::account_id.eq(account_id))
            .filter(entries::asset_id.eq(asset_id))
            .filter(entries::entry_type.ne("clearing"))
            .filter(entries::debit_or_credit.eq("credit"))
            .select(diesel::dsl::sum(entries::amount))
            .first(conn)?;

        let debit = debit_total.unwrap_or_else(Money::zero);
        let credit = credit_total.unwrap_or_else(Money::zero);
        Ok(debit - credit)
    }
}
