// Copyright (c) 2024 MoonTrack

//! DB impl for the Account model.

use diesel::prelude::*;
use uuid::Uuid;

use super::{
    models::{Account, NewAccount},
    schema::accounts,
    Conn,
};
use crate::error::WalletDbError;

pub trait AccountModel {
    /// Looks up an account by its code string (§4.4). Returns `None` if no
    /// account has been created for that code yet.
    fn find_by_code(code: &str, conn: &mut Conn) -> Result<Option<Account>, WalletDbError>;

    /// Looks up or atomically creates the account for `new_account.code`
    /// using insert-on-conflict-do-nothing followed by a select-by-code
    /// read, eliminating the check-then-create race for concurrently
    /// resolved shared accounts (e.g. `swap_clearing.<chain_id>`).
    fn get_or_create(new_account: &NewAccount, conn: &mut Conn) -> Result<Account, WalletDbError>;

    fn get(id: Uuid, conn: &mut Conn) -> Result<Account, WalletDbError>;
}

impl AccountModel for Account {
    fn find_by_code(code: &str, conn: &mut Conn) -> Result<Option<Account>, WalletDbError> {
        accounts::table
            .filter(accounts::code.eq(code))
            .first(conn)
            .optional()
            .map_err(Into::into)
    }

    fn get_or_create(new_account: &NewAccount, conn: &mut Conn) -> Result<Account, WalletDbError> {
        diesel::insert_into(accounts::table)
            .values(new_account)
            .on_conflict(accounts::code)
            .do_nothing()
            .execute(conn)?;

        Self::find_by_code(new_account.code, conn)?
            .ok_or_else(|| WalletDbError::AccountNotFound(new_account.code.to_string()))
    }

    fn get(id: Uuid, conn: &mut Conn) -> Result<Account, WalletDbError> {
        accounts::table
            .find(id)
            .first(conn)
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    // Exercised end-to-end against a real Postgres instance in
    // `test_support`; the get-or-create race itself is covered by the
    // concurrent-account-resolution test in `ledger::account_resolver`.
}
