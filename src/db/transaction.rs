// Copyright (c) 2024 MoonTrack

//! DB impl for the Transaction model.

use diesel::prelude::*;
use uuid::Uuid;

use super::{
    models::{NewTransaction, Transaction},
    schema::transactions,
    Conn,
};
use crate::error::WalletDbError;

pub trait TransactionModel {
    /// Inserts a new `pending` transaction row. Returns the raw diesel
    /// error (not wrapped) so callers can distinguish a unique-violation
    /// (duplicate `(source, external_id)`, §4.5 step 5) from every other
    /// failure via [`crate::error::is_unique_violation`].
    fn insert(new: &NewTransaction, conn: &mut Conn) -> Result<Transaction, diesel::result::Error>;

    fn find_by_source_external_id(
        source: &str,
        external_id: &str,
        conn: &mut Conn,
    ) -> Result<Option<Transaction>, WalletDbError>;

    fn mark_completed(id: Uuid, conn: &mut Conn) -> Result<(), WalletDbError>;

    fn mark_failed(id: Uuid, conn: &mut Conn) -> Result<(), WalletDbError>;

    fn get(id: Uuid, conn: &mut Conn) -> Result<Transaction, WalletDbError>;
}

impl TransactionModel for Transaction {
    fn insert(new: &NewTransaction, conn: &mut Conn) -> Result<Transaction, diesel::result::Error> {
        diesel::insert_into(transactions::table)
            .values(new)
            .get_result(conn)
    }

    fn find_by_source_external_id(
        source: &str,
        external_id: &str,
        conn: &mut Conn,
    ) -> Result<Option<Transaction>, WalletDbError> {
        transactions::table
            .filter(transactions::source.eq(source))
            .filter(transactions::external_id.eq(external_id))
            .first(conn)
            .optional()
            .map_err(Into::into)
    }

    fn mark_completed(id: Uuid, conn: &mut Conn) -> Result<(), WalletDbError> {
        diesel::update(transactions::table)
            .filter(transactions::id.eq(id))
            .set(transactions::status.eq("completed"))
            .execute(conn)?;
        Ok(())
    }

    fn mark_failed(id: Uuid, conn: &mut Conn) -> Result<(), WalletDbError> {
        diesel::update(transactions::table)
            .filter(transactions::id.eq(id))
            .set(transactions::status.eq("failed"))
            .execute(conn)?;
        Ok(())
    }

    fn get(id: Uuid, conn: &mut Conn) -> Result<Transaction, WalletDbError> {
        transactions::table.find(id).first(conn).map_err(Into::into)
    }
}
