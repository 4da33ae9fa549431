// Copyright (c) 2024 MoonTrack

//! DB impl for the Entry model: the individual debit/credit lines that make
//! up a transaction's balanced entry set (§4.2, §4.5 step 6).

use diesel::prelude::*;
use uuid::Uuid;

use super::{
    models::{Entry, NewEntry},
    schema::entries,
    Conn,
};
use crate::error::WalletDbError;

pub trait EntryModel {
    fn insert(new: &NewEntry, conn: &mut Conn) -> Result<Entry, WalletDbError>;

    fn insert_all(new: &[NewEntry], conn: &mut Conn) -> Result<Vec<Entry>, WalletDbError>;

    fn for_transaction(transaction_id: Uuid, conn: &mut Conn) -> Result<Vec<Entry>, WalletDbError>;
}

impl EntryModel for Entry {
    fn insert(new: &NewEntry, conn: &mut Conn) -> Result<Entry, WalletDbError> {
        diesel::insert_into(entries::table)
            .values(new)
            .get_result(conn)
            .map_err(Into::into)
    }

    fn insert_all(new: &[NewEntry], conn: &mut Conn) -> Result<Vec<Entry>, WalletDbError> {
        diesel::insert_into(entries::table)
            .values(new)
            .get_results(conn)
            .map_err(Into::into)
    }

    fn for_transaction(transaction_id: Uuid, conn: &mut Conn) -> Result<Vec<Entry>, WalletDbError> {
        entries::table
            .filter(entries::transaction_id.eq(transaction_id))
            .order(entries::entry_order.asc())
            .load(conn)
            .map_err(Into::into)
    }
}
