// Copyright (c) 2024 MoonTrack

//! DB impl for the Wallet model, including the atomic sync-claim used by
//! the sync service (§4.11).

use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use super::{models::Wallet, schema::wallets, Conn};
use crate::error::WalletDbError;

pub trait WalletModel {
    fn get(id: Uuid, conn: &mut Conn) -> Result<Wallet, WalletDbError>;

    /// Finds a wallet by `(user_id, chain_id, address)`. The caller is
    /// responsible for lower-casing `address` first so this always reflects
    /// the `(user_id, chain_id, lower(address))` uniqueness constraint.
    fn find_by_address(
        user_id: Uuid,
        chain_id: i64,
        address: &str,
        conn: &mut Conn,
    ) -> Result<Option<Wallet>, WalletDbError>;

    /// Wallets due for a sync tick: `pending`/`error`/`synced`, or `syncing`
    /// past `stale_after` (stale-sync recovery, §4.11 step 1).
    fn due_for_sync(stale_after: Duration, conn: &mut Conn) -> Result<Vec<Wallet>, WalletDbError>;

    /// Atomically claims a wallet for sync: `UPDATE ... SET sync_status =
    /// 'syncing' WHERE id = ? AND (sync_status != 'syncing' OR
    /// sync_started_at < stale_cutoff)`. `stale_after` must be the same
    /// cutoff duration passed to `due_for_sync`, or a stale `syncing` row
    /// `due_for_sync` selected would never actually match this claim's
    /// filter. Returns `true` iff this call won the claim.
    fn claim_for_sync(id: Uuid, stale_after: Duration, conn: &mut Conn) -> Result<bool, WalletDbError>;

    /// Advances the cursor to `last_sync_at` and marks the wallet `synced`.
    fn advance_cursor(
        id: Uuid,
        last_sync_at: DateTime<Utc>,
        conn: &mut Conn,
    ) -> Result<(), WalletDbError>;

    /// Marks the wallet `error` without advancing the cursor.
    fn mark_error(id: Uuid, message: &str, conn: &mut Conn) -> Result<(), WalletDbError>;
}

impl WalletModel for Wallet {
    fn get(id: Uuid, conn: &mut Conn) -> Result<Wallet, WalletDbError> {
        wallets::table.find(id).first(conn).map_err(Into::into)
    }

    fn find_by_address(
        user_id: Uuid,
        chain_id: i64,
        address: &str,
        conn: &mut Conn,
    ) -> Result<Option<Wallet>, WalletDbError> {
        wallets::table
            .filter(wallets::user_id.eq(user_id))
            .filter(wallets::chain_id.eq(chain_id))
            .filter(wallets::address.eq(address))
            .first(conn)
            .optional()
            .map_err(Into::into)
    }

    fn due_for_sync(stale_after: Duration, conn: &mut Conn) -> Result<Vec<Wallet>, WalletDbError> {
        let stale_cutoff = Utc::now() - stale_after;
        wallets::table
            .filter(
                wallets::sync_status
                    .eq("pending")
                    .or(wallets::sync_status.eq("error"))
                    .or(wallets::sync_status.eq("synced"))
                    .or(wallets::sync_status
                        .eq("syncing")
                        .and(wallets::sync_started_at.lt(stale_cutoff))),
            )
            .load(conn)
            .map_err(Into::into)
    }

    fn claim_for_sync(id: Uuid, stale_after: Duration, conn: &mut Conn) -> Result<bool, WalletDbError> {
        let stale_cutoff = Utc::now() - stale_after;
        let affected = diesel::update(wallets::table)
            .filter(wallets::id.eq(id))
            .filter(
                wallets::sync_status
                    .ne("syncing")
                    .or(wallets::sync_started_at.lt(stale_cutoff)),
            )
            .set((
                wallets::sync_status.eq("syncing"),
                wallets::sync_started_at.eq(diesel::dsl::now),
            ))
            .execute(conn)?;
        Ok(affected == 1)
    }

    fn advance_cursor(
        id: Uuid,
        last_sync_at: DateTime<Utc>,
        conn: &mut Conn,
    ) -> Result<(), WalletDbError> {
        diesel::update(wallets::table)
            .filter(wallets::id.eq(id))
            .set((
                wallets::last_sync_at.eq(last_sync_at),
                wallets::sync_status.eq("synced"),
                wallets::sync_error.eq(None::<String>),
                wallets::sync_started_at.eq(None::<DateTime<Utc>>),
            ))
            .execute(conn)?;
        Ok(())
    }

    fn mark_error(id: Uuid, message: &str, conn: &mut Conn) -> Result<(), WalletDbError> {
        diesel::update(wallets::table)
            .filter(wallets::id.eq(id))
            .set((
                wallets::sync_status.eq("error"),
                wallets::sync_error.eq(message),
            ))
            .execute(conn)?;
        Ok(())
    }
}
