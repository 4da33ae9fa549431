// Copyright (c) 2024 MoonTrack

//! Implementations of DB and DB models.

pub mod account;
pub mod balance;
pub mod entry;
pub mod models;
pub mod position_wac;
pub mod schema;
pub mod tax_lot;
pub mod transaction;
pub mod wallet;

use diesel::{
    connection::Connection,
    pg::PgConnection,
    r2d2::{ConnectionManager, Pool, PooledConnection},
};

use crate::error::WalletDbError;

/// A checked-out connection from the pool. Every DB model function takes
/// `&mut Conn` rather than owning a connection, matching the teacher's
/// `PooledConnection<ConnectionManager<SqliteConnection>>` parameter style.
pub type Conn = PooledConnection<ConnectionManager<PgConnection>>;

const MIGRATIONS: diesel_migrations::EmbeddedMigrations =
    diesel_migrations::embed_migrations!("migrations");

#[derive(Clone)]
pub struct LedgerDb {
    pool: Pool<ConnectionManager<PgConnection>>,
}

impl LedgerDb {
    pub fn new(pool: Pool<ConnectionManager<PgConnection>>) -> Self {
        Self { pool }
    }

    pub fn new_from_url(database_url: &str, max_size: u32) -> Result<Self, WalletDbError> {
        let manager = ConnectionManager::<PgConnection>::new(database_url);
        let pool = Pool::builder()
            .max_size(max_size)
            .test_on_check_out(true)
            .build(manager)?;
        Ok(Self::new(pool))
    }

    pub fn get_conn(&self) -> Result<Conn, WalletDbError> {
        Ok(self.pool.get()?)
    }

    /// Runs pending embedded migrations. Called once at startup, mirroring
    /// the teacher's `run_migrations` call in `main`.
    pub fn run_migrations(&self) -> Result<(), WalletDbError> {
        use diesel_migrations::MigrationHarness;

        let mut conn = self.get_conn()?;
        conn.run_pending_migrations(MIGRATIONS)
            .map(|_| ())
            .map_err(|e| WalletDbError::Migration(e.to_string()))
    }
}

/// Runs `f` inside a single serializable DB transaction, mirroring the
/// teacher's `exclusive_transaction` helper used by the sync path: every
/// ledger mutation — account resolution, entry insertion, balance update,
/// and the tax-lot post-commit hook — happens inside one transaction per
/// `LedgerService::record` call (§4.5).
pub fn exclusive_transaction<T, E, F>(conn: &mut Conn, f: F) -> Result<T, E>
where
    F: FnOnce(&mut Conn) -> Result<T, E>,
    E: From<diesel::result::Error>,
{
    conn.transaction(f)
}
