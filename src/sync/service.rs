// Copyright (c) 2024 MoonTrack

//! The background sync service (§4.11): a named OS thread that wakes up
//! every `poll_interval`, claims due wallets, and drives each one through
//! the provider adapter and the sync processor. Modeled directly on the
//! teacher's `service::sync::SyncThread`: a join handle plus an
//! `Arc<AtomicBool>` stop flag, joined on `stop()`/`Drop`.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration as StdDuration,
};

use chrono::{Duration as ChronoDuration, Utc};
use rayon::prelude::*;
use tracing::{debug, error, warn};

use super::processor;
use crate::{
    cancellation::CancellationToken,
    db::{models::Wallet, wallet::WalletModel, LedgerDb},
    error::SyncServiceError,
    ledger::service::LedgerService,
    provider::TransactionProvider,
};

/// A `syncing` wallet whose `sync_started_at` is older than this is
/// considered abandoned by a dead worker and re-claimable (§4.11 step 1).
fn stale_sync_threshold() -> ChronoDuration {
    ChronoDuration::minutes(10)
}

#[derive(Clone, Debug)]
pub struct SyncServiceConfig {
    pub poll_interval: StdDuration,
    pub concurrent_wallets: usize,
    pub initial_sync_lookback: ChronoDuration,
}

impl Default for SyncServiceConfig {
    fn default() -> Self {
        Self {
            poll_interval: StdDuration::from_secs(120),
            concurrent_wallets: 4,
            initial_sync_lookback: ChronoDuration::days(90),
        }
    }
}

fn sync_wallet(
    wallet: Wallet,
    db: &LedgerDb,
    ledger: &LedgerService,
    provider: &dyn TransactionProvider,
    lookback: ChronoDuration,
    cancel: &CancellationToken,
) {
    let mut conn = match db.get_conn() {
        Ok(conn) => conn,
        Err(e) => {
            error!(wallet_id = %wallet.id, error = %e, "failed to check out a connection");
            return;
        }
    };

    match Wallet::claim_for_sync(wallet.id, stale_sync_threshold(), &mut conn) {
        Ok(true) => {}
        Ok(false) => {
            debug!(wallet_id = %wallet.id, "wallet already claimed by another worker, skipping");
            return;
        }
        Err(e) => {
            error!(wallet_id = %wallet.id, error = %e, "failed to claim wallet for sync");
            return;
        }
    }

    let since = wallet.last_sync_at.unwrap_or_else(|| Utc::now() - lookback);

    let mut transactions = match provider.get_transactions(&wallet.address, wallet.chain_id, since, cancel) {
        Ok(transactions) => transactions,
        Err(e) => {
            let message = e.to_string();
            if let Err(mark_err) = Wallet::mark_error(wallet.id, &message, &mut conn) {
                error!(wallet_id = %wallet.id, error = %mark_err, "failed to mark wallet error");
            }
            warn!(wallet_id = %wallet.id, error = %message, "provider fetch failed");
            return;
        }
    };
    transactions.sort_by_key(|tx| tx.mined_at);

    let mut last_successful_mined_at = None;
    let mut first_error: Option<SyncServiceError> = None;

    for tx in &transactions {
        // Checked between transactions, never mid-write (§5): a ledger
        // write already underway always completes or rolls back, so
        // cancellation only ever stops the *next* one from starting.
        if cancel.is_cancelled() {
            first_error = Some(SyncServiceError::Cancelled);
            break;
        }
        match processor::process(&wallet, tx, ledger, &mut conn, cancel) {
            Ok(()) => last_successful_mined_at = Some(tx.mined_at),
            Err(e) => {
                first_error = Some(e);
                break;
            }
        }
    }

    let update_result = if let Some(last) = last_successful_mined_at {
        Wallet::advance_cursor(wallet.id, last, &mut conn)
    } else if transactions.is_empty() && first_error.is_none() {
        Wallet::advance_cursor(wallet.id, Utc::now(), &mut conn)
    } else if let Some(e) = &first_error {
        Wallet::mark_error(wallet.id, &e.to_string(), &mut conn)
    } else {
        Ok(())
    };

    if let Err(e) = update_result {
        error!(wallet_id = %wallet.id, error = %e, "failed to update wallet sync state");
    }
    if let Some(e) = first_error {
        warn!(wallet_id = %wallet.id, error = %e, "stopped after first processing error, wallet left for retry");
    }
}

fn run_tick(
    db: &LedgerDb,
    ledger: &LedgerService,
    provider: &dyn TransactionProvider,
    config: &SyncServiceConfig,
    cancel: &CancellationToken,
) -> Result<(), SyncServiceError> {
    let due = {
        let mut conn = db.get_conn()?;
        Wallet::due_for_sync(stale_sync_threshold(), &mut conn)?
    };

    if due.is_empty() {
        return Ok(());
    }
    debug!(count = due.len(), "wallets due for sync");

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.concurrent_wallets.max(1))
        .thread_name(|i| format!("sync-wallet-{i}"))
        .build()
        .expect("failed building bounded sync thread pool");

    pool.install(|| {
        due.into_par_iter().for_each(|wallet| {
            sync_wallet(wallet, db, ledger, provider, config.initial_sync_lookback, cancel)
        });
    });

    Ok(())
}

/// Background handle, mirroring the teacher's `SyncThread`: owns the join
/// handle and a stop flag checked at tick boundaries, joined on drop. The
/// same flag is handed down as a [`CancellationToken`] to every I/O
/// operation a tick drives, so `stop()` cancels in-flight work too, not just
/// the next tick (§5).
pub struct SyncThread {
    join_handle: Option<thread::JoinHandle<()>>,
    stop_requested: Arc<AtomicBool>,
}

impl SyncThread {
    pub fn start(
        db: LedgerDb,
        ledger: LedgerService,
        provider: Arc<dyn TransactionProvider>,
        config: SyncServiceConfig,
    ) -> Self {
        let stop_requested = Arc::new(AtomicBool::new(false));
        let thread_stop_requested = stop_requested.clone();
        let cancel = CancellationToken::from_flag(stop_requested.clone());

        let join_handle = Some(
            thread::Builder::new()
                .name("sync".to_string())
                .spawn(move || {
                    debug!("sync thread started");
                    loop {
                        if thread_stop_requested.load(Ordering::SeqCst) {
                            break;
                        }

                        if let Err(e) = run_tick(&db, &ledger, provider.as_ref(), &config, &cancel) {
                            error!(error = %e, "sync tick failed");
                        }

                        thread::sleep(config.poll_interval);
                    }
                    debug!("sync thread stopped");
                })
                .expect("failed starting sync thread"),
        );

        Self { join_handle, stop_requested }
    }

    pub fn stop(&mut self) {
        self.stop_requested.store(true, Ordering::SeqCst);
        if let Some(join_handle) = self.join_handle.take() {
            join_handle.join().expect("sync thread join failed");
        }
    }
}

impl Drop for SyncThread {
    fn drop(&mut self) {
        self.stop();
    }
}
