// Copyright (c) 2024 MoonTrack

//! Composition root: parses configuration, wires up the database, the
//! ledger service and its handler registry, the decoded-transaction
//! provider, and starts the background sync and reconciliation threads.
//! Mirrors the teacher's own `main` functions: every long-lived
//! collaborator is built once here and handed to whoever needs it, never
//! reached for as a static.

use std::{sync::Arc, thread, time::Duration};

use clap::Parser;
use dotenv::dotenv;
use tracing::{error, info};

use moontrack_core::{
    config::Config,
    db::LedgerDb,
    ledger::{handlers::HandlerRegistry, reconciliation, LedgerService},
    provider::{zerion::ZerionProvider, TransactionProvider},
    sync::{SyncServiceConfig, SyncThread},
};

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}

fn spawn_reconciliation_thread(db: LedgerDb, interval: Duration) -> thread::JoinHandle<()> {
    thread::Builder::new()
        .name("reconciliation".to_string())
        .spawn(move || loop {
            thread::sleep(interval);
            if let Err(e) = reconciliation::reconcile_clearing_accounts(&db) {
                error!(error = %e, "clearing reconciliation sweep failed");
            }
        })
        .expect("failed starting reconciliation thread")
}

fn main() {
    dotenv().ok();
    init_tracing();

    let config = Config::parse();

    let db = LedgerDb::new_from_url(&config.database_url, config.database_pool_size)
        .expect("failed connecting to database");
    db.run_migrations().expect("failed running migrations");

    let registry = HandlerRegistry::with_default_handlers();
    let ledger = LedgerService::new(db.clone(), registry);

    let provider: Arc<dyn TransactionProvider> = Arc::new(
        ZerionProvider::new(config.provider_base_url.clone(), config.provider_api_key.clone())
            .expect("failed constructing provider client"),
    );

    let sync_config = SyncServiceConfig {
        poll_interval: config.poll_interval,
        concurrent_wallets: config.concurrent_wallets,
        initial_sync_lookback: config.initial_sync_lookback(),
    };

    info!(
        poll_interval_secs = sync_config.poll_interval.as_secs(),
        concurrent_wallets = sync_config.concurrent_wallets,
        "starting sync service"
    );
    let _sync_thread = SyncThread::start(db.clone(), ledger, provider, sync_config);
    let _reconciliation_thread = spawn_reconciliation_thread(db, config.reconciliation_interval);

    // The sync and reconciliation threads run for the life of the process;
    // the main thread has nothing left to do but stay alive.
    loop {
        thread::sleep(Duration::from_secs(3600));
    }
}
