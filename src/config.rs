// Copyright (c) 2024 MoonTrack

//! Process configuration: a single `clap`-derived struct, every field
//! overridable via its own environment variable, mirroring the teacher's
//! `APIConfig`.

use std::time::Duration;

use chrono::Duration as ChronoDuration;
use clap::Parser;

fn parse_duration_seconds(src: &str) -> Result<Duration, std::num::ParseIntError> {
    Ok(Duration::from_secs(src.parse()?))
}

#[derive(Clone, Debug, Parser)]
#[clap(name = "moontrack-core", about = "MoonTrack ledger engine and sync pipeline", version)]
pub struct Config {
    /// PostgreSQL connection string.
    #[clap(long, env = "MOONTRACK_DATABASE_URL")]
    pub database_url: String,

    /// Max size of the connection pool.
    #[clap(long, default_value = "10", env = "MOONTRACK_DATABASE_POOL_SIZE")]
    pub database_pool_size: u32,

    /// How often the sync service wakes up to check for due wallets.
    #[clap(
        long,
        default_value = "120",
        value_parser = parse_duration_seconds,
        env = "MOONTRACK_POLL_INTERVAL_SECONDS"
    )]
    pub poll_interval: Duration,

    /// Maximum number of wallets synced concurrently.
    #[clap(long, default_value = "4", env = "MOONTRACK_CONCURRENT_WALLETS")]
    pub concurrent_wallets: usize,

    /// How far back a wallet's very first sync looks, in days.
    #[clap(long, default_value = "90", env = "MOONTRACK_INITIAL_SYNC_LOOKBACK_DAYS")]
    pub initial_sync_lookback_days: i64,

    /// Base URL of the decoded-transaction provider.
    #[clap(long, env = "MOONTRACK_PROVIDER_BASE_URL")]
    pub provider_base_url: String,

    /// API key for the decoded-transaction provider.
    #[clap(long, env = "MOONTRACK_PROVIDER_API_KEY")]
    pub provider_api_key: String,

    /// How often the clearing-account reconciliation sweep runs.
    #[clap(
        long,
        default_value = "3600",
        value_parser = parse_duration_seconds,
        env = "MOONTRACK_RECONCILIATION_INTERVAL_SECONDS"
    )]
    pub reconciliation_interval: Duration,
}

impl Config {
    pub fn initial_sync_lookback(&self) -> ChronoDuration {
        ChronoDuration::days(self.initial_sync_lookback_days)
    }
}
