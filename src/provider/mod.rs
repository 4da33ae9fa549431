// Copyright (c) 2024 MoonTrack

//! The decoded-transaction provider adapter (§4.8): a thin HTTP client over
//! a third-party indexer (Zerion-shaped) that returns pre-decoded, per-
//! wallet transaction history. The sync processor is the only caller.

pub mod zerion;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::{cancellation::CancellationToken, error::ProviderError, money::Money};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Trade,
    Deposit,
    Withdraw,
    Claim,
    Receive,
    Send,
    Execute,
    Approve,
    Mint,
    Burn,
    /// Anything the provider emits that isn't in the above set; the
    /// classifier (§4.9) skips these rather than erroring, so new upstream
    /// operation types degrade gracefully instead of breaking ingestion.
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferDirection {
    In,
    Out,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Confirmed,
    Pending,
    Failed,
}

#[derive(Clone, Debug)]
pub struct Transfer {
    pub asset_symbol: String,
    pub contract_address: Option<String>,
    pub decimals: u32,
    pub amount: Money,
    pub direction: TransferDirection,
    pub sender: String,
    pub recipient: String,
    pub usd_price: Option<Money>,
}

#[derive(Clone, Debug)]
pub struct Fee {
    pub asset_symbol: String,
    pub decimals: u32,
    pub amount: Money,
    pub usd_price: Option<Money>,
}

#[derive(Clone, Debug)]
pub struct DecodedTransaction {
    pub provider_id: String,
    pub tx_hash: String,
    pub chain_id: i64,
    pub operation_type: OperationType,
    pub protocol: Option<String>,
    pub mined_at: DateTime<Utc>,
    pub status: TransactionStatus,
    pub transfers: Vec<Transfer>,
    pub fee: Option<Fee>,
}

/// `GetTransactions(address, chainId, since) -> [DecodedTransaction...]`
/// (§4.8). Implementations own pagination, rate-limit backoff, and the
/// float-to-scaled-integer conversion for any USD prices the provider
/// supplies; callers never see the provider's wire shape.
///
/// `cancel` is checked between pages and within any retry backoff sleep
/// (§5); a cancelled call returns `ProviderError::Cancelled` rather than
/// silently truncating the result.
pub trait TransactionProvider: Send + Sync {
    fn get_transactions(
        &self,
        address: &str,
        chain_id: i64,
        since: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Vec<DecodedTransaction>, ProviderError>;
}
