// Copyright (c) 2024 MoonTrack

//! Per-transaction-type handlers and the registry that dispatches to them
//! (§4.3, §4.6).

mod adjustment;
mod defi;
mod internal_transfer;
mod swap;
mod transfer;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use uuid::Uuid;

use crate::{
    db::{models::{DebitOrCredit, EntryType, TransactionType}, wallet::WalletModel, Conn},
    error::ValidationError,
    money::Money,
};
use crate::db::models::Wallet;

pub use adjustment::AssetAdjustmentHandler;
pub use defi::{DefiClaimHandler, DefiDepositHandler, DefiWithdrawHandler};
pub use internal_transfer::InternalTransferHandler;
pub use swap::SwapHandler;
pub use transfer::{TransferInHandler, TransferOutHandler};

/// Identity of the party on whose behalf a transaction is being recorded.
/// Carried through validation so handlers can enforce requirement (c) of
/// §4.6: the wallet referenced by the payload must belong to this user.
#[derive(Clone, Copy, Debug)]
pub struct RequestContext {
    pub user_id: Uuid,
}

/// One leg of asset movement: a symbol/chain-scoped amount at a USD rate.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LegAmount {
    pub asset_symbol: String,
    pub chain_id: i64,
    pub decimals: u32,
    pub amount: Money,
    pub usd_rate: Money,
}

impl LegAmount {
    pub fn asset_id(&self) -> Uuid {
        super::account_resolver::asset_id_for(self.chain_id, &self.asset_symbol)
    }
}

/// Optional gas leg, always charged against the source wallet (§9 open
/// question (ii) decided: source-only, see DESIGN.md).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GasLeg {
    pub asset_symbol: String,
    pub decimals: u32,
    pub amount: Money,
    pub usd_rate: Money,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransferInPayload {
    pub wallet_id: Uuid,
    pub chain_id: i64,
    pub leg: LegAmount,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransferOutPayload {
    pub wallet_id: Uuid,
    pub chain_id: i64,
    pub leg: LegAmount,
    pub gas: Option<GasLeg>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InternalTransferPayload {
    pub source_wallet_id: Uuid,
    pub destination_wallet_id: Uuid,
    pub chain_id: i64,
    pub leg: LegAmount,
    pub gas: Option<GasLeg>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SwapPayload {
    pub wallet_id: Uuid,
    pub chain_id: i64,
    pub bought: LegAmount,
    pub sold: LegAmount,
    pub gas: Option<GasLeg>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DefiPayload {
    pub wallet_id: Uuid,
    pub chain_id: i64,
    /// LP/receipt tokens received (deposit) or underlying received (withdraw).
    pub received: Vec<LegAmount>,
    /// Underlying sent (deposit) or LP/receipt tokens sent (withdraw).
    pub sent: Vec<LegAmount>,
    pub gas: Option<GasLeg>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DefiClaimPayload {
    pub wallet_id: Uuid,
    pub chain_id: i64,
    pub protocol: String,
    pub reward: LegAmount,
    pub gas: Option<GasLeg>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssetAdjustmentPayload {
    pub wallet_id: Uuid,
    pub chain_id: i64,
    pub leg: LegAmount,
    /// `true` increases the wallet balance (offset against
    /// `income.adjustment`); `false` decreases it (offset against
    /// `expense.adjustment`).
    pub increase: bool,
    pub reason: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransactionPayload {
    TransferIn(TransferInPayload),
    TransferOut(TransferOutPayload),
    InternalTransfer(InternalTransferPayload),
    Swap(SwapPayload),
    DefiDeposit(DefiPayload),
    DefiWithdraw(DefiPayload),
    DefiClaim(DefiClaimPayload),
    AssetAdjustment(AssetAdjustmentPayload),
}

impl TransactionPayload {
    pub fn transaction_type(&self) -> TransactionType {
        match self {
            TransactionPayload::TransferIn(_) => TransactionType::TransferIn,
            TransactionPayload::TransferOut(_) => TransactionType::TransferOut,
            TransactionPayload::InternalTransfer(_) => TransactionType::InternalTransfer,
            TransactionPayload::Swap(_) => TransactionType::Swap,
            TransactionPayload::DefiDeposit(_) => TransactionType::DefiDeposit,
            TransactionPayload::DefiWithdraw(_) => TransactionType::DefiWithdraw,
            TransactionPayload::DefiClaim(_) => TransactionType::DefiClaim,
            TransactionPayload::AssetAdjustment(_) => TransactionType::AssetAdjustment,
        }
    }

    pub fn to_raw_json(&self) -> Json {
        serde_json::to_value(self).expect("TransactionPayload always serializes")
    }
}

/// One generated ledger line, prior to account resolution. `account_code`
/// is resolved to a row by `account_resolver::resolve` inside the ledger
/// service's DB transaction.
#[derive(Clone, Debug)]
pub struct GeneratedEntry {
    pub account_code: String,
    pub asset_id: Uuid,
    pub debit_or_credit: DebitOrCredit,
    pub entry_type: EntryType,
    pub amount: Money,
    pub usd_rate: Money,
    pub usd_value: Money,
    pub occurred_at: DateTime<Utc>,
    pub metadata: Json,
}

pub fn entry(
    account_code: impl Into<String>,
    asset_id: Uuid,
    debit_or_credit: DebitOrCredit,
    entry_type: EntryType,
    amount: Money,
    usd_rate: Money,
    decimals: u32,
    occurred_at: DateTime<Utc>,
) -> GeneratedEntry {
    let usd_value = amount.usd_value(&usd_rate, decimals);
    GeneratedEntry {
        account_code: account_code.into(),
        asset_id,
        debit_or_credit,
        entry_type,
        amount,
        usd_rate,
        usd_value,
        occurred_at,
        metadata: Json::Null,
    }
}

pub trait TransactionHandler: Send + Sync {
    fn transaction_type(&self) -> TransactionType;

    /// Structural and policy validation, including ownership (requirement
    /// (c) of §4.6). The wallet lookup needed for the ownership check is
    /// the one collaborator every handler needs; rather than threading a
    /// `LedgerDb` handle into each stateless handler at construction, it is
    /// passed the live connection of the enclosing ledger transaction.
    fn validate(
        &self,
        payload: &TransactionPayload,
        ctx: &RequestContext,
        conn: &mut Conn,
    ) -> Result<(), ValidationError>;

    /// Generates the deterministic, balanced entry sequence for `payload`
    /// (§4.6). The caller verifies the balance invariant immediately
    /// afterward (§4.5 step 3).
    fn generate_entries(
        &self,
        payload: &TransactionPayload,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<GeneratedEntry>, ValidationError>;
}

pub fn require_positive(amount: &Money, what: &str) -> Result<(), ValidationError> {
    if amount.is_zero() || amount.is_negative() {
        return Err(ValidationError::NonPositiveAmount(what.to_string()));
    }
    Ok(())
}

pub fn require_not_future(occurred_at: DateTime<Utc>) -> Result<(), ValidationError> {
    if occurred_at > Utc::now() {
        return Err(ValidationError::FutureDated(occurred_at.to_rfc3339()));
    }
    Ok(())
}

/// Loads `wallet_id` and requires it belongs to `ctx.user_id` (§4.6
/// requirement (c)). A lookup failure is reported as a malformed payload
/// rather than surfaced as a database error: by the time a handler
/// validates, `wallet_id` came from the ingestion payload, so a missing row
/// means the payload referenced a wallet that does not exist.
pub fn require_owned(wallet_id: Uuid, ctx: &RequestContext, conn: &mut Conn) -> Result<Wallet, ValidationError> {
    let wallet = Wallet::get(wallet_id, conn)
        .map_err(|e| ValidationError::MalformedPayload(format!("wallet lookup failed: {e}")))?;
    if wallet.user_id != ctx.user_id {
        return Err(ValidationError::WalletNotOwned(wallet_id));
    }
    Ok(wallet)
}

/// Maps a transaction type to the stateless, reentrant handler that builds
/// its entries. Handlers are registered once at startup (the composition
/// root in `main.rs`) and never mutated afterward.
pub struct HandlerRegistry {
    handlers: HashMap<TransactionType, Box<dyn TransactionHandler>>,
}

impl HandlerRegistry {
    pub fn builder() -> HandlerRegistryBuilder {
        HandlerRegistryBuilder {
            handlers: HashMap::new(),
        }
    }

    /// Wires up every known handler kind. This is the registry main.rs
    /// actually constructs; `builder()` remains available for tests that
    /// need a partial registry.
    pub fn with_default_handlers() -> Self {
        Self::builder()
            .register(Box::new(TransferInHandler))
            .register(Box::new(TransferOutHandler))
            .register(Box::new(InternalTransferHandler))
            .register(Box::new(SwapHandler))
            .register(Box::new(DefiDepositHandler))
            .register(Box::new(DefiWithdrawHandler))
            .register(Box::new(DefiClaimHandler))
            .register(Box::new(AssetAdjustmentHandler))
            .build()
    }

    pub fn get(&self, transaction_type: TransactionType) -> Option<&dyn TransactionHandler> {
        self.handlers.get(&transaction_type).map(|h| h.as_ref())
    }
}

pub struct HandlerRegistryBuilder {
    handlers: HashMap<TransactionType, Box<dyn TransactionHandler>>,
}

impl HandlerRegistryBuilder {
    /// Registers `handler`. Panics on an attempt to register two handlers
    /// for the same transaction type: this is a wiring bug caught at
    /// startup, not a runtime condition.
    pub fn register(mut self, handler: Box<dyn TransactionHandler>) -> Self {
        let transaction_type = handler.transaction_type();
        if self.handlers.insert(transaction_type, handler).is_some() {
            panic!("duplicate handler registration for {transaction_type:?}");
        }
        self
    }

    pub fn build(self) -> HandlerRegistry {
        HandlerRegistry {
            handlers: self.handlers,
        }
    }
}
