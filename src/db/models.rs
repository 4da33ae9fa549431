// Copyright (c) 2024 MoonTrack

//! DB models: one `Queryable` row struct and one `Insertable` `New*` struct
//! per table, plus the typed enums the rest of the crate operates on. Enum
//! columns are stored as plain `TEXT` (matching the teacher's own
//! `TXO_UNSPENT`/`TXO_PENDING`-style string constants, chosen there because
//! `diesel-derive-enum` support across backends was unreliable); here the
//! strings are produced/parsed through `strum` instead of hand-written
//! constants, which the wider example corpus favors for this exact
//! boundary.

use chrono::{DateTime, Utc};
use diesel::{AsChangeset, Identifiable, Insertable, Queryable};
use serde_json::Value as Json;
use strum_macros::{Display, EnumString};
use uuid::Uuid;

use super::schema::{
    account_balances, accounts, entries, lot_disposals, lot_override_history, position_wac,
    reconciliation_alerts, tax_lots, transactions, users, wallets,
};
use crate::money::Money;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumString)]
pub enum AccountType {
    #[strum(serialize = "CRYPTO_WALLET")]
    CryptoWallet,
    #[strum(serialize = "INCOME")]
    Income,
    #[strum(serialize = "EXPENSE")]
    Expense,
    #[strum(serialize = "GAS_FEE")]
    GasFee,
    #[strum(serialize = "CLEARING")]
    Clearing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum TransactionType {
    TransferIn,
    TransferOut,
    InternalTransfer,
    AssetAdjustment,
    Swap,
    DefiDeposit,
    DefiWithdraw,
    DefiClaim,
    /// Synthetic transaction wrapping a genesis-lot backfill row; never
    /// dispatched through the handler registry.
    Genesis,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum DebitOrCredit {
    Debit,
    Credit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum EntryType {
    AssetIncrease,
    AssetDecrease,
    Income,
    Expense,
    GasFee,
    Clearing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum SyncStatus {
    Pending,
    Syncing,
    Synced,
    Error,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum AutoCostBasisSource {
    SwapPrice,
    FmvAtTransfer,
    LinkedTransfer,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum DisposalType {
    Sale,
    InternalTransfer,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ReconciliationKind {
    ClearingNonzero,
    BalanceMismatch,
}

#[derive(Clone, Debug, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub id: Uuid,
    pub email: &'a str,
}

#[derive(Clone, Debug, Queryable, Identifiable)]
#[diesel(table_name = wallets)]
pub struct Wallet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub address: String,
    pub chain_id: i64,
    pub sync_status: String,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub sync_started_at: Option<DateTime<Utc>>,
    pub sync_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Wallet {
    pub fn sync_status(&self) -> SyncStatus {
        self.sync_status
            .parse()
            .expect("sync_status column always holds a valid SyncStatus")
    }
}

#[derive(Insertable)]
#[diesel(table_name = wallets)]
pub struct NewWallet<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub address: &'a str,
    pub chain_id: i64,
    pub sync_status: &'a str,
}

#[derive(Clone, Debug, Queryable, Identifiable)]
#[diesel(table_name = accounts)]
pub struct Account {
    pub id: Uuid,
    pub code: String,
    pub type_: String,
    pub asset_id: Option<Uuid>,
    pub wallet_id: Option<Uuid>,
    pub chain_id: Option<i64>,
    pub metadata: Json,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn account_type(&self) -> AccountType {
        self.type_
            .parse()
            .expect("type column always holds a valid AccountType")
    }
}

#[derive(Insertable)]
#[diesel(table_name = accounts)]
pub struct NewAccount<'a> {
    pub id: Uuid,
    pub code: &'a str,
    pub type_: &'a str,
    pub asset_id: Option<Uuid>,
    pub wallet_id: Option<Uuid>,
    pub chain_id: Option<i64>,
}

#[derive(Clone, Debug, Queryable, Identifiable)]
#[diesel(table_name = transactions)]
pub struct Transaction {
    pub id: Uuid,
    pub type_: String,
    pub source: String,
    pub external_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub status: String,
    pub raw_data: Json,
}

impl Transaction {
    pub fn transaction_type(&self) -> TransactionType {
        self.type_
            .parse()
            .expect("type column always holds a valid TransactionType")
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
            .parse()
            .expect("status column always holds a valid TransactionStatus")
    }
}

#[derive(Insertable)]
#[diesel(table_name = transactions)]
pub struct NewTransaction<'a> {
    pub id: Uuid,
    pub type_: &'a str,
    pub source: &'a str,
    pub external_id: Option<&'a str>,
    pub occurred_at: DateTime<Utc>,
    pub status: &'a str,
    pub raw_data: Json,
}

#[derive(Clone, Debug, Queryable, Identifiable)]
#[diesel(table_name = entries)]
pub struct Entry {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub account_id: Uuid,
    pub debit_or_credit: String,
    pub entry_type: String,
    pub amount: Money,
    pub asset_id: Uuid,
    pub usd_rate: Money,
    pub usd_value: Money,
    pub occurred_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub metadata: Json,
    pub entry_order: i32,
}

impl Entry {
    pub fn debit_or_credit(&self) -> DebitOrCredit {
        self.debit_or_credit
            .parse()
            .expect("debit_or_credit column always holds a valid DebitOrCredit")
    }

    pub fn entry_type(&self) -> EntryType {
        self.entry_type
            .parse()
            .expect("entry_type column always holds a valid EntryType")
    }
}

#[derive(Insertable)]
#[diesel(table_name = entries)]
pub struct NewEntry<'a> {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub account_id: Uuid,
    pub debit_or_credit: &'a str,
    pub entry_type: &'a str,
    pub amount: Money,
    pub asset_id: Uuid,
    pub usd_rate: Money,
    pub usd_value: Money,
    pub occurred_at: DateTime<Utc>,
    pub metadata: Json,
    pub entry_order: i32,
}

#[derive(Clone, Debug, Queryable, Identifiable)]
#[diesel(table_name = account_balances, primary_key(account_id, asset_id))]
pub struct AccountBalance {
    pub account_id: Uuid,
    pub asset_id: Uuid,
    pub balance: Money,
    pub usd_value: Money,
    pub last_updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Queryable, Identifiable)]
#[diesel(table_name = tax_lots)]
pub struct TaxLot {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub account_id: Uuid,
    pub asset: String,
    pub quantity_acquired: Money,
    pub quantity_remaining: Money,
    pub acquired_at: DateTime<Utc>,
    pub auto_cost_basis_per_unit: Money,
    pub auto_cost_basis_source: String,
    pub override_cost_basis_per_unit: Option<Money>,
    pub override_reason: Option<String>,
    pub override_at: Option<DateTime<Utc>>,
    pub linked_source_lot_id: Option<Uuid>,
}

impl TaxLot {
    pub fn auto_cost_basis_source(&self) -> AutoCostBasisSource {
        self.auto_cost_basis_source
            .parse()
            .expect("auto_cost_basis_source column always holds a valid AutoCostBasisSource")
    }

    /// Effective per-unit cost basis: `override -> linked_source.override ->
    /// linked_source.auto -> auto`. `linked_source` must be the already
    /// loaded source lot, if any (the engine resolves at most one level).
    pub fn effective_cost_basis(&self, linked_source: Option<&TaxLot>) -> Money {
        if let Some(o) = &self.override_cost_basis_per_unit {
            return o.clone();
        }
        if let Some(source) = linked_source {
            if let Some(o) = &source.override_cost_basis_per_unit {
                return o.clone();
            }
            return source.auto_cost_basis_per_unit.clone();
        }
        self.auto_cost_basis_per_unit.clone()
    }
}

#[derive(Insertable)]
#[diesel(table_name = tax_lots)]
pub struct NewTaxLot<'a> {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub account_id: Uuid,
    pub asset: &'a str,
    pub quantity_acquired: Money,
    pub quantity_remaining: Money,
    pub acquired_at: DateTime<Utc>,
    pub auto_cost_basis_per_unit: Money,
    pub auto_cost_basis_source: &'a str,
    pub linked_source_lot_id: Option<Uuid>,
}

#[derive(Clone, Debug, Queryable, Identifiable)]
#[diesel(table_name = lot_disposals)]
pub struct LotDisposal {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub lot_id: Uuid,
    pub quantity_disposed: Money,
    pub proceeds_per_unit: Money,
    pub disposal_type: String,
    pub disposed_at: DateTime<Utc>,
}

impl LotDisposal {
    pub fn disposal_type(&self) -> DisposalType {
        self.disposal_type
            .parse()
            .expect("disposal_type column always holds a valid DisposalType")
    }
}

#[derive(Insertable)]
#[diesel(table_name = lot_disposals)]
pub struct NewLotDisposal<'a> {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub lot_id: Uuid,
    pub quantity_disposed: Money,
    pub proceeds_per_unit: Money,
    pub disposal_type: &'a str,
    pub disposed_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Queryable, Identifiable)]
#[diesel(table_name = lot_override_history)]
pub struct LotOverrideHistory {
    pub id: Uuid,
    pub lot_id: Uuid,
    pub previous: Option<Money>,
    pub new: Option<Money>,
    pub reason: String,
    pub changed_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[diesel(table_name = lot_override_history)]
pub struct NewLotOverrideHistory<'a> {
    pub id: Uuid,
    pub lot_id: Uuid,
    pub previous: Option<Money>,
    pub new: Option<Money>,
    pub reason: &'a str,
}

#[derive(Insertable)]
#[diesel(table_name = reconciliation_alerts)]
pub struct NewReconciliationAlert<'a> {
    pub id: Uuid,
    pub account_id: Uuid,
    pub asset_id: Option<Uuid>,
    pub kind: &'a str,
    pub details: &'a str,
}

#[derive(Clone, Debug, Queryable, Identifiable)]
#[diesel(table_name = position_wac, primary_key(account_id, asset))]
pub struct PositionWac {
    pub account_id: Uuid,
    pub asset: String,
    pub weighted_avg_cost_per_unit: Money,
    pub total_remaining: Money,
    pub refreshed_at: DateTime<Utc>,
}

#[derive(Insertable, AsChangeset)]
#[diesel(table_name = position_wac)]
pub struct NewPositionWac<'a> {
    pub account_id: Uuid,
    pub asset: &'a str,
    pub weighted_avg_cost_per_unit: Money,
    pub total_remaining: Money,
}
