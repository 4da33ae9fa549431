// Copyright (c) 2024 MoonTrack

//! Error taxonomy for the ledger and sync core.
//!
//! One `displaydoc`-derived enum per layer, each threading the layer below
//! it upward via `From`, mirroring the teacher's `WalletDbError` ->
//! `WalletServiceError` split. [`ErrorKind`] maps any of these onto the
//! seven kinds from the error-handling design (validation, authorization,
//! idempotency, invariant, policy, transient, integrity); idempotency never
//! produces an error value, so it has no `ErrorKind` variant.

use displaydoc::Display;
use uuid::Uuid;

use crate::money::MoneyError;

/// The error-handling-design kind a concrete error maps to, used by callers
/// that need to decide whether to propagate, retry, or only log.
#[derive(Display, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// validation
    Validation,
    /// authorization
    Authorization,
    /// invariant
    Invariant,
    /// policy
    Policy,
    /// transient
    Transient,
    /// integrity
    Integrity,
    /// cancelled
    Cancelled,
}

/// Returns true iff `err` is a Postgres unique-violation (SQLSTATE 23505),
/// detected via diesel's parsed `DatabaseErrorKind`, never by matching the
/// error message string.
pub fn is_unique_violation(err: &diesel::result::Error) -> bool {
    matches!(
        err,
        diesel::result::Error::DatabaseError(diesel::result::DatabaseErrorKind::UniqueViolation, _)
    )
}

/// Structural/policy validation failures a handler's `ValidateData` can
/// raise.
#[derive(Display, Debug)]
pub enum ValidationError {
    /// amount must be positive, got `{0}`
    NonPositiveAmount(String),
    /// occurred_at `{0}` is in the future
    FutureDated(String),
    /// missing required scope: {0}
    MissingScope(&'static str),
    /// unknown operation type `{0}`
    UnknownOperation(String),
    /// malformed payload: {0}
    MalformedPayload(String),
    /// wallet `{0}` does not belong to the requesting user
    WalletNotOwned(Uuid),
}

impl ValidationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ValidationError::WalletNotOwned(_) => ErrorKind::Authorization,
            _ => ErrorKind::Validation,
        }
    }
}

/// Errors from the DB layer (connection pool, queries, model invariants).
#[derive(Display, Debug)]
pub enum WalletDbError {
    /// diesel error: {0}
    Diesel(diesel::result::Error),
    /// connection pool error: {0}
    Pool(diesel::r2d2::PoolError),
    /// migration error: {0}
    Migration(String),
    /// account not found for code `{0}`
    AccountNotFound(String),
    /// account code `{0}` could not be parsed
    InvalidAccountCode(String),
    /// wallet `{0}` not found
    WalletNotFound(Uuid),
    /// transaction not found
    TransactionNotFound,
    /// account balance row missing for account {0} asset {1}
    BalanceNotFound(Uuid, Uuid),
}

impl From<diesel::result::Error> for WalletDbError {
    fn from(src: diesel::result::Error) -> Self {
        Self::Diesel(src)
    }
}

impl From<diesel::r2d2::PoolError> for WalletDbError {
    fn from(src: diesel::r2d2::PoolError) -> Self {
        Self::Pool(src)
    }
}

/// Errors from the tax-lot engine.
#[derive(Display, Debug)]
pub enum TaxLotError {
    /// database error: {0}
    Database(WalletDbError),
    /// insufficient open lots to dispose {0} units of asset `{1}` in account {2}
    InsufficientLots(String, String, Uuid),
    /// override reason must not be empty
    EmptyOverrideReason,
    /// cost basis override must not be negative
    NegativeCostBasis,
    /// lot `{0}` not found
    LotNotFound(Uuid),
}

impl From<WalletDbError> for TaxLotError {
    fn from(src: WalletDbError) -> Self {
        Self::Database(src)
    }
}

impl From<diesel::result::Error> for TaxLotError {
    fn from(src: diesel::result::Error) -> Self {
        Self::Database(src.into())
    }
}

/// Errors from the ledger service orchestration (`Record`, balance reads,
/// reconciliation).
#[derive(Display, Debug)]
pub enum LedgerServiceError {
    /// unknown transaction type `{0}`
    UnknownType(String),
    /// validation error: {0}
    Validation(ValidationError),
    /// generated entries do not balance: debits {0} != credits {1}
    Invariant(String, String),
    /// would move wallet {0} asset {1} balance negative
    InsufficientBalance(Uuid, Uuid),
    /// database error: {0}
    Database(WalletDbError),
    /// tax-lot hook failed: {0}
    TaxLot(TaxLotError),
    /// clearing account {0} does not net to zero: {1}
    ClearingMismatch(Uuid, String),
    /// money error: {0}
    Money(MoneyError),
    /// cancelled before the write began
    Cancelled,
}

impl LedgerServiceError {
    /// Maps this error onto the error-handling-design kind (§7), used by
    /// the sync processor to decide whether to stop cursor advancement.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerServiceError::UnknownType(_) => ErrorKind::Validation,
            LedgerServiceError::Validation(v) => v.kind(),
            LedgerServiceError::Invariant(..) => ErrorKind::Invariant,
            LedgerServiceError::InsufficientBalance(..) => ErrorKind::Policy,
            LedgerServiceError::Database(_) => ErrorKind::Transient,
            LedgerServiceError::TaxLot(_) => ErrorKind::Integrity,
            LedgerServiceError::ClearingMismatch(..) => ErrorKind::Integrity,
            LedgerServiceError::Money(_) => ErrorKind::Validation,
            LedgerServiceError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

impl From<WalletDbError> for LedgerServiceError {
    fn from(src: WalletDbError) -> Self {
        Self::Database(src)
    }
}

impl From<diesel::result::Error> for LedgerServiceError {
    fn from(src: diesel::result::Error) -> Self {
        Self::Database(src.into())
    }
}

impl From<TaxLotError> for LedgerServiceError {
    fn from(src: TaxLotError) -> Self {
        Self::TaxLot(src)
    }
}

impl From<ValidationError> for LedgerServiceError {
    fn from(src: ValidationError) -> Self {
        Self::Validation(src)
    }
}

impl From<MoneyError> for LedgerServiceError {
    fn from(src: MoneyError) -> Self {
        Self::Money(src)
    }
}

/// Errors from the decoded-transaction provider adapter.
#[derive(Display, Debug)]
pub enum ProviderError {
    /// http request failed: {0}
    Http(reqwest::Error),
    /// rate limited after exhausting retries
    RateLimited,
    /// unexpected response shape: {0}
    UnexpectedShape(String),
    /// invalid integer amount `{0}`
    InvalidAmount(String),
    /// money error: {0}
    Money(MoneyError),
    /// cancelled
    Cancelled,
}

impl From<reqwest::Error> for ProviderError {
    fn from(src: reqwest::Error) -> Self {
        Self::Http(src)
    }
}

impl From<MoneyError> for ProviderError {
    fn from(src: MoneyError) -> Self {
        Self::Money(src)
    }
}

/// Errors from the background sync service / processor.
#[derive(Display, Debug)]
pub enum SyncServiceError {
    /// provider error: {0}
    Provider(ProviderError),
    /// ledger error: {0}
    Ledger(LedgerServiceError),
    /// database error: {0}
    Database(WalletDbError),
    /// wallet {0} is claimed by another worker
    AlreadyClaimed(Uuid),
    /// cancelled
    Cancelled,
}

impl SyncServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncServiceError::Provider(ProviderError::Cancelled) => ErrorKind::Cancelled,
            SyncServiceError::Provider(ProviderError::RateLimited) => ErrorKind::Transient,
            SyncServiceError::Provider(_) => ErrorKind::Transient,
            SyncServiceError::Ledger(e) => e.kind(),
            SyncServiceError::Database(_) => ErrorKind::Transient,
            SyncServiceError::AlreadyClaimed(_) => ErrorKind::Transient,
            SyncServiceError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

impl From<ProviderError> for SyncServiceError {
    fn from(src: ProviderError) -> Self {
        Self::Provider(src)
    }
}

impl From<LedgerServiceError> for SyncServiceError {
    fn from(src: LedgerServiceError) -> Self {
        Self::Ledger(src)
    }
}

impl From<WalletDbError> for SyncServiceError {
    fn from(src: WalletDbError) -> Self {
        Self::Database(src)
    }
}

impl From<diesel::result::Error> for SyncServiceError {
    fn from(src: diesel::result::Error) -> Self {
        Self::Database(src.into())
    }
}
