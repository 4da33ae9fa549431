// Copyright (c) 2024 MoonTrack

//! The ledger engine: account resolution, transaction handlers, the
//! orchestrating service, and clearing-account reconciliation (§4.3-§4.7).

pub mod account_resolver;
pub mod handlers;
pub mod reconciliation;
pub mod service;

pub use service::{LedgerService, RecordOutcome};
