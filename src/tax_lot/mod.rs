// Copyright (c) 2024 MoonTrack

//! The tax-lot accounting engine (§4.8-§4.12): FIFO lot creation/disposal
//! wired into the ledger as a post-commit hook, manual cost-basis overrides
//! with an audit trail, a weighted-average-cost refresh for display, genesis
//! backfill for wallets that already held a balance before their first
//! tracked transaction, and realised P&L reporting.

pub mod genesis;
pub mod hook;
pub mod overrides;
pub mod pnl;
pub mod wac;
