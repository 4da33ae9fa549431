// Copyright (c) 2024 MoonTrack

//! A cooperative cancellation signal (§5) threaded into every operation that
//! performs I/O: the provider's HTTP fetch (including the retry backoff
//! sleep), the per-transaction sync loop, and the ledger write itself. There
//! is no preemption — a caller must check [`CancellationToken::is_cancelled`]
//! at a suspension point and bail out; a ledger write already in flight
//! always completes or rolls back rather than being interrupted mid-commit.
//!
//! Shares the same `Arc<AtomicBool>` shape `SyncThread` already uses for its
//! own stop flag, so `SyncThread::start` hands the very flag it checks
//! between ticks down into everything that flag's tick drives.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

#[derive(Clone, Debug)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Wraps a flag some other owner (e.g. `SyncThread`'s `stop_requested`)
    /// already controls, so cancelling that flag cancels this token too.
    pub fn from_flag(flag: Arc<AtomicBool>) -> Self {
        Self(flag)
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_uncancelled() {
        assert!(!CancellationToken::new().is_cancelled());
    }

    #[test]
    fn cancel_is_visible_through_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn from_flag_shares_state_with_the_original_owner() {
        let flag = Arc::new(AtomicBool::new(false));
        let token = CancellationToken::from_flag(flag.clone());
        flag.store(true, Ordering::SeqCst);
        assert!(token.is_cancelled());
    }
}
