// Copyright (c) 2024 MoonTrack

//! The ledger service: orchestrates validate -> resolve -> persist ->
//! update-balances -> post-commit, all in one DB transaction (§4.5).

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{
    account_resolver,
    handlers::{HandlerRegistry, RequestContext, TransactionPayload},
};
use crate::{
    cancellation::CancellationToken,
    db::{
        account::AccountModel,
        balance::{AccountBalanceModel, BalanceUpdateError},
        entry::EntryModel,
        exclusive_transaction,
        models::{Account, AccountBalance, AccountType, DebitOrCredit, Entry, EntryType, NewEntry, NewTransaction, Transaction, TransactionStatus},
        transaction::TransactionModel,
        Conn, LedgerDb,
    },
    error::{is_unique_violation, LedgerServiceError},
    money::Money,
    tax_lot,
};

pub struct RecordOutcome {
    pub transaction_id: Uuid,
    pub status: TransactionStatus,
}

pub struct LedgerService {
    db: LedgerDb,
    registry: HandlerRegistry,
}

impl LedgerService {
    pub fn new(db: LedgerDb, registry: HandlerRegistry) -> Self {
        Self { db, registry }
    }

    /// `Record(type, source, external_id?, occurred_at, payload)` (§4.5,
    /// §6). Steps 1-3 (handler lookup, validation, entry generation and the
    /// balance-invariant check) run against a plain connection; steps 4-11
    /// run inside one DB transaction.
    ///
    /// `cancel` is only checked before the transaction opens (§5): once a
    /// write is in flight it always completes or rolls back, never half-
    /// committed, so cancellation here only ever stops the *next* record
    /// from starting.
    pub fn record(
        &self,
        source: &str,
        external_id: Option<&str>,
        occurred_at: DateTime<Utc>,
        payload: TransactionPayload,
        ctx: RequestContext,
        cancel: &CancellationToken,
    ) -> Result<RecordOutcome, LedgerServiceError> {
        if cancel.is_cancelled() {
            return Err(LedgerServiceError::Cancelled);
        }

        let transaction_type = payload.transaction_type();
        let handler = self
            .registry
            .get(transaction_type)
            .ok_or_else(|| LedgerServiceError::UnknownType(transaction_type.to_string()))?;

        let mut conn = self.db.get_conn()?;

        handler.validate(&payload, &ctx, &mut conn)?;
        let generated = handler.generate_entries(&payload, occurred_at)?;

        let debit_total = generated
            .iter()
            .filter(|e| e.debit_or_credit == DebitOrCredit::Debit)
            .fold(Money::zero(), |acc, e| &acc + &e.amount);
        let credit_total = generated
            .iter()
            .filter(|e| e.debit_or_credit == DebitOrCredit::Credit)
            .fold(Money::zero(), |acc, e| &acc + &e.amount);
        if debit_total != credit_total {
            return Err(LedgerServiceError::Invariant(
                debit_total.to_string(),
                credit_total.to_string(),
            ));
        }

        let raw_data = payload.to_raw_json();

        exclusive_transaction(&mut conn, |conn| {
            let new_transaction = NewTransaction {
                id: Uuid::new_v4(),
                type_: &transaction_type.to_string(),
                source,
                external_id,
                occurred_at,
                status: "pending",
                raw_data,
            };

            let transaction = match Transaction::insert(&new_transaction, conn) {
                Ok(t) => t,
                Err(e) if is_unique_violation(&e) => {
                    let external_id = external_id.unwrap_or_default();
                    let existing = Transaction::find_by_source_external_id(source, external_id, conn)?
                        .expect("unique violation on (source, external_id) implies a prior row exists");
                    debug!(%source, external_id, "duplicate transaction, returning existing id");
                    return Ok(RecordOutcome {
                        transaction_id: existing.id,
                        status: existing.status(),
                    });
                }
                Err(e) => return Err(e.into()),
            };

            match Self::persist_and_apply(&transaction, &generated, conn) {
                Ok(()) => {
                    Transaction::mark_completed(transaction.id, conn)?;
                    Ok(RecordOutcome {
                        transaction_id: transaction.id,
                        status: TransactionStatus::Completed,
                    })
                }
                Err(e) => {
                    // Returning Err rolls back the whole transaction
                    // (including the just-inserted `pending` row), so there
                    // is nothing left to mark `failed` against; the error
                    // itself carries the reason.
                    Err(e)
                }
            }
        })
    }

    fn persist_and_apply(
        transaction: &Transaction,
        generated: &[super::handlers::GeneratedEntry],
        conn: &mut Conn,
    ) -> Result<(), LedgerServiceError> {
        let mut resolved_accounts = Vec::with_capacity(generated.len());
        for g in generated {
            let account = account_resolver::resolve(&g.account_code, g.asset_id, conn)?;
            resolved_accounts.push(account);
        }

        let new_entries: Vec<NewEntry> = generated
            .iter()
            .zip(&resolved_accounts)
            .enumerate()
            .map(|(order, (g, account))| NewEntry {
                id: Uuid::new_v4(),
                transaction_id: transaction.id,
                account_id: account.id,
                debit_or_credit: debit_or_credit_str(g.debit_or_credit),
                entry_type: entry_type_str(g.entry_type),
                amount: g.amount.clone(),
                asset_id: g.asset_id,
                usd_rate: g.usd_rate.clone(),
                usd_value: g.usd_value.clone(),
                occurred_at: g.occurred_at,
                metadata: g.metadata.clone(),
                entry_order: order as i32,
            })
            .collect();

        let inserted_entries = Entry::insert_all(&new_entries, conn)?;

        for (entry, account) in inserted_entries.iter().zip(&resolved_accounts) {
            if entry.entry_type() == EntryType::Clearing {
                continue;
            }

            let signed_amount = match entry.debit_or_credit() {
                DebitOrCredit::Debit => entry.amount.clone(),
                DebitOrCredit::Credit => &Money::zero() - &entry.amount,
            };
            let signed_usd_value = match entry.debit_or_credit() {
                DebitOrCredit::Debit => entry.usd_value.clone(),
                DebitOrCredit::Credit => &Money::zero() - &entry.usd_value,
            };
            let enforce_non_negative = account.account_type() == AccountType::CryptoWallet;

            AccountBalance::apply_delta(
                account.id,
                entry.asset_id,
                signed_amount,
                signed_usd_value,
                enforce_non_negative,
                conn,
            )
            .map_err(|e| match e {
                BalanceUpdateError::WouldGoNegative => {
                    LedgerServiceError::InsufficientBalance(account.id, entry.asset_id)
                }
                BalanceUpdateError::Database(db_err) => LedgerServiceError::Database(db_err),
            })?;
        }

        let committed = tax_lot::hook::CommittedTransaction {
            transaction: transaction.clone(),
            entries: inserted_entries
                .into_iter()
                .zip(resolved_accounts)
                .map(|(entry, account)| tax_lot::hook::CommittedEntry { entry, account })
                .collect(),
        };

        if let Err(e) = tax_lot::hook::run(&committed, conn) {
            warn!(transaction_id = %transaction.id, error = %e, "tax-lot hook failed");
            return Err(e.into());
        }

        Ok(())
    }

    pub fn get_account_balance(
        &self,
        account_id: Uuid,
        asset_id: Uuid,
    ) -> Result<AccountBalance, LedgerServiceError> {
        let mut conn = self.db.get_conn()?;
        AccountBalance::get(account_id, asset_id, &mut conn).map_err(Into::into)
    }

    /// `ReconcileBalance(account_id, asset_id)` (§6): recomputes from
    /// entries and compares to the stored balance.
    pub fn reconcile_balance(&self, account_id: Uuid, asset_id: Uuid) -> Result<Option<Money>, LedgerServiceError> {
        let mut conn = self.db.get_conn()?;
        let stored = AccountBalance::get(account_id, asset_id, &mut conn)?;
        let recomputed = AccountBalance::recompute_from_entries(account_id, asset_id, &mut conn)?;
        if recomputed == stored.balance {
            Ok(None)
        } else {
            super::reconciliation::persist_balance_mismatch_alert(
                account_id,
                asset_id,
                &stored.balance,
                &recomputed,
                &mut conn,
            )?;
            Ok(Some(recomputed))
        }
    }
}

fn debit_or_credit_str(v: DebitOrCredit) -> &'static str {
    match v {
        DebitOrCredit::Debit => "debit",
        DebitOrCredit::Credit => "credit",
    }
}

fn entry_type_str(v: EntryType) -> &'static str {
    match v {
        EntryType::AssetIncrease => "asset_increase",
        EntryType::AssetDecrease => "asset_decrease",
        EntryType::Income => "income",
        EntryType::Expense => "expense",
        EntryType::GasFee => "gas_fee",
        EntryType::Clearing => "clearing",
    }
}
