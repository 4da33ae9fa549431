// Copyright (c) 2024 MoonTrack

//! The tax-lot post-commit hook (§4.12): runs inside the same DB
//! transaction as the ledger write it is reacting to, creating lots on
//! acquisition and disposing them FIFO on disposal.

use chrono::{DateTime, Utc};
use num_bigint::BigInt;
use tracing::warn;
use uuid::Uuid;

use crate::{
    db::{
        models::{
            Account, AccountType, AutoCostBasisSource, DisposalType, Entry, EntryType, NewLotDisposal, NewTaxLot,
            TaxLot, Transaction, TransactionType,
        },
        tax_lot::TaxLotModel,
        Conn,
    },
    error::TaxLotError,
    money::{Money, USD_SCALE},
};

/// One ledger entry paired with the account it posted against, as persisted
/// inside the enclosing ledger transaction.
#[derive(Clone)]
pub struct CommittedEntry {
    pub entry: Entry,
    pub account: Account,
}

#[derive(Clone)]
pub struct CommittedTransaction {
    pub transaction: Transaction,
    pub entries: Vec<CommittedEntry>,
}

/// Derives a per-base-unit scaled-USD price from an entry's own `usd_value`
/// and `amount`. `usd_value` is stored as plain dollars (§4.1's `Money::
/// usd_value`), so multiplying back by `10^USD_SCALE` before dividing by
/// the base-unit amount recovers a scaled-USD-per-base-unit figure without
/// needing the asset's decimals, which are not persisted past the entry
/// row. This keeps every per-unit figure in tax lots (`auto_cost_basis_per_
/// unit`, `proceeds_per_unit`) in one consistent unit system, computable
/// purely from already-persisted entries.
fn per_base_unit_cost(usd_value: &Money, amount: &Money) -> Money {
    if amount.is_zero() {
        return Money::zero();
    }
    let scale = BigInt::from(10u64).pow(USD_SCALE);
    Money::from_bigint((usd_value.as_bigint() * &scale) / amount.as_bigint())
}

fn asset_symbol_from_wallet_code(code: &str) -> &str {
    code.rsplit('.').next().unwrap_or(code)
}

/// Runs disposals before acquisitions regardless of the order a handler
/// generated its entries in: `acquire`'s `InternalTransfer` branch looks up
/// `latest_disposal_for_transaction` to link the new lot back to the
/// disposal that funded it, so that disposal must already exist by the time
/// `acquire` runs.
pub fn run(committed: &CommittedTransaction, conn: &mut Conn) -> Result<(), TaxLotError> {
    let transaction_type = committed.transaction.transaction_type();

    let wallet_entries = committed
        .entries
        .iter()
        .filter(|ce| ce.account.account_type() == AccountType::CryptoWallet);

    for committed_entry in wallet_entries.clone() {
        if committed_entry.entry.entry_type() == EntryType::AssetDecrease {
            dispose(transaction_type, committed, committed_entry, conn)?;
        }
    }
    for committed_entry in wallet_entries {
        if committed_entry.entry.entry_type() == EntryType::AssetIncrease {
            acquire(transaction_type, committed, committed_entry, conn)?;
        }
    }
    Ok(())
}

fn acquire(
    transaction_type: TransactionType,
    committed: &CommittedTransaction,
    ce: &CommittedEntry,
    conn: &mut Conn,
) -> Result<(), TaxLotError> {
    let symbol = asset_symbol_from_wallet_code(&ce.account.code);

    let (cost_basis_per_unit, source, linked_source_lot_id) = match transaction_type {
        TransactionType::Swap => {
            let sold_leg = committed.entries.iter().find(|other| {
                other.account.account_type() == AccountType::CryptoWallet
                    && other.entry.entry_type() == EntryType::AssetDecrease
            });
            match sold_leg {
                Some(sold) => (
                    per_base_unit_cost(&sold.entry.usd_value, &ce.entry.amount),
                    AutoCostBasisSource::SwapPrice,
                    None,
                ),
                None => (
                    per_base_unit_cost(&ce.entry.usd_value, &ce.entry.amount),
                    AutoCostBasisSource::FmvAtTransfer,
                    None,
                ),
            }
        }
        TransactionType::DefiDeposit => {
            let underlying_total = committed
                .entries
                .iter()
                .filter(|other| {
                    other.account.account_type() == AccountType::CryptoWallet
                        && other.entry.entry_type() == EntryType::AssetDecrease
                })
                .fold(Money::zero(), |acc, other| &acc + &other.entry.usd_value);
            (
                per_base_unit_cost(&underlying_total, &ce.entry.amount),
                AutoCostBasisSource::SwapPrice,
                None,
            )
        }
        TransactionType::InternalTransfer => {
            let linked = TaxLot::latest_disposal_for_transaction(committed.transaction.id, conn)?;
            (
                per_base_unit_cost(&ce.entry.usd_value, &ce.entry.amount),
                AutoCostBasisSource::LinkedTransfer,
                linked.map(|d| d.lot_id),
            )
        }
        // transfer_in, defi_claim, defi_withdraw (underlying received),
        // asset_adjustment (increase).
        _ => (
            per_base_unit_cost(&ce.entry.usd_value, &ce.entry.amount),
            AutoCostBasisSource::FmvAtTransfer,
            None,
        ),
    };

    let new_lot = NewTaxLot {
        id: Uuid::new_v4(),
        transaction_id: committed.transaction.id,
        account_id: ce.account.id,
        asset: symbol,
        quantity_acquired: ce.entry.amount.clone(),
        quantity_remaining: ce.entry.amount.clone(),
        acquired_at: ce.entry.occurred_at,
        auto_cost_basis_per_unit: cost_basis_per_unit,
        auto_cost_basis_source: &source.to_string(),
        linked_source_lot_id,
    };
    TaxLot::create(&new_lot, conn)?;
    Ok(())
}

fn dispose(
    transaction_type: TransactionType,
    committed: &CommittedTransaction,
    ce: &CommittedEntry,
    conn: &mut Conn,
) -> Result<(), TaxLotError> {
    let symbol = asset_symbol_from_wallet_code(&ce.account.code).to_string();
    let mut need = ce.entry.amount.clone();
    let disposal_type = if transaction_type == TransactionType::InternalTransfer {
        DisposalType::InternalTransfer
    } else {
        DisposalType::Sale
    }
    .to_string();
    let proceeds_per_unit = per_base_unit_cost(&ce.entry.usd_value, &ce.entry.amount);
    let disposed_at: DateTime<Utc> = ce.entry.occurred_at;

    let open_lots = TaxLot::select_open_lots_for_update(ce.account.id, &symbol, conn)?;

    for lot in open_lots {
        if need.is_zero() {
            break;
        }
        let take = if lot.quantity_remaining < need {
            lot.quantity_remaining.clone()
        } else {
            need.clone()
        };
        if take.is_zero() {
            continue;
        }

        let new_remaining = &lot.quantity_remaining - &take;
        TaxLot::update_remaining(lot.id, new_remaining, conn)?;

        let new_disposal = NewLotDisposal {
            id: Uuid::new_v4(),
            transaction_id: committed.transaction.id,
            lot_id: lot.id,
            quantity_disposed: take.clone(),
            proceeds_per_unit: proceeds_per_unit.clone(),
            disposal_type: &disposal_type,
            disposed_at,
        };
        TaxLot::insert_disposal(&new_disposal, conn)?;

        need = &need - &take;
    }

    if !need.is_zero() {
        warn!(
            account_id = %ce.account.id,
            asset = %symbol,
            remaining_need = %need,
            "insufficient open tax lots to fully dispose entry; ledger write still committed"
        );
    }

    Ok(())
}
