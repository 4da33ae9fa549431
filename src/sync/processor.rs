// Copyright (c) 2024 MoonTrack

//! Per-`(wallet, decoded transaction)` processing (§4.10): classifies,
//! reclassifies same-user transfers between the caller's own wallets as
//! `internal_transfer`, builds the type-specific ledger payload, and
//! invokes the ledger service.
//!
//! Duplicate-key handling lives in `LedgerService::record` itself (it
//! matches SQLSTATE `23505` on `(source, external_id)` and returns the
//! existing transaction rather than an error), so this module only has to
//! propagate whatever `record` returns.

use tracing::debug;

use super::classifier;
use crate::{
    cancellation::CancellationToken,
    db::{models::{TransactionType, Wallet}, wallet::WalletModel, Conn},
    error::SyncServiceError,
    ledger::{
        handlers::{
            DefiClaimPayload, DefiPayload, GasLeg, InternalTransferPayload, LegAmount, RequestContext,
            SwapPayload, TransactionPayload, TransferInPayload, TransferOutPayload,
        },
        service::LedgerService,
    },
    money::Money,
    provider::{DecodedTransaction, Fee, Transfer, TransactionStatus, TransferDirection},
};

const SOURCE: &str = "zerion";

fn leg_amount(transfer: &Transfer, chain_id: i64) -> LegAmount {
    LegAmount {
        asset_symbol: transfer.asset_symbol.clone(),
        chain_id,
        decimals: transfer.decimals,
        amount: transfer.amount.clone(),
        usd_rate: transfer.usd_price.clone().unwrap_or_else(Money::zero),
    }
}

fn gas_leg(fee: &Fee) -> GasLeg {
    GasLeg {
        asset_symbol: fee.asset_symbol.clone(),
        decimals: fee.decimals,
        amount: fee.amount.clone(),
        usd_rate: fee.usd_price.clone().unwrap_or_else(Money::zero),
    }
}

fn primary_transfer(transfers: &[Transfer], direction: TransferDirection) -> Option<&Transfer> {
    transfers.iter().find(|t| t.direction == direction)
}

/// A user-scoped "is this address another wallet of mine?" lookup (§4.10):
/// never queries across users, so a positive/negative result never leaks
/// whether an address belongs to somebody else's wallet.
fn find_counterparty(wallet: &Wallet, address: &str, conn: &mut Conn) -> Result<Option<Wallet>, SyncServiceError> {
    let lowered = address.to_lowercase();
    match Wallet::find_by_address(wallet.user_id, wallet.chain_id, &lowered, conn)? {
        Some(found) if found.id != wallet.id => Ok(Some(found)),
        _ => Ok(None),
    }
}

pub fn process(
    wallet: &Wallet,
    tx: &DecodedTransaction,
    ledger: &LedgerService,
    conn: &mut Conn,
    cancel: &CancellationToken,
) -> Result<(), SyncServiceError> {
    if tx.status != TransactionStatus::Confirmed {
        return Ok(());
    }

    let directions: Vec<TransferDirection> = tx.transfers.iter().map(|t| t.direction).collect();
    let Some(classified) = classifier::classify(tx.operation_type, &directions) else {
        return Ok(());
    };

    let gas = tx.fee.as_ref().map(gas_leg);

    let payload = match classified {
        TransactionType::TransferIn => {
            let Some(incoming) = primary_transfer(&tx.transfers, TransferDirection::In) else {
                return Ok(());
            };
            if find_counterparty(wallet, &incoming.sender, conn)?.is_some() {
                debug!(wallet_id = %wallet.id, "skipping in-side of internal transfer, out-side records it");
                return Ok(());
            }
            TransactionPayload::TransferIn(TransferInPayload {
                wallet_id: wallet.id,
                chain_id: tx.chain_id,
                leg: leg_amount(incoming, tx.chain_id),
            })
        }
        TransactionType::TransferOut => {
            let Some(outgoing) = primary_transfer(&tx.transfers, TransferDirection::Out) else {
                return Ok(());
            };
            match find_counterparty(wallet, &outgoing.recipient, conn)? {
                Some(destination) => TransactionPayload::InternalTransfer(InternalTransferPayload {
                    source_wallet_id: wallet.id,
                    destination_wallet_id: destination.id,
                    chain_id: tx.chain_id,
                    leg: leg_amount(outgoing, tx.chain_id),
                    gas,
                }),
                None => TransactionPayload::TransferOut(TransferOutPayload {
                    wallet_id: wallet.id,
                    chain_id: tx.chain_id,
                    leg: leg_amount(outgoing, tx.chain_id),
                    gas,
                }),
            }
        }
        TransactionType::Swap => {
            let bought = primary_transfer(&tx.transfers, TransferDirection::In);
            let sold = primary_transfer(&tx.transfers, TransferDirection::Out);
            let (Some(bought), Some(sold)) = (bought, sold) else {
                return Ok(());
            };
            TransactionPayload::Swap(SwapPayload {
                wallet_id: wallet.id,
                chain_id: tx.chain_id,
                bought: leg_amount(bought, tx.chain_id),
                sold: leg_amount(sold, tx.chain_id),
                gas,
            })
        }
        TransactionType::DefiDeposit | TransactionType::DefiWithdraw => {
            let received: Vec<LegAmount> = tx
                .transfers
                .iter()
                .filter(|t| t.direction == TransferDirection::In)
                .map(|t| leg_amount(t, tx.chain_id))
                .collect();
            let sent: Vec<LegAmount> = tx
                .transfers
                .iter()
                .filter(|t| t.direction == TransferDirection::Out)
                .map(|t| leg_amount(t, tx.chain_id))
                .collect();
            if received.is_empty() && sent.is_empty() {
                return Ok(());
            }
            let defi = DefiPayload { wallet_id: wallet.id, chain_id: tx.chain_id, received, sent, gas };
            if classified == TransactionType::DefiDeposit {
                TransactionPayload::DefiDeposit(defi)
            } else {
                TransactionPayload::DefiWithdraw(defi)
            }
        }
        TransactionType::DefiClaim => {
            let Some(reward) = primary_transfer(&tx.transfers, TransferDirection::In) else {
                return Ok(());
            };
            TransactionPayload::DefiClaim(DefiClaimPayload {
                wallet_id: wallet.id,
                chain_id: tx.chain_id,
                protocol: tx.protocol.clone().unwrap_or_else(|| "unknown".to_string()),
                reward: leg_amount(reward, tx.chain_id),
                gas,
            })
        }
        // The classifier never emits these for a provider-decoded transaction.
        TransactionType::InternalTransfer | TransactionType::AssetAdjustment | TransactionType::Genesis => {
            return Ok(());
        }
    };

    let external_id = format!("{SOURCE}_{}", tx.provider_id);
    let ctx = RequestContext { user_id: wallet.user_id };
    ledger.record(SOURCE, Some(&external_id), tx.mined_at, payload, ctx, cancel)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::OperationType;

    fn transfer(direction: TransferDirection, sender: &str, recipient: &str) -> Transfer {
        Transfer {
            asset_symbol: "ETH".to_string(),
            contract_address: None,
            decimals: 18,
            amount: Money::from_decimal_str("1000000000000000000").unwrap(),
            direction,
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            usd_price: Some(Money::scaled_usd_from_f64(2000.0).unwrap()),
        }
    }

    #[test]
    fn primary_transfer_picks_first_matching_direction() {
        let transfers = vec![
            transfer(TransferDirection::Out, "0xa", "0xb"),
            transfer(TransferDirection::In, "0xc", "0xd"),
        ];
        let found = primary_transfer(&transfers, TransferDirection::In).unwrap();
        assert_eq!(found.sender, "0xc");
    }

    #[test]
    fn pending_status_short_circuits_unconfirmed_classification() {
        let tx = DecodedTransaction {
            provider_id: "1".to_string(),
            tx_hash: "0xhash".to_string(),
            chain_id: 1,
            operation_type: OperationType::Receive,
            protocol: None,
            mined_at: chrono::Utc::now(),
            status: TransactionStatus::Pending,
            transfers: vec![transfer(TransferDirection::In, "0xa", "0xb")],
            fee: None,
        };
        assert_eq!(tx.status, TransactionStatus::Pending);
    }
}
