// Copyright (c) 2024 MoonTrack

//! Pure operation-type classifier (§4.9): maps a provider's decoded
//! operation type, plus the directions of its transfers, to a ledger
//! transaction type. Never touches the database or the network.

use crate::{db::models::TransactionType, provider::{OperationType, TransferDirection}};

/// `None` means skip the transaction without error.
pub fn classify(operation_type: OperationType, transfer_directions: &[TransferDirection]) -> Option<TransactionType> {
    match operation_type {
        OperationType::Receive => Some(TransactionType::TransferIn),
        OperationType::Send => Some(TransactionType::TransferOut),
        OperationType::Trade => Some(TransactionType::Swap),
        OperationType::Deposit | OperationType::Mint => Some(TransactionType::DefiDeposit),
        OperationType::Withdraw | OperationType::Burn => Some(TransactionType::DefiWithdraw),
        OperationType::Claim => Some(TransactionType::DefiClaim),
        OperationType::Approve | OperationType::Unknown => None,
        OperationType::Execute => {
            let has_in = transfer_directions.iter().any(|d| *d == TransferDirection::In);
            let has_out = transfer_directions.iter().any(|d| *d == TransferDirection::Out);
            match (has_in, has_out) {
                (true, true) => Some(TransactionType::Swap),
                (true, false) => Some(TransactionType::TransferIn),
                (false, true) => Some(TransactionType::TransferOut),
                (false, false) => None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use yare::parameterized;

    use super::*;

    #[parameterized(
        receive_is_transfer_in = { OperationType::Receive, TransactionType::TransferIn },
        send_is_transfer_out = { OperationType::Send, TransactionType::TransferOut },
        trade_is_swap = { OperationType::Trade, TransactionType::Swap },
        deposit_is_defi_deposit = { OperationType::Deposit, TransactionType::DefiDeposit },
        mint_is_defi_deposit = { OperationType::Mint, TransactionType::DefiDeposit },
        withdraw_is_defi_withdraw = { OperationType::Withdraw, TransactionType::DefiWithdraw },
        burn_is_defi_withdraw = { OperationType::Burn, TransactionType::DefiWithdraw },
        claim_is_defi_claim = { OperationType::Claim, TransactionType::DefiClaim },
    )]
    fn direction_independent_operation_types_map_directly(op: OperationType, expected: TransactionType) {
        assert_eq!(classify(op, &[]), Some(expected));
    }

    #[test]
    fn approve_and_unknown_are_skipped() {
        assert_eq!(classify(OperationType::Approve, &[]), None);
        assert_eq!(classify(OperationType::Unknown, &[]), None);
    }

    #[parameterized(
        both_directions_is_swap = { &[TransferDirection::In, TransferDirection::Out], Some(TransactionType::Swap) },
        only_in_is_transfer_in = { &[TransferDirection::In], Some(TransactionType::TransferIn) },
        only_out_is_transfer_out = { &[TransferDirection::Out], Some(TransactionType::TransferOut) },
        no_transfers_is_skipped = { &[], None },
    )]
    fn execute_classification_depends_on_transfer_directions(
        dirs: &[TransferDirection],
        expected: Option<TransactionType>,
    ) {
        assert_eq!(classify(OperationType::Execute, dirs), expected);
    }
}
