// Copyright (c) 2024 MoonTrack

//! Parses account-code strings into account rows, creating missing
//! accounts atomically (§4.4).
//!
//! Codes are structured `prefix.scope...` strings and carry the
//! authoritative typing information: `wallet.<wallet_uuid>.<asset_symbol>`,
//! `income.<chain_id>.<asset_symbol>`, `income.defi.<chain_id>.<protocol>`,
//! `expense.<chain_id>.<asset_symbol>`, `gas.<chain_id>.<asset_symbol>`,
//! `swap_clearing.<chain_id>`, or the fixed adjustment codes
//! `income.adjustment`/`expense.adjustment`.

use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    db::{
        account::AccountModel,
        models::{Account, AccountType, NewAccount},
        Conn,
    },
    error::{LedgerServiceError, ValidationError},
};

struct ParsedCode {
    account_type: AccountType,
    wallet_id: Option<Uuid>,
    chain_id: Option<i64>,
}

fn malformed(code: &str) -> ValidationError {
    ValidationError::MalformedPayload(format!("unparseable account code `{code}`"))
}

fn parse(code: &str) -> Result<ParsedCode, ValidationError> {
    let parts: Vec<&str> = code.split('.').collect();
    match parts.as_slice() {
        ["wallet", wallet_id, _asset_symbol] => Ok(ParsedCode {
            account_type: AccountType::CryptoWallet,
            wallet_id: Some(wallet_id.parse().map_err(|_| malformed(code))?),
            chain_id: None,
        }),
        ["income", "defi", chain_id, _protocol] => Ok(ParsedCode {
            account_type: AccountType::Income,
            wallet_id: None,
            chain_id: Some(chain_id.parse().map_err(|_| malformed(code))?),
        }),
        ["income", "adjustment"] => Ok(ParsedCode {
            account_type: AccountType::Income,
            wallet_id: None,
            chain_id: None,
        }),
        ["expense", "adjustment"] => Ok(ParsedCode {
            account_type: AccountType::Expense,
            wallet_id: None,
            chain_id: None,
        }),
        ["income", chain_id, _asset_symbol] => Ok(ParsedCode {
            account_type: AccountType::Income,
            wallet_id: None,
            chain_id: Some(chain_id.parse().map_err(|_| malformed(code))?),
        }),
        ["expense", chain_id, _asset_symbol] => Ok(ParsedCode {
            account_type: AccountType::Expense,
            wallet_id: None,
            chain_id: Some(chain_id.parse().map_err(|_| malformed(code))?),
        }),
        ["gas", chain_id, _asset_symbol] => Ok(ParsedCode {
            account_type: AccountType::GasFee,
            wallet_id: None,
            chain_id: Some(chain_id.parse().map_err(|_| malformed(code))?),
        }),
        ["swap_clearing", chain_id] => Ok(ParsedCode {
            account_type: AccountType::Clearing,
            wallet_id: None,
            chain_id: Some(chain_id.parse().map_err(|_| malformed(code))?),
        }),
        _ => Err(malformed(code)),
    }
}

/// Resolves `code` to an account row, creating it if this is the first time
/// it is referenced. `asset_id` is attached to the new row when the account
/// type is asset-specific (every type except `CLEARING`, whose code carries
/// no asset scope and is shared across the assets passing through it in one
/// swap).
pub fn resolve(code: &str, asset_id: Uuid, conn: &mut Conn) -> Result<Account, LedgerServiceError> {
    let parsed = parse(code)?;

    let account_asset_id = match parsed.account_type {
        AccountType::Clearing => None,
        _ => Some(asset_id),
    };

    let new_account = NewAccount {
        id: Uuid::new_v4(),
        code,
        type_: &parsed.account_type.to_string(),
        asset_id: account_asset_id,
        wallet_id: parsed.wallet_id,
        chain_id: parsed.chain_id,
    };

    Account::get_or_create(&new_account, conn).map_err(Into::into)
}

/// Deterministic asset identity from `(chain_id, symbol)`. The data model
/// has no standalone `assets` table — decoded transactions and handler
/// payloads only ever carry a symbol, decimals and a chain scope, so the
/// UUID namespace derivation is the identity, not a row lookup.
pub fn asset_id_for(chain_id: i64, symbol: &str) -> Uuid {
    Uuid::new_v5(
        &Uuid::NAMESPACE_OID,
        format!("moontrack.asset.{chain_id}.{symbol}").as_bytes(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wallet_code() {
        let wallet_id = Uuid::new_v4();
        let code = format!("wallet.{wallet_id}.ETH");
        let parsed = parse(&code).unwrap();
        assert_eq!(parsed.account_type, AccountType::CryptoWallet);
        assert_eq!(parsed.wallet_id, Some(wallet_id));
    }

    #[test]
    fn parses_income_defi_code() {
        let parsed = parse("income.defi.1.aave").unwrap();
        assert_eq!(parsed.account_type, AccountType::Income);
        assert_eq!(parsed.chain_id, Some(1));
    }

    #[test]
    fn parses_swap_clearing_code() {
        let parsed = parse("swap_clearing.137").unwrap();
        assert_eq!(parsed.account_type, AccountType::Clearing);
        assert_eq!(parsed.chain_id, Some(137));
    }

    #[test]
    fn rejects_malformed_code() {
        assert!(parse("nonsense").is_err());
    }

    #[test]
    fn asset_id_is_deterministic() {
        assert_eq!(asset_id_for(1, "ETH"), asset_id_for(1, "ETH"));
        assert_ne!(asset_id_for(1, "ETH"), asset_id_for(1, "USDC"));
    }
}
