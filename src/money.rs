// Copyright (c) 2024 MoonTrack

//! Arbitrary-precision money amounts.
//!
//! [`Money`] wraps a signed, unbounded [`BigInt`]. Asset amounts are always
//! expressed in the asset's smallest unit (wei, satoshi, ...); USD values are
//! expressed as an integer scaled by [`USD_SCALE_FACTOR`] so that sub-cent
//! precision never requires binary floating point. Storage at rest is
//! `NUMERIC(78,0)`; on the wire it is a decimal string.

use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;

use bigdecimal::{BigDecimal, RoundingMode, ToPrimitive};
use diesel::deserialize::{self, FromSql};
use diesel::pg::{Pg, PgValue};
use diesel::serialize::{self, Output, ToSql};
use diesel::sql_types::Numeric;
use displaydoc::Display;
use num_bigint::BigInt;
use num_traits::Zero;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// USD amounts are stored as an integer equal to `USD * 10^8`.
pub const USD_SCALE: u32 = 8;

#[derive(Display, Debug)]
pub enum MoneyError {
    /// amount `{0}` is not a valid decimal integer
    InvalidDecimal(String),
    /// amount must be non-negative, got `{0}`
    Negative(Money),
}

/// An arbitrary-precision, non-negative-by-convention integer amount.
///
/// Negative `Money` values are only ever produced internally as *deltas*
/// (e.g. a balance-update step); every amount that crosses a handler or
/// storage boundary is validated non-negative by its caller (invariant I1
/// of the ledger data model).
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(BigInt);

impl Money {
    pub fn zero() -> Self {
        Self(BigInt::zero())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0.sign() == num_bigint::Sign::Minus
    }

    pub fn from_bigint(v: BigInt) -> Self {
        Self(v)
    }

    pub fn as_bigint(&self) -> &BigInt {
        &self.0
    }

    pub fn from_decimal_str(s: &str) -> Result<Self, MoneyError> {
        BigInt::from_str(s)
            .map(Self)
            .map_err(|_| MoneyError::InvalidDecimal(s.to_string()))
    }

    /// Ensures the amount satisfies invariant I1 (`amount >= 0`).
    pub fn require_non_negative(self) -> Result<Self, MoneyError> {
        if self.is_negative() {
            Err(MoneyError::Negative(self))
        } else {
            Ok(self)
        }
    }

    /// Converts a provider-supplied floating point USD price into a
    /// scaled-USD integer using round-half-to-even on `price * 10^USD_SCALE`.
    ///
    /// The float is first rendered through Rust's own shortest round-trip
    /// `Display` impl and parsed back as an exact decimal, so the only
    /// imprecision that can enter is whatever the provider's float already
    /// carried.
    pub fn scaled_usd_from_f64(price: f64) -> Result<Self, MoneyError> {
        let decimal = BigDecimal::from_str(&format!("{price}"))
            .map_err(|_| MoneyError::InvalidDecimal(price.to_string()))?;
        let scale_factor = BigDecimal::from(10i64.pow(USD_SCALE));
        let scaled = (decimal * scale_factor).with_scale_round(0, RoundingMode::HalfEven);
        let int_part = scaled
            .to_bigint()
            .ok_or_else(|| MoneyError::InvalidDecimal(price.to_string()))?;
        Ok(Self(int_part))
    }

    /// `amount * usd_rate / 10^(asset_decimals + USD_SCALE)`, the plain USD
    /// value of an entry carrying `amount` base units of an asset with
    /// `asset_decimals` decimals at `usd_rate` (scaled USD per whole unit).
    /// Note this result is *not* itself scaled-USD: dividing by the extra
    /// `10^USD_SCALE` factor cancels `usd_rate`'s own scale, matching the
    /// worked examples in the ledger spec.
    pub fn usd_value(&self, usd_rate: &Money, asset_decimals: u32) -> Money {
        let numerator = &self.0 * &usd_rate.0;
        let denominator = BigInt::from(10u64).pow(asset_decimals + USD_SCALE);
        Money(numerator / denominator)
    }

    /// Checked conversion to `i64`, used only at wire boundaries that still
    /// need a fixed-width integer (e.g. a legacy API response field).
    /// Internal values are never bounded this way.
    pub fn to_i64_checked(&self) -> Option<i64> {
        self.0.to_i64()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_decimal_str(s)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Add for &Money {
    type Output = Money;

    fn add(self, rhs: &Money) -> Money {
        Money(&self.0 + &rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl Sub for &Money {
    type Output = Money;

    fn sub(self, rhs: &Money) -> Money {
        Money(&self.0 - &rhs.0)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Money::from_decimal_str(&s).map_err(de::Error::custom)
    }
}

impl ToSql<Numeric, Pg> for Money {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        let decimal = BigDecimal::from_str(&self.0.to_string())
            .expect("BigInt decimal string is always valid BigDecimal input");
        ToSql::<Numeric, Pg>::to_sql(&decimal, out)
    }
}

impl FromSql<Numeric, Pg> for Money {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        let decimal = <BigDecimal as FromSql<Numeric, Pg>>::from_sql(bytes)?;
        let (int_part, exponent) = decimal.with_scale(0).into_bigint_and_exponent();
        debug_assert_eq!(exponent, 0, "money columns are always NUMERIC(78,0)");
        Ok(Money(int_part))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_half_to_even_down() {
        // 2000.000000005 * 1e8 = 200000000000.5 -> rounds to even (...0)
        let m = Money::scaled_usd_from_f64(2000.000000005).unwrap();
        assert_eq!(m.to_string(), "200000000000");
    }

    #[test]
    fn usd_value_matches_scenario_1() {
        // 1e18 wei ETH at rate 2e11 (=$2000/ETH) -> usd_value = $2000
        let amount = Money::from_decimal_str("1000000000000000000").unwrap();
        let rate = Money::from_decimal_str("200000000000").unwrap();
        let usd = amount.usd_value(&rate, 18);
        assert_eq!(usd.to_string(), "2000");
    }

    #[test]
    fn negative_amount_rejected() {
        let m = Money::from_decimal_str("-1").unwrap();
        assert!(m.require_non_negative().is_err());
    }

    #[test]
    fn decimal_round_trip() {
        let m = Money::from_decimal_str("123456789012345678901234567890").unwrap();
        assert_eq!(m.to_string(), "123456789012345678901234567890");
    }
}
