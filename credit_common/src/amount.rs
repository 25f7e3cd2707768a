use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sqlx::Type;
use thiserror::Error;

use crate::op;

//--------------------------------------       Amount        ---------------------------------------------------------
/// A monetary amount held as an exact number of hundredths (cents, pence, ...).
///
/// Shopify expresses money as decimal strings ("50.00"), operators tend to send JSON numbers (`40`, `12.5`), and
/// credit amounts must be rounded to 2 decimals. Storing hundredths in an `i64` makes the rounding happen once, at
/// parse time, and keeps every comparison (floor, cap, zero check) exact.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Ord, PartialOrd, Hash)]
#[sqlx(transparent)]
pub struct Amount(i64);

op!(binary Amount, Add, add);
op!(binary Amount, Sub, sub);
op!(inplace Amount, SubAssign, sub_assign);
op!(unary Amount, Neg, neg);

impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Value cannot be represented as a currency amount: {0}")]
pub struct AmountConversionError(String);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub fn from_whole_units(units: i64) -> Self {
        Self(units * 100)
    }

    pub fn cents(&self) -> i64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Converts a floating point value, rounding half away from zero to the nearest hundredth.
    pub fn try_from_f64(value: f64) -> Result<Self, AmountConversionError> {
        if !value.is_finite() {
            return Err(AmountConversionError(value.to_string()));
        }
        let cents = (value * 100.0).round();
        if cents.abs() >= i64::MAX as f64 {
            return Err(AmountConversionError(value.to_string()));
        }
        #[allow(clippy::cast_possible_truncation)]
        Ok(Self(cents as i64))
    }
}

impl FromStr for Amount {
    type Err = AmountConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || AmountConversionError(s.to_string());
        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };
        let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
        if whole.is_empty() && fraction.is_empty() {
            return Err(err());
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit()) {
            return Err(err());
        }
        let whole = if whole.is_empty() { 0 } else { whole.parse::<i64>().map_err(|_| err())? };
        let mut frac_digits = fraction.bytes().map(|b| i64::from(b - b'0'));
        let tenths = frac_digits.next().unwrap_or(0);
        let hundredths = frac_digits.next().unwrap_or(0);
        let round_up = frac_digits.next().map(|d| d >= 5).unwrap_or(false);
        let cents = whole
            .checked_mul(100)
            .and_then(|c| c.checked_add(tenths * 10 + hundredths + i64::from(round_up)))
            .ok_or_else(err)?;
        Ok(Self(if negative { -cents } else { cents }))
    }
}

impl From<i64> for Amount {
    fn from(cents: i64) -> Self {
        Self(cents)
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawAmount {
            Integer(i64),
            Float(f64),
            Text(String),
        }
        match RawAmount::deserialize(deserializer)? {
            RawAmount::Integer(v) => v.checked_mul(100).map(Amount).ok_or_else(|| {
                serde::de::Error::custom(AmountConversionError(v.to_string()))
            }),
            RawAmount::Float(v) => Amount::try_from_f64(v).map_err(serde::de::Error::custom),
            RawAmount::Text(s) => Amount::from_str(&s).map_err(serde::de::Error::custom),
        }
    }
}
