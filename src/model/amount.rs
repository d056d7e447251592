//! Amount type for money in the bank files.
//!
//! Bank records carry amounts as zero filled digit strings with implied decimals. This module
//! provides the `Amount` type which wraps `Decimal` and converts between those columns, whole
//! öre, and the human forms `1234.50` and `1234,50`.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::error::Error;
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

/// Represents an amount in kronor.
///
/// # Examples
///
/// Parsing with a decimal comma:
/// ```
/// # use giro_sie::model::Amount;
/// # use std::str::FromStr;
/// let amount = Amount::from_str("980,00").unwrap();
/// assert_eq!(amount.to_string(), "980.00");
/// ```
///
/// Reading a fixed column with two implied decimals:
/// ```
/// # use giro_sie::model::Amount;
/// let amount = Amount::from_implied("000000098000", 2).unwrap();
/// assert_eq!(amount.to_ore(), Some(98000));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount {
    value: Decimal,
}

impl Amount {
    pub const ZERO: Amount = Amount::new(Decimal::ZERO);

    /// Creates a new Amount from a Decimal value.
    pub const fn new(value: Decimal) -> Self {
        Self { value }
    }

    /// Reads a digit column with `scale` implied decimals, e.g. `"000000098000"` with scale 2.
    pub fn from_implied(digits: &str, scale: u32) -> Result<Self, AmountError> {
        let digits = digits.trim();
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AmountError::NotDigits(digits.to_string()));
        }
        let mantissa = i64::from_str(digits).map_err(|_| AmountError::NotDigits(digits.to_string()))?;
        Ok(Self::new(Decimal::new(mantissa, scale)))
    }

    /// Creates an amount from whole öre.
    pub fn from_ore(ore: i64) -> Self {
        Self::new(Decimal::new(ore, 2))
    }

    /// The amount in öre, fractions of an öre truncated towards zero.
    pub fn to_ore(&self) -> Option<i64> {
        (self.value * Decimal::ONE_HUNDRED).trunc().to_i64()
    }

    /// Returns the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.value
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.value.is_sign_negative()
    }

    pub fn abs(&self) -> Self {
        Self::new(self.value.abs())
    }
}

impl std::ops::Neg for Amount {
    type Output = Amount;

    fn neg(self) -> Self::Output {
        Amount::new(-self.value)
    }
}

impl std::ops::Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Self) -> Self::Output {
        Amount::new(self.value + rhs.value)
    }
}

impl std::iter::Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, |a, b| a + b)
    }
}

/// An error that can occur when parsing strings into `Amount` values.
pub enum AmountError {
    Decimal(rust_decimal::Error),
    NotDigits(String),
}

impl Debug for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            AmountError::Decimal(e) => Debug::fmt(e, f),
            AmountError::NotDigits(s) => write!(f, "NotDigits({s:?})"),
        }
    }
}

impl Display for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            AmountError::Decimal(e) => Display::fmt(e, f),
            AmountError::NotDigits(s) => write!(f, "'{s}' is not an amount column"),
        }
    }
}

impl std::error::Error for AmountError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AmountError::Decimal(e) => Some(e),
            AmountError::NotDigits(_) => None,
        }
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(Amount::default());
        }

        // Swedish notation uses a decimal comma and spaces between thousands
        let normalized: String = trimmed
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| if c == ',' { '.' } else { c })
            .collect();
        let value = Decimal::from_str(&normalized).map_err(AmountError::Decimal)?;
        Ok(Amount::new(value))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut value = self.value;
        if value.scale() < 2 {
            value.rescale(2);
        }
        write!(f, "{value}")
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Amount::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Amount::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.value()
    }
}
