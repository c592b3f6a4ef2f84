use crate::error::{EngineError, Result};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub};

/// A monetary value in minor currency units (centavos).
///
/// Amounts are unsigned, so a negative donation cannot be represented. The
/// gateway wire format uses decimal reais, see [`Amount::to_reais`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Self = Self(0);

    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Parses a decimal reais value such as `25.50`.
    ///
    /// Negative values and fractions of a cent are rejected.
    pub fn from_reais(value: Decimal) -> Result<Self> {
        if value.is_sign_negative() {
            return Err(EngineError::ValidationError(format!(
                "Amount must not be negative: {value}"
            )));
        }
        let out_of_range = || EngineError::ValidationError(format!("Amount out of range: {value}"));
        let cents = value
            .checked_mul(Decimal::ONE_HUNDRED)
            .ok_or_else(out_of_range)?;
        if cents.fract() != Decimal::ZERO {
            return Err(EngineError::ValidationError(format!(
                "Amount has more than two decimal places: {value}"
            )));
        }
        cents.to_u64().map(Self).ok_or_else(out_of_range)
    }

    /// Converts to the decimal currency value expected by the payment gateway.
    pub fn to_reais(&self) -> Decimal {
        Decimal::from(self.0) / Decimal::ONE_HUNDRED
    }

    /// Multiplies by `ratio` and truncates to whole cents.
    ///
    /// Returns `None` if the ratio is negative or the product overflows.
    pub fn scale_truncated(&self, ratio: Decimal) -> Option<Self> {
        if ratio.is_sign_negative() {
            return None;
        }
        let scaled = Decimal::from(self.0).checked_mul(ratio)?.trunc();
        scaled.to_u64().map(Self)
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Self)
    }
}

impl From<u64> for Amount {
    fn from(cents: u64) -> Self {
        Self(cents)
    }
}

impl From<Amount> for u64 {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add for Amount {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Amount {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}
