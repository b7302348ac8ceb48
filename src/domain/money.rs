use crate::error::FeeError;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};
use std::ops::Sub;

/// A non-negative monetary value.
///
/// Wraps `rust_decimal::Decimal` so fee arithmetic never goes through floats.
/// Subtraction that could cross zero goes through [`Money::saturating_sub`];
/// addition is checked, since catalog and ledger amounts are external data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

/// A strictly positive monetary amount for payments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Money {
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Builds a value, rejecting negatives.
    pub fn new(value: Decimal) -> Result<Self, FeeError> {
        if value.is_sign_negative() && !value.is_zero() {
            Err(FeeError::Validation(format!(
                "Monetary value must not be negative, got {value}"
            )))
        } else {
            Ok(Self(value))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn checked_add(self, rhs: Self) -> Result<Self, FeeError> {
        self.0.checked_add(rhs.0).map(Self).ok_or_else(|| {
            FeeError::Validation(format!("Monetary total overflows adding {rhs} to {self}"))
        })
    }

    /// Sums `values`, failing instead of overflowing.
    pub fn try_sum<I: IntoIterator<Item = Money>>(values: I) -> Result<Self, FeeError> {
        values.into_iter().try_fold(Self::ZERO, Self::checked_add)
    }

    /// `max(0, self - rhs)`
    pub fn saturating_sub(self, rhs: Self) -> Self {
        if self.0 > rhs.0 {
            Self(self.0 - rhs.0)
        } else {
            Self::ZERO
        }
    }
}

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, FeeError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(FeeError::Validation(format!(
                "Amount must be positive, got {value}"
            )))
        }
    }

    /// Converts a float coming from a form field.
    pub fn from_f64(value: f64) -> Result<Self, FeeError> {
        if !value.is_finite() {
            return Err(FeeError::Validation(format!(
                "Amount must be a finite number, got {value}"
            )));
        }
        let decimal = Decimal::from_f64(value).ok_or_else(|| {
            FeeError::Validation(format!("Amount {value} is out of range"))
        })?;
        Self::new(decimal)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Money {
    type Error = FeeError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = FeeError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl From<Amount> for Money {
    fn from(amount: Amount) -> Self {
        Self(amount.0)
    }
}

impl Sub for Money {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        self.saturating_sub(rhs)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}
