//! # Money Module
//!
//! Provides the `Money` type for every monetary value in the register.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  Three pães de sal at R$ 0,70 in floating point:                        │
//! │    0.7 * 3 = 2.0999999999999996  ❌ WRONG!                              │
//! │                                                                         │
//! │  A shift of a few hundred sales accumulates that drift into the        │
//! │  cash balance, and the till never matches the screen.                  │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Centavos                                         │
//! │    70 centavos * 3 = 210 centavos (exact)                              │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use caixa_core::money::Money;
//!
//! let pao_de_sal = Money::from_cents(70);
//! let line = pao_de_sal.checked_multiply_quantity(3).unwrap();
//! assert_eq!(line.to_string(), "R$ 2,10");
//!
//! // Operator input is parsed, never converted from floats
//! let received: Money = "5,00".parse().unwrap();
//! assert_eq!((received - line).cents(), 290);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::MAX_AMOUNT;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in centavos (1/100 of a Brazilian real).
///
/// ## Design Decisions
/// - **i64 (signed)**: subtraction results (shortfalls, balances) can be negative
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **Serialized as plain cents**: JSON payloads and the snapshot stay exact
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from centavos.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from reais and centavos.
    ///
    /// ```rust
    /// use caixa_core::money::Money;
    ///
    /// assert_eq!(Money::from_reais(5, 50).cents(), 550);
    /// assert_eq!(Money::from_reais(-5, 50).cents(), -550);
    /// ```
    #[inline]
    pub const fn from_reais(reais: i64, centavos: i64) -> Self {
        if reais < 0 {
            Money(reais * 100 - centavos)
        } else {
            Money(reais * 100 + centavos)
        }
    }

    /// Returns the value in centavos.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the whole reais portion (truncated toward zero).
    #[inline]
    pub const fn reais(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the centavos portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Multiplies a unit price by a line quantity.
    ///
    /// ## User Workflow
    /// ```text
    /// Pão de Sal R$ 0,70, quantity 3
    ///      │
    ///      ▼
    /// checked_multiply_quantity(3) ← THIS FUNCTION
    ///      │
    ///      ▼
    /// Line total: R$ 2,10
    /// ```
    ///
    /// `None` on overflow.
    #[inline]
    pub const fn checked_multiply_quantity(&self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    #[inline]
    pub const fn saturating_add(&self, other: Money) -> Self {
        Money(self.0.saturating_add(other.0))
    }

    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Formats the value the way the register screen shows it, without the
    /// currency prefix (`2,10`).
    pub fn to_plain_string(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        format!("{}{},{:02}", sign, self.reais().abs(), self.cents_part())
    }
}

// =============================================================================
// Parsing
// =============================================================================

/// Parses operator input into Money.
///
/// Accepts the forms a cashier actually types:
/// `5`, `5,00`, `5.00`, `R$ 5,00`, `0,7`, `-2,50`.
/// At most two decimal digits are allowed; anything else is rejected
/// rather than rounded. Magnitudes above [`MAX_AMOUNT`] are out of range.
impl FromStr for Money {
    type Err = ValidationError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ValidationError::InvalidFormat {
            field: "amount".to_string(),
            reason: reason.to_string(),
        };

        let trimmed = input.trim();
        let trimmed = trimmed.strip_prefix("R$").unwrap_or(trimmed).trim();
        if trimmed.is_empty() {
            return Err(ValidationError::Required {
                field: "amount".to_string(),
            });
        }

        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest.trim()),
            None => (false, trimmed),
        };

        let (whole, fraction) = match digits.find([',', '.']) {
            Some(pos) => (&digits[..pos], &digits[pos + 1..]),
            None => (digits, ""),
        };

        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid("no digits"));
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("must be a number like 5,00"));
        }
        if fraction.len() > 2 {
            return Err(invalid("at most two decimal places"));
        }

        let reais: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid("value too large"))?
        };
        let centavos: i64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().map_err(|_| invalid("bad decimals"))? * 10,
            _ => fraction.parse().map_err(|_| invalid("bad decimals"))?,
        };

        let cents = reais
            .checked_mul(100)
            .and_then(|c| c.checked_add(centavos))
            .ok_or_else(|| invalid("value too large"))?;

        if cents > MAX_AMOUNT.0 {
            return Err(ValidationError::OutOfRange {
                field: "amount".to_string(),
                min: -MAX_AMOUNT.0,
                max: MAX_AMOUNT.0,
            });
        }

        Ok(Money(if negative { -cents } else { cents }))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Brazilian real display: `R$ 2,10`, `-R$ 5,50`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}R$ {},{:02}", sign, self.reais().abs(), self.cents_part())
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc.saturating_add(m))
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc.saturating_add(*m))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
