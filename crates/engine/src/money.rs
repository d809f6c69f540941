use std::{
    fmt,
    iter::Sum,
    ops::{Add, Neg, Sub},
};

use serde::{Deserialize, Serialize};

/// Signed money amount represented as **integer cents**.
///
/// Use this type for **all** monetary values in the engine (expense totals,
/// shares, balances) to avoid floating-point drift.
///
/// The value is signed when used as a balance:
/// - positive = the counterparty owes the account
/// - negative = the account owes the counterparty
///
/// ```rust
/// use engine::MoneyCents;
///
/// let dinner = MoneyCents::new(100_00);
/// assert_eq!(dinner.divide_evenly(3), Some(MoneyCents::new(33_33)));
/// assert_eq!(MoneyCents::new(-12_05).to_string(), "-12.05");
/// ```
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
#[repr(transparent)]
pub struct MoneyCents(i64);

impl MoneyCents {
    pub const ZERO: MoneyCents = MoneyCents(0);

    /// Creates a new amount from integer cents.
    #[must_use]
    pub const fn new(cents: i64) -> Self {
        Self(cents)
    }

    /// Returns the raw value in cents.
    #[must_use]
    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Returns `true` if the amount is 0.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if the amount is positive.
    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Returns `true` if the amount is negative.
    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// `max(self, 0)`.
    #[must_use]
    pub const fn positive_part(self) -> Self {
        if self.0 > 0 { self } else { Self::ZERO }
    }

    /// Checked addition (returns `None` on overflow).
    #[must_use]
    pub fn checked_add(self, rhs: MoneyCents) -> Option<MoneyCents> {
        self.0.checked_add(rhs.0).map(MoneyCents)
    }

    /// Checked subtraction (returns `None` on overflow).
    #[must_use]
    pub fn checked_sub(self, rhs: MoneyCents) -> Option<MoneyCents> {
        self.0.checked_sub(rhs.0).map(MoneyCents)
    }

    /// Checked negation (returns `None` for the minimum value).
    #[must_use]
    pub fn checked_neg(self) -> Option<MoneyCents> {
        self.0.checked_neg().map(MoneyCents)
    }

    /// Divides into `parts` identical amounts, rounding half away from zero
    /// to the cent.
    ///
    /// The remainder is **not** redistributed: `parts * result` may differ
    /// from `self` by at most `parts / 2` cents.
    ///
    /// Returns `None` when `parts` is 0.
    #[must_use]
    pub fn divide_evenly(self, parts: usize) -> Option<MoneyCents> {
        let parts = i64::try_from(parts).ok().filter(|p| *p > 0)?;
        let quotient = self.0 / parts;
        let remainder = self.0 % parts;
        let rounded = if 2 * remainder.abs() >= parts {
            quotient + self.0.signum()
        } else {
            quotient
        };
        Some(MoneyCents(rounded))
    }
}

impl fmt::Display for MoneyCents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let units = abs / 100;
        let cents = abs % 100;
        write!(f, "{sign}{units}.{cents:02}")
    }
}

impl Add for MoneyCents {
    type Output = MoneyCents;

    fn add(self, rhs: MoneyCents) -> Self::Output {
        MoneyCents(self.0 + rhs.0)
    }
}

impl Sub for MoneyCents {
    type Output = MoneyCents;

    fn sub(self, rhs: MoneyCents) -> Self::Output {
        MoneyCents(self.0 - rhs.0)
    }
}

impl Neg for MoneyCents {
    type Output = MoneyCents;

    fn neg(self) -> Self::Output {
        MoneyCents(-self.0)
    }
}

impl Sum for MoneyCents {
    fn sum<I: Iterator<Item = MoneyCents>>(iter: I) -> Self {
        iter.fold(MoneyCents::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a MoneyCents> for MoneyCents {
    fn sum<I: Iterator<Item = &'a MoneyCents>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats_two_decimals() {
        assert_eq!(MoneyCents::new(0).to_string(), "0.00");
        assert_eq!(MoneyCents::new(1).to_string(), "0.01");
        assert_eq!(MoneyCents::new(10).to_string(), "0.10");
        assert_eq!(MoneyCents::new(1050).to_string(), "10.50");
        assert_eq!(MoneyCents::new(-1050).to_string(), "-10.50");
    }

    #[test]
    fn divide_evenly_rounds_half_away_from_zero() {
        assert_eq!(MoneyCents::new(1000).divide_evenly(3), Some(MoneyCents::new(333)));
        assert_eq!(MoneyCents::new(200).divide_evenly(3), Some(MoneyCents::new(67)));
        assert_eq!(MoneyCents::new(5).divide_evenly(2), Some(MoneyCents::new(3)));
        assert_eq!(MoneyCents::new(-5).divide_evenly(2), Some(MoneyCents::new(-3)));
        assert_eq!(MoneyCents::new(900).divide_evenly(3), Some(MoneyCents::new(300)));
        assert_eq!(MoneyCents::new(900).divide_evenly(0), None);
    }

    #[test]
    fn sum_and_positive_part() {
        let total: MoneyCents = [MoneyCents::new(150), MoneyCents::new(-50)].iter().sum();
        assert_eq!(total, MoneyCents::new(100));
        assert_eq!(MoneyCents::new(-10).positive_part(), MoneyCents::ZERO);
        assert_eq!(MoneyCents::new(10).positive_part(), MoneyCents::new(10));
    }
}
