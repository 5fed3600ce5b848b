//! Funding ledger
//!
//! Pure arithmetic over a loan's investment list. Amounts are exact decimals,
//! so the funding threshold is an equality test rather than a tolerance.

use rust_decimal::Decimal;

use super::model::Investment;

/// Precision and magnitude a stored numeric column can hold without rounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumericBounds {
    pub scale: u32,
    pub integer_digits: u32,
}

/// Principal and investment amounts, `NUMERIC(20, 8)`
pub const MONEY: NumericBounds = NumericBounds {
    scale: 8,
    integer_digits: 12,
};

/// Interest rate and ROI, `NUMERIC(10, 4)`
pub const RATE: NumericBounds = NumericBounds {
    scale: 4,
    integer_digits: 6,
};

impl NumericBounds {
    /// True when `value` is stored exactly. Trailing zeros do not count
    /// against the scale.
    pub fn admits(&self, value: Decimal) -> bool {
        let limit = Decimal::from(10_i64.pow(self.integer_digits));
        value.normalize().scale() <= self.scale && value.trunc().abs() < limit
    }
}

/// Sum of all investment amounts; zero when there are none. Saturates
/// instead of overflowing.
pub fn total_invested(investments: &[Investment]) -> Decimal {
    investments
        .iter()
        .fold(Decimal::ZERO, |total, inv| total.saturating_add(inv.amount))
}

/// Unfunded balance, never negative.
pub fn remaining(principal: Decimal, investments: &[Investment]) -> Decimal {
    (principal - total_invested(investments)).max(Decimal::ZERO)
}

pub fn is_fully_funded(principal: Decimal, investments: &[Investment]) -> bool {
    total_invested(investments) >= principal
}

/// Returns the remaining balance when `amount` would push the total past
/// `principal`. Overfunding is rejected, never clamped.
pub fn check_investment(
    principal: Decimal,
    investments: &[Investment],
    amount: Decimal,
) -> Result<(), Decimal> {
    match total_invested(investments).checked_add(amount) {
        Some(total) if total <= principal => Ok(()),
        _ => Err(remaining(principal, investments)),
    }
}
