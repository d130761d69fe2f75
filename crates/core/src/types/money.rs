//! Decimal presentation rules for money and volume.
//!
//! All arithmetic in the ledger is done on unrounded [`Decimal`] values.
//! Rounding happens exactly once, when a figure leaves the system for
//! display or export.

use rust_decimal::{Decimal, RoundingStrategy};

/// Decimal places used when presenting money amounts.
pub const MONEY_SCALE: u32 = 2;

/// Decimal places used when presenting volumes (litres).
pub const VOLUME_SCALE: u32 = 3;

/// Largest volume, in litres, a purchase or sale may carry (10^12).
pub const MAX_VOLUME: Decimal = Decimal::from_parts(3_567_587_328, 232, 0, false, 0);

/// Largest unit cost a purchase may carry (10^6).
pub const MAX_UNIT_COST: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

/// Largest money amount on one sale or adjustment (10^18). Equal to
/// `MAX_VOLUME * MAX_UNIT_COST`, so a bounded take can always be priced and
/// totals over billions of lines stay well inside [`Decimal::MAX`].
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(2_808_348_672, 232_830_643, 0, false, 0);

/// Round a money amount for presentation (half away from zero).
#[must_use]
pub fn present_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Round a volume for presentation (half away from zero).
#[must_use]
pub fn present_volume(volume: Decimal) -> Decimal {
    volume.round_dp_with_strategy(VOLUME_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Margin as a percentage of revenue.
///
/// Zero when there is no revenue, or when revenue is so small next to
/// profit that the ratio does not fit in a [`Decimal`].
#[must_use]
pub fn margin_pct(profit: Decimal, revenue: Decimal) -> Decimal {
    if revenue <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    profit
        .checked_div(revenue)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .unwrap_or(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_present_money_rounds_half_away_from_zero() {
        assert_eq!(present_money(dec!(2.005)), dec!(2.01));
        assert_eq!(present_money(dec!(-2.005)), dec!(-2.01));
        assert_eq!(present_money(dec!(2.004999)), dec!(2.00));
    }

    #[test]
    fn test_present_volume() {
        assert_eq!(present_volume(dec!(10.0005)), dec!(10.001));
        assert_eq!(present_volume(dec!(10)), dec!(10));
    }

    #[test]
    fn test_margin_pct() {
        assert_eq!(margin_pct(dec!(25), dec!(100)), dec!(25));
        assert_eq!(margin_pct(dec!(5), Decimal::ZERO), Decimal::ZERO);
        assert_eq!(margin_pct(dec!(-10), dec!(50)), dec!(-20));
    }

    #[test]
    fn test_margin_pct_out_of_range_is_zero() {
        assert_eq!(margin_pct(Decimal::MAX, dec!(0.0000001)), Decimal::ZERO);
    }

    #[test]
    fn test_bounds() {
        assert_eq!(MAX_VOLUME, dec!(1000000000000));
        assert_eq!(MAX_UNIT_COST, dec!(1000000));
        assert_eq!(MAX_AMOUNT, MAX_VOLUME * MAX_UNIT_COST);
    }
}
