//! Fixed-precision rounding for money and quantities.
//!
//! Every monetary or quantity value in the system passes through
//! [`round_amount`] before it is stored or compared, so binary floating-point
//! drift from the driver layer can never leak into totals or balances.

use rust_decimal::{Decimal, RoundingStrategy};

/// Decimal places used for monetary amounts.
pub const MONEY_PLACES: u32 = 2;

/// Decimal places used for stock quantities.
pub const QUANTITY_PLACES: u32 = 3;

/// Rounds `value` half-up to `places` decimal digits.
pub fn round_amount(value: Decimal, places: u32) -> Decimal {
    value.round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero)
}

/// Rounds to 2 decimal places (monetary amounts).
pub fn round_money(value: Decimal) -> Decimal {
    round_amount(value, MONEY_PLACES)
}

/// Rounds to 3 decimal places (stock quantities).
pub fn round_quantity(value: Decimal) -> Decimal {
    round_amount(value, QUANTITY_PLACES)
}
