//! Currency utility functions for handling Naira conversions.
//!
//! All monetary values in the ledger are stored in kobo (1 Naira = 100 kobo)
//! to avoid floating-point precision issues. Booking pricing columns are
//! NUMERIC and only cross into kobo at the settlement boundary.

use bigdecimal::BigDecimal;
use num_traits::ToPrimitive;

/// Convert kobo to Naira (divide by 100)
pub fn kobo_to_naira(kobo: i64) -> f64 {
    kobo as f64 / 100.0
}

/// Format kobo as Naira string with 2 decimal places
pub fn format_kobo_as_naira(kobo: i64) -> String {
    format!("₦{:.2}", kobo_to_naira(kobo))
}

/// Convert a NUMERIC price column to kobo
pub fn decimal_to_kobo(amount: &BigDecimal) -> i64 {
    (amount * BigDecimal::from(100))
        .round(0)
        .to_i64()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_kobo_to_naira() {
        assert_eq!(kobo_to_naira(10000), 100.0);
        assert_eq!(kobo_to_naira(50), 0.50);
        assert_eq!(kobo_to_naira(12345), 123.45);
    }

    #[test]
    fn test_format_kobo_as_naira() {
        assert_eq!(format_kobo_as_naira(10000), "₦100.00");
        assert_eq!(format_kobo_as_naira(50), "₦0.50");
    }

    #[test]
    fn test_decimal_to_kobo() {
        assert_eq!(decimal_to_kobo(&BigDecimal::from_str("100.00").unwrap()), 10000);
        assert_eq!(decimal_to_kobo(&BigDecimal::from_str("0.5").unwrap()), 50);
        assert_eq!(decimal_to_kobo(&BigDecimal::from_str("123.45").unwrap()), 12345);
        assert_eq!(decimal_to_kobo(&BigDecimal::from(0)), 0);
    }
}
