//! Tolerant conversion of price cells into numbers.

use ifp_core::FuelPriceEntry;

/// Today's price and its change since yesterday.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedPrice {
    pub today: f64,
    pub change: Option<f64>,
}

impl NormalizedPrice {
    pub fn into_entry(self) -> FuelPriceEntry {
        FuelPriceEntry::new(self.today, self.change)
    }
}

fn clean_price_text(raw: &str) -> String {
    raw.replace('₹', "").replace(',', "").trim().to_string()
}

/// Parses a price cell such as `"₹ 1,095.41"`. Blank, non-numeric and non-finite text is `None`.
pub fn parse_price(raw: &str) -> Option<f64> {
    clean_price_text(raw)
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

/// A missing today price becomes `0.0`; a missing yesterday price falls back to today's,
/// so the change is always resolved.
pub fn normalize(today_text: &str, yesterday_text: &str) -> NormalizedPrice {
    let today = parse_price(today_text).unwrap_or(0.0);
    let yesterday = parse_price(yesterday_text).unwrap_or(today);
    NormalizedPrice {
        today,
        change: Some(today - yesterday),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn rupee_prices_yield_day_over_day_change() {
        let price = normalize("₹95.41", "₹95.21");
        assert_close(price.today, 95.41);
        assert_close(price.change.unwrap(), 0.20);
    }

    #[test]
    fn thousands_separators_and_whitespace_are_stripped() {
        assert_eq!(parse_price(" ₹ 1,095.50 "), Some(1095.5));
        assert_eq!(parse_price("\u{a0}87.62\n"), Some(87.62));
    }

    #[test]
    fn unreadable_cells_are_unavailable() {
        assert_eq!(parse_price(""), None);
        assert_eq!(parse_price("₹"), None);
        assert_eq!(parse_price("N/A"), None);
        assert_eq!(parse_price("--"), None);
        assert_eq!(parse_price("NaN"), None);
        assert_eq!(parse_price("inf"), None);
    }

    #[test]
    fn missing_today_price_becomes_zero_sentinel() {
        let price = normalize("", "₹95.10");
        assert_eq!(price.today, 0.0);
        assert_close(price.change.unwrap(), -95.10);

        let price = normalize("not listed", "also missing");
        assert_eq!(price.today, 0.0);
        assert_eq!(price.change, Some(0.0));
    }

    #[test]
    fn missing_yesterday_price_means_no_change() {
        let price = normalize("₹95.05", "N/A");
        assert_close(price.today, 95.05);
        assert_eq!(price.change, Some(0.0));
    }

    #[test]
    fn entry_carries_fixed_units() {
        let entry = normalize("₹100", "₹99.5").into_entry();
        assert_eq!(entry.retail_price, 100.0);
        assert_eq!(entry.retail_price_change, Some(0.5));
        assert_eq!(entry.retail_unit, "litre");
        assert_eq!(entry.currency, "INR");
        assert_eq!(entry.retail_price_change_interval, "day");
    }
}
