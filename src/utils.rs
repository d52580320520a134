// Utility functions
use chrono::{Datelike, Local, NaiveDate};

/// Parses an upstream period (`YYYY-MM-DD`, or `YYYY-MM`) and truncates it to its month.
pub fn parse_period(period: &str) -> Option<NaiveDate> {
    let period = period.trim();
    NaiveDate::parse_from_str(period, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&format!("{}-01", period), "%Y-%m-%d"))
        .ok()
        .and_then(month_start)
}

/// First day of the month containing `date`.
pub fn month_start(date: NaiveDate) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1)
}

/// Date format used in request bodies and exported tables.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// File stem for exported results, e.g. `trend_20240131`.
pub fn output_stem(date: NaiveDate) -> String {
    format!("trend_{}", date.format("%Y%m%d"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_period_truncates_to_month() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 1);
        assert_eq!(parse_period("2024-03-01"), expected);
        assert_eq!(parse_period("2024-03-17"), expected);
        assert_eq!(parse_period(" 2024-03 "), expected);
        assert_eq!(parse_period("March"), None);
    }

    #[test]
    fn output_stem_uses_compact_date() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 9).unwrap();
        assert_eq!(output_stem(date), "trend_20250109");
        assert_eq!(format_date(date), "2025-01-09");
    }
}
