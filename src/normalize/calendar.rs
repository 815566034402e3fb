// src/normalize/calendar.rs

use chrono::{Datelike, Duration, NaiveDate, Weekday};

use crate::error::{ParseError, ParseResult};

/// Offset between the Gregorian and the ROC (Minguo) year count.
pub const ROC_OFFSET: i32 = 1911;

pub fn roc_to_ad(roc_year: i32) -> i32 {
    roc_year.saturating_add(ROC_OFFSET)
}

pub fn ad_to_roc(year: i32) -> i32 {
    year - ROC_OFFSET
}

/// `yyy/mm/dd` in ROC years to ISO `YYYY-MM-DD`.
pub fn roc_date_to_iso(field: &str, value: &str) -> ParseResult<String> {
    let value = value.trim();
    let mut parts = value.splitn(3, '/');
    let (y, m, d) = match (parts.next(), parts.next(), parts.next()) {
        (Some(y), Some(m), Some(d)) => (y, m, d),
        _ => return Err(ParseError::invalid(field, value, "expected yyy/mm/dd")),
    };
    let parse = |s: &str| {
        s.trim()
            .parse::<u32>()
            .map_err(|e| ParseError::invalid(field, value, e.to_string()))
    };
    let roc_year = y
        .trim()
        .parse::<i32>()
        .map_err(|e| ParseError::invalid(field, value, e.to_string()))?;
    let year = Some(roc_year)
        .filter(|&y| y >= 1)
        .and_then(|y| y.checked_add(ROC_OFFSET))
        .ok_or_else(|| ParseError::invalid(field, value, "year outside the ROC calendar"))?;
    NaiveDate::from_ymd_opt(year, parse(m)?, parse(d)?)
        .map(|date| date.format("%Y-%m-%d").to_string())
        .ok_or_else(|| ParseError::invalid(field, value, "no such calendar date"))
}

/// `YYYY/MM/DD` (Gregorian) to ISO `YYYY-MM-DD`.
pub fn slash_date_to_iso(field: &str, value: &str) -> ParseResult<String> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y/%m/%d")
        .map(|date| date.format("%Y-%m-%d").to_string())
        .map_err(|e| ParseError::invalid(field, value, e.to_string()))
}

/// Weekdays walking backwards from `start`. A weekend start snaps back to
/// the preceding Friday; public holidays are not known here.
pub fn last_working_dates(start: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    let mut current = Some(start);
    std::iter::from_fn(move || {
        let mut date = current?;
        match date.weekday() {
            Weekday::Sat => date -= Duration::days(1),
            Weekday::Sun => date -= Duration::days(2),
            _ => {}
        }
        current = date.pred_opt();
        Some(date)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn weekend_start_walks_back_over_weekends() {
        let dates: Vec<_> = last_working_dates(ymd(2025, 2, 1)).take(7).collect();
        assert_eq!(
            dates,
            vec![
                ymd(2025, 1, 31),
                ymd(2025, 1, 30),
                ymd(2025, 1, 29),
                ymd(2025, 1, 28),
                ymd(2025, 1, 27),
                ymd(2025, 1, 24),
                ymd(2025, 1, 23),
            ]
        );
    }

    #[test]
    fn weekday_start_is_kept() {
        let mut dates = last_working_dates(ymd(2025, 1, 27));
        assert_eq!(dates.next(), Some(ymd(2025, 1, 27)));
        assert_eq!(dates.next(), Some(ymd(2025, 1, 24)));
    }

    #[test]
    fn roc_dates() -> anyhow::Result<()> {
        assert_eq!(roc_date_to_iso("d", "113/01/02")?, "2024-01-02");
        assert_eq!(roc_date_to_iso("d", " 99/12/31 ")?, "2010-12-31");
        assert!(roc_date_to_iso("d", "113/02/30").is_err());
        assert!(roc_date_to_iso("d", "－").is_err());
        assert!(roc_date_to_iso("d", "4294967295/01/01").is_err());
        assert!(roc_date_to_iso("d", "2147483647/01/01").is_err());
        assert!(roc_date_to_iso("d", "0/01/01").is_err());
        assert_eq!(slash_date_to_iso("d", "2024/03/15")?, "2024-03-15");
        assert_eq!(ad_to_roc(2024), 113);
        Ok(())
    }
}
