// src/datasets/price_history.rs
//
// Daily OHLCV bars of one stock from the cnyes charting API, which answers
// with parallel arrays `t, o, c, h, l, v` under `data`.

use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument};

use crate::error::{ParseError, ParseResult};
use crate::extract::json_table::{cell_text, parse_json};
use crate::normalize::number::shift_decimal;

/// Bars are dated on the Taiwan calendar.
pub const TAIPEI_OFFSET_SECS: i32 = 8 * 3600;

const SERIES: [&str; 6] = ["t", "o", "c", "h", "l", "v"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Price {
    pub date: String,
    pub opening: String,
    pub highest: String,
    pub lowest: String,
    pub closing: String,
    /// Shares; the API reports lots of a thousand.
    pub volume: String,
}

fn taipei_date(raw: &Value) -> ParseResult<String> {
    let invalid = |reason: &str| ParseError::invalid("t", raw.to_string(), reason);
    let secs = raw.as_i64().ok_or_else(|| invalid("not a unix timestamp"))?;
    let offset = FixedOffset::east_opt(TAIPEI_OFFSET_SECS).ok_or_else(|| invalid("bad offset"))?;
    DateTime::from_timestamp(secs, 0)
        .map(|utc| utc.with_timezone(&offset).format("%Y-%m-%d").to_string())
        .ok_or_else(|| invalid("timestamp out of range"))
}

/// Lots to shares, fraction of a share dropped.
fn shares(raw: &Value) -> ParseResult<String> {
    let text = cell_text(raw);
    let scaled = shift_decimal(&text, 3)
        .ok_or_else(|| ParseError::invalid("v", text.as_str(), "not a decimal volume"))?;
    Ok(match scaled.split_once('.') {
        Some((whole, _)) => whole.to_string(),
        None => scaled,
    })
}

#[instrument(level = "info", skip(body), fields(body_len = body.len()))]
pub fn parse_price_history(body: &str) -> ParseResult<Vec<Price>> {
    let doc = parse_json("price history", body)?;
    let data = doc
        .get("data")
        .ok_or_else(|| ParseError::mismatch("price history", "a `data` object", &doc))?;

    let mut series = Vec::with_capacity(SERIES.len());
    for key in SERIES {
        let values = data
            .get(key)
            .and_then(Value::as_array)
            .ok_or_else(|| ParseError::mismatch("price history", format!("a `{}` array", key), data))?;
        series.push(values);
    }
    let [t, o, c, h, l, v] = [series[0], series[1], series[2], series[3], series[4], series[5]];

    if t.is_empty() {
        return Err(ParseError::mismatch("price history", "at least one bar", data));
    }
    for (key, values) in SERIES.iter().zip(&series).skip(1) {
        if values.len() != t.len() {
            return Err(ParseError::mismatch(
                format!("price history series `{}` length", key),
                t.len(),
                values.len(),
            ));
        }
    }

    let mut out = Vec::with_capacity(t.len());
    for i in 0..t.len() {
        out.push(Price {
            date: taipei_date(&t[i])?,
            opening: cell_text(&o[i]),
            highest: cell_text(&h[i]),
            lowest: cell_text(&l[i]),
            closing: cell_text(&c[i]),
            volume: shares(&v[i])?,
        });
    }
    info!(bars = out.len(), "price history parsed");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bars_on_taiwan_dates() -> anyhow::Result<()> {
        // 2025-01-23 16:00 UTC is already the 24th in Taipei.
        let body = json!({
            "statusCode": 200,
            "data": {
                "t": [1737648000, 1737561600],
                "o": [1125, 1110],
                "c": [1135, 1120],
                "h": [1140, 1125],
                "l": [1120, 1105],
                "v": [25981.123, 30012]
            }
        })
        .to_string();
        let bars = parse_price_history(&body)?;
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, "2025-01-24");
        assert_eq!(bars[0].closing, "1135");
        assert_eq!(bars[0].volume, "25981123");
        assert_eq!(bars[1].date, "2025-01-23");
        assert_eq!(bars[1].volume, "30012000");
        Ok(())
    }

    #[test]
    fn series_must_line_up() {
        let body = json!({
            "data": { "t": [1737648000], "o": [1], "c": [1, 2], "h": [1], "l": [1], "v": [1] }
        })
        .to_string();
        match parse_price_history(&body) {
            Err(ParseError::FormatMismatch { context, .. }) => assert!(context.contains("`c`")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn empty_history_is_drift() {
        let body = json!({
            "data": { "t": [], "o": [], "c": [], "h": [], "l": [], "v": [] }
        })
        .to_string();
        assert!(parse_price_history(&body).is_err());
    }
}
