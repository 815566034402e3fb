// src/extract/json_table.rs

use serde_json::Value;

use super::raw_table::RawRow;
use crate::error::{ParseError, ParseResult};

/// Decode a JSON body; a source answering with anything else is drift.
pub fn parse_json(context: &str, body: &str) -> ParseResult<Value> {
    serde_json::from_str(body).map_err(|e| ParseError::FormatMismatch {
        context: context.to_string(),
        expected: "a json document".to_string(),
        actual: e.to_string(),
    })
}

/// Render one JSON cell the way the HTML and CSV paths would have seen it.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Zip a JSON `fields` array against each entry of `data`.
pub fn zip_fields(fields: &[Value], data: &[Value]) -> ParseResult<Vec<RawRow>> {
    let header: Vec<String> = fields.iter().map(cell_text).collect();
    data.iter()
        .map(|row| {
            let cells = row.as_array().ok_or_else(|| {
                ParseError::mismatch("json data row", "an array", row)
            })?;
            let values: Vec<String> = cells.iter().map(cell_text).collect();
            RawRow::zip(&header, &values)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn zips_mixed_cells() -> anyhow::Result<()> {
        let fields = json!(["證券代號", "殖利率(%)", "股利年度"]);
        let data = json!([["2330", 1.85, null], [" 1101 ", "4.10", 112]]);
        let rows = zip_fields(
            fields.as_array().unwrap(),
            data.as_array().unwrap(),
        )?;
        assert_eq!(rows[0].get("殖利率(%)"), Some("1.85"));
        assert_eq!(rows[0].get("股利年度"), Some(""));
        assert_eq!(rows[1].get("證券代號"), Some("1101"));
        assert_eq!(rows[1].get("股利年度"), Some("112"));
        Ok(())
    }

    #[test]
    fn html_instead_of_json() {
        assert!(matches!(
            parse_json("ratio", "<html>maintenance</html>"),
            Err(ParseError::FormatMismatch { .. })
        ));
    }

    #[test]
    fn non_array_row_is_a_mismatch() {
        let fields = json!(["a"]);
        let data = json!([{"a": 1}]);
        assert!(zip_fields(fields.as_array().unwrap(), data.as_array().unwrap()).is_err());
    }
}
