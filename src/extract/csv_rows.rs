// src/extract/csv_rows.rs

use csv::ReaderBuilder;
use tracing::{debug, trace};

use super::raw_table::RawRow;
use crate::error::{ParseError, ParseResult};

/// A CSV body split into its header and data records, cells trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Read every record of `body`. Fewer than two records (header plus one data
/// row) means the source had nothing to report and yields `None`.
pub fn read_csv(body: &str) -> ParseResult<Option<CsvTable>> {
    let body = body.trim_start_matches('\u{feff}');
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(body.as_bytes());

    let mut records: Vec<Vec<String>> = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| {
            ParseError::mismatch(format!("csv record {}", idx), "well-formed CSV", e.to_string())
        })?;
        records.push(record.iter().map(|c| c.trim().to_string()).collect());
    }

    if records.len() < 2 {
        debug!(records = records.len(), "csv body without data rows");
        return Ok(None);
    }

    let header = records.remove(0);
    Ok(Some(CsvTable {
        header,
        rows: records,
    }))
}

impl CsvTable {
    /// Key each record by the header. Rows that echo the header verbatim are
    /// dropped; trailing empty cells beyond the header width are tolerated.
    pub fn into_raw_rows(self) -> ParseResult<Vec<RawRow>> {
        let mut out = Vec::with_capacity(self.rows.len());
        for mut row in self.rows {
            while row.len() > self.header.len() && row.last().map_or(false, String::is_empty) {
                row.pop();
            }
            let raw = RawRow::zip(&self.header, &row)?;
            if raw.echoes_header() {
                trace!("dropping header echo row");
                continue;
            }
            out.push(raw);
        }
        Ok(out)
    }
}

/// `read_csv` followed by `into_raw_rows`; no data yields an empty list.
pub fn parse_csv_rows(body: &str) -> ParseResult<Vec<RawRow>> {
    match read_csv(body)? {
        Some(table) => table.into_raw_rows(),
        None => Ok(Vec::new()),
    }
}
