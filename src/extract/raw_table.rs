// src/extract/raw_table.rs

use std::fmt;

use crate::error::{ParseError, ParseResult};

/// One source row keyed by its column header, in source column order.
///
/// Headers are unique within a row; lookups return the cell text untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    cells: Vec<(String, String)>,
}

impl RawRow {
    /// Zip `header` against `values`. Width mismatch and repeated header names
    /// are format errors carrying both sides.
    pub fn zip(header: &[String], values: &[String]) -> ParseResult<Self> {
        if header.len() != values.len() {
            return Err(ParseError::mismatch(
                "row width against header",
                header,
                values,
            ));
        }
        for (i, name) in header.iter().enumerate() {
            if header[..i].contains(name) {
                return Err(ParseError::mismatch(
                    format!("header with repeated column `{}`", name),
                    "unique column names",
                    header,
                ));
            }
        }
        Ok(Self {
            cells: header.iter().cloned().zip(values.iter().cloned()).collect(),
        })
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            cells: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Replace the value under `key`; returns false when the key is absent.
    pub fn set(&mut self, key: &str, value: &str) -> bool {
        match self.cells.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => {
                *v = value.to_string();
                true
            }
            None => false,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cells.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// True when every value repeats its own header name.
    pub fn echoes_header(&self) -> bool {
        !self.cells.is_empty() && self.cells.iter().all(|(k, v)| k == v)
    }
}

impl fmt::Display for RawRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (k, v)) in self.cells.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{:?}: {:?}", k, v)?;
        }
        f.write_str("}")
    }
}

/// A contiguous run of rows sharing one header definition.
///
/// `headers` holds every header tier in document order (super-headers first);
/// the last tier names the data columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableGroup {
    pub headers: Vec<Vec<String>>,
    pub rows: Vec<Vec<String>>,
}

impl TableGroup {
    pub fn header(&self) -> Option<&[String]> {
        self.headers.last().map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() && self.rows.is_empty()
    }

    /// Key every row by the leaf header tier.
    pub fn raw_rows(&self) -> ParseResult<Vec<RawRow>> {
        let header = match self.header() {
            Some(h) => h,
            None if self.rows.is_empty() => return Ok(Vec::new()),
            None => {
                return Err(ParseError::mismatch(
                    "table rows without header",
                    "a header row",
                    &self.rows,
                ))
            }
        };
        self.rows.iter().map(|row| RawRow::zip(header, row)).collect()
    }
}
