// src/normalize/fields.rs

use tracing::warn;

use crate::error::{ParseError, ParseResult};
use crate::extract::RawRow;

/// Reads fields out of a [`RawRow`] by historical name lists, remembering
/// which columns were taken so that leftovers can be reported as drift.
pub struct RowReader<'a> {
    row: &'a RawRow,
    consumed: Vec<&'a str>,
}

impl<'a> RowReader<'a> {
    pub fn new(row: &'a RawRow) -> Self {
        Self {
            row,
            consumed: Vec::new(),
        }
    }

    pub fn row(&self) -> &'a RawRow {
        self.row
    }

    fn lookup(&self, names: &[&str]) -> Option<(&'a str, &'a str)> {
        let row = self.row;
        names
            .iter()
            .find_map(|name| row.iter().find(|(k, _)| k == name))
    }

    /// First present name, without marking it consumed.
    pub fn peek(&self, names: &[&str]) -> Option<&'a str> {
        self.lookup(names).map(|(_, v)| v)
    }

    /// First present name in `names`; absent everywhere gives `None`.
    pub fn first(&mut self, names: &[&str]) -> Option<&'a str> {
        let (key, value) = self.lookup(names)?;
        self.consumed.push(key);
        Some(value)
    }

    /// Like [`first`](Self::first) but every name missing is fatal.
    pub fn require(&mut self, names: &[&str]) -> ParseResult<&'a str> {
        self.first(names).ok_or_else(|| ParseError::MissingField {
            names: names.iter().map(|s| s.to_string()).collect(),
            row: self.row.to_string(),
        })
    }

    /// Mark columns as known without reading them.
    pub fn skip(&mut self, names: &[&str]) {
        for name in names {
            if let Some((key, _)) = self.lookup(&[name]) {
                self.consumed.push(key);
            }
        }
    }

    pub fn unconsumed(&self) -> Vec<&'a str> {
        self.row
            .keys()
            .filter(|k| !self.consumed.contains(k))
            .collect()
    }

    /// Log every column nothing asked for.
    pub fn finish(self, context: &str) {
        let left = self.unconsumed();
        if !left.is_empty() {
            warn!(%context, columns = ?left, "unmapped columns in row");
        }
    }
}

/// Declares a record section whose fields are all optional decimal strings,
/// each read from an ordered list of historical column names.
///
/// The generated type gets a `FIELDS` table of `(field, names)` and a `read`
/// constructor taking a per-value conversion.
macro_rules! field_group {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $( $field:ident : [$($alias:literal),+ $(,)?] ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
        $vis struct $name {
            $( pub $field: Option<String>, )*
        }

        impl $name {
            #[allow(dead_code)]
            pub const FIELDS: &'static [(&'static str, &'static [&'static str])] =
                &[ $( (stringify!($field), &[$($alias),+]) ),* ];

            pub fn read<F>(
                reader: &mut $crate::normalize::fields::RowReader<'_>,
                convert: F,
            ) -> $crate::error::ParseResult<Self>
            where
                F: Fn(&'static str, &str) -> $crate::error::ParseResult<Option<String>>,
            {
                Ok(Self {
                    $(
                        $field: match reader.first(&[$($alias),+]) {
                            Some(value) => convert(stringify!($field), value)?,
                            None => None,
                        },
                    )*
                })
            }
        }
    };
}

pub(crate) use field_group;
