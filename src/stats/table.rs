//! Tabular wire shape of the stats provider and its normalisation into
//! per-row records keyed by lower-cased column name.
//!
//! Column order is never assumed stable across calls: every lookup goes
//! through the header list by name.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::error::PredictionError;

/// Column names plus positional rows, as returned by `resultSets` payloads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawStatTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// One row of a [`RawStatTable`], keyed by lower-cased column name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamStatRecord {
    fields: HashMap<String, Value>,
}

/// Accepted column names for one logical field, tried in order.
#[derive(Debug, Clone, Copy)]
pub struct FieldAliases {
    pub field: &'static str,
    pub aliases: &'static [&'static str],
}

impl FieldAliases {
    pub const fn new(field: &'static str, aliases: &'static [&'static str]) -> Self {
        FieldAliases { field, aliases }
    }
}

impl RawStatTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        RawStatTable { headers, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of the first column matching any alias, compared
    /// case-insensitively. Aliases are tried in declaration order.
    pub fn find_column(&self, aliases: &FieldAliases) -> Option<usize> {
        aliases.aliases.iter().find_map(|alias| {
            self.headers
                .iter()
                .position(|h| h.eq_ignore_ascii_case(alias))
        })
    }

    /// Like [`find_column`](Self::find_column) but a miss is a hard
    /// structure-mismatch error naming the field and the columns present.
    pub fn resolve_column(&self, aliases: &FieldAliases) -> Result<usize, PredictionError> {
        self.find_column(aliases).ok_or_else(|| {
            PredictionError::StructureMismatch(format!(
                "missing '{}' column (tried {:?}); found {:?}",
                aliases.field, aliases.aliases, self.headers
            ))
        })
    }

    /// Normalise every row into a [`TeamStatRecord`].
    pub fn records(&self) -> Vec<TeamStatRecord> {
        normalize(self)
    }
}

/// Convert a raw table into one record per row.
///
/// Headers are lower-cased; a row shorter than the header list yields null
/// for the missing cells so every record carries one entry per header.
pub fn normalize(table: &RawStatTable) -> Vec<TeamStatRecord> {
    let keys: Vec<String> = table.headers.iter().map(|h| h.to_lowercase()).collect();
    table
        .rows
        .iter()
        .map(|row| {
            let fields = keys
                .iter()
                .enumerate()
                .map(|(i, key)| (key.clone(), row.get(i).cloned().unwrap_or(Value::Null)))
                .collect();
            TeamStatRecord { fields }
        })
        .collect()
}

impl TeamStatRecord {
    #[cfg(test)]
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        TeamStatRecord {
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.as_ref().to_lowercase(), v))
                .collect(),
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Raw cell by exact lower-cased name. Present-but-null cells return
    /// `Some(&Value::Null)`.
    pub fn value(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Cell value, or `default` when the column is absent.
    #[cfg(test)]
    pub fn get(&self, field: &str, default: Value) -> Value {
        self.fields.get(field).cloned().unwrap_or(default)
    }

    /// First present column among the aliases (which are lower-cased here).
    pub fn value_any(&self, aliases: &FieldAliases) -> Option<&Value> {
        aliases
            .aliases
            .iter()
            .find_map(|alias| self.fields.get(&alias.to_lowercase()))
    }

    /// Numeric reading of a cell: JSON numbers and numeric strings parse,
    /// anything else (absent, null, text) is `None`.
    pub fn f64_field(&self, aliases: &FieldAliases) -> Option<f64> {
        self.value_any(aliases).and_then(value_as_f64)
    }

    pub fn insert(&mut self, field: &str, value: Value) {
        self.fields.insert(field.to_lowercase(), value);
    }
}

pub fn value_as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Integer reading used for identifiers: integers, integral floats and
/// numeric strings are accepted.
pub fn value_as_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite() && f.fract() == 0.0)
                    .map(|f| f as i64)
            })
        }
        _ => None,
    }
}
