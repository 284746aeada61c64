//! Dictionary vectorization of flattened attributes.
//!
//! Each distinct feature becomes one column:
//! - text values are one-hot encoded as `key=value`
//! - numbers keep their value under `key`
//! - flags become `1.0`/`0.0` under `key`
//!
//! Columns are sorted by feature name. Missing features are implicit zeros.

use crate::properties::{AttributeValue, Attributes};
use std::collections::{BTreeMap, BTreeSet};

/// Rows of `(column, value)` entries plus the column labels.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AttributeBlock {
    pub feature_names: Vec<String>,
    /// One row per sample, entries sorted by column.
    pub rows: Vec<Vec<(usize, f64)>>,
}

impl AttributeBlock {
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.feature_names.len()
    }

    pub fn nnz(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }
}

/// Turns attribute dictionaries into a sparse block.
#[derive(Clone, Debug)]
pub struct DictVectorizer {
    separator: String,
}

impl DictVectorizer {
    pub fn new() -> Self {
        Self {
            separator: "=".to_string(),
        }
    }

    /// Separator between key and value in one-hot feature names.
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Learn the feature vocabulary from `samples` and encode them.
    pub fn fit_transform(&self, samples: &[Attributes]) -> AttributeBlock {
        let encoded: Vec<Vec<(String, f64)>> = samples
            .iter()
            .map(|sample| sample.iter().map(|(k, v)| self.feature(k, v)).collect())
            .collect();

        let vocabulary: BTreeSet<&str> = encoded
            .iter()
            .flatten()
            .map(|(name, _)| name.as_str())
            .collect();
        let columns: BTreeMap<&str, usize> = vocabulary
            .iter()
            .enumerate()
            .map(|(i, name)| (*name, i))
            .collect();

        let rows = encoded
            .iter()
            .map(|features| {
                let mut row: Vec<(usize, f64)> = features
                    .iter()
                    .filter(|(_, value)| *value != 0.0)
                    .map(|(name, value)| (columns[name.as_str()], *value))
                    .collect();
                row.sort_by_key(|(col, _)| *col);
                row
            })
            .collect();

        AttributeBlock {
            feature_names: vocabulary.into_iter().map(str::to_string).collect(),
            rows,
        }
    }

    fn feature(&self, key: &str, value: &AttributeValue) -> (String, f64) {
        match value {
            AttributeValue::Text(text) => (format!("{}{}{}", key, self.separator, text), 1.0),
            AttributeValue::Number(n) => (key.to_string(), *n),
            AttributeValue::Flag(b) => (key.to_string(), if *b { 1.0 } else { 0.0 }),
        }
    }
}

impl Default for DictVectorizer {
    fn default() -> Self {
        Self::new()
    }
}
