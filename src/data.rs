//! Partition data model
//!
//! A [`DataSlice`] is the subset of visits that belongs to one partition of
//! the survey, stored column-wise. A [`SlicePoint`] describes the partition
//! itself. Both are read-only from a metric's point of view.

use crate::columns::ColumnSet;
use crate::error::{DataError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single cell of an observation row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Field {
    Float(f64),
    Text(String),
}

impl From<f64> for Field {
    fn from(value: f64) -> Self {
        Field::Float(value)
    }
}

impl From<&str> for Field {
    fn from(value: &str) -> Self {
        Field::Text(value.to_string())
    }
}

impl From<String> for Field {
    fn from(value: String) -> Self {
        Field::Text(value)
    }
}

/// A named column of a partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Column {
    /// Numeric values; missing entries are NaN.
    Float(Vec<f64>),
    /// Text values; missing entries are the empty string.
    Text(Vec<String>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Float(v) => v.len(),
            Column::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn kind(&self) -> &'static str {
        match self {
            Column::Float(_) => "float",
            Column::Text(_) => "text",
        }
    }

    fn take(&self, indices: &[usize]) -> Column {
        match self {
            Column::Float(v) => Column::Float(indices.iter().map(|&i| v[i]).collect()),
            Column::Text(v) => Column::Text(indices.iter().map(|&i| v[i].clone()).collect()),
        }
    }
}

/// One observation expressed as ordered `(field, value)` pairs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub fields: Vec<(String, Field)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field to the row.
    pub fn with(mut self, name: &str, value: impl Into<Field>) -> Self {
        self.fields.push((name.to_string(), value.into()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

/// Column-oriented table holding the visits of one partition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataSlice {
    len: usize,
    columns: BTreeMap<String, Column>,
}

impl DataSlice {
    /// Create an empty partition with no columns.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a column. All columns must share one length.
    pub fn with_column(mut self, name: &str, column: Column) -> Result<Self> {
        self.insert(name, column)?;
        Ok(self)
    }

    /// Convenience wrapper for a numeric column.
    pub fn with_floats(self, name: &str, values: Vec<f64>) -> Result<Self> {
        self.with_column(name, Column::Float(values))
    }

    /// Convenience wrapper for a text column.
    pub fn with_texts<S: Into<String>>(self, name: &str, values: Vec<S>) -> Result<Self> {
        self.with_column(
            name,
            Column::Text(values.into_iter().map(Into::into).collect()),
        )
    }

    /// Insert a column in place.
    pub fn insert(&mut self, name: &str, column: Column) -> Result<()> {
        let others = self.columns.keys().any(|k| k != name);
        if others && column.len() != self.len {
            return Err(DataError::RaggedColumn {
                column: name.to_string(),
                len: column.len(),
                expected: self.len,
            }
            .into());
        }
        self.len = column.len();
        self.columns.insert(name.to_string(), column);
        Ok(())
    }

    /// Build a partition from rows.
    ///
    /// The first row fixes the schema. Later rows missing a field get a
    /// missing marker (NaN or empty string); a field whose kind disagrees
    /// with the first row is an error.
    pub fn from_rows(rows: &[Row]) -> Result<Self> {
        let mut columns: Vec<(String, Column)> = Vec::new();
        if let Some(first) = rows.first() {
            for (name, value) in &first.fields {
                if columns.iter().any(|(n, _)| n == name) {
                    return Err(DataError::DuplicateField(name.clone()).into());
                }
                let column = match value {
                    Field::Float(_) => Column::Float(Vec::with_capacity(rows.len())),
                    Field::Text(_) => Column::Text(Vec::with_capacity(rows.len())),
                };
                columns.push((name.clone(), column));
            }
        }

        for row in rows {
            for (name, column) in columns.iter_mut() {
                match (column, row.get(name)) {
                    (Column::Float(v), Some(Field::Float(x))) => v.push(*x),
                    (Column::Float(v), None) => v.push(f64::NAN),
                    (Column::Text(v), Some(Field::Text(s))) => v.push(s.clone()),
                    (Column::Text(v), None) => v.push(String::new()),
                    (column, Some(field)) => {
                        return Err(DataError::ColumnType {
                            column: name.clone(),
                            expected: column.kind(),
                            actual: match field {
                                Field::Float(_) => "float",
                                Field::Text(_) => "text",
                            },
                        }
                        .into());
                    }
                }
            }
        }

        let mut slice = DataSlice::new();
        for (name, column) in columns {
            slice.insert(&name, column)?;
        }
        Ok(slice)
    }

    /// Number of visits in the partition.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Names of all columns present.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn column(&self, name: &str) -> Result<&Column> {
        self.columns
            .get(name)
            .ok_or_else(|| DataError::MissingColumn(name.to_string()).into())
    }

    /// Numeric column by name.
    pub fn floats(&self, name: &str) -> Result<&[f64]> {
        match self.column(name)? {
            Column::Float(v) => Ok(v),
            Column::Text(_) => Err(DataError::ColumnType {
                column: name.to_string(),
                expected: "float",
                actual: "text",
            }
            .into()),
        }
    }

    /// Text column by name.
    pub fn texts(&self, name: &str) -> Result<&[String]> {
        match self.column(name)? {
            Column::Text(v) => Ok(v),
            Column::Float(_) => Err(DataError::ColumnType {
                column: name.to_string(),
                expected: "text",
                actual: "float",
            }
            .into()),
        }
    }

    /// Column values rendered as category keys, whatever their kind.
    ///
    /// Used by metrics that only compare values for equality (filter,
    /// night id, proposal id).
    pub fn categories(&self, name: &str) -> Result<Vec<String>> {
        Ok(match self.column(name)? {
            Column::Text(v) => v.clone(),
            Column::Float(v) => v
                .iter()
                .map(|x| if x.is_nan() { String::new() } else { x.to_string() })
                .collect(),
        })
    }

    /// Stable ascending permutation of row indices by a numeric column.
    ///
    /// NaN values sort last; ties keep input order.
    pub fn time_order(&self, name: &str) -> Result<Vec<usize>> {
        let values = self.floats(name)?;
        let mut order: Vec<usize> = (0..values.len()).collect();
        order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
        // total_cmp puts positive NaN last but negative NaN first
        order.sort_by_key(|&i| values[i].is_nan());
        Ok(order)
    }

    /// New partition containing the given rows, in the given order.
    pub fn take(&self, indices: &[usize]) -> DataSlice {
        DataSlice {
            len: indices.len(),
            columns: self
                .columns
                .iter()
                .map(|(name, column)| (name.clone(), column.take(indices)))
                .collect(),
        }
    }

    /// Check that every required column is present.
    pub fn validate(&self, required: &ColumnSet) -> Result<()> {
        for name in required.names() {
            if !self.has_column(name) {
                return Err(DataError::MissingColumn(name.to_string()).into());
            }
        }
        Ok(())
    }
}

/// Metadata about the partition being evaluated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlicePoint {
    /// Partition identifier.
    pub sid: u64,
    /// Center right ascension in radians, for spatial partitions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ra: Option<f64>,
    /// Center declination in radians, for spatial partitions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dec: Option<f64>,
    /// Additional numeric descriptors.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, f64>,
}

impl SlicePoint {
    pub fn new(sid: u64) -> Self {
        Self {
            sid,
            ..Default::default()
        }
    }

    /// Set the sky position of the partition center (radians).
    pub fn at(mut self, ra: f64, dec: f64) -> Self {
        self.ra = Some(ra);
        self.dec = Some(dec);
        self
    }

    pub fn with_extra(mut self, key: &str, value: f64) -> Self {
        self.extra.insert(key.to_string(), value);
        self
    }
}

/// Finite values of a column, NaN excluded.
pub(crate) fn finite(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| v.is_finite()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_from_columns() {
        let slice = DataSlice::new()
            .with_floats("expMJD", vec![1.0, 2.0, 3.0])
            .unwrap()
            .with_texts("filter", vec!["g", "r", "r"])
            .unwrap();

        assert_eq!(slice.len(), 3);
        assert_eq!(slice.floats("expMJD").unwrap(), &[1.0, 2.0, 3.0]);
        assert_eq!(slice.texts("filter").unwrap()[0], "g");
    }

    #[test]
    fn test_ragged_column_rejected() {
        let result = DataSlice::new()
            .with_floats("a", vec![1.0, 2.0])
            .unwrap()
            .with_floats("b", vec![1.0]);
        assert!(matches!(
            result,
            Err(crate::MetricError::Data(DataError::RaggedColumn { .. }))
        ));
    }

    #[test]
    fn test_replace_single_column_changes_len() {
        let slice = DataSlice::new()
            .with_floats("a", vec![1.0, 2.0])
            .unwrap()
            .with_floats("a", vec![1.0, 2.0, 3.0])
            .unwrap();
        assert_eq!(slice.len(), 3);
    }

    #[test]
    fn test_wrong_column_kind() {
        let slice = DataSlice::new()
            .with_texts("filter", vec!["g"])
            .unwrap();
        assert!(slice.floats("filter").is_err());
        assert!(slice.floats("missing").is_err());
    }

    #[test]
    fn test_from_rows() {
        let rows = vec![
            Row::new().with("expMJD", 10.0).with("filter", "g"),
            Row::new().with("filter", "r"),
        ];
        let slice = DataSlice::from_rows(&rows).unwrap();
        assert_eq!(slice.len(), 2);
        assert!(slice.floats("expMJD").unwrap()[1].is_nan());
        assert_eq!(slice.texts("filter").unwrap()[1], "r");
    }

    #[test]
    fn test_from_rows_kind_mismatch() {
        let rows = vec![
            Row::new().with("expMJD", 10.0),
            Row::new().with("expMJD", "late"),
        ];
        assert!(DataSlice::from_rows(&rows).is_err());
    }

    #[test]
    fn test_from_rows_empty() {
        let slice = DataSlice::from_rows(&[]).unwrap();
        assert!(slice.is_empty());
    }

    #[test]
    fn test_time_order_stable_with_nan_last() {
        let slice = DataSlice::new()
            .with_floats("t", vec![3.0, f64::NAN, 1.0, 3.0, 2.0])
            .unwrap();
        let order = slice.time_order("t").unwrap();
        assert_eq!(order, vec![2, 4, 0, 3, 1]);
    }

    #[test]
    fn test_take() {
        let slice = DataSlice::new()
            .with_floats("t", vec![3.0, 1.0, 2.0])
            .unwrap();
        let sorted = slice.take(&[1, 2, 0]);
        assert_eq!(sorted.floats("t").unwrap(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_categories_from_floats() {
        let slice = DataSlice::new()
            .with_floats("night", vec![1.0, 1.0, 2.0])
            .unwrap();
        let cats = slice.categories("night").unwrap();
        assert_eq!(cats[0], cats[1]);
        assert_ne!(cats[1], cats[2]);
    }

    #[test]
    fn test_slice_point_builder() {
        let point = SlicePoint::new(7).at(0.5, -0.2).with_extra("nside", 64.0);
        assert_eq!(point.sid, 7);
        assert_eq!(point.ra, Some(0.5));
        assert_eq!(point.extra["nside"], 64.0);
    }
}
