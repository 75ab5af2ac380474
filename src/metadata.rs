use crate::enums::Dimension;

use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Value read for a dimension that has no column in the table.
pub const ABSENT_VALUE: i64 = 0;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Column {dimension} has {actual} values, expected {expected}")]
    LengthMismatch {
        dimension: Dimension,
        expected: usize,
        actual: usize,
    },
}

/// Per-volume categorical values, one optional column per [`Dimension`].
///
/// A dimension without a column is one the acquisition does not vary along.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataTable {
    len: usize,
    columns: BTreeMap<Dimension, Vec<i64>>,
}

impl MetadataTable {
    /// An empty table describing `len` volumes
    pub fn new(len: usize) -> Self {
        Self {
            len,
            columns: BTreeMap::new(),
        }
    }

    pub fn with_column(
        mut self,
        dimension: Dimension,
        values: Vec<i64>,
    ) -> Result<Self, MetadataError> {
        self.insert(dimension, values)?;
        Ok(self)
    }

    pub fn insert(&mut self, dimension: Dimension, values: Vec<i64>) -> Result<(), MetadataError> {
        if values.len() != self.len {
            return Err(MetadataError::LengthMismatch {
                dimension,
                expected: self.len,
                actual: values.len(),
            });
        }
        self.columns.insert(dimension, values);
        Ok(())
    }

    /// Number of volumes described
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn contains(&self, dimension: Dimension) -> bool {
        self.columns.contains_key(&dimension)
    }

    pub fn column(&self, dimension: Dimension) -> Option<&[i64]> {
        self.columns.get(&dimension).map(Vec::as_slice)
    }

    /// Value of `dimension` for volume `index`, [`ABSENT_VALUE`] without a column
    pub fn value(&self, dimension: Dimension, index: usize) -> i64 {
        self.column(dimension)
            .and_then(|values| values.get(index).copied())
            .unwrap_or(ABSENT_VALUE)
    }

    /// Sorted distinct values of a column
    pub fn distinct(&self, dimension: Dimension) -> Vec<i64> {
        match self.column(dimension) {
            Some(values) => values
                .iter()
                .copied()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
            None => vec![ABSENT_VALUE],
        }
    }

    pub fn dimensions(&self) -> impl Iterator<Item = Dimension> + '_ {
        self.columns.keys().copied()
    }
}
