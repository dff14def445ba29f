//! Untyped uploaded tables.

use serde::{Deserialize, Serialize};

use super::RawCell;

/// A header row plus a grid of raw cells, as read from an upload.
///
/// Rows shorter than the header read as missing in the absent columns.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<RawCell>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<RawCell>>) -> Self {
        Self { headers, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the first column with exactly this header.
    pub fn column_index(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == header)
    }

    /// Cell at (row, column); out-of-range reads as missing.
    pub fn cell(&self, row: usize, column: usize) -> &RawCell {
        static MISSING: RawCell = RawCell::Missing;
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .unwrap_or(&MISSING)
    }
}
