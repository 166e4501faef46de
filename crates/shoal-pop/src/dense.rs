//! [`DenseMatrix`], a flat row-major `f64` matrix.
//!
//! Growth redistribution tables and per-length consumption bookkeeping are
//! rectangular and explicitly dimensioned, so they live in one contiguous
//! allocation with bounds checked at access time rather than in nested
//! per-row allocations.

use crate::error::PopError;

/// A rectangular `f64` matrix stored row-major in one allocation.
#[derive(Debug, Clone, Default)]
pub struct DenseMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl DenseMatrix {
    /// Creates a zero-filled matrix with the given dimensions.
    #[must_use]
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows.saturating_mul(cols)],
        }
    }

    /// Builds a matrix from explicit rows, which must all share one width.
    ///
    /// # Errors
    ///
    /// Fails with [`PopError::RaggedRows`] when row widths differ.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, PopError> {
        let cols = rows.first().map_or(0, Vec::len);
        for (index, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(PopError::RaggedRows {
                    row: index,
                    expected: cols,
                    actual: row.len(),
                });
            }
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data: rows.into_iter().flatten().collect(),
        })
    }

    /// Number of rows.
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    #[must_use]
    pub const fn cols(&self) -> usize {
        self.cols
    }

    /// Value at `(row, col)`, if in bounds.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.index_of(row, col).and_then(|i| self.data.get(i)).copied()
    }

    /// Mutable reference to the value at `(row, col)`, if in bounds.
    pub fn get_mut(&mut self, row: usize, col: usize) -> Option<&mut f64> {
        self.index_of(row, col)
            .and_then(|i| self.data.get_mut(i))
    }

    /// One row as a slice, if in bounds.
    #[must_use]
    pub fn row(&self, row: usize) -> Option<&[f64]> {
        let start = row.checked_mul(self.cols)?;
        let end = start.checked_add(self.cols)?;
        self.data.get(start..end)
    }

    /// One row as a mutable slice, if in bounds.
    pub fn row_mut(&mut self, row: usize) -> Option<&mut [f64]> {
        let start = row.checked_mul(self.cols)?;
        let end = start.checked_add(self.cols)?;
        self.data.get_mut(start..end)
    }

    /// Iterates rows in order.
    pub fn iter_rows(&self) -> impl Iterator<Item = &[f64]> {
        self.data.chunks_exact(self.cols.max(1))
    }

    /// Overwrites every element with `value`.
    pub fn fill(&mut self, value: f64) {
        self.data.fill(value);
    }

    /// Sum of every element.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.data.iter().sum()
    }

    fn index_of(&self, row: usize, col: usize) -> Option<usize> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        row.checked_mul(self.cols)?.checked_add(col)
    }
}
