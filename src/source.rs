//! Column-oriented data sources.
//!
//! The index only needs two things from a dataset: the number of rows and
//! a row-aligned numeric column for any name. [`ColumnSource`] captures
//! exactly that, so callers can index their own tabular containers without
//! converting them.
//!
//! [`ColumnTable`] is a small owned implementation for programmatic use and
//! tests.

use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

use crate::error::{KdSearchError, Result};

/// Read access to named numeric columns of equal length.
pub trait ColumnSource {
    /// Number of rows.
    fn row_count(&self) -> usize;

    /// Returns the column called `name`, one value per row, or `None` if
    /// the source has no such column.
    fn column(&self, name: &str) -> Option<&[f64]>;
}

impl<T: ColumnSource + ?Sized> ColumnSource for &T {
    fn row_count(&self) -> usize {
        (**self).row_count()
    }

    fn column(&self, name: &str) -> Option<&[f64]> {
        (**self).column(name)
    }
}

// Maps report the length of their longest column; a shorter column is then
// caught by the length check at build time.

impl<S: BuildHasher> ColumnSource for HashMap<String, Vec<f64>, S> {
    fn row_count(&self) -> usize {
        self.values().map(Vec::len).max().unwrap_or(0)
    }

    fn column(&self, name: &str) -> Option<&[f64]> {
        self.get(name).map(Vec::as_slice)
    }
}

impl ColumnSource for BTreeMap<String, Vec<f64>> {
    fn row_count(&self) -> usize {
        self.values().map(Vec::len).max().unwrap_or(0)
    }

    fn column(&self, name: &str) -> Option<&[f64]> {
        self.get(name).map(Vec::as_slice)
    }
}

/// Owned table of named `f64` columns sharing one row count.
///
/// # Examples
/// ```
/// use kd_search::{ColumnSource, ColumnTable};
///
/// let table = ColumnTable::new()
///     .with_column("x", vec![1.0, 2.0, 3.0])?
///     .with_column("y", vec![3.0, 3.0, 4.0])?
///     .with_column("target", vec![0.0, 1.0, 1.0])?;
/// assert_eq!(table.row_count(), 3);
/// assert_eq!(table.column("y"), Some(&[3.0, 3.0, 4.0][..]));
/// assert!(table.with_column("z", vec![1.0]).is_err());
/// # Ok::<(), kd_search::KdSearchError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnTable {
    row_count: usize,
    columns: BTreeMap<String, Vec<f64>>,
}

impl ColumnTable {
    /// Creates a table with no columns and no rows.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from row-major records.
    ///
    /// Every row must hold exactly one value per name.
    ///
    /// # Errors
    /// - [`KdSearchError::NoColumns`] if `names` is empty;
    /// - [`KdSearchError::RowLength`] for the first row of the wrong width.
    ///
    /// ```
    /// use kd_search::{ColumnSource, ColumnTable};
    ///
    /// let table = ColumnTable::from_rows(
    ///     &["x", "y", "target"],
    ///     [[1.0, 3.0, 0.0], [2.0, 3.0, 1.0], [3.0, 4.0, 1.0]],
    /// )?;
    /// assert_eq!(table.column("target"), Some(&[0.0, 1.0, 1.0][..]));
    /// # Ok::<(), kd_search::KdSearchError>(())
    /// ```
    pub fn from_rows<N, R>(names: &[N], rows: impl IntoIterator<Item = R>) -> Result<Self>
    where
        N: AsRef<str>,
        R: AsRef<[f64]>,
    {
        if names.is_empty() {
            return Err(KdSearchError::NoColumns);
        }
        let mut columns: Vec<Vec<f64>> = vec![Vec::new(); names.len()];
        for (index, row) in rows.into_iter().enumerate() {
            let row = row.as_ref();
            if row.len() != names.len() {
                return Err(KdSearchError::RowLength {
                    row: index,
                    expected: names.len(),
                    actual: row.len(),
                });
            }
            for (column, &value) in columns.iter_mut().zip(row) {
                column.push(value);
            }
        }

        let mut table = Self::new();
        for (name, values) in names.iter().zip(columns) {
            table.insert_column(name.as_ref(), values)?;
        }
        Ok(table)
    }

    /// Builder form of [`insert_column`](ColumnTable::insert_column).
    pub fn with_column(mut self, name: impl Into<String>, values: Vec<f64>) -> Result<Self> {
        self.insert_column(name, values)?;
        Ok(self)
    }

    /// Adds or replaces a column.
    ///
    /// The first column fixes the row count; later columns must match it,
    /// unless the column being replaced is the only one.
    pub fn insert_column(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<()> {
        let name = name.into();
        let sole_replacement = self.columns.len() == 1 && self.columns.contains_key(&name);
        if self.columns.is_empty() || sole_replacement {
            self.row_count = values.len();
        } else if values.len() != self.row_count {
            return Err(KdSearchError::ColumnLength {
                name,
                expected: self.row_count,
                actual: values.len(),
            });
        }
        self.columns.insert(name, values);
        Ok(())
    }

    /// Column names in sorted order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }
}

impl ColumnSource for ColumnTable {
    fn row_count(&self) -> usize {
        self.row_count
    }

    fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }
}
