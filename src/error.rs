//! Error type shared by index construction, table assembly and queries.
//!
//! Every variant is a caller contract violation: the operations in this
//! crate are deterministic, so nothing here is worth retrying.

/// Errors reported by `kd_search`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum KdSearchError {
    /// Construction was attempted on a source with zero rows.
    #[error("cannot build an index over an empty dataset")]
    EmptyDataset,

    /// Construction was attempted without any partitioning dimension.
    #[error("at least one dimension is required")]
    NoDimensions,

    /// The same dimension name was listed twice.
    #[error("dimension `{0}` is listed more than once")]
    DuplicateDimension(String),

    /// A dimension or objective column is missing from the source.
    #[error("column `{0}` not found in data source")]
    UnknownColumn(String),

    /// A column does not have one value per row.
    #[error("column `{name}` has {actual} values, expected {expected}")]
    ColumnLength {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// A row passed to `ColumnTable::from_rows` does not have one value
    /// per column name.
    #[error("row {row} has {actual} values, expected {expected}")]
    RowLength {
        row: usize,
        expected: usize,
        actual: usize,
    },

    /// A table was assembled from rows without any column name.
    #[error("at least one column name is required")]
    NoColumns,

    /// A dimension column holds NaN, which cannot be ordered against a median.
    #[error("dimension column `{0}` contains NaN")]
    NanCoordinate(String),

    /// A query reached a node splitting on a dimension the region does not bound.
    #[error("query region has no bounds for dimension `{0}`")]
    UnknownDimension(String),

    /// An interval with `min > max` or a NaN bound.
    #[error("invalid interval [{min}, {max}]")]
    InvalidInterval { min: f64, max: f64 },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, KdSearchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_item() {
        let err = KdSearchError::UnknownDimension("y".into());
        assert_eq!(err.to_string(), "query region has no bounds for dimension `y`");

        let err = KdSearchError::ColumnLength {
            name: "target".into(),
            expected: 3,
            actual: 2,
        };
        assert_eq!(err.to_string(), "column `target` has 2 values, expected 3");

        let err = KdSearchError::RowLength {
            row: 1,
            expected: 2,
            actual: 1,
        };
        assert_eq!(err.to_string(), "row 1 has 1 values, expected 2");
    }

    #[test]
    fn is_std_error() {
        fn assert_error<E: std::error::Error + Send + Sync + 'static>() {}
        assert_error::<KdSearchError>();
    }
}
