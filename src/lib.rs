//! # kd-search
//!
//! Aggregate range queries over static multi-dimensional datasets.
//!
//! A [`KdTree`] is built once from a column source, a list of partitioning
//! dimensions and an objective column. A query with an inclusive interval
//! per dimension returns the [`Statistics`] (sum, count, mean) of the
//! objective over the matching rows, without visiting the rows themselves.
//!
//! ## Modules
//!
//! - [`stats`]: the [`Statistics`] accumulator and the median used to split
//! - [`source`]: the [`ColumnSource`] capability trait and [`ColumnTable`]
//! - [`region`]: query [`Region`]s made of [`Interval`]s
//! - [`tree`]: construction and querying of the [`KdTree`]
//! - [`error`]: [`KdSearchError`]
//!
//! ## Features
//!
//! - `parallel`: build large subtrees and answer query batches with rayon
//! - `serde`: `Serialize`/`Deserialize` for [`Statistics`], [`Interval`]
//!   and [`Region`] (an interval is a `[min, max]` pair)
//!
//! ## Example
//!
//! ```
//! use kd_search::{ColumnTable, KdTree, Region};
//!
//! let table = ColumnTable::from_rows(
//!     &["x", "y", "target"],
//!     [[1.0, 3.0, 0.0], [2.0, 3.0, 1.0], [3.0, 4.0, 1.0]],
//! )?;
//! let tree = KdTree::build(&table, &["x", "y"], "target")?;
//!
//! let stats = tree.query(&Region::new().with("x", 0.0, 10.0)?.with("y", 0.0, 3.0)?)?;
//! assert_eq!(stats.len(), 2);
//! assert_eq!(stats.mean(), 0.5);
//! # Ok::<(), kd_search::KdSearchError>(())
//! ```

pub mod error;
pub mod region;
pub mod source;
pub mod stats;
pub mod tree;

pub use error::{KdSearchError, Result};
pub use region::{Interval, Region};
pub use source::{ColumnSource, ColumnTable};
pub use stats::Statistics;
pub use tree::{KdTree, KdTreeBuilder, Node};
