//! Median-split k-d tree over a static dataset.
//!
//! # Construction
//!
//! Each node takes the rows handed to it, picks the axis
//! `(first_dimension + depth) mod k`, and splits the rows around the median
//! of that axis into three groups:
//!
//! - `less`: strictly below the median, handed to the left child;
//! - `equal`: exactly on the median, handed to the middle child, which
//!   splits them on the next axis;
//! - `greater`: strictly above the median, handed to the right child.
//!
//! Children are only created for non-empty groups. A group that has gone
//! through `k` middle splits in a row has the same coordinates on every
//! axis; it is not split further and is summarised in the node's boundary
//! [`Statistics`] instead. With a single dimension this happens at every
//! node.
//!
//! Because the median lies between the two middle values, neither `less`
//! nor `greater` holds more than half of the node's rows, and at most
//! `k - 1` middle splits separate two such halvings. The depth is therefore
//! bounded by `k * (log2(n) + 1)`.
//!
//! # Query
//!
//! A query compares the node's median with the region's interval on the
//! node's axis only. When the median lies inside the interval, the boundary
//! is counted and the middle child is visited; each side child is visited
//! only when the interval reaches past the median on its side. Every row is
//! thus counted only after all of its coordinates have been checked.
//!
//! # Concurrency
//!
//! The tree is immutable once built; every query allocates its own result,
//! so a shared `&KdTree` can be queried from many threads at once. With the
//! `parallel` feature, large subtrees are built with `rayon::join` and
//! [`KdTree::query_many`] answers batches on the rayon pool.

use std::collections::HashSet;
use std::fmt;

use crate::error::{KdSearchError, Result};
use crate::region::{Interval, Region};
use crate::source::ColumnSource;
use crate::stats::{self, Statistics};

/// Subsets larger than this build their children concurrently.
#[cfg(feature = "parallel")]
const PARALLEL_BUILD_THRESHOLD: usize = 1024;

type Branch = Option<Box<Node>>;

/// One split of the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    axis: usize,
    median: f64,
    boundary: Statistics,
    left: Branch,
    middle: Branch,
    right: Branch,
}

impl Node {
    /// Index of the split dimension in [`KdTree::dimensions`].
    pub fn axis(&self) -> usize {
        self.axis
    }

    /// Split value on [`axis`](Node::axis).
    pub fn median(&self) -> f64 {
        self.median
    }

    /// Objective statistics of the rows on the median that share the same
    /// coordinates on every axis. Empty when the node has a middle child.
    pub fn boundary(&self) -> &Statistics {
        &self.boundary
    }

    /// Subtree of the rows strictly below the median.
    pub fn left(&self) -> Option<&Node> {
        self.left.as_deref()
    }

    /// Subtree of the rows exactly on the median, split on the next axis.
    pub fn middle(&self) -> Option<&Node> {
        self.middle.as_deref()
    }

    /// Subtree of the rows strictly above the median.
    pub fn right(&self) -> Option<&Node> {
        self.right.as_deref()
    }

    /// Returns `true` if the node has no children.
    pub fn is_leaf(&self) -> bool {
        self.left.is_none() && self.middle.is_none() && self.right.is_none()
    }

    /// Objective statistics of every row in this subtree.
    pub fn subtree_stats(&self) -> Statistics {
        self.children()
            .map(Node::subtree_stats)
            .fold(self.boundary, Statistics::merged)
    }

    fn children(&self) -> impl Iterator<Item = &Node> {
        self.left()
            .into_iter()
            .chain(self.middle())
            .chain(self.right())
    }

    fn node_count(&self) -> usize {
        1 + self.children().map(Node::node_count).sum::<usize>()
    }

    fn depth(&self) -> usize {
        1 + self.children().map(Node::depth).max().unwrap_or(0)
    }

    /// `bounds` is the region resolved against the tree's dimension list.
    fn query(&self, bounds: &[Option<Interval>], dimensions: &[String]) -> Result<Statistics> {
        let interval = bounds[self.axis]
            .ok_or_else(|| KdSearchError::UnknownDimension(dimensions[self.axis].clone()))?;

        let mut stats = Statistics::new();
        if interval.contains(self.median) {
            stats.merge(&self.boundary);
            if let Some(middle) = &self.middle {
                stats.merge(&middle.query(bounds, dimensions)?);
            }
        }
        if let Some(left) = &self.left {
            if interval.min() < self.median {
                stats.merge(&left.query(bounds, dimensions)?);
            }
        }
        if let Some(right) = &self.right {
            if interval.max() > self.median {
                stats.merge(&right.query(bounds, dimensions)?);
            }
        }
        Ok(stats)
    }
}

/// Immutable k-d tree answering range queries with [`Statistics`] over an
/// objective column.
///
/// # Examples
/// ```
/// use kd_search::{ColumnTable, KdTree, Region, Statistics};
///
/// // Three points (1,3), (2,3) and (3,4)
/// let table = ColumnTable::new()
///     .with_column("x", vec![1.0, 2.0, 3.0])?
///     .with_column("y", vec![3.0, 3.0, 4.0])?
///     .with_column("target", vec![0.0, 1.0, 1.0])?;
/// let tree = KdTree::build(&table, &["x", "y"], "target")?;
/// assert_eq!(tree.to_string(), "<KdTree of dimension 2>");
///
/// // All points with x in [0, 10] and y in [0, 3], inclusive
/// let region = Region::new().with("x", 0.0, 10.0)?.with("y", 0.0, 3.0)?;
/// assert_eq!(tree.query(&region)?, Statistics::with(1.0, 2));
///
/// let region = Region::new().with("x", 0.0, 10.0)?.with("y", 0.0, 10.0)?;
/// assert_eq!(tree.query(&region)?, Statistics::with(2.0, 3));
///
/// let region = Region::new().with("x", 5.0, 10.0)?.with("y", 5.0, 10.0)?;
/// assert_eq!(tree.query(&region)?, Statistics::with(0.0, 0));
/// # Ok::<(), kd_search::KdSearchError>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct KdTree {
    dimensions: Vec<String>,
    objective: String,
    first_dimension: usize,
    len: usize,
    root: Node,
}

impl KdTree {
    /// Builds a tree over `source`, splitting on `dimensions` in order and
    /// aggregating the `objective` column.
    ///
    /// Shorthand for [`KdTreeBuilder::new`] followed by
    /// [`KdTreeBuilder::build`].
    ///
    /// # Errors
    /// See [`KdTreeBuilder::build`].
    pub fn build<S, N>(source: &S, dimensions: &[N], objective: &str) -> Result<Self>
    where
        S: ColumnSource + ?Sized,
        N: AsRef<str>,
    {
        KdTreeBuilder::new(dimensions, objective).build(source)
    }

    /// Aggregates the objective over the rows inside `region`.
    ///
    /// Bounds are inclusive. Dimensions are looked up only when the walk
    /// reaches a node splitting on them; bounds for dimensions the tree does
    /// not know are ignored.
    ///
    /// # Errors
    /// [`KdSearchError::UnknownDimension`] if a visited node splits on a
    /// dimension `region` does not bound. No partial result is returned.
    pub fn query(&self, region: &Region) -> Result<Statistics> {
        let bounds: Vec<Option<Interval>> = self
            .dimensions
            .iter()
            .map(|name| region.get(name))
            .collect();
        self.root.query(&bounds, &self.dimensions)
    }

    /// Answers a batch of queries, on the rayon pool with the `parallel`
    /// feature.
    ///
    /// # Errors
    /// The error of the first failing region, in input order.
    pub fn query_many(&self, regions: &[Region]) -> Result<Vec<Statistics>> {
        tracing::trace!(regions = regions.len(), "answering query batch");

        #[cfg(feature = "parallel")]
        let results: Vec<Result<Statistics>> = {
            use rayon::prelude::*;
            regions.par_iter().map(|region| self.query(region)).collect()
        };
        #[cfg(not(feature = "parallel"))]
        let results: Vec<Result<Statistics>> =
            regions.iter().map(|region| self.query(region)).collect();

        results.into_iter().collect()
    }

    /// Split dimensions, indexed by [`Node::axis`].
    pub fn dimensions(&self) -> &[String] {
        &self.dimensions
    }

    /// Name of the split dimension of `node`.
    pub fn dimension(&self, node: &Node) -> &str {
        &self.dimensions[node.axis]
    }

    /// Name of the aggregated column.
    pub fn objective(&self) -> &str {
        &self.objective
    }

    /// Axis index the root splits on.
    pub fn first_dimension(&self) -> usize {
        self.first_dimension
    }

    /// Number of indexed rows.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always `false`: a tree cannot be built from an empty dataset.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Top node of the tree.
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Number of levels; a single node has depth 1.
    pub fn depth(&self) -> usize {
        self.root.depth()
    }

    /// Number of nodes, leaves included.
    pub fn node_count(&self) -> usize {
        self.root.node_count()
    }

    /// Objective statistics of the whole dataset.
    pub fn total(&self) -> Statistics {
        self.root.subtree_stats()
    }
}

impl fmt::Display for KdTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<KdTree of dimension {}>", self.dimensions.len())
    }
}

/// Configures and builds a [`KdTree`].
///
/// ```
/// use kd_search::{ColumnTable, KdTreeBuilder};
///
/// let table = ColumnTable::from_rows(
///     &["x", "y", "target"],
///     [[1.0, 3.0, 0.0], [2.0, 3.0, 1.0], [3.0, 4.0, 1.0]],
/// )?;
/// let tree = KdTreeBuilder::new(&["x", "y"], "target")
///     .first_dimension(1)
///     .build(&table)?;
/// assert_eq!(tree.dimension(tree.root()), "y");
/// # Ok::<(), kd_search::KdSearchError>(())
/// ```
#[derive(Debug, Clone)]
pub struct KdTreeBuilder {
    dimensions: Vec<String>,
    objective: String,
    first_dimension: usize,
    #[cfg(feature = "parallel")]
    parallel: bool,
}

impl KdTreeBuilder {
    /// Starts a builder splitting on `dimensions` and aggregating
    /// `objective`.
    pub fn new<N: AsRef<str>>(dimensions: &[N], objective: impl Into<String>) -> Self {
        Self {
            dimensions: dimensions.iter().map(|name| name.as_ref().to_owned()).collect(),
            objective: objective.into(),
            first_dimension: 0,
            #[cfg(feature = "parallel")]
            parallel: true,
        }
    }

    /// Index of the dimension the root splits on (default 0), taken modulo
    /// the number of dimensions.
    pub fn first_dimension(mut self, index: usize) -> Self {
        self.first_dimension = index;
        self
    }

    /// Builds large subtrees concurrently (default `true`).
    #[cfg(feature = "parallel")]
    pub fn parallel(mut self, enabled: bool) -> Self {
        self.parallel = enabled;
        self
    }

    /// Builds the tree. `source` is only read.
    ///
    /// # Errors
    /// Checked in this order:
    /// - [`KdSearchError::NoDimensions`] if no dimension was given;
    /// - [`KdSearchError::DuplicateDimension`] if a name repeats;
    /// - [`KdSearchError::EmptyDataset`] if `source` has no rows;
    /// - [`KdSearchError::UnknownColumn`] if a dimension or the objective
    ///   is missing from `source`;
    /// - [`KdSearchError::ColumnLength`] if such a column is not one value
    ///   per row;
    /// - [`KdSearchError::NanCoordinate`] if a dimension column holds NaN.
    pub fn build<S: ColumnSource + ?Sized>(&self, source: &S) -> Result<KdTree> {
        if self.dimensions.is_empty() {
            return Err(KdSearchError::NoDimensions);
        }
        let mut seen = HashSet::with_capacity(self.dimensions.len());
        if let Some(name) = self.dimensions.iter().find(|name| !seen.insert(name.as_str())) {
            return Err(KdSearchError::DuplicateDimension(name.clone()));
        }
        let rows = source.row_count();
        if rows == 0 {
            return Err(KdSearchError::EmptyDataset);
        }

        let axes = self
            .dimensions
            .iter()
            .map(|name| {
                let column = column_checked(source, name, rows)?;
                if column.iter().any(|value| value.is_nan()) {
                    return Err(KdSearchError::NanCoordinate(name.clone()));
                }
                Ok(column)
            })
            .collect::<Result<Vec<_>>>()?;
        let objective = column_checked(source, &self.objective, rows)?;

        let first_dimension = self.first_dimension % self.dimensions.len();
        let splitter = Splitter {
            axes,
            objective,
            first_dimension,
            #[cfg(feature = "parallel")]
            parallel: self.parallel,
        };
        let root = splitter.split((0..rows).collect(), 0, 0);

        let tree = KdTree {
            dimensions: self.dimensions.clone(),
            objective: self.objective.clone(),
            first_dimension,
            len: rows,
            root,
        };
        tracing::debug!(
            rows,
            dimensions = tree.dimensions.len(),
            nodes = tree.node_count(),
            depth = tree.depth(),
            "built kd-tree"
        );
        Ok(tree)
    }
}

fn column_checked<'a, S: ColumnSource + ?Sized>(
    source: &'a S,
    name: &str,
    rows: usize,
) -> Result<&'a [f64]> {
    let column = source
        .column(name)
        .ok_or_else(|| KdSearchError::UnknownColumn(name.to_owned()))?;
    if column.len() != rows {
        return Err(KdSearchError::ColumnLength {
            name: name.to_owned(),
            expected: rows,
            actual: column.len(),
        });
    }
    Ok(column)
}

/// Validated columns shared by every recursive split.
struct Splitter<'a> {
    axes: Vec<&'a [f64]>,
    objective: &'a [f64],
    first_dimension: usize,
    #[cfg(feature = "parallel")]
    parallel: bool,
}

impl Splitter<'_> {
    /// `rows` is non-empty. `constant_axes` counts the middle splits that
    /// led here directly, i.e. the preceding axes on which every row of
    /// `rows` has the same coordinate.
    fn split(&self, rows: Vec<usize>, depth: usize, constant_axes: usize) -> Node {
        let axis = (self.first_dimension + depth) % self.axes.len();
        let coords = self.axes[axis];

        let mut scratch: Vec<f64> = rows.iter().map(|&row| coords[row]).collect();
        let median = stats::median_in_place(&mut scratch)
            .expect("rows are non-empty and NaN coordinates are rejected before splitting");

        let mut less = Vec::new();
        let mut equal = Vec::new();
        let mut greater = Vec::new();
        for row in rows {
            let value = coords[row];
            if value < median {
                less.push(row);
            } else if value > median {
                greater.push(row);
            } else {
                equal.push(row);
            }
        }

        // identical on every axis: nothing left to split
        let mut boundary = Statistics::new();
        if constant_axes + 1 == self.axes.len() {
            scratch.clear();
            scratch.extend(equal.drain(..).map(|row| self.objective[row]));
            boundary = Statistics::from_values(&scratch);
        }

        let (left, middle, right) =
            self.children(less, equal, greater, depth + 1, constant_axes + 1);
        Node {
            axis,
            median,
            boundary,
            left,
            middle,
            right,
        }
    }

    fn subtree(&self, rows: Vec<usize>, depth: usize, constant_axes: usize) -> Branch {
        if rows.is_empty() {
            None
        } else {
            Some(Box::new(self.split(rows, depth, constant_axes)))
        }
    }

    #[cfg(feature = "parallel")]
    fn children(
        &self,
        less: Vec<usize>,
        equal: Vec<usize>,
        greater: Vec<usize>,
        depth: usize,
        constant_axes: usize,
    ) -> (Branch, Branch, Branch) {
        if self.parallel && less.len() + equal.len() + greater.len() > PARALLEL_BUILD_THRESHOLD {
            let (left, (middle, right)) = rayon::join(
                || self.subtree(less, depth, 0),
                || {
                    rayon::join(
                        || self.subtree(equal, depth, constant_axes),
                        || self.subtree(greater, depth, 0),
                    )
                },
            );
            (left, middle, right)
        } else {
            (
                self.subtree(less, depth, 0),
                self.subtree(equal, depth, constant_axes),
                self.subtree(greater, depth, 0),
            )
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn children(
        &self,
        less: Vec<usize>,
        equal: Vec<usize>,
        greater: Vec<usize>,
        depth: usize,
        constant_axes: usize,
    ) -> (Branch, Branch, Branch) {
        (
            self.subtree(less, depth, 0),
            self.subtree(equal, depth, constant_axes),
            self.subtree(greater, depth, 0),
        )
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::source::ColumnTable;
    use proptest::prelude::*;

    /// Small integer coordinates so that duplicates and boundary hits are
    /// common; integer targets keep sums exact.
    fn dataset() -> impl Strategy<Value = (usize, Vec<Vec<i32>>)> {
        (1_usize..=4).prop_flat_map(|dims| {
            (
                Just(dims),
                proptest::collection::vec(proptest::collection::vec(-10_i32..10, dims + 1), 1..80),
            )
        })
    }

    fn to_table(dims: usize, rows: &[Vec<i32>]) -> (ColumnTable, Vec<String>) {
        let mut names: Vec<String> = (0..dims).map(|d| format!("d{d}")).collect();
        names.push("target".into());
        let rows = rows
            .iter()
            .map(|row| row.iter().copied().map(f64::from).collect::<Vec<f64>>());
        let table = ColumnTable::from_rows(&names, rows).unwrap();
        names.pop();
        (table, names)
    }

    fn bounds(dims: usize) -> impl Strategy<Value = Vec<(i32, i32)>> {
        proptest::collection::vec((-12_i32..12, -12_i32..12), dims)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(300))]

        // --- query agrees with a full scan ---
        #[test]
        fn query_matches_brute_force(
            (dims, rows) in dataset(),
            raw in bounds(4),
            first in 0_usize..4,
        ) {
            let (table, names) = to_table(dims, &rows);
            let tree = KdTreeBuilder::new(&names, "target")
                .first_dimension(first)
                .build(&table)
                .unwrap();

            let mut region = Region::new();
            for (name, &(a, b)) in names.iter().zip(&raw) {
                let interval = Interval::new(a.min(b).into(), a.max(b).into()).unwrap();
                region.insert(name.as_str(), interval);
            }

            let mut expected = Statistics::new();
            for row in &rows {
                let inside = row[..dims]
                    .iter()
                    .zip(&raw)
                    .all(|(&v, &(a, b))| a.min(b) <= v && v <= a.max(b));
                if inside {
                    expected.push(f64::from(row[dims]));
                }
            }
            prop_assert_eq!(tree.query(&region).unwrap(), expected);
        }

        // --- every row lands in exactly one boundary ---
        #[test]
        fn boundaries_partition_rows((dims, rows) in dataset()) {
            let (table, names) = to_table(dims, &rows);
            let tree = KdTree::build(&table, &names, "target").unwrap();

            let mut stack = vec![tree.root()];
            let mut counted = 0_u64;
            while let Some(node) = stack.pop() {
                counted += node.boundary().len();
                stack.extend(node.left());
                stack.extend(node.middle());
                stack.extend(node.right());
            }
            prop_assert_eq!(counted, rows.len() as u64);

            let total: i32 = rows.iter().map(|row| row[dims]).sum();
            prop_assert_eq!(tree.total(), Statistics::with(f64::from(total), rows.len() as u64));
        }

        // --- bounding box returns totals, anything outside it returns nothing ---
        #[test]
        fn full_and_disjoint_regions((dims, rows) in dataset(), axis in 0_usize..4) {
            let (table, names) = to_table(dims, &rows);
            let tree = KdTree::build(&table, &names, "target").unwrap();

            let everything = Region::covering(&table, &names).unwrap();
            prop_assert_eq!(tree.query(&everything).unwrap(), tree.total());

            let axis = &names[axis % dims];
            let above = everything.get(axis).unwrap().max() + 1.0;
            let mut disjoint = everything.clone();
            disjoint.insert(axis.as_str(), Interval::new(above, above + 5.0).unwrap());
            prop_assert_eq!(tree.query(&disjoint).unwrap(), Statistics::new());
        }

        // --- depth stays logarithmic on each axis ---
        #[test]
        fn depth_is_logarithmic((dims, rows) in dataset()) {
            let (table, names) = to_table(dims, &rows);
            let tree = KdTree::build(&table, &names, "target").unwrap();
            let bound = dims * ((rows.len() as f64).log2().floor() as usize + 1);
            prop_assert!(tree.depth() <= bound, "depth {} > {}", tree.depth(), bound);
        }
    }
}
