//! Query regions: one inclusive interval per dimension.
//!
//! An [`Interval`] is validated on construction (`min <= max`, no NaN), so
//! the tree walk never has to reason about inverted bounds. A [`Region`]
//! maps dimension names to intervals; only the dimensions a query actually
//! reaches have to be present.

use std::collections::BTreeMap;

use crate::error::{KdSearchError, Result};
use crate::source::ColumnSource;
use crate::stats;

/// Closed interval `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "[f64; 2]", into = "[f64; 2]")
)]
pub struct Interval {
    min: f64,
    max: f64,
}

impl Interval {
    /// Creates `[min, max]`.
    ///
    /// # Errors
    /// [`KdSearchError::InvalidInterval`] if `min > max` or either bound is
    /// NaN. Infinite bounds are allowed.
    pub fn new(min: f64, max: f64) -> Result<Self> {
        if min.is_nan() || max.is_nan() || min > max {
            return Err(KdSearchError::InvalidInterval { min, max });
        }
        Ok(Self { min, max })
    }

    /// The degenerate interval `[value, value]`.
    pub fn point(value: f64) -> Result<Self> {
        Self::new(value, value)
    }

    /// `[-inf, +inf]`.
    pub const fn unbounded() -> Self {
        Self {
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
        }
    }

    /// Lower bound, inclusive.
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Upper bound, inclusive.
    pub fn max(&self) -> f64 {
        self.max
    }

    /// Inclusive on both ends.
    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }
}

impl TryFrom<(f64, f64)> for Interval {
    type Error = KdSearchError;

    fn try_from((min, max): (f64, f64)) -> Result<Self> {
        Self::new(min, max)
    }
}

impl TryFrom<[f64; 2]> for Interval {
    type Error = KdSearchError;

    fn try_from([min, max]: [f64; 2]) -> Result<Self> {
        Self::new(min, max)
    }
}

impl From<Interval> for [f64; 2] {
    fn from(interval: Interval) -> Self {
        [interval.min, interval.max]
    }
}

/// Axis-aligned box given as dimension name → [`Interval`].
///
/// # Examples
/// ```
/// use kd_search::{Interval, Region};
///
/// let region = Region::new()
///     .with("x", 0.0, 10.0)?
///     .with("y", 0.0, 3.0)?;
/// assert_eq!(region.get("y"), Some(Interval::new(0.0, 3.0)?));
/// assert!(region.get("z").is_none());
/// assert!(Region::new().with("x", 1.0, 0.0).is_err());
/// # Ok::<(), kd_search::KdSearchError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct Region {
    bounds: BTreeMap<String, Interval>,
}

impl Region {
    /// Creates a region with no bounds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `[min, max]` on `dimension`, replacing any previous bound.
    pub fn with(mut self, dimension: impl Into<String>, min: f64, max: f64) -> Result<Self> {
        self.insert(dimension, Interval::new(min, max)?);
        Ok(self)
    }

    /// Sets the bound of `dimension`, returning the one it replaces.
    pub fn insert(&mut self, dimension: impl Into<String>, interval: Interval) -> Option<Interval> {
        self.bounds.insert(dimension.into(), interval)
    }

    /// The bound on `dimension`, if any.
    pub fn get(&self, dimension: &str) -> Option<Interval> {
        self.bounds.get(dimension).copied()
    }

    /// Returns `true` if `dimension` is bounded.
    pub fn contains(&self, dimension: &str) -> bool {
        self.bounds.contains_key(dimension)
    }

    /// Bounds in dimension-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Interval)> {
        self.bounds.iter().map(|(name, interval)| (name.as_str(), *interval))
    }

    /// Number of bounded dimensions.
    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    /// Returns `true` if no dimension is bounded.
    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    /// The bounding box of `dimensions` in `source`: a region that matches
    /// every row.
    ///
    /// # Errors
    /// - [`KdSearchError::UnknownColumn`] if a dimension is missing.
    /// - [`KdSearchError::EmptyDataset`] if the source has no rows.
    /// - [`KdSearchError::NanCoordinate`] if a column contains NaN.
    pub fn covering<S, N>(source: &S, dimensions: &[N]) -> Result<Self>
    where
        S: ColumnSource + ?Sized,
        N: AsRef<str>,
    {
        let mut region = Self::new();
        for name in dimensions {
            let name = name.as_ref();
            let column = source
                .column(name)
                .ok_or_else(|| KdSearchError::UnknownColumn(name.to_string()))?;
            if column.is_empty() {
                return Err(KdSearchError::EmptyDataset);
            }
            let (Some(lo), Some(hi)) = (stats::min(column), stats::max(column)) else {
                return Err(KdSearchError::NanCoordinate(name.to_string()));
            };
            region.insert(name, Interval { min: lo, max: hi });
        }
        Ok(region)
    }

    /// Returns `true` if every bound of the region admits the matching
    /// value of `point`; dimensions the region does not bound are ignored.
    pub fn contains_point<'a>(&self, point: impl IntoIterator<Item = (&'a str, f64)>) -> bool {
        point
            .into_iter()
            .all(|(name, value)| self.get(name).map_or(true, |interval| interval.contains(value)))
    }
}

impl<S: Into<String>> FromIterator<(S, Interval)> for Region {
    fn from_iter<I: IntoIterator<Item = (S, Interval)>>(iter: I) -> Self {
        Self {
            bounds: iter
                .into_iter()
                .map(|(name, interval)| (name.into(), interval))
                .collect(),
        }
    }
}
