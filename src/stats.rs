//! Aggregate statistics and the order statistics used to split the tree.
//!
//! [`Statistics`] stands in for a multiset of real values by keeping only
//! their sum and count. Two accumulators merge by adding both fields, so
//! any partition of a set can be summarised piecewise and recombined in
//! any order.
//!
//! # Algorithms
//!
//! - **Sum**: Neumaier compensated summation for the values of one node.
//! - **Median**: selection (`select_nth_unstable_by`) in O(n) expected
//!   time; even-length input yields the average of the two middle values.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// Returns the minimum value in the slice.
///
/// # Returns
/// - `None` if `data` is empty or contains NaN.
///
/// # Examples
/// ```
/// use kd_search::stats::min;
/// assert_eq!(min(&[3.0, 1.0, 4.0, 1.0, 5.0]), Some(1.0));
/// ```
pub fn min(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    data.iter().copied().try_fold(f64::INFINITY, |acc, x| {
        if x.is_nan() {
            None
        } else {
            Some(acc.min(x))
        }
    })
}

/// Returns the maximum value in the slice.
///
/// # Returns
/// - `None` if `data` is empty or contains NaN.
///
/// # Examples
/// ```
/// use kd_search::stats::max;
/// assert_eq!(max(&[3.0, 1.0, 4.0, 1.0, 5.0]), Some(5.0));
/// ```
pub fn max(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    data.iter().copied().try_fold(f64::NEG_INFINITY, |acc, x| {
        if x.is_nan() {
            None
        } else {
            Some(acc.max(x))
        }
    })
}

/// Computes the median of `data` without mutating the input.
///
/// Copies the data and delegates to [`median_in_place`].
///
/// # Complexity
/// Time: O(n) expected, Space: O(n)
///
/// # Returns
/// - `None` if `data` is empty or contains NaN.
///
/// # Examples
/// ```
/// use kd_search::stats::median;
/// assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
/// assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
/// ```
pub fn median(data: &[f64]) -> Option<f64> {
    let mut scratch = data.to_vec();
    median_in_place(&mut scratch)
}

/// Computes the median of `data`, reordering the slice.
///
/// Odd length: the middle element. Even length: the average of the two
/// middle elements. The result always lies in `[lower_middle, upper_middle]`,
/// so at most half of the values are strictly below it and at most half
/// strictly above it.
///
/// # Complexity
/// Time: O(n) expected, Space: O(1)
///
/// # Returns
/// - `None` if `data` is empty or contains NaN.
pub fn median_in_place(data: &mut [f64]) -> Option<f64> {
    let n = data.len();
    if n == 0 || data.iter().any(|x| x.is_nan()) {
        return None;
    }
    let mid = n / 2;
    let (lower, upper, _) =
        data.select_nth_unstable_by(mid, |a, b| a.partial_cmp(b).expect("NaN filtered above"));
    let upper = *upper;
    if n % 2 == 1 {
        return Some(upper);
    }
    let lower = lower.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Some(midpoint(lower, upper))
}

/// Average of `lo <= hi` that stays inside `[lo, hi]` even when `lo + hi`
/// overflows.
fn midpoint(lo: f64, hi: f64) -> f64 {
    let mid = (lo + hi) / 2.0;
    if mid.is_finite() {
        return mid;
    }
    let halves = lo / 2.0 + hi / 2.0;
    // -inf and +inf: any value in the closed range keeps the split valid
    if halves.is_nan() {
        lo
    } else {
        halves
    }
}

// ---------------------------------------------------------------------------
// Kahan compensated summation
// ---------------------------------------------------------------------------

/// Neumaier compensated summation for O(ε) error independent of `n`.
///
/// This is an improved variant of Kahan summation that also handles the
/// case where the addend is larger in magnitude than the running sum.
/// Once the running sum leaves the finite range the compensation term is
/// meaningless and the plain sum is returned.
///
/// Reference: Neumaier (1974), "Rundungsfehleranalyse einiger Verfahren
/// zur Summation endlicher Summen", *Zeitschrift für Angewandte
/// Mathematik und Mechanik* 54(1), pp. 39–51.
///
/// # Complexity
/// Time: O(n), Space: O(1)
pub fn kahan_sum(data: &[f64]) -> f64 {
    let mut sum = 0.0_f64;
    let mut c = 0.0_f64;
    for &x in data {
        let t = sum + x;
        if sum.abs() >= x.abs() {
            c += (sum - t) + x;
        } else {
            c += (x - t) + sum;
        }
        sum = t;
    }
    if sum.is_finite() {
        sum + c
    } else {
        sum
    }
}

// ---------------------------------------------------------------------------
// Statistics accumulator
// ---------------------------------------------------------------------------

/// Sum and count of a multiset of values, from which the mean is derived.
///
/// The empty accumulator ([`Statistics::new`]) is the identity of
/// [`merge`](Statistics::merge); merging is associative and commutative.
/// The count saturates at `u64::MAX` instead of wrapping.
///
/// # Examples
/// ```
/// use kd_search::Statistics;
///
/// let mut stats = Statistics::with(1.0, 1);
/// stats.merge(&Statistics::with(1.0, 2));
/// assert_eq!(stats, Statistics::with(2.0, 3));
/// assert_eq!(stats.to_string(), "Statistics(sum=2, length=3)");
///
/// assert_eq!(Statistics::from_values(&[1.0, 2.0, 3.0]), Statistics::with(6.0, 3));
/// assert_eq!(Statistics::new().mean(), 0.0);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Statistics {
    sum: f64,
    length: u64,
}

impl Statistics {
    /// Creates the accumulator of the empty set.
    pub const fn new() -> Self {
        Self {
            sum: 0.0,
            length: 0,
        }
    }

    /// Creates an accumulator with the given sum and count.
    pub const fn with(sum: f64, length: u64) -> Self {
        Self { sum, length }
    }

    /// Summarises a slice of values. An empty slice gives the empty
    /// accumulator.
    pub fn from_values(values: &[f64]) -> Self {
        Self {
            sum: kahan_sum(values),
            length: values.len() as u64,
        }
    }

    /// Adds a single observation.
    pub fn push(&mut self, value: f64) {
        self.sum += value;
        self.length = self.length.saturating_add(1);
    }

    /// Folds `other` into `self`.
    pub fn merge(&mut self, other: &Statistics) {
        self.sum += other.sum;
        self.length = self.length.saturating_add(other.length);
    }

    /// Pure form of [`merge`](Statistics::merge).
    #[must_use]
    pub fn merged(mut self, other: Statistics) -> Self {
        self.merge(&other);
        self
    }

    /// Sum of the represented values.
    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Number of represented values.
    pub fn len(&self) -> u64 {
        self.length
    }

    /// Returns `true` if no value is represented.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Mean of the represented values, or `0.0` for the empty set.
    pub fn mean(&self) -> f64 {
        if self.length == 0 {
            0.0
        } else {
            self.sum / self.length as f64
        }
    }

    /// Equality with the sums compared within `epsilon` (absolute).
    pub fn approx_eq(&self, other: &Statistics, epsilon: f64) -> bool {
        self.length == other.length && (self.sum - other.sum).abs() <= epsilon
    }
}

/// The sum is printed like C's `%g`: six significant digits, trailing
/// zeros dropped, exponent form outside `[1e-4, 1e6)`.
impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Statistics(sum={}, length={})",
            format_general(self.sum),
            self.length
        )
    }
}

fn format_general(value: f64) -> String {
    if value.is_nan() {
        return "nan".into();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.into();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.into();
    }

    // rounding to six digits first fixes the exponent, as printf does
    let scientific = format!("{value:.5e}");
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        return scientific;
    };

    if (-4..6).contains(&exponent) {
        let decimals = (5 - exponent) as usize;
        trim_fraction(&format!("{value:.decimals$}")).to_owned()
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{sign}{:02}", trim_fraction(mantissa), exponent.abs())
    }
}

fn trim_fraction(digits: &str) -> &str {
    if digits.contains('.') {
        digits.trim_end_matches('0').trim_end_matches('.')
    } else {
        digits
    }
}

impl Add for Statistics {
    type Output = Statistics;

    fn add(self, rhs: Statistics) -> Statistics {
        self.merged(rhs)
    }
}

impl AddAssign for Statistics {
    fn add_assign(&mut self, rhs: Statistics) {
        self.merge(&rhs);
    }
}

impl Sum for Statistics {
    fn sum<I: Iterator<Item = Statistics>>(iter: I) -> Self {
        iter.fold(Statistics::new(), Statistics::merged)
    }
}

impl<'a> Sum<&'a Statistics> for Statistics {
    fn sum<I: Iterator<Item = &'a Statistics>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl FromIterator<f64> for Statistics {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut stats = Statistics::new();
        stats.extend(iter);
        stats
    }
}

impl Extend<f64> for Statistics {
    fn extend<I: IntoIterator<Item = f64>>(&mut self, iter: I) {
        for value in iter {
            self.push(value);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // --- min / max ---

    #[test]
    fn test_min_max() {
        let v = [3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0];
        assert_eq!(min(&v), Some(1.0));
        assert_eq!(max(&v), Some(9.0));
    }

    #[test]
    fn test_min_max_empty() {
        assert_eq!(min(&[]), None);
        assert_eq!(max(&[]), None);
    }

    #[test]
    fn test_min_max_nan() {
        assert_eq!(min(&[1.0, f64::NAN]), None);
        assert_eq!(max(&[1.0, f64::NAN]), None);
    }

    // --- median ---

    #[test]
    fn test_median_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
    }

    #[test]
    fn test_median_even() {
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
    }

    #[test]
    fn test_median_even_equal_middles() {
        assert_eq!(median(&[3.0, 1.0, 3.0, 5.0]), Some(3.0));
    }

    #[test]
    fn test_median_single() {
        assert_eq!(median(&[7.0]), Some(7.0));
    }

    #[test]
    fn test_median_empty() {
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_median_nan() {
        assert_eq!(median(&[1.0, f64::NAN, 2.0]), None);
    }

    #[test]
    fn test_median_does_not_overflow() {
        let m = median(&[f64::MAX, f64::MAX]).unwrap();
        assert_eq!(m, f64::MAX);
        let m = median(&[f64::MAX * 0.75, f64::MAX]).unwrap();
        assert!(m.is_finite());
        assert!(m >= f64::MAX * 0.75);
    }

    #[test]
    fn test_median_infinite_pair() {
        let m = median(&[f64::NEG_INFINITY, f64::INFINITY]).unwrap();
        assert!(!m.is_nan());
    }

    // --- kahan_sum ---

    #[test]
    fn test_kahan_sum_basic() {
        let v = [1.0, 2.0, 3.0];
        assert!((kahan_sum(&v) - 6.0).abs() < 1e-15);
    }

    #[test]
    fn test_kahan_sum_precision() {
        // Sum of 1e16 + 1.0 + (-1e16) with naive sum loses the 1.0
        let v = [1e16, 1.0, -1e16];
        let result = kahan_sum(&v);
        assert!(
            (result - 1.0).abs() < 1e-10,
            "Kahan sum should preserve the 1.0: got {result}"
        );
    }

    #[test]
    fn test_kahan_sum_infinite() {
        assert_eq!(kahan_sum(&[1.0, f64::INFINITY]), f64::INFINITY);
    }

    // --- Statistics ---

    #[test]
    fn test_statistics_empty() {
        let stats = Statistics::new();
        assert_eq!(stats.sum(), 0.0);
        assert_eq!(stats.len(), 0);
        assert!(stats.is_empty());
        assert_eq!(stats.mean(), 0.0);
        assert_eq!(stats, Statistics::default());
    }

    #[test]
    fn test_statistics_from_values() {
        assert_eq!(
            Statistics::from_values(&[1.0, 2.0, 3.0]),
            Statistics::with(6.0, 3)
        );
        assert_eq!(Statistics::from_values(&[]), Statistics::with(0.0, 0));
    }

    #[test]
    fn test_statistics_merge() {
        let mut stats = Statistics::with(1.0, 1);
        stats.merge(&Statistics::with(1.0, 2));
        assert_eq!(stats, Statistics::with(2.0, 3));
    }

    #[test]
    fn test_statistics_count_saturates() {
        let mut stats = Statistics::with(0.0, u64::MAX);
        stats.merge(&Statistics::with(0.0, 1));
        assert_eq!(stats.len(), u64::MAX);
        stats.push(1.0);
        assert_eq!(stats.len(), u64::MAX);
        assert_eq!((stats + Statistics::with(0.0, u64::MAX)).len(), u64::MAX);
    }

    #[test]
    fn test_statistics_mean() {
        assert_eq!(Statistics::with(1.0, 2).mean(), 0.5);
        assert_eq!(Statistics::with(0.0, 0).mean(), 0.0);
    }

    #[test]
    fn test_statistics_push_and_collect() {
        let mut stats = Statistics::new();
        stats.push(2.0);
        stats.push(4.0);
        assert_eq!(stats, Statistics::with(6.0, 2));

        let collected: Statistics = [2.0, 4.0].into_iter().collect();
        assert_eq!(collected, stats);
    }

    #[test]
    fn test_statistics_operators() {
        let a = Statistics::with(1.0, 1);
        let b = Statistics::with(2.5, 4);
        assert_eq!(a + b, Statistics::with(3.5, 5));

        let mut c = a;
        c += b;
        assert_eq!(c, a + b);

        let total: Statistics = [a, b, Statistics::new()].iter().sum();
        assert_eq!(total, Statistics::with(3.5, 5));
    }

    #[test]
    fn test_statistics_display() {
        assert_eq!(Statistics::new().to_string(), "Statistics(sum=0, length=0)");
        assert_eq!(
            Statistics::with(3.0, 5).to_string(),
            "Statistics(sum=3, length=5)"
        );
        assert_eq!(
            Statistics::with(0.25, 1).to_string(),
            "Statistics(sum=0.25, length=1)"
        );
    }

    #[test]
    fn test_statistics_display_significant_digits() {
        let cases = [
            (1e20, "1e+20"),
            (1e-7, "1e-07"),
            (2.0, "2"),
            (0.25, "0.25"),
            (1_234_567.0, "1.23457e+06"),
            (123_456.0, "123456"),
            (100_000.0, "100000"),
            (999_999.5, "1e+06"),
            (0.0001, "0.0001"),
            (0.1 + 0.2, "0.3"),
            (-3.5, "-3.5"),
            (-0.0, "-0"),
            (f64::INFINITY, "inf"),
            (f64::NEG_INFINITY, "-inf"),
            (f64::NAN, "nan"),
        ];
        for (sum, expected) in cases {
            assert_eq!(
                Statistics::with(sum, 1).to_string(),
                format!("Statistics(sum={expected}, length=1)"),
                "sum = {sum:?}"
            );
        }
    }

    #[test]
    fn test_statistics_approx_eq() {
        let a = Statistics::with(0.1 + 0.2, 2);
        let b = Statistics::with(0.3, 2);
        assert!(a.approx_eq(&b, 1e-12));
        assert!(!a.approx_eq(&Statistics::with(0.3, 3), 1e-12));
    }
}
