//! [`LengthDivision`], the discretization of a continuous length range.
//!
//! A division is an ordered, strictly increasing sequence of group boundaries:
//! `n + 1` boundaries define `n` length groups, group `i` spanning
//! `[bound(i), bound(i + 1))`. Widths may be uniform or variable; uniform
//! divisions expose their common width through [`LengthDivision::dl`], which
//! is what makes the cheap offset form of a conversion possible.

use crate::error::PopError;

/// Tolerance used when comparing group widths and boundary alignment.
const WIDTH_TOLERANCE: f64 = 1e-9;

/// An ordered, strictly increasing set of length-group boundaries.
#[derive(Debug, Clone)]
pub struct LengthDivision {
    bounds: Vec<f64>,
    dl: Option<f64>,
}

impl LengthDivision {
    /// Builds a division from explicit group boundaries.
    ///
    /// # Errors
    ///
    /// Fails when fewer than two boundaries are given or when any boundary
    /// is not strictly above its predecessor.
    pub fn new(bounds: Vec<f64>) -> Result<Self, PopError> {
        if bounds.len() < 2 {
            return Err(PopError::TooFewBoundaries {
                count: bounds.len(),
            });
        }
        for (index, pair) in bounds.windows(2).enumerate() {
            if let [previous, value] = pair
                && *value <= *previous
            {
                return Err(PopError::NonIncreasingBoundary {
                    index: index.saturating_add(1),
                    value: *value,
                    previous: *previous,
                });
            }
        }
        let dl = detect_uniform_width(&bounds);
        Ok(Self { bounds, dl })
    }

    /// Builds a uniform division spanning `[min, max)` in groups of `width`.
    ///
    /// # Errors
    ///
    /// Fails when `width` is not positive or the span is not a whole number
    /// of groups within tolerance.
    pub fn uniform(min: f64, max: f64, width: f64) -> Result<Self, PopError> {
        if width < VERY_SMALL_WIDTH {
            return Err(PopError::NonPositiveWidth { width });
        }
        let span = (max - min) / width;
        let groups = span.round();
        if groups < 0.5 || (span - groups).abs() > WIDTH_TOLERANCE {
            return Err(PopError::UnevenSpan { min, max, width });
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        // groups is a small non-negative whole number at this point.
        let count = groups as usize;
        let bounds = (0..=count)
            .map(|i| {
                #[allow(clippy::cast_precision_loss)]
                // Group counts are far below f64's integer range.
                let step = i as f64;
                step.mul_add(width, min)
            })
            .collect();
        Ok(Self {
            bounds,
            dl: Some(width),
        })
    }

    /// Number of length groups in the division.
    #[must_use]
    pub fn num_groups(&self) -> usize {
        self.bounds.len().saturating_sub(1)
    }

    /// Lowest length covered by the division.
    #[must_use]
    pub fn min_length(&self) -> f64 {
        self.bounds.first().copied().unwrap_or(0.0)
    }

    /// One past the highest length covered by the division.
    #[must_use]
    pub fn max_length(&self) -> f64 {
        self.bounds.last().copied().unwrap_or(0.0)
    }

    /// The common group width, when every group shares one.
    #[must_use]
    pub const fn dl(&self) -> Option<f64> {
        self.dl
    }

    /// Lower boundary of group `i`.
    #[must_use]
    pub fn lower_bound(&self, i: usize) -> Option<f64> {
        if i < self.num_groups() {
            self.bounds.get(i).copied()
        } else {
            None
        }
    }

    /// Upper boundary of group `i`.
    #[must_use]
    pub fn upper_bound(&self, i: usize) -> Option<f64> {
        if i < self.num_groups() {
            self.bounds.get(i.saturating_add(1)).copied()
        } else {
            None
        }
    }

    /// Midpoint length of group `i`.
    #[must_use]
    pub fn mean_length(&self, i: usize) -> Option<f64> {
        let lower = self.lower_bound(i)?;
        let upper = self.upper_bound(i)?;
        Some(f64::midpoint(lower, upper))
    }

    /// Width of group `i`.
    #[must_use]
    pub fn group_width(&self, i: usize) -> Option<f64> {
        let lower = self.lower_bound(i)?;
        let upper = self.upper_bound(i)?;
        Some(upper - lower)
    }

    /// Midpoint lengths of every group, in order.
    #[must_use]
    pub fn mean_lengths(&self) -> Vec<f64> {
        (0..self.num_groups())
            .filter_map(|i| self.mean_length(i))
            .collect()
    }

    /// Index of the group containing `length`, if the division covers it.
    #[must_use]
    pub fn group_for(&self, length: f64) -> Option<usize> {
        if length < self.min_length() || length >= self.max_length() {
            return None;
        }
        // Linear scan; divisions are small and this runs at setup time only.
        self.bounds
            .windows(2)
            .position(|pair| matches!(pair, [lower, upper] if length >= *lower && length < *upper))
    }

    /// Whether this division and `other` share widths and boundary alignment,
    /// so that group indices differ by a constant shift.
    #[must_use]
    pub fn aligned_with(&self, other: &Self) -> bool {
        match (self.dl, other.dl) {
            (Some(a), Some(b)) if (a - b).abs() < WIDTH_TOLERANCE => {
                let shift = (other.min_length() - self.min_length()) / a;
                (shift - shift.round()).abs() < WIDTH_TOLERANCE
            }
            _ => false,
        }
    }
}

/// Minimum admissible group width.
const VERY_SMALL_WIDTH: f64 = 1e-12;

/// Returns the common group width when all widths agree within tolerance.
fn detect_uniform_width(bounds: &[f64]) -> Option<f64> {
    let mut widths = bounds.windows(2).filter_map(|pair| match pair {
        [lower, upper] => Some(upper - lower),
        _ => None,
    });
    let first = widths.next()?;
    if widths.all(|w| (w - first).abs() < WIDTH_TOLERANCE) {
        Some(first)
    } else {
        None
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn uniform_division_detects_width() {
        let div = LengthDivision::uniform(10.0, 30.0, 10.0).unwrap();
        assert_eq!(div.num_groups(), 2);
        assert!((div.dl().unwrap() - 10.0).abs() < 1e-12);
        assert!((div.mean_length(0).unwrap() - 15.0).abs() < 1e-12);
        assert!((div.mean_length(1).unwrap() - 25.0).abs() < 1e-12);
    }

    #[test]
    fn explicit_bounds_variable_width() {
        let div = LengthDivision::new(vec![0.0, 5.0, 15.0, 40.0]).unwrap();
        assert_eq!(div.num_groups(), 3);
        assert!(div.dl().is_none());
        assert!((div.group_width(2).unwrap() - 25.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_non_increasing_bounds() {
        let err = LengthDivision::new(vec![0.0, 5.0, 5.0]).unwrap_err();
        assert!(matches!(
            err,
            PopError::NonIncreasingBoundary { index: 2, .. }
        ));
    }

    #[test]
    fn rejects_uneven_span() {
        assert!(LengthDivision::uniform(0.0, 25.0, 10.0).is_err());
    }

    #[test]
    fn group_lookup_covers_range() {
        let div = LengthDivision::uniform(10.0, 50.0, 10.0).unwrap();
        assert_eq!(div.group_for(10.0), Some(0));
        assert_eq!(div.group_for(19.999), Some(0));
        assert_eq!(div.group_for(20.0), Some(1));
        assert_eq!(div.group_for(49.0), Some(3));
        assert_eq!(div.group_for(50.0), None);
        assert_eq!(div.group_for(9.0), None);
    }

    #[test]
    fn alignment_requires_shared_width_and_phase() {
        let a = LengthDivision::uniform(10.0, 50.0, 10.0).unwrap();
        let b = LengthDivision::uniform(20.0, 60.0, 10.0).unwrap();
        let c = LengthDivision::uniform(10.0, 50.0, 5.0).unwrap();
        let d = LengthDivision::uniform(12.5, 52.5, 10.0).unwrap();
        assert!(a.aligned_with(&b));
        assert!(!a.aligned_with(&c));
        assert!(!a.aligned_with(&d));
    }
}
