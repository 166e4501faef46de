//! [`PopCell`], the aggregate population unit for one (age, length) class.
//!
//! A cell tracks an abundance count and the mean individual weight of that
//! count. Combining two cells adds counts and takes the count-weighted mean
//! of the weights; scaling a cell by a ratio touches the count only. A cell
//! whose count collapses to zero carries a zero weight, so empty classes can
//! never leak a stale mean weight into later arithmetic.

use std::ops::{AddAssign, Mul, MulAssign};

use serde::{Deserialize, Serialize};

/// Threshold below which a floating-point quantity is treated as zero.
pub const VERY_SMALL: f64 = 1e-20;

/// Abundance count and mean individual weight for one population class.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PopCell {
    /// Number of individuals in the class.
    pub count: f64,
    /// Mean weight of one individual, zero when the class is empty.
    pub mean_weight: f64,
}

impl PopCell {
    /// Creates a cell from a count and a mean individual weight.
    #[must_use]
    pub const fn new(count: f64, mean_weight: f64) -> Self {
        Self { count, mean_weight }
    }

    /// Total biomass of the class: count times mean weight.
    #[must_use]
    pub const fn biomass(self) -> f64 {
        self.count * self.mean_weight
    }

    /// Whether the class holds no individuals.
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.count.abs() < VERY_SMALL
    }

    /// Clears the cell to an empty class.
    pub const fn zero(&mut self) {
        self.count = 0.0;
        self.mean_weight = 0.0;
    }
}

impl AddAssign for PopCell {
    /// Adds counts and combines weights as a count-weighted mean.
    fn add_assign(&mut self, rhs: Self) {
        let total = self.count + rhs.count;
        if total.abs() < VERY_SMALL {
            self.count = 0.0;
            self.mean_weight = 0.0;
        } else {
            self.mean_weight =
                self.count.mul_add(self.mean_weight, rhs.count * rhs.mean_weight) / total;
            self.count = total;
        }
    }
}

impl MulAssign<f64> for PopCell {
    /// Scales the count by a ratio; the mean weight is unchanged.
    fn mul_assign(&mut self, ratio: f64) {
        self.count *= ratio;
    }
}

impl Mul<f64> for PopCell {
    type Output = Self;

    /// Returns a copy with the count scaled by a ratio.
    fn mul(self, ratio: f64) -> Self {
        Self {
            count: self.count * ratio,
            mean_weight: self.mean_weight,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_weights_counts() {
        let mut a = PopCell::new(100.0, 2.0);
        a += PopCell::new(50.0, 5.0);
        assert!((a.count - 150.0).abs() < 1e-12);
        // (100*2 + 50*5) / 150 = 3.0
        assert!((a.mean_weight - 3.0).abs() < 1e-12);
    }

    #[test]
    fn combine_with_empty_keeps_weight() {
        let mut a = PopCell::new(40.0, 1.5);
        a += PopCell::default();
        assert!((a.count - 40.0).abs() < 1e-12);
        assert!((a.mean_weight - 1.5).abs() < 1e-12);
    }

    #[test]
    fn empty_total_clears_weight() {
        let mut a = PopCell::new(0.0, 7.0);
        a += PopCell::new(0.0, 3.0);
        assert!(a.is_empty());
        assert!(a.mean_weight.abs() < 1e-12);
    }

    #[test]
    fn scaling_touches_count_only() {
        let mut a = PopCell::new(80.0, 2.5);
        a *= 0.25;
        assert!((a.count - 20.0).abs() < 1e-12);
        assert!((a.mean_weight - 2.5).abs() < 1e-12);

        let b = a * 2.0;
        assert!((b.count - 40.0).abs() < 1e-12);
        assert!((b.mean_weight - 2.5).abs() < 1e-12);
    }

    #[test]
    fn biomass_is_count_times_weight() {
        let a = PopCell::new(12.0, 0.5);
        assert!((a.biomass() - 6.0).abs() < 1e-12);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn serde_round_trip() {
        let a = PopCell::new(3.0, 0.125);
        let json = serde_json::to_string(&a).unwrap();
        let back: PopCell = serde_json::from_str(&json).unwrap();
        assert!((back.count - a.count).abs() < 1e-12);
        assert!((back.mean_weight - a.mean_weight).abs() < 1e-12);
    }
}
