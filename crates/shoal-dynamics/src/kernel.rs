//! Growth redistribution kernels.
//!
//! A kernel turns the expected length growth of one length group, expressed
//! in group widths, into a probability for each possible jump of
//! `0..=max_jump` groups. Two variants exist:
//!
//! - [`BetaBinomialKernel`]: a beta-binomial distribution whose mean equals
//!   the expected jump. The jump-independent factors (binomial coefficients
//!   and rising products of the shape parameter) depend only on configured
//!   parameters and are computed once at construction; only the
//!   growth-dependent factors are evaluated per step.
//! - [`EmpiricalKernel`]: an externally supplied jump distribution, validated
//!   at construction. A malformed table is a fatal configuration error.
//!
//! Growth past `max_jump` groups in one step cannot be represented; the
//! expected jump is clamped just below the boundary with a warning, which
//! keeps the probability mass normalized at the top jump.

use shoal_pop::VERY_SMALL;
use tracing::warn;

use crate::error::DynamicsError;

/// A pluggable redistribution kernel.
#[derive(Debug, Clone)]
pub enum GrowthKernel {
    /// Parametric beta-binomial redistribution.
    BetaBinomial(BetaBinomialKernel),
    /// Fixed, externally supplied jump distribution.
    Empirical(EmpiricalKernel),
}

impl GrowthKernel {
    /// Largest number of length groups one individual can jump in a step.
    #[must_use]
    pub fn max_jump(&self) -> usize {
        match self {
            Self::BetaBinomial(k) => k.max_jump,
            Self::Empirical(k) => k.probabilities.len().saturating_sub(1),
        }
    }

    /// Expected jump in group widths for one length group.
    ///
    /// The beta-binomial kernel scales the raw length increment by mean
    /// length raised to its configured power; the empirical kernel ignores
    /// the increment entirely, so the scaling is inert there.
    #[must_use]
    pub fn expected_jump(&self, increment: f64, mean_length: f64, group_width: f64) -> f64 {
        match self {
            Self::BetaBinomial(k) => increment * mean_length.powf(k.power) / group_width,
            Self::Empirical(_) => increment / group_width,
        }
    }

    /// Writes the jump distribution for one length group into `column`,
    /// which must hold `max_jump + 1` slots.
    pub fn fill_column(&self, expected_jump: f64, column: &mut [f64]) {
        match self {
            Self::BetaBinomial(k) => k.fill_column(expected_jump, column),
            Self::Empirical(k) => {
                for (slot, p) in column.iter_mut().zip(k.probabilities.iter()) {
                    *slot = *p;
                }
            }
        }
    }
}

/// Beta-binomial jump distribution with mean equal to the expected jump.
#[derive(Debug, Clone)]
pub struct BetaBinomialKernel {
    max_jump: usize,
    beta: f64,
    power: f64,
    /// Binomial coefficients `C(max_jump, k)`.
    binom: Vec<f64>,
    /// Rising products of the shape parameter, `beta * (beta+1) * ...`,
    /// indexed so that entry `k` covers the `max_jump - k` non-jumping slots.
    beta_prod: Vec<f64>,
}

impl BetaBinomialKernel {
    /// Builds the kernel and its jump-independent tables.
    ///
    /// # Errors
    ///
    /// Fails when `max_jump` is zero or `beta` is not positive.
    pub fn new(max_jump: usize, power: f64, beta: f64) -> Result<Self, DynamicsError> {
        if max_jump == 0 {
            return Err(DynamicsError::MaxJumpZero);
        }
        if beta <= 0.0 {
            return Err(DynamicsError::NonPositiveBeta { beta });
        }
        let n = index_f(max_jump);
        let mut binom = vec![0.0; max_jump.saturating_add(1)];
        if let Some(first) = binom.first_mut() {
            *first = 1.0;
        }
        let mut falling = 1.0_f64;
        let mut factorial = 1.0_f64;
        for k in 1..=max_jump {
            falling *= n - index_f(k.saturating_sub(1));
            factorial *= index_f(k);
            if let Some(slot) = binom.get_mut(k) {
                *slot = falling / factorial;
            }
        }

        let mut beta_prod = vec![1.0; max_jump.saturating_add(1)];
        if let Some(slot) = beta_prod.get_mut(max_jump.saturating_sub(1)) {
            *slot = beta;
        }
        for k in (0..max_jump.saturating_sub(1)).rev() {
            let next = beta_prod.get(k.saturating_add(1)).copied().unwrap_or(1.0);
            let step = beta + n - index_f(k) - 1.0;
            if let Some(slot) = beta_prod.get_mut(k) {
                *slot = next * step;
            }
        }

        Ok(Self {
            max_jump,
            beta,
            power,
            binom,
            beta_prod,
        })
    }

    /// Exponent applied to mean length when scaling expected growth.
    #[must_use]
    pub const fn power(&self) -> f64 {
        self.power
    }

    /// Writes the jump distribution for one expected jump into `column`.
    fn fill_column(&self, expected_jump: f64, column: &mut [f64]) {
        column.fill(0.0);
        let n = index_f(self.max_jump);
        let mut jump = expected_jump;
        if jump < 0.0 {
            warn!(expected_jump, "negative mean growth treated as zero");
            jump = 0.0;
        }
        if jump < VERY_SMALL {
            if let Some(first) = column.first_mut() {
                *first = 1.0;
            }
            return;
        }
        if jump >= n {
            warn!(
                expected_jump,
                max_jump = self.max_jump,
                "mean growth beyond the maximum group jump, clamping"
            );
            jump = n - 0.1;
        }

        let alpha = self.beta * jump / (n - jump);
        let mut denom = 1.0_f64;
        for j in 0..self.max_jump {
            denom *= alpha + self.beta + index_f(j);
        }
        let mut alpha_prod = 1.0_f64;
        for (k, slot) in column.iter_mut().enumerate().take(self.max_jump.saturating_add(1)) {
            let binom = self.binom.get(k).copied().unwrap_or(0.0);
            let betas = self.beta_prod.get(k).copied().unwrap_or(1.0);
            *slot = binom * betas * alpha_prod / denom;
            alpha_prod *= alpha + index_f(k);
        }
    }
}

/// Externally supplied jump distribution, fixed across lengths and steps.
#[derive(Debug, Clone)]
pub struct EmpiricalKernel {
    probabilities: Vec<f64>,
}

impl EmpiricalKernel {
    /// Validates and stores a jump distribution, entry `k` giving the
    /// probability of jumping `k` length groups.
    ///
    /// # Errors
    ///
    /// Fails when the table is empty, holds a negative entry, or does not
    /// sum to one within tolerance.
    pub fn new(probabilities: Vec<f64>) -> Result<Self, DynamicsError> {
        if probabilities.is_empty() {
            return Err(DynamicsError::EmptyDistribution);
        }
        for (index, &value) in probabilities.iter().enumerate() {
            if value < 0.0 {
                return Err(DynamicsError::NegativeProbability { index, value });
            }
        }
        let sum: f64 = probabilities.iter().sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(DynamicsError::UnnormalizedDistribution { sum });
        }
        Ok(Self { probabilities })
    }
}

/// Small index as an exact float.
#[allow(clippy::cast_precision_loss)] // Jump counts are tiny integers.
const fn index_f(i: usize) -> f64 {
    i as f64
}
