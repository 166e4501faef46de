//! Per-area growth pipeline for one stock.
//!
//! The [`Grower`] owns every buffer the growth stage needs: the raw
//! increments computed by the configured [`GrowthFunction`] on its
//! calculation division, the increments interpolated onto the stock's own
//! division, and the per-area redistribution matrices consumed by
//! [`AgeLengthMatrix::grow`](shoal_pop::AgeLengthMatrix::grow).
//!
//! The calculation division may be coarser than the stock's division; the
//! conversion index built at construction carries the increments across.
//! Buffers are allocated once and zeroed on [`Grower::reset`], so the growth
//! stage itself never allocates.

use shoal_pop::{ConversionIndex, DenseMatrix, LengthDivision, remap};

use crate::error::DynamicsError;
use crate::kernel::GrowthKernel;
use crate::strategy::{GrowthFunction, LengthWeight};

/// Growth state for one stock across all areas.
#[derive(Debug)]
pub struct Grower {
    function: GrowthFunction,
    relation: LengthWeight,
    kernel: GrowthKernel,
    ci: ConversionIndex,
    calc_mean_lengths: Vec<f64>,
    stock_mean_lengths: Vec<f64>,
    stock_dl: f64,
    /// Raw increments on the calculation division, per area.
    calc_lgrowth: Vec<Vec<f64>>,
    calc_wgrowth: Vec<Vec<f64>>,
    /// Increments carried onto the stock's division, per area.
    interp_lgrowth: Vec<Vec<f64>>,
    interp_wgrowth: Vec<Vec<f64>>,
    /// Redistribution matrices, `(max_jump + 1) x num_lengths`, per area.
    length_matrices: Vec<DenseMatrix>,
    weight_matrices: Vec<DenseMatrix>,
    column: Vec<f64>,
}

impl Grower {
    /// Builds the growth pipeline for a stock.
    ///
    /// `calc_division` is where the growth function is evaluated;
    /// `stock_division` is where the population lives and must be uniform,
    /// since jumps are expressed in its group widths.
    ///
    /// # Errors
    ///
    /// Fails when the stock division is not uniform, the divisions do not
    /// overlap, or the function, relation, or kernel parameters are invalid.
    pub fn new(
        stock: &str,
        calc_division: &LengthDivision,
        stock_division: &LengthDivision,
        function: GrowthFunction,
        relation: LengthWeight,
        kernel: GrowthKernel,
        num_areas: usize,
        steps_per_year: usize,
    ) -> Result<Self, DynamicsError> {
        function.validate(calc_division.num_groups(), steps_per_year)?;
        relation.validate()?;
        let Some(stock_dl) = stock_division.dl() else {
            return Err(DynamicsError::NonUniformDivision {
                name: stock.to_owned(),
            });
        };
        let ci = ConversionIndex::build(calc_division, stock_division)?;
        let calc_groups = calc_division.num_groups();
        let stock_groups = stock_division.num_groups();
        let rows = kernel.max_jump().saturating_add(1);
        Ok(Self {
            function,
            relation,
            calc_mean_lengths: calc_division.mean_lengths(),
            stock_mean_lengths: stock_division.mean_lengths(),
            stock_dl,
            ci,
            calc_lgrowth: vec![vec![0.0; calc_groups]; num_areas],
            calc_wgrowth: vec![vec![0.0; calc_groups]; num_areas],
            interp_lgrowth: vec![vec![0.0; stock_groups]; num_areas],
            interp_wgrowth: vec![vec![0.0; stock_groups]; num_areas],
            length_matrices: vec![DenseMatrix::new(rows, stock_groups); num_areas],
            weight_matrices: vec![DenseMatrix::new(rows, stock_groups); num_areas],
            column: vec![0.0; rows],
            kernel,
        })
    }

    /// Number of areas the grower carries buffers for.
    #[must_use]
    pub fn num_areas(&self) -> usize {
        self.calc_lgrowth.len()
    }

    /// Clears every per-area buffer ahead of a fresh run.
    pub fn reset(&mut self) {
        for buffer in self
            .calc_lgrowth
            .iter_mut()
            .chain(self.calc_wgrowth.iter_mut())
            .chain(self.interp_lgrowth.iter_mut())
            .chain(self.interp_wgrowth.iter_mut())
        {
            buffer.fill(0.0);
        }
        for matrix in self
            .length_matrices
            .iter_mut()
            .chain(self.weight_matrices.iter_mut())
        {
            matrix.fill(0.0);
        }
        self.column.fill(0.0);
    }

    /// Evaluates the growth function for one area and carries the increments
    /// onto the stock's division.
    ///
    /// # Errors
    ///
    /// Fails when `area` is out of range or the interpolation buffers do not
    /// match the conversion index.
    pub fn calculate(
        &mut self,
        area: usize,
        step_size: f64,
        step_of_year: usize,
    ) -> Result<(), DynamicsError> {
        let num_areas = self.calc_lgrowth.len();
        {
            let lengths = self
                .calc_lgrowth
                .get_mut(area)
                .ok_or(DynamicsError::AreaOutOfRange { area, num_areas })?;
            self.function
                .length_growth(&self.calc_mean_lengths, step_size, step_of_year, lengths);
        }
        let lengths = self
            .calc_lgrowth
            .get(area)
            .ok_or(DynamicsError::AreaOutOfRange { area, num_areas })?;
        let weights = self
            .calc_wgrowth
            .get_mut(area)
            .ok_or(DynamicsError::AreaOutOfRange { area, num_areas })?;
        self.function.weight_growth(
            &self.calc_mean_lengths,
            lengths,
            &self.relation,
            step_of_year,
            weights,
        );

        let interp = self
            .interp_lgrowth
            .get_mut(area)
            .ok_or(DynamicsError::AreaOutOfRange { area, num_areas })?;
        remap::interpolate_values(interp, lengths, &self.ci)?;
        let interp = self
            .interp_wgrowth
            .get_mut(area)
            .ok_or(DynamicsError::AreaOutOfRange { area, num_areas })?;
        remap::interpolate_values(interp, weights, &self.ci)?;
        Ok(())
    }

    /// Builds the redistribution matrices for one area from the interpolated
    /// increments.
    ///
    /// Column `l` of the length matrix holds the jump distribution for
    /// length group `l`; every row of the weight matrix repeats the expected
    /// weight gain of the movers from that group.
    ///
    /// # Errors
    ///
    /// Fails when `area` is out of range.
    pub fn implement(&mut self, area: usize) -> Result<(), DynamicsError> {
        let num_areas = self.calc_lgrowth.len();
        let interp_l = self
            .interp_lgrowth
            .get(area)
            .ok_or(DynamicsError::AreaOutOfRange { area, num_areas })?;
        let interp_w = self
            .interp_wgrowth
            .get(area)
            .ok_or(DynamicsError::AreaOutOfRange { area, num_areas })?;
        let matrix = self
            .length_matrices
            .get_mut(area)
            .ok_or(DynamicsError::AreaOutOfRange { area, num_areas })?;
        let gains = self
            .weight_matrices
            .get_mut(area)
            .ok_or(DynamicsError::AreaOutOfRange { area, num_areas })?;

        let rows = self.column.len();
        for (l, (&increment, &mean_length)) in interp_l
            .iter()
            .zip(self.stock_mean_lengths.iter())
            .enumerate()
        {
            let jump = self
                .kernel
                .expected_jump(increment, mean_length, self.stock_dl);
            self.kernel.fill_column(jump, &mut self.column);
            for (k, &p) in self.column.iter().enumerate() {
                if let Some(slot) = matrix.get_mut(k, l) {
                    *slot = p;
                }
            }
            let gain = interp_w.get(l).copied().unwrap_or(0.0);
            for k in 0..rows {
                if let Some(slot) = gains.get_mut(k, l) {
                    *slot = gain;
                }
            }
        }
        Ok(())
    }

    /// Jump distribution matrix for one area.
    ///
    /// # Errors
    ///
    /// Fails when `area` is out of range.
    pub fn length_matrix(&self, area: usize) -> Result<&DenseMatrix, DynamicsError> {
        self.length_matrices
            .get(area)
            .ok_or(DynamicsError::AreaOutOfRange {
                area,
                num_areas: self.length_matrices.len(),
            })
    }

    /// Weight gain matrix for one area.
    ///
    /// # Errors
    ///
    /// Fails when `area` is out of range.
    pub fn weight_matrix(&self, area: usize) -> Result<&DenseMatrix, DynamicsError> {
        self.weight_matrices
            .get(area)
            .ok_or(DynamicsError::AreaOutOfRange {
                area,
                num_areas: self.weight_matrices.len(),
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::kernel::BetaBinomialKernel;

    fn make_grower(function: GrowthFunction) -> Grower {
        let division = LengthDivision::uniform(10.0, 60.0, 10.0).unwrap();
        let kernel = GrowthKernel::BetaBinomial(BetaBinomialKernel::new(2, 0.0, 4.0).unwrap());
        Grower::new(
            "cod",
            &division,
            &division,
            function,
            LengthWeight {
                coefficient: 1e-5,
                exponent: 3.0,
            },
            kernel,
            2,
            4,
        )
        .unwrap()
    }

    #[test]
    fn columns_of_the_length_matrix_are_distributions() {
        let mut grower = make_grower(GrowthFunction::VonBertalanffy {
            l_infinity: 120.0,
            kappa: 0.4,
        });
        grower.calculate(0, 0.25, 0).unwrap();
        grower.implement(0).unwrap();
        let matrix = grower.length_matrix(0).unwrap();
        for l in 0..5 {
            let sum: f64 = (0..matrix.rows()).map(|k| matrix.get(k, l).unwrap()).sum();
            assert!((sum - 1.0).abs() < 1e-9, "column {l} summed to {sum}");
        }
    }

    #[test]
    fn weight_rows_repeat_the_interpolated_gain() {
        let mut grower = make_grower(GrowthFunction::VonBertalanffy {
            l_infinity: 120.0,
            kappa: 0.4,
        });
        grower.calculate(1, 0.25, 0).unwrap();
        grower.implement(1).unwrap();
        let gains = grower.weight_matrix(1).unwrap();
        for l in 0..5 {
            let first = gains.get(0, l).unwrap();
            assert!(first > 0.0);
            for k in 1..gains.rows() {
                assert!((gains.get(k, l).unwrap() - first).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn areas_are_independent() {
        let mut grower = make_grower(GrowthFunction::LengthPower {
            coefficient: 0.02,
            exponent: 1.0,
        });
        grower.calculate(0, 0.25, 0).unwrap();
        grower.implement(0).unwrap();
        // Area 1 was never computed, so its matrix is still zero.
        let untouched = grower.length_matrix(1).unwrap();
        assert!(untouched.total().abs() < 1e-12);
        assert!(grower.length_matrix(0).unwrap().total() > 0.0);
    }

    #[test]
    fn reset_clears_the_matrices() {
        let mut grower = make_grower(GrowthFunction::LengthPower {
            coefficient: 0.02,
            exponent: 1.0,
        });
        grower.calculate(0, 0.25, 0).unwrap();
        grower.implement(0).unwrap();
        grower.reset();
        assert!(grower.length_matrix(0).unwrap().total().abs() < 1e-12);
    }

    #[test]
    fn out_of_range_area_is_an_error() {
        let mut grower = make_grower(GrowthFunction::LengthPower {
            coefficient: 0.02,
            exponent: 1.0,
        });
        assert!(grower.calculate(5, 0.25, 0).is_err());
        assert!(grower.length_matrix(5).is_err());
    }

    #[test]
    fn non_uniform_stock_division_is_rejected() {
        let calc = LengthDivision::uniform(10.0, 60.0, 10.0).unwrap();
        let stock = LengthDivision::new(vec![10.0, 20.0, 35.0, 60.0]).unwrap();
        let kernel = GrowthKernel::BetaBinomial(BetaBinomialKernel::new(2, 0.0, 4.0).unwrap());
        let result = Grower::new(
            "cod",
            &calc,
            &stock,
            GrowthFunction::LengthPower {
                coefficient: 0.02,
                exponent: 1.0,
            },
            LengthWeight {
                coefficient: 1e-5,
                exponent: 3.0,
            },
            kernel,
            1,
            4,
        );
        assert!(matches!(
            result,
            Err(DynamicsError::NonUniformDivision { .. })
        ));
    }
}
