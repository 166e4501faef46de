//! [`AgeLengthMatrix`], the authoritative population state of one stock in
//! one area.
//!
//! Rows are indexed by age class; each row holds cells for a window of the
//! owner's length division, since young fish never occupy the largest length
//! groups and old fish never occupy the smallest. Windows are validated at
//! construction and all access is bounds-checked against them.
//!
//! The mutating operations on this type are exactly the ones the simulation
//! phases need: scaled remapped addition (transitions, renewal), per-length
//! count scaling (consumption removal), per-age count scaling (natural
//! mortality), growth redistribution and the yearly age increment.

use tracing::warn;

use crate::cell::{PopCell, VERY_SMALL};
use crate::conversion::ConversionIndex;
use crate::dense::DenseMatrix;
use crate::error::PopError;
use crate::remap;

/// One age class: a window of population cells over the length division.
#[derive(Debug, Clone)]
pub struct AgeRow {
    start: usize,
    cells: Vec<PopCell>,
}

impl AgeRow {
    /// First length group covered by the window.
    #[must_use]
    pub const fn start(&self) -> usize {
        self.start
    }

    /// One past the last length group covered by the window.
    #[must_use]
    pub fn end(&self) -> usize {
        self.start.saturating_add(self.cells.len())
    }

    /// The window's cells, lowest length group first.
    #[must_use]
    pub fn cells(&self) -> &[PopCell] {
        &self.cells
    }

    /// Cell at global length group `length`, if inside the window.
    #[must_use]
    pub fn cell(&self, length: usize) -> Option<&PopCell> {
        length
            .checked_sub(self.start)
            .and_then(|k| self.cells.get(k))
    }

    /// Mutable cell at global length group `length`, if inside the window.
    pub fn cell_mut(&mut self, length: usize) -> Option<&mut PopCell> {
        length
            .checked_sub(self.start)
            .and_then(|k| self.cells.get_mut(k))
    }

    /// Iterates `(global length group, cell)` pairs.
    pub fn iter_cells(&self) -> impl Iterator<Item = (usize, &PopCell)> {
        self.cells
            .iter()
            .enumerate()
            .map(|(k, cell)| (self.start.saturating_add(k), cell))
    }

    /// Clears every cell in the window.
    pub fn zero(&mut self) {
        for cell in &mut self.cells {
            cell.zero();
        }
    }

    /// Sum of counts in the window.
    #[must_use]
    pub fn total_number(&self) -> f64 {
        self.cells.iter().map(|c| c.count).sum()
    }
}

/// Per-age, per-length population matrix owned by one stock in one area.
#[derive(Debug, Clone)]
pub struct AgeLengthMatrix {
    min_age: usize,
    num_lengths: usize,
    rows: Vec<AgeRow>,
}

impl AgeLengthMatrix {
    /// Builds a matrix for ages `min_age..=max_age` with one length window
    /// per age, over a division of `num_lengths` groups.
    ///
    /// # Errors
    ///
    /// Fails when the age range is empty, the window count does not match
    /// the number of ages, or a window falls outside the division.
    pub fn new(
        min_age: usize,
        max_age: usize,
        windows: &[(usize, usize)],
        num_lengths: usize,
    ) -> Result<Self, PopError> {
        if max_age < min_age {
            return Err(PopError::EmptyAgeRange { min_age, max_age });
        }
        let num_ages = max_age.saturating_sub(min_age).saturating_add(1);
        if windows.len() != num_ages {
            return Err(PopError::WindowCountMismatch {
                expected: num_ages,
                actual: windows.len(),
            });
        }
        let mut rows = Vec::with_capacity(num_ages);
        for (i, &(start, end)) in windows.iter().enumerate() {
            if start > end || end > num_lengths {
                return Err(PopError::WindowOutOfRange {
                    age: min_age.saturating_add(i),
                    start,
                    end,
                    num_lengths,
                });
            }
            rows.push(AgeRow {
                start,
                cells: vec![PopCell::default(); end.saturating_sub(start)],
            });
        }
        Ok(Self {
            min_age,
            num_lengths,
            rows,
        })
    }

    /// Builds a matrix whose every age covers the full division.
    ///
    /// # Errors
    ///
    /// Fails when the age range is empty.
    pub fn full(min_age: usize, max_age: usize, num_lengths: usize) -> Result<Self, PopError> {
        if max_age < min_age {
            return Err(PopError::EmptyAgeRange { min_age, max_age });
        }
        let num_ages = max_age.saturating_sub(min_age).saturating_add(1);
        let windows = vec![(0, num_lengths); num_ages];
        Self::new(min_age, max_age, &windows, num_lengths)
    }

    /// Lowest age class in the matrix.
    #[must_use]
    pub const fn min_age(&self) -> usize {
        self.min_age
    }

    /// Highest age class in the matrix.
    #[must_use]
    pub fn max_age(&self) -> usize {
        self.min_age
            .saturating_add(self.rows.len().saturating_sub(1))
    }

    /// Number of age classes.
    #[must_use]
    pub fn num_ages(&self) -> usize {
        self.rows.len()
    }

    /// Number of length groups in the owner's division.
    #[must_use]
    pub const fn num_lengths(&self) -> usize {
        self.num_lengths
    }

    /// Row for `age`, if the matrix covers it.
    #[must_use]
    pub fn row(&self, age: usize) -> Option<&AgeRow> {
        age.checked_sub(self.min_age).and_then(|i| self.rows.get(i))
    }

    /// Mutable row for `age`, if the matrix covers it.
    pub fn row_mut(&mut self, age: usize) -> Option<&mut AgeRow> {
        age.checked_sub(self.min_age)
            .and_then(|i| self.rows.get_mut(i))
    }

    /// Iterates `(age, row)` pairs.
    pub fn iter_rows(&self) -> impl Iterator<Item = (usize, &AgeRow)> {
        self.rows
            .iter()
            .enumerate()
            .map(|(i, row)| (self.min_age.saturating_add(i), row))
    }

    /// Cell at `(age, length)`, if covered.
    #[must_use]
    pub fn cell(&self, age: usize, length: usize) -> Option<PopCell> {
        self.row(age).and_then(|row| row.cell(length)).copied()
    }

    /// Mutable cell at `(age, length)`, if covered.
    pub fn cell_mut(&mut self, age: usize, length: usize) -> Option<&mut PopCell> {
        self.row_mut(age).and_then(|row| row.cell_mut(length))
    }

    /// Clears every cell.
    pub fn zero(&mut self) {
        for row in &mut self.rows {
            row.zero();
        }
    }

    /// Total abundance across all ages and lengths.
    #[must_use]
    pub fn total_number(&self) -> f64 {
        self.rows.iter().map(AgeRow::total_number).sum()
    }

    /// Total biomass across all ages and lengths.
    #[must_use]
    pub fn total_biomass(&self) -> f64 {
        self.rows
            .iter()
            .flat_map(|row| row.cells.iter())
            .map(|c| c.biomass())
            .sum()
    }

    /// Abundance per length group summed across ages, over the full division.
    #[must_use]
    pub fn number_by_length(&self) -> Vec<f64> {
        let mut out = vec![0.0; self.num_lengths];
        for row in &self.rows {
            for (l, cell) in row.iter_cells() {
                if let Some(slot) = out.get_mut(l) {
                    *slot += cell.count;
                }
            }
        }
        out
    }

    /// Sums all ages onto `target` cells on another division.
    ///
    /// `target` must span the conversion's target division; it is zeroed
    /// first, then every age row is accumulated through the index.
    ///
    /// # Errors
    ///
    /// Fails when `target` does not span the target division.
    pub fn sum_columns_into(
        &self,
        target: &mut [PopCell],
        ci: &ConversionIndex,
    ) -> Result<(), PopError> {
        for cell in target.iter_mut() {
            cell.zero();
        }
        for row in &self.rows {
            remap::accumulate_cells(target, &row.cells, row.start, ci)?;
        }
        Ok(())
    }

    /// Adds `other` scaled by `ratio`, remapping lengths through `ci`.
    ///
    /// Only ages present in both matrices receive anything; length groups
    /// falling outside either window are clipped.
    pub fn add_remapped(&mut self, other: &Self, ci: &ConversionIndex, ratio: f64) {
        let lo = self.min_age.max(other.min_age);
        let hi = self.max_age().min(other.max_age());
        for age in lo..=hi {
            let Some(source) = other.row(age) else {
                continue;
            };
            let Some(target) = self.row_mut(age) else {
                continue;
            };
            let start = target.start;
            remap::add_cells_remapped(
                &mut target.cells,
                start,
                &source.cells,
                source.start,
                ci,
                ratio,
            );
        }
    }

    /// Adds `other` scaled by `ratio`, assuming both matrices share one
    /// division.
    ///
    /// Ages or length groups absent from either side are clipped, as in
    /// [`add_remapped`](Self::add_remapped), but no length remapping takes
    /// place.
    pub fn add_scaled(&mut self, other: &Self, ratio: f64) {
        let lo = self.min_age.max(other.min_age);
        let hi = self.max_age().min(other.max_age());
        for age in lo..=hi {
            let Some(source) = other.row(age) else {
                continue;
            };
            let Some(target) = self.row_mut(age) else {
                continue;
            };
            for (length, cell) in source.iter_cells() {
                if cell.is_empty() {
                    continue;
                }
                if let Some(slot) = target.cell_mut(length) {
                    *slot += *cell * ratio;
                }
            }
        }
    }

    /// Scales counts by a per-length factor defined on another division.
    ///
    /// The factor for a cell is found by mapping its length group through
    /// `ci`; when the factor division is finer than this matrix's, the
    /// factors of all finer groups inside the cell's group are averaged.
    /// Unmapped groups are left unchanged.
    ///
    /// # Errors
    ///
    /// Fails when `factors` does not span the conversion's target division.
    pub fn multiply_count_by_length(
        &mut self,
        factors: &[f64],
        ci: &ConversionIndex,
    ) -> Result<(), PopError> {
        if factors.len() != ci.target_groups() {
            return Err(PopError::LengthVectorSize {
                expected: ci.target_groups(),
                actual: factors.len(),
            });
        }
        for row in &mut self.rows {
            let start = row.start;
            for (k, cell) in row.cells.iter_mut().enumerate() {
                let l = start.saturating_add(k);
                if let Some(factor) = factor_for_group(factors, ci, l) {
                    *cell *= factor;
                }
            }
        }
        Ok(())
    }

    /// Scales counts by a per-age factor, e.g. a survival proportion.
    ///
    /// # Errors
    ///
    /// Fails when `factors` does not hold one entry per age class.
    pub fn multiply_by_age(&mut self, factors: &[f64]) -> Result<(), PopError> {
        if factors.len() != self.rows.len() {
            return Err(PopError::AgeFactorLength {
                expected: self.rows.len(),
                actual: factors.len(),
            });
        }
        for (row, factor) in self.rows.iter_mut().zip(factors.iter()) {
            for cell in &mut row.cells {
                *cell *= *factor;
            }
        }
        Ok(())
    }

    /// Applies a growth redistribution to every age row.
    ///
    /// `lgrowth[k][l]` is the probability that one individual in length
    /// group `l` moves up `k` groups this step; `wgrowth[k][l]` is the
    /// weight it gains doing so. Mass scattered beyond the top of an age
    /// window folds into the window's top group, so total abundance is
    /// conserved exactly.
    ///
    /// # Errors
    ///
    /// Fails when either matrix does not cover the full division or their
    /// shapes differ.
    pub fn grow(&mut self, lgrowth: &DenseMatrix, wgrowth: &DenseMatrix) -> Result<(), PopError> {
        for m in [lgrowth, wgrowth] {
            if m.cols() != self.num_lengths || m.rows() != lgrowth.rows() || m.rows() == 0 {
                return Err(PopError::GrowthMatrixShape {
                    rows: m.rows(),
                    cols: m.cols(),
                    expected_cols: self.num_lengths,
                });
            }
        }
        let jumps = lgrowth.rows();
        for row in &mut self.rows {
            if row.cells.is_empty() {
                continue;
            }
            let start = row.start;
            let top = row.cells.len().saturating_sub(1);
            let mut scatter = vec![(0.0_f64, 0.0_f64); row.cells.len()];
            for (k, cell) in row.cells.iter().enumerate() {
                if cell.count < VERY_SMALL {
                    continue;
                }
                let l = start.saturating_add(k);
                for jump in 0..jumps {
                    let p = lgrowth.get(jump, l).unwrap_or(0.0);
                    if p < VERY_SMALL {
                        continue;
                    }
                    let gain = wgrowth.get(jump, l).unwrap_or(0.0);
                    let dest = k.saturating_add(jump).min(top);
                    if let Some(slot) = scatter.get_mut(dest) {
                        let moved = p * cell.count;
                        let weight_moved = moved * (cell.mean_weight + gain);
                        slot.0 += moved;
                        slot.1 += weight_moved;
                    }
                }
            }
            for (cell, &(number, weight_sum)) in row.cells.iter_mut().zip(scatter.iter()) {
                if number < VERY_SMALL {
                    cell.zero();
                } else {
                    cell.count = number;
                    cell.mean_weight = weight_sum / number;
                }
            }
        }
        Ok(())
    }

    /// Moves every age class up one year.
    ///
    /// The oldest age is a plus group: it keeps its own fish and receives
    /// the previous age. Younger rows shift up; the youngest is zeroed for
    /// the incoming recruits. Fish whose length group falls outside the
    /// destination window are dropped with a warning.
    pub fn increment_age(&mut self) {
        if self.rows.len() <= 1 {
            return;
        }
        let mut lost = 0.0_f64;
        // Fold the second-oldest row into the plus group.
        let plus = self.rows.len().saturating_sub(1);
        lost += self.merge_row_up(plus, true);
        // Shift the remaining rows up, oldest first.
        for target in (1..plus).rev() {
            lost += self.merge_row_up(target, false);
        }
        if let Some(first) = self.rows.first_mut() {
            first.zero();
        }
        if lost > VERY_SMALL {
            warn!(lost, "aging dropped fish outside destination length windows");
        }
    }

    /// Moves row `target - 1` into row `target`; returns the count dropped
    /// by window clipping. `keep_existing` preserves the target's current
    /// fish (plus-group fold) instead of replacing them.
    fn merge_row_up(&mut self, target: usize, keep_existing: bool) -> f64 {
        let mut lost = 0.0_f64;
        if target == 0 {
            return lost;
        }
        let Some((head, tail)) = self.rows.split_at_mut_checked(target) else {
            return lost;
        };
        let (Some(source), Some(dest)) = (head.last(), tail.first_mut()) else {
            return lost;
        };
        if !keep_existing {
            dest.zero();
        }
        for (l, cell) in source.iter_cells() {
            if cell.count < VERY_SMALL {
                continue;
            }
            if let Some(slot) = dest.cell_mut(l) {
                *slot += *cell;
            } else {
                lost += cell.count;
            }
        }
        // Clear the vacated source row; a younger row will move into it next.
        if let Some(source) = head.last_mut() {
            source.zero();
        }
        lost
    }
}

/// Factor for global length group `l`, mapped through the index.
fn factor_for_group(factors: &[f64], ci: &ConversionIndex, l: usize) -> Option<f64> {
    if ci.same_dl() {
        return l
            .checked_add_signed(ci.offset())
            .and_then(|t| factors.get(t))
            .copied();
    }
    if ci.target_is_finer() {
        // Average the finer factors covering this group.
        let mut sum = 0.0_f64;
        let mut n = 0usize;
        for t in ci.min_pos()..ci.max_pos() {
            if ci.pos(t).is_ok_and(|p| p == l)
                && let Some(f) = factors.get(t)
            {
                sum += *f;
                n = n.saturating_add(1);
            }
        }
        if n == 0 {
            return None;
        }
        #[allow(clippy::cast_precision_loss)] // Group fan-outs are tiny integers.
        return Some(sum / n as f64);
    }
    ci.pos(l).ok().and_then(|t| factors.get(t)).copied()
}
