//! Slice-level remapping between length divisions.
//!
//! Four operations move quantities through a [`ConversionIndex`]:
//!
//! - [`accumulate_cells`] sums source cells onto a coarser-or-equal target
//!   (aggregation: counts add, weights combine as count-weighted means);
//! - [`accumulate_values`] does the same for plain per-group quantities such
//!   as consumption figures, splitting evenly onto a finer target;
//! - [`add_cells_remapped`] adds a scaled windowed row onto another windowed
//!   row, handling the aligned-offset, coarser-target and finer-target cases;
//! - [`interpolate_values`] carries per-group *values* (mean increments, not
//!   summed quantities) across divisions by replicating coarse values onto
//!   finer groups and averaging fine values onto coarser ones.
//!
//! The finer-target addition keeps the historical behavior of dividing the
//! accumulated count by the group fan-out after the addition. A zero group
//! count can never come out of a well-formed index; if one is seen anyway it
//! is logged and the division is skipped so the simulation keeps running.

use tracing::error;

use crate::cell::PopCell;
use crate::conversion::ConversionIndex;
use crate::error::PopError;

/// Adds every mapped source cell onto the target, combining populations.
///
/// `source` is a window starting at global group `source_start` of the source
/// division; `target` must cover the whole target division. Cells outside
/// the mapped range are left untouched.
///
/// # Errors
///
/// Fails when `target` does not span the target division.
pub fn accumulate_cells(
    target: &mut [PopCell],
    source: &[PopCell],
    source_start: usize,
    ci: &ConversionIndex,
) -> Result<(), PopError> {
    if target.len() != ci.target_groups() {
        return Err(PopError::LengthVectorSize {
            expected: ci.target_groups(),
            actual: target.len(),
        });
    }
    let source_end = source_start.saturating_add(source.len());

    if ci.target_is_finer() {
        // Spread each coarse source cell evenly over its finer target groups
        // so aggregate counts are conserved.
        for t in ci.min_pos()..ci.max_pos() {
            let s = ci.pos(t)?;
            if s < source_start || s >= source_end {
                continue;
            }
            let share = split_share(ci.nrof(t)?);
            let Some(cell) = s.checked_sub(source_start).and_then(|k| source.get(k)) else {
                continue;
            };
            if let Some(slot) = target.get_mut(t) {
                *slot += *cell * share;
            }
        }
        return Ok(());
    }

    let lo = ci.min_pos().max(source_start);
    let hi = ci.max_pos().min(source_end);
    for s in lo..hi {
        let Ok(t) = ci.pos(s) else { continue };
        let Some(cell) = s.checked_sub(source_start).and_then(|k| source.get(k)) else {
            continue;
        };
        if let Some(slot) = target.get_mut(t) {
            *slot += *cell;
        }
    }
    Ok(())
}

/// Sums per-group quantities from `source` onto `target` by position.
///
/// Unlike [`interpolate_values`] this treats entries as summed quantities:
/// a coarser target accumulates many-to-one and a finer target splits each
/// source quantity evenly over its groups, so totals are conserved. The
/// target is accumulated into, not zeroed; both slices must span their
/// divisions.
///
/// # Errors
///
/// Fails when either slice does not span its division.
pub fn accumulate_values(
    target: &mut [f64],
    source: &[f64],
    ci: &ConversionIndex,
) -> Result<(), PopError> {
    if target.len() != ci.target_groups() {
        return Err(PopError::LengthVectorSize {
            expected: ci.target_groups(),
            actual: target.len(),
        });
    }
    if source.len() != ci.source_groups() {
        return Err(PopError::LengthVectorSize {
            expected: ci.source_groups(),
            actual: source.len(),
        });
    }

    if ci.target_is_finer() {
        for t in ci.min_pos()..ci.max_pos() {
            let s = ci.pos(t)?;
            let share = split_share(ci.nrof(t)?);
            if let (Some(slot), Some(value)) = (target.get_mut(t), source.get(s)) {
                *slot += *value * share;
            }
        }
        return Ok(());
    }

    for s in ci.min_pos()..ci.max_pos() {
        let Ok(t) = ci.pos(s) else { continue };
        if let (Some(slot), Some(value)) = (target.get_mut(t), source.get(s)) {
            *slot += *value;
        }
    }
    Ok(())
}

/// Adds `source` scaled by `ratio` onto `target` through the index.
///
/// Both slices are windows of their divisions, starting at the given global
/// group indices. Aligned divisions shift by the index offset; a coarser
/// target accumulates many-to-one; a finer target copies the coarse cell in
/// and then divides the accumulated count by the fan-out of the group.
pub fn add_cells_remapped(
    target: &mut [PopCell],
    target_start: usize,
    source: &[PopCell],
    source_start: usize,
    ci: &ConversionIndex,
    ratio: f64,
) {
    let target_end = target_start.saturating_add(target.len());
    let source_end = source_start.saturating_add(source.len());

    if ci.same_dl() {
        for (k, cell) in source.iter().enumerate() {
            let Some(t) = source_start
                .saturating_add(k)
                .checked_add_signed(ci.offset())
            else {
                continue;
            };
            if t < target_start || t >= target_end {
                continue;
            }
            if let Some(slot) = t.checked_sub(target_start).and_then(|i| target.get_mut(i)) {
                *slot += *cell * ratio;
            }
        }
        return;
    }

    if ci.target_is_finer() {
        let lo = ci.min_pos().max(target_start);
        let hi = ci.max_pos().min(target_end);
        for t in lo..hi {
            let Ok(s) = ci.pos(t) else { continue };
            if s < source_start || s >= source_end {
                continue;
            }
            let Some(cell) = s.checked_sub(source_start).and_then(|k| source.get(k)) else {
                continue;
            };
            let fanout = ci.nrof(t).unwrap_or(0);
            let Some(slot) = t.checked_sub(target_start).and_then(|i| target.get_mut(i)) else {
                continue;
            };
            *slot += *cell * ratio;
            if fanout == 0 {
                error!(position = t, "zero group fan-out in conversion, skipping count adjustment");
                continue;
            }
            slot.count /= split_count(fanout);
        }
        return;
    }

    let lo = ci.min_pos().max(source_start);
    let hi = ci.max_pos().min(source_end);
    for s in lo..hi {
        let Ok(t) = ci.pos(s) else { continue };
        if t < target_start || t >= target_end {
            continue;
        }
        let Some(cell) = s.checked_sub(source_start).and_then(|k| source.get(k)) else {
            continue;
        };
        if let Some(slot) = t.checked_sub(target_start).and_then(|i| target.get_mut(i)) {
            *slot += *cell * ratio;
        }
    }
}

/// Carries per-group values from `source` onto `target` by position.
///
/// Coarse values are replicated onto each finer group; fine values are
/// averaged onto their coarser group. Unmapped target groups are zeroed.
///
/// # Errors
///
/// Fails when either slice does not span its division.
pub fn interpolate_values(
    target: &mut [f64],
    source: &[f64],
    ci: &ConversionIndex,
) -> Result<(), PopError> {
    if target.len() != ci.target_groups() {
        return Err(PopError::LengthVectorSize {
            expected: ci.target_groups(),
            actual: target.len(),
        });
    }
    if source.len() != ci.source_groups() {
        return Err(PopError::LengthVectorSize {
            expected: ci.source_groups(),
            actual: source.len(),
        });
    }
    target.fill(0.0);

    if ci.same_dl() {
        for s in ci.min_pos()..ci.max_pos() {
            let Some(t) = s.checked_add_signed(ci.offset()) else {
                continue;
            };
            if let (Some(slot), Some(value)) = (target.get_mut(t), source.get(s)) {
                *slot = *value;
            }
        }
        return Ok(());
    }

    if ci.target_is_finer() {
        for t in ci.min_pos()..ci.max_pos() {
            let s = ci.pos(t)?;
            if let (Some(slot), Some(value)) = (target.get_mut(t), source.get(s)) {
                *slot = *value;
            }
        }
        return Ok(());
    }

    for s in ci.min_pos()..ci.max_pos() {
        let t = ci.pos(s)?;
        let fanout = ci.nrof(s)?;
        if fanout == 0 {
            error!(position = s, "zero group fan-out in conversion, skipping value average");
            continue;
        }
        let share = split_count(fanout);
        if let (Some(slot), Some(value)) = (target.get_mut(t), source.get(s)) {
            *slot += *value / share;
        }
    }
    Ok(())
}

/// Fan-out as a divisor.
#[allow(clippy::cast_precision_loss)] // Group fan-outs are tiny integers.
fn split_count(fanout: usize) -> f64 {
    fanout as f64
}

/// Even share ratio for spreading one coarse cell over `fanout` fine groups.
fn split_share(fanout: usize) -> f64 {
    if fanout == 0 {
        error!(fanout, "zero group fan-out in conversion, dropping spread");
        0.0
    } else {
        1.0 / split_count(fanout)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::division::LengthDivision;

    fn uniform(min: f64, max: f64, width: f64) -> LengthDivision {
        LengthDivision::uniform(min, max, width).unwrap()
    }

    fn cells(values: &[(f64, f64)]) -> Vec<PopCell> {
        values.iter().map(|&(n, w)| PopCell::new(n, w)).collect()
    }

    #[test]
    fn identity_accumulation_preserves_values() {
        let div = uniform(10.0, 40.0, 10.0);
        let ci = ConversionIndex::build(&div, &div).unwrap();
        let source = cells(&[(100.0, 1.0), (50.0, 2.0), (25.0, 4.0)]);
        let mut target = vec![PopCell::default(); 3];
        accumulate_cells(&mut target, &source, 0, &ci).unwrap();
        for (got, want) in target.iter().zip(source.iter()) {
            assert!((got.count - want.count).abs() < 1e-12);
            assert!((got.mean_weight - want.mean_weight).abs() < 1e-12);
        }
    }

    #[test]
    fn finer_source_sums_onto_coarser_target() {
        let source_div = uniform(0.0, 20.0, 5.0);
        let target_div = uniform(0.0, 20.0, 10.0);
        let ci = ConversionIndex::build(&source_div, &target_div).unwrap();
        let source = cells(&[(10.0, 1.0), (30.0, 3.0), (5.0, 2.0), (15.0, 2.0)]);
        let mut target = vec![PopCell::default(); 2];
        accumulate_cells(&mut target, &source, 0, &ci).unwrap();
        let first = target.first().unwrap();
        assert!((first.count - 40.0).abs() < 1e-12);
        // (10*1 + 30*3) / 40 = 2.5
        assert!((first.mean_weight - 2.5).abs() < 1e-12);
        let second = target.last().unwrap();
        assert!((second.count - 20.0).abs() < 1e-12);
    }

    #[test]
    fn aggregation_conserves_total_count_both_directions() {
        let coarse = uniform(0.0, 20.0, 10.0);
        let fine = uniform(0.0, 20.0, 5.0);
        let source = cells(&[(12.0, 1.0), (8.0, 2.0)]);

        let down = ConversionIndex::build(&coarse, &fine).unwrap();
        let mut finer_target = vec![PopCell::default(); 4];
        accumulate_cells(&mut finer_target, &source, 0, &down).unwrap();
        let total: f64 = finer_target.iter().map(|c| c.count).sum();
        assert!((total - 20.0).abs() < 1e-12);
    }

    #[test]
    fn quantity_accumulation_conserves_totals() {
        let coarse = uniform(0.0, 20.0, 10.0);
        let fine = uniform(0.0, 20.0, 5.0);

        let onto_coarse = ConversionIndex::build(&fine, &coarse).unwrap();
        let mut totals = vec![1.0, 0.0];
        accumulate_values(&mut totals, &[2.0, 4.0, 6.0, 8.0], &onto_coarse).unwrap();
        // Accumulated on top of the existing entry, not zeroed first.
        assert!((totals.first().copied().unwrap() - 7.0).abs() < 1e-12);
        assert!((totals.last().copied().unwrap() - 14.0).abs() < 1e-12);

        let onto_fine = ConversionIndex::build(&coarse, &fine).unwrap();
        let mut spread = vec![0.0; 4];
        accumulate_values(&mut spread, &[12.0, 8.0], &onto_fine).unwrap();
        assert!((spread.first().copied().unwrap() - 6.0).abs() < 1e-12);
        let total: f64 = spread.iter().sum();
        assert!((total - 20.0).abs() < 1e-12);
    }

    #[test]
    fn offset_addition_respects_windows() {
        let source_div = uniform(20.0, 40.0, 10.0);
        let target_div = uniform(0.0, 50.0, 10.0);
        let ci = ConversionIndex::build(&source_div, &target_div).unwrap();
        let source = cells(&[(10.0, 1.0), (20.0, 2.0)]);
        // Target window only covers groups [3, 5).
        let mut target = cells(&[(1.0, 1.0), (1.0, 1.0)]);
        add_cells_remapped(&mut target, 3, &source, 0, &ci, 1.0);
        // Source group 0 maps to target group 2, outside the window.
        let kept = target.first().unwrap();
        assert!((kept.count - 21.0).abs() < 1e-12);
        let untouched = target.last().unwrap();
        assert!((untouched.count - 1.0).abs() < 1e-12);
    }

    #[test]
    fn ratio_scales_added_counts() {
        let div = uniform(0.0, 30.0, 10.0);
        let ci = ConversionIndex::build(&div, &div).unwrap();
        let source = cells(&[(100.0, 1.0), (100.0, 1.0), (100.0, 1.0)]);
        let mut target = vec![PopCell::default(); 3];
        add_cells_remapped(&mut target, 0, &source, 0, &ci, 0.25);
        for cell in &target {
            assert!((cell.count - 25.0).abs() < 1e-12);
        }
    }

    #[test]
    fn finer_target_divides_count_after_addition() {
        let source_div = uniform(0.0, 20.0, 10.0);
        let target_div = uniform(0.0, 20.0, 5.0);
        let ci = ConversionIndex::build(&source_div, &target_div).unwrap();
        let source = cells(&[(40.0, 2.0), (8.0, 1.0)]);
        let mut target = vec![PopCell::default(); 4];
        add_cells_remapped(&mut target, 0, &source, 0, &ci, 1.0);
        // Each of the two finer halves of a coarse group carries half the count.
        let first = target.first().unwrap();
        assert!((first.count - 20.0).abs() < 1e-12);
        assert!((first.mean_weight - 2.0).abs() < 1e-12);
        let total: f64 = target.iter().map(|c| c.count).sum();
        assert!((total - 48.0).abs() < 1e-12);
    }

    #[test]
    fn interpolation_replicates_and_averages() {
        let coarse = uniform(0.0, 20.0, 10.0);
        let fine = uniform(0.0, 20.0, 5.0);

        let onto_fine = ConversionIndex::build(&coarse, &fine).unwrap();
        let mut fine_values = vec![0.0; 4];
        interpolate_values(&mut fine_values, &[3.0, 7.0], &onto_fine).unwrap();
        assert!((fine_values.first().copied().unwrap() - 3.0).abs() < 1e-12);
        assert!((fine_values.last().copied().unwrap() - 7.0).abs() < 1e-12);

        let onto_coarse = ConversionIndex::build(&fine, &coarse).unwrap();
        let mut coarse_values = vec![0.0; 2];
        interpolate_values(&mut coarse_values, &[2.0, 4.0, 6.0, 10.0], &onto_coarse).unwrap();
        assert!((coarse_values.first().copied().unwrap() - 3.0).abs() < 1e-12);
        assert!((coarse_values.last().copied().unwrap() - 8.0).abs() < 1e-12);
    }
}
