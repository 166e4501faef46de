//! [`ConversionIndex`], a precomputed mapping between two length divisions.
//!
//! Built once from a source and a target [`LengthDivision`], the index
//! captures everything the remapping routines need at run time:
//!
//! - when both divisions share group width and boundary alignment, a single
//!   integer [`offset`](ConversionIndex::offset) relates their indices;
//! - otherwise a position table maps every group of the *finer* division to
//!   the overlapping group of the coarser one, together with how many finer
//!   groups share that coarser group ([`nrof`](ConversionIndex::nrof));
//! - [`min_pos`](ConversionIndex::min_pos) and
//!   [`max_pos`](ConversionIndex::max_pos) bound the valid finer-side range,
//!   and callers must clip their loops to `[min_pos, max_pos)`.
//!
//! Lookups outside the valid range return
//! [`PopError::PositionOutOfRange`]; the tables themselves are immutable
//! once built.

use crate::division::LengthDivision;
use crate::error::PopError;

/// Immutable mapping between a source and a target [`LengthDivision`].
#[derive(Debug, Clone)]
pub struct ConversionIndex {
    same_dl: bool,
    offset: isize,
    target_is_finer: bool,
    min_pos: usize,
    max_pos: usize,
    pos_table: Vec<usize>,
    nrof_table: Vec<usize>,
    source_groups: usize,
    target_groups: usize,
}

impl ConversionIndex {
    /// Builds the mapping from `source` onto `target`.
    ///
    /// # Errors
    ///
    /// Fails with [`PopError::NoOverlap`] when the two divisions cover
    /// disjoint length ranges.
    pub fn build(source: &LengthDivision, target: &LengthDivision) -> Result<Self, PopError> {
        let overlap_lo = source.min_length().max(target.min_length());
        let overlap_hi = source.max_length().min(target.max_length());
        if overlap_hi <= overlap_lo {
            return Err(PopError::NoOverlap {
                source_min: source.min_length(),
                source_max: source.max_length(),
                target_min: target.min_length(),
                target_max: target.max_length(),
            });
        }

        let source_groups = source.num_groups();
        let target_groups = target.num_groups();

        if source.aligned_with(target) {
            return Ok(Self::build_aligned(source, target));
        }

        let source_in_overlap = groups_in_range(source, overlap_lo, overlap_hi);
        let target_in_overlap = groups_in_range(target, overlap_lo, overlap_hi);
        let target_is_finer = target_in_overlap.len() > source_in_overlap.len();
        let (finer, coarser, finer_range) = if target_is_finer {
            (target, source, target_in_overlap)
        } else {
            (source, target, source_in_overlap)
        };

        let min_pos = finer_range.first().copied().unwrap_or(0);
        let max_pos = finer_range
            .last()
            .map_or(min_pos, |last| last.saturating_add(1));
        let pos_table: Vec<usize> = finer_range
            .iter()
            .filter_map(|&i| {
                let mid = finer.mean_length(i)?;
                coarser.group_for(mid)
            })
            .collect();
        let nrof_table = pos_table
            .iter()
            .map(|p| pos_table.iter().filter(|q| *q == p).count())
            .collect();

        Ok(Self {
            same_dl: false,
            offset: 0,
            target_is_finer,
            min_pos,
            max_pos,
            pos_table,
            nrof_table,
            source_groups,
            target_groups,
        })
    }

    /// Builds the constant-shift mapping for width-aligned divisions.
    fn build_aligned(source: &LengthDivision, target: &LengthDivision) -> Self {
        let width = source.dl().unwrap_or(1.0);
        let shift = (source.min_length() - target.min_length()) / width;
        #[allow(clippy::cast_possible_truncation)]
        // Boundary shifts are small whole numbers of groups.
        let offset = shift.round() as isize;

        let source_groups = source.num_groups();
        let target_groups = target.num_groups();
        let min_pos = usize::try_from(offset.checked_neg().unwrap_or(0).max(0)).unwrap_or(0);
        let max_pos = source_groups.min(
            isize::try_from(target_groups)
                .ok()
                .and_then(|t| t.checked_sub(offset))
                .and_then(|m| usize::try_from(m).ok())
                .unwrap_or(0),
        );

        Self {
            same_dl: true,
            offset,
            target_is_finer: false,
            min_pos,
            max_pos: max_pos.max(min_pos),
            pos_table: Vec::new(),
            nrof_table: Vec::new(),
            source_groups,
            target_groups,
        }
    }

    /// Whether the two divisions share group width and alignment.
    #[must_use]
    pub const fn same_dl(&self) -> bool {
        self.same_dl
    }

    /// Constant index shift for the aligned case: `target = source + offset`.
    #[must_use]
    pub const fn offset(&self) -> isize {
        self.offset
    }

    /// Whether the target division is the finer of the two.
    ///
    /// When true, [`pos`](Self::pos) is indexed by *target* groups; when
    /// false, by *source* groups. The position tables always live on the
    /// finer side of the mapping.
    #[must_use]
    pub const fn target_is_finer(&self) -> bool {
        self.target_is_finer
    }

    /// First finer-side index with a valid mapping.
    #[must_use]
    pub const fn min_pos(&self) -> usize {
        self.min_pos
    }

    /// One past the last finer-side index with a valid mapping.
    #[must_use]
    pub const fn max_pos(&self) -> usize {
        self.max_pos
    }

    /// Number of groups in the source division.
    #[must_use]
    pub const fn source_groups(&self) -> usize {
        self.source_groups
    }

    /// Number of groups in the target division.
    #[must_use]
    pub const fn target_groups(&self) -> usize {
        self.target_groups
    }

    /// Coarser-side group that finer-side group `i` maps into.
    ///
    /// # Errors
    ///
    /// Fails with [`PopError::PositionOutOfRange`] when `i` lies outside
    /// `[min_pos, max_pos)`.
    pub fn pos(&self, i: usize) -> Result<usize, PopError> {
        let out_of_range = || PopError::PositionOutOfRange {
            index: i,
            min: self.min_pos,
            max: self.max_pos,
        };
        if i < self.min_pos || i >= self.max_pos {
            return Err(out_of_range());
        }
        if self.same_dl {
            return i
                .checked_add_signed(self.offset)
                .filter(|t| *t < self.target_groups)
                .ok_or_else(out_of_range);
        }
        i.checked_sub(self.min_pos)
            .and_then(|k| self.pos_table.get(k))
            .copied()
            .ok_or_else(out_of_range)
    }

    /// How many finer-side groups share the same coarser group as `i`.
    ///
    /// # Errors
    ///
    /// Fails with [`PopError::PositionOutOfRange`] when `i` lies outside
    /// `[min_pos, max_pos)`.
    pub fn nrof(&self, i: usize) -> Result<usize, PopError> {
        if i < self.min_pos || i >= self.max_pos {
            return Err(PopError::PositionOutOfRange {
                index: i,
                min: self.min_pos,
                max: self.max_pos,
            });
        }
        if self.same_dl {
            return Ok(1);
        }
        i.checked_sub(self.min_pos)
            .and_then(|k| self.nrof_table.get(k))
            .copied()
            .ok_or(PopError::PositionOutOfRange {
                index: i,
                min: self.min_pos,
                max: self.max_pos,
            })
    }
}

/// Indices of the groups whose midpoint falls inside `[lo, hi)`.
fn groups_in_range(division: &LengthDivision, lo: f64, hi: f64) -> Vec<usize> {
    (0..division.num_groups())
        .filter(|&i| {
            division
                .mean_length(i)
                .is_some_and(|mid| mid >= lo && mid < hi)
        })
        .collect()
}
