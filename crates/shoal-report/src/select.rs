//! Name resolution shared by the aggregators.

use shoal_core::Ecosystem;

use crate::error::ReportError;

/// Ordinal of a named stock.
pub(crate) fn stock_ordinal(eco: &Ecosystem, name: &str) -> Result<usize, ReportError> {
    eco.stocks
        .iter()
        .position(|stock| stock.name() == name)
        .ok_or_else(|| ReportError::UnknownStock {
            name: name.to_owned(),
        })
}

/// Ordinal of a named fleet.
pub(crate) fn fleet_ordinal(eco: &Ecosystem, name: &str) -> Result<usize, ReportError> {
    eco.fleets
        .iter()
        .position(|fleet| fleet.name() == name)
        .ok_or_else(|| ReportError::UnknownFleet {
            name: name.to_owned(),
        })
}

/// Resolves named area groups to global ordinals, rejecting an empty
/// selection or an empty group.
pub(crate) fn area_groups(
    eco: &Ecosystem,
    groups: &[Vec<String>],
) -> Result<Vec<Vec<usize>>, ReportError> {
    if groups.is_empty() {
        return Err(ReportError::EmptySelection { what: "area" });
    }
    groups
        .iter()
        .map(|group| {
            if group.is_empty() {
                return Err(ReportError::EmptySelection { what: "area" });
            }
            group
                .iter()
                .map(|name| {
                    eco.areas
                        .iter()
                        .position(|area| area == name)
                        .ok_or_else(|| ReportError::UnknownArea { name: name.clone() })
                })
                .collect()
        })
        .collect()
}
