//! Criteria for checking whether a station reports daily data for a period.

use crate::types::station::DateRange;
use chrono::NaiveDate;

/// Specifies what a station's daily inventory must cover to be considered when
/// searching for stations.
///
/// These checks rely on the station metadata published by Meteostat and don't
/// guarantee that every single day within a reported range actually has data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequiredData {
    /// The station reports any daily data at all.
    Any,

    /// The station's daily range includes this date.
    SpecificDate(NaiveDate),

    /// The station's daily range fully contains `start..=end`.
    DateRange {
        /// The required start date (inclusive).
        start: NaiveDate,
        /// The required end date (inclusive).
        end: NaiveDate,
    },

    /// The station's daily range shares at least one day with `start..=end`.
    Overlap {
        /// The start of the period of interest (inclusive).
        start: NaiveDate,
        /// The end of the period of interest (inclusive).
        end: NaiveDate,
    },

    /// The station's daily range covers the full calendar year.
    Year(i32),
}

impl RequiredData {
    /// Checks a station's reported daily range against this requirement.
    ///
    /// A range without a start or end never satisfies any requirement.
    pub fn is_met_by(&self, inventory: &DateRange) -> bool {
        let (Some(inv_start), Some(inv_end)) = (inventory.start, inventory.end) else {
            return false;
        };
        match *self {
            RequiredData::Any => true,
            RequiredData::SpecificDate(req) => inv_start <= req && req <= inv_end,
            RequiredData::DateRange { start, end } => inv_start <= start && inv_end >= end,
            RequiredData::Overlap { start, end } => inv_start <= end && inv_end >= start,
            RequiredData::Year(year) => {
                let (Some(req_start), Some(req_end)) = (
                    NaiveDate::from_ymd_opt(year, 1, 1),
                    NaiveDate::from_ymd_opt(year, 12, 31),
                ) else {
                    return false;
                };
                inv_start <= req_start && inv_end >= req_end
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn range(start: NaiveDate, end: NaiveDate) -> DateRange {
        DateRange {
            start: Some(start),
            end: Some(end),
        }
    }

    #[test]
    fn test_unknown_inventory_never_matches() {
        let open = DateRange {
            start: Some(d(2000, 1, 1)),
            end: None,
        };
        assert!(!RequiredData::Any.is_met_by(&open));
    }

    #[test]
    fn test_containment_versus_overlap() {
        let inv = range(d(2023, 6, 1), d(2025, 12, 31));
        let full = RequiredData::DateRange {
            start: d(2022, 1, 1),
            end: d(2025, 3, 24),
        };
        let overlap = RequiredData::Overlap {
            start: d(2022, 1, 1),
            end: d(2025, 3, 24),
        };
        assert!(!full.is_met_by(&inv));
        assert!(overlap.is_met_by(&inv));

        let disjoint = range(d(1950, 1, 1), d(1990, 12, 31));
        assert!(!overlap.is_met_by(&disjoint));
    }

    #[test]
    fn test_specific_date_and_year() {
        let inv = range(d(2020, 3, 1), d(2024, 6, 30));
        assert!(RequiredData::SpecificDate(d(2020, 3, 1)).is_met_by(&inv));
        assert!(!RequiredData::SpecificDate(d(2024, 7, 1)).is_met_by(&inv));
        assert!(RequiredData::Year(2023).is_met_by(&inv));
        assert!(!RequiredData::Year(2020).is_met_by(&inv));
    }
}
