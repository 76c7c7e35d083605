//! Calendar-month season buckets.

use crate::types::Season;
use chrono::{Datelike, NaiveDate};

/// Classify a flight date.
///
/// May and July are `PEAK_EID`, December and January are `PEAK_WINTER`, any
/// other month is `NON_PEAK`. A missing date is `UNKNOWN`. The buckets are a
/// fixed calendar rule and do not track the lunar calendar.
pub fn classify_season(date: Option<NaiveDate>) -> Season {
    match date.map(|d| d.month()) {
        Some(5 | 7) => Season::PeakEid,
        Some(12 | 1) => Season::PeakWinter,
        Some(_) => Season::NonPeak,
        None => Season::Unknown,
    }
}
