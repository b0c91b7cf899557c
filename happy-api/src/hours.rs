//! Opening-hours text such as `"07:00 - 14:00, 17:30 - 22:00"` and the
//! time-of-day periods the restaurant list can be filtered by.

use serde::Deserialize;

const MINUTES_PER_DAY: u16 = 24 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Morning,
    Afternoon,
    LateAfternoon,
    Evening,
}

impl Period {
    /// Inclusive bounds in minutes since midnight.
    pub fn bounds(&self) -> (u16, u16) {
        match self {
            Period::Morning => (360, 660),
            Period::Afternoon => (660, 840),
            Period::LateAfternoon => (840, 1020),
            Period::Evening => (1020, 1320),
        }
    }
}

impl std::str::FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "morning" => Ok(Period::Morning),
            "afternoon" => Ok(Period::Afternoon),
            "lateafternoon" => Ok(Period::LateAfternoon),
            "evening" => Ok(Period::Evening),
            _ => Err(format!("unknown time period: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpeningRange {
    pub start: u16,
    pub end: u16,
}

fn parse_clock(text: &str) -> Option<u16> {
    let (hours, minutes) = text.trim().split_once(':')?;
    let hours: u16 = hours.trim().parse().ok()?;
    let minutes: u16 = minutes.trim().parse().ok()?;
    if hours > 24 || minutes > 59 || (hours == 24 && minutes > 0) {
        return None;
    }
    Some(hours * 60 + minutes)
}

/// Parses every `HH:MM - HH:MM` range; malformed segments are skipped.
/// A range that ends before it starts runs past midnight.
pub fn parse_opening_hours(text: &str) -> Vec<OpeningRange> {
    text.split(',')
        .filter_map(|segment| {
            let (start, end) = segment.split_once('-')?;
            let start = parse_clock(start)?;
            let mut end = parse_clock(end)?;
            if end < start {
                end += MINUTES_PER_DAY;
            }
            Some(OpeningRange { start, end })
        })
        .collect()
}

pub fn is_open_during(opening_hours: &str, period: Period) -> bool {
    let (period_start, period_end) = period.bounds();
    parse_opening_hours(opening_hours)
        .iter()
        .any(|range| range.start <= period_end && range.end >= period_start)
}
