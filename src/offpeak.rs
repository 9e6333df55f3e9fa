//! Off-peak (Heures Creuses) schedule evaluation.
//!
//! Distributor contracts carry an off-peak label such as
//! `HC (0H50-6H50, 12H20-14H20)`. This module parses the label into time
//! ranges and answers whether a given wall-clock instant falls inside any of
//! them. Ranges may cross midnight.

use chrono::{NaiveTime, TimeZone, Timelike, Utc};
use serde::Serialize;

const MINUTES_PER_DAY: u32 = 24 * 60;

/// One off-peak range in minutes since midnight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeRange {
    pub start_minutes: u32,
    pub end_minutes: u32,
}

impl TimeRange {
    /// Duration in minutes, accounting for midnight wrap
    pub fn duration_minutes(&self) -> u32 {
        if self.end_minutes >= self.start_minutes {
            self.end_minutes - self.start_minutes
        } else {
            (MINUTES_PER_DAY - self.start_minutes) + self.end_minutes
        }
    }

    /// Membership test. Same-day ranges are inclusive on both ends; a range
    /// that wraps midnight is active from start onwards or up to end.
    pub fn contains(&self, minutes: u32) -> bool {
        if self.end_minutes <= self.start_minutes {
            minutes >= self.start_minutes || minutes <= self.end_minutes
        } else {
            (self.start_minutes..=self.end_minutes).contains(&minutes)
        }
    }

    /// Start as "HH:MM"
    pub fn start_hhmm(&self) -> String {
        format!("{:02}:{:02}", self.start_minutes / 60, self.start_minutes % 60)
    }

    /// End as "HH:MM"
    pub fn end_hhmm(&self) -> String {
        format!("{:02}:{:02}", self.end_minutes / 60, self.end_minutes % 60)
    }
}

/// Parsed off-peak schedule for one meter
#[derive(Debug, Clone, Default, Serialize)]
pub struct OffPeakSchedule {
    /// Leading label kind, usually "HC"
    pub kind: Option<String>,
    /// Non-overlapping ranges, sorted by start
    pub ranges: Vec<TimeRange>,
}

impl OffPeakSchedule {
    /// Parse a distributor label. Unparseable parts are skipped; a label with
    /// no recognizable range yields an empty schedule.
    pub fn parse(label: &str) -> Self {
        let kind = {
            let prefix: String = label.chars().take_while(char::is_ascii_uppercase).collect();
            (!prefix.is_empty()).then_some(prefix)
        };

        let mut ranges: Vec<TimeRange> = label
            .split(|c: char| !(c.is_ascii_digit() || c == 'H' || c == 'h' || c == '-'))
            .filter_map(parse_range_token)
            .collect();

        // Keep ranges sorted and drop any that overlap an already kept one.
        // A wrapping candidate reaches back past midnight, so it has to be
        // checked against every kept range, not only the previous one.
        ranges.sort_by_key(|r| r.start_minutes);
        let mut kept: Vec<TimeRange> = Vec::with_capacity(ranges.len());
        for range in ranges {
            if kept.iter().any(|previous| ranges_overlap(*previous, range)) {
                continue;
            }
            kept.push(range);
        }

        Self { kind, ranges: kept }
    }

    /// Total off-peak hours per day
    pub fn total_hours(&self) -> f64 {
        let minutes: u32 = self.ranges.iter().map(TimeRange::duration_minutes).sum();
        (f64::from(minutes) / 60.0 * 100.0).round() / 100.0
    }

    /// Whether the given wall-clock time is inside any range
    pub fn is_active_at(&self, time: NaiveTime) -> bool {
        let minutes = time.hour() * 60 + time.minute();
        self.ranges.iter().any(|r| r.contains(minutes))
    }

    /// Whether "now" in the given timezone is inside any range
    pub fn is_active_now(&self, tz: chrono_tz::Tz) -> bool {
        let now = tz.from_utc_datetime(&Utc::now().naive_utc()).time();
        self.is_active_at(now)
    }

    /// Whether any range was parsed
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

/// Parse one "0H50-6H50" token into a range
fn parse_range_token(token: &str) -> Option<TimeRange> {
    let (start, end) = token.split_once('-')?;
    Some(TimeRange {
        start_minutes: parse_hhmm_component(start)?,
        end_minutes: parse_hhmm_component(end)?,
    })
}

/// Parse "6H50" into minutes since midnight
fn parse_hhmm_component(component: &str) -> Option<u32> {
    let (hours, minutes) = component.split_once(['H', 'h'])?;
    let hours: u32 = hours.parse().ok()?;
    let minutes: u32 = minutes.parse().ok()?;
    if hours >= 24 || minutes >= 60 {
        return None;
    }
    Some(hours * 60 + minutes)
}

/// Overlap test between a kept range and a sorted candidate.
/// `next` starts at or after `previous`.
fn ranges_overlap(previous: TimeRange, next: TimeRange) -> bool {
    // A wrapping previous covers the rest of the day, so everything sorted
    // after it overlaps
    if previous.end_minutes <= previous.start_minutes {
        return true;
    }
    // A wrapping next overlaps when its head reaches previous or its
    // past-midnight tail climbs back up to previous's start
    if next.end_minutes <= next.start_minutes {
        return next.start_minutes <= previous.end_minutes
            || next.end_minutes >= previous.start_minutes;
    }
    next.start_minutes <= previous.end_minutes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_component() {
        assert_eq!(parse_hhmm_component("6H50"), Some(410));
        assert_eq!(parse_hhmm_component("0H00"), Some(0));
        assert_eq!(parse_hhmm_component("25H00"), None);
        assert_eq!(parse_hhmm_component("6H75"), None);
        assert_eq!(parse_hhmm_component("garbage"), None);
    }

    #[test]
    fn test_duration_wraps_midnight() {
        let range = TimeRange {
            start_minutes: 22 * 60,
            end_minutes: 6 * 60,
        };
        assert_eq!(range.duration_minutes(), 8 * 60);
    }

    #[test]
    fn test_overlap_dropped() {
        let schedule = OffPeakSchedule::parse("HC (1H00-5H00, 4H00-6H00)");
        assert_eq!(schedule.ranges.len(), 1);
        assert_eq!(schedule.ranges[0].start_minutes, 60);
    }

    #[test]
    fn test_wrapping_tail_overlap_dropped() {
        // The 22H00-6H00 tail covers 2H00-4H00 entirely
        let schedule = OffPeakSchedule::parse("HC (2H00-4H00, 22H00-6H00)");
        assert_eq!(schedule.ranges.len(), 1);
        assert_eq!(schedule.ranges[0].start_minutes, 120);
        assert!((schedule.total_hours() - 2.0).abs() < 1e-9);

        // The wrapped tail can also reach past a non-adjacent kept range
        let schedule = OffPeakSchedule::parse("HC (2H00-4H00, 10H00-12H00, 22H00-6H00)");
        assert_eq!(schedule.ranges.len(), 2);
        assert_eq!(schedule.ranges[1].start_minutes, 600);
    }
}
