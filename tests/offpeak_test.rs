use chrono::NaiveTime;
use pieuvre::offpeak::OffPeakSchedule;

#[test]
fn parse_distributor_label() {
    let schedule = OffPeakSchedule::parse("HC (0H50-6H50, 12H20-14H20)");
    assert_eq!(schedule.kind.as_deref(), Some("HC"));
    assert_eq!(schedule.ranges.len(), 2);
    assert_eq!(schedule.ranges[0].start_hhmm(), "00:50");
    assert_eq!(schedule.ranges[0].end_hhmm(), "06:50");
    assert_eq!(schedule.ranges[1].start_hhmm(), "12:20");
    assert_eq!(schedule.ranges[1].end_hhmm(), "14:20");
    assert!((schedule.total_hours() - 8.0).abs() < 1e-9);
}

#[test]
fn boundaries_are_inclusive() {
    let schedule = OffPeakSchedule::parse("HC (12H20-14H20)");
    let at = |h, m| schedule.is_active_at(NaiveTime::from_hms_opt(h, m, 0).unwrap());

    assert!(at(12, 20));
    assert!(at(13, 0));
    assert!(at(14, 20));
    assert!(!at(12, 19));
    assert!(!at(14, 21));
}

#[test]
fn overnight_range_wraps_midnight() {
    let schedule = OffPeakSchedule::parse("HC (22H00-6H00)");
    let at = |h, m| schedule.is_active_at(NaiveTime::from_hms_opt(h, m, 0).unwrap());

    assert!(at(23, 0));
    assert!(at(0, 30));
    assert!(at(6, 0));
    assert!(!at(12, 0));
    assert!(!at(21, 59));
    assert!((schedule.total_hours() - 8.0).abs() < 1e-9);
}

#[test]
fn lowercase_hour_separator_accepted() {
    let schedule = OffPeakSchedule::parse("HC (2h00-7h00)");
    assert_eq!(schedule.ranges.len(), 1);
    assert!((schedule.total_hours() - 5.0).abs() < 1e-9);
}

#[test]
fn garbage_label_yields_empty_schedule() {
    let schedule = OffPeakSchedule::parse("no schedule here");
    assert!(schedule.is_empty());
    assert!(!schedule.is_active_at(NaiveTime::from_hms_opt(3, 0, 0).unwrap()));
    assert_eq!(schedule.total_hours(), 0.0);

    assert!(OffPeakSchedule::parse("").is_empty());
    assert!(OffPeakSchedule::parse("HC (25H00-99H99)").is_empty());
}

#[test]
fn ranges_are_sorted_and_overlaps_dropped() {
    let schedule = OffPeakSchedule::parse("HC (12H20-14H20, 0H50-6H50)");
    assert_eq!(schedule.ranges[0].start_hhmm(), "00:50");

    let schedule = OffPeakSchedule::parse("HC (1H00-5H00, 3H00-8H00)");
    assert_eq!(schedule.ranges.len(), 1);
    assert_eq!(schedule.ranges[0].end_hhmm(), "05:00");
}

#[test]
fn overnight_range_covering_earlier_range_dropped() {
    // 22H00-6H00 wraps midnight and fully contains 2H00-4H00
    let schedule = OffPeakSchedule::parse("HC (2H00-4H00, 22H00-6H00)");
    assert_eq!(schedule.ranges.len(), 1);
    assert_eq!(schedule.ranges[0].start_hhmm(), "02:00");
    assert!((schedule.total_hours() - 2.0).abs() < 1e-9);

    // A disjoint overnight tail is kept
    let schedule = OffPeakSchedule::parse("HC (2H00-4H00, 22H00-1H00)");
    assert_eq!(schedule.ranges.len(), 2);
    assert!((schedule.total_hours() - 5.0).abs() < 1e-9);
}
