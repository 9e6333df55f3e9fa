use chrono::{TimeZone, Utc};
use pieuvre::statistics::{StatisticPeriod, StatisticsStore, statistic_id};

fn day_period(day: u32, value: f64) -> StatisticPeriod {
    StatisticPeriod {
        period_start: Utc.with_ymd_and_hms(2025, 3, day, 0, 0, 0).unwrap(),
        period_end: Utc.with_ymd_and_hms(2025, 3, day + 1, 0, 0, 0).unwrap(),
        value,
    }
}

#[test]
fn backfill_sorts_history_and_accumulates() {
    let tmp = tempfile::tempdir().unwrap();
    let mut store = StatisticsStore::new(tmp.path().join("stats.json"));

    let id = statistic_id("PRM123", "consumption_hc");
    let appended = store.import(&id, &[day_period(3, 4.0), day_period(1, 2.0), day_period(2, 3.0)]);
    assert_eq!(appended, 3);

    let series = store.series(&id).unwrap();
    assert_eq!(series[0].value, 2.0);
    assert_eq!(series[0].sum, 2.0);
    assert_eq!(series[2].value, 4.0);
    assert_eq!(series[2].sum, 9.0);
}

#[test]
fn reimport_is_idempotent() {
    let tmp = tempfile::tempdir().unwrap();
    let mut store = StatisticsStore::new(tmp.path().join("stats.json"));

    let periods = [day_period(1, 2.0), day_period(2, 3.0)];
    assert_eq!(store.import("s", &periods), 2);
    assert_eq!(store.import("s", &periods), 0);
    assert_eq!(store.series("s").unwrap().len(), 2);
}

#[test]
fn incremental_append_continues_sum() {
    let tmp = tempfile::tempdir().unwrap();
    let mut store = StatisticsStore::new(tmp.path().join("stats.json"));

    store.import("s", &[day_period(1, 2.0), day_period(2, 3.0)]);
    // Overlapping window: only day 3 is new
    assert_eq!(store.import("s", &[day_period(2, 3.0), day_period(3, 4.0)]), 1);

    let series = store.series("s").unwrap();
    assert_eq!(series.len(), 3);
    assert_eq!(series[2].sum, 9.0);
}

#[test]
fn save_and_load_roundtrip() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("stats.json");

    let mut store = StatisticsStore::new(&path);
    store.import("pieuvre:PCE1_consumption", &[day_period(1, 56.0)]);
    store.save().unwrap();

    let loaded = StatisticsStore::load(&path).unwrap();
    let series = loaded.series("pieuvre:PCE1_consumption").unwrap();
    assert_eq!(series.len(), 1);
    assert_eq!(series[0].value, 56.0);
    assert_eq!(series[0].sum, 56.0);
}

#[test]
fn load_missing_file_yields_empty_store() {
    let tmp = tempfile::tempdir().unwrap();
    let store = StatisticsStore::load(tmp.path().join("missing.json")).unwrap();
    assert!(store.is_empty());
}
