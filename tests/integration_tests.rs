use std::io::Write;
use std::path::{Path, PathBuf};

use intervalrs::config::AppConfig;
use intervalrs::export::{self, csv as csv_export, json as json_export, text as text_export};
use intervalrs::import::{load_intervals, parse_interval_arg, ImportManager};
use intervalrs::metrics::user::{Aggregation, UserMetric, UserMetricConfig};
use intervalrs::summary::EMPTY_SELECTION_PLACEHOLDER;
use intervalrs::{
    IntervalSelection, IntervalSummary, MetricContext, MetricFactory, RideFile, RideSplitter,
    SplitCache, Units,
};
use tempfile::TempDir;

/// Integration tests covering import, selection, summary and export together

/// Ten minutes at 1 Hz: 200 W for the first five minutes, 300 W after
fn write_ride_csv(dir: &Path) -> PathBuf {
    let path = dir.join("ride.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "secs,km,watts,hr,cad,kph,alt").unwrap();
    for secs in 0..600 {
        let watts = if secs < 300 { 200 } else { 300 };
        let alt = 100.0 + (secs / 60) as f64;
        writeln!(
            file,
            "{},{:.3},{},140,90,36.0,{}",
            secs,
            secs as f64 * 0.01,
            watts,
            alt
        )
        .unwrap();
    }
    path
}

fn load_ride(dir: &TempDir) -> RideFile {
    ImportManager::new()
        .import_file(&write_ride_csv(dir.path()))
        .unwrap()
}

fn selection(args: &[&str]) -> IntervalSelection {
    let mut selection = IntervalSelection::default();
    for (i, arg) in args.iter().enumerate() {
        selection.push(parse_interval_arg(arg, i).unwrap()).unwrap();
    }
    selection
}

fn summary_metrics() -> Vec<String> {
    ["workout_time", "average_power", "average_hr", "total_distance"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[test]
fn test_csv_import_estimates_recording_interval() {
    let dir = TempDir::new().unwrap();
    let ride = load_ride(&dir);

    assert_eq!(ride.samples.len(), 600);
    assert_eq!(ride.recording_interval, 1.0);
    assert!(ride.samples.iter().all(|s| s.xp.is_some()));
    // 30 s rolling window fills on the 30th sample
    assert!(ride.samples[28].np.is_none());
    assert_eq!(ride.samples[29].np, Some(200.0));
}

#[test]
fn test_two_interval_summary_blocks() {
    let dir = TempDir::new().unwrap();
    let ride = load_ride(&dir);
    let factory = MetricFactory::with_builtin();
    let summary = IntervalSummary::new(
        &factory,
        MetricContext::default(),
        summary_metrics(),
        Units::Metric,
    );

    let report = summary
        .summarize_selection(&ride, &selection(&["0..100=warmup", "5:00..6:40"]))
        .unwrap();

    let names: Vec<&str> = report.blocks().map(|b| b.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["2 selected intervals", "warmup", "Interval 2", "Excluding 2 selected"]
    );

    let combined = report.combined.as_ref().unwrap();
    assert_eq!(combined.row("workout_time").unwrap().value, 200.0);
    assert!((combined.row("average_power").unwrap().value - 250.0).abs() < 1e-9);

    assert!((report.intervals[0].row("average_power").unwrap().value - 200.0).abs() < 1e-9);
    assert!((report.intervals[1].row("average_power").unwrap().value - 300.0).abs() < 1e-9);

    let excluding = report.excluding.as_ref().unwrap();
    assert_eq!(excluding.row("workout_time").unwrap().value, 400.0);
    assert!((excluding.row("average_power").unwrap().value - 250.0).abs() < 1e-9);
}

#[test]
fn test_single_interval_has_no_combined_block() {
    let dir = TempDir::new().unwrap();
    let ride = load_ride(&dir);
    let factory = MetricFactory::with_builtin();
    let summary = IntervalSummary::new(
        &factory,
        MetricContext::default(),
        summary_metrics(),
        Units::Metric,
    );

    let report = summary
        .summarize_selection(&ride, &selection(&["60..120"]))
        .unwrap();

    assert!(report.combined.is_none());
    assert!(report.excluding.is_none());
    assert_eq!(report.intervals.len(), 1);
    assert_eq!(report.intervals[0].name, "Interval 1");
    assert_eq!(report.intervals[0].row("workout_time").unwrap().value, 60.0);
}

#[test]
fn test_selection_covering_ride_omits_excluding_block() {
    let dir = TempDir::new().unwrap();
    let ride = load_ride(&dir);
    let factory = MetricFactory::with_builtin();
    let summary = IntervalSummary::new(
        &factory,
        MetricContext::default(),
        summary_metrics(),
        Units::Metric,
    );

    let report = summary
        .summarize_selection(&ride, &selection(&["0..400", "300..600"]))
        .unwrap();

    let combined = report.combined.as_ref().unwrap();
    // Overlap counted once
    assert_eq!(combined.row("workout_time").unwrap().value, 600.0);
    assert!(report.excluding.is_none());
}

#[test]
fn test_empty_selection_renders_placeholder() {
    let dir = TempDir::new().unwrap();
    let ride = load_ride(&dir);
    let factory = MetricFactory::with_builtin();
    let summary = IntervalSummary::new(
        &factory,
        MetricContext::default(),
        summary_metrics(),
        Units::Metric,
    );

    let report = summary
        .summarize_selection(&ride, &IntervalSelection::default())
        .unwrap();

    let mut out = Vec::new();
    text_export::write_summary_report(&report, &mut out).unwrap();
    assert_eq!(String::from_utf8(out).unwrap().trim(), EMPTY_SELECTION_PLACEHOLDER);
}

#[test]
fn test_cached_summary_matches_fresh_summary() {
    let dir = TempDir::new().unwrap();
    let ride = load_ride(&dir);
    let factory = MetricFactory::with_builtin();
    let summary = IntervalSummary::new(
        &factory,
        MetricContext::default(),
        summary_metrics(),
        Units::Metric,
    );
    let sel = selection(&["10..50", "200..260"]);

    let mut cache = SplitCache::new();
    let first = summary.summarize_selection_cached(&ride, &sel, &mut cache).unwrap();
    assert!(cache.is_cached());
    let second = summary.summarize_selection_cached(&ride, &sel, &mut cache).unwrap();
    let fresh = summary.summarize_selection(&ride, &sel).unwrap();

    assert_eq!(first, second);
    assert_eq!(first, fresh);
}

#[test]
fn test_split_streams_written_and_reimported() {
    let dir = TempDir::new().unwrap();
    let ride = load_ride(&dir);
    let split = RideSplitter::split(&ride, &selection(&["100..200"])).unwrap();

    let included_path = dir.path().join("included.csv");
    let excluded_path = dir.path().join("excluded.json");
    export::export_ride(&split.included, &included_path).unwrap();
    export::export_ride(&split.excluded, &excluded_path).unwrap();

    let manager = ImportManager::new();
    let included = manager.import_file(&included_path).unwrap();
    let excluded = manager.import_file(&excluded_path).unwrap();

    assert_eq!(included.samples.len(), 100);
    assert_eq!(excluded.samples.len(), 500);
    assert_eq!(included.samples[0].secs, 0.0);
    assert_eq!(excluded.samples.last().unwrap().secs, 499.0);
}

#[test]
fn test_interval_file_feeds_selection() {
    let dir = TempDir::new().unwrap();
    let ride = load_ride(&dir);
    let intervals_path = dir.path().join("intervals.json");
    std::fs::write(
        &intervals_path,
        r#"[
            {"name": "first", "start": 0, "stop": 30},
            {"name": "lap 2", "start": 30, "stop": 90, "kind": "lap"}
        ]"#,
    )
    .unwrap();

    let sel = IntervalSelection::new(load_intervals(&intervals_path).unwrap()).unwrap();
    let split = RideSplitter::split(&ride, &sel).unwrap();

    assert_eq!(split.interval_count, 2);
    assert_eq!(split.included.samples.len(), 90);
}

#[test]
fn test_user_metric_from_config_in_summary() {
    let mut config = AppConfig::default();
    config.user_metrics.push(UserMetricConfig {
        symbol: "watts_per_beat".to_string(),
        name: "Watts per Beat".to_string(),
        units: "W/bpm".to_string(),
        formula: "watts / hr".to_string(),
        aggregation: Aggregation::Mean,
        precision: 2,
    });
    let factory = config.metric_factory().unwrap();
    assert!(factory.contains("watts_per_beat"));

    let dir = TempDir::new().unwrap();
    let ride = load_ride(&dir);
    let summary = IntervalSummary::new(
        &factory,
        config.metric_context(),
        vec!["watts_per_beat".to_string()],
        Units::Metric,
    );
    let report = summary
        .summarize_selection(&ride, &selection(&["0..60"]))
        .unwrap();

    let row = report.intervals[0].row("watts_per_beat").unwrap();
    assert!((row.value - 200.0 / 140.0).abs() < 1e-9);
    assert_eq!(row.display, "1.43");
    assert_eq!(row.units, "W/bpm");
}

#[test]
fn test_invalid_user_metric_rejected_at_compile() {
    let result = UserMetric::compile(UserMetricConfig {
        symbol: "bad".to_string(),
        name: "Bad".to_string(),
        units: String::new(),
        formula: "watts * gears".to_string(),
        aggregation: Aggregation::Mean,
        precision: 0,
    });
    assert!(result.is_err());
}

#[test]
fn test_report_exports_agree() {
    let dir = TempDir::new().unwrap();
    let ride = load_ride(&dir);
    let factory = MetricFactory::with_builtin();
    let summary = IntervalSummary::new(
        &factory,
        MetricContext::default(),
        summary_metrics(),
        Units::Imperial,
    );
    let report = summary
        .summarize_selection(&ride, &selection(&["0..100", "400..500"]))
        .unwrap();

    let mut json = Vec::new();
    json_export::write_json(&report, &mut json).unwrap();
    let value: serde_json::Value = serde_json::from_slice(&json).unwrap();
    assert_eq!(value["combined"]["name"], "2 selected intervals");
    assert_eq!(value["intervals"].as_array().unwrap().len(), 2);

    let mut csv = Vec::new();
    csv_export::write_summary(&report, &mut csv).unwrap();
    let text = String::from_utf8(csv).unwrap();
    // Header plus one row per metric per block
    assert_eq!(text.lines().count(), 1 + 4 * 4);
    assert!(text.contains("Excluding 2 selected,total_distance"));
}
