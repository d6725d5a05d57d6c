use sheetgenius::cell::CellValue;
use sheetgenius::dataset::TabularDataset;
use sheetgenius::report::{
    CLUSTERED_FILE, ReportGenerator, ReportStep, SCATTER_FILE, SUMMARY_FILE,
};
use std::fs;

fn dataset(headers: &[&str], rows: &[&[&str]]) -> TabularDataset {
    TabularDataset::new(
        headers.iter().map(|h| h.to_string()).collect(),
        rows.iter()
            .map(|row| row.iter().map(|v| CellValue::infer(v)).collect())
            .collect(),
    )
}

fn ten_rows() -> TabularDataset {
    dataset(
        &["name", "x", "y"],
        &[
            &["a", "1", "1"],
            &["b", "1.5", "2"],
            &["c", "2", "1.2"],
            &["d", "8", "8"],
            &["e", "8.5", "9"],
            &["f", "9", "8.2"],
            &["g", "-5", "20"],
            &["h", "-6", "21"],
            &["i", "-5.5", "19"],
            &["j", "0", "0"],
        ],
    )
}

#[test]
fn single_numeric_column_gives_only_summary() {
    let ds = dataset(
        &["city", "population"],
        &[&["Oslo", "700000"], &["Lima", "9700000"], &["Pune", "3100000"]],
    );
    let dir = tempfile::tempdir().unwrap();

    let outcome = ReportGenerator::default().generate(&ds, dir.path()).unwrap();

    assert_eq!(outcome.artifacts.file_names(), vec![SUMMARY_FILE]);
    assert!(outcome.degraded.is_empty());
    assert!(!dir.path().join(SCATTER_FILE).exists());
}

#[test]
fn two_numeric_columns_give_plot_and_clusters() {
    let ds = ten_rows();
    let dir = tempfile::tempdir().unwrap();

    let outcome = ReportGenerator::default().generate(&ds, dir.path()).unwrap();
    let names = outcome.artifacts.file_names();

    assert_eq!(names[0], SUMMARY_FILE);
    assert!(names.contains(&CLUSTERED_FILE.to_string()));
    assert!(!outcome.is_degraded(ReportStep::Cluster));
    assert_eq!(outcome.artifacts.len() + outcome.degraded.len(), 3);

    let clustered = fs::read_to_string(dir.path().join(CLUSTERED_FILE)).unwrap();
    let mut lines = clustered.lines();
    assert_eq!(lines.next(), Some("name,x,y,Cluster"));
    assert_eq!(lines.count(), 10);
}

#[test]
fn clustering_failure_keeps_summary_and_plot() {
    let ds = dataset(&["x", "y"], &[&["1", "2"], &["3", "4"]]);
    let dir = tempfile::tempdir().unwrap();

    let outcome = ReportGenerator::default().generate(&ds, dir.path()).unwrap();

    assert!(outcome.is_degraded(ReportStep::Cluster));
    let names = outcome.artifacts.file_names();
    assert_eq!(names[0], SUMMARY_FILE);
    assert!(!names.contains(&CLUSTERED_FILE.to_string()));
    assert!(!dir.path().join(CLUSTERED_FILE).exists());
}

#[test]
fn summary_table_has_one_row_per_column() {
    let ds = ten_rows();
    let dir = tempfile::tempdir().unwrap();
    ReportGenerator::default().generate(&ds, dir.path()).unwrap();

    let summary = fs::read_to_string(dir.path().join(SUMMARY_FILE)).unwrap();
    let lines: Vec<&str> = summary.lines().collect();
    assert_eq!(
        lines[0],
        "column,count,unique,top,freq,mean,std,min,25%,50%,75%,max"
    );
    assert_eq!(lines.len(), 4);
    assert!(lines[1].starts_with("name,10,10,"));
    assert!(lines[2].starts_with("x,10,"));
}

#[test]
fn unwritable_workdir_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("does-not-exist");
    let result = ReportGenerator::default().generate(&ten_rows(), &missing);
    assert!(result.is_err());
}

fn huge_rows(magnitude: &str) -> TabularDataset {
    let neg = format!("-{}", magnitude);
    let rows: Vec<[&str; 2]> = (0..10)
        .map(|i| match i % 3 {
            0 => [magnitude, magnitude],
            1 => [neg.as_str(), neg.as_str()],
            _ => ["0", magnitude],
        })
        .collect();
    let refs: Vec<&[&str]> = rows.iter().map(|r| &r[..]).collect();
    dataset(&["x", "y"], &refs)
}

#[test]
fn values_near_1e160_are_plotted_and_clustered() {
    let ds = huge_rows("1e160");
    let dir = tempfile::tempdir().unwrap();

    let outcome = ReportGenerator::default().generate(&ds, dir.path()).unwrap();

    assert!(outcome.degraded.is_empty(), "{:?}", outcome.degraded);
    assert_eq!(
        outcome.artifacts.file_names(),
        vec![SUMMARY_FILE, SCATTER_FILE, CLUSTERED_FILE]
    );
}

#[test]
fn values_near_the_float_limit_finish_the_report() {
    let ds = huge_rows("1.5e308");
    let dir = tempfile::tempdir().unwrap();

    let outcome = ReportGenerator::default().generate(&ds, dir.path()).unwrap();

    assert!(outcome.degraded.is_empty(), "{:?}", outcome.degraded);
    let clustered = fs::read_to_string(dir.path().join(CLUSTERED_FILE)).unwrap();
    let labels: Vec<&str> = clustered
        .lines()
        .skip(1)
        .map(|line| line.rsplit(',').next().unwrap())
        .collect();
    assert_eq!(labels.len(), 10);
    // Rows 0, 3, 6 and 9 hold the same point
    assert_eq!(labels[0], labels[3]);
    assert_ne!(labels[0], labels[1]);
    assert_ne!(labels[1], labels[2]);
}

#[test]
fn two_distinct_points_are_still_clustered() {
    let rows: Vec<[&str; 2]> = (0..10)
        .map(|i| if i % 2 == 0 { ["0", "0"] } else { ["1", "1"] })
        .collect();
    let refs: Vec<&[&str]> = rows.iter().map(|r| &r[..]).collect();
    let ds = dataset(&["flag_a", "flag_b"], &refs);
    let dir = tempfile::tempdir().unwrap();

    let outcome = ReportGenerator::default().generate(&ds, dir.path()).unwrap();

    assert!(!outcome.is_degraded(ReportStep::Cluster));
    let clustered = fs::read_to_string(dir.path().join(CLUSTERED_FILE)).unwrap();
    assert_eq!(clustered.lines().count(), 11);
}
