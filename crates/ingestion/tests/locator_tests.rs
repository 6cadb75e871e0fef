//! Locator behaviour against synthetic cycle trees.

use std::fs;

use gdas_common::CycleRange;
use ingestion::{FileFamily, IngestionError, Locator, PressureLevels};
use test_utils::{cycles, GdasTreeBuilder};

#[test]
fn test_locates_all_families_of_a_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let tree = GdasTreeBuilder::new(dir.path());
    tree.write_cycle(cycles::jan_first_00z()).unwrap();

    let locator = Locator::new(dir.path());
    let files = locator
        .locate_cycle(
            cycles::jan_first_00z(),
            &FileFamily::families_for(PressureLevels::L13),
        )
        .unwrap();

    let f006 = files.get(FileFamily::Accumulation).unwrap();
    assert!(f006.path.ends_with("20240101/00/gdas.t18z.pgrb2.0p25.f006"));
    assert_eq!(f006.source.reference_time, cycles::cycle(2023, 12, 31, 18));
    assert!(files.get(FileFamily::AnalysisB).is_err());
}

#[test]
fn test_window_is_chronological() {
    let dir = tempfile::tempdir().unwrap();
    let tree = GdasTreeBuilder::new(dir.path());
    // Written out of order on purpose
    tree.write_cycle(cycles::cycle(2024, 1, 1, 12)).unwrap();
    tree.write_cycle(cycles::jan_first_00z()).unwrap();
    tree.write_cycle(cycles::jan_first_06z()).unwrap();

    let window = CycleRange::parse("2024010100", "2024010112").unwrap();
    let located = Locator::new(dir.path())
        .locate_window(&window, &[FileFamily::Analysis])
        .unwrap();
    let hours: Vec<String> = located
        .iter()
        .map(|c| c.cycle.format("%H").to_string())
        .collect();
    assert_eq!(hours, vec!["00", "06", "12"]);
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    GdasTreeBuilder::new(dir.path())
        .write_cycle(cycles::jan_first_00z())
        .unwrap();

    let err = Locator::new(dir.path())
        .locate(cycles::jan_first_00z(), FileFamily::AnalysisB)
        .unwrap_err();
    assert!(matches!(err, IngestionError::FileNotFound { .. }));
}

#[test]
fn test_two_candidates_are_ambiguous() {
    let dir = tempfile::tempdir().unwrap();
    let tree = GdasTreeBuilder::new(dir.path());
    tree.write_cycle(cycles::jan_first_06z()).unwrap();
    let cycle_dir = tree.cycle_dir(cycles::jan_first_06z());
    fs::write(cycle_dir.join("gdas.t12z.pgrb2.0p25.f006"), b"GRIB").unwrap();

    let err = Locator::new(dir.path())
        .locate(cycles::jan_first_06z(), FileFamily::Accumulation)
        .unwrap_err();
    match err {
        IngestionError::AmbiguousFile { matches, .. } => assert_eq!(matches.len(), 2),
        other => panic!("expected AmbiguousFile, got {other}"),
    }
}

#[test]
fn test_wrong_cycle_hour_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let tree = GdasTreeBuilder::new(dir.path());
    tree.write_cycle(cycles::jan_first_06z()).unwrap();
    let cycle_dir = tree.cycle_dir(cycles::jan_first_06z());
    fs::rename(
        cycle_dir.join("gdas.t06z.pgrb2.0p25.f000"),
        cycle_dir.join("gdas.t12z.pgrb2.0p25.f000"),
    )
    .unwrap();

    let err = Locator::new(dir.path())
        .locate(cycles::jan_first_06z(), FileFamily::Analysis)
        .unwrap_err();
    assert!(matches!(
        err,
        IngestionError::UnexpectedCycle {
            expected: 6,
            found: 12,
            ..
        }
    ));
}
