//! Runs the `gdas-ingester` binary against synthetic cycle trees.

use std::path::Path;
use std::process::{Command, Output};

use test_utils::{cycles, GdasTreeBuilder};

fn ingester(args: &[&str]) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_gdas-ingester"));
    for var in [
        "GDAS_LEVELS",
        "GDAS_METHOD",
        "GDAS_SOURCE",
        "GDAS_OUTPUT_DIR",
        "GDAS_DOWNLOAD_DIR",
        "GDAS_KEEP",
        "GDAS_WGRIB2",
        "GDAS_CONFIG",
    ] {
        command.env_remove(var);
    }
    command.args(args).output().expect("Failed to run gdas-ingester")
}

fn path_arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_help_lists_options() {
    let output = ingester(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for flag in ["--levels", "--method", "--source", "--output", "--download", "--keep"] {
        assert!(stdout.contains(flag), "help is missing {flag}");
    }
}

#[test]
fn test_misaligned_cycle_is_rejected() {
    let output = ingester(&["2024010103", "2024010106", "--skip-download"]);
    assert!(!output.status.success());
}

#[test]
fn test_unsupported_level_count_is_rejected() {
    let output = ingester(&["2024010100", "2024010100", "-l", "25", "--skip-download"]);
    assert!(!output.status.success());
}

#[test]
fn test_prepares_local_tree() {
    let dir = tempfile::tempdir().unwrap();
    let download = dir.path().join("downloads");
    let out = dir.path().join("out");
    let tree = GdasTreeBuilder::new(download.join("noaa-gfs-bdp-pds_13"));
    tree.write_cycle(cycles::jan_first_00z()).unwrap();
    tree.write_cycle(cycles::jan_first_06z()).unwrap();

    let output = ingester(&[
        "2024010100",
        "2024010106",
        "--skip-download",
        "-m",
        "direct",
        "-d",
        path_arg(&download),
        "-o",
        path_arg(&out),
        "-k",
        "yes",
    ]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let written = out.join("source-gdas_date-2024010106_res-0.25_levels-13_steps-2.nc");
    let file = netcdf::open(&written).unwrap();
    assert_eq!(file.dimension("time").unwrap().len(), 2);
    assert!(file.variable("total_precipitation_6hr").is_some());
    assert!(tree.cycle_dir(cycles::jan_first_00z()).exists());
}

#[test]
fn test_raw_tree_removed_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let download = dir.path().join("downloads");
    let out = dir.path().join("out");
    let raw_root = download.join("noaa-gfs-bdp-pds_13");
    GdasTreeBuilder::new(&raw_root)
        .write_cycle(cycles::jan_first_06z())
        .unwrap();

    let output = ingester(&[
        "2024010106",
        "2024010106",
        "--skip-download",
        "--method",
        "pygrib",
        "--download",
        path_arg(&download),
        "--output",
        path_arg(&out),
    ]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(out
        .join("source-gdas_date-2024010112_res-0.25_levels-13_steps-1.nc")
        .exists());
    assert!(!raw_root.exists());
}

#[test]
fn test_missing_files_fail_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let output = ingester(&[
        "2024010100",
        "2024010100",
        "--skip-download",
        "-m",
        "direct",
        "-d",
        path_arg(dir.path()),
        "-o",
        path_arg(&out),
    ]);
    assert!(!output.status.success());
    let written = std::fs::read_dir(&out).map(|d| d.count()).unwrap_or(0);
    assert_eq!(written, 0);
}
