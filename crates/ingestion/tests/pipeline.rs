//! End-to-end runs over synthetic cycle trees.

use std::path::Path;

use gdas_common::CycleRange;
use ingestion::{DecodeMethod, Ingester, IngestionError, PipelineConfig, PressureLevels};
use test_utils::{assert_approx_eq, cycles, fixture_value, GdasTreeBuilder};

fn config(base: &Path, levels: PressureLevels) -> PipelineConfig {
    PipelineConfig {
        levels,
        method: DecodeMethod::Direct,
        download_dir: base.join("downloads"),
        output_dir: base.join("out"),
        keep_downloaded: true,
        ..PipelineConfig::default()
    }
}

const VARIABLES: [&str; 13] = [
    "geopotential_at_surface",
    "land_sea_mask",
    "mean_sea_level_pressure",
    "2m_temperature",
    "10m_u_component_of_wind",
    "10m_v_component_of_wind",
    "total_precipitation_6hr",
    "geopotential",
    "temperature",
    "specific_humidity",
    "vertical_velocity",
    "u_component_of_wind",
    "v_component_of_wind",
];

#[test]
fn test_two_cycle_window_writes_graphcast_layout() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), PressureLevels::L13);
    let tree = GdasTreeBuilder::new(config.raw_data_root());
    tree.write_cycle(cycles::jan_first_00z()).unwrap();
    tree.write_cycle(cycles::jan_first_06z()).unwrap();

    let window = CycleRange::parse("2024010100", "2024010106").unwrap();
    let result = Ingester::new(config.clone()).run(&window).unwrap();

    assert_eq!(result.steps, 2);
    assert_eq!(result.variables, VARIABLES.to_vec());
    assert!(!result.raw_data_removed);
    assert_eq!(
        result.output_path,
        config
            .output_dir
            .join("source-gdas_date-2024010106_res-0.25_levels-13_steps-2.nc")
    );
    assert!(!config
        .output_dir
        .join("source-gdas_date-2024010106_res-0.25_levels-13_steps-2.nc.partial")
        .exists());

    let file = netcdf::open(&result.output_path).unwrap();
    assert_eq!(file.dimension("batch").unwrap().len(), 1);
    assert_eq!(file.dimension("time").unwrap().len(), 2);
    assert_eq!(file.dimension("level").unwrap().len(), 13);
    assert_eq!(file.dimension("lat").unwrap().len(), 3);
    assert_eq!(file.dimension("lon").unwrap().len(), 4);
    for name in VARIABLES {
        assert!(file.variable(name).is_some(), "missing {name}");
    }

    let time: Vec<i64> = file.variable("time").unwrap().get_values(..).unwrap();
    assert_eq!(time, vec![0, 6]);
    let lat: Vec<f32> = file.variable("lat").unwrap().get_values(..).unwrap();
    assert_eq!(lat, vec![-1.0, 0.0, 1.0]);
    let level: Vec<i32> = file.variable("level").unwrap().get_values(..).unwrap();
    assert_eq!(level[0], 50);
    assert_eq!(level[12], 1000);

    let datetime: Vec<i64> = file.variable("datetime").unwrap().get_values(..).unwrap();
    assert_eq!(datetime[1] - datetime[0], 6);
    assert_eq!(datetime[0], cycles::jan_first_00z().timestamp() / 3600);

    // [batch, time, level, lat, lon]; second step, 500 hPa (index 7), lat -1, lon 1
    let z = file.variable("geopotential").unwrap();
    let dims: Vec<String> = z.dimensions().iter().map(|d| d.name()).collect();
    assert_eq!(dims, vec!["batch", "time", "level", "lat", "lon"]);
    let values: Vec<f32> = z.get_values(..).unwrap();
    let index = ((1 * 13 + 7) * 3 + 0) * 4 + 1;
    assert_approx_eq!(
        values[index],
        fixture_value("HGT", 100, 500, 6, 2, 1) * 9.80665,
        1e-1
    );

    // Static variables have no time axis and come from the first cycle
    let lsm = file.variable("land_sea_mask").unwrap();
    assert_eq!(lsm.dimensions().len(), 2);
    let lsm_values: Vec<f32> = lsm.get_values(..).unwrap();
    assert_eq!(lsm_values[0], fixture_value("LAND", 1, 0, 0, 2, 0));

    let tp: Vec<f32> = file
        .variable("total_precipitation_6hr")
        .unwrap()
        .get_values(..)
        .unwrap();
    assert_approx_eq!(tp[0], fixture_value("APCP", 1, 0, 0, 2, 0) / 1000.0, 1e-6);
}

#[test]
fn test_single_cycle_removes_raw_tree_when_not_kept() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig {
        keep_downloaded: false,
        ..config(dir.path(), PressureLevels::L13)
    };
    GdasTreeBuilder::new(config.raw_data_root())
        .write_cycle(cycles::jan_first_06z())
        .unwrap();

    let window = CycleRange::parse("2024010106", "2024010106").unwrap();
    let result = Ingester::new(config.clone()).run(&window).unwrap();

    assert_eq!(result.steps, 1);
    assert!(result
        .output_path
        .ends_with("source-gdas_date-2024010112_res-0.25_levels-13_steps-1.nc"));
    assert!(result.raw_data_removed);
    assert!(!config.raw_data_root().exists());
}

#[test]
fn test_37_level_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), PressureLevels::L37);
    GdasTreeBuilder::new(config.raw_data_root())
        .with_37_levels()
        .write_cycle(cycles::jan_first_00z())
        .unwrap();

    let window = CycleRange::parse("2024010100", "2024010100").unwrap();
    let result = Ingester::new(config).run(&window).unwrap();
    assert!(result
        .output_path
        .to_string_lossy()
        .contains("_levels-37_steps-1"));

    let file = netcdf::open(&result.output_path).unwrap();
    let level: Vec<i32> = file.variable("level").unwrap().get_values(..).unwrap();
    assert_eq!(level.len(), 37);
    assert!(level.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_missing_cycle_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), PressureLevels::L13);
    GdasTreeBuilder::new(config.raw_data_root())
        .write_cycle(cycles::jan_first_00z())
        .unwrap();

    let window = CycleRange::parse("2024010100", "2024010106").unwrap();
    let err = Ingester::new(config.clone()).run(&window).unwrap_err();
    assert!(matches!(err, IngestionError::FileNotFound { .. }));
    assert!(!config.output_dir.exists());
    assert!(config.raw_data_root().exists());
}

#[test]
fn test_grid_mismatch_between_cycles_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), PressureLevels::L13);
    GdasTreeBuilder::new(config.raw_data_root())
        .write_cycle(cycles::jan_first_00z())
        .unwrap();
    GdasTreeBuilder::new(config.raw_data_root())
        .with_grid(test_utils::grid::SMALL_SHIFTED)
        .write_cycle(cycles::jan_first_06z())
        .unwrap();

    let window = CycleRange::parse("2024010100", "2024010106").unwrap();
    let err = Ingester::new(config).run(&window).unwrap_err();
    assert!(matches!(err, IngestionError::CoordinateMismatch { .. }));
}
