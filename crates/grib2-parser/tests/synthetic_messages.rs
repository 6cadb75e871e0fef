//! Parser tests against synthetic GRIB2 messages.

use bytes::Bytes;
use chrono::{Duration, TimeZone, Utc};
use grib2_parser::Grib2Reader;
use test_utils::{assert_approx_eq, grid, Grib2Builder};

fn reference() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 6, 0, 0).unwrap()
}

#[test]
fn test_parse_isobaric_message() {
    let data: Vec<f32> = (0..12).map(|i| 5000.0 + i as f32).collect();
    let bytes = Grib2Builder::new_gdas(reference())
        .with_parameter(0, 3, 5)
        .with_level(100, 50_000)
        .with_data(data.clone())
        .build();

    let mut reader = Grib2Reader::new(Bytes::from(bytes));
    let msg = reader.next_message().unwrap().expect("one message");

    assert_eq!(msg.parameter(), "HGT");
    assert_eq!(msg.level_description, "500 mb");
    assert_eq!(msg.product_definition.level_type, 100);
    assert_approx_eq!(msg.product_definition.level_value, 50_000.0, 1e-9);
    assert_eq!(msg.grid_dims(), (3, 4));
    assert_eq!(msg.valid_time().unwrap(), reference());
    assert_eq!(msg.unpack_data().unwrap(), data);

    assert!(reader.next_message().unwrap().is_none());
}

#[test]
fn test_negative_latitudes_are_sign_magnitude() {
    let bytes = Grib2Builder::new_gdas(reference()).build();
    let msg = Grib2Reader::new(Bytes::from(bytes))
        .next_message()
        .unwrap()
        .unwrap();

    let g = &msg.grid_definition;
    assert_approx_eq!(g.first_latitude, 1.0, 1e-9);
    assert_approx_eq!(g.last_latitude, -1.0, 1e-9);
    assert_eq!(g.latitudes(), vec![1.0, 0.0, -1.0]);
    assert_eq!(g.longitudes(), vec![0.0, 1.0, 2.0, 3.0]);
}

#[test]
fn test_south_first_grid() {
    let bytes = Grib2Builder::new_gdas(reference())
        .with_grid_spec(grid::SMALL_SOUTH_FIRST)
        .with_constant_value(1.0)
        .build();
    let msg = Grib2Reader::new(Bytes::from(bytes))
        .next_message()
        .unwrap()
        .unwrap();
    assert_eq!(msg.grid_definition.latitudes(), vec![-1.0, 0.0, 1.0]);
}

#[test]
fn test_accumulation_valid_time_is_interval_end() {
    let bytes = Grib2Builder::new_gdas(reference())
        .with_parameter(0, 1, 8)
        .with_level(1, 0)
        .with_accumulation(6)
        .with_constant_value(2.5)
        .build();
    let msg = Grib2Reader::new(Bytes::from(bytes))
        .next_message()
        .unwrap()
        .unwrap();

    assert_eq!(msg.parameter(), "APCP");
    assert_eq!(msg.product_definition.template, 8);
    let stat = msg.product_definition.statistical.as_ref().unwrap();
    assert_eq!(stat.process, 1);
    assert_eq!(stat.length, Duration::hours(6));
    assert_eq!(msg.valid_time().unwrap(), reference() + Duration::hours(6));
    assert!(msg.unpack_data().unwrap().iter().all(|&v| v == 2.5));
}

#[test]
fn test_forecast_hour_shifts_valid_time() {
    let bytes = Grib2Builder::new_gdas(reference())
        .with_parameter(2, 0, 0)
        .with_level(1, 0)
        .with_forecast_hour(6)
        .build();
    let msg = Grib2Reader::new(Bytes::from(bytes))
        .next_message()
        .unwrap()
        .unwrap();
    assert_eq!(msg.parameter(), "LAND");
    assert_eq!(msg.valid_time().unwrap(), reference() + Duration::hours(6));
}

#[test]
fn test_multiple_messages_and_leading_garbage() {
    let mut buffer = b"junk".to_vec();
    for level in [85_000u32, 100_000] {
        buffer.extend(
            Grib2Builder::new_gdas(reference())
                .with_parameter(0, 0, 0)
                .with_level(100, level)
                .with_constant_value(level as f32 / 1000.0)
                .build(),
        );
    }

    let messages = Grib2Reader::new(Bytes::from(buffer)).messages().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].level_description, "850 mb");
    assert_eq!(messages[1].level_description, "1000 mb");
    assert_eq!(messages[0].offset, 4);
}

#[test]
fn test_non_integer_values_round_trip_within_packing_error() {
    let data: Vec<f32> = (0..12).map(|i| 250.0 + i as f32 * 0.37).collect();
    let bytes = Grib2Builder::new_gdas(reference()).with_data(data.clone()).build();
    let decoded = Grib2Reader::new(Bytes::from(bytes))
        .next_message()
        .unwrap()
        .unwrap()
        .unpack_data()
        .unwrap();
    for (a, b) in decoded.iter().zip(&data) {
        assert_approx_eq!(*a, *b, 1e-3);
    }
}

#[test]
fn test_truncated_message_is_an_error() {
    let mut bytes = Grib2Builder::new_gdas(reference()).build();
    bytes.truncate(bytes.len() - 10);
    assert!(Grib2Reader::new(Bytes::from(bytes)).next_message().is_err());
}
