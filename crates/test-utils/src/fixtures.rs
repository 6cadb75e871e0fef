//! Common test fixtures for GDAS preparation tests.

/// Grid definitions for synthetic GRIB2 messages.
pub mod grid {
    /// Template 3.0 grid parameters, angles in microdegrees.
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct FixtureGrid {
        pub ni: u32,
        pub nj: u32,
        pub la1: i32,
        pub lo1: i32,
        pub la2: i32,
        pub lo2: i32,
        pub di: u32,
        pub dj: u32,
        pub scanning_mode: u8,
    }

    impl FixtureGrid {
        /// Latitudes in file row order, degrees.
        pub fn latitudes(&self) -> Vec<f64> {
            let sign = if self.scanning_mode & 0x40 != 0 { 1.0 } else { -1.0 };
            (0..self.nj)
                .map(|j| (self.la1 as f64 + sign * (j as f64) * self.dj as f64) * 1e-6)
                .collect()
        }

        /// Longitudes in file column order, degrees.
        pub fn longitudes(&self) -> Vec<f64> {
            (0..self.ni)
                .map(|i| (self.lo1 as f64 + (i as f64) * self.di as f64) * 1e-6)
                .collect()
        }
    }

    /// 4 x 3 grid, 1° spacing, scanned north to south like GDAS.
    pub const SMALL: FixtureGrid = FixtureGrid {
        ni: 4,
        nj: 3,
        la1: 1_000_000,
        lo1: 0,
        la2: -1_000_000,
        lo2: 3_000_000,
        di: 1_000_000,
        dj: 1_000_000,
        scanning_mode: 0,
    };

    /// Same extent as [`SMALL`] scanned south to north.
    pub const SMALL_SOUTH_FIRST: FixtureGrid = FixtureGrid {
        la1: -1_000_000,
        la2: 1_000_000,
        scanning_mode: 0x40,
        ..SMALL
    };

    /// Same shape as [`SMALL`], shifted half a degree east.
    pub const SMALL_SHIFTED: FixtureGrid = FixtureGrid {
        lo1: 500_000,
        lo2: 3_500_000,
        ..SMALL
    };

    /// GDAS 0.25° global grid.
    pub const GDAS_0P25: FixtureGrid = FixtureGrid {
        ni: 1440,
        nj: 721,
        la1: 90_000_000,
        lo1: 0,
        la2: -90_000_000,
        lo2: 359_750_000,
        di: 250_000,
        dj: 250_000,
        scanning_mode: 0,
    };
}

/// Pressure level tables in hPa.
pub mod levels {
    pub const LEVELS_13: [u32; 13] = [
        50, 100, 150, 200, 250, 300, 400, 500, 600, 700, 850, 925, 1000,
    ];

    pub const LEVELS_37_PRIMARY: [u32; 31] = [
        1, 2, 3, 5, 7, 10, 20, 30, 50, 70, 100, 150, 200, 250, 300, 350, 400, 450, 500, 550, 600,
        650, 700, 750, 800, 850, 900, 925, 950, 975, 1000,
    ];

    pub const LEVELS_37_SECONDARY: [u32; 6] = [125, 175, 225, 775, 825, 875];
}

/// Reference cycles.
pub mod cycles {
    use chrono::{DateTime, TimeZone, Utc};

    pub fn cycle(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, hour, 0, 0)
            .single()
            .unwrap_or_else(|| panic!("invalid fixture cycle {year}-{month}-{day} {hour}"))
    }

    /// 2024-01-01 00Z
    pub fn jan_first_00z() -> DateTime<Utc> {
        cycle(2024, 1, 1, 0)
    }

    /// 2024-01-01 06Z
    pub fn jan_first_06z() -> DateTime<Utc> {
        cycle(2024, 1, 1, 6)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_grid_coordinates() {
        assert_eq!(grid::SMALL.latitudes(), vec![1.0, 0.0, -1.0]);
        assert_eq!(grid::SMALL_SOUTH_FIRST.latitudes(), vec![-1.0, 0.0, 1.0]);
        assert_eq!(grid::SMALL.longitudes(), vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_37_level_tables_are_disjoint() {
        for level in levels::LEVELS_37_SECONDARY {
            assert!(!levels::LEVELS_37_PRIMARY.contains(&level));
        }
        assert_eq!(
            levels::LEVELS_37_PRIMARY.len() + levels::LEVELS_37_SECONDARY.len(),
            37
        );
    }
}
