//! Remote locations of GDAS files.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use gdas_common::CycleRange;
use ingestion::{FileFamily, Locator, PressureLevels};

/// Where raw files are fetched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DataSource {
    /// NOMADS near-real-time feed (last ten days only)
    Nomads,
    /// NOAA Open Data bucket on AWS
    S3,
}

impl DataSource {
    pub fn base_url(&self) -> &'static str {
        match self {
            DataSource::Nomads => "https://nomads.ncep.noaa.gov/pub/data/nccf/com/gfs/prod",
            DataSource::S3 => "https://noaa-gfs-bdp-pds.s3.amazonaws.com",
        }
    }

    /// URL of `file_name` produced by the run at `reference_time`.
    pub fn file_url(&self, reference_time: DateTime<Utc>, file_name: &str) -> String {
        format!(
            "{}/gdas.{}/{}/atmos/{}",
            self.base_url(),
            reference_time.format("%Y%m%d"),
            reference_time.format("%H"),
            file_name
        )
    }
}

/// One file to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadItem {
    pub url: String,
    pub destination: PathBuf,
}

/// Every file a window needs, laid out the way the locator expects.
///
/// The accumulation file comes from the previous run's directory on the
/// server but is stored with the cycle it serves.
pub fn download_plan(
    window: &CycleRange,
    levels: PressureLevels,
    source: DataSource,
    raw_root: &Path,
) -> Vec<DownloadItem> {
    let locator = &Locator::new(raw_root);
    let families = &FileFamily::families_for(levels);

    window
        .cycles()
        .into_iter()
        .flat_map(move |cycle| {
            families.iter().map(move |&family| {
                let name = Locator::expected_file_name(cycle, family);
                let run = Locator::source_time(cycle, family).reference_time;
                DownloadItem {
                    url: source.file_url(run, &name),
                    destination: locator.cycle_dir(cycle).join(name),
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nomads_url() {
        let window = CycleRange::parse("2024010100", "2024010100").unwrap();
        let plan = download_plan(
            &window,
            PressureLevels::L13,
            DataSource::Nomads,
            Path::new("/data/noaa-gfs-bdp-pds_13"),
        );
        assert_eq!(plan.len(), 2);
        assert_eq!(
            plan[0].url,
            "https://nomads.ncep.noaa.gov/pub/data/nccf/com/gfs/prod/gdas.20240101/00/atmos/gdas.t00z.pgrb2.0p25.f000"
        );
        assert_eq!(
            plan[0].destination,
            PathBuf::from("/data/noaa-gfs-bdp-pds_13/20240101/00/gdas.t00z.pgrb2.0p25.f000")
        );
    }

    #[test]
    fn test_accumulation_comes_from_previous_run() {
        let window = CycleRange::parse("2024010100", "2024010106").unwrap();
        let plan = download_plan(
            &window,
            PressureLevels::L37,
            DataSource::S3,
            Path::new("raw"),
        );
        assert_eq!(plan.len(), 6);
        assert_eq!(
            plan[2].url,
            "https://noaa-gfs-bdp-pds.s3.amazonaws.com/gdas.20231231/18/atmos/gdas.t18z.pgrb2.0p25.f006"
        );
        assert_eq!(
            plan[2].destination,
            PathBuf::from("raw/20240101/00/gdas.t18z.pgrb2.0p25.f006")
        );
        assert!(plan[4].url.ends_with("gdas.20240101/06/atmos/gdas.t06z.pgrb2b.0p25.f000"));
    }
}
