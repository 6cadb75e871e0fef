//! Raw record locator.
//!
//! Maps (cycle, file family) to a single local GRIB2 file under
//! `<root>/<YYYYMMDD>/<HH>/`. The directory is scanned for every file that
//! looks like a member of the family and exactly one must be found.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Timelike, Utc};
use gdas_common::{CycleRange, ValidTime};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{IngestionError, Result};
use crate::tables::FileFamily;

/// A located raw file.
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedFile {
    pub path: PathBuf,
    pub family: FileFamily,
    /// Cycle the file is used for.
    pub cycle: DateTime<Utc>,
    /// Run and lead time that produced the file.
    pub source: ValidTime,
}

/// All files needed for one cycle.
#[derive(Debug, Clone)]
pub struct CycleFiles {
    pub cycle: DateTime<Utc>,
    files: BTreeMap<FileFamily, LocatedFile>,
}

impl CycleFiles {
    pub fn get(&self, family: FileFamily) -> Result<&LocatedFile> {
        self.files.get(&family).ok_or_else(|| IngestionError::FileNotFound {
            dir: PathBuf::new(),
            pattern: format!("{} for cycle {}", family, self.cycle.format("%Y%m%d%H")),
        })
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.values().map(|f| f.path.as_path())
    }
}

/// Finds GDAS files in a local cycle tree.
#[derive(Debug, Clone)]
pub struct Locator {
    root: PathBuf,
}

impl Locator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding every file used for `cycle`.
    pub fn cycle_dir(&self, cycle: DateTime<Utc>) -> PathBuf {
        self.root.join(ValidTime::analysis(cycle).cycle_path())
    }

    /// Source run of a family's file for `cycle`.
    pub fn source_time(cycle: DateTime<Utc>, family: FileFamily) -> ValidTime {
        ValidTime::new(
            cycle + Duration::hours(family.source_offset_hours()),
            family.forecast_hour(),
        )
    }

    /// File name the family's file for `cycle` must have.
    pub fn expected_file_name(cycle: DateTime<Utc>, family: FileFamily) -> String {
        let source = Self::source_time(cycle, family);
        format!(
            "gdas.t{:02}z.{}",
            source.reference_time.hour(),
            family.suffix()
        )
    }

    /// Locate the single file of `family` serving `cycle`.
    pub fn locate(&self, cycle: DateTime<Utc>, family: FileFamily) -> Result<LocatedFile> {
        let dir = self.cycle_dir(cycle);
        let pattern = format!("gdas.t??z.{}", family.suffix());

        if !dir.is_dir() {
            return Err(IngestionError::FileNotFound { dir, pattern });
        }

        let mut matches: Vec<(PathBuf, u32)> = WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                let name = entry.file_name().to_str()?.to_string();
                let hour = family_member_hour(&name, family)?;
                Some((entry.into_path(), hour))
            })
            .collect();
        matches.sort();

        let (path, hour) = match matches.len() {
            0 => return Err(IngestionError::FileNotFound { dir, pattern }),
            1 => matches.remove(0),
            _ => {
                return Err(IngestionError::AmbiguousFile {
                    pattern: dir.join(pattern).display().to_string(),
                    matches: matches.into_iter().map(|(p, _)| p).collect(),
                })
            }
        };

        let source = Self::source_time(cycle, family);
        let expected = source.reference_time.hour();
        if hour != expected {
            return Err(IngestionError::UnexpectedCycle {
                path,
                expected,
                found: hour,
            });
        }

        debug!(path = %path.display(), family = %family, "Located raw file");
        Ok(LocatedFile {
            path,
            family,
            cycle,
            source,
        })
    }

    /// Locate every family for one cycle.
    pub fn locate_cycle(&self, cycle: DateTime<Utc>, families: &[FileFamily]) -> Result<CycleFiles> {
        let files = families
            .iter()
            .map(|&family| Ok((family, self.locate(cycle, family)?)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(CycleFiles { cycle, files })
    }

    /// Locate every family for every cycle of the window, in chronological order.
    pub fn locate_window(
        &self,
        window: &CycleRange,
        families: &[FileFamily],
    ) -> Result<Vec<CycleFiles>> {
        window
            .cycles()
            .into_iter()
            .map(|cycle| self.locate_cycle(cycle, families))
            .collect()
    }
}

/// Cycle hour encoded in `gdas.tHHz.<suffix>`, if `name` is a member of the family.
fn family_member_hour(name: &str, family: FileFamily) -> Option<u32> {
    let rest = name.strip_prefix("gdas.t")?;
    let (token, suffix) = rest.split_once("z.")?;
    if suffix != family.suffix() || token.len() != 2 || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;

    fn cycle(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_family_member_hour() {
        assert_eq!(
            family_member_hour("gdas.t06z.pgrb2.0p25.f000", FileFamily::Analysis),
            Some(6)
        );
        assert_eq!(
            family_member_hour("gdas.t06z.pgrb2b.0p25.f000", FileFamily::Analysis),
            None
        );
        assert_eq!(
            family_member_hour("gdas.t06z.pgrb2.0p25.f000.partial", FileFamily::Analysis),
            None
        );
        assert_eq!(
            family_member_hour("gdas.t6z.pgrb2.0p25.f000", FileFamily::Analysis),
            None
        );
    }

    #[test]
    fn test_expected_names() {
        assert_eq!(
            Locator::expected_file_name(cycle(0), FileFamily::Accumulation),
            "gdas.t18z.pgrb2.0p25.f006"
        );
        assert_eq!(
            Locator::expected_file_name(cycle(6), FileFamily::AnalysisB),
            "gdas.t06z.pgrb2b.0p25.f000"
        );
    }

    #[test]
    fn test_locate_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let locator = Locator::new(dir.path());
        let cycle_dir = locator.cycle_dir(cycle(6));
        fs::create_dir_all(&cycle_dir).unwrap();
        fs::write(cycle_dir.join("gdas.t00z.pgrb2.0p25.f006"), b"").unwrap();

        let file = locator.locate(cycle(6), FileFamily::Accumulation).unwrap();
        assert_eq!(file.source.reference_time, cycle(0));
        assert_eq!(file.source.forecast_hour, 6);
    }

    #[test]
    fn test_locate_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = Locator::new(dir.path())
            .locate(cycle(0), FileFamily::Analysis)
            .unwrap_err();
        assert!(matches!(err, IngestionError::FileNotFound { .. }));
    }
}
