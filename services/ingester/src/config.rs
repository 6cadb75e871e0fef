//! Command line and configuration layering.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use gdas_common::CycleRange;
use ingestion::{DecodeMethod, MslpSource, PipelineConfig, PressureLevels};

use crate::sources::DataSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum YesNo {
    Yes,
    No,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MslpArg {
    /// PRMSL at mean sea level
    Prmsl,
    /// PRES at the surface
    Pres,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "gdas-ingester")]
#[command(about = "Prepare GraphCast input from GDAS 0.25 degree analyses")]
pub struct Args {
    /// First cycle, YYYYMMDDHH
    pub start: String,

    /// Last cycle, YYYYMMDDHH (inclusive)
    pub end: String,

    /// Pressure levels: 13 or 37 [default: 13]
    #[arg(short, long, env = "GDAS_LEVELS")]
    pub levels: Option<u32>,

    /// Decoding method: wgrib2 or direct (alias pygrib) [default: wgrib2]
    #[arg(short, long, env = "GDAS_METHOD")]
    pub method: Option<DecodeMethod>,

    /// Remote source of raw files
    #[arg(short, long, value_enum, default_value = "s3", env = "GDAS_SOURCE")]
    pub source: DataSource,

    /// Output directory [default: .]
    #[arg(short, long, env = "GDAS_OUTPUT_DIR")]
    pub output: Option<PathBuf>,

    /// Download directory [default: .]
    #[arg(short, long, env = "GDAS_DOWNLOAD_DIR")]
    pub download: Option<PathBuf>,

    /// Keep the downloaded raw files [default: no]
    #[arg(short, long, value_enum, env = "GDAS_KEEP")]
    pub keep: Option<YesNo>,

    /// Source of mean_sea_level_pressure [default: prmsl]
    #[arg(long, value_enum)]
    pub mslp: Option<MslpArg>,

    /// Directory for wgrib2 intermediates [default: output directory]
    #[arg(long)]
    pub work_dir: Option<PathBuf>,

    /// wgrib2 executable
    #[arg(long, env = "GDAS_WGRIB2")]
    pub wgrib2: Option<PathBuf>,

    /// YAML configuration file; command line values take precedence
    #[arg(long, env = "GDAS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Use files already present in the download directory
    #[arg(long)]
    pub skip_download: bool,

    /// Maximum concurrent downloads
    #[arg(long, default_value = "4")]
    pub max_concurrent: usize,

    /// Maximum retry attempts per file
    #[arg(long, default_value = "5")]
    pub max_retries: u32,

    /// Log level
    #[arg(long, default_value = "info", env = "GDAS_LOG_LEVEL")]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,
}

impl Args {
    pub fn window(&self) -> Result<CycleRange> {
        CycleRange::parse(&self.start, &self.end).context("Invalid cycle window")
    }

    /// Configuration file values overridden by anything given on the command line.
    pub fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_yaml_file(path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => PipelineConfig::default(),
        };

        if let Some(levels) = self.levels {
            config.levels = PressureLevels::try_from(levels).map_err(|e| anyhow!(e))?;
        }
        if let Some(method) = self.method {
            config.method = method;
        }
        if let Some(output) = &self.output {
            config.output_dir = output.clone();
        }
        if let Some(download) = &self.download {
            config.download_dir = download.clone();
        }
        if let Some(keep) = self.keep {
            config.keep_downloaded = keep == YesNo::Yes;
        }
        if let Some(mslp) = self.mslp {
            config.mslp_source = match mslp {
                MslpArg::Prmsl => MslpSource::Prmsl,
                MslpArg::Pres => MslpSource::SurfacePressure,
            };
        }
        if let Some(work_dir) = &self.work_dir {
            config.work_dir = Some(work_dir.clone());
        }
        if let Some(wgrib2) = &self.wgrib2 {
            config.wgrib2_path = wgrib2.clone();
        }

        Ok(config)
    }
}
