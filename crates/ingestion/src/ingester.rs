//! The preparation pipeline: locate, extract, assemble, write.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use gdas_common::{format_cycle, CycleRange};
use tracing::{debug, info};

use crate::assemble::Assembler;
use crate::config::{DecodeMethod, PipelineConfig};
use crate::error::Result;
use crate::extract::{extract_variable, DirectExtractor, Extractor, Wgrib2Extractor};
use crate::locator::Locator;
use crate::tables::{variable_table, FileFamily};
use crate::writer::{cleanup_intermediates, remove_raw_tree, DatasetWriter};

/// Result of a preparation run.
#[derive(Debug, Clone)]
pub struct IngestionResult {
    pub output_path: PathBuf,
    /// Cycles in the window, oldest first
    pub cycles: Vec<DateTime<Utc>>,
    pub steps: usize,
    /// Variables written, in table order
    pub variables: Vec<String>,
    pub intermediates_removed: usize,
    pub raw_data_removed: bool,
}

/// Core pipeline.
///
/// Turns a window of GDAS cycles found under the configured raw tree into
/// one GraphCast input file.
pub struct Ingester {
    config: PipelineConfig,
}

impl Ingester {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Build the extractor selected by the configuration.
    pub fn extractor(&self) -> Box<dyn Extractor> {
        match self.config.method {
            DecodeMethod::Wgrib2 => Box::new(Wgrib2Extractor::new(
                self.config.wgrib2_path.clone(),
                self.config.intermediate_dir().to_path_buf(),
                self.config.levels.count(),
            )),
            DecodeMethod::Direct => Box::new(DirectExtractor::new()),
        }
    }

    /// Run the pipeline with the configured extractor.
    pub fn run(&self, window: &CycleRange) -> Result<IngestionResult> {
        let mut extractor = self.extractor();
        self.run_with(window, extractor.as_mut())
    }

    /// Run the pipeline with an explicit extractor.
    ///
    /// Intermediates are removed only after the dataset was written; on
    /// failure they stay behind for inspection.
    pub fn run_with(&self, window: &CycleRange, extractor: &mut dyn Extractor) -> Result<IngestionResult> {
        netcdf_parser::silence_hdf5_errors();

        let levels = self.config.levels;
        let cycles = window.cycles();
        info!(
            start = %format_cycle(&window.start),
            end = %format_cycle(&window.end),
            cycles = cycles.len(),
            levels = levels.count(),
            method = extractor.name(),
            "Preparing GDAS input"
        );

        let locator = Locator::new(self.config.raw_data_root());
        let families = FileFamily::families_for(levels);
        let located = locator.locate_window(window, &families)?;

        let specs = variable_table(levels, self.config.mslp_source);
        let mut assembler = Assembler::new(specs.clone(), levels.all());

        for files in &located {
            assembler.begin_cycle(files.cycle)?;
            for spec in &specs {
                if spec.static_field && assembler.is_captured(spec.name) {
                    debug!(variable = spec.name, cycle = %format_cycle(&files.cycle), "Skipping captured static variable");
                    continue;
                }
                let record = extract_variable(extractor, files, spec)?;
                assembler.add(spec, record)?;
            }
            info!(cycle = %format_cycle(&files.cycle), "Cycle extracted");
        }

        let dataset = assembler.finish()?;
        let output_path = DatasetWriter::new(&self.config.output_dir).write(&dataset)?;

        let intermediates_removed = cleanup_intermediates(&extractor.take_intermediates());

        let raw_data_removed = if self.config.keep_downloaded {
            false
        } else {
            remove_raw_tree(locator.root())?
        };

        Ok(IngestionResult {
            output_path,
            cycles,
            steps: dataset.steps(),
            variables: dataset.variables.iter().map(|v| v.name.clone()).collect(),
            intermediates_removed,
            raw_data_removed,
        })
    }
}
