use crate::{
    collector::Collector,
    config::{ConfigErrors, PipelineConfig},
    report::Report,
};
use bloomstat_ingest::{LoadReport, Loader};
use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};
use tracing::{info, instrument, warn};

/// collect and load every result file the config points at
#[instrument(skip(config), level = "info")]
pub fn load(config: &PipelineConfig) -> Result<LoadReport, ConfigErrors> {
    let collector = Collector::load(&config.collector)?;

    info!(files = collector.len(), "Collected result files");
    if collector.is_empty() {
        warn!(
            glob = %config.collector.glob,
            "No result files found below the given paths"
        );
    }

    let loader = Loader::new(config.aliases()).expect_fields(config.ingest.expected.iter().copied());

    Ok(loader.load(collector.paths()))
}

/// load everything and build the report, failed files only show up as warnings
pub fn run(config: &PipelineConfig) -> Result<Report, ConfigErrors> {
    let load = load(config)?;

    Ok(Report::build(&load, &config.analysis))
}

/// write the report as YAML to `path`, or stdout when `None`
pub fn write_report(report: &Report, path: Option<&Path>) -> Result<(), ConfigErrors> {
    match path {
        Some(path) => {
            let mut writer = BufWriter::new(File::create(path)?);
            serde_yaml::to_writer(&mut writer, report)?;
            writer.flush()?;

            info!(path = %path.display(), "Wrote report");
        }
        None => {
            let stdout = io::stdout();
            let mut writer = stdout.lock();
            serde_yaml::to_writer(&mut writer, report)?;
            writer.flush()?;
        }
    }

    Ok(())
}
