use bloomstat_analysis::{Aggregation, TreeModel, DEFAULT_LEAF_CAPACITY};
use bloomstat_ingest::{Field, FieldAliases};
use globset::{GlobBuilder, GlobMatcher};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::Error,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{error, warn};

/// database size the cross-configuration comparisons focus on
pub const DEFAULT_FOCUS_RECORDS: u64 = 100_000_000;

#[derive(Error, Debug)]
pub enum ConfigErrors {
    #[error("Glob was invalid: {0}")]
    InvalidGlobs(#[from] globset::Error),
    #[error("Failed to read config file {path:?}: {source}")]
    Unreadable { path: PathBuf, source: Error },
    #[error("Invalid YAML: {0}")]
    InvalidYaml(#[from] serde_yaml::Error),
    #[error("Preflight checks failed, see the errors above")]
    FailedPreflight,
    #[error("Failed to build the worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("Failed to write report: {0}")]
    Output(#[from] Error),
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    // where to look for result files
    #[serde(default)]
    pub collector: CollectorConfig,
    // how result files are read
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct CollectorConfig {
    #[serde(default)]
    pub paths: Vec<PathBuf>,
    // matched against file names only
    #[serde(default = "default_glob")]
    pub glob: String,
    #[serde(default)]
    pub hidden: bool,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            glob: default_glob(),
            hidden: false,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct IngestConfig {
    // worker pool size, rayon picks the number of cpus when absent
    pub threads: Option<usize>,
    // fields whose absence from a header is reported
    #[serde(default)]
    pub expected: Vec<Field>,
    // additional header names on top of the built-in table
    #[serde(default = "FieldAliases::empty")]
    pub aliases: FieldAliases,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            threads: None,
            expected: Vec::new(),
            aliases: FieldAliases::empty(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct AnalysisConfig {
    #[serde(default = "default_leaf_capacity")]
    pub leaf_capacity: u64,
    #[serde(default = "default_focus_records")]
    pub focus_records: u64,
    #[serde(default)]
    pub aggregation: Aggregation,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            leaf_capacity: DEFAULT_LEAF_CAPACITY,
            focus_records: DEFAULT_FOCUS_RECORDS,
            aggregation: Aggregation::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn tree_model(&self) -> TreeModel {
        TreeModel::new(self.leaf_capacity)
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    // stdout when absent
    pub path: Option<PathBuf>,
}

impl PipelineConfig {
    /// read a YAML config file
    pub fn load(path: &Path) -> Result<Self, ConfigErrors> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigErrors::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigErrors> {
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Compile the file name glob of the collector
    pub fn compile_glob(&self) -> Result<GlobMatcher, globset::Error> {
        compile_glob(&self.collector.glob)
    }

    /// built-in alias table extended by the configured aliases
    pub fn aliases(&self) -> FieldAliases {
        let mut aliases = FieldAliases::default();
        aliases.extend(&self.ingest.aliases);
        aliases
    }

    pub fn preflight_checks(&mut self) -> bool {
        // attempt to catch all errors instead of piece-by-piece to make debugging easier for users
        let mut contains_error = false;

        if self.collector.paths.is_empty() {
            error!("No input paths were given, pass them as arguments or set collector.paths");
            contains_error = true;
        }

        for path in self.collector.paths.iter() {
            if !path.exists() {
                error!("collector.paths: {} does not exist", path.to_string_lossy());
                contains_error = true;
            }
        }

        let path_count = self.collector.paths.len();
        self.collector.paths = self.collector.paths.drain(..).unique().collect_vec();
        if self.collector.paths.len() != path_count {
            warn!("collector.paths contains duplicates, every path is searched once");
        }

        if let Err(e) = self.compile_glob() {
            error!("collector.glob ({}) is not a valid glob: {e}", self.collector.glob);
            contains_error = true;
        }

        if self.ingest.threads == Some(0) {
            error!("ingest.threads cannot be 0, leave it unset to use every cpu");
            contains_error = true;
        }

        for field in Field::ALL {
            if self
                .ingest
                .aliases
                .aliases(field)
                .iter()
                .any(|alias| alias.trim().is_empty())
            {
                error!("ingest.aliases.{field} contains an empty header name");
                contains_error = true;
            }
        }

        if self.ingest.expected.contains(&Field::DatabaseSize) {
            warn!("ingest.expected lists database_size, files without it are skipped regardless");
        }

        if self.analysis.leaf_capacity == 0 {
            error!("analysis.leaf_capacity cannot be 0, a leaf has to index at least one record");
            contains_error = true;
        }

        if self.analysis.focus_records == 0 {
            warn!("analysis.focus_records is 0, the extreme comparison will most likely be empty");
        }

        if let Some(ref path) = self.output.path {
            let parent = path.parent().filter(|parent| !parent.as_os_str().is_empty());
            if parent.is_some_and(|parent| !parent.is_dir()) {
                error!(
                    "output.path: directory of {} does not exist",
                    path.to_string_lossy()
                );
                contains_error = true;
            }
            if path.is_dir() {
                error!("output.path: {} is a directory", path.to_string_lossy());
                contains_error = true;
            }
        }

        contains_error
    }
}

pub fn compile_glob(glob: &str) -> Result<GlobMatcher, globset::Error> {
    GlobBuilder::new(glob)
        .build()
        .map(|glob| glob.compile_matcher())
}

fn default_glob() -> String {
    "*.csv".to_owned()
}

fn default_leaf_capacity() -> u64 {
    DEFAULT_LEAF_CAPACITY
}

fn default_focus_records() -> u64 {
    DEFAULT_FOCUS_RECORDS
}
