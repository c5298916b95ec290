use crate::config::{compile_glob, CollectorConfig, ConfigErrors};
use ignore::{DirEntry, WalkBuilder};
use itertools::Itertools;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Result files found below the configured paths
///
/// Paths are sorted and unique, so the same tree always yields the same list.
#[derive(Debug, Default)]
pub struct Collector {
    paths: Vec<PathBuf>,
}

impl Collector {
    pub fn load(config: &CollectorConfig) -> Result<Self, ConfigErrors> {
        let glob = compile_glob(&config.glob)?;
        let Some((first, others)) = config.paths.split_first() else {
            return Ok(Self::default());
        };
        let mut builder = WalkBuilder::new(first);

        debug!("Filtering with glob: {glob:?}");
        // add other paths
        others.iter().for_each(|path| {
            builder.add(path);
        });
        // .gitignore and friends are not honored, only the hidden flag
        builder.standard_filters(false).hidden(!config.hidden);

        let paths = builder
            .build()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(error) => {
                    warn!("Failed to walk result directory: {error}");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_some_and(|kind| kind.is_file()))
            .map(DirEntry::into_path)
            .filter(|path| {
                let matched = path.file_name().is_some_and(|name| glob.is_match(name));
                if !matched {
                    debug!(path = %path.display(), "Skipping file not matching the glob");
                }
                matched
            })
            .sorted()
            .dedup()
            .collect_vec();

        Ok(Self { paths })
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.binary_search_by(|known| known.as_path().cmp(path)).is_ok()
    }
}

impl IntoIterator for Collector {
    type Item = PathBuf;
    type IntoIter = std::vec::IntoIter<PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.paths.into_iter()
    }
}
