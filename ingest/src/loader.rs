use crate::{
    dataset::AggregatedDataset,
    decode::{decode_path, ConfigurationIdentity},
    error::{FileWarning, IngestError, WarningKind},
    row::{coerce, MeasurementRow, RowSource},
    schema::{Field, FieldAliases},
};
use csv::{ReaderBuilder, StringRecord, Trim};
use itertools::Itertools;
use rayon::prelude::*;
use serde::Serialize;
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{debug, info, trace, warn};

/// field every row must carry, rows without it are dropped
pub const KEY_FIELD: Field = Field::DatabaseSize;

const PRIMARY_DELIMITER: u8 = b';';
const FALLBACK_DELIMITER: u8 = b',';

/// Rows recovered from a single file
#[derive(Debug)]
pub struct FileLoad {
    pub configuration: ConfigurationIdentity,
    pub delimiter: u8,
    pub rows: Vec<MeasurementRow>,
    pub warnings: Vec<FileWarning>,
}

/// Per file outcome of a load, part of the run report
#[derive(Debug, Clone, Serialize)]
pub struct FileSummary {
    pub path: PathBuf,
    pub configuration: Option<String>,
    pub rows: usize,
    pub warnings: usize,
}

/// Result of loading a set of files, the dataset plus everything that went wrong
#[derive(Debug, Default)]
pub struct LoadReport {
    pub dataset: AggregatedDataset,
    pub warnings: Vec<FileWarning>,
    pub files: Vec<FileSummary>,
}

impl LoadReport {
    fn absorb(&mut self, path: &Path, outcome: Result<FileLoad, IngestError>) {
        match outcome {
            Ok(load) => {
                info!(
                    path = %path.display(),
                    configuration = %load.configuration,
                    rows = load.rows.len(),
                    "Loaded result file"
                );
                if !load.warnings.is_empty() {
                    warn!(
                        path = %path.display(),
                        warnings = load.warnings.len(),
                        "Result file loaded with warnings"
                    );
                }

                self.files.push(FileSummary {
                    path: path.to_path_buf(),
                    configuration: Some(load.configuration.label()),
                    rows: load.rows.len(),
                    warnings: load.warnings.len(),
                });
                self.dataset.append(load.configuration, load.rows);
                self.warnings.extend(load.warnings);
            }
            Err(error) => {
                warn!(path = %path.display(), "Skipping result file: {error}");

                self.files.push(FileSummary {
                    path: path.to_path_buf(),
                    configuration: None,
                    rows: 0,
                    warnings: 1,
                });
                self.warnings.push(FileWarning::file(path, error));
            }
        }
    }

    /// combine with the report of another load
    pub fn merge(&mut self, other: LoadReport) {
        self.dataset.merge(other.dataset);
        self.warnings.extend(other.warnings);
        self.files.extend(other.files);
    }

    /// number of warnings per category
    pub fn warning_counts(&self) -> BTreeMap<WarningKind, usize> {
        self.warnings
            .iter()
            .map(FileWarning::kind)
            .counts()
            .into_iter()
            .collect()
    }
}

/// Reads result files into normalized rows
#[derive(Debug, Clone)]
pub struct Loader {
    aliases: FieldAliases,
    expected: Vec<Field>,
}

impl Default for Loader {
    fn default() -> Self {
        Self::new(FieldAliases::default())
    }
}

impl Loader {
    pub fn new(aliases: FieldAliases) -> Self {
        Self {
            aliases,
            expected: Vec::new(),
        }
    }

    /// fields whose absence from a file header is reported as a schema warning
    pub fn expect_fields(mut self, fields: impl IntoIterator<Item = Field>) -> Self {
        self.expected.extend(fields);
        self.expected.sort();
        self.expected.dedup();
        self
    }

    pub fn aliases(&self) -> &FieldAliases {
        &self.aliases
    }

    /// Load all files, fanning out over the rayon pool
    ///
    /// Results are merged in input order, the dataset itself does not depend on it.
    pub fn load<P>(&self, paths: &[P]) -> LoadReport
    where
        P: AsRef<Path> + Sync,
    {
        let outcomes: Vec<_> = paths
            .par_iter()
            .map(|path| (path.as_ref(), self.load_file(path.as_ref())))
            .collect();

        let mut report = LoadReport::default();
        for (path, outcome) in outcomes {
            report.absorb(path, outcome);
        }

        info!(
            files = report.files.len(),
            configurations = report.dataset.configurations().count(),
            rows = report.dataset.len(),
            warnings = report.warnings.len(),
            "Finished loading result files"
        );

        report
    }

    /// decode, read and normalize a single file
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn load_file(&self, path: &Path) -> Result<FileLoad, IngestError> {
        let configuration = decode_path(path)?;
        let contents = fs::read(path)?;

        self.parse(path, configuration, &contents)
    }

    /// normalize the contents of a result file already read into memory
    pub fn parse(
        &self,
        path: &Path,
        configuration: ConfigurationIdentity,
        contents: &[u8],
    ) -> Result<FileLoad, IngestError> {
        let mut delimiter = PRIMARY_DELIMITER;
        let mut reader = csv_reader(contents, delimiter);
        let mut headers = reader.headers()?.clone();

        // a single column means the file was written with the other delimiter
        if headers.len() == 1 {
            debug!(path = %path.display(), "Single column with `;`, retrying with `,`");
            delimiter = FALLBACK_DELIMITER;
            reader = csv_reader(contents, delimiter);
            headers = reader.headers()?.clone();
        }

        let columns = self.columns(&headers);
        let key_index = *columns
            .get(&KEY_FIELD)
            .ok_or(IngestError::Schema(KEY_FIELD))?;
        let key_header = headers.get(key_index).unwrap_or_default().to_owned();

        let mut warnings: Vec<FileWarning> = self
            .expected
            .iter()
            .filter(|field| !columns.contains_key(field))
            .map(|field| FileWarning::file(path, IngestError::Schema(*field)))
            .collect();
        let source: Arc<str> = Arc::from(path.to_string_lossy().as_ref());
        let mut rows = Vec::new();

        for record in reader.records() {
            let record = match record {
                Ok(record) => record,
                Err(error) => {
                    let line = error.position().map(|position| position.line());
                    debug!(path = %path.display(), line = ?line, "Unreadable record: {error}");

                    warnings.push(FileWarning {
                        path: path.to_path_buf(),
                        line,
                        error: error.into(),
                    });
                    continue;
                }
            };
            let line = record.position().map_or(0, |position| position.line());

            match self.normalize(&record, &columns, key_index, &key_header, &source, line) {
                Ok((row, row_warnings)) => {
                    trace!(source = %row.source, "Normalized row");

                    rows.push(row);
                    warnings.extend(
                        row_warnings
                            .into_iter()
                            .map(|error| FileWarning::record(path, line, error)),
                    );
                }
                Err(error) => {
                    debug!(path = %path.display(), line = line, "Dropped row: {error}");

                    warnings.push(FileWarning::record(path, line, error));
                }
            }
        }

        Ok(FileLoad {
            configuration,
            delimiter,
            rows,
            warnings,
        })
    }

    /// header index of every recognized field, the first matching header wins
    fn columns(&self, headers: &StringRecord) -> BTreeMap<Field, usize> {
        let mut columns = BTreeMap::new();

        for (index, header) in headers.iter().enumerate() {
            let fields = self.aliases.resolve(header);

            if fields.is_empty() {
                trace!(header = header, "Ignoring unrecognized column");
            }

            for field in fields {
                columns.entry(field).or_insert(index);
            }
        }

        columns
    }

    /// build one row, an `Err` drops the row while the warnings of an `Ok` only drop values
    fn normalize(
        &self,
        record: &StringRecord,
        columns: &BTreeMap<Field, usize>,
        key_index: usize,
        key_header: &str,
        source: &Arc<str>,
        line: u64,
    ) -> Result<(MeasurementRow, Vec<IngestError>), IngestError> {
        let key = record.get(key_index).unwrap_or_default();

        // concatenated experiment outputs repeat their header mid-file
        if key == key_header {
            return Err(IngestError::EmbeddedHeader);
        }

        let database_size =
            coerce(KEY_FIELD, key).map_err(|_| IngestError::MissingKeyField(KEY_FIELD))? as u64;
        let mut row = MeasurementRow::new(RowSource::new(source.clone(), line), database_size);
        let mut warnings = Vec::new();

        for (field, index) in columns.iter().filter(|(field, _)| **field != KEY_FIELD) {
            match coerce(*field, record.get(*index).unwrap_or_default()) {
                Ok(value) => row.insert(*field, value),
                Err(error) => warnings.push(error),
            }
        }

        Ok((row, warnings))
    }
}

fn csv_reader(contents: &[u8], delimiter: u8) -> csv::Reader<&[u8]> {
    ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    fn parse(contents: &str) -> FileLoad {
        Loader::default()
            .parse(
                Path::new("exp_1_mixed_query_summary_1M-R10.csv"),
                ConfigurationIdentity::new(1, 10),
                contents.as_bytes(),
            )
            .unwrap()
    }

    #[test]
    fn semicolon_delimited() {
        let load = parse("dbSize;realDataPercentage;avgMultiTime;avgSingleTime\n1000000;0;12.5;30\n");

        assert_eq!(load.delimiter, b';');
        assert_eq!(load.rows.len(), 1);
        assert_eq!(load.rows[0].multi_latency(), Some(12.5));
        assert_eq!(load.rows[0].single_latency(), Some(30.0));
        assert!(load.warnings.is_empty());
    }

    #[test]
    fn comma_fallback() {
        let load = parse("dbSize,realDataPercentage,avgMultiTime,avgSingleTime\n1000000,100,12.5,30\n");

        assert_eq!(load.delimiter, b',');
        assert_eq!(load.rows[0].selectivity(), Some(100));
        assert_eq!(load.rows[0].database_size, 1_000_000);
    }

    #[test]
    fn embedded_headers_are_dropped() {
        let load = parse(
            "dbSize,realDataPercentage,avgMultiTime\n\
             1000000,0,1\n\
             dbSize,realDataPercentage,avgMultiTime\n\
             2000000,0,2\n",
        );

        assert_eq!(load.rows.len(), 2);
        assert_eq!(
            load.warnings
                .iter()
                .filter(|warning| warning.kind() == WarningKind::EmbeddedHeader)
                .count(),
            1
        );
    }

    #[test]
    fn coercion_failure_keeps_row() {
        let load = parse("dbSize,realDataPercentage,avgMultiTime,avgSingleTime\n1000000,20,fast,30\n");

        assert_eq!(load.rows.len(), 1);
        assert_eq!(load.rows[0].multi_latency(), None);
        assert_eq!(load.rows[0].single_latency(), Some(30.0));
        assert_eq!(load.warnings.len(), 1);
        assert_eq!(load.warnings[0].kind(), WarningKind::Coercion);
        assert_eq!(load.warnings[0].line, Some(2));
    }

    #[test]
    fn bad_key_drops_row() {
        let load = parse("dbSize,avgMultiTime\nlots,1\n-5,2\n1000,3\n");

        assert_eq!(load.rows.len(), 1);
        assert_eq!(load.rows[0].database_size, 1000);
        assert_eq!(load.warnings.len(), 2);
        assert!(load
            .warnings
            .iter()
            .all(|warning| matches!(warning.error, IngestError::MissingKeyField(_))));
    }

    #[test]
    fn short_rows_have_missing_values() {
        let load = parse("dbSize,realDataPercentage,avgMultiTime\n1000,40\n");

        assert_eq!(load.rows.len(), 1);
        assert_eq!(load.rows[0].selectivity(), Some(40));
        assert_eq!(load.rows[0].multi_latency(), None);
    }

    #[test]
    fn storage_headers_feed_two_fields() {
        let load = parse(
            "numRecords,bloomTreeRatio,itemsPerPartition,bloomSize,numHashFunctions,singleHierarchyLeafs,bloomDiskSize,blomMemSize\n\
             10000000,10,100000,1000000,3,100,2048,1024\n",
        );
        let row = &load.rows[0];

        assert_eq!(row.database_size, 10_000_000);
        assert_eq!(row.record_count(), Some(10_000_000));
        assert_eq!(row.disk_bytes(), Some(2048));
        assert_eq!(row.memory_bytes(), Some(1024));
        assert_eq!(row.get(Field::LeafNodes), Some(100.0));
    }

    #[test]
    fn bloom_metrics_storage_columns() {
        let load = parse(
            "dbSize,itemsPerPartition,falsePositiveProbability,leafs,diskBloomSize,memoryBloomSize\n\
             1000000,100000,0.01,10,2048,1024\n",
        );
        let row = &load.rows[0];

        assert!(load.warnings.is_empty());
        assert_eq!(row.disk_bytes(), Some(2048));
        assert_eq!(row.memory_bytes(), Some(1024));
        assert_eq!(row.get(Field::LeafNodes), Some(10.0));
        assert_eq!(row.get(Field::ItemsPerPartition), Some(100000.0));
    }

    #[test]
    fn query_timing_columns() {
        let load = parse(
            "dbSize,globalScanTime,hierarchicalMultiColumnTime,hierarchicalSingleColumnTime\n\
             2000000,900,12,40\n",
        );
        let row = &load.rows[0];

        assert_eq!(row.multi_latency(), Some(12.0));
        assert_eq!(row.single_latency(), Some(40.0));
        assert_eq!(row.get(Field::GlobalScanLatency), Some(900.0));
    }

    #[test]
    fn oversized_key_drops_row() {
        let load = parse("dbSize;avgMultiTime\n1e30;1\n1000;2\n");

        assert_eq!(load.rows.len(), 1);
        assert_eq!(load.rows[0].database_size, 1000);
        assert_eq!(load.warnings.len(), 1);
        assert!(matches!(
            load.warnings[0].error,
            IngestError::MissingKeyField(Field::DatabaseSize)
        ));
    }

    #[test]
    fn missing_key_column_is_a_schema_error() {
        let result = Loader::default().parse(
            Path::new("x_1M-R2.csv"),
            ConfigurationIdentity::new(1, 2),
            b"numColumns,avgMultiTime\n2,3\n",
        );

        assert!(matches!(result, Err(IngestError::Schema(Field::DatabaseSize))));
    }

    #[test]
    fn expected_fields_are_reported() {
        let load = Loader::default()
            .expect_fields([Field::SingleLatency, Field::MultiLatency])
            .parse(
                Path::new("x_1M-R2.csv"),
                ConfigurationIdentity::new(1, 2),
                b"dbSize,avgMultiTime\n10,3\n",
            )
            .unwrap();

        assert_eq!(load.rows.len(), 1);
        assert_eq!(load.warnings.len(), 1);
        assert!(matches!(
            load.warnings[0].error,
            IngestError::Schema(Field::SingleLatency)
        ));
    }

    #[test]
    fn load_skips_undecodable_files() {
        let dir = TempDir::new().unwrap();
        let good = write(&dir, "summary_1M-R10.csv", "dbSize;avgMultiTime\n10;1\n");
        let bad = write(&dir, "summary.csv", "dbSize;avgMultiTime\n10;1\n");
        let missing = dir.path().join("gone_2M-R2.csv");

        let report = Loader::default().load(&[good, bad, missing]);

        assert_eq!(report.dataset.len(), 1);
        assert_eq!(report.files.len(), 3);
        let counts = report.warning_counts();
        assert_eq!(counts.get(&WarningKind::Decode), Some(&1));
        assert_eq!(counts.get(&WarningKind::Read), Some(&1));
    }

    #[test]
    fn same_configuration_files_are_merged() {
        let dir = TempDir::new().unwrap();
        let first = write(&dir, "a_1M-R10_run1.csv", "dbSize,realDataPercentage\n10,0\n");
        let second = write(&dir, "b_1M-R10_run2.csv", "dbSize,realDataPercentage\n10,100\n");

        let report = Loader::default().load(&[first, second]);
        let configuration = ConfigurationIdentity::new(1, 10);

        assert_eq!(report.dataset.configurations().count(), 1);
        assert_eq!(report.dataset.row_count(&configuration), 2);
    }
}
