use crate::config::AnalysisConfig;
use bloomstat_analysis::{
    compare_extremes,
    metrics::Metric,
    pivot::{Aggregation, Axis, DuplicateCell, PivotQuery, PivotTable},
    summary::{
        check_effectiveness, real_false_ratio, selectivity_contrast, storage_breakdown,
        utilization_by_configuration, utilization_by_size, CheckEffectiveness,
        SelectivityContrast, StorageRow, UtilizationRow,
    },
    DerivedMetric, ExtremeComparison, TreeModel, TreeShape, BEST_CASE_SELECTIVITY,
    BYTES_PER_RECORD_ESTIMATE, BYTES_PER_RECORD_ESTIMATE_VERSION, FILTER_CHECK_DIVISOR,
};
use bloomstat_ingest::{
    AggregatedDataset, ConfigurationIdentity, Field, FileSummary, FileWarning, LoadReport,
    WarningKind,
};
use serde::Serialize;
use std::{collections::BTreeMap, path::PathBuf};
use tracing::{debug, info, warn};

/// values pivoted for every configuration
const CONFIGURATION_METRICS: [Metric; 5] = [
    Metric::Measured(Field::MultiLatency),
    Metric::Measured(Field::SingleLatency),
    Metric::Derived(DerivedMetric::SpeedupRatio),
    Metric::Measured(Field::BloomChecks),
    Metric::Derived(DerivedMetric::TraversalEfficiency),
];

/// values compared across configurations at the focus database size
const FOCUS_METRICS: [Metric; 3] = [
    Metric::Measured(Field::MultiLatency),
    Metric::Derived(DerivedMetric::SpeedupRatio),
    Metric::Derived(DerivedMetric::TraversalEfficiency),
];

#[derive(Debug, Serialize)]
pub struct Report {
    pub summary: RunSummary,
    pub model: ModelSummary,
    pub configurations: Vec<ConfigurationReport>,
    pub cross_configuration: Vec<PivotReport>,
    pub extremes: Vec<ExtremeComparison>,
    pub focus_utilization: Vec<UtilizationRow>,
    pub files: Vec<FileSummary>,
    pub warnings: Vec<WarningEntry>,
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub files: usize,
    pub configurations: usize,
    pub rows: usize,
    pub warnings: BTreeMap<WarningKind, usize>,
}

/// constants and parameters every derived number of the report depends on
#[derive(Debug, Serialize)]
pub struct ModelSummary {
    pub leaf_capacity: u64,
    pub focus_records: u64,
    pub aggregation: Aggregation,
    pub filter_check_divisor: f64,
    pub bytes_per_record_estimate: f64,
    pub bytes_per_record_estimate_version: u32,
}

#[derive(Debug, Serialize)]
pub struct ConfigurationReport {
    pub configuration: String,
    pub rows: usize,
    /// reference tree at the focus database size
    pub tree: Option<TreeShape>,
    pub pivots: Vec<PivotReport>,
    pub utilization: Vec<UtilizationRow>,
    pub storage: Vec<StorageRow>,
    pub selectivity_contrast: SelectivityContrast,
    pub real_false_ratio: Option<f64>,
    pub check_effectiveness: Vec<CheckEffectiveness>,
}

#[derive(Debug, Serialize)]
pub struct PivotReport {
    /// observations the table was restricted to, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(flatten)]
    pub table: PivotTable,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub duplicates: Vec<DuplicateCell>,
}

impl PivotReport {
    /// `None` for tables without a single present value
    fn new(table: PivotTable, filter: Option<String>) -> Option<Self> {
        if table.triples().is_empty() {
            debug!(value = %table.value, rows = %table.row_key, columns = %table.column_key, "Skipping pivot without values");
            return None;
        }

        let duplicates = table.duplicate_cells();
        if !duplicates.is_empty() {
            warn!(
                value = %table.value,
                cells = duplicates.len(),
                "Pivot cells with more than one observation"
            );
        }

        Some(Self {
            filter,
            table,
            duplicates,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct WarningEntry {
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u64>,
    pub kind: WarningKind,
    pub message: String,
}

impl From<&FileWarning> for WarningEntry {
    fn from(warning: &FileWarning) -> Self {
        Self {
            path: warning.path.clone(),
            line: warning.line,
            kind: warning.kind(),
            message: warning.error.to_string(),
        }
    }
}

impl Report {
    pub fn build(load: &LoadReport, config: &AnalysisConfig) -> Self {
        let dataset = &load.dataset;
        let model = config.tree_model();

        let configurations = dataset
            .configurations()
            .map(|configuration| configuration_report(dataset, configuration, config, &model))
            .collect();

        let extremes = match compare_extremes(dataset, config.focus_records) {
            Ok(extremes) => extremes,
            Err(error) => {
                warn!("No extreme comparison: {error}");
                Vec::new()
            }
        };

        let report = Self {
            summary: RunSummary {
                files: load.files.len(),
                configurations: dataset.configurations().count(),
                rows: dataset.len(),
                warnings: load.warning_counts(),
            },
            model: ModelSummary {
                leaf_capacity: config.leaf_capacity,
                focus_records: config.focus_records,
                aggregation: config.aggregation,
                filter_check_divisor: FILTER_CHECK_DIVISOR,
                bytes_per_record_estimate: BYTES_PER_RECORD_ESTIMATE,
                bytes_per_record_estimate_version: BYTES_PER_RECORD_ESTIMATE_VERSION,
            },
            configurations,
            cross_configuration: cross_configuration_pivots(dataset, config, &model),
            extremes,
            focus_utilization: utilization_by_configuration(dataset, config.focus_records, &model),
            files: load.files.clone(),
            warnings: load.warnings.iter().map(WarningEntry::from).collect(),
        };

        info!(
            configurations = report.configurations.len(),
            cross_configuration = report.cross_configuration.len(),
            extremes = report.extremes.len(),
            "Built report"
        );

        report
    }
}

fn configuration_report(
    dataset: &AggregatedDataset,
    configuration: &ConfigurationIdentity,
    config: &AnalysisConfig,
    model: &TreeModel,
) -> ConfigurationReport {
    // column experiments pivot selectivity against columns, scaling experiments size against selectivity
    let (rows, columns) = if dataset
        .rows(configuration)
        .any(|row| row.num_columns().is_some())
    {
        (Axis::Field(Field::Selectivity), Axis::Field(Field::NumColumns))
    } else {
        (Axis::Field(Field::DatabaseSize), Axis::Field(Field::Selectivity))
    };

    let pivots = CONFIGURATION_METRICS
        .into_iter()
        .filter_map(|value| {
            let table = PivotQuery::new(rows, columns, value, config.aggregation)
                .apply(dataset.observations_of(configuration), model);
            PivotReport::new(table, None)
        })
        .collect();

    let tree = model
        .shape(config.focus_records, configuration.fanout_ratio)
        .map_err(|error| warn!(%configuration, "No reference tree: {error}"))
        .ok();

    ConfigurationReport {
        configuration: configuration.label(),
        rows: dataset.row_count(configuration),
        tree,
        pivots,
        utilization: utilization_by_size(dataset, configuration, model),
        storage: storage_breakdown(dataset, configuration),
        selectivity_contrast: selectivity_contrast(
            dataset.observations_of(configuration),
            Metric::Measured(Field::MultiLatency),
            model,
        ),
        real_false_ratio: real_false_ratio(dataset.rows(configuration)),
        check_effectiveness: check_effectiveness(dataset.rows(configuration)),
    }
}

fn cross_configuration_pivots(
    dataset: &AggregatedDataset,
    config: &AnalysisConfig,
    model: &TreeModel,
) -> Vec<PivotReport> {
    let focus = config.focus_records;

    let focus_pivots = FOCUS_METRICS.into_iter().filter_map(|value| {
        let table = PivotQuery::new(
            Axis::Configuration,
            Field::Selectivity,
            value,
            config.aggregation,
        )
        .apply(
            dataset
                .observations()
                .filter(|(_, row)| row.database_size == focus),
            model,
        );
        PivotReport::new(table, Some(format!("database_size == {focus}")))
    });

    let scaling = PivotQuery::new(
        Axis::Configuration,
        Field::DatabaseSize,
        Field::MultiLatency,
        config.aggregation,
    )
    .apply(
        dataset
            .observations()
            .filter(|(_, row)| row.selectivity() == Some(BEST_CASE_SELECTIVITY)),
        model,
    );

    focus_pivots
        .chain(PivotReport::new(
            scaling,
            Some(format!("selectivity == {BEST_CASE_SELECTIVITY}")),
        ))
        .collect()
}
