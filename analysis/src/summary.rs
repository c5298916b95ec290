//! Scalar summaries and small per-configuration tables

use crate::{
    extremes::{select_extreme, BEST_CASE_SELECTIVITY, WORST_CASE_SELECTIVITY},
    metrics::{
        filters_checked, mean, ratio, storage_overhead, to_mib, traversal_efficiency, Metric,
        BYTES_PER_RECORD_ESTIMATE,
    },
    tree::TreeModel,
};
use bloomstat_ingest::{AggregatedDataset, ConfigurationIdentity, Field, MeasurementRow};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::trace;

/// mean of `metric` over the observations, missing values skipped
pub fn mean_of<'a, I>(observations: I, metric: Metric, model: &TreeModel) -> Option<f64>
where
    I: IntoIterator<Item = (&'a ConfigurationIdentity, &'a MeasurementRow)>,
{
    mean(
        observations
            .into_iter()
            .map(|(configuration, row)| metric.evaluate(configuration, row, model)),
    )
}

/// A metric with no queried key present against every queried key present
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectivityContrast {
    pub metric: Metric,
    pub all_absent: Option<f64>,
    pub all_present: Option<f64>,
    /// `all_present / all_absent`
    pub slowdown: Option<f64>,
}

pub fn selectivity_contrast<'a, I>(
    observations: I,
    metric: Metric,
    model: &TreeModel,
) -> SelectivityContrast
where
    I: IntoIterator<Item = (&'a ConfigurationIdentity, &'a MeasurementRow)>,
{
    let mut absent = Vec::new();
    let mut present = Vec::new();

    for (configuration, row) in observations {
        match row.selectivity() {
            Some(BEST_CASE_SELECTIVITY) => absent.push(metric.evaluate(configuration, row, model)),
            Some(WORST_CASE_SELECTIVITY) => {
                present.push(metric.evaluate(configuration, row, model))
            }
            _ => {}
        }
    }

    let all_absent = mean(absent);
    let all_present = mean(present);

    SelectivityContrast {
        metric,
        all_absent,
        all_present,
        slowdown: ratio(all_present, all_absent).ok(),
    }
}

/// Latency of queries for existing keys relative to absent keys
///
/// Only rows with a mixed workload (selectivity strictly between 0 and 100) take part.
pub fn real_false_ratio<'a>(rows: impl IntoIterator<Item = &'a MeasurementRow>) -> Option<f64> {
    let (real, absent): (Vec<_>, Vec<_>) = rows
        .into_iter()
        .filter(|row| {
            row.selectivity().is_some_and(|selectivity| {
                selectivity > BEST_CASE_SELECTIVITY && selectivity < WORST_CASE_SELECTIVITY
            })
        })
        .map(|row| (row.get(Field::RealMultiLatency), row.get(Field::FalseMultiLatency)))
        .unzip();

    ratio(mean(real), mean(absent)).ok()
}

/// Filter checks spent per storage lookup of one (columns, selectivity) group
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckEffectiveness {
    pub num_columns: Option<u32>,
    pub selectivity: Option<u32>,
    pub bloom_checks: Option<f64>,
    pub sst_checks: Option<f64>,
    /// missing when no storage segment was touched at all
    pub bloom_per_sst: Option<f64>,
}

pub fn check_effectiveness<'a>(
    rows: impl IntoIterator<Item = &'a MeasurementRow>,
) -> Vec<CheckEffectiveness> {
    let mut groups: BTreeMap<_, (Vec<_>, Vec<_>)> = BTreeMap::new();

    for row in rows {
        let (bloom, sst) = groups
            .entry((row.num_columns(), row.selectivity()))
            .or_default();
        bloom.push(row.bloom_checks());
        sst.push(row.sst_checks());
    }

    groups
        .into_iter()
        .map(|((num_columns, selectivity), (bloom, sst))| {
            let bloom_checks = mean(bloom);
            let sst_checks = mean(sst);

            CheckEffectiveness {
                num_columns,
                selectivity,
                bloom_checks,
                sst_checks,
                bloom_per_sst: ratio(bloom_checks, sst_checks).ok(),
            }
        })
        .collect()
}

/// Measured tree traversal against the theoretical tree of one row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UtilizationRow {
    pub configuration: ConfigurationIdentity,
    pub database_size: u64,
    pub bloom_checks: Option<f64>,
    pub filters_checked: Option<f64>,
    pub theoretical_nodes: Option<u64>,
    pub tree_depth: Option<usize>,
    pub traversal_efficiency: Option<f64>,
}

impl UtilizationRow {
    fn of(configuration: &ConfigurationIdentity, row: &MeasurementRow, model: &TreeModel) -> Self {
        let shape = model
            .shape(row.database_size, configuration.fanout_ratio)
            .map_err(|error| trace!(%configuration, source = %row.source, %error, "no tree model"))
            .ok();
        let theoretical_nodes = shape.as_ref().map(|shape| shape.total());
        let bloom_checks = row.bloom_checks();

        Self {
            configuration: *configuration,
            database_size: row.database_size,
            bloom_checks,
            filters_checked: bloom_checks.map(filters_checked),
            theoretical_nodes,
            tree_depth: shape.as_ref().map(|shape| shape.depth()),
            traversal_efficiency: bloom_checks
                .zip(theoretical_nodes)
                .and_then(|(checks, nodes)| traversal_efficiency(checks, nodes).ok()),
        }
    }
}

/// Utilization of one configuration over its database sizes, best case rows only
pub fn utilization_by_size(
    dataset: &AggregatedDataset,
    configuration: &ConfigurationIdentity,
    model: &TreeModel,
) -> Vec<UtilizationRow> {
    dataset
        .sorted_rows(configuration)
        .into_iter()
        .filter(|row| row.selectivity() == Some(BEST_CASE_SELECTIVITY))
        .map(|row| UtilizationRow::of(configuration, row, model))
        .collect()
}

/// Utilization of every configuration at one database size, best case rows only
pub fn utilization_by_configuration(
    dataset: &AggregatedDataset,
    database_size: u64,
    model: &TreeModel,
) -> Vec<UtilizationRow> {
    dataset
        .configurations()
        .filter_map(|configuration| {
            select_extreme(dataset, configuration, database_size, BEST_CASE_SELECTIVITY)
                .map(|row| UtilizationRow::of(configuration, row, model))
        })
        .collect()
}

/// Filter hierarchy footprint at one database size
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorageRow {
    pub database_size: u64,
    pub record_count: u64,
    pub disk_mib: f64,
    pub memory_mib: f64,
    pub total_mib: f64,
    pub overhead_percent: Option<f64>,
}

/// Storage of one configuration, rows lacking either size are left out
pub fn storage_breakdown(
    dataset: &AggregatedDataset,
    configuration: &ConfigurationIdentity,
) -> Vec<StorageRow> {
    dataset
        .sorted_rows(configuration)
        .into_iter()
        .filter_map(|row| {
            let (disk, memory) = row.disk_bytes().zip(row.memory_bytes())?;
            let record_count = row.record_count().unwrap_or(row.database_size);

            Some(StorageRow {
                database_size: row.database_size,
                record_count,
                disk_mib: to_mib(disk),
                memory_mib: to_mib(memory),
                total_mib: to_mib(disk) + to_mib(memory),
                overhead_percent: storage_overhead(
                    disk,
                    memory,
                    record_count,
                    BYTES_PER_RECORD_ESTIMATE,
                )
                .ok(),
            })
        })
        .collect()
}
