use crate::{error::AnalysisError, metrics::speedup};
use bloomstat_ingest::{AggregatedDataset, ConfigurationIdentity, MeasurementRow};
use serde::Serialize;
use tracing::debug;

/// no queried key exists, filters prune everything
pub const BEST_CASE_SELECTIVITY: u32 = 0;
/// every queried key exists, every branch is descended
pub const WORST_CASE_SELECTIVITY: u32 = 100;

/// Row of `configuration` measured at exactly `database_size` and `selectivity`
///
/// With several candidates the first one in dataset order wins.
pub fn select_extreme<'a>(
    dataset: &'a AggregatedDataset,
    configuration: &ConfigurationIdentity,
    database_size: u64,
    selectivity: u32,
) -> Option<&'a MeasurementRow> {
    let mut candidates = dataset.rows(configuration).filter(|row| {
        row.database_size == database_size && row.selectivity() == Some(selectivity)
    });

    let selected = candidates.next();
    if let Some(row) = selected {
        let others = candidates.count();
        if others > 0 {
            debug!(%configuration, database_size, selectivity, selected = %row.source, others, "ambiguous extreme");
        }
    }

    selected
}

/// Latencies of one extreme row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtremeRow {
    pub selectivity: u32,
    pub multi_latency: Option<f64>,
    pub single_latency: Option<f64>,
    pub speedup: Option<f64>,
}

impl ExtremeRow {
    fn of(row: &MeasurementRow, selectivity: u32) -> Self {
        let speedup = match (row.single_latency(), row.multi_latency()) {
            (Some(single), Some(multi)) => speedup(single, multi).ok(),
            _ => None,
        };

        Self {
            selectivity,
            multi_latency: row.multi_latency(),
            single_latency: row.single_latency(),
            speedup,
        }
    }
}

/// Best and worst case of one configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtremeComparison {
    pub configuration: ConfigurationIdentity,
    pub database_size: u64,
    pub best: Option<ExtremeRow>,
    pub worst: Option<ExtremeRow>,
}

impl ExtremeComparison {
    /// how much slower the worst case multi-column query is
    pub fn slowdown(&self) -> Option<f64> {
        let best = self.best.as_ref()?.multi_latency?;
        let worst = self.worst.as_ref()?.multi_latency?;
        crate::metrics::ratio(Some(worst), Some(best)).ok()
    }
}

pub fn compare_extreme(
    dataset: &AggregatedDataset,
    configuration: &ConfigurationIdentity,
    database_size: u64,
) -> ExtremeComparison {
    let extreme = |selectivity| {
        select_extreme(dataset, configuration, database_size, selectivity)
            .map(|row| ExtremeRow::of(row, selectivity))
    };

    ExtremeComparison {
        configuration: *configuration,
        database_size,
        best: extreme(BEST_CASE_SELECTIVITY),
        worst: extreme(WORST_CASE_SELECTIVITY),
    }
}

/// Extremes of every configuration that has at least one of them at `database_size`
pub fn compare_extremes(
    dataset: &AggregatedDataset,
    database_size: u64,
) -> Result<Vec<ExtremeComparison>, AnalysisError> {
    let comparisons: Vec<_> = dataset
        .configurations()
        .map(|configuration| compare_extreme(dataset, configuration, database_size))
        .filter(|comparison| comparison.best.is_some() || comparison.worst.is_some())
        .collect();

    if comparisons.is_empty() {
        return Err(AnalysisError::EmptyResult(format!(
            "extremes at database size {database_size}"
        )));
    }

    Ok(comparisons)
}
