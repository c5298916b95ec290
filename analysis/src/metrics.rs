use crate::tree::TreeModel;
use bloomstat_ingest::{ConfigurationIdentity, Field, MeasurementRow};
use serde::{Deserialize, Serialize, Serializer};
use std::{fmt, str::FromStr};
use thiserror::Error;
use tracing::trace;

/// raw bloom check counters count every filter three times
// TODO: confirm the divisor against the benchmark instrumentation once the counters are documented
pub const FILTER_CHECK_DIVISOR: f64 = 3.0;

/// published per-record size of the plain key layout the overhead is measured against
pub const BYTES_PER_RECORD_ESTIMATE: f64 = 26.8;
pub const BYTES_PER_RECORD_ESTIMATE_VERSION: u32 = 1;

pub const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum MetricError {
    #[error("denominator {0} is not positive")]
    NonPositiveDenominator(f64),
    #[error("an input value is missing")]
    Missing,
}

/// `numerator / denominator` over optional inputs
pub fn ratio(numerator: Option<f64>, denominator: Option<f64>) -> Result<f64, MetricError> {
    let (Some(numerator), Some(denominator)) = (numerator, denominator) else {
        return Err(MetricError::Missing);
    };
    if denominator <= 0.0 || !denominator.is_finite() {
        return Err(MetricError::NonPositiveDenominator(denominator));
    }

    Ok(numerator / denominator)
}

/// how many times faster the multi-column query is than the single-column baseline
pub fn speedup(single: f64, multi: f64) -> Result<f64, MetricError> {
    ratio(Some(single), Some(multi))
}

/// inverse of [`speedup`]
pub fn efficiency(multi: f64, single: f64) -> Result<f64, MetricError> {
    ratio(Some(multi), Some(single))
}

/// Extra space of the filter hierarchy relative to the raw data, in percent
///
/// The raw size is `record_count * bytes_per_record`.
pub fn storage_overhead(
    disk_bytes: u64,
    memory_bytes: u64,
    record_count: u64,
    bytes_per_record: f64,
) -> Result<f64, MetricError> {
    let raw = record_count as f64 * bytes_per_record;
    let total = disk_bytes as f64 + memory_bytes as f64;

    ratio(Some(total), Some(raw)).map(|share| share * 100.0)
}

pub fn filters_checked(bloom_checks: f64) -> f64 {
    bloom_checks / FILTER_CHECK_DIVISOR
}

/// share of the theoretical tree a query actually visited
pub fn traversal_efficiency(bloom_checks: f64, theoretical_nodes: u64) -> Result<f64, MetricError> {
    ratio(
        Some(filters_checked(bloom_checks)),
        Some(theoretical_nodes as f64),
    )
}

pub fn to_mib(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MIB
}

/// arithmetic mean of the present values, `None` when nothing is present
pub fn mean(values: impl IntoIterator<Item = Option<f64>>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .flatten()
        .fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));

    (count > 0).then(|| sum / count as f64)
}

/// Metrics computed from a row instead of read from it
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivedMetric {
    SpeedupRatio,
    EfficiencyRatio,
    TheoreticalTreeNodes,
    StorageOverheadPercent,
    FiltersChecked,
    TraversalEfficiency,
}

impl DerivedMetric {
    pub const ALL: [DerivedMetric; 6] = [
        Self::SpeedupRatio,
        Self::EfficiencyRatio,
        Self::TheoreticalTreeNodes,
        Self::StorageOverheadPercent,
        Self::FiltersChecked,
        Self::TraversalEfficiency,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::SpeedupRatio => "speedup_ratio",
            Self::EfficiencyRatio => "efficiency_ratio",
            Self::TheoreticalTreeNodes => "theoretical_tree_nodes",
            Self::StorageOverheadPercent => "storage_overhead_percent",
            Self::FiltersChecked => "filters_checked",
            Self::TraversalEfficiency => "traversal_efficiency",
        }
    }

    /// Evaluate against a single row, failures become missing values
    pub fn evaluate(
        &self,
        configuration: &ConfigurationIdentity,
        row: &MeasurementRow,
        model: &TreeModel,
    ) -> Option<f64> {
        let result = match self {
            Self::SpeedupRatio => ratio(row.single_latency(), row.multi_latency()),
            Self::EfficiencyRatio => ratio(row.multi_latency(), row.single_latency()),
            Self::TheoreticalTreeNodes => {
                return self.nodes(configuration, row, model).map(|nodes| nodes as f64)
            }
            Self::StorageOverheadPercent => match (row.disk_bytes(), row.memory_bytes()) {
                (Some(disk), Some(memory)) => storage_overhead(
                    disk,
                    memory,
                    row.record_count().unwrap_or(row.database_size),
                    BYTES_PER_RECORD_ESTIMATE,
                ),
                _ => Err(MetricError::Missing),
            },
            Self::FiltersChecked => return row.bloom_checks().map(filters_checked),
            Self::TraversalEfficiency => {
                let nodes = self.nodes(configuration, row, model)?;
                row.bloom_checks()
                    .ok_or(MetricError::Missing)
                    .and_then(|checks| traversal_efficiency(checks, nodes))
            }
        };

        match result {
            Ok(value) => Some(value),
            Err(error) => {
                trace!(metric = self.name(), source = %row.source, %error, "metric unavailable");
                None
            }
        }
    }

    fn nodes(
        &self,
        configuration: &ConfigurationIdentity,
        row: &MeasurementRow,
        model: &TreeModel,
    ) -> Option<u64> {
        model
            .node_count(row.database_size, configuration.fanout_ratio)
            .map_err(|error| {
                trace!(metric = self.name(), source = %row.source, %error, "no tree model");
            })
            .ok()
    }
}

impl fmt::Display for DerivedMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A value column of a pivot, either a measured field or a derived metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Metric {
    Measured(Field),
    Derived(DerivedMetric),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown metric `{0}`")]
pub struct UnknownMetric(pub String);

impl Metric {
    pub fn evaluate(
        &self,
        configuration: &ConfigurationIdentity,
        row: &MeasurementRow,
        model: &TreeModel,
    ) -> Option<f64> {
        match self {
            Self::Measured(field) => row.get(*field),
            Self::Derived(metric) => metric.evaluate(configuration, row, model),
        }
    }
}

impl From<Field> for Metric {
    fn from(field: Field) -> Self {
        Self::Measured(field)
    }
}

impl From<DerivedMetric> for Metric {
    fn from(metric: DerivedMetric) -> Self {
        Self::Derived(metric)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Measured(field) => field.fmt(f),
            Self::Derived(metric) => metric.fmt(f),
        }
    }
}

impl FromStr for Metric {
    type Err = UnknownMetric;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(field) = s.parse::<Field>() {
            return Ok(Self::Measured(field));
        }

        DerivedMetric::ALL
            .into_iter()
            .find(|metric| metric.name() == s)
            .map(Self::Derived)
            .ok_or_else(|| UnknownMetric(s.to_owned()))
    }
}

impl Serialize for Metric {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Metric {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}
