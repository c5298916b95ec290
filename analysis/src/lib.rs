//! Pivots, derived metrics and the theoretical tree model over loaded benchmark results

pub mod error;
pub mod extremes;
pub mod metrics;
pub mod pivot;
pub mod summary;
pub mod tree;

pub use error::AnalysisError;
pub use extremes::{
    compare_extreme, compare_extremes, select_extreme, ExtremeComparison, ExtremeRow,
    BEST_CASE_SELECTIVITY, WORST_CASE_SELECTIVITY,
};
pub use metrics::{
    speedup, storage_overhead, DerivedMetric, Metric, MetricError, BYTES_PER_RECORD_ESTIMATE,
    BYTES_PER_RECORD_ESTIMATE_VERSION, FILTER_CHECK_DIVISOR,
};
pub use pivot::{pivot, Aggregation, Axis, AxisValue, DuplicateCell, PivotQuery, PivotTable};
pub use tree::{theoretical_node_count, ModelError, TreeModel, TreeShape, DEFAULT_LEAF_CAPACITY};
