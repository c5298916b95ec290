use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, str::FromStr};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown field `{0}`")]
pub struct UnknownField(pub String);

/// Canonical measurement fields
///
/// Every experiment names these differently, the `FieldAliases` table maps header names
/// onto them.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    // axis fields
    DatabaseSize,
    Selectivity,
    NumColumns,

    // latencies in microseconds
    MultiLatency,
    SingleLatency,
    GlobalScanLatency,
    RealMultiLatency,
    RealSingleLatency,
    FalseMultiLatency,
    FalseSingleLatency,

    // check counts, multi-column unless prefixed
    BloomChecks,
    LeafBloomChecks,
    NonLeafBloomChecks,
    SstChecks,
    SingleBloomChecks,
    SingleLeafBloomChecks,
    SingleNonLeafBloomChecks,
    SingleSstChecks,
    RealBloomChecks,
    RealSstChecks,
    FalseBloomChecks,
    FalseSstChecks,

    // query mix
    TotalQueries,
    RealQueries,
    FalseQueries,

    // storage
    DiskBytes,
    MemoryBytes,
    RecordCount,

    // tree parameters echoed into some result files
    FanoutRatio,
    ItemsPerPartition,
    LeafNodes,
}

/// Admissible values of a field, values outside the domain are treated as missing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    /// integer >= 0 that fits a u64
    Count,
    /// integer >= 1 that fits a u64
    PositiveCount,
    /// integer in 0..=100
    Percent,
    /// finite float >= 0
    Measure,
}

impl Domain {
    pub fn admits(&self, value: f64) -> bool {
        if !value.is_finite() || value < 0.0 {
            return false;
        }

        // integral values are stored as u64, 2^64 itself is the first float past u64::MAX
        let integral = value.fract() == 0.0 && value < u64::MAX as f64;

        match self {
            Self::Measure => true,
            Self::Count => integral,
            Self::PositiveCount => integral && value >= 1.0,
            Self::Percent => value.fract() == 0.0 && value <= 100.0,
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Count => "non-negative integer",
            Self::PositiveCount => "positive integer",
            Self::Percent => "integer percentage (0-100)",
            Self::Measure => "non-negative finite number",
        })
    }
}

impl Field {
    pub const ALL: [Field; 31] = [
        Field::DatabaseSize,
        Field::Selectivity,
        Field::NumColumns,
        Field::MultiLatency,
        Field::SingleLatency,
        Field::GlobalScanLatency,
        Field::RealMultiLatency,
        Field::RealSingleLatency,
        Field::FalseMultiLatency,
        Field::FalseSingleLatency,
        Field::BloomChecks,
        Field::LeafBloomChecks,
        Field::NonLeafBloomChecks,
        Field::SstChecks,
        Field::SingleBloomChecks,
        Field::SingleLeafBloomChecks,
        Field::SingleNonLeafBloomChecks,
        Field::SingleSstChecks,
        Field::RealBloomChecks,
        Field::RealSstChecks,
        Field::FalseBloomChecks,
        Field::FalseSstChecks,
        Field::TotalQueries,
        Field::RealQueries,
        Field::FalseQueries,
        Field::DiskBytes,
        Field::MemoryBytes,
        Field::RecordCount,
        Field::FanoutRatio,
        Field::ItemsPerPartition,
        Field::LeafNodes,
    ];

    pub fn domain(&self) -> Domain {
        match self {
            Self::DatabaseSize
            | Self::TotalQueries
            | Self::RealQueries
            | Self::FalseQueries
            | Self::DiskBytes
            | Self::MemoryBytes
            | Self::RecordCount
            | Self::LeafNodes => Domain::Count,
            Self::NumColumns | Self::FanoutRatio | Self::ItemsPerPartition => {
                Domain::PositiveCount
            }
            Self::Selectivity => Domain::Percent,
            _ => Domain::Measure,
        }
    }

    /// snake case name, identical to the serde representation
    pub fn name(&self) -> &'static str {
        match self {
            Self::DatabaseSize => "database_size",
            Self::Selectivity => "selectivity",
            Self::NumColumns => "num_columns",
            Self::MultiLatency => "multi_latency",
            Self::SingleLatency => "single_latency",
            Self::GlobalScanLatency => "global_scan_latency",
            Self::RealMultiLatency => "real_multi_latency",
            Self::RealSingleLatency => "real_single_latency",
            Self::FalseMultiLatency => "false_multi_latency",
            Self::FalseSingleLatency => "false_single_latency",
            Self::BloomChecks => "bloom_checks",
            Self::LeafBloomChecks => "leaf_bloom_checks",
            Self::NonLeafBloomChecks => "non_leaf_bloom_checks",
            Self::SstChecks => "sst_checks",
            Self::SingleBloomChecks => "single_bloom_checks",
            Self::SingleLeafBloomChecks => "single_leaf_bloom_checks",
            Self::SingleNonLeafBloomChecks => "single_non_leaf_bloom_checks",
            Self::SingleSstChecks => "single_sst_checks",
            Self::RealBloomChecks => "real_bloom_checks",
            Self::RealSstChecks => "real_sst_checks",
            Self::FalseBloomChecks => "false_bloom_checks",
            Self::FalseSstChecks => "false_sst_checks",
            Self::TotalQueries => "total_queries",
            Self::RealQueries => "real_queries",
            Self::FalseQueries => "false_queries",
            Self::DiskBytes => "disk_bytes",
            Self::MemoryBytes => "memory_bytes",
            Self::RecordCount => "record_count",
            Self::FanoutRatio => "fanout_ratio",
            Self::ItemsPerPartition => "items_per_partition",
            Self::LeafNodes => "leaf_nodes",
        }
    }

    /// header names emitted by the experiment binaries for this field
    fn builtin_aliases(&self) -> &'static [&'static str] {
        match self {
            Self::DatabaseSize => &["dbSize", "numRecords", "numRec"],
            Self::Selectivity => &["realDataPercentage", "percentageExisting"],
            Self::NumColumns => &["numColumns"],
            Self::MultiLatency => &[
                "avgMultiTime",
                "avgHierarchicalMultiTime",
                "hierarchicalMultiTime",
                "hierarchicalMultiColumnTime",
                "hierarchicalMultiTime_avg",
            ],
            Self::SingleLatency => &[
                "avgSingleTime",
                "avgHierarchicalSingleTime",
                "hierarchicalSingleTime",
                "hierarchicalSingleColumnTime",
                "hierarchicalSingleTime_avg",
            ],
            Self::GlobalScanLatency => &["globalScanTime", "globalScanTime_avg"],
            Self::RealMultiLatency => &["avgRealMultiTime", "avgRealDataMultiTime"],
            Self::RealSingleLatency => &["avgRealSingleTime", "avgRealDataSingleTime"],
            Self::FalseMultiLatency => &["avgFalseMultiTime", "avgFalseDataMultiTime"],
            Self::FalseSingleLatency => &["avgFalseSingleTime", "avgFalseDataSingleTime"],
            Self::BloomChecks => &["avgMultiBloomChecks", "multiBloomChecks", "mcBloomAvg"],
            Self::LeafBloomChecks => {
                &["avgMultiLeafBloomChecks", "multiLeafBloomChecks", "mcLeafAvg"]
            }
            Self::NonLeafBloomChecks => &["avgMultiNonLeafBloomChecks", "mcNonLeafAvg"],
            Self::SstChecks => &["avgMultiSSTChecks", "multiSSTChecks", "mcSSTAvg"],
            Self::SingleBloomChecks => &["avgSingleBloomChecks", "singleBloomChecks", "scBloomAvg"],
            Self::SingleLeafBloomChecks => {
                &["avgSingleLeafBloomChecks", "singleLeafBloomChecks", "scLeafAvg"]
            }
            Self::SingleNonLeafBloomChecks => &["avgSingleNonLeafBloomChecks", "scNonLeafAvg"],
            Self::SingleSstChecks => &["avgSingleSSTChecks", "singleSSTChecks", "scSSTAvg"],
            Self::RealBloomChecks => &["avgRealMultiBloomChecks"],
            Self::RealSstChecks => &["avgRealMultiSSTChecks"],
            Self::FalseBloomChecks => &["avgFalseMultiBloomChecks"],
            Self::FalseSstChecks => &["avgFalseMultiSSTChecks"],
            Self::TotalQueries => &["totalQueries"],
            Self::RealQueries => &["realQueries"],
            Self::FalseQueries => &["falseQueries"],
            Self::DiskBytes => &["bloomDiskSize", "diskBloomSize"],
            // the experiment binaries misspell this header
            Self::MemoryBytes => &["blomMemSize", "bloomMemSize", "memoryBloomSize"],
            Self::RecordCount => &["numRecords"],
            Self::FanoutRatio => &["bloomTreeRatio"],
            Self::ItemsPerPartition => &["itemsPerPartition"],
            Self::LeafNodes => &["singleHierarchyLeafs", "leafs"],
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Field {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|field| field.name() == s)
            .copied()
            .ok_or_else(|| UnknownField(s.to_owned()))
    }
}

/// Header name table, field -> accepted header names
///
/// Matching ignores ASCII case and surrounding whitespace. A header may resolve to more than
/// one field, e.g. `numRecords` is both the database size and the record count of the
/// storage experiments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldAliases(BTreeMap<Field, Vec<String>>);

impl Default for FieldAliases {
    fn default() -> Self {
        Self(
            Field::ALL
                .iter()
                .map(|field| {
                    (
                        *field,
                        field
                            .builtin_aliases()
                            .iter()
                            .map(|alias| alias.to_string())
                            .collect(),
                    )
                })
                .collect(),
        )
    }
}

impl FieldAliases {
    /// table without any aliases
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    /// register an additional header name for `field`
    pub fn insert(&mut self, field: Field, alias: impl Into<String>) {
        let alias = alias.into();
        let aliases = self.0.entry(field).or_default();

        if !aliases.iter().any(|known| known.eq_ignore_ascii_case(&alias)) {
            aliases.push(alias);
        }
    }

    /// merge another table into this one, existing aliases are kept
    pub fn extend(&mut self, other: &FieldAliases) {
        for (field, aliases) in other.0.iter() {
            for alias in aliases {
                self.insert(*field, alias.clone());
            }
        }
    }

    pub fn aliases(&self, field: Field) -> &[String] {
        self.0.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// all fields a header name feeds, in field order
    pub fn resolve(&self, header: &str) -> Vec<Field> {
        let header = header.trim();

        self.0
            .iter()
            .filter(|(_, aliases)| {
                aliases
                    .iter()
                    .any(|alias| alias.trim().eq_ignore_ascii_case(header))
            })
            .map(|(field, _)| *field)
            .collect()
    }
}
