use crate::{error::IngestError, schema::Field};
use serde::Serialize;
use std::{collections::BTreeMap, fmt, sync::Arc};

/// Where a row came from, doubles as the row's identity inside a dataset
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RowSource {
    pub path: Arc<str>,
    pub line: u64,
}

impl RowSource {
    pub fn new(path: impl Into<Arc<str>>, line: u64) -> Self {
        Self {
            path: path.into(),
            line,
        }
    }
}

impl fmt::Display for RowSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.path, self.line)
    }
}

/// Coerce a raw cell into a value of `field`
///
/// Anything that is not a finite number inside the field's domain is an error. Callers turn
/// the error into a missing value, never into zero.
pub fn coerce(field: Field, raw: &str) -> Result<f64, IngestError> {
    let value = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| IngestError::Coercion {
            field,
            value: raw.to_owned(),
        })?;
    let domain = field.domain();

    if domain.admits(value) {
        Ok(value)
    } else {
        Err(IngestError::OutOfDomain {
            field,
            value,
            domain,
        })
    }
}

/// One experimental observation
///
/// Only the database size is mandatory, every other field is optional and absent when the
/// source file did not carry it or its value failed coercion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasurementRow {
    pub source: RowSource,
    pub database_size: u64,
    values: BTreeMap<Field, f64>,
}

impl MeasurementRow {
    pub fn new(source: RowSource, database_size: u64) -> Self {
        Self {
            source,
            database_size,
            values: BTreeMap::new(),
        }
    }

    /// attach a value, used while the row is being built
    pub fn with(mut self, field: Field, value: f64) -> Self {
        self.insert(field, value);
        self
    }

    pub(crate) fn insert(&mut self, field: Field, value: f64) {
        match field {
            // the key lives outside of the value map
            Field::DatabaseSize => self.database_size = value as u64,
            field => {
                self.values.insert(field, value);
            }
        }
    }

    pub fn get(&self, field: Field) -> Option<f64> {
        match field {
            Field::DatabaseSize => Some(self.database_size as f64),
            field => self.values.get(&field).copied(),
        }
    }

    /// present fields and their values, the database size first
    pub fn fields(&self) -> impl Iterator<Item = (Field, f64)> + '_ {
        std::iter::once((Field::DatabaseSize, self.database_size as f64))
            .chain(self.values.iter().map(|(field, value)| (*field, *value)))
    }

    fn integral(&self, field: Field) -> Option<u64> {
        // domains guarantee non-negative integral values
        self.get(field).map(|value| value as u64)
    }

    pub fn selectivity(&self) -> Option<u32> {
        self.integral(Field::Selectivity).map(|value| value as u32)
    }

    pub fn num_columns(&self) -> Option<u32> {
        self.integral(Field::NumColumns).map(|value| value as u32)
    }

    pub fn multi_latency(&self) -> Option<f64> {
        self.get(Field::MultiLatency)
    }

    pub fn single_latency(&self) -> Option<f64> {
        self.get(Field::SingleLatency)
    }

    pub fn bloom_checks(&self) -> Option<f64> {
        self.get(Field::BloomChecks)
    }

    pub fn leaf_bloom_checks(&self) -> Option<f64> {
        self.get(Field::LeafBloomChecks)
    }

    pub fn sst_checks(&self) -> Option<f64> {
        self.get(Field::SstChecks)
    }

    pub fn disk_bytes(&self) -> Option<u64> {
        self.integral(Field::DiskBytes)
    }

    pub fn memory_bytes(&self) -> Option<u64> {
        self.integral(Field::MemoryBytes)
    }

    pub fn record_count(&self) -> Option<u64> {
        self.integral(Field::RecordCount)
    }
}
