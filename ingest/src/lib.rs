//! Loading of hierarchical bloom filter benchmark results
//!
//! Result files carry their configuration in their name (`exp_1_mixed_query_summary_1M-R10.csv`)
//! and differ in delimiter and header naming. This crate decodes the configuration, maps the
//! headers onto canonical fields and groups the normalized rows per configuration.

pub mod dataset;
pub mod decode;
pub mod error;
pub mod loader;
pub mod row;
pub mod schema;


pub use dataset::AggregatedDataset;
pub use decode::{decode, decode_path, ConfigurationIdentity, DecodeError};
pub use error::{FileWarning, IngestError, WarningKind};
pub use loader::{FileLoad, FileSummary, LoadReport, Loader};
pub use row::{MeasurementRow, RowSource};
pub use schema::{Domain, Field, FieldAliases};
