use crate::{
    decode::DecodeError,
    schema::{Domain, Field},
};
use serde::Serialize;
use std::{fmt, path::PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("file name could not be decoded: {0}")]
    Decode(#[from] DecodeError),
    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse delimited text: {0}")]
    Csv(#[from] csv::Error),
    #[error("expected field `{0}` is not present in the header")]
    Schema(Field),
    #[error("required key field `{0}` is missing or not numeric, row dropped")]
    MissingKeyField(Field),
    #[error("value {value:?} of `{field}` is not numeric")]
    Coercion { field: Field, value: String },
    #[error("value {value} of `{field}` is not a {domain}")]
    OutOfDomain {
        field: Field,
        value: f64,
        domain: Domain,
    },
    #[error("embedded header row dropped")]
    EmbeddedHeader,
}

impl IngestError {
    /// coarse category of the error, matches the taxonomy used in reports
    pub fn kind(&self) -> WarningKind {
        match self {
            Self::Decode(_) => WarningKind::Decode,
            Self::Io(_) | Self::Csv(_) => WarningKind::Read,
            Self::Schema(_) | Self::MissingKeyField(_) => WarningKind::Schema,
            Self::Coercion { .. } | Self::OutOfDomain { .. } => WarningKind::Coercion,
            Self::EmbeddedHeader => WarningKind::EmbeddedHeader,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    Decode,
    Read,
    Schema,
    Coercion,
    EmbeddedHeader,
}

/// A non-fatal problem found while loading a single file
#[derive(Debug)]
pub struct FileWarning {
    pub path: PathBuf,
    /// line of the offending record, `None` for file level problems
    pub line: Option<u64>,
    pub error: IngestError,
}

impl FileWarning {
    pub fn file(path: impl Into<PathBuf>, error: impl Into<IngestError>) -> Self {
        Self {
            path: path.into(),
            line: None,
            error: error.into(),
        }
    }

    pub fn record(path: impl Into<PathBuf>, line: u64, error: IngestError) -> Self {
        Self {
            path: path.into(),
            line: Some(line),
            error,
        }
    }

    pub fn kind(&self) -> WarningKind {
        self.error.kind()
    }
}

impl fmt::Display for FileWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{line}: {}", self.path.display(), self.error),
            None => write!(f, "{}: {}", self.path.display(), self.error),
        }
    }
}
