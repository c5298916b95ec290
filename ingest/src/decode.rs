use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{fmt, num::ParseIntError, path::Path, str::FromStr};
use thiserror::Error;

// NOTE: both patterns are case sensitive, `exp_1_mixed_query` must not yield a bloom size
static BLOOM_SIZE_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)M").unwrap());
static FANOUT_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"R(\d+)").unwrap());

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("no `<digits>M` bloom size token in {0:?}")]
    MissingBloomSize(String),
    #[error("no `R<digits>` fan-out token in {0:?}")]
    MissingFanout(String),
    #[error("token {token:?} in {name:?} is not a valid number: {source}")]
    InvalidNumber {
        name: String,
        token: String,
        source: ParseIntError,
    },
    #[error("path has no file name")]
    NoFileName,
}

/// Identity of one experimental variant, recovered from a result file name.
///
/// Two files whose names carry the same tokens belong to the same configuration, whatever
/// else (timestamps, experiment prefixes) their names contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConfigurationIdentity {
    /// bloom filter size class in millions of bits
    pub bloom_size_label: u32,
    /// maximum number of children per internal tree node
    pub fanout_ratio: u32,
}

impl ConfigurationIdentity {
    pub fn new(bloom_size_label: u32, fanout_ratio: u32) -> Self {
        Self {
            bloom_size_label,
            fanout_ratio,
        }
    }

    /// short label as used in result file names, e.g. `1M-R10`
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ConfigurationIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}M-R{}", self.bloom_size_label, self.fanout_ratio)
    }
}

impl FromStr for ConfigurationIdentity {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode(s)
    }
}

fn first_number(pattern: &Regex, name: &str) -> Option<Result<u32, DecodeError>> {
    pattern.captures(name).and_then(|captures| captures.get(1)).map(|token| {
        token
            .as_str()
            .parse::<u32>()
            .map_err(|source| DecodeError::InvalidNumber {
                name: name.to_owned(),
                token: token.as_str().to_owned(),
                source,
            })
    })
}

/// Decode a configuration from a bare file name.
///
/// The leftmost `<digits>M` token gives the bloom size class and the leftmost `R<digits>`
/// token the fan-out ratio. Token order and surrounding characters are irrelevant.
pub fn decode(file_name: &str) -> Result<ConfigurationIdentity, DecodeError> {
    let bloom_size_label = first_number(&BLOOM_SIZE_TOKEN, file_name)
        .ok_or_else(|| DecodeError::MissingBloomSize(file_name.to_owned()))??;
    let fanout_ratio = first_number(&FANOUT_TOKEN, file_name)
        .ok_or_else(|| DecodeError::MissingFanout(file_name.to_owned()))??;

    Ok(ConfigurationIdentity::new(bloom_size_label, fanout_ratio))
}

/// Decode a configuration from the file name component of `path`, directories are ignored
pub fn decode_path(path: &Path) -> Result<ConfigurationIdentity, DecodeError> {
    let name = path.file_name().ok_or(DecodeError::NoFileName)?;

    decode(&name.to_string_lossy())
}
