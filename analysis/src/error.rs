use crate::tree::ModelError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("no rows for {0}")]
    EmptyResult(String),
    #[error("{0} configurations share the cells of a pivot without a configuration axis")]
    MixedConfigurations(usize),
    #[error("invalid tree model: {0}")]
    Model(#[from] ModelError),
}
