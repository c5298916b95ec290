//! Batch runner: finds result files, loads them and writes the analysis report

pub mod collector;
pub mod config;
pub mod pipeline;
pub mod report;

#[cfg(test)]
mod config_test;
