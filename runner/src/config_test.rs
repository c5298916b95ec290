use crate::config::{ConfigErrors, PipelineConfig, DEFAULT_FOCUS_RECORDS};
use bloomstat_analysis::{Aggregation, DEFAULT_LEAF_CAPACITY};
use bloomstat_ingest::Field;
use tempfile::TempDir;

#[test]
pub fn empty_config_uses_defaults() {
    let config = PipelineConfig::parse("{}").unwrap();

    assert!(config.collector.paths.is_empty());
    assert_eq!(config.collector.glob, "*.csv");
    assert!(!config.collector.hidden);
    assert_eq!(config.ingest.threads, None);
    assert_eq!(config.analysis.leaf_capacity, DEFAULT_LEAF_CAPACITY);
    assert_eq!(config.analysis.focus_records, DEFAULT_FOCUS_RECORDS);
    assert_eq!(config.analysis.aggregation, Aggregation::Mean);
    assert_eq!(config.output.path, None);
}

#[test]
pub fn full_config() {
    let config = PipelineConfig::parse(
        r#"
collector:
  paths: [results, more_results]
  glob: "exp_*.csv"
  hidden: true
ingest:
  threads: 4
  expected: [multi_latency, bloom_checks]
  aliases:
    multi_latency: [avgMultiQueryTime]
analysis:
  leaf_capacity: 1000
  focus_records: 2500000
  aggregation: first
output:
  path: report.yaml
"#,
    )
    .unwrap();

    assert_eq!(config.collector.paths.len(), 2);
    assert_eq!(config.ingest.threads, Some(4));
    assert_eq!(
        config.ingest.expected,
        vec![Field::MultiLatency, Field::BloomChecks]
    );
    assert_eq!(config.analysis.tree_model().leaf_capacity, 1000);
    assert_eq!(config.analysis.aggregation, Aggregation::First);

    // configured aliases come on top of the built-in ones
    let aliases = config.aliases();
    assert_eq!(aliases.resolve("avgMultiQueryTime"), vec![Field::MultiLatency]);
    assert_eq!(aliases.resolve("avgMultiTime"), vec![Field::MultiLatency]);
}

#[test]
pub fn unknown_keys_are_rejected() {
    assert!(matches!(
        PipelineConfig::parse("collector:\n  path: results\n"),
        Err(ConfigErrors::InvalidYaml(_))
    ));
    assert!(matches!(
        PipelineConfig::parse("analysis:\n  aggregation: median\n"),
        Err(ConfigErrors::InvalidYaml(_))
    ));
    assert!(matches!(
        PipelineConfig::parse("ingest:\n  expected: [latency]\n"),
        Err(ConfigErrors::InvalidYaml(_))
    ));
}

#[test]
pub fn missing_config_file() {
    let dir = TempDir::new().unwrap();

    assert!(matches!(
        PipelineConfig::load(&dir.path().join("missing.yaml")),
        Err(ConfigErrors::Unreadable { .. })
    ));
}

#[test]
pub fn preflight_accepts_valid_config() {
    let dir = TempDir::new().unwrap();
    let mut config = PipelineConfig::default();
    config.collector.paths = vec![dir.path().to_path_buf(), dir.path().to_path_buf()];
    config.output.path = Some(dir.path().join("report.yaml"));

    assert!(!config.preflight_checks());
    // duplicates are folded
    assert_eq!(config.collector.paths.len(), 1);
}

#[test]
pub fn preflight_reports_every_problem() {
    let dir = TempDir::new().unwrap();
    let mut config = PipelineConfig::default();
    config.collector.paths = vec![dir.path().join("missing")];
    config.collector.glob = "[".to_owned();
    config.ingest.threads = Some(0);
    config.analysis.leaf_capacity = 0;
    config.output.path = Some(dir.path().join("missing").join("report.yaml"));

    assert!(config.preflight_checks());
    assert!(config.compile_glob().is_err());
}

#[test]
pub fn preflight_requires_paths() {
    assert!(PipelineConfig::default().preflight_checks());
}

#[test]
pub fn preflight_rejects_empty_aliases() {
    let dir = TempDir::new().unwrap();
    let mut config = PipelineConfig::parse("ingest:\n  aliases:\n    sst_checks: ['  ']\n").unwrap();
    config.collector.paths = vec![dir.path().to_path_buf()];

    assert!(config.preflight_checks());
}
