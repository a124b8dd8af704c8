//! Full pipeline runs against the in-memory lookup store

use std::path::{Path, PathBuf};

use lookout::{pipeline, BindAction, Config, LookoutError, MockLookupApi};
use lookout_mmdb::{DataValue, DatabaseBuilder};
use tempfile::TempDir;

fn fixture_db(dir: &Path) -> PathBuf {
    let mut builder = DatabaseBuilder::new("threat-indicators").build_epoch(1_756_000_000);
    builder
        .insert(
            "10.0.0.0/24",
            DataValue::Map(vec![("score".to_string(), DataValue::Uint32(1))]),
        )
        .unwrap();
    builder.insert("10.0.1.0/24", DataValue::Map(vec![])).unwrap();
    builder
        .insert(
            "10.0.2.0/24",
            DataValue::Map(vec![
                ("score".to_string(), DataValue::Uint32(2)),
                (
                    "tags".to_string(),
                    DataValue::Array(vec![
                        DataValue::String("a".to_string()),
                        DataValue::String("b".to_string()),
                    ]),
                ),
            ]),
        )
        .unwrap();
    let path = dir.join("source.mmdb");
    std::fs::write(&path, builder.build().unwrap()).unwrap();
    path
}

fn test_config(work_dir: &Path, mmdb_file: PathBuf) -> Config {
    Config {
        feed_base_url: "https://feed.invalid".into(),
        feed_api_key: "unused".into(),
        feed_format_version: "3".into(),
        mmdb_file: Some(mmdb_file),
        auth_url: "https://login.invalid".into(),
        client_id: "id".into(),
        client_secret: "secret".into(),
        api_url: "https://api.invalid".into(),
        organization_id: "org".into(),
        worker_group: "default".into(),
        lookup_filename: "ti_indicators.mmdb".into(),
        create_csv_sample: false,
        csv_max_rows: 100,
        work_dir: work_dir.to_path_buf(),
        quiet: true,
    }
}

#[test]
fn test_run_syncs_binary_and_cleans_up() {
    let dir = TempDir::new().unwrap();
    let source = fixture_db(dir.path());
    let config = test_config(dir.path(), source.clone());
    let api = MockLookupApi::new();

    let summary = pipeline::run(&config, &api).unwrap();
    assert_eq!(summary.entry_count, 3);
    assert_eq!(summary.database.action, BindAction::Created);
    assert!(summary.csv_sample.is_none());

    assert_eq!(api.calls(), ["upload", "exists", "create", "commit", "deploy"]);
    let uploads = api.uploads();
    assert_eq!(uploads[0].filename, "ti_indicators.mmdb");
    assert_eq!(uploads[0].content_type, "application/gzip");

    // Working copy removed, operator's source untouched
    assert!(!dir.path().join("ti_indicators.mmdb").exists());
    assert!(source.exists());
}

#[test]
fn test_second_run_takes_update_path() {
    let dir = TempDir::new().unwrap();
    let source = fixture_db(dir.path());
    let config = test_config(dir.path(), source);
    let api = MockLookupApi::new();

    let first = pipeline::run(&config, &api).unwrap();
    let second = pipeline::run(&config, &api).unwrap();
    assert_eq!(first.database.action, BindAction::Created);
    assert_eq!(second.database.action, BindAction::Updated);
    assert_eq!(api.calls().iter().filter(|c| *c == "create").count(), 1);
    // Each run commits and deploys its own version
    assert_eq!(api.deploys().len(), 2);
}

#[test]
fn test_run_with_csv_sample() {
    let dir = TempDir::new().unwrap();
    let source = fixture_db(dir.path());
    let mut config = test_config(dir.path(), source);
    config.create_csv_sample = true;
    let api = MockLookupApi::new();

    let summary = pipeline::run(&config, &api).unwrap();
    let (stats, outcome) = summary.csv_sample.expect("CSV sample outcome");
    assert_eq!(stats.rows_written, 2);
    assert_eq!(outcome.artifact, "ti_indicators-SAMPLE.csv");

    let uploads = api.uploads();
    assert_eq!(uploads.len(), 2);
    assert_eq!(uploads[1].filename, "ti_indicators-SAMPLE.csv");
    assert_eq!(uploads[1].content_type, "text/csv");
    let body = String::from_utf8(uploads[1].body.clone()).unwrap();
    assert!(body.starts_with("network,network_start,network_end,score,tags"));
    assert!(body.contains("LIST_2_ITEMS"));

    // Both working files removed
    assert!(!dir.path().join("ti_indicators.mmdb").exists());
    assert!(!dir.path().join("ti_indicators-SAMPLE.csv").exists());
}

#[test]
fn test_csv_row_cap_flows_through() {
    let dir = TempDir::new().unwrap();
    let source = fixture_db(dir.path());
    let mut config = test_config(dir.path(), source);
    config.create_csv_sample = true;
    config.csv_max_rows = 1;
    let api = MockLookupApi::new();

    let summary = pipeline::run(&config, &api).unwrap();
    let (stats, _) = summary.csv_sample.unwrap();
    assert_eq!(stats.rows_written, 1);
}

#[test]
fn test_invalid_database_fails_validation_and_cleans_up() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("garbage.mmdb");
    std::fs::write(&source, b"not a database").unwrap();
    let config = test_config(dir.path(), source);
    let api = MockLookupApi::new();

    let err = pipeline::run(&config, &api).unwrap_err();
    assert!(matches!(err, LookoutError::Validation(_)));
    // Nothing was sent to the store
    assert!(api.calls().is_empty());
    // The failed run still removed its working copy
    assert!(!dir.path().join("ti_indicators.mmdb").exists());
}

#[test]
fn test_sync_failure_aborts_run_and_cleans_up() {
    let dir = TempDir::new().unwrap();
    let source = fixture_db(dir.path());
    let config = test_config(dir.path(), source);
    let api = MockLookupApi::new().failing_at("deploy");

    let err = pipeline::run(&config, &api).unwrap_err();
    assert!(matches!(err, LookoutError::Sync { .. }));
    assert!(!dir.path().join("ti_indicators.mmdb").exists());
}

#[test]
fn test_missing_source_is_acquisition_failure() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), dir.path().join("absent.mmdb"));
    let api = MockLookupApi::new();

    let err = pipeline::run(&config, &api).unwrap_err();
    assert!(matches!(err, LookoutError::Acquisition(_)));
}
