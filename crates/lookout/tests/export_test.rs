//! End-to-end transcoding scenarios over built database fixtures

use std::path::PathBuf;

use lookout::export::export_csv;
use lookout::schema::infer_schema;
use lookout_mmdb::{DataValue, DatabaseBuilder, Reader};
use tempfile::TempDir;

/// Three-entry fixture: a plain record, an empty record, and a record
/// with a list field.
fn three_entry_db(dir: &TempDir) -> PathBuf {
    let mut builder = DatabaseBuilder::new("threat-indicators");
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
    let path = dir.path().join("threats.mmdb");
    std::fs::write(&path, builder.build().unwrap()).unwrap();
    path
}

fn entries(path: &PathBuf) -> lookout_mmdb::Entries {
    Reader::open(path).unwrap().into_entries()
}

#[test]
fn test_schema_inference_on_fixture() {
    let dir = TempDir::new().unwrap();
    let db = three_entry_db(&dir);

    let schema = infer_schema(entries(&db), 3).unwrap();
    assert_eq!(schema, ["score", "tags"]);
}

#[test]
fn test_schema_inference_is_deterministic_across_opens() {
    let dir = TempDir::new().unwrap();
    let db = three_entry_db(&dir);

    let first = infer_schema(entries(&db), 3).unwrap();
    let second = infer_schema(entries(&db), 3).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_export_skips_empty_records() {
    let dir = TempDir::new().unwrap();
    let db = three_entry_db(&dir);
    let out = dir.path().join("threats.csv");

    let schema = infer_schema(entries(&db), 3).unwrap();
    let stats = export_csv(entries(&db), &schema, &out, None).unwrap();
    assert_eq!(stats.rows_written, 2);

    let content = std::fs::read_to_string(&out).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(
        lines,
        [
            "network,network_start,network_end,score,tags",
            "10.0.0.0/24,10.0.0.0,10.0.0.255,1,NULL",
            "10.0.2.0/24,10.0.2.0,10.0.2.255,2,LIST_2_ITEMS",
        ]
    );
    assert_eq!(stats.bytes_written, content.len() as u64);
}

#[test]
fn test_reexport_is_byte_identical() {
    let dir = TempDir::new().unwrap();
    let db = three_entry_db(&dir);
    let schema = infer_schema(entries(&db), 3).unwrap();

    let out_a = dir.path().join("a.csv");
    let out_b = dir.path().join("b.csv");
    export_csv(entries(&db), &schema, &out_a, None).unwrap();
    export_csv(entries(&db), &schema, &out_b, None).unwrap();

    assert_eq!(
        std::fs::read(&out_a).unwrap(),
        std::fs::read(&out_b).unwrap()
    );
}

#[test]
fn test_row_cap_enforced() {
    let dir = TempDir::new().unwrap();
    let db = three_entry_db(&dir);
    let schema = infer_schema(entries(&db), 3).unwrap();

    for (cap, expected_rows) in [(1u64, 1u64), (2, 2), (100, 2)] {
        let out = dir.path().join(format!("cap{}.csv", cap));
        let stats = export_csv(entries(&db), &schema, &out, Some(cap)).unwrap();
        assert_eq!(stats.rows_written, expected_rows, "cap {}", cap);

        let content = std::fs::read_to_string(&out).unwrap();
        assert_eq!(content.lines().count() as u64, expected_rows + 1);
    }
}

#[test]
fn test_scalar_record_populates_base_columns_only() {
    let dir = TempDir::new().unwrap();
    let mut builder = DatabaseBuilder::new("t");
    builder
        .insert(
            "10.0.0.0/24",
            DataValue::Map(vec![("score".to_string(), DataValue::Uint32(9))]),
        )
        .unwrap();
    builder
        .insert("10.0.1.0/24", DataValue::String("blocked".to_string()))
        .unwrap();
    let db = dir.path().join("mixed.mmdb");
    std::fs::write(&db, builder.build().unwrap()).unwrap();
    let out = dir.path().join("mixed.csv");

    let schema = infer_schema(entries(&db), 10).unwrap();
    assert_eq!(schema, ["score"]);
    export_csv(entries(&db), &schema, &out, None).unwrap();

    let content = std::fs::read_to_string(&out).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[1], "10.0.0.0/24,10.0.0.0,10.0.0.255,9");
    assert_eq!(lines[2], "10.0.1.0/24,10.0.1.0,10.0.1.255,NULL");
}

#[test]
fn test_count_matches_fixture() {
    let dir = TempDir::new().unwrap();
    let db = three_entry_db(&dir);
    // All three records are in the tree, including the empty one
    assert_eq!(entries(&db).count(), 3);
}
