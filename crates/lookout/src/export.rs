//! Streaming MMDB-to-CSV transcoding
//!
//! One forward pass over the entries, one row per record with non-empty
//! data, no buffering of the full result. Nested structures are rendered
//! with lossy-but-legible markers (`LIST_2_ITEMS`, `DICT_4_KEYS_a_b_c`)
//! rather than serialized in full; scalar fields are cleaned for CSV
//! safety and length-capped.

use std::path::Path;

use lookout_mmdb::{DataValue, IpNetwork, MmdbError};

use crate::error::{LookoutError, Result};
use crate::schema::BASE_COLUMNS;

/// Literal written for absent, null, or empty-string fields. Distinct from
/// an empty CSV cell so downstream queries can tell "missing" from "blank".
const NULL_FIELD: &str = "NULL";

/// Length cap for a single list item's rendered value.
const LIST_ITEM_CAP: usize = 50;

/// Length cap for a rendered scalar field.
const SCALAR_CAP: usize = 200;

/// Outcome of one export pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportStats {
    /// Data rows written (excludes the header row)
    pub rows_written: u64,
    /// Size of the finished file in bytes
    pub bytes_written: u64,
}

/// Export entries as CSV honoring the inferred schema.
///
/// Writes a header row (base columns plus `schema`), then one row per
/// record with non-empty data. `max_rows` is a sampling control: hitting
/// the cap ends the pass early without error. Records whose value is not
/// a map populate only the base columns.
pub fn export_csv<I>(
    entries: I,
    schema: &[String],
    out_path: &Path,
    max_rows: Option<u64>,
) -> Result<ExportStats>
where
    I: IntoIterator<Item = std::result::Result<(IpNetwork, DataValue), MmdbError>>,
{
    let io_err = |e: &dyn std::fmt::Display| {
        LookoutError::Validation(format!("CSV export to {} failed: {}", out_path.display(), e))
    };

    let mut writer = csv::Writer::from_path(out_path).map_err(|e| io_err(&e))?;
    let header = BASE_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .chain(schema.iter().cloned());
    writer.write_record(header).map_err(|e| io_err(&e))?;

    let mut rows_written = 0u64;
    for entry in entries {
        if let Some(cap) = max_rows {
            if rows_written >= cap {
                break;
            }
        }
        let (network, value) = entry.map_err(LookoutError::from)?;
        if value.is_empty_data() {
            continue;
        }

        let mut row = Vec::with_capacity(BASE_COLUMNS.len() + schema.len());
        row.push(network.to_string());
        row.push(network.network_address().to_string());
        row.push(network.broadcast_address().to_string());
        for column in schema {
            row.push(encode_field(value.get(column)));
        }
        writer.write_record(&row).map_err(|e| io_err(&e))?;
        rows_written += 1;
    }

    writer.flush().map_err(|e| io_err(&e))?;
    drop(writer);
    let bytes_written = std::fs::metadata(out_path).map_err(|e| io_err(&e))?.len();
    Ok(ExportStats {
        rows_written,
        bytes_written,
    })
}

/// Render one field per the encoding rules, in priority order.
pub fn encode_field(value: Option<&DataValue>) -> String {
    match value {
        None => NULL_FIELD.to_string(),
        Some(DataValue::Array(items)) => match items.len() {
            0 => "EMPTY_LIST".to_string(),
            1 => format!(
                "LIST_1_ITEM_{}",
                truncate_chars(&clean_item(&items[0].scalar_string()), LIST_ITEM_CAP)
            ),
            n => format!("LIST_{}_ITEMS", n),
        },
        Some(DataValue::Map(entries)) => {
            if entries.is_empty() {
                "EMPTY_DICT".to_string()
            } else {
                let preview: Vec<String> = entries
                    .iter()
                    .take(3)
                    .map(|(k, _)| truncate_chars(&k.replace(',', ""), 10))
                    .collect();
                format!("DICT_{}_KEYS_{}", entries.len(), preview.join("_"))
            }
        }
        Some(DataValue::String(s)) if s.is_empty() => NULL_FIELD.to_string(),
        Some(DataValue::Bool(b)) => b.to_string(),
        Some(scalar) => {
            let cleaned = clean_item(&scalar.scalar_string()).replace('\r', "");
            truncate_chars(&cleaned, SCALAR_CAP)
        }
    }
}

/// Replace CSV-hostile characters: commas become semicolons, double
/// quotes become single quotes, newlines become spaces.
fn clean_item(s: &str) -> String {
    s.replace(',', ";").replace('"', "'").replace('\n', " ")
}

fn truncate_chars(s: &str, cap: usize) -> String {
    s.chars().take(cap).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arr(items: &[&str]) -> DataValue {
        DataValue::Array(
            items
                .iter()
                .map(|s| DataValue::String(s.to_string()))
                .collect(),
        )
    }

    fn map(keys: &[&str]) -> DataValue {
        DataValue::Map(
            keys.iter()
                .map(|k| (k.to_string(), DataValue::Uint32(1)))
                .collect(),
        )
    }

    #[test]
    fn test_absent_is_null() {
        assert_eq!(encode_field(None), "NULL");
    }

    #[test]
    fn test_list_encodings() {
        assert_eq!(encode_field(Some(&arr(&[]))), "EMPTY_LIST");
        assert_eq!(encode_field(Some(&arr(&["x"]))), "LIST_1_ITEM_x");
        assert_eq!(encode_field(Some(&arr(&["a", "b", "c"]))), "LIST_3_ITEMS");
    }

    #[test]
    fn test_single_item_is_cleaned_and_capped() {
        let item = arr(&["a,b\"c\nd"]);
        assert_eq!(encode_field(Some(&item)), "LIST_1_ITEM_a;b'c d");

        let long = "y".repeat(80);
        let item = arr(&[long.as_str()]);
        let encoded = encode_field(Some(&item));
        assert_eq!(encoded, format!("LIST_1_ITEM_{}", "y".repeat(50)));
    }

    #[test]
    fn test_dict_encodings() {
        assert_eq!(encode_field(Some(&map(&[]))), "EMPTY_DICT");
        assert_eq!(
            encode_field(Some(&map(&["a", "b", "c", "d"]))),
            "DICT_4_KEYS_a_b_c"
        );
    }

    #[test]
    fn test_dict_key_preview_capped_and_comma_stripped() {
        let value = map(&["extraordinarily_long_key", "w,ith,commas"]);
        assert_eq!(
            encode_field(Some(&value)),
            "DICT_2_KEYS_extraordin_withcommas"
        );
    }

    #[test]
    fn test_empty_string_is_null() {
        assert_eq!(encode_field(Some(&DataValue::String(String::new()))), "NULL");
    }

    #[test]
    fn test_bool_literals() {
        assert_eq!(encode_field(Some(&DataValue::Bool(true))), "true");
        assert_eq!(encode_field(Some(&DataValue::Bool(false))), "false");
    }

    #[test]
    fn test_scalar_cleaning_and_cap() {
        let value = DataValue::String("a,b\"c\r\nd".to_string());
        assert_eq!(encode_field(Some(&value)), "a;b'c d");

        let value = DataValue::String("z".repeat(300));
        assert_eq!(encode_field(Some(&value)), "z".repeat(200));
    }

    #[test]
    fn test_numeric_scalars() {
        assert_eq!(encode_field(Some(&DataValue::Uint32(7))), "7");
        assert_eq!(encode_field(Some(&DataValue::Double(0.5))), "0.5");
        assert_eq!(encode_field(Some(&DataValue::Int32(-4))), "-4");
    }
}
