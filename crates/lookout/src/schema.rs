//! Column inference over a bounded record sample
//!
//! Full-schema inference over tens of millions of records is prohibitively
//! expensive, so the exporter samples the first N records that carry data
//! and unions their keys. This is accepted lossy behavior: keys that first
//! appear after the sample never become columns and are silently dropped
//! from later rows.

use lookout_mmdb::{DataValue, IpNetwork, MmdbError};

/// Fixed leading columns of every export, before the inferred ones.
pub const BASE_COLUMNS: [&str; 3] = ["network", "network_start", "network_end"];

/// Infer the data columns from the first `sample_size` records with
/// non-empty data.
///
/// Keys are unioned across the sample and sorted lexicographically so the
/// result is deterministic for a given database. Records with scalar
/// values count toward the sample but contribute no keys. A database with
/// fewer qualifying records than `sample_size` is not an error; the keys
/// seen so far are used.
pub fn infer_schema<I>(entries: I, sample_size: usize) -> Result<Vec<String>, MmdbError>
where
    I: IntoIterator<Item = Result<(IpNetwork, DataValue), MmdbError>>,
{
    let mut keys: Vec<String> = Vec::new();
    let mut sampled = 0usize;
    for entry in entries {
        if sampled >= sample_size {
            break;
        }
        let (_, value) = entry?;
        if value.is_empty_data() {
            continue;
        }
        if let Some(map_entries) = value.as_map() {
            for (key, _) in map_entries {
                if !keys.contains(key) {
                    keys.push(key.clone());
                }
            }
        }
        sampled += 1;
    }
    keys.sort_unstable();
    Ok(keys)
}
