//! Memory-mapped MMDB reader with lazy trie traversal
//!
//! A [`Reader`] validates the file on open and exposes the parsed
//! [`Metadata`]. Entry traversal is a one-shot, forward-only pass:
//! [`Reader::into_entries`] consumes the reader, so counting and exporting
//! the same file require two independent `open` calls.

use std::fs::File;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::Path;

use memmap2::Mmap;

use crate::error::MmdbError;
use crate::net::IpNetwork;
use crate::value::{DataDecoder, DataValue};

/// MMDB metadata marker: "\xAB\xCD\xEFMaxMind.com"
pub const METADATA_MARKER: &[u8] = b"\xAB\xCD\xEFMaxMind.com";

/// The metadata section lives within the final 128 KiB of the file.
const METADATA_WINDOW: usize = 128 * 1024;

/// Gap between the search tree and the data section.
const DATA_SECTION_SEPARATOR: usize = 16;

/// Parsed database metadata, read once per open.
#[derive(Debug, Clone)]
pub struct Metadata {
    /// Major version of the binary format (2 for current databases)
    pub binary_format_major_version: u16,
    /// Minor version of the binary format
    pub binary_format_minor_version: u16,
    /// Unix timestamp of the database build
    pub build_epoch: u64,
    /// Declared record-value type, e.g. "GeoIP2-Country"
    pub database_type: String,
    /// IP version the search tree is keyed by (4 or 6)
    pub ip_version: u16,
    /// Number of nodes in the search tree
    pub node_count: u32,
    /// Width of one tree record in bits (24, 28, or 32)
    pub record_size: u16,
}

/// An open MMDB file.
#[derive(Debug)]
pub struct Reader {
    mmap: Mmap,
    metadata: Metadata,
    /// Byte length of the search tree
    tree_size: usize,
    /// Offset of the data section (tree + separator)
    data_start: usize,
    /// Offset of the metadata marker, which ends the data section
    data_end: usize,
}

impl Reader {
    /// Open and validate a database file.
    ///
    /// Fails with [`MmdbError::Io`] when the file cannot be read and with
    /// a format error when it does not conform to MMDB layout. Callers
    /// should treat any error here as "validation failed" and skip
    /// downstream work on the file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MmdbError> {
        let file = File::open(path.as_ref())?;
        // Safety: the mapping is read-only and the relay owns its working
        // files for the duration of a run.
        let mmap = unsafe { Mmap::map(&file)? };

        let marker_at = find_metadata_marker(&mmap).ok_or(MmdbError::MetadataNotFound)?;
        let metadata_section = &mmap[marker_at + METADATA_MARKER.len()..];
        let metadata = parse_metadata(metadata_section)?;

        if !matches!(metadata.record_size, 24 | 28 | 32) {
            return Err(MmdbError::InvalidFormat(format!(
                "record size {} bits",
                metadata.record_size
            )));
        }
        if metadata.binary_format_major_version != 2 {
            return Err(MmdbError::InvalidFormat(format!(
                "binary format version {}.{}",
                metadata.binary_format_major_version, metadata.binary_format_minor_version
            )));
        }
        if !matches!(metadata.ip_version, 4 | 6) {
            return Err(MmdbError::InvalidFormat(format!(
                "IP version {}",
                metadata.ip_version
            )));
        }

        let node_bytes = metadata.record_size as usize / 4;
        let tree_size = metadata.node_count as usize * node_bytes;
        let data_start = tree_size + DATA_SECTION_SEPARATOR;
        if data_start > marker_at {
            return Err(MmdbError::InvalidFormat(format!(
                "search tree ({} nodes) overruns the file",
                metadata.node_count
            )));
        }

        Ok(Self {
            mmap,
            metadata,
            tree_size,
            data_start,
            data_end: marker_at,
        })
    }

    /// Parsed metadata for this database.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Consume the reader and traverse the search tree.
    ///
    /// The returned iterator yields every network that carries a data
    /// record, in trie order (ascending addresses), decoding records
    /// lazily. It is finite and single-pass; reopen the file for another
    /// traversal.
    pub fn into_entries(self) -> Entries {
        let mut stack = Vec::with_capacity(self.address_bits() as usize + 1);
        if self.metadata.node_count > 0 {
            // Pseudo-edge into the root node
            stack.push((0u32, 0u128, 0u8));
        }
        Entries { reader: self, stack }
    }

    fn address_bits(&self) -> u32 {
        if self.metadata.ip_version == 4 {
            32
        } else {
            128
        }
    }

    fn data_section(&self) -> &[u8] {
        &self.mmap[self.data_start..self.data_end]
    }

    /// Read one side of a tree node. `side` is 0 for the left (zero bit)
    /// record and 1 for the right.
    fn read_record(&self, node: u32, side: usize) -> Result<u32, MmdbError> {
        let node = node as usize;
        let tree = &self.mmap[..self.tree_size];
        let get = |range: std::ops::Range<usize>| {
            tree.get(range)
                .ok_or_else(|| MmdbError::InvalidFormat(format!("node {} out of range", node)))
        };
        match self.metadata.record_size {
            24 => {
                let base = node * 6 + side * 3;
                let b = get(base..base + 3)?;
                Ok(u32::from(b[0]) << 16 | u32::from(b[1]) << 8 | u32::from(b[2]))
            }
            28 => {
                let base = node * 7;
                let b = get(base..base + 7)?;
                if side == 0 {
                    Ok(u32::from(b[3] >> 4) << 24
                        | u32::from(b[0]) << 16
                        | u32::from(b[1]) << 8
                        | u32::from(b[2]))
                } else {
                    Ok(u32::from(b[3] & 0x0f) << 24
                        | u32::from(b[4]) << 16
                        | u32::from(b[5]) << 8
                        | u32::from(b[6]))
                }
            }
            _ => {
                let base = node * 8 + side * 4;
                let b = get(base..base + 4)?;
                Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
            }
        }
    }
}

/// One-shot depth-first traversal of a database's search tree.
///
/// Yields `Result` items: a decode failure mid-file surfaces as an error
/// entry rather than a panic, and traversal continues with the next
/// subtree.
pub struct Entries {
    reader: Reader,
    /// Pending edges: (record value, prefix bits, prefix length)
    stack: Vec<(u32, u128, u8)>,
}

impl Iterator for Entries {
    type Item = Result<(IpNetwork, DataValue), MmdbError>;

    fn next(&mut self) -> Option<Self::Item> {
        let node_count = self.reader.metadata.node_count;
        let max_bits = self.reader.address_bits();
        while let Some((record, prefix, prefix_len)) = self.stack.pop() {
            if record == node_count {
                // Empty subtree
                continue;
            }
            if record < node_count {
                if u32::from(prefix_len) >= max_bits {
                    return Some(Err(MmdbError::InvalidFormat(
                        "search tree deeper than the address width".to_string(),
                    )));
                }
                let left = match self.reader.read_record(record, 0) {
                    Ok(r) => r,
                    Err(e) => return Some(Err(e)),
                };
                let right = match self.reader.read_record(record, 1) {
                    Ok(r) => r,
                    Err(e) => return Some(Err(e)),
                };
                let bit = 1u128 << (max_bits - 1 - u32::from(prefix_len));
                // Right pushed first so the left subtree pops first
                self.stack.push((right, prefix | bit, prefix_len + 1));
                self.stack.push((left, prefix, prefix_len + 1));
                continue;
            }

            // Data record: offset is relative to the data section, past
            // the 16-byte separator.
            let offset = (record - node_count) as usize;
            if offset < DATA_SECTION_SEPARATOR {
                return Some(Err(MmdbError::InvalidFormat(format!(
                    "data record {} points into the section separator",
                    record
                ))));
            }
            let network = match self.network(prefix, prefix_len) {
                Ok(n) => n,
                Err(e) => return Some(Err(e)),
            };
            let decoder = DataDecoder::new(self.reader.data_section());
            return Some(
                decoder
                    .decode(offset - DATA_SECTION_SEPARATOR)
                    .map(|value| (network, value)),
            );
        }
        None
    }
}

impl Entries {
    fn network(&self, prefix: u128, prefix_len: u8) -> Result<IpNetwork, MmdbError> {
        let addr = if self.reader.metadata.ip_version == 4 {
            IpAddr::V4(Ipv4Addr::from(prefix as u32))
        } else {
            IpAddr::V6(Ipv6Addr::from(prefix))
        };
        IpNetwork::new(addr, prefix_len)
    }
}

/// Locate the last metadata marker within the trailing search window.
fn find_metadata_marker(buf: &[u8]) -> Option<usize> {
    let window_start = buf.len().saturating_sub(METADATA_WINDOW);
    let window = &buf[window_start..];
    if window.len() < METADATA_MARKER.len() {
        return None;
    }
    (0..=window.len() - METADATA_MARKER.len())
        .rev()
        .find(|&i| &window[i..i + METADATA_MARKER.len()] == METADATA_MARKER)
        .map(|i| window_start + i)
}

fn parse_metadata(section: &[u8]) -> Result<Metadata, MmdbError> {
    let decoder = DataDecoder::new(section);
    let root = decoder
        .decode(0)
        .map_err(|e| MmdbError::InvalidMetadata(e.to_string()))?;
    let entries = root
        .as_map()
        .ok_or_else(|| MmdbError::InvalidMetadata("metadata is not a map".to_string()))?;

    let lookup = |key: &str| {
        entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
            .ok_or_else(|| MmdbError::InvalidMetadata(format!("missing field '{}'", key)))
    };
    let uint = |key: &str| -> Result<u64, MmdbError> {
        match lookup(key)? {
            DataValue::Uint16(n) => Ok(u64::from(*n)),
            DataValue::Uint32(n) => Ok(u64::from(*n)),
            DataValue::Uint64(n) => Ok(*n),
            other => Err(MmdbError::InvalidMetadata(format!(
                "field '{}' is not an unsigned integer: {:?}",
                key, other
            ))),
        }
    };
    let string = |key: &str| -> Result<String, MmdbError> {
        match lookup(key)? {
            DataValue::String(s) => Ok(s.clone()),
            other => Err(MmdbError::InvalidMetadata(format!(
                "field '{}' is not a string: {:?}",
                key, other
            ))),
        }
    };

    Ok(Metadata {
        binary_format_major_version: uint("binary_format_major_version")? as u16,
        binary_format_minor_version: uint("binary_format_minor_version")? as u16,
        build_epoch: uint("build_epoch")?,
        database_type: string("database_type")?,
        ip_version: uint("ip_version")? as u16,
        node_count: uint("node_count")? as u32,
        record_size: uint("record_size")? as u16,
    })
}
