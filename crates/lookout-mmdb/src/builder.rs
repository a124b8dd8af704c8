//! In-memory database builder
//!
//! Builds IPv4 search trees and serializes them into the MMDB layout the
//! reader consumes: tree, 16-byte separator, data section, metadata
//! marker, metadata map. Records are written without deduplication, which
//! keeps the output deterministic for a given insertion set.

use std::net::IpAddr;

use crate::error::MmdbError;
use crate::net::IpNetwork;
use crate::reader::METADATA_MARKER;
use crate::value::DataValue;

const DATA_SECTION_SEPARATOR: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq)]
enum NodeRef {
    Empty,
    Node(usize),
    Data(usize),
}

/// Builder for IPv4 MMDB databases.
pub struct DatabaseBuilder {
    nodes: Vec<[NodeRef; 2]>,
    records: Vec<DataValue>,
    database_type: String,
    build_epoch: u64,
    record_size: u16,
}

impl DatabaseBuilder {
    /// Create a builder with the given declared database type.
    pub fn new(database_type: &str) -> Self {
        Self {
            nodes: vec![[NodeRef::Empty, NodeRef::Empty]],
            records: Vec::new(),
            database_type: database_type.to_string(),
            build_epoch: 0,
            record_size: 24,
        }
    }

    /// Set the build timestamp written into the metadata.
    pub fn build_epoch(mut self, epoch: u64) -> Self {
        self.build_epoch = epoch;
        self
    }

    /// Set the tree record width in bits (24 or 32).
    pub fn record_size(mut self, bits: u16) -> Result<Self, MmdbError> {
        if !matches!(bits, 24 | 32) {
            return Err(MmdbError::Build(format!(
                "unsupported record size {} bits",
                bits
            )));
        }
        self.record_size = bits;
        Ok(self)
    }

    /// Insert a network with its data record.
    ///
    /// Networks may not overlap: inserting a network above or below an
    /// existing one is a conflict, as is inserting the same network twice.
    pub fn insert(&mut self, cidr: &str, value: DataValue) -> Result<(), MmdbError> {
        let network: IpNetwork = cidr.parse()?;
        let addr = match network.network_address() {
            IpAddr::V4(v4) => u32::from(v4),
            IpAddr::V6(_) => {
                return Err(MmdbError::Build(format!(
                    "builder only supports IPv4 networks, got {}",
                    network
                )))
            }
        };
        let prefix_len = network.prefix_len();
        if prefix_len == 0 {
            return Err(MmdbError::Build("cannot insert 0.0.0.0/0".to_string()));
        }

        let mut node = 0usize;
        for depth in 0..prefix_len {
            let bit = ((addr >> (31 - depth)) & 1) as usize;
            let last = depth == prefix_len - 1;
            match self.nodes[node][bit] {
                NodeRef::Empty => {
                    if last {
                        self.nodes[node][bit] = NodeRef::Data(self.records.len());
                        self.records.push(value);
                        return Ok(());
                    }
                    let child = self.nodes.len();
                    self.nodes.push([NodeRef::Empty, NodeRef::Empty]);
                    self.nodes[node][bit] = NodeRef::Node(child);
                    node = child;
                }
                NodeRef::Node(child) => {
                    if last {
                        return Err(MmdbError::Build(format!(
                            "{} conflicts with a more specific network",
                            network
                        )));
                    }
                    node = child;
                }
                NodeRef::Data(_) => {
                    return Err(MmdbError::Build(format!(
                        "{} conflicts with an existing network",
                        network
                    )));
                }
            }
        }
        unreachable!("loop always returns or errors on the last bit");
    }

    /// Number of data records inserted so far.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when no records have been inserted.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Serialize the database.
    pub fn build(&self) -> Result<Vec<u8>, MmdbError> {
        // Data section, recording each record's offset
        let mut data = Vec::new();
        let mut offsets = Vec::with_capacity(self.records.len());
        for record in &self.records {
            offsets.push(data.len());
            encode_value(&mut data, record);
        }

        let node_count = self.nodes.len() as u32;
        let record_of = |r: &NodeRef| -> u32 {
            match r {
                NodeRef::Empty => node_count,
                NodeRef::Node(n) => *n as u32,
                NodeRef::Data(idx) => {
                    node_count + DATA_SECTION_SEPARATOR as u32 + offsets[*idx] as u32
                }
            }
        };

        let mut tree = Vec::new();
        for node in &self.nodes {
            let left = record_of(&node[0]);
            let right = record_of(&node[1]);
            match self.record_size {
                24 => {
                    for v in [left, right] {
                        if v >= 1 << 24 {
                            return Err(MmdbError::Build(
                                "record value exceeds 24 bits; use a wider record size"
                                    .to_string(),
                            ));
                        }
                        tree.extend_from_slice(&v.to_be_bytes()[1..]);
                    }
                }
                _ => {
                    tree.extend_from_slice(&left.to_be_bytes());
                    tree.extend_from_slice(&right.to_be_bytes());
                }
            }
        }

        let metadata = DataValue::Map(vec![
            (
                "binary_format_major_version".to_string(),
                DataValue::Uint16(2),
            ),
            (
                "binary_format_minor_version".to_string(),
                DataValue::Uint16(0),
            ),
            ("build_epoch".to_string(), DataValue::Uint64(self.build_epoch)),
            (
                "database_type".to_string(),
                DataValue::String(self.database_type.clone()),
            ),
            (
                "description".to_string(),
                DataValue::Map(vec![(
                    "en".to_string(),
                    DataValue::String(self.database_type.clone()),
                )]),
            ),
            ("ip_version".to_string(), DataValue::Uint16(4)),
            (
                "languages".to_string(),
                DataValue::Array(vec![DataValue::String("en".to_string())]),
            ),
            ("node_count".to_string(), DataValue::Uint32(node_count)),
            ("record_size".to_string(), DataValue::Uint16(self.record_size)),
        ]);
        let mut metadata_bytes = Vec::new();
        encode_value(&mut metadata_bytes, &metadata);

        let mut out = tree;
        out.extend_from_slice(&[0u8; DATA_SECTION_SEPARATOR]);
        out.extend_from_slice(&data);
        out.extend_from_slice(METADATA_MARKER);
        out.extend_from_slice(&metadata_bytes);
        Ok(out)
    }
}

/// Append the encoding of `value` to `buf`.
fn encode_value(buf: &mut Vec<u8>, value: &DataValue) {
    match value {
        DataValue::String(s) => {
            push_control(buf, 2, s.len());
            buf.extend_from_slice(s.as_bytes());
        }
        DataValue::Bytes(b) => {
            push_control(buf, 4, b.len());
            buf.extend_from_slice(b);
        }
        DataValue::Uint16(n) => {
            let bytes = minimal_be(u64::from(*n));
            push_control(buf, 5, bytes.len());
            buf.extend_from_slice(&bytes);
        }
        DataValue::Uint32(n) => {
            let bytes = minimal_be(u64::from(*n));
            push_control(buf, 6, bytes.len());
            buf.extend_from_slice(&bytes);
        }
        DataValue::Uint64(n) => {
            let bytes = minimal_be(*n);
            push_control(buf, 9, bytes.len());
            buf.extend_from_slice(&bytes);
        }
        DataValue::Uint128(n) => {
            let mut bytes: Vec<u8> = n.to_be_bytes().to_vec();
            while bytes.len() > 1 && bytes[0] == 0 {
                bytes.remove(0);
            }
            if *n == 0 {
                bytes.clear();
            }
            push_control(buf, 10, bytes.len());
            buf.extend_from_slice(&bytes);
        }
        DataValue::Int32(n) => {
            // Negative values need the full width; positives are trimmed
            let bytes = if *n < 0 {
                n.to_be_bytes().to_vec()
            } else {
                minimal_be(*n as u64)
            };
            push_control(buf, 8, bytes.len());
            buf.extend_from_slice(&bytes);
        }
        DataValue::Double(n) => {
            push_control(buf, 3, 8);
            buf.extend_from_slice(&n.to_be_bytes());
        }
        DataValue::Float(n) => {
            push_control(buf, 15, 4);
            buf.extend_from_slice(&n.to_be_bytes());
        }
        DataValue::Bool(b) => {
            push_control(buf, 14, usize::from(*b));
        }
        DataValue::Array(items) => {
            push_control(buf, 11, items.len());
            for item in items {
                encode_value(buf, item);
            }
        }
        DataValue::Map(entries) => {
            push_control(buf, 7, entries.len());
            for (key, value) in entries {
                encode_value(buf, &DataValue::String(key.clone()));
                encode_value(buf, value);
            }
        }
    }
}

/// Write a control byte (plus extended type and size bytes) for `type_num`
/// with the given payload size.
fn push_control(buf: &mut Vec<u8>, type_num: u8, size: usize) {
    let (size_bits, size_bytes): (u8, Vec<u8>) = if size < 29 {
        (size as u8, Vec::new())
    } else if size < 29 + 256 {
        (29, vec![(size - 29) as u8])
    } else if size < 285 + 65_536 {
        (30, ((size - 285) as u16).to_be_bytes().to_vec())
    } else {
        let v = (size - 65_821) as u32;
        (31, v.to_be_bytes()[1..].to_vec())
    };
    if type_num < 8 {
        buf.push((type_num << 5) | size_bits);
    } else {
        buf.push(size_bits);
        buf.push(type_num - 7);
    }
    buf.extend_from_slice(&size_bytes);
}

/// Big-endian bytes with leading zeros stripped; empty for zero.
fn minimal_be(n: u64) -> Vec<u8> {
    if n == 0 {
        return Vec::new();
    }
    let bytes = n.to_be_bytes();
    let first = bytes.iter().position(|&b| b != 0).unwrap_or(7);
    bytes[first..].to_vec()
}
