//! MMDB binary trie format
//!
//! This crate provides the binary format layer for the lookout relay:
//! - `reader` - memory-mapped reader with metadata parsing and lazy,
//!   one-shot traversal of the IP search tree
//! - `value` - the decoded data model and data-section decoder
//! - `builder` - an IPv4 database builder, used for producing databases
//!   and for test fixtures
//! - `net` - the CIDR network type traversal yields
//!
//! The format is the MaxMind DB layout: a binary trie keyed by IP prefix,
//! a shared data section, and a trailing metadata map.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builder;
pub mod error;
pub mod net;
pub mod reader;
pub mod value;

pub use builder::DatabaseBuilder;
pub use error::MmdbError;
pub use net::IpNetwork;
pub use reader::{Entries, Metadata, Reader, METADATA_MARKER};
pub use value::{DataDecoder, DataValue};
