//! Lookout - relay an MMDB threat-intelligence feed into a lookup store
//!
//! One invocation runs a full batch cycle: download the day's IP-indexed
//! binary database, validate it, push it into the lookup-table store of a
//! log-processing platform (upload → create-or-update → commit → deploy),
//! optionally derive and push a human-readable CSV sample, and clean up.
//!
//! Everything is synchronous and single-threaded; the run either fully
//! completes or fails as a whole, and re-running is idempotent.
//!
//! # Components
//!
//! - [`feed`] - acquisition from the threat-intelligence feed
//! - [`schema`] - column inference over a bounded record sample
//! - [`export`] - streaming MMDB-to-CSV transcoding
//! - [`remote`] - lookup store client and the per-artifact
//!   synchronization state machine
//! - [`pipeline`] - run orchestration and cleanup policy
//!
//! The binary trie format itself lives in the `lookout-mmdb` crate.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod export;
pub mod feed;
pub mod pipeline;
pub mod remote;
pub mod schema;

pub use config::Config;
pub use error::{LookoutError, Result, SyncStage};
pub use export::ExportStats;
pub use pipeline::{run, RunSummary};
pub use remote::{BindAction, HttpLookupApi, LookupApi, MockLookupApi, SyncOutcome, Synchronizer};
