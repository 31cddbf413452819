//! 🪣 bvx — versioned benchmark snapshots on S3-compatible object stores.
//!
//! A benchmark `bm` lives in containers named `bm.<major>.<minor>`, plus `bm.test.1` for
//! scratch work and `bm.overview` holding one empty marker per published version. Writers
//! come in with keys and talk S3; readers come in without and get the public HTTP listing.

pub mod app_config;
pub mod backends;
pub mod catalog;
pub mod comparison;
pub mod error;
pub mod lifecycle;
pub mod policy;
pub mod progress;
pub mod record;
pub mod storage;
pub mod version;

pub use backends::{AccessMode, ObjectStore, StoreBackend};
pub use catalog::Catalog;
pub use error::{StoreError, StoreResult};
pub use lifecycle::{CopyMode, DownloadReport, TaggingPolicy, Versioner};
pub use storage::BenchmarkStorage;
pub use version::Version;
