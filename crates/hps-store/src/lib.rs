//! hps-store
//!
//! Local persistence for the HPS client: the SQLite database holding every
//! metadata table, and the blob-per-file content store addressed by
//! content hash.

pub mod content;
pub mod db;

pub use content::{disk_usage, ContentStore, VerifyReport};
pub use db::{ContentRow, Db, DnsRecordRow, HistoryRow, NetworkNodeRow, SessionSnapshot, Stats};
