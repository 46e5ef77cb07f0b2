//! # saccobook
//!
//! Persistence core for a savings-cooperative bookkeeping application:
//! a versioned snapshot store over a key-value backend, a one-shot schema
//! migrator for the legacy record layout, and a checksummed export/import
//! exchanger that merges foreign data without clobbering existing records.

pub mod error;
pub mod kv;
pub mod model;
pub mod store;
pub mod migrate;
pub mod exchange;

pub use error::{Result, SaccoError};
pub use kv::{FileKv, KvStore, MemoryKv};
pub use store::Store;

/// Current schema version for persisted snapshots and export containers
pub const SCHEMA_VERSION: &str = "2.3";

/// Maximum number of retained backup records (most-recent-first)
pub const BACKUP_HISTORY_CAP: usize = 50;

/// Maximum number of retained audit entries (most-recent-first)
pub const AUDIT_LOG_CAP: usize = 1000;

/// Key holding the combined current-schema snapshot blob
pub const DATA_KEY: &str = "saccobook.data";

/// Key holding the backup history, persisted independently of the snapshot
pub const BACKUPS_KEY: &str = "saccobook.backups";

/// Key holding the archived copy of the legacy records after migration
pub const ARCHIVE_KEY: &str = "saccobook.archive.v1";
