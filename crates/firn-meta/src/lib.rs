//! firn-meta: Metadata coordination for the firn OLAP cluster.
//!
//! This crate holds the bulk-load subsystem of the coordinator:
//!
//! - `separator` - Separator literal decoding (hex-escape form)
//! - `catalog` - Catalog metadata view and per-database locking
//! - `expr` - Column derivation expressions
//! - `load` - Load file group resolution and ETL lifecycle tracking
//! - `journal` - Durable metadata journal for crash recovery
//! - `error` - Load, separator and journal error types
//!
//! A load statement is resolved exactly once against the catalog (under
//! the database lock) into a [`LoadFileGroup`]; the group and the
//! [`EtlStatus`] of its ingest run are appended to the [`journal`] and
//! replayed after a restart. Remote file I/O happens in external broker
//! processes behind the [`firn_common::broker`] contract.

pub mod catalog;
pub mod error;
pub mod expr;
pub mod journal;
pub mod load;
pub mod separator;

// Re-export commonly used items
pub use catalog::{Catalog, Database, DatabaseRef, Table};
pub use error::{JournalError, LoadError, SeparatorError};
pub use expr::ColumnExpr;
pub use journal::{Journal, JournalConfig, JournalRecord};
pub use load::{EtlState, EtlStatus, LoadFileGroup, LoadRequest};
pub use separator::Separator;
