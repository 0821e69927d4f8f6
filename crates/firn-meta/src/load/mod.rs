//! Bulk-load metadata.
//!
//! A load statement resolves into one [`LoadFileGroup`] per data source
//! (validated against the catalog under its lock), and each ingest run is
//! tracked by an [`EtlStatus`]. Both are journaled for crash recovery; see
//! [`crate::journal`].

pub mod etl;
pub mod file_group;

pub use etl::{DEFAULT_TRACKING_URL, EtlState, EtlStatus};
pub use file_group::{
    DEFAULT_COLUMN_SEPARATOR, DEFAULT_LINE_DELIMITER, LoadFileGroup, LoadRequest,
};
