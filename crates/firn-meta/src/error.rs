//! Error types for the bulk-load metadata path.

use snafu::prelude::*;

use firn_common::PersistError;

/// Errors from decoding a user-supplied separator literal.
#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub))]
pub enum SeparatorError {
    /// `\x` prefix with nothing after it.
    #[snafu(display("Separator hex string is empty"))]
    EmptyHex,

    /// A character outside `[0-9A-Fa-f]` after the `\x` prefix.
    #[snafu(display("Separator hex format error: invalid character '{ch}'"))]
    InvalidHexChar { ch: char },

    /// An odd number of hex digits after the `\x` prefix.
    #[snafu(display("Separator hex length error: {len} digit(s), expected an even count"))]
    OddHexLength { len: usize },
}

/// Load-definition errors: the request is rejected at resolution time,
/// before anything executes or persists.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum LoadError {
    /// The request names a table the database does not have.
    #[snafu(display("Unknown table '{table}' in database '{database}'"))]
    UnknownTable { table: String, database: String },

    /// The target table is not an OLAP table.
    #[snafu(display("Table '{table}' is not an OLAP table"))]
    NotOlapTable { table: String },

    /// The request carries an explicit but empty partition list.
    #[snafu(display("Partition list is empty, at least 1 partition required"))]
    EmptyPartitions,

    /// A named partition does not exist on the target table.
    #[snafu(display("Unknown partition '{partition}' in table '{table}'"))]
    UnknownPartition { partition: String, table: String },

    /// The request carries no file paths.
    #[snafu(display("File path list is empty"))]
    EmptyFilePaths,

    /// A registered separator literal failed to decode.
    #[snafu(display("Invalid separator: {source}"))]
    Separator { source: SeparatorError },
}

impl LoadError {
    /// Stable metric label for the rejection reason.
    pub fn reason(&self) -> &'static str {
        match self {
            LoadError::UnknownTable { .. } => "unknown_table",
            LoadError::NotOlapTable { .. } => "not_olap_table",
            LoadError::EmptyPartitions => "empty_partitions",
            LoadError::UnknownPartition { .. } => "unknown_partition",
            LoadError::EmptyFilePaths => "empty_file_paths",
            LoadError::Separator { .. } => "separator",
        }
    }
}

/// Errors from the durable metadata journal.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum JournalError {
    /// Failed to create the journal's parent directory.
    #[snafu(display("Failed to create journal directory {}", path.display()))]
    CreateDir {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    /// Failed to open the journal file.
    #[snafu(display("Failed to open journal {}", path.display()))]
    Open {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    /// Failed to write or sync an appended record.
    #[snafu(display("Failed to append to journal: {source}"))]
    Append { source: std::io::Error },

    /// Failed to read the journal during replay.
    #[snafu(display("Failed to read journal {}: {source}", path.display()))]
    Read {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    /// The journal was written by a format this build does not understand.
    #[snafu(display("Unsupported journal format version {version} at offset {offset}"))]
    UnsupportedVersion { version: u16, offset: usize },

    /// A record length exceeds the configured guard; the stream cannot be
    /// trusted past this point.
    #[snafu(display("Journal record of {len} bytes at offset {offset} exceeds limit {limit}"))]
    RecordTooLarge { len: u32, offset: usize, limit: u32 },

    /// A record payload failed to decode.
    #[snafu(display("Corrupt journal record at offset {offset}: {source}"))]
    CorruptRecord { offset: usize, source: PersistError },
}
