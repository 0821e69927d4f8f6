//! Durable metadata journal.
//!
//! Resolved load descriptors and ETL status reports are appended here so
//! the coordinator can rebuild its in-memory state after a restart. Each
//! record is framed with a small versioned envelope around its payload:
//!
//! ```text
//! u16 format version | u16 record kind | u32 payload length | payload
//! ```
//!
//! The envelope carries the version so the record payloads themselves stay
//! bit-exact across releases. Replay is tolerant in exactly two ways: a
//! torn final record (crash mid-append) is dropped with a warning, and a
//! record of unknown kind is skipped over by its length so newer builds
//! can add kinds without breaking older readers. Anything else that fails
//! to decode is corruption and surfaces as an error.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use tracing::{debug, info, warn};

use firn_common::emit;
use firn_common::metrics::events::{JournalRecordWritten, JournalReplayed};
use firn_common::persist::{Persist, PersistReader, PersistWriter};

use crate::error::{
    AppendSnafu, CorruptRecordSnafu, CreateDirSnafu, JournalError, OpenSnafu, ReadSnafu,
    RecordTooLargeSnafu, UnsupportedVersionSnafu,
};
use crate::load::{EtlStatus, LoadFileGroup};

/// Current journal format version.
pub const FORMAT_VERSION: u16 = 1;

const KIND_FILE_GROUP: u16 = 1;
const KIND_ETL_STATUS: u16 = 2;

const ENVELOPE_LEN: usize = 8;

fn default_sync_on_append() -> bool {
    true
}

fn default_max_record_len() -> u32 {
    16 * 1024 * 1024
}

/// Journal configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalConfig {
    /// Path of the journal file. Parent directories are created on open.
    pub path: PathBuf,
    /// Whether to fsync after every append. Turning this off trades
    /// durability of the last few records for throughput.
    #[serde(default = "default_sync_on_append")]
    pub sync_on_append: bool,
    /// Upper bound for a single record; a larger length prefix means the
    /// stream is corrupt.
    #[serde(default = "default_max_record_len")]
    pub max_record_len: u32,
}

impl JournalConfig {
    /// Config with defaults for the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sync_on_append: default_sync_on_append(),
            max_record_len: default_max_record_len(),
        }
    }
}

/// One journaled record.
#[derive(Debug)]
pub enum JournalRecord {
    /// A resolved load file group.
    FileGroup(LoadFileGroup),
    /// An ETL status snapshot.
    EtlStatus(EtlStatus),
}

impl JournalRecord {
    fn kind(&self) -> u16 {
        match self {
            JournalRecord::FileGroup(_) => KIND_FILE_GROUP,
            JournalRecord::EtlStatus(_) => KIND_ETL_STATUS,
        }
    }

    /// Stable label for metrics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            JournalRecord::FileGroup(_) => "file_group",
            JournalRecord::EtlStatus(_) => "etl_status",
        }
    }

    fn payload(&self) -> bytes::Bytes {
        match self {
            JournalRecord::FileGroup(group) => firn_common::persist::to_bytes(group),
            JournalRecord::EtlStatus(status) => firn_common::persist::to_bytes(status),
        }
    }
}

/// Append-only handle to the metadata journal.
pub struct Journal {
    file: File,
    config: JournalConfig,
}

impl Journal {
    /// Open (creating if needed) the journal for appending.
    pub fn open(config: JournalConfig) -> Result<Self, JournalError> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).context(CreateDirSnafu {
                    path: parent.to_path_buf(),
                })?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.path)
            .context(OpenSnafu {
                path: config.path.clone(),
            })?;
        debug!(path = %config.path.display(), "Opened metadata journal");
        Ok(Self { file, config })
    }

    /// Append one record and (by default) fsync it.
    pub fn append(&mut self, record: &JournalRecord) -> Result<(), JournalError> {
        let payload = record.payload();

        let mut frame = PersistWriter::with_capacity(ENVELOPE_LEN + payload.len());
        frame.write_u16(FORMAT_VERSION);
        frame.write_u16(record.kind());
        frame.write_bytes(&payload);

        self.file.write_all(&frame.finish()).context(AppendSnafu)?;
        if self.config.sync_on_append {
            self.file.sync_data().context(AppendSnafu)?;
        }

        emit!(JournalRecordWritten {
            kind: record.kind_name(),
            bytes: payload.len(),
        });
        Ok(())
    }

    /// Replay the journal at `config.path` from the beginning.
    ///
    /// Records come back in append order. A missing file replays as empty
    /// (first boot).
    pub fn replay(config: &JournalConfig) -> Result<Vec<JournalRecord>, JournalError> {
        let data = match std::fs::read(&config.path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %config.path.display(), "No journal found, starting fresh");
                return Ok(Vec::new());
            }
            Err(err) => {
                return Err(err).context(ReadSnafu {
                    path: config.path.clone(),
                });
            }
        };

        let mut records = Vec::new();
        let mut skipped = 0usize;
        let mut offset = 0usize;

        while offset < data.len() {
            let Ok((version, kind, len)) = read_envelope(&data[offset..]) else {
                warn!(
                    offset,
                    trailing = data.len() - offset,
                    "Dropping torn journal envelope at end of log"
                );
                break;
            };
            ensure!(
                version == FORMAT_VERSION,
                UnsupportedVersionSnafu { version, offset }
            );
            ensure!(
                len <= config.max_record_len,
                RecordTooLargeSnafu {
                    len,
                    offset,
                    limit: config.max_record_len,
                }
            );

            let body_start = offset + ENVELOPE_LEN;
            let body_end = body_start + len as usize;
            if body_end > data.len() {
                warn!(
                    offset,
                    expected = len,
                    available = data.len() - body_start,
                    "Dropping torn journal record at end of log"
                );
                break;
            }

            let mut reader = PersistReader::new(&data[body_start..body_end]);
            match kind {
                KIND_FILE_GROUP => {
                    let group = LoadFileGroup::read_from(&mut reader)
                        .context(CorruptRecordSnafu { offset })?;
                    records.push(JournalRecord::FileGroup(group));
                }
                KIND_ETL_STATUS => {
                    let status = EtlStatus::read_from(&mut reader)
                        .context(CorruptRecordSnafu { offset })?;
                    records.push(JournalRecord::EtlStatus(status));
                }
                other => {
                    warn!(kind = other, offset, "Skipping journal record of unknown kind");
                    skipped += 1;
                }
            }

            offset = body_end;
        }

        info!(
            path = %config.path.display(),
            records = records.len(),
            skipped,
            "Replayed metadata journal"
        );
        emit!(JournalReplayed {
            records: records.len(),
            skipped,
        });
        Ok(records)
    }
}

/// Parse one record envelope: version, kind, payload length.
fn read_envelope(buf: &[u8]) -> Result<(u16, u16, u32), firn_common::PersistError> {
    let mut reader = PersistReader::new(buf);
    Ok((reader.read_u16()?, reader.read_u16()?, reader.read_u32()?))
}

impl std::fmt::Debug for Journal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Journal<{}>", self.config.path.display())
    }
}
