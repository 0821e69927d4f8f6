//! Remote filesystem gateway contract.
//!
//! Brokers are separate processes that expose a small RPC surface over
//! object storage and distributed filesystems. The coordinator and the
//! load executors only ever see this contract: every operation returns a
//! structured [`BrokerStatus`] instead of raising a fault across the
//! process boundary, and file handles are valid strictly between their
//! matching open and close calls.
//!
//! Reads and writes take explicit offsets, so calls are position
//! independent. No implicit cursor is assumed by callers; `seek` exists
//! for gateways that maintain one server-side, but correctness never
//! depends on it.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use snafu::prelude::*;

/// Status codes a broker operation can return.
///
/// The numeric values are part of the RPC contract and must not change;
/// [`code`](Self::code) and [`from_code`](Self::from_code) are the only
/// mapping between the two representations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BrokerStatusCode {
    Ok,
    NotAuthorized,
    DuplicateRequest,
    InvalidInputOffset,
    InvalidInputFilePath,
    InvalidArgument,
    FileNotFound,
    TargetStorageServiceError,
    EndOfFile,
    OperationNotSupported,
}

impl BrokerStatusCode {
    /// All codes, for exhaustive table tests.
    pub const ALL: [BrokerStatusCode; 10] = [
        BrokerStatusCode::Ok,
        BrokerStatusCode::NotAuthorized,
        BrokerStatusCode::DuplicateRequest,
        BrokerStatusCode::InvalidInputOffset,
        BrokerStatusCode::InvalidInputFilePath,
        BrokerStatusCode::InvalidArgument,
        BrokerStatusCode::FileNotFound,
        BrokerStatusCode::TargetStorageServiceError,
        BrokerStatusCode::EndOfFile,
        BrokerStatusCode::OperationNotSupported,
    ];

    /// The numeric wire value of this code.
    pub fn code(self) -> i32 {
        match self {
            BrokerStatusCode::Ok => 0,
            BrokerStatusCode::NotAuthorized => 100,
            BrokerStatusCode::DuplicateRequest => 101,
            BrokerStatusCode::InvalidInputOffset => 102,
            BrokerStatusCode::InvalidInputFilePath => 103,
            BrokerStatusCode::InvalidArgument => 104,
            BrokerStatusCode::FileNotFound => 200,
            BrokerStatusCode::TargetStorageServiceError => 300,
            BrokerStatusCode::EndOfFile => 301,
            BrokerStatusCode::OperationNotSupported => 302,
        }
    }

    /// Map a numeric wire value back to a code.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(BrokerStatusCode::Ok),
            100 => Some(BrokerStatusCode::NotAuthorized),
            101 => Some(BrokerStatusCode::DuplicateRequest),
            102 => Some(BrokerStatusCode::InvalidInputOffset),
            103 => Some(BrokerStatusCode::InvalidInputFilePath),
            104 => Some(BrokerStatusCode::InvalidArgument),
            200 => Some(BrokerStatusCode::FileNotFound),
            300 => Some(BrokerStatusCode::TargetStorageServiceError),
            301 => Some(BrokerStatusCode::EndOfFile),
            302 => Some(BrokerStatusCode::OperationNotSupported),
            _ => None,
        }
    }
}

/// The structured status a failed broker operation returns.
///
/// A service-side error is converted 1:1 into this status before crossing
/// the RPC boundary; from the coordinator's viewpoint every gateway call is
/// plain request/response with no exceptional control path.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(display("Broker operation failed (code {}): {message}", code.code()))]
pub struct BrokerStatus {
    pub code: BrokerStatusCode,
    pub message: String,
}

impl BrokerStatus {
    /// Build a status from a code and message.
    pub fn new(code: BrokerStatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Result type for gateway operations.
pub type BrokerResult<T> = Result<T, BrokerStatus>;

/// An opaque handle for an open reader or writer.
///
/// Valid strictly between its matching open and close calls; using a
/// closed or foreign handle yields an `InvalidArgument` status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BrokerFd(pub u64);

/// Metadata for one entry returned by `list_path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerFileStatus {
    /// Path of the entry, relative to the listed path.
    pub path: String,
    /// Whether the entry is a directory.
    pub is_dir: bool,
    /// Size in bytes (0 for directories).
    pub size: i64,
    /// Whether the file may be split across scan ranges.
    pub is_splitable: bool,
}

/// The broker RPC surface.
///
/// `properties` carries per-call credentials and backend options
/// (endpoint, access keys, ...) and is passed through opaquely.
#[async_trait]
pub trait BrokerGateway: Send + Sync {
    /// List entries under `path`.
    async fn list_path(
        &self,
        path: &str,
        properties: &HashMap<String, String>,
    ) -> BrokerResult<Vec<BrokerFileStatus>>;

    /// Check whether `path` exists.
    async fn check_path_exist(
        &self,
        path: &str,
        properties: &HashMap<String, String>,
    ) -> BrokerResult<bool>;

    /// Delete the file at `path`.
    async fn delete_path(
        &self,
        path: &str,
        properties: &HashMap<String, String>,
    ) -> BrokerResult<()>;

    /// Rename `src` to `dest`.
    async fn rename_path(
        &self,
        src: &str,
        dest: &str,
        properties: &HashMap<String, String>,
    ) -> BrokerResult<()>;

    /// Open `path` for reading, positioned at `start_offset`.
    async fn open_reader(
        &self,
        client_id: &str,
        path: &str,
        start_offset: i64,
        properties: &HashMap<String, String>,
    ) -> BrokerResult<BrokerFd>;

    /// Read up to `length` bytes at the explicit `offset`.
    async fn pread(&self, fd: BrokerFd, offset: i64, length: i64) -> BrokerResult<Bytes>;

    /// Move the server-side cursor. Advisory; `pread` does not depend on it.
    async fn seek(&self, fd: BrokerFd, offset: i64) -> BrokerResult<()>;

    /// Close a reader handle.
    async fn close_reader(&self, fd: BrokerFd) -> BrokerResult<()>;

    /// Open `path` for writing.
    async fn open_writer(
        &self,
        client_id: &str,
        path: &str,
        properties: &HashMap<String, String>,
    ) -> BrokerResult<BrokerFd>;

    /// Write `data` at the explicit `offset`.
    async fn pwrite(&self, fd: BrokerFd, offset: i64, data: &[u8]) -> BrokerResult<()>;

    /// Close a writer handle.
    async fn close_writer(&self, fd: BrokerFd) -> BrokerResult<()>;

    /// Liveness probe.
    async fn ping(&self, client_id: &str) -> BrokerResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_status_code_table_round_trips() {
        for code in BrokerStatusCode::ALL {
            assert_eq!(BrokerStatusCode::from_code(code.code()), Some(code));
        }
        assert_eq!(BrokerStatusCode::from_code(1), None);
        assert_eq!(BrokerStatusCode::from_code(-1), None);
        assert_eq!(BrokerStatusCode::Ok.code(), 0);
        assert_eq!(BrokerStatusCode::FileNotFound.code(), 200);
        assert_eq!(BrokerStatusCode::EndOfFile.code(), 301);
    }

    #[test]
    fn test_status_display_carries_code_and_message() {
        let status = BrokerStatus::new(BrokerStatusCode::FileNotFound, "no such file");
        let rendered = status.to_string();
        assert!(rendered.contains("200"));
        assert!(rendered.contains("no such file"));
    }

    /// In-memory gateway used to exercise the contract. Files are plain
    /// byte vectors; handles are invalidated on close.
    #[derive(Default)]
    struct MemoryBroker {
        inner: Mutex<MemoryBrokerInner>,
    }

    #[derive(Default)]
    struct MemoryBrokerInner {
        files: HashMap<String, Vec<u8>>,
        open: HashMap<u64, String>,
        next_fd: u64,
    }

    impl MemoryBroker {
        fn with_file(path: &str, data: &[u8]) -> Self {
            let broker = Self::default();
            broker
                .inner
                .lock()
                .unwrap()
                .files
                .insert(path.to_string(), data.to_vec());
            broker
        }

        fn resolve(inner: &MemoryBrokerInner, fd: BrokerFd) -> BrokerResult<String> {
            inner.open.get(&fd.0).cloned().ok_or_else(|| {
                BrokerStatus::new(
                    BrokerStatusCode::InvalidArgument,
                    format!("unknown fd {}", fd.0),
                )
            })
        }
    }

    #[async_trait]
    impl BrokerGateway for MemoryBroker {
        async fn list_path(
            &self,
            path: &str,
            _properties: &HashMap<String, String>,
        ) -> BrokerResult<Vec<BrokerFileStatus>> {
            let inner = self.inner.lock().unwrap();
            let mut entries: Vec<BrokerFileStatus> = inner
                .files
                .iter()
                .filter(|(name, _)| name.starts_with(path))
                .map(|(name, data)| BrokerFileStatus {
                    path: name.clone(),
                    is_dir: false,
                    size: data.len() as i64,
                    is_splitable: true,
                })
                .collect();
            entries.sort_by(|a, b| a.path.cmp(&b.path));
            Ok(entries)
        }

        async fn check_path_exist(
            &self,
            path: &str,
            _properties: &HashMap<String, String>,
        ) -> BrokerResult<bool> {
            Ok(self.inner.lock().unwrap().files.contains_key(path))
        }

        async fn delete_path(
            &self,
            path: &str,
            _properties: &HashMap<String, String>,
        ) -> BrokerResult<()> {
            match self.inner.lock().unwrap().files.remove(path) {
                Some(_) => Ok(()),
                None => Err(BrokerStatus::new(BrokerStatusCode::FileNotFound, path)),
            }
        }

        async fn rename_path(
            &self,
            src: &str,
            dest: &str,
            _properties: &HashMap<String, String>,
        ) -> BrokerResult<()> {
            let mut inner = self.inner.lock().unwrap();
            match inner.files.remove(src) {
                Some(data) => {
                    inner.files.insert(dest.to_string(), data);
                    Ok(())
                }
                None => Err(BrokerStatus::new(BrokerStatusCode::FileNotFound, src)),
            }
        }

        async fn open_reader(
            &self,
            _client_id: &str,
            path: &str,
            _start_offset: i64,
            _properties: &HashMap<String, String>,
        ) -> BrokerResult<BrokerFd> {
            let mut inner = self.inner.lock().unwrap();
            if !inner.files.contains_key(path) {
                return Err(BrokerStatus::new(BrokerStatusCode::FileNotFound, path));
            }
            inner.next_fd += 1;
            let fd = inner.next_fd;
            inner.open.insert(fd, path.to_string());
            Ok(BrokerFd(fd))
        }

        async fn pread(&self, fd: BrokerFd, offset: i64, length: i64) -> BrokerResult<Bytes> {
            let inner = self.inner.lock().unwrap();
            let path = Self::resolve(&inner, fd)?;
            let data = &inner.files[&path];
            if offset < 0 || offset as usize > data.len() {
                return Err(BrokerStatus::new(
                    BrokerStatusCode::InvalidInputOffset,
                    format!("offset {offset} out of range"),
                ));
            }
            if offset as usize == data.len() {
                return Err(BrokerStatus::new(BrokerStatusCode::EndOfFile, "eof"));
            }
            let end = data.len().min(offset as usize + length as usize);
            Ok(Bytes::copy_from_slice(&data[offset as usize..end]))
        }

        async fn seek(&self, fd: BrokerFd, _offset: i64) -> BrokerResult<()> {
            let inner = self.inner.lock().unwrap();
            Self::resolve(&inner, fd).map(|_| ())
        }

        async fn close_reader(&self, fd: BrokerFd) -> BrokerResult<()> {
            let mut inner = self.inner.lock().unwrap();
            match inner.open.remove(&fd.0) {
                Some(_) => Ok(()),
                None => Err(BrokerStatus::new(
                    BrokerStatusCode::InvalidArgument,
                    format!("unknown fd {}", fd.0),
                )),
            }
        }

        async fn open_writer(
            &self,
            _client_id: &str,
            path: &str,
            _properties: &HashMap<String, String>,
        ) -> BrokerResult<BrokerFd> {
            let mut inner = self.inner.lock().unwrap();
            inner.files.entry(path.to_string()).or_default();
            inner.next_fd += 1;
            let fd = inner.next_fd;
            inner.open.insert(fd, path.to_string());
            Ok(BrokerFd(fd))
        }

        async fn pwrite(&self, fd: BrokerFd, offset: i64, data: &[u8]) -> BrokerResult<()> {
            let mut inner = self.inner.lock().unwrap();
            let path = Self::resolve(&inner, fd)?;
            let file = inner.files.get_mut(&path).unwrap();
            if offset as usize != file.len() {
                return Err(BrokerStatus::new(
                    BrokerStatusCode::InvalidInputOffset,
                    format!("non-contiguous write at {offset}"),
                ));
            }
            file.extend_from_slice(data);
            Ok(())
        }

        async fn close_writer(&self, fd: BrokerFd) -> BrokerResult<()> {
            self.close_reader(fd).await
        }

        async fn ping(&self, _client_id: &str) -> BrokerResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_pread_uses_explicit_offsets() {
        let broker = MemoryBroker::with_file("dir/a.csv", b"0123456789");
        let props = HashMap::new();
        let fd = broker.open_reader("fe", "dir/a.csv", 0, &props).await.unwrap();

        // Out-of-order reads see the same bytes: no implicit cursor.
        let tail = broker.pread(fd, 6, 4).await.unwrap();
        let head = broker.pread(fd, 0, 4).await.unwrap();
        assert_eq!(tail.as_ref(), b"6789");
        assert_eq!(head.as_ref(), b"0123");

        broker.close_reader(fd).await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_handle_returns_status_not_panic() {
        let broker = MemoryBroker::with_file("f", b"data");
        let props = HashMap::new();
        let fd = broker.open_reader("fe", "f", 0, &props).await.unwrap();
        broker.close_reader(fd).await.unwrap();

        let err = broker.pread(fd, 0, 1).await.unwrap_err();
        assert_eq!(err.code, BrokerStatusCode::InvalidArgument);

        let err = broker.close_reader(fd).await.unwrap_err();
        assert_eq!(err.code, BrokerStatusCode::InvalidArgument);
    }

    #[tokio::test]
    async fn test_missing_file_maps_to_file_not_found() {
        let broker = MemoryBroker::default();
        let props = HashMap::new();
        let err = broker
            .open_reader("fe", "nope", 0, &props)
            .await
            .unwrap_err();
        assert_eq!(err.code, BrokerStatusCode::FileNotFound);
        assert!(!broker.check_path_exist("nope", &props).await.unwrap());
    }

    #[tokio::test]
    async fn test_read_at_end_reports_end_of_file() {
        let broker = MemoryBroker::with_file("f", b"xy");
        let props = HashMap::new();
        let fd = broker.open_reader("fe", "f", 0, &props).await.unwrap();
        let err = broker.pread(fd, 2, 1).await.unwrap_err();
        assert_eq!(err.code, BrokerStatusCode::EndOfFile);
    }
}
