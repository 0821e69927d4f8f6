//! ETL execution lifecycle tracking.
//!
//! One [`EtlStatus`] tracks one external ingest run. Status reports arrive
//! asynchronously from the executing side and may race to finalize the
//! job, so the whole status lives behind a single lock and the terminal
//! transition is one indivisible check-and-set: exactly one of two racing
//! FINISHED/CANCELLED reports wins, the other sees `false`.
//!
//! Per-file progress (`file_map`) is operational state only: it is never
//! persisted, takes no part in equality, and is empty again after a
//! restart.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use firn_common::emit;
use firn_common::error::{PersistError, UnknownSymbolSnafu};
use firn_common::metrics::events::EtlTransition;
use firn_common::persist::{Persist, PersistReader, PersistWriter};

/// Tracking URL reported before the executing side supplies a real one.
pub const DEFAULT_TRACKING_URL: &str = "N/A";

/// Lifecycle state of an ETL execution.
///
/// `Running` is the only state transitions are accepted from; `Finished`
/// and `Cancelled` are terminal. States persist by symbolic name, never by
/// ordinal; the name table below is the single mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EtlState {
    Running,
    Finished,
    Cancelled,
}

impl EtlState {
    /// All states, for exhaustive table tests.
    pub const ALL: [EtlState; 3] = [EtlState::Running, EtlState::Finished, EtlState::Cancelled];

    /// The persisted symbolic name.
    pub fn as_str(self) -> &'static str {
        match self {
            EtlState::Running => "RUNNING",
            EtlState::Finished => "FINISHED",
            EtlState::Cancelled => "CANCELLED",
        }
    }

    /// Map a persisted name back to a state.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "RUNNING" => Some(EtlState::Running),
            "FINISHED" => Some(EtlState::Finished),
            "CANCELLED" => Some(EtlState::Cancelled),
            _ => None,
        }
    }

    /// Whether no further transitions are accepted from this state.
    pub fn is_terminal(self) -> bool {
        !matches!(self, EtlState::Running)
    }
}

#[derive(Debug, Clone)]
struct StatusInner {
    state: EtlState,
    tracking_url: String,
    stats: HashMap<String, String>,
    counters: HashMap<String, String>,
    // Not persisted.
    file_map: HashMap<String, i64>,
}

impl Default for StatusInner {
    fn default() -> Self {
        Self {
            state: EtlState::Running,
            tracking_url: DEFAULT_TRACKING_URL.to_string(),
            stats: HashMap::new(),
            counters: HashMap::new(),
            file_map: HashMap::new(),
        }
    }
}

/// Status of one external ETL execution.
///
/// Shareable across threads (`Arc<EtlStatus>`); every accessor returns an
/// owned snapshot taken under the lock, so callers never hold a live view
/// into internal state. Setters other than [`set_state`](Self::set_state)
/// are unconditional whole-value replacements: a late report landing after
/// finalization is stale but harmless, readers check the state first.
#[derive(Debug, Default)]
pub struct EtlStatus {
    inner: Mutex<StatusInner>,
}

impl EtlStatus {
    /// Create a status in the initial `Running` state.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StatusInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EtlState {
        self.lock().state
    }

    /// Attempt the transition to `next`.
    ///
    /// Check-and-set under one lock acquisition: if the current state is
    /// no longer `Running` the attempt is rejected without mutation and
    /// `false` is returned. Rejection is expected under racing completion
    /// reports and is never an error.
    pub fn set_state(&self, next: EtlState) -> bool {
        let accepted = {
            let mut inner = self.lock();
            if inner.state != EtlState::Running {
                false
            } else {
                inner.state = next;
                true
            }
        };
        emit!(EtlTransition {
            to: next.as_str(),
            accepted,
        });
        accepted
    }

    pub fn tracking_url(&self) -> String {
        self.lock().tracking_url.clone()
    }

    pub fn set_tracking_url(&self, url: impl Into<String>) {
        self.lock().tracking_url = url.into();
    }

    pub fn stats(&self) -> HashMap<String, String> {
        self.lock().stats.clone()
    }

    pub fn set_stats(&self, stats: HashMap<String, String>) {
        self.lock().stats = stats;
    }

    pub fn counters(&self) -> HashMap<String, String> {
        self.lock().counters.clone()
    }

    pub fn set_counters(&self, counters: HashMap<String, String>) {
        self.lock().counters = counters;
    }

    /// Per-file progress. Transient: never persisted, excluded from
    /// equality.
    pub fn file_map(&self) -> HashMap<String, i64> {
        self.lock().file_map.clone()
    }

    pub fn set_file_map(&self, file_map: HashMap<String, i64>) {
        self.lock().file_map = file_map;
    }
}

impl Clone for EtlStatus {
    fn clone(&self) -> Self {
        Self {
            inner: Mutex::new(self.lock().clone()),
        }
    }
}

/// Equality over `{state, tracking_url, stats, counters}`; `file_map` is
/// excluded.
impl PartialEq for EtlStatus {
    fn eq(&self, other: &Self) -> bool {
        let a = self.lock().clone();
        let b = other.lock().clone();
        a.state == b.state
            && a.tracking_url == b.tracking_url
            && a.stats == b.stats
            && a.counters == b.counters
    }
}

impl Persist for EtlStatus {
    /// Durable layout, in order: state name, tracking URL, stats map,
    /// counters map (each map as a count plus key/value pairs).
    fn write_to(&self, out: &mut PersistWriter) {
        let inner = self.lock();
        out.write_string(inner.state.as_str());
        out.write_string(&inner.tracking_url);

        out.write_i32(inner.stats.len() as i32);
        for (key, value) in &inner.stats {
            out.write_string(key);
            out.write_string(value);
        }

        out.write_i32(inner.counters.len() as i32);
        for (key, value) in &inner.counters {
            out.write_string(key);
            out.write_string(value);
        }
    }

    /// `file_map` is reinitialized empty on every reload.
    fn read_from(input: &mut PersistReader<'_>) -> Result<Self, PersistError> {
        let name = input.read_string()?;
        let state = EtlState::from_name(&name).ok_or_else(|| {
            UnknownSymbolSnafu {
                kind: "ETL state",
                name,
            }
            .build()
        })?;
        let tracking_url = input.read_string()?;

        let stats_count = input.read_count()?;
        let mut stats = HashMap::with_capacity(stats_count.min(1024));
        for _ in 0..stats_count {
            let key = input.read_string()?;
            let value = input.read_string()?;
            stats.insert(key, value);
        }

        let counters_count = input.read_count()?;
        let mut counters = HashMap::with_capacity(counters_count.min(1024));
        for _ in 0..counters_count {
            let key = input.read_string()?;
            let value = input.read_string()?;
            counters.insert(key, value);
        }

        Ok(Self {
            inner: Mutex::new(StatusInner {
                state,
                tracking_url,
                stats,
                counters,
                file_map: HashMap::new(),
            }),
        })
    }
}
