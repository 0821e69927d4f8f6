//! Catalog metadata view for load resolution.
//!
//! Only the metadata the bulk-load path validates against lives here:
//! databases, table kinds, and partition ids. The storage engine behind
//! these types belongs to the catalog proper.
//!
//! # Locking
//!
//! Each database sits behind its own `RwLock`. Resolution must observe one
//! consistent snapshot of table and partition metadata, so
//! [`LoadFileGroup::resolve`](crate::load::LoadFileGroup::resolve) takes
//! `&Database`, a borrow that can only be produced from a live lock
//! guard. Holding the guard across the whole call is therefore enforced by
//! the borrow checker rather than by convention:
//!
//! ```ignore
//! let db = catalog.database("sales").ok_or(...)?;
//! let guard = db.read();
//! let group = LoadFileGroup::resolve(&guard, &request)?;
//! ```

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A partition of an OLAP table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    id: i64,
    name: String,
}

impl Partition {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A partitioned, columnar-storage table, the only kind bulk load
/// targets.
#[derive(Debug, Clone)]
pub struct OlapTable {
    id: i64,
    name: String,
    partitions: HashMap<String, Partition>,
}

impl OlapTable {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            partitions: HashMap::new(),
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a partition, replacing any previous one with the same name.
    pub fn add_partition(&mut self, partition: Partition) {
        self.partitions.insert(partition.name.clone(), partition);
    }

    /// Look up a partition by name.
    pub fn partition(&self, name: &str) -> Option<&Partition> {
        self.partitions.get(name)
    }
}

/// An external table backed by files behind a broker.
///
/// Carries the registration-time file format: a separator literal (hex
/// escapes allowed, decoded at resolution time), a raw line delimiter, and
/// the registered path list.
#[derive(Debug, Clone)]
pub struct BrokerTable {
    id: i64,
    name: String,
    column_separator: String,
    line_delimiter: String,
    paths: Vec<String>,
}

impl BrokerTable {
    pub fn new(
        id: i64,
        name: impl Into<String>,
        column_separator: impl Into<String>,
        line_delimiter: impl Into<String>,
        paths: Vec<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            column_separator: column_separator.into(),
            line_delimiter: line_delimiter.into(),
            paths,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_separator(&self) -> &str {
        &self.column_separator
    }

    pub fn line_delimiter(&self) -> &str {
        &self.line_delimiter
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }
}

/// The closed set of table kinds the metadata layer knows.
#[derive(Debug, Clone)]
pub enum Table {
    Olap(OlapTable),
    Broker(BrokerTable),
}

impl Table {
    pub fn id(&self) -> i64 {
        match self {
            Table::Olap(t) => t.id(),
            Table::Broker(t) => t.id(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Table::Olap(t) => t.name(),
            Table::Broker(t) => t.name(),
        }
    }
}

/// A database: a named set of tables.
#[derive(Debug, Clone)]
pub struct Database {
    id: i64,
    name: String,
    tables: HashMap<String, Table>,
}

impl Database {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            tables: HashMap::new(),
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a table, replacing any previous one with the same name.
    pub fn create_table(&mut self, table: Table) {
        self.tables.insert(table.name().to_string(), table);
    }

    /// Look up a table by name.
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }
}

/// Top-level handle to the databases this coordinator serves.
///
/// Hands out per-database locks; see the module docs for how the guard
/// doubles as the resolution lock token.
#[derive(Debug, Default)]
pub struct Catalog {
    databases: RwLock<HashMap<String, Arc<RwLock<Database>>>>,
}

/// A shared, lockable database handle.
pub type DatabaseRef = Arc<RwLock<Database>>;

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a database, replacing any previous one with the same name.
    pub fn register_database(&self, db: Database) -> DatabaseRef {
        let handle = Arc::new(RwLock::new(db));
        let name = read_locked(&handle).name().to_string();
        self.databases
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, handle.clone());
        handle
    }

    /// Look up a database handle by name.
    pub fn database(&self, name: &str) -> Option<DatabaseRef> {
        self.databases
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }
}

/// Acquire a read guard, absorbing lock poisoning.
pub fn read_locked(db: &DatabaseRef) -> RwLockReadGuard<'_, Database> {
    db.read().unwrap_or_else(PoisonError::into_inner)
}

/// Acquire a write guard, absorbing lock poisoning.
pub fn write_locked(db: &DatabaseRef) -> RwLockWriteGuard<'_, Database> {
    db.write().unwrap_or_else(PoisonError::into_inner)
}
