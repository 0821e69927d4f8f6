//! Load file groups.
//!
//! One data source of a load statement resolves into one
//! [`LoadFileGroup`]: the unit of `{files, columns, separators}` the
//! external executor reads through the broker gateway. Resolution
//! validates the request against live catalog metadata exactly once; the
//! resolved group is immutable and carries its own durable binary layout
//! as part of the owning job's journal record.

use std::collections::HashMap;

use snafu::prelude::*;
use tracing::debug;

use firn_common::emit;
use firn_common::error::PersistError;
use firn_common::metrics::events::{FileGroupResolved, LoadRejected};
use firn_common::persist::{Persist, PersistReader, PersistWriter};

use crate::catalog::{BrokerTable, Database, Table};
use crate::error::{
    EmptyFilePathsSnafu, EmptyPartitionsSnafu, LoadError, NotOlapTableSnafu, SeparatorSnafu,
    UnknownPartitionSnafu, UnknownTableSnafu,
};
use crate::expr::ColumnExpr;
use crate::separator::{self, Separator};

/// Column separator used when a request does not name one.
pub const DEFAULT_COLUMN_SEPARATOR: &[u8] = b"\t";

/// Line delimiter used when a request does not name one.
pub const DEFAULT_LINE_DELIMITER: &[u8] = b"\n";

/// One data source of a load statement, after SQL analysis.
///
/// Names are still unresolved; separators arrive already decoded (the SQL
/// layer runs [`crate::separator::decode`] while analyzing the statement).
/// Column names are copied into the descriptor verbatim; schema validation
/// happens later, at plan time.
#[derive(Debug, Clone, Default)]
pub struct LoadRequest {
    /// Target table name.
    pub table_name: String,
    /// Explicit partition names, if the statement listed any.
    pub partition_names: Option<Vec<String>>,
    /// Explicit column order, if the statement listed one.
    pub column_names: Option<Vec<String>>,
    /// Decoded column separator; `None` means the default tab.
    pub column_separator: Option<Separator>,
    /// Line delimiter; `None` means the default newline.
    pub line_delimiter: Option<String>,
    /// Whether the loaded rows are retractions for aggregate merging.
    pub is_negative: bool,
    /// Remote file paths to ingest.
    pub file_paths: Vec<String>,
    /// Per-column derivation expressions from the statement's SET clause.
    pub expr_columns: Option<HashMap<String, ColumnExpr>>,
}

/// A resolved load file group.
///
/// Produced once per request by [`resolve`](Self::resolve) (or from a
/// broker table registration), then never mutated: all fields are private
/// and there are no setters. Destroyed with the owning job.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadFileGroup {
    table_id: i64,
    value_separator: Vec<u8>,
    line_delimiter: Vec<u8>,
    is_negative: bool,
    partition_ids: Option<Vec<i64>>,
    value_names: Option<Vec<String>>,
    file_paths: Vec<String>,
    expr_columns: Option<HashMap<String, ColumnExpr>>,
}

impl LoadFileGroup {
    /// Resolve a request against catalog metadata.
    ///
    /// The caller must hold the database lock for the whole call so that
    /// table and partition lookups observe one consistent snapshot; the
    /// `&Database` borrow is only obtainable from a live guard (see
    /// [`crate::catalog`]).
    ///
    /// Rejections are definition errors: nothing is persisted and no
    /// partially-resolved group escapes.
    pub fn resolve(db: &Database, request: &LoadRequest) -> Result<Self, LoadError> {
        match Self::resolve_inner(db, request) {
            Ok(group) => {
                emit!(FileGroupResolved {
                    table_id: group.table_id,
                    file_count: group.file_paths.len(),
                });
                debug!(
                    table = %request.table_name,
                    table_id = group.table_id,
                    files = group.file_paths.len(),
                    "Resolved load file group"
                );
                Ok(group)
            }
            Err(err) => {
                emit!(LoadRejected {
                    reason: err.reason()
                });
                Err(err)
            }
        }
    }

    fn resolve_inner(db: &Database, request: &LoadRequest) -> Result<Self, LoadError> {
        let table = db.table(&request.table_name).context(UnknownTableSnafu {
            table: request.table_name.clone(),
            database: db.name().to_string(),
        })?;
        let Table::Olap(olap) = table else {
            return NotOlapTableSnafu {
                table: table.name().to_string(),
            }
            .fail();
        };

        let partition_ids = match &request.partition_names {
            Some(names) => {
                ensure!(!names.is_empty(), EmptyPartitionsSnafu);
                let mut ids = Vec::with_capacity(names.len());
                for name in names {
                    let partition = olap.partition(name).context(UnknownPartitionSnafu {
                        partition: name.clone(),
                        table: olap.name().to_string(),
                    })?;
                    ids.push(partition.id());
                }
                Some(ids)
            }
            None => None,
        };

        let value_separator = match &request.column_separator {
            Some(sep) => sep.as_bytes().to_vec(),
            None => DEFAULT_COLUMN_SEPARATOR.to_vec(),
        };
        let line_delimiter = match &request.line_delimiter {
            Some(delim) => delim.as_bytes().to_vec(),
            None => DEFAULT_LINE_DELIMITER.to_vec(),
        };

        ensure!(!request.file_paths.is_empty(), EmptyFilePathsSnafu);

        Ok(Self {
            table_id: olap.id(),
            value_separator,
            line_delimiter,
            is_negative: request.is_negative,
            partition_ids,
            value_names: request.column_names.clone(),
            file_paths: request.file_paths.clone(),
            expr_columns: request.expr_columns.clone(),
        })
    }

    /// Build a group from a broker table registration.
    ///
    /// No request to validate: the table's registered separator literal is
    /// decoded (it may use the hex form), the line delimiter and path list
    /// are copied as registered, and partition/column resolution is
    /// skipped entirely. Broker-table groups never carry retractions.
    pub fn from_broker_table(table: &BrokerTable) -> Result<Self, LoadError> {
        let value_separator = separator::decode(table.column_separator()).context(SeparatorSnafu)?;
        Ok(Self {
            table_id: table.id(),
            value_separator,
            line_delimiter: table.line_delimiter().as_bytes().to_vec(),
            is_negative: false,
            partition_ids: None,
            value_names: None,
            file_paths: table.paths().to_vec(),
            expr_columns: None,
        })
    }

    pub fn table_id(&self) -> i64 {
        self.table_id
    }

    pub fn value_separator(&self) -> &[u8] {
        &self.value_separator
    }

    pub fn line_delimiter(&self) -> &[u8] {
        &self.line_delimiter
    }

    pub fn is_negative(&self) -> bool {
        self.is_negative
    }

    /// Resolved partition ids, in request order (duplicates preserved).
    /// `None` when the request named no partitions.
    pub fn partition_ids(&self) -> Option<&[i64]> {
        self.partition_ids.as_deref()
    }

    /// Explicit column order. `None` means all columns.
    pub fn value_names(&self) -> Option<&[String]> {
        self.value_names.as_deref()
    }

    pub fn file_paths(&self) -> &[String] {
        &self.file_paths
    }

    pub fn expr_columns(&self) -> Option<&HashMap<String, ColumnExpr>> {
        self.expr_columns.as_ref()
    }
}

impl Persist for LoadFileGroup {
    /// Durable layout, in order: table id, separator, delimiter, negative
    /// flag, partition ids, column names, file paths, expression map.
    /// Absent optional collections are written as a zero count.
    fn write_to(&self, out: &mut PersistWriter) {
        out.write_i64(self.table_id);
        out.write_bytes(&self.value_separator);
        out.write_bytes(&self.line_delimiter);
        out.write_bool(self.is_negative);

        match &self.partition_ids {
            Some(ids) => {
                out.write_i32(ids.len() as i32);
                for id in ids {
                    out.write_i64(*id);
                }
            }
            None => out.write_i32(0),
        }

        match &self.value_names {
            Some(names) => {
                out.write_i32(names.len() as i32);
                for name in names {
                    out.write_string(name);
                }
            }
            None => out.write_i32(0),
        }

        out.write_i32(self.file_paths.len() as i32);
        for path in &self.file_paths {
            out.write_string(path);
        }

        match &self.expr_columns {
            Some(exprs) => {
                out.write_i32(exprs.len() as i32);
                for (name, expr) in exprs {
                    out.write_string(name);
                    expr.write_to(out);
                }
            }
            None => out.write_i32(0),
        }
    }

    /// A zero count for partitions, columns or expressions reads back as
    /// an absent collection, never an empty one; the file path list always
    /// materializes as an initialized `Vec`.
    fn read_from(input: &mut PersistReader<'_>) -> Result<Self, PersistError> {
        let table_id = input.read_i64()?;
        let value_separator = input.read_bytes()?;
        let line_delimiter = input.read_bytes()?;
        let is_negative = input.read_bool()?;

        let partition_count = input.read_count()?;
        let partition_ids = if partition_count > 0 {
            let mut ids = Vec::with_capacity(partition_count.min(1024));
            for _ in 0..partition_count {
                ids.push(input.read_i64()?);
            }
            Some(ids)
        } else {
            None
        };

        let name_count = input.read_count()?;
        let value_names = if name_count > 0 {
            let mut names = Vec::with_capacity(name_count.min(1024));
            for _ in 0..name_count {
                names.push(input.read_string()?);
            }
            Some(names)
        } else {
            None
        };

        let path_count = input.read_count()?;
        let mut file_paths = Vec::with_capacity(path_count.min(1024));
        for _ in 0..path_count {
            file_paths.push(input.read_string()?);
        }

        let expr_count = input.read_count()?;
        let expr_columns = if expr_count > 0 {
            let mut exprs = HashMap::with_capacity(expr_count.min(1024));
            for _ in 0..expr_count {
                let name = input.read_string()?;
                exprs.insert(name, ColumnExpr::read_from(input)?);
            }
            Some(exprs)
        } else {
            None
        };

        Ok(Self {
            table_id,
            value_separator,
            line_delimiter,
            is_negative,
            partition_ids,
            value_names,
            file_paths,
            expr_columns,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{OlapTable, Partition};
    use firn_common::persist::{from_bytes, to_bytes};

    fn sample_db() -> Database {
        let mut table = OlapTable::new(1001, "orders");
        table.add_partition(Partition::new(2001, "p1"));
        table.add_partition(Partition::new(2002, "p2"));

        let mut db = Database::new(1, "sales");
        db.create_table(Table::Olap(table));
        db.create_table(Table::Broker(BrokerTable::new(
            1002,
            "orders_ext",
            "\\x2c",
            "\n",
            vec!["bos://bucket/ext/*".to_string()],
        )));
        db
    }

    fn request(table: &str) -> LoadRequest {
        LoadRequest {
            table_name: table.to_string(),
            file_paths: vec!["bos://bucket/a.csv".to_string()],
            ..LoadRequest::default()
        }
    }

    #[test]
    fn test_resolve_applies_defaults() {
        let db = sample_db();
        let group = LoadFileGroup::resolve(&db, &request("orders")).unwrap();

        assert_eq!(group.table_id(), 1001);
        assert_eq!(group.value_separator(), b"\t");
        assert_eq!(group.line_delimiter(), b"\n");
        assert!(!group.is_negative());
        assert!(group.partition_ids().is_none());
        assert!(group.value_names().is_none());
        assert_eq!(group.file_paths(), ["bos://bucket/a.csv"]);
        assert!(group.expr_columns().is_none());
    }

    #[test]
    fn test_resolve_copies_request_fields_verbatim() {
        let db = sample_db();
        let mut req = request("orders");
        req.partition_names = Some(vec!["p2".into(), "p1".into()]);
        req.column_names = Some(vec!["k".into(), "v".into()]);
        req.column_separator = Some(Separator::parse("\\x0907").unwrap());
        req.line_delimiter = Some("\r\n".into());
        req.is_negative = true;
        req.expr_columns = Some(HashMap::from([(
            "v".to_string(),
            ColumnExpr::Column("v_src".to_string()),
        )]));

        let group = LoadFileGroup::resolve(&db, &req).unwrap();
        assert_eq!(group.partition_ids(), Some(&[2002, 2001][..]));
        assert_eq!(
            group.value_names(),
            Some(&["k".to_string(), "v".to_string()][..])
        );
        assert_eq!(group.value_separator(), &[0x09, 0x07]);
        assert_eq!(group.line_delimiter(), b"\r\n");
        assert!(group.is_negative());
        assert_eq!(group.expr_columns().unwrap().len(), 1);
    }

    #[test]
    fn test_resolve_preserves_duplicate_partitions() {
        let db = sample_db();
        let mut req = request("orders");
        req.partition_names = Some(vec!["p1".into(), "p1".into()]);

        let group = LoadFileGroup::resolve(&db, &req).unwrap();
        assert_eq!(group.partition_ids(), Some(&[2001, 2001][..]));
    }

    #[test]
    fn test_resolve_unknown_table_fails() {
        let db = sample_db();
        let err = LoadFileGroup::resolve(&db, &request("missing")).unwrap_err();
        assert!(matches!(err, LoadError::UnknownTable { .. }));
    }

    #[test]
    fn test_resolve_rejects_non_olap_table() {
        let db = sample_db();
        let err = LoadFileGroup::resolve(&db, &request("orders_ext")).unwrap_err();
        assert!(matches!(err, LoadError::NotOlapTable { .. }));
    }

    #[test]
    fn test_resolve_rejects_empty_partition_list() {
        let db = sample_db();
        let mut req = request("orders");
        req.partition_names = Some(vec![]);
        let err = LoadFileGroup::resolve(&db, &req).unwrap_err();
        assert!(matches!(err, LoadError::EmptyPartitions));
    }

    #[test]
    fn test_resolve_fails_on_first_unknown_partition() {
        let db = sample_db();
        let mut req = request("orders");
        req.partition_names = Some(vec!["p1".into(), "p9".into()]);
        let err = LoadFileGroup::resolve(&db, &req).unwrap_err();
        match err {
            LoadError::UnknownPartition { partition, table } => {
                assert_eq!(partition, "p9");
                assert_eq!(table, "orders");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_resolve_rejects_empty_file_paths() {
        let db = sample_db();
        let mut req = request("orders");
        req.file_paths.clear();
        let err = LoadFileGroup::resolve(&db, &req).unwrap_err();
        assert!(matches!(err, LoadError::EmptyFilePaths));
    }

    #[test]
    fn test_from_broker_table_decodes_registered_separator() {
        let table = BrokerTable::new(
            1002,
            "orders_ext",
            "\\x2c",
            "\n",
            vec!["bos://bucket/ext/part-0".to_string()],
        );
        let group = LoadFileGroup::from_broker_table(&table).unwrap();

        assert_eq!(group.table_id(), 1002);
        assert_eq!(group.value_separator(), b",");
        assert_eq!(group.line_delimiter(), b"\n");
        assert!(!group.is_negative());
        assert!(group.partition_ids().is_none());
        assert!(group.value_names().is_none());
        assert_eq!(group.file_paths(), ["bos://bucket/ext/part-0"]);
    }

    #[test]
    fn test_from_broker_table_rejects_bad_separator() {
        let table = BrokerTable::new(1002, "orders_ext", "\\x0", "\n", vec!["p".to_string()]);
        let err = LoadFileGroup::from_broker_table(&table).unwrap_err();
        assert!(matches!(err, LoadError::Separator { .. }));
    }

    #[test]
    fn test_persist_round_trip_full() {
        let db = sample_db();
        let mut req = request("orders");
        req.partition_names = Some(vec!["p1".into(), "p2".into()]);
        req.column_names = Some(vec!["k".into(), "v".into()]);
        req.column_separator = Some(Separator::parse("\\xff").unwrap());
        req.line_delimiter = Some("\r\n".into());
        req.is_negative = true;
        req.expr_columns = Some(HashMap::from([
            ("k".to_string(), ColumnExpr::Null),
            (
                "v".to_string(),
                ColumnExpr::function("hll_hash", vec![ColumnExpr::Column("v_src".into())]),
            ),
        ]));
        req.file_paths.push("bos://bucket/b.csv".to_string());

        let group = LoadFileGroup::resolve(&db, &req).unwrap();
        let restored: LoadFileGroup = from_bytes(&to_bytes(&group)).unwrap();
        assert_eq!(restored, group);
    }

    #[test]
    fn test_absent_collections_round_trip_to_absent() {
        let db = sample_db();
        let group = LoadFileGroup::resolve(&db, &request("orders")).unwrap();
        let restored: LoadFileGroup = from_bytes(&to_bytes(&group)).unwrap();

        assert!(restored.partition_ids().is_none());
        assert!(restored.value_names().is_none());
        assert!(restored.expr_columns().is_none());
        assert_eq!(restored.file_paths(), group.file_paths());
    }

    #[test]
    fn test_persisted_layout_is_stable() {
        let db = sample_db();
        let mut req = request("orders");
        req.file_paths = vec!["p".to_string()];
        let group = LoadFileGroup::resolve(&db, &req).unwrap();

        // Pinned field order: any change here breaks crash recovery.
        let expected: Vec<u8> = [
            &[0, 0, 0, 0, 0, 0, 3, 233][..], // table id 1001
            &[0, 0, 0, 1, 0x09],             // separator "\t"
            &[0, 0, 0, 1, 0x0A],             // delimiter "\n"
            &[0],                            // is_negative
            &[0, 0, 0, 0],                   // partition count
            &[0, 0, 0, 0],                   // column name count
            &[0, 0, 0, 1, 0, 0, 0, 1, b'p'], // one path "p"
            &[0, 0, 0, 0],                   // expression count
        ]
        .concat();
        assert_eq!(to_bytes(&group).as_ref(), expected.as_slice());
    }
}
