//! SQLite-backed queryable store.
//!
//! Serves both sides of an evaluation run: the dataset query that yields the
//! held-out records, and the prediction table that downstream consumers read.
//! Published tables are always replaced wholesale, never appended to.

use std::path::Path;

use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, params, params_from_iter};
use scorecard_types::{Cell, Table};

use crate::error::StoreError;

pub struct SqlStore {
    conn: Connection,
}

impl std::fmt::Debug for SqlStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SqlStore({})", self.conn.path().unwrap_or(":memory:"))
    }
}

impl SqlStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref())?;
        tracing::debug!("Opened SQLite store at {}", path.as_ref().display());
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    /// Run raw SQL (one or more statements) without reading results.
    pub fn execute_batch(&self, sql: &str) -> Result<(), StoreError> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    /// Execute a single query and materialise every row.
    pub fn query(&self, sql: &str) -> Result<Table, StoreError> {
        tracing::debug!("Executing SQL: {}", sql);

        let mut stmt = self.conn.prepare(sql)?;
        let headers: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut rows: Vec<Vec<Cell>> = Vec::new();
        let mut cursor = stmt.query([])?;
        while let Some(row) = cursor.next()? {
            let mut cells = Vec::with_capacity(headers.len());
            for (idx, header) in headers.iter().enumerate() {
                cells.push(value_ref_to_cell(row.get_ref(idx)?, header)?);
            }
            rows.push(cells);
        }

        Table::new(headers, rows).map_err(|e| StoreError::InvalidTable(e.to_string()))
    }

    pub fn table_exists(&self, name: &str) -> Result<bool, StoreError> {
        let count: i64 = self.conn.query_row(
            "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Replace the table `name` with the contents of `table`.
    ///
    /// Drop, create and insert run in one transaction, so readers see either the
    /// previous contents or the complete new ones. Column affinities are inferred
    /// from the cells; SQLite applies its usual coercions on insert.
    pub fn replace_table(&self, name: &str, table: &Table) -> Result<usize, StoreError> {
        if name.trim().is_empty() {
            return Err(StoreError::InvalidTable("table name is empty".to_string()));
        }
        if table.column_count() == 0 {
            return Err(StoreError::InvalidTable(format!(
                "table `{name}` has no columns"
            )));
        }

        let quoted = quote_ident(name);
        let column_defs = table
            .headers()
            .iter()
            .enumerate()
            .map(|(idx, header)| {
                let affinity = column_affinity(table, idx);
                if affinity.is_empty() {
                    quote_ident(header)
                } else {
                    format!("{} {}", quote_ident(header), affinity)
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=table.column_count())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(&format!("DROP TABLE IF EXISTS {quoted}"), [])?;
        tx.execute(&format!("CREATE TABLE {quoted} ({column_defs})"), [])?;

        let mut inserted = 0usize;
        {
            let mut stmt = tx.prepare(&format!("INSERT INTO {quoted} VALUES ({placeholders})"))?;
            for row in table.rows() {
                let values: Vec<SqlValue> = row.iter().map(cell_to_sql).collect();
                inserted += stmt.execute(params_from_iter(values.iter()))?;
            }
        }
        tx.commit()?;

        tracing::debug!("Replaced table {} with {} rows", name, inserted);
        Ok(inserted)
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Declared type for a column, chosen from the widest cell it holds.
fn column_affinity(table: &Table, idx: usize) -> &'static str {
    let mut affinity = "";
    for row in table.rows() {
        match &row[idx] {
            Cell::Null => {}
            Cell::Bool(_) | Cell::Int(_) => {
                if affinity.is_empty() {
                    affinity = "INTEGER";
                }
            }
            Cell::Float(_) => {
                if affinity != "TEXT" {
                    affinity = "REAL";
                }
            }
            Cell::Str(_) => return "TEXT",
        }
    }
    affinity
}

fn cell_to_sql(cell: &Cell) -> SqlValue {
    match cell {
        Cell::Null => SqlValue::Null,
        Cell::Bool(b) => SqlValue::Integer(*b as i64),
        Cell::Int(i) => SqlValue::Integer(*i),
        Cell::Float(f) => SqlValue::Real(*f),
        Cell::Str(s) => SqlValue::Text(s.clone()),
    }
}

fn value_ref_to_cell(value: ValueRef<'_>, column: &str) -> Result<Cell, StoreError> {
    match value {
        ValueRef::Null => Ok(Cell::Null),
        ValueRef::Integer(i) => Ok(Cell::Int(i)),
        ValueRef::Real(f) => Ok(Cell::Float(f)),
        ValueRef::Text(bytes) => std::str::from_utf8(bytes)
            .map(|s| Cell::Str(s.to_string()))
            .map_err(|_| StoreError::InvalidUtf8 {
                column: column.to_string(),
            }),
        ValueRef::Blob(_) => Err(StoreError::UnsupportedValue {
            column: column.to_string(),
            kind: "blob",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn predictions(ids: &[i64], labels: &[i64]) -> Table {
        Table::from_columns(vec![
            (
                "isFraud".to_string(),
                labels.iter().map(|l| Cell::Int(*l)).collect(),
            ),
            (
                "txn_id".to_string(),
                ids.iter().map(|i| Cell::Int(*i)).collect(),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_query_returns_headers_and_typed_cells() {
        let store = SqlStore::open_in_memory().unwrap();
        store
            .execute_batch(
                "CREATE TABLE t (id INTEGER, amount REAL, kind TEXT, note TEXT);
                 INSERT INTO t VALUES (1, 9.5, 'TRANSFER', NULL);",
            )
            .unwrap();

        let table = store.query("SELECT * FROM t").unwrap();
        assert_eq!(table.headers(), &["id", "amount", "kind", "note"]);
        assert_eq!(
            table.rows()[0],
            vec![
                Cell::Int(1),
                Cell::Float(9.5),
                Cell::from("TRANSFER"),
                Cell::Null
            ]
        );
    }

    #[test]
    fn test_query_without_rows_keeps_headers() {
        let store = SqlStore::open_in_memory().unwrap();
        store.execute_batch("CREATE TABLE t (a INTEGER, b TEXT);").unwrap();

        let table = store.query("SELECT a, b FROM t").unwrap();
        assert_eq!(table.row_count(), 0);
        assert_eq!(table.headers(), &["a", "b"]);
    }

    #[test]
    fn test_query_rejects_blobs() {
        let store = SqlStore::open_in_memory().unwrap();
        store
            .execute_batch("CREATE TABLE t (b BLOB); INSERT INTO t VALUES (x'00ff');")
            .unwrap();

        let err = store.query("SELECT * FROM t").unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedValue { .. }));
    }

    #[test]
    fn test_invalid_sql_is_an_error() {
        let store = SqlStore::open_in_memory().unwrap();
        assert!(store.query("SELECT * FROM missing_table").is_err());
    }

    #[test]
    fn test_replace_table_round_trip() {
        let store = SqlStore::open_in_memory().unwrap();
        let ids = [101, 102, 103, 104];
        let inserted = store
            .replace_table("predictions_tmp", &predictions(&ids, &[0, 1, 0, 1]))
            .unwrap();
        assert_eq!(inserted, 4);

        let reread = store.query("SELECT * FROM predictions_tmp").unwrap();
        assert_eq!(reread.row_count(), 4);
        let got: HashSet<i64> = reread
            .column("txn_id")
            .unwrap()
            .filter_map(Cell::as_i64)
            .collect();
        assert_eq!(got, ids.iter().copied().collect());
    }

    #[test]
    fn test_replace_table_twice_has_no_duplicates() {
        let store = SqlStore::open_in_memory().unwrap();
        let table = predictions(&[1, 2, 3], &[0, 0, 1]);
        store.replace_table("predictions_tmp", &table).unwrap();
        store.replace_table("predictions_tmp", &table).unwrap();

        let reread = store.query("SELECT txn_id FROM predictions_tmp").unwrap();
        assert_eq!(reread.row_count(), 3);
    }

    #[test]
    fn test_replace_table_drops_previous_schema() {
        let store = SqlStore::open_in_memory().unwrap();
        store
            .execute_batch("CREATE TABLE predictions_tmp (other TEXT); INSERT INTO predictions_tmp VALUES ('old');")
            .unwrap();

        store
            .replace_table("predictions_tmp", &predictions(&[7], &[1]))
            .unwrap();

        let reread = store.query("SELECT * FROM predictions_tmp").unwrap();
        assert_eq!(reread.headers(), &["isFraud", "txn_id"]);
        assert_eq!(reread.rows()[0], vec![Cell::Int(1), Cell::Int(7)]);
    }

    #[test]
    fn test_replace_table_applies_column_affinity() {
        let store = SqlStore::open_in_memory().unwrap();
        let table = Table::from_columns(vec![(
            "score".to_string(),
            vec![Cell::Float(0.5), Cell::Int(2)],
        )])
        .unwrap();
        store.replace_table("scores", &table).unwrap();

        // REAL affinity turns the integer into a float on insert.
        let reread = store.query("SELECT score FROM scores").unwrap();
        assert_eq!(reread.rows()[1], vec![Cell::Float(2.0)]);
    }

    #[test]
    fn test_replace_table_quotes_identifiers() {
        let store = SqlStore::open_in_memory().unwrap();
        let table = Table::from_columns(vec![(
            "weird \"col\"".to_string(),
            vec![Cell::from("a")],
        )])
        .unwrap();
        store.replace_table("odd name", &table).unwrap();
        assert!(store.table_exists("odd name").unwrap());
    }

    #[test]
    fn test_replace_table_rejects_empty_name() {
        let store = SqlStore::open_in_memory().unwrap();
        let err = store
            .replace_table(" ", &predictions(&[1], &[0]))
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTable(_)));
    }

    #[test]
    fn test_open_file_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        {
            let store = SqlStore::open(&path).unwrap();
            store
                .replace_table("predictions_tmp", &predictions(&[1, 2], &[1, 0]))
                .unwrap();
        }
        let store = SqlStore::open(&path).unwrap();
        assert_eq!(
            store
                .query("SELECT * FROM predictions_tmp")
                .unwrap()
                .row_count(),
            2
        );
    }
}
