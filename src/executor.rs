//! The SQL execution boundary.
//!
//! The engine consumes [`SqlExecutor`] and nothing else; connection, pool
//! and transaction lifecycle stay with the caller. [`SqliteExecutor`] is
//! the bundled reference implementation backing the integration tests.

use rusqlite::types::{ToSqlOutput, Value as SqliteValue, ValueRef};
use rusqlite::Connection;
use tracing::{debug, error};

use crate::error::{Error, Result};
use crate::sql::Dialect;
use crate::value::{Row, Value, DATETIME_FORMAT};

/// The execution facility interface consumed by the engine.
///
/// `query_rows` must label joined columns `alias.column` and root columns
/// bare (or `table.column`); the hydrator matches both case-insensitively.
pub trait SqlExecutor {
    fn query_rows(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// First column of the first row, `Null` when the result is empty.
    fn query_scalar(&self, sql: &str, params: &[Value]) -> Result<Value>;

    /// Run a statement, returning the affected row count.
    fn execute(&self, sql: &str, params: &[Value]) -> Result<usize>;

    /// Insert one row and return the generated key of `key_column`.
    fn insert_returning_key(
        &self,
        table: &str,
        key_column: &str,
        columns: &[String],
        values: &[Value],
    ) -> Result<Value>;

    fn dialect(&self) -> Dialect {
        Dialect::default()
    }
}

// =============================================================================
// SQLite reference implementation
// =============================================================================

/// [`SqlExecutor`] over an owned rusqlite connection.
pub struct SqliteExecutor {
    conn: Connection,
}

impl SqliteExecutor {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl SqlExecutor for SqliteExecutor {
    fn query_rows(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        debug!(sql, ?params, "query");
        let mut stmt = self.conn.prepare(sql).inspect_err(|e| log_failure(sql, e))?;
        let column_names: Vec<String> =
            stmt.column_names().iter().map(|n| n.to_string()).collect();

        let mut rows = Vec::new();
        let mut result = stmt
            .query(rusqlite::params_from_iter(params.iter()))
            .inspect_err(|e| log_failure(sql, e))?;
        while let Some(raw) = result.next().inspect_err(|e| log_failure(sql, e))? {
            let mut row = Row::new();
            for (idx, name) in column_names.iter().enumerate() {
                row.push(name.clone(), value_from_ref(raw.get_ref(idx)?)?);
            }
            rows.push(row);
        }
        Ok(rows)
    }

    fn query_scalar(&self, sql: &str, params: &[Value]) -> Result<Value> {
        debug!(sql, ?params, "query scalar");
        let mut stmt = self.conn.prepare(sql).inspect_err(|e| log_failure(sql, e))?;
        let mut result = stmt
            .query(rusqlite::params_from_iter(params.iter()))
            .inspect_err(|e| log_failure(sql, e))?;
        match result.next()? {
            Some(row) => value_from_ref(row.get_ref(0)?),
            None => Ok(Value::Null),
        }
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<usize> {
        debug!(sql, ?params, "execute");
        self.conn
            .execute(sql, rusqlite::params_from_iter(params.iter()))
            .inspect_err(|e| log_failure(sql, e))
            .map_err(Error::from)
    }

    fn insert_returning_key(
        &self,
        table: &str,
        key_column: &str,
        columns: &[String],
        values: &[Value],
    ) -> Result<Value> {
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {table} ({}) VALUES ({placeholders})",
            columns.join(", ")
        );
        debug!(sql, ?values, key_column, "insert");
        self.conn
            .execute(&sql, rusqlite::params_from_iter(values.iter()))
            .inspect_err(|e| log_failure(&sql, e))?;
        Ok(Value::Integer(self.conn.last_insert_rowid()))
    }
}

fn log_failure(sql: &str, err: &rusqlite::Error) {
    error!(sql, %err, "statement failed");
}

fn value_from_ref(value: ValueRef<'_>) -> Result<Value> {
    match value {
        ValueRef::Null => Ok(Value::Null),
        ValueRef::Integer(i) => Ok(Value::Integer(i)),
        ValueRef::Real(r) => Ok(Value::Real(r)),
        ValueRef::Text(t) => Ok(Value::Text(String::from_utf8_lossy(t).into_owned())),
        ValueRef::Blob(_) => Err(Error::Execution(
            "blob columns are not supported".to_string(),
        )),
    }
}

impl rusqlite::ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqliteValue::Null),
            Value::Bool(b) => ToSqlOutput::Owned(SqliteValue::Integer(i64::from(*b))),
            Value::Integer(i) => ToSqlOutput::Owned(SqliteValue::Integer(*i)),
            Value::Real(r) => ToSqlOutput::Owned(SqliteValue::Real(*r)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::DateTime(d) => {
                ToSqlOutput::Owned(SqliteValue::Text(d.format(DATETIME_FORMAT).to_string()))
            }
        })
    }
}
