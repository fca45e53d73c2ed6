//! SQ-104: Database connection boundary.
//!
//! Provides the [`SqlConnection`] trait a script runs against, the
//! [`QueryResult`] and [`SqlValue`] types a driver hands back, and a
//! [`MockConnection`] that records every call for testing.

use crate::error::SqlError;

// ---------------------------------------------------------------------------
// Values and results
// ---------------------------------------------------------------------------

/// A single column value returned by a driver.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL value
    Null,
    /// String value
    String(String),
    /// Integer value
    Integer(i64),
    /// Floating point value
    Float(f64),
    /// Boolean value
    Boolean(bool),
    /// Binary data
    Binary(Vec<u8>),
}

impl SqlValue {
    /// Check if value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Truthiness used by `if` conditions.
    ///
    /// NULL, zero, empty, `false`, `0` and `no`/`off` strings are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            SqlValue::Null => false,
            SqlValue::Integer(i) => *i != 0,
            SqlValue::Float(f) => *f != 0.0,
            SqlValue::Boolean(b) => *b,
            SqlValue::Binary(b) => !b.is_empty(),
            SqlValue::String(s) => parse_literal(s).unwrap_or(!s.trim().is_empty()),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self {
        SqlValue::String(s.to_string())
    }
}

impl From<i32> for SqlValue {
    fn from(i: i32) -> Self {
        SqlValue::Integer(i as i64)
    }
}

impl From<i64> for SqlValue {
    fn from(i: i64) -> Self {
        SqlValue::Integer(i)
    }
}

impl From<bool> for SqlValue {
    fn from(b: bool) -> Self {
        SqlValue::Boolean(b)
    }
}

/// Parse a boolean or numeric literal; `None` if `text` is neither.
pub fn parse_literal(text: &str) -> Option<bool> {
    let t = text.trim();
    match t.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" => return Some(true),
        "false" | "no" | "off" | "" => return Some(false),
        _ => {}
    }
    t.parse::<f64>().ok().map(|n| n != 0.0)
}

/// Outcome of a successful [`SqlConnection::execute`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Column names; empty for statements that return no rows.
    pub columns: Vec<String>,
    /// Row values in column order.
    pub rows: Vec<Vec<SqlValue>>,
    /// Rows affected by INSERT/UPDATE/DELETE.
    pub rows_affected: u64,
}

impl QueryResult {
    /// Result of a statement that returns no rows.
    pub fn affected(rows_affected: u64) -> Self {
        Self {
            rows_affected,
            ..Self::default()
        }
    }

    /// Result set with the given columns and rows.
    pub fn rows(columns: &[&str], rows: Vec<Vec<SqlValue>>) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
            rows_affected: 0,
        }
    }

    /// A one-row, one-column result.
    pub fn scalar(value: impl Into<SqlValue>) -> Self {
        Self::rows(&["VALUE"], vec![vec![value.into()]])
    }

    /// First column of the first row.
    pub fn first_value(&self) -> Option<&SqlValue> {
        self.rows.first().and_then(|row| row.first())
    }

    /// Whether this result selects a branch.
    ///
    /// A result set is true when its first value is truthy; a statement
    /// without columns is true when it affected at least one row.
    pub fn is_truthy(&self) -> bool {
        if self.columns.is_empty() && self.rows.is_empty() {
            return self.rows_affected > 0;
        }
        self.first_value().is_some_and(SqlValue::is_truthy)
    }
}

// ---------------------------------------------------------------------------
// Connection trait
// ---------------------------------------------------------------------------

/// The database capabilities a script needs.
///
/// Implement this for a driver handle to run scripts against a real database.
pub trait SqlConnection {
    /// Execute one SQL statement.
    fn execute(&mut self, sql: &str) -> Result<QueryResult, SqlError>;

    /// Begin a transaction.
    fn begin_transaction(&mut self) -> Result<(), SqlError>;

    /// Commit the current transaction.
    fn commit(&mut self) -> Result<(), SqlError>;

    /// Roll back the current transaction.
    fn rollback(&mut self) -> Result<(), SqlError>;
}

impl<T: SqlConnection + ?Sized> SqlConnection for &mut T {
    fn execute(&mut self, sql: &str) -> Result<QueryResult, SqlError> {
        (**self).execute(sql)
    }

    fn begin_transaction(&mut self) -> Result<(), SqlError> {
        (**self).begin_transaction()
    }

    fn commit(&mut self) -> Result<(), SqlError> {
        (**self).commit()
    }

    fn rollback(&mut self) -> Result<(), SqlError> {
        (**self).rollback()
    }
}

impl<T: SqlConnection + ?Sized> SqlConnection for Box<T> {
    fn execute(&mut self, sql: &str) -> Result<QueryResult, SqlError> {
        (**self).execute(sql)
    }

    fn begin_transaction(&mut self) -> Result<(), SqlError> {
        (**self).begin_transaction()
    }

    fn commit(&mut self) -> Result<(), SqlError> {
        (**self).commit()
    }

    fn rollback(&mut self) -> Result<(), SqlError> {
        (**self).rollback()
    }
}

// ---------------------------------------------------------------------------
// Mock connection
// ---------------------------------------------------------------------------

/// A call observed by [`MockConnection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Execute(String),
    Begin,
    Commit,
    Rollback,
}

/// Mock connection for testing.
///
/// Records every call in order, fails statements containing configured
/// fragments, and returns pre-configured results.
#[derive(Debug, Default)]
pub struct MockConnection {
    /// Every call, in order.
    pub calls: Vec<Call>,
    /// Results keyed by SQL text fragment; the first match in insertion order wins.
    pub results: Vec<(String, QueryResult)>,
    /// Failures keyed by SQL text fragment; checked before `results`.
    pub failures: Vec<(String, SqlError)>,
    /// Fail the next `begin_transaction` calls with this error.
    pub fail_begin: Option<SqlError>,
    /// Fail `commit` calls with this error.
    pub fail_commit: Option<SqlError>,
    /// Fail `rollback` calls with this error.
    pub fail_rollback: Option<SqlError>,
    /// Current transaction nesting depth.
    pub depth: usize,
}

impl MockConnection {
    /// Create a new mock connection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `result` for statements containing `sql_fragment`.
    pub fn add_result(&mut self, sql_fragment: &str, result: QueryResult) {
        self.results.push((sql_fragment.to_string(), result));
    }

    /// Fail statements containing `sql_fragment`.
    pub fn fail_on(&mut self, sql_fragment: &str, error: SqlError) {
        self.failures.push((sql_fragment.to_string(), error));
    }

    /// Builder form of [`fail_on`](Self::fail_on) with a generic statement error.
    pub fn failing(mut self, sql_fragment: &str) -> Self {
        self.fail_on(
            sql_fragment,
            SqlError::statement(-204, format!("{sql_fragment} failed")),
        );
        self
    }

    /// SQL texts executed, in order.
    pub fn executed(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Execute(sql) => Some(sql.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Number of calls matching `call`.
    pub fn count(&self, call: &Call) -> usize {
        self.calls.iter().filter(|c| *c == call).count()
    }
}

impl SqlConnection for MockConnection {
    fn execute(&mut self, sql: &str) -> Result<QueryResult, SqlError> {
        self.calls.push(Call::Execute(sql.to_string()));
        if let Some((_, err)) = self.failures.iter().find(|(f, _)| sql.contains(f.as_str())) {
            return Err(err.clone());
        }
        if let Some((_, result)) = self.results.iter().find(|(f, _)| sql.contains(f.as_str())) {
            return Ok(result.clone());
        }
        Ok(QueryResult::affected(1))
    }

    fn begin_transaction(&mut self) -> Result<(), SqlError> {
        self.calls.push(Call::Begin);
        if let Some(err) = &self.fail_begin {
            return Err(err.clone());
        }
        self.depth += 1;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), SqlError> {
        self.calls.push(Call::Commit);
        if let Some(err) = &self.fail_commit {
            return Err(err.clone());
        }
        self.depth = self.depth.saturating_sub(1);
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), SqlError> {
        self.calls.push(Call::Rollback);
        if let Some(err) = &self.fail_rollback {
            return Err(err.clone());
        }
        self.depth = self.depth.saturating_sub(1);
        Ok(())
    }
}
