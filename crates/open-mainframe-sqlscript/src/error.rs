//! Error types for script parsing and execution.
//!
//! [`SqlError`] is the driver-level descriptor reported by a
//! [`SqlConnection`](crate::connection::SqlConnection). [`ParseError`] covers
//! lexical and nesting failures found before anything runs. [`ScriptError`]
//! is what a script reports as its last error.

use std::fmt;

use miette::Diagnostic;
use thiserror::Error;

use crate::config::ConfigError;

// ---------------------------------------------------------------------------
// Driver errors
// ---------------------------------------------------------------------------

/// Category of a driver-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlErrorKind {
    /// The connection is unusable (closed, unreachable, not configured).
    Connection,
    /// A statement was rejected by the database.
    Statement,
    /// BEGIN, COMMIT or ROLLBACK failed.
    Transaction,
    /// Anything the driver could not classify.
    Unknown,
}

impl fmt::Display for SqlErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connection => "connection",
            Self::Statement => "statement",
            Self::Transaction => "transaction",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Error descriptor returned by a database connection.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
#[error("{kind} error (SQLCODE {sqlcode}, SQLSTATE {sqlstate}): {message}")]
pub struct SqlError {
    /// Failure category.
    pub kind: SqlErrorKind,
    /// Native driver code (negative for errors, DB2 style).
    pub sqlcode: i32,
    /// Five character SQLSTATE.
    pub sqlstate: String,
    /// Driver or database message text.
    pub message: String,
}

impl SqlError {
    /// Generic SQLSTATE used when the driver does not supply one.
    pub const GENERAL_STATE: &'static str = "HY000";

    /// Create an error of the given kind with the general SQLSTATE.
    pub fn new(kind: SqlErrorKind, sqlcode: i32, message: impl Into<String>) -> Self {
        Self {
            kind,
            sqlcode,
            sqlstate: Self::GENERAL_STATE.to_string(),
            message: message.into(),
        }
    }

    /// A statement failure.
    pub fn statement(sqlcode: i32, message: impl Into<String>) -> Self {
        Self::new(SqlErrorKind::Statement, sqlcode, message)
    }

    /// A transaction primitive failure.
    pub fn transaction(message: impl Into<String>) -> Self {
        Self::new(SqlErrorKind::Transaction, -1, message)
    }

    /// A connection failure.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(SqlErrorKind::Connection, -30081, message)
    }

    /// Replace the SQLSTATE.
    pub fn with_sqlstate(mut self, sqlstate: &str) -> Self {
        self.sqlstate = sqlstate.to_string();
        self
    }
}

// ---------------------------------------------------------------------------
// Parse errors
// ---------------------------------------------------------------------------

/// Failure detected while splitting or assembling a script.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum ParseError {
    /// A quoted literal runs to end of input.
    #[error("line {line}: unterminated {quote} literal")]
    #[diagnostic(code(sqlscript::unterminated_quote))]
    UnterminatedQuote {
        /// Line where the literal opened.
        line: usize,
        /// The quote character.
        quote: char,
    },

    /// A block comment runs to end of input.
    #[error("line {line}: unterminated block comment")]
    #[diagnostic(code(sqlscript::unterminated_comment))]
    UnterminatedComment {
        /// Line where the comment opened.
        line: usize,
    },

    /// A closing or continuation directive with no matching opener.
    #[error("line {line}: '{directive}' without matching '{expected}'")]
    #[diagnostic(code(sqlscript::unmatched_directive))]
    Unmatched {
        /// Line of the offending directive.
        line: usize,
        /// The offending directive keyword.
        directive: String,
        /// What had to be open for it to be valid.
        expected: String,
    },

    /// A block left open when input ended.
    #[error("line {line}: '{directive}' is never closed")]
    #[diagnostic(code(sqlscript::unclosed_block), help("add the matching closing directive"))]
    Unclosed {
        /// Line of the opening directive.
        line: usize,
        /// The opening directive keyword.
        directive: String,
    },

    /// A second `else` in one if-chain, or `elseif` after `else`.
    #[error("line {line}: '{directive}' after 'else' in the same if-chain")]
    #[diagnostic(code(sqlscript::else_after_else))]
    AfterElse {
        /// Line of the offending directive.
        line: usize,
        /// The offending directive keyword.
        directive: String,
    },

    /// `if`/`elseif` with no expression.
    #[error("line {line}: '{directive}' requires a condition")]
    #[diagnostic(code(sqlscript::missing_condition))]
    MissingCondition {
        /// Line of the offending directive.
        line: usize,
        /// The offending directive keyword.
        directive: String,
    },

    /// A scope directive crosses an open `begin` block.
    #[error("line {line}: '{directive}' inside an open 'begin' block started at line {begin_line}")]
    #[diagnostic(
        code(sqlscript::open_transaction),
        help("close the block with 'endtransaction' first")
    )]
    OpenTransaction {
        /// Line of the offending directive.
        line: usize,
        /// The offending directive keyword.
        directive: String,
        /// Line of the open `begin`.
        begin_line: usize,
    },
}

impl ParseError {
    /// Source line the error refers to.
    pub fn line(&self) -> usize {
        match self {
            Self::UnterminatedQuote { line, .. }
            | Self::UnterminatedComment { line }
            | Self::Unmatched { line, .. }
            | Self::Unclosed { line, .. }
            | Self::AfterElse { line, .. }
            | Self::MissingCondition { line, .. }
            | Self::OpenTransaction { line, .. } => *line,
        }
    }
}

// ---------------------------------------------------------------------------
// Script errors
// ---------------------------------------------------------------------------

/// Transaction primitive named in a [`ScriptError::Transaction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionOp {
    Begin,
    Commit,
    Rollback,
}

impl fmt::Display for TransactionOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Begin => "begin",
            Self::Commit => "commit",
            Self::Rollback => "rollback",
        };
        f.write_str(name)
    }
}

/// Last error recorded by a script run.
#[derive(Debug, Error, Diagnostic)]
pub enum ScriptError {
    /// The script did not assemble.
    #[error("parse error: {0}")]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),

    /// A statement failed on the connection.
    #[error("SQL error: {0}")]
    Sql(#[source] SqlError),

    /// Begin, commit or rollback failed.
    #[error("{op} failed: {source}")]
    #[diagnostic(code(sqlscript::transaction))]
    Transaction {
        /// The primitive that failed.
        op: TransactionOp,
        /// Driver error.
        source: SqlError,
    },

    /// The script was built without a connection.
    #[error("no database connection")]
    #[diagnostic(
        code(sqlscript::no_connection),
        help("construct the script with a connection before calling exec")
    )]
    NoConnection,

    /// The script configuration was rejected.
    #[error("configuration error: {0}")]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    /// Reading the script source failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScriptError {
    /// Driver-level descriptor, when the failure came from the connection.
    pub fn sql_error(&self) -> Option<&SqlError> {
        match self {
            Self::Sql(err) | Self::Transaction { source: err, .. } => Some(err),
            _ => None,
        }
    }

    /// Whether this is a parse failure.
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse(_))
    }
}

impl From<SqlError> for ScriptError {
    fn from(err: SqlError) -> Self {
        Self::Sql(err)
    }
}

/// Result type for script operations.
pub type ScriptResult<T> = Result<T, ScriptError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_error_display() {
        let err = SqlError::statement(-204, "T1 is an undefined name").with_sqlstate("42704");
        assert_eq!(
            err.to_string(),
            "statement error (SQLCODE -204, SQLSTATE 42704): T1 is an undefined name"
        );
    }

    #[test]
    fn test_sql_error_default_state() {
        let err = SqlError::transaction("already in a transaction");
        assert_eq!(err.sqlstate, "HY000");
        assert_eq!(err.kind, SqlErrorKind::Transaction);
    }

    #[test]
    fn test_parse_error_line() {
        let err = ParseError::Unmatched {
            line: 7,
            directive: "endif".into(),
            expected: "if".into(),
        };
        assert_eq!(err.line(), 7);
        assert_eq!(err.to_string(), "line 7: 'endif' without matching 'if'");
    }

    #[test]
    fn test_script_error_sql_descriptor() {
        let err = ScriptError::Transaction {
            op: TransactionOp::Commit,
            source: SqlError::transaction("deadlock"),
        };
        assert_eq!(err.sql_error().map(|e| e.message.as_str()), Some("deadlock"));
        assert!(ScriptError::NoConnection.sql_error().is_none());
        assert_eq!(err.to_string(), "commit failed: transaction error (SQLCODE -1, SQLSTATE HY000): deadlock");
    }

    #[test]
    fn test_script_error_from_parse() {
        let err: ScriptError = ParseError::UnterminatedComment { line: 3 }.into();
        assert!(err.is_parse());
    }
}
