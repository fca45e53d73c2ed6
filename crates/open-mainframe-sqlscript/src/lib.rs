#![forbid(unsafe_code)]
//! SQL script runner with embedded control-flow directives.
//!
//! Scripts are ordinary SQL interleaved with directive lines:
//!
//! ```text
//! --trytransaction
//! UPDATE accounts SET balance = balance - 10 WHERE id = 1;
//! UPDATE accounts SET balance = balance + 10 WHERE id = 2;
//! --catch
//! --debug transfer failed, rolled back
//! --endtry
//! --if SELECT COUNT(*) FROM audit
//! INSERT INTO audit_log VALUES ('ran');
//! --endif
//! ```
//!
//! This crate provides:
//!
//! - **Splitter** (SQ-100) — statement and directive fragments, quote and comment aware
//! - **Assembler** (SQ-101) — nesting validation and jump-target resolution
//! - **Program** (SQ-102) — immutable, index-linked statement sequence
//! - **Executor** (SQ-103) — scope stack, try/catch recovery, transaction unwinding
//! - **Connection** (SQ-104) — pluggable [`SqlConnection`] trait with a mock
//! - **Script** (SQ-105) — [`SqlScript`] facade with last-error reporting

pub mod assembler;
pub mod config;
pub mod connection;
pub mod error;
pub mod executor;
pub mod lexer;
pub mod program;
pub mod script;

pub use assembler::assemble;
pub use config::{ConfigError, ScriptConfig};
pub use connection::{parse_literal, Call, MockConnection, QueryResult, SqlConnection, SqlValue};
pub use error::{
    ParseError, ScriptError, ScriptResult, SqlError, SqlErrorKind, TransactionOp,
};
pub use executor::{ExecStats, Executor, Outcome, RunReport};
pub use lexer::{split, Fragment, FragmentKind};
pub use program::{Program, Statement, StatementKind};
pub use script::SqlScript;
