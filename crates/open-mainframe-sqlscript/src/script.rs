//! SQ-105: Script facade.
//!
//! [`SqlScript`] assembles its program once at construction and runs it on
//! demand. The outcome of the last run stays queryable afterwards.

use std::io::Read;

use crate::assembler::assemble;
use crate::config::ScriptConfig;
use crate::connection::SqlConnection;
use crate::error::{ScriptError, ScriptResult};
use crate::executor::{ExecStats, Executor, Outcome};
use crate::lexer::split;
use crate::program::Program;

/// A SQL script with control-flow directives, bound to a connection.
///
/// ```
/// use open_mainframe_sqlscript::{MockConnection, SqlScript};
///
/// let mut conn = MockConnection::new().failing("missing_table");
/// let mut script = SqlScript::new(
///     "--try\nDELETE FROM missing_table;\n--catch\nSELECT 'handled';\n--endtry",
///     &mut conn,
/// );
/// assert!(script.exec(false));
/// assert!(script.last_error().is_none());
/// ```
#[derive(Debug)]
pub struct SqlScript<C> {
    program: Program,
    config: ScriptConfig,
    connection: Option<C>,
    outcome: Outcome,
    last_error: Option<ScriptError>,
    last_error_statement: String,
    stats: ExecStats,
    debug_messages: Vec<String>,
}

impl<C: SqlConnection> SqlScript<C> {
    /// Assemble `source` with the default configuration.
    pub fn new(source: &str, connection: C) -> Self {
        Self::build(source, Some(connection), ScriptConfig::default())
    }

    /// Assemble `source` with a custom configuration, rejecting invalid settings.
    pub fn with_config(source: &str, connection: C, config: ScriptConfig) -> ScriptResult<Self> {
        config.validate()?;
        Ok(Self::build(source, Some(connection), config))
    }

    /// Assemble a script whose runs fail at the first connection use.
    pub fn without_connection(source: &str) -> Self {
        Self::build(source, None, ScriptConfig::default())
    }

    /// Read the whole of `reader` as UTF-8 and assemble it.
    pub fn from_reader<R: Read>(reader: R, connection: C) -> ScriptResult<Self> {
        Self::from_reader_with_config(reader, connection, ScriptConfig::default())
    }

    /// [`from_reader`](Self::from_reader) with a custom configuration.
    pub fn from_reader_with_config<R: Read>(
        mut reader: R,
        connection: C,
        config: ScriptConfig,
    ) -> ScriptResult<Self> {
        config.validate()?;
        let mut source = String::new();
        reader.read_to_string(&mut source)?;
        Ok(Self::build(&source, Some(connection), config))
    }

    fn build(source: &str, connection: Option<C>, config: ScriptConfig) -> Self {
        let program = assemble(split(source, &config), &config);
        Self {
            program,
            config,
            connection,
            outcome: Outcome::NotRun,
            last_error: None,
            last_error_statement: String::new(),
            stats: ExecStats::default(),
            debug_messages: Vec::new(),
        }
    }

    /// Run the script. With `use_outer_transaction`, the whole run is wrapped
    /// in one transaction that is rolled back on any unrecovered failure.
    ///
    /// Returns `true` when the run succeeded. On `false`, [`last_error`](Self::last_error)
    /// and [`last_error_statement`](Self::last_error_statement) describe the failure.
    pub fn exec(&mut self, use_outer_transaction: bool) -> bool {
        let report = Executor::new(
            &self.program,
            self.connection.as_mut(),
            &self.config.directive_marker,
        )
        .run(use_outer_transaction);

        self.outcome = report.outcome;
        self.last_error = report.error;
        self.last_error_statement = report.error_statement;
        self.stats = report.stats;
        self.debug_messages = report.debug_messages;
        self.outcome == Outcome::Success
    }

    /// Error from the last run; `None` after success or before any run.
    pub fn last_error(&self) -> Option<&ScriptError> {
        self.last_error.as_ref()
    }

    /// Text of the statement behind [`last_error`](Self::last_error); empty if none.
    pub fn last_error_statement(&self) -> &str {
        &self.last_error_statement
    }

    /// Outcome of the last run.
    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    /// Counters from the last run.
    pub fn stats(&self) -> ExecStats {
        self.stats
    }

    /// Messages emitted by `debug` directives in the last run.
    pub fn debug_messages(&self) -> &[String] {
        &self.debug_messages
    }

    /// The assembled program.
    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn config(&self) -> &ScriptConfig {
        &self.config
    }

    /// The bound connection, if any.
    pub fn connection(&self) -> Option<&C> {
        self.connection.as_ref()
    }

    /// Give the connection back.
    pub fn into_connection(self) -> Option<C> {
        self.connection
    }
}
