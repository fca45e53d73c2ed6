//! SQ-103: Program executor.
//!
//! Walks an assembled [`Program`] against a [`SqlConnection`]. A scope stack
//! tracks open if-chains, try-scopes and `begin` blocks. A failing statement
//! unwinds the stack to the nearest try-scope still in its body, rolling back
//! every transaction the executor opened on the way, and resumes at that
//! scope's `catch`. A rollback that fails during unwinding replaces the
//! failure being unwound. With nothing to catch it, the run halts.

use tracing::{debug, error, info, warn};

use crate::connection::{parse_literal, SqlConnection};
use crate::error::{ScriptError, TransactionOp};
use crate::program::{Program, Statement, StatementKind};

/// Terminal classification of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Outcome {
    /// `exec` has not been called.
    #[default]
    NotRun,
    Success,
    /// The program did not assemble; the connection was not touched.
    ParseError,
    /// A statement or transaction primitive failed and nothing caught it.
    RuntimeError,
}

/// Counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecStats {
    /// Statements dispatched, directives included.
    pub statements: usize,
    /// SQL statements that completed successfully.
    pub sql_statements: usize,
    /// Failures transferred to a `catch`.
    pub recovered_errors: usize,
    /// Sum of rows affected reported by the connection.
    pub rows_affected: u64,
}

/// Everything a run leaves behind.
#[derive(Debug)]
pub struct RunReport {
    pub outcome: Outcome,
    pub error: Option<ScriptError>,
    /// Text of the statement that produced `error`; empty if none.
    pub error_statement: String,
    pub stats: ExecStats,
    /// Messages emitted by `debug` directives, in order.
    pub debug_messages: Vec<String>,
}

impl RunReport {
    fn new(outcome: Outcome) -> Self {
        Self {
            outcome,
            error: None,
            error_statement: String::new(),
            stats: ExecStats::default(),
            debug_messages: Vec::new(),
        }
    }
}

/// Open scope at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    /// An if-chain; `taken` once one of its bodies has been entered.
    Conditional { taken: bool },
    /// A try-scope with the index of its `catch`.
    Try {
        transactional: bool,
        catch: usize,
        catching: bool,
    },
    /// A `begin` block.
    Transaction,
}

/// Where to go after a statement.
enum Flow {
    Next,
    Jump(usize),
}

/// Single-use interpreter for one run of a program.
pub struct Executor<'a, C: SqlConnection> {
    program: &'a Program,
    conn: Option<&'a mut C>,
    marker: &'a str,
    stack: Vec<Scope>,
    stats: ExecStats,
    debug_messages: Vec<String>,
}

impl<'a, C: SqlConnection> Executor<'a, C> {
    /// Create an executor. `marker` is used only to render directive text in reports.
    pub fn new(program: &'a Program, conn: Option<&'a mut C>, marker: &'a str) -> Self {
        Self {
            program,
            conn,
            marker,
            stack: Vec::new(),
            stats: ExecStats::default(),
            debug_messages: Vec::new(),
        }
    }

    /// Run the program to completion or to its first unrecovered failure.
    pub fn run(mut self, use_outer_transaction: bool) -> RunReport {
        let program = self.program;

        if !program.is_executable() {
            let mut report = RunReport::new(Outcome::ParseError);
            report.error = program.parse_error().cloned().map(ScriptError::Parse);
            report.error_statement = program
                .statements()
                .last()
                .map(|s| s.text.clone())
                .unwrap_or_default();
            error!(statement = %report.error_statement, "script not executed: parse error");
            return report;
        }

        info!(
            statements = program.len(),
            outer_transaction = use_outer_transaction,
            "script run started"
        );

        if use_outer_transaction {
            if let Err(err) = self.begin() {
                return self.halt(err, String::new(), false);
            }
        }

        let mut pc = 0;
        while let Some(stmt) = program.get(pc) {
            self.stats.statements += 1;
            let flow = match self.step(pc, stmt) {
                Ok(flow) => flow,
                Err(err) => match self.recover(err) {
                    Ok(catch) => {
                        self.stats.recovered_errors += 1;
                        Flow::Jump(catch)
                    }
                    Err(err) => {
                        let text = self.describe(stmt);
                        return self.halt(err, text, use_outer_transaction);
                    }
                },
            };
            pc = match flow {
                Flow::Next => pc + 1,
                Flow::Jump(target) => target,
            };
        }

        if use_outer_transaction {
            if let Err(err) = self.commit_or_rollback() {
                return self.halt(err, String::new(), false);
            }
        }

        info!(
            statements = self.stats.statements,
            rows_affected = self.stats.rows_affected,
            recovered = self.stats.recovered_errors,
            "script run finished"
        );
        self.finish(Outcome::Success)
    }

    fn finish(self, outcome: Outcome) -> RunReport {
        let mut report = RunReport::new(outcome);
        report.stats = self.stats;
        report.debug_messages = self.debug_messages;
        report
    }

    /// Stop with a runtime error. Scopes have already been unwound.
    ///
    /// `err` stays the reported error even if the outer rollback fails.
    fn halt(mut self, err: ScriptError, statement: String, rollback_outer: bool) -> RunReport {
        if rollback_outer {
            self.rollback_after(&err);
        }
        error!(error = %err, statement = %statement, "script run failed");
        let mut report = self.finish(Outcome::RuntimeError);
        report.error = Some(err);
        report.error_statement = statement;
        report
    }

    fn describe(&self, stmt: &Statement) -> String {
        match stmt.kind {
            StatementKind::PlainSql | StatementKind::ParseError => stmt.text.clone(),
            kind if stmt.text.is_empty() => format!("{}{}", self.marker, kind),
            kind => format!("{}{} {}", self.marker, kind, stmt.text),
        }
    }

    fn connection(&mut self) -> Result<&mut C, ScriptError> {
        self.conn.as_deref_mut().ok_or(ScriptError::NoConnection)
    }

    fn begin(&mut self) -> Result<(), ScriptError> {
        self.connection()?
            .begin_transaction()
            .map_err(|source| ScriptError::Transaction {
                op: TransactionOp::Begin,
                source,
            })
    }

    fn commit(&mut self) -> Result<(), ScriptError> {
        self.connection()?
            .commit()
            .map_err(|source| ScriptError::Transaction {
                op: TransactionOp::Commit,
                source,
            })
    }

    fn rollback(&mut self) -> Result<(), ScriptError> {
        self.connection()?
            .rollback()
            .map_err(|source| ScriptError::Transaction {
                op: TransactionOp::Rollback,
                source,
            })
    }

    /// Commit, rolling back if the commit itself fails. The commit error is returned.
    fn commit_or_rollback(&mut self) -> Result<(), ScriptError> {
        match self.commit() {
            Ok(()) => Ok(()),
            Err(err) => {
                self.rollback_after(&err);
                Err(err)
            }
        }
    }

    /// Roll back after `cause` has already been recorded; a rollback failure is only logged.
    fn rollback_after(&mut self, cause: &ScriptError) {
        if let Err(err) = self.rollback() {
            warn!(error = %err, cause = %cause, "rollback failed");
        }
    }

    /// Unwind to the nearest try-scope still in its body and mark it catching.
    ///
    /// Returns the index of its `catch`, or the error to halt with when
    /// nothing catches. A failed rollback becomes the error being unwound.
    fn recover(&mut self, mut err: ScriptError) -> Result<usize, ScriptError> {
        while let Some(scope) = self.stack.pop() {
            match scope {
                Scope::Conditional { .. } => {}
                Scope::Try { catching: true, .. } => {}
                Scope::Transaction => {
                    if let Err(rollback_err) = self.rollback() {
                        warn!(error = %rollback_err, cause = %err, "rollback failed while unwinding");
                        err = rollback_err;
                    }
                }
                Scope::Try {
                    transactional,
                    catch,
                    catching: false,
                } => {
                    if transactional {
                        if let Err(rollback_err) = self.rollback() {
                            warn!(error = %rollback_err, cause = %err, "rollback failed while unwinding");
                            err = rollback_err;
                            continue;
                        }
                    }
                    self.stack.push(Scope::Try {
                        transactional,
                        catch,
                        catching: true,
                    });
                    warn!(
                        error = %err,
                        catch_line = self.program.get(catch).map_or(0, |s| s.line),
                        "statement failed; continuing at catch"
                    );
                    return Ok(catch);
                }
            }
        }
        Err(err)
    }

    /// Only a failing condition query counts as false; a missing connection is an error.
    fn evaluate(&mut self, stmt: &Statement) -> Result<bool, ScriptError> {
        if let Some(value) = parse_literal(&stmt.text) {
            return Ok(value);
        }
        match self.connection()?.execute(&stmt.text) {
            Ok(result) => Ok(result.is_truthy()),
            Err(err) => {
                debug!(line = stmt.line, error = %err, "condition failed; treated as false");
                Ok(false)
            }
        }
    }

    fn top_conditional(&mut self) -> Option<&mut bool> {
        match self.stack.last_mut() {
            Some(Scope::Conditional { taken }) => Some(taken),
            _ => None,
        }
    }

    fn step(&mut self, pc: usize, stmt: &Statement) -> Result<Flow, ScriptError> {
        debug!(index = pc, line = stmt.line, kind = %stmt.kind, "dispatch");
        let target = stmt.target.unwrap_or(self.program.len());

        match stmt.kind {
            StatementKind::PlainSql => {
                let result = self.connection()?.execute(&stmt.text)?;
                self.stats.sql_statements += 1;
                self.stats.rows_affected += result.rows_affected;
                Ok(Flow::Next)
            }

            StatementKind::If => {
                let taken = self.evaluate(stmt)?;
                debug!(line = stmt.line, taken, "if");
                self.stack.push(Scope::Conditional { taken });
                Ok(if taken { Flow::Next } else { Flow::Jump(target) })
            }

            StatementKind::ElseIf => {
                if self.top_conditional().is_some_and(|taken| *taken) {
                    return Ok(Flow::Jump(target));
                }
                let taken = self.evaluate(stmt)?;
                debug!(line = stmt.line, taken, "elseif");
                if let Some(flag) = self.top_conditional() {
                    *flag = taken;
                }
                Ok(if taken { Flow::Next } else { Flow::Jump(target) })
            }

            StatementKind::Else => match self.top_conditional() {
                Some(taken) if *taken => Ok(Flow::Jump(target)),
                Some(taken) => {
                    *taken = true;
                    Ok(Flow::Next)
                }
                None => Ok(Flow::Next),
            },

            StatementKind::EndIf => {
                if self.top_conditional().is_some() {
                    self.stack.pop();
                }
                Ok(Flow::Next)
            }

            StatementKind::Try | StatementKind::TryTransaction => {
                let transactional = stmt.kind == StatementKind::TryTransaction;
                if transactional {
                    self.begin()?;
                }
                self.stack.push(Scope::Try {
                    transactional,
                    catch: target,
                    catching: false,
                });
                Ok(Flow::Next)
            }

            StatementKind::Catch => match self.stack.last() {
                // Body finished without failing: skip the handler.
                Some(Scope::Try {
                    catching: false, ..
                }) => Ok(Flow::Jump(target)),
                _ => Ok(Flow::Next),
            },

            StatementKind::EndTry => {
                if let Some(Scope::Try {
                    transactional,
                    catching,
                    ..
                }) = self.stack.pop()
                {
                    if transactional && !catching {
                        self.commit_or_rollback()?;
                    }
                }
                Ok(Flow::Next)
            }

            StatementKind::Begin => {
                self.begin()?;
                self.stack.push(Scope::Transaction);
                Ok(Flow::Next)
            }

            StatementKind::EndTransaction => {
                if self.stack.last() == Some(&Scope::Transaction) {
                    self.stack.pop();
                }
                self.commit_or_rollback()?;
                Ok(Flow::Next)
            }

            StatementKind::Debug => {
                info!(target: "sqlscript::debug", line = stmt.line, "{}", stmt.text);
                self.debug_messages.push(stmt.text.clone());
                Ok(Flow::Next)
            }

            StatementKind::ParseError => {
                unreachable!("programs ending in a parse error are never executed")
            }
        }
    }
}
