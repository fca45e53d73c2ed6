//! SQ-102: Program model.
//!
//! A [`Program`] is the immutable, jump-resolved statement sequence the
//! executor runs. Branch and scope directives refer to each other by index
//! into the same sequence.

use std::fmt;

use crate::error::ParseError;

/// What a statement does when executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    /// Ordinary SQL sent to the connection.
    PlainSql,
    If,
    ElseIf,
    Else,
    EndIf,
    Try,
    TryTransaction,
    Catch,
    EndTry,
    Begin,
    EndTransaction,
    Debug,
    /// Terminal marker for a script that failed to assemble.
    ParseError,
}

impl StatementKind {
    /// All directive kinds paired with their keyword.
    pub const DIRECTIVES: [(&'static str, StatementKind); 11] = [
        ("if", StatementKind::If),
        ("elseif", StatementKind::ElseIf),
        ("else", StatementKind::Else),
        ("endif", StatementKind::EndIf),
        ("try", StatementKind::Try),
        ("trytransaction", StatementKind::TryTransaction),
        ("catch", StatementKind::Catch),
        ("endtry", StatementKind::EndTry),
        ("begin", StatementKind::Begin),
        ("endtransaction", StatementKind::EndTransaction),
        ("debug", StatementKind::Debug),
    ];

    /// Look up a directive keyword (case-insensitive).
    pub fn from_keyword(word: &str) -> Option<Self> {
        Self::DIRECTIVES
            .iter()
            .find(|(kw, _)| kw.eq_ignore_ascii_case(word))
            .map(|(_, kind)| *kind)
    }

    /// Directive keyword, or a descriptive name for non-directives.
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::PlainSql => "sql",
            Self::ParseError => "parse-error",
            other => Self::DIRECTIVES
                .iter()
                .find(|(_, kind)| kind == other)
                .map(|(kw, _)| *kw)
                .unwrap_or("?"),
        }
    }

    /// Whether this kind is a directive line.
    pub fn is_directive(&self) -> bool {
        !matches!(self, Self::PlainSql | Self::ParseError)
    }

    /// Whether the assembler resolves a jump target for this kind.
    pub fn has_target(&self) -> bool {
        matches!(
            self,
            Self::If
                | Self::ElseIf
                | Self::Else
                | Self::Try
                | Self::TryTransaction
                | Self::Catch
        )
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// One executable unit of a program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// SQL text, or the directive's expression/label text (may be empty).
    pub text: String,
    /// Statement kind.
    pub kind: StatementKind,
    /// Resolved jump target; `None` for statements that do not branch.
    pub target: Option<usize>,
    /// 1-based source line where the statement starts.
    pub line: usize,
}

impl Statement {
    /// Create a statement with no target.
    pub fn new(kind: StatementKind, text: impl Into<String>, line: usize) -> Self {
        Self {
            text: text.into(),
            kind,
            target: None,
            line,
        }
    }
}

/// Immutable, jump-resolved statement sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    statements: Vec<Statement>,
    parse_error: Option<ParseError>,
}

impl Program {
    pub(crate) fn from_parts(statements: Vec<Statement>, parse_error: Option<ParseError>) -> Self {
        Self {
            statements,
            parse_error,
        }
    }

    /// All statements in order.
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// Statement at `index`.
    pub fn get(&self, index: usize) -> Option<&Statement> {
        self.statements.get(index)
    }

    /// Number of statements, including a trailing parse-error marker.
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// The failure that truncated this program, if any.
    pub fn parse_error(&self) -> Option<&ParseError> {
        self.parse_error.as_ref()
    }

    /// Whether the program assembled cleanly and may be executed.
    pub fn is_executable(&self) -> bool {
        self.statements
            .last()
            .map_or(true, |s| s.kind != StatementKind::ParseError)
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, stmt) in self.statements.iter().enumerate() {
            let target = stmt
                .target
                .map(|t| format!("-> {t}"))
                .unwrap_or_default();
            let text = stmt.text.replace('\n', " ");
            writeln!(
                f,
                "{index:>4}  {:>4}  {:<14} {:<8} {}",
                stmt.line,
                stmt.kind.keyword(),
                target,
                text
            )?;
        }
        Ok(())
    }
}
