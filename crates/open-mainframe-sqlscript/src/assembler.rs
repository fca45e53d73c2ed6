//! SQ-101: Directive assembler.
//!
//! Single left-to-right pass over the splitter's fragments. An explicit
//! nesting stack validates `if`/`try`/`begin` blocks and patches each branch
//! directive's target with the index of its next sibling:
//!
//! - `if` / `elseif` / `else` → next `elseif` / `else` / `endif` of the chain
//! - `try` / `trytransaction` → its `catch`
//! - `catch` → its `endtry`
//!
//! The first violation appends a single [`StatementKind::ParseError`]
//! statement and stops; nothing after it is assembled.

use tracing::debug;

use crate::config::ScriptConfig;
use crate::error::ParseError;
use crate::lexer::{Fragment, FragmentKind};
use crate::program::{Program, Statement, StatementKind};

/// Open block on the nesting stack.
#[derive(Debug)]
enum Frame {
    /// An if-chain; `open` is the member whose target is still unpatched.
    IfChain { open: usize, has_else: bool },
    /// A try-scope; `catch` is set once its `catch` is seen.
    TryScope { opener: usize, catch: Option<usize> },
    /// A `begin` ... `endtransaction` block.
    Transaction { begin: usize },
}

/// Assemble fragments into a program.
pub fn assemble(fragments: Vec<Fragment>, config: &ScriptConfig) -> Program {
    let mut assembler = Assembler {
        statements: Vec::with_capacity(fragments.len()),
        sources: Vec::with_capacity(fragments.len()),
        stack: Vec::new(),
        require_conditions: config.require_conditions,
    };

    for fragment in fragments {
        if let Err((err, raw)) = assembler.push(fragment) {
            return assembler.abort(err, raw);
        }
    }

    if let Some(frame) = assembler.stack.pop() {
        let opener = match frame {
            Frame::IfChain { open, .. } => assembler.chain_head(open),
            Frame::TryScope { opener, .. } => opener,
            Frame::Transaction { begin } => begin,
        };
        let stmt = &assembler.statements[opener];
        let err = ParseError::Unclosed {
            line: stmt.line,
            directive: stmt.kind.keyword().to_string(),
        };
        let raw = assembler.sources[opener].clone();
        return assembler.abort(err, raw);
    }

    debug!(statements = assembler.statements.len(), "script assembled");
    Program::from_parts(assembler.statements, None)
}

struct Assembler {
    statements: Vec<Statement>,
    /// Source text of each statement as written, parallel to `statements`.
    sources: Vec<String>,
    stack: Vec<Frame>,
    require_conditions: bool,
}

type Violation = (ParseError, String);

impl Assembler {
    fn abort(mut self, err: ParseError, raw: String) -> Program {
        debug!(error = %err, "script assembly failed");
        self.statements
            .push(Statement::new(StatementKind::ParseError, raw, err.line()));
        Program::from_parts(self.statements, Some(err))
    }

    /// Walk an if-chain back to its `if` for error reporting.
    fn chain_head(&self, mut index: usize) -> usize {
        while self.statements[index].kind != StatementKind::If {
            match self
                .statements
                .iter()
                .position(|s| s.target == Some(index))
            {
                Some(prev) => index = prev,
                None => break,
            }
        }
        index
    }

    fn push(&mut self, fragment: Fragment) -> Result<(), Violation> {
        let kind = match fragment.kind {
            FragmentKind::Sql => StatementKind::PlainSql,
            FragmentKind::Directive(kind) => kind,
            FragmentKind::Error(err) => return Err((err, fragment.raw)),
        };
        let index = self.statements.len();
        let line = fragment.line;
        let keyword = kind.keyword();

        let unmatched = |expected: &str| {
            (
                ParseError::Unmatched {
                    line,
                    directive: keyword.to_string(),
                    expected: expected.to_string(),
                },
                fragment.raw.clone(),
            )
        };

        match kind {
            StatementKind::PlainSql | StatementKind::Debug => {}

            StatementKind::If => {
                self.check_condition(&fragment, kind)?;
                self.stack.push(Frame::IfChain {
                    open: index,
                    has_else: false,
                });
            }

            StatementKind::ElseIf | StatementKind::Else => {
                self.check_open_transaction(&fragment, kind)?;
                match self.stack.last_mut() {
                    Some(Frame::IfChain { has_else: true, .. }) => {
                        return Err((
                            ParseError::AfterElse {
                                line,
                                directive: keyword.to_string(),
                            },
                            fragment.raw.clone(),
                        ));
                    }
                    Some(Frame::IfChain { open, has_else }) => {
                        let previous = *open;
                        *open = index;
                        *has_else = kind == StatementKind::Else;
                        self.statements[previous].target = Some(index);
                    }
                    _ => return Err(unmatched("if")),
                }
                if kind == StatementKind::ElseIf {
                    self.check_condition(&fragment, kind)?;
                }
            }

            StatementKind::EndIf => {
                self.check_open_transaction(&fragment, kind)?;
                match self.stack.last() {
                    Some(Frame::IfChain { open, .. }) => {
                        let open = *open;
                        self.statements[open].target = Some(index);
                        self.stack.pop();
                    }
                    _ => return Err(unmatched("if")),
                }
            }

            StatementKind::Try | StatementKind::TryTransaction => {
                self.stack.push(Frame::TryScope {
                    opener: index,
                    catch: None,
                });
            }

            StatementKind::Catch => {
                self.check_open_transaction(&fragment, kind)?;
                match self.stack.last_mut() {
                    Some(Frame::TryScope {
                        opener,
                        catch: catch @ None,
                    }) => {
                        *catch = Some(index);
                        let opener = *opener;
                        self.statements[opener].target = Some(index);
                    }
                    _ => return Err(unmatched("try")),
                }
            }

            StatementKind::EndTry => {
                self.check_open_transaction(&fragment, kind)?;
                match self.stack.last() {
                    Some(Frame::TryScope {
                        catch: Some(catch), ..
                    }) => {
                        let catch = *catch;
                        self.statements[catch].target = Some(index);
                        self.stack.pop();
                    }
                    _ => return Err(unmatched("catch")),
                }
            }

            StatementKind::Begin => {
                self.stack.push(Frame::Transaction { begin: index });
            }

            StatementKind::EndTransaction => match self.stack.last() {
                Some(Frame::Transaction { .. }) => {
                    self.stack.pop();
                }
                _ => return Err(unmatched("begin")),
            },

            StatementKind::ParseError => unreachable!("splitter never emits parse-error directives"),
        }

        self.sources.push(fragment.raw);
        self.statements
            .push(Statement::new(kind, fragment.text, line));
        Ok(())
    }

    fn check_condition(&self, fragment: &Fragment, kind: StatementKind) -> Result<(), Violation> {
        if self.require_conditions && fragment.text.trim().is_empty() {
            return Err((
                ParseError::MissingCondition {
                    line: fragment.line,
                    directive: kind.keyword().to_string(),
                },
                fragment.raw.clone(),
            ));
        }
        Ok(())
    }

    /// Chain and scope directives may not cross an open `begin` block.
    fn check_open_transaction(&self, fragment: &Fragment, kind: StatementKind) -> Result<(), Violation> {
        if let Some(Frame::Transaction { begin }) = self.stack.last() {
            return Err((
                ParseError::OpenTransaction {
                    line: fragment.line,
                    directive: kind.keyword().to_string(),
                    begin_line: self.statements[*begin].line,
                },
                fragment.raw.clone(),
            ));
        }
        Ok(())
    }
}
