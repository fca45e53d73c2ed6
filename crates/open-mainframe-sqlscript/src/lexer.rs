//! SQ-100: Script splitter.
//!
//! Breaks script text into SQL statement fragments and directive lines.
//! Terminators inside quoted literals and comments are not boundaries.
//! Fragments that hold only whitespace or comments are dropped.

use crate::config::ScriptConfig;
use crate::error::ParseError;
use crate::program::StatementKind;

/// Classification of a raw fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentKind {
    /// Plain SQL statement text.
    Sql,
    /// A directive line of the given kind.
    Directive(StatementKind),
    /// Lexical failure; always the last fragment.
    Error(ParseError),
}

/// One raw piece of a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub kind: FragmentKind,
    /// Statement text, or the directive's argument text.
    pub text: String,
    /// Source text as written (the whole directive line for directives).
    pub raw: String,
    /// 1-based starting line.
    pub line: usize,
}

impl Fragment {
    fn sql(text: String, line: usize) -> Self {
        Self {
            kind: FragmentKind::Sql,
            raw: text.clone(),
            text,
            line,
        }
    }
}

/// Split `source` into fragments using `config`'s lexical rules.
pub fn split(source: &str, config: &ScriptConfig) -> Vec<Fragment> {
    Splitter::new(source, config).run()
}

struct Splitter<'a> {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    config: &'a ScriptConfig,
    marker: Vec<char>,
    fragments: Vec<Fragment>,
    current: String,
    current_line: usize,
    has_content: bool,
    line_blank: bool,
}

impl<'a> Splitter<'a> {
    fn new(source: &str, config: &'a ScriptConfig) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            config,
            marker: config.directive_marker.chars().collect(),
            fragments: Vec::new(),
            current: String::new(),
            current_line: 1,
            has_content: false,
            line_blank: true,
        }
    }

    fn run(mut self) -> Vec<Fragment> {
        while self.pos < self.chars.len() {
            let ch = self.chars[self.pos];

            if (self.line_blank || !self.has_content) && self.starts_with(&self.marker) {
                if let Some(fragment) = self.directive_at(self.pos) {
                    self.flush();
                    self.fragments.push(fragment);
                    continue;
                }
            }

            if ch == '\n' {
                self.line += 1;
                self.line_blank = true;
                self.push_char(ch);
                self.pos += 1;
                continue;
            }

            if ch.is_whitespace() {
                self.push_char(ch);
                self.pos += 1;
                continue;
            }

            self.line_blank = false;

            if self.starts_with(&['-', '-']) {
                self.line_comment();
                continue;
            }

            let start = self.pos;
            let scanned = if self.starts_with(&['/', '*']) {
                Some(self.block_comment())
            } else if ch == '\'' || (ch == '"' && self.config.double_quoted_literals) {
                Some(self.quoted(ch))
            } else {
                None
            };
            match scanned {
                Some(Ok(())) => continue,
                Some(Err(err)) => {
                    self.fail(err, start);
                    return self.fragments;
                }
                None => {}
            }

            if ch == self.config.terminator {
                self.flush();
                self.pos += 1;
                continue;
            }

            self.mark_content();
            self.current.push(ch);
            self.pos += 1;
        }

        self.flush();
        self.fragments
    }

    fn starts_with(&self, pattern: &[char]) -> bool {
        !pattern.is_empty()
            && self.chars.len() >= self.pos + pattern.len()
            && self.chars[self.pos..self.pos + pattern.len()] == *pattern
    }

    /// Whitespace and comments before the first real character are not kept.
    fn push_char(&mut self, ch: char) {
        if self.has_content {
            self.current.push(ch);
        }
    }

    fn push_str(&mut self, s: &str) {
        if self.has_content {
            self.current.push_str(s);
        }
    }

    fn mark_content(&mut self) {
        if !self.has_content {
            self.has_content = true;
            self.current_line = self.line;
        }
    }

    fn flush(&mut self) {
        if self.has_content {
            let text = self.current.trim().to_string();
            self.fragments.push(Fragment::sql(text, self.current_line));
        }
        self.current.clear();
        self.has_content = false;
    }

    /// Emit the pending text plus everything from `start` as a single error fragment.
    fn fail(&mut self, err: ParseError, start: usize) {
        let line = err.line();
        let tail: String = self.chars[start..].iter().collect();
        let raw = format!("{}{}", self.current, tail).trim().to_string();
        self.current.clear();
        self.has_content = false;
        self.fragments.push(Fragment {
            kind: FragmentKind::Error(err),
            text: raw.clone(),
            raw,
            line,
        });
    }

    /// Recognize `<marker><keyword>[ <text>]` at `start`; consumes the line (not its newline).
    fn directive_at(&mut self, start: usize) -> Option<Fragment> {
        let mut i = start + self.marker.len();
        let word_start = i;
        while i < self.chars.len() && self.chars[i].is_ascii_alphabetic() {
            i += 1;
        }
        if i == word_start {
            return None;
        }
        match self.chars.get(i) {
            None => {}
            Some(c) if c.is_whitespace() || *c == self.config.terminator => {}
            Some(_) => return None,
        }
        let word: String = self.chars[word_start..i].iter().collect();
        let kind = StatementKind::from_keyword(&word)?;

        let mut end = i;
        while end < self.chars.len() && self.chars[end] != '\n' {
            end += 1;
        }
        let raw: String = self.chars[start..end].iter().collect::<String>().trim().to_string();
        let rest: String = self.chars[i..end].iter().collect();
        let text = rest
            .trim()
            .trim_end_matches(self.config.terminator)
            .trim_end()
            .to_string();

        let line = self.line;
        self.pos = end;
        Some(Fragment {
            kind: FragmentKind::Directive(kind),
            text,
            raw,
            line,
        })
    }

    fn line_comment(&mut self) {
        let start = self.pos;
        while self.pos < self.chars.len() && self.chars[self.pos] != '\n' {
            self.pos += 1;
        }
        let comment: String = self.chars[start..self.pos].iter().collect();
        self.push_str(&comment);
    }

    fn block_comment(&mut self) -> Result<(), ParseError> {
        let start_line = self.line;
        let start = self.pos;
        let mut depth = 0usize;
        while self.pos < self.chars.len() {
            if self.starts_with(&['/', '*']) {
                if depth == 0 || self.config.nested_comments {
                    depth += 1;
                }
                self.pos += 2;
                continue;
            }
            if self.starts_with(&['*', '/']) {
                depth -= 1;
                self.pos += 2;
                if depth == 0 {
                    let comment: String = self.chars[start..self.pos].iter().collect();
                    self.push_str(&comment);
                    return Ok(());
                }
                continue;
            }
            if self.chars[self.pos] == '\n' {
                self.line += 1;
            }
            self.pos += 1;
        }
        Err(ParseError::UnterminatedComment { line: start_line })
    }

    /// Scan a literal; a doubled quote is an escaped quote.
    fn quoted(&mut self, quote: char) -> Result<(), ParseError> {
        let start_line = self.line;
        let start = self.pos;
        self.mark_content();
        self.pos += 1;
        while self.pos < self.chars.len() {
            let ch = self.chars[self.pos];
            if ch == quote {
                if self.chars.get(self.pos + 1) == Some(&quote) {
                    self.pos += 2;
                    continue;
                }
                self.pos += 1;
                let literal: String = self.chars[start..self.pos].iter().collect();
                self.current.push_str(&literal);
                return Ok(());
            }
            if ch == '\n' {
                self.line += 1;
            }
            self.pos += 1;
        }
        Err(ParseError::UnterminatedQuote {
            line: start_line,
            quote,
        })
    }
}
