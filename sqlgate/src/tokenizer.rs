//! Splitting migration files into individual statements.
//!
//! [split_statements] walks the text once, character by character, and only treats
//! `;` as a terminator when it is outside every quoting and comment context:
//!
//! - `'single'` and `"double"` quoted strings, where a backslash escapes the next character
//! - `` `backtick` `` and `[bracket]` quoted identifiers
//! - `-- line` and `# line` comments, running to the end of the line
//! - `/* block */` comments
//!
//! Custom delimiters (`DELIMITER $$`) are not supported; `;` is always the terminator.

use std::iter::Peekable;
use std::str::Chars;

/// Which lexical context a character belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Context {
    Code,
    /// Inside a string or quoted identifier, including its quote characters.
    Quoted,
    /// Inside a comment, including its markers.
    Comment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Code,
    Quote(char),
    LineComment,
    BlockComment,
}

/// Tags every character of a SQL string with its [Context].
pub(crate) struct Scanner<'a> {
    chars: Peekable<Chars<'a>>,
    state: State,
    escaped: bool,
    /// Characters consumed since the block comment opened.
    block_len: usize,
    prev: char,
}

impl<'a> Scanner<'a> {
    pub(crate) fn new(sql: &'a str) -> Self {
        Self {
            chars: sql.chars().peekable(),
            state: State::Code,
            escaped: false,
            block_len: 0,
            prev: '\0',
        }
    }
}

impl Iterator for Scanner<'_> {
    type Item = (char, Context);

    fn next(&mut self) -> Option<Self::Item> {
        let ch = self.chars.next()?;
        let context = match self.state {
            State::Code => match ch {
                '\'' | '"' | '`' => {
                    self.state = State::Quote(ch);
                    Context::Quoted
                }
                '[' => {
                    self.state = State::Quote(']');
                    Context::Quoted
                }
                '#' => {
                    self.state = State::LineComment;
                    Context::Comment
                }
                '-' if self.chars.peek() == Some(&'-') => {
                    self.state = State::LineComment;
                    Context::Comment
                }
                '/' if self.chars.peek() == Some(&'*') => {
                    self.state = State::BlockComment;
                    self.block_len = 0;
                    Context::Comment
                }
                _ => Context::Code,
            },
            State::Quote(close) => {
                if self.escaped {
                    self.escaped = false;
                } else if ch == '\\' && (close == '\'' || close == '"') {
                    self.escaped = true;
                } else if ch == close {
                    self.state = State::Code;
                }
                Context::Quoted
            }
            State::LineComment => {
                if ch == '\n' {
                    self.state = State::Code;
                    Context::Code
                } else {
                    Context::Comment
                }
            }
            State::BlockComment => {
                self.block_len += 1;
                // the `*` of the opening `/*` cannot also close the comment
                if ch == '/' && self.prev == '*' && self.block_len > 2 {
                    self.state = State::Code;
                }
                Context::Comment
            }
        };
        self.prev = ch;
        Some((ch, context))
    }
}

/// Split SQL text into trimmed, non-empty statements.
///
/// Comments before a statement's first code character are dropped; comments inside
/// a statement are kept so server hints survive. An unterminated trailing statement
/// is returned as long as it contains code.
pub fn split_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for (ch, context) in Scanner::new(sql) {
        match context {
            Context::Code if ch == ';' => flush(&mut current, &mut statements),
            Context::Comment if current.trim().is_empty() => {}
            _ => current.push(ch),
        }
    }
    flush(&mut current, &mut statements);

    statements
}

fn flush(current: &mut String, statements: &mut Vec<String>) {
    let statement = current.trim();
    if !statement.is_empty() {
        statements.push(statement.to_string());
    }
    current.clear();
}
