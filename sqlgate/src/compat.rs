//! Rewrites for servers that reject conditional DDL.
//!
//! MySQL (unlike MariaDB) rejects `ADD COLUMN IF NOT EXISTS` and friends as a syntax
//! error. [normalize] strips those clauses before every execution so migrations
//! written for the more permissive dialect still run; the resulting "already exists"
//! errors are then handled by the tolerate-existing policy. [split_alter] breaks a
//! compound `ALTER TABLE` into one statement per operation so a single conflicting
//! operation does not take the others down with it.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

use crate::tokenizer::{Context, Scanner};

static CONDITIONAL_ADD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(ADD\s+(?:COLUMN|UNIQUE\s+INDEX|UNIQUE\s+KEY|INDEX|KEY))\s+IF\s+NOT\s+EXISTS\b")
        .expect("conditional ADD pattern is valid")
});

static ALTER_TABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^ALTER\s+TABLE\s+(?:IF\s+EXISTS\s+)?").expect("ALTER TABLE pattern is valid")
});

static DROP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*DROP\b").expect("DROP pattern is valid"));

/// Strip `IF NOT EXISTS` from `ADD COLUMN`, `ADD INDEX`, `ADD UNIQUE INDEX`,
/// `ADD KEY` and `ADD UNIQUE KEY` clauses.
///
/// ```
/// assert_eq!(
///     sqlgate::normalize("ALTER TABLE t ADD COLUMN IF NOT EXISTS c INT"),
///     "ALTER TABLE t ADD COLUMN c INT"
/// );
/// ```
///
/// Only code is rewritten. String literals, quoted identifiers and comments are
/// left exactly as written.
pub fn normalize(statement: &str) -> Cow<'_, str> {
    let spans = code_spans(statement);
    if !spans
        .iter()
        .any(|&(start, end)| CONDITIONAL_ADD.is_match(&statement[start..end]))
    {
        return Cow::Borrowed(statement);
    }

    let mut normalized = String::with_capacity(statement.len());
    let mut copied = 0;
    for (start, end) in spans {
        normalized.push_str(&statement[copied..start]);
        normalized.push_str(&CONDITIONAL_ADD.replace_all(&statement[start..end], "$1"));
        copied = end;
    }
    normalized.push_str(&statement[copied..]);
    Cow::Owned(normalized)
}

/// Byte ranges of the maximal runs of code characters.
fn code_spans(statement: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = None;
    for ((index, _), (_, context)) in statement.char_indices().zip(Scanner::new(statement)) {
        match (context, start) {
            (Context::Code, None) => start = Some(index),
            (Context::Code, Some(_)) => {}
            (_, Some(begin)) => {
                spans.push((begin, index));
                start = None;
            }
            (_, None) => {}
        }
    }
    if let Some(begin) = start {
        spans.push((begin, statement.len()));
    }
    spans
}

/// Decompose `ALTER TABLE <table> <op1>, <op2>, ...` into one `ALTER TABLE` per
/// operation.
///
/// Operations are split on commas at the top level only: commas nested in
/// parentheses, strings, quoted identifiers or comments stay put. An `IF EXISTS`
/// guard is repeated on every operation. Returns `None` if the statement is not an
/// `ALTER TABLE` or has no operations.
pub fn split_alter(statement: &str) -> Option<Vec<String>> {
    let alter = AlterTable::parse(statement)?;
    Some(
        alter
            .operations
            .iter()
            .map(|op| format!("{} {} {}", alter.prefix, alter.table, op))
            .collect(),
    )
}

/// Whether the statement removes something: a `DROP ...` statement, or an
/// `ALTER TABLE` with at least one `DROP` operation.
pub(crate) fn is_drop(statement: &str) -> bool {
    DROP.is_match(statement)
        || AlterTable::parse(statement)
            .is_some_and(|alter| alter.operations.iter().any(|op| DROP.is_match(op)))
}

struct AlterTable<'a> {
    /// `ALTER TABLE`, plus `IF EXISTS` when present, with whitespace collapsed.
    prefix: String,
    table: &'a str,
    operations: Vec<String>,
}

impl<'a> AlterTable<'a> {
    fn parse(statement: &'a str) -> Option<Self> {
        let statement = statement.trim();
        let prefix = ALTER_TABLE.find(statement)?;
        let (table, operations) = split_table_name(&statement[prefix.end()..])?;
        let operations = split_top_level_commas(operations);
        if operations.is_empty() {
            return None;
        }
        Some(Self {
            prefix: prefix.as_str().split_whitespace().collect::<Vec<_>>().join(" "),
            table,
            operations,
        })
    }
}

/// Split `<table> <operations>` at the first unquoted whitespace.
fn split_table_name(rest: &str) -> Option<(&str, &str)> {
    let mut end = None;
    for ((index, ch), (_, context)) in rest.char_indices().zip(Scanner::new(rest)) {
        if context == Context::Code && ch.is_whitespace() {
            end = Some(index);
            break;
        }
    }
    let end = end?;
    let table = &rest[..end];
    let operations = rest[end..].trim();
    if table.is_empty() || operations.is_empty() {
        return None;
    }
    Some((table, operations))
}

fn split_top_level_commas(operations: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;

    for (ch, context) in Scanner::new(operations) {
        if context == Context::Code {
            match ch {
                '(' => depth += 1,
                ')' => depth = depth.saturating_sub(1),
                ',' if depth == 0 => {
                    push_part(&mut current, &mut parts);
                    continue;
                }
                _ => {}
            }
        }
        current.push(ch);
    }
    push_part(&mut current, &mut parts);

    parts
}

fn push_part(current: &mut String, parts: &mut Vec<String>) {
    let part = current.trim();
    if !part.is_empty() {
        parts.push(part.to_string());
    }
    current.clear();
}
