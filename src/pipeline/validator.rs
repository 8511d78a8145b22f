//! Deterministic safety gate over generated statement text.
//!
//! Keyword scan, not a SQL parser: destructive keywords are matched as whole
//! words in any case, only SELECT/WITH/INSERT/UPDATE/DELETE may lead a
//! statement, and UPDATE/DELETE must carry a WHERE clause.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

static DROP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bDROP\b").unwrap());
static TRUNCATE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bTRUNCATE\b").unwrap());
static DELETE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bDELETE\b").unwrap());
static UPDATE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bUPDATE\b").unwrap());
static WHERE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bWHERE\b").unwrap());

/// Keywords a statement may start with.
pub const ALLOWED_LEADING_KEYWORDS: [&str; 5] = ["SELECT", "WITH", "INSERT", "UPDATE", "DELETE"];

/// First word of the statement, uppercased. Leading parentheses are skipped.
pub fn leading_keyword(statement: &str) -> Option<String> {
    statement
        .split(|c: char| !c.is_ascii_alphabetic())
        .find(|word| !word.is_empty())
        .map(|word| word.to_ascii_uppercase())
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    #[error("I couldn't turn that request into a database operation. Please describe which records you want to see or change.")]
    Empty,

    #[error("DROP operations are not allowed for safety reasons.")]
    DropForbidden,

    #[error("TRUNCATE operations are not allowed for safety reasons.")]
    TruncateForbidden,

    #[error("DELETE without WHERE clause is not allowed. Please specify which records to delete.")]
    UnqualifiedDelete,

    #[error("UPDATE without WHERE clause would affect all records. Please specify which records to update.")]
    UnqualifiedUpdate,

    #[error("Only SELECT, INSERT, UPDATE and DELETE operations are allowed.")]
    UnsupportedStatement,
}

impl Rejection {
    pub fn code(&self) -> &'static str {
        match self {
            Rejection::Empty => "EMPTY_STATEMENT",
            Rejection::DropForbidden => "DROP_FORBIDDEN",
            Rejection::TruncateForbidden => "TRUNCATE_FORBIDDEN",
            Rejection::UnqualifiedDelete | Rejection::UnqualifiedUpdate => "UNQUALIFIED_MUTATION",
            Rejection::UnsupportedStatement => "UNSUPPORTED_STATEMENT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject(Rejection),
}

/// Judge one statement. Checks run in a fixed order; the first hit wins.
pub fn validate(statement: &str) -> Verdict {
    let sql = statement.trim();
    if sql.is_empty() {
        return Verdict::Reject(Rejection::Empty);
    }
    if DROP.is_match(sql) {
        return Verdict::Reject(Rejection::DropForbidden);
    }
    if TRUNCATE.is_match(sql) {
        return Verdict::Reject(Rejection::TruncateForbidden);
    }
    let allowed = leading_keyword(sql)
        .is_some_and(|keyword| ALLOWED_LEADING_KEYWORDS.contains(&keyword.as_str()));
    if !allowed {
        return Verdict::Reject(Rejection::UnsupportedStatement);
    }
    let qualified = WHERE.is_match(sql);
    if DELETE.is_match(sql) && !qualified {
        return Verdict::Reject(Rejection::UnqualifiedDelete);
    }
    if UPDATE.is_match(sql) && !qualified {
        return Verdict::Reject(Rejection::UnqualifiedUpdate);
    }
    Verdict::Accept
}
