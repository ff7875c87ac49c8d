//! Table reference extraction.
//!
//! Finds candidate `schema.table` names in SQL text so the router can ask the
//! federated catalog about each one. Three independent patterns are applied:
//!
//! 1. `FROM` / `JOIN` followed by a table name
//! 2. `FROM` / `JOIN` followed by a parenthesized `SELECT ... FROM <name>`
//! 3. `WITH <name> AS (SELECT ... FROM <name>)` bodies
//!
//! Results overlap across patterns and are deduplicated by `schema.table`.
//!
//! This is a heuristic, not a parser. It looks one level into subqueries,
//! cannot see identifiers built by dynamic SQL, and may report non-table
//! names (`EXTRACT(YEAR FROM ts)` yields `public.ts`). Both directions fail
//! safe: a missed federated table keeps the statement on the read-only path,
//! and a spurious match only costs a catalog lookup that answers "no".

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

/// Schema assumed for unqualified table names.
pub const DEFAULT_SCHEMA: &str = "public";

/// One identifier part: quoted, or a bare word (Redshift allows `$`).
const IDENT: &str = r#"(?:"[^"]+"|[\w$]+)"#;

static FROM_JOIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:from|join)\s+({ident}(?:\s*\.\s*{ident}){{0,2}})",
        ident = IDENT
    ))
    .expect("valid regex")
});

static FROM_JOIN_SUBQUERY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:from|join)\s*\(\s*select\b[^()]*?\b(?:from|join)\s+({ident}(?:\s*\.\s*{ident}){{0,2}})",
        ident = IDENT
    ))
    .expect("valid regex")
});

static CTE_BODY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\bwith\s+[\w$]+\s+as\s*\(\s*select\b[^()]*?\bfrom\s+({ident}(?:\s*\.\s*{ident}){{0,2}})",
        ident = IDENT
    ))
    .expect("valid regex")
});

/// A table named by a statement.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TableReference {
    pub schema: String,
    pub table: String,
}

impl TableReference {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }

    /// Parse a dotted name (`table`, `schema.table` or `db.schema.table`).
    ///
    /// Quotes are stripped; unquoted parts are lower-cased the way Redshift
    /// folds identifiers. Returns `None` for an empty name.
    pub fn parse(name: &str) -> Option<Self> {
        let parts: Vec<String> = split_identifier(name);
        match parts.as_slice() {
            [table] if !table.is_empty() => Some(Self::new(DEFAULT_SCHEMA, table.clone())),
            [.., schema, table] if !schema.is_empty() && !table.is_empty() => {
                Some(Self::new(schema.clone(), table.clone()))
            }
            _ => None,
        }
    }

    /// Deduplication key: `schema.table`.
    pub fn key(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }
}

impl fmt::Display for TableReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

/// Extract the unique table references of a statement, in key order.
pub fn extract_table_references(sql: &str) -> Vec<TableReference> {
    let mut found = BTreeSet::new();

    for pattern in [&*FROM_JOIN, &*FROM_JOIN_SUBQUERY, &*CTE_BODY] {
        for captures in pattern.captures_iter(sql) {
            if let Some(reference) = captures.get(1).and_then(|m| TableReference::parse(m.as_str()))
            {
                found.insert(reference);
            }
        }
    }

    found.into_iter().collect()
}

/// Split on dots outside double quotes, normalizing each part.
fn split_identifier(name: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut in_quotes = false;

    for c in name.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                quoted = true;
            }
            '.' if !in_quotes => {
                parts.push(normalize_part(&current, quoted));
                current.clear();
                quoted = false;
            }
            c if c.is_whitespace() && !in_quotes => {}
            c => current.push(c),
        }
    }
    parts.push(normalize_part(&current, quoted));
    parts
}

fn normalize_part(part: &str, quoted: bool) -> String {
    if quoted {
        part.to_string()
    } else {
        part.to_lowercase()
    }
}
