//! Syntactic safety checks for inbound SQL.
//!
//! This is a pattern-based pre-filter, not a parser. It over-rejects on
//! purpose: a keyword from the blocked lists anywhere in the text, including
//! inside a string literal or a quoted identifier, fails validation
//! (`SELECT * FROM audit WHERE action = 'delete'` is rejected). That false
//! positive is accepted in exchange for never needing to understand SQL
//! grammar to stay safe.
//!
//! The two named operations, [`validate_select_only`] and
//! [`contains_nested_modification`], are the only entry points the router
//! relies on.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// Mutation keywords that may never appear in a read-only statement.
const MUTATION_KEYWORDS: &str = "insert|update|delete|drop|create|alter|truncate|merge";

/// Start of statement: optional single block comment, then `select` + whitespace.
static SELECT_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:/\*[\s\S]*?\*/\s*)?select\s").expect("valid regex"));

/// Whole-word patterns that are rejected anywhere in the statement.
static DANGEROUS_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        format!(r"(?i)\b(?:{})\b", MUTATION_KEYWORDS),
        r"(?i)\b(?:grant|revoke|set\s+session|set\s+role)\b".to_string(),
        r"(?i)\b(?:call|exec|execute)\b".to_string(),
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

/// A mutation keyword directly after an opening parenthesis.
static SUBQUERY_MUTATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\(\s*(?:{})\b", MUTATION_KEYWORDS)).expect("valid regex")
});

/// A mutation keyword as the body of a `WITH <name> AS (` opener.
static CTE_MUTATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\bwith\s+[\w$]+\s+as\s*\(\s*(?:{})\b",
        MUTATION_KEYWORDS
    ))
    .expect("valid regex")
});

/// Outcome of validating a statement.
///
/// `is_valid` is true exactly when `errors` is empty; the constructor keeps
/// that invariant, so the fields are read-only outside this module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    is_valid: bool,
    errors: Vec<String>,
}

impl ValidationResult {
    /// Build a result from an ordered list of errors.
    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }
}

/// Check that `sql` is a single read-only `SELECT`.
///
/// The text is trimmed and lower-cased for matching only; the caller keeps
/// executing the original text.
pub fn validate_select_only(sql: &str) -> bool {
    select_only_errors(sql).is_empty()
}

/// Check for a mutation hidden inside a subquery or common table expression.
///
/// Used as a second line of defense on the elevated (read-write) path.
pub fn contains_nested_modification(sql: &str) -> bool {
    let lowered = sql.to_lowercase();
    SUBQUERY_MUTATION.is_match(&lowered) || CTE_MUTATION.is_match(&lowered)
}

/// Validate a statement, collecting every reason it fails.
pub fn validate(sql: &str) -> ValidationResult {
    ValidationResult::from_errors(select_only_errors(sql))
}

/// Validate for the elevated path: the read-only checks plus the nested
/// modification check.
pub fn validate_elevated(sql: &str) -> ValidationResult {
    let mut errors = select_only_errors(sql);
    if contains_nested_modification(sql) {
        errors.push(
            "Query contains a data modification inside a subquery or common table expression"
                .to_string(),
        );
    }
    ValidationResult::from_errors(errors)
}

fn select_only_errors(sql: &str) -> Vec<String> {
    let normalized = sql.trim().to_lowercase();
    let mut errors = Vec::new();

    if !SELECT_PREFIX.is_match(&normalized) {
        errors.push("Only SELECT statements are allowed".to_string());
    }

    for pattern in DANGEROUS_PATTERNS.iter() {
        if let Some(found) = pattern.find(&normalized) {
            errors.push(format!(
                "Query contains a potentially dangerous pattern: '{}'",
                found.as_str()
            ));
        }
    }

    errors
}
