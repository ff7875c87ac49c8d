//! `rift check` command implementation.
//!
//! Runs the query validator without a database and prints what the router
//! would see: the validation result, the stricter verdict applied on the
//! elevated path, and the extracted table references.

use anyhow::Result;
use clap::Args;
use rift_guard::{
    contains_nested_modification, extract_table_references, validate, validate_elevated,
};
use serde_json::{Value, json};

/// Arguments for `rift check`.
#[derive(Debug, Args)]
pub struct CheckArgs {
    /// SQL statement to check.
    pub sql: String,
}

/// Print the report. Returns whether the statement passes validation.
pub fn execute(args: &CheckArgs) -> Result<bool> {
    let (report, accepted) = check_report(&args.sql);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(accepted)
}

fn check_report(sql: &str) -> (Value, bool) {
    let validation = validate(sql);
    let accepted = validation.is_valid();
    let report = json!({
        "sql": sql,
        "validation": validation,
        "nestedModification": contains_nested_modification(sql),
        "elevatedValidation": validate_elevated(sql),
        "tables": extract_table_references(sql),
    });
    (report, accepted)
}
