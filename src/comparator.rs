//! Semantic comparison of a student's result against the expected one.
//!
//! Equivalence is judged on the column name set (case-insensitive,
//! order-free) and on the row multiset. Rows are normalized by sorting
//! each row's value strings, which makes the comparison independent of
//! the SELECT list's column order; the flip side is that `(1, 2)` and
//! `(2, 1)` normalize identically. That leniency is inherited from the
//! grading behavior this engine replicates and is kept on purpose.

use std::collections::{BTreeSet, HashSet};

use serde::Serialize;
use serde_json::Value as Json;

use crate::executor::ExecutionResult;

/// Binary grading outcome. `correct` is true only when both executions
/// succeeded and the results are equivalent.
#[derive(Debug, Clone, Serialize)]
pub struct Verdict {
    pub correct: bool,
    pub message: String,
    pub diff: Option<ColumnDiff>,
}

impl Verdict {
    fn incorrect(message: impl Into<String>) -> Self {
        Self {
            correct: false,
            message: message.into(),
            diff: None,
        }
    }
}

/// Column-level detail attached when the column name sets differ.
/// Casing is preserved for display.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnDiff {
    pub missing_columns: Vec<String>,
    pub extra_columns: Vec<String>,
    pub user_columns: Vec<String>,
    pub expected_columns: Vec<String>,
}

pub fn compare(user: &ExecutionResult, expected: &ExecutionResult) -> Verdict {
    if !user.success {
        return Verdict::incorrect("Query execution failed");
    }

    // An expected-query failure is an exercise configuration problem,
    // not a student error; the message says so for operators.
    if !expected.success {
        return Verdict::incorrect(format!(
            "Expected query execution failed: {}. Please check the expected SQL configuration.",
            expected.error.as_deref().unwrap_or("Unknown error")
        ));
    }

    let user_cols: HashSet<String> = user.columns.iter().map(|c| c.to_lowercase()).collect();
    let expected_cols: HashSet<String> =
        expected.columns.iter().map(|c| c.to_lowercase()).collect();

    if user_cols != expected_cols {
        return Verdict {
            correct: false,
            message: "Column names do not match".to_string(),
            diff: Some(column_diff(user, expected)),
        };
    }

    if user.row_count != expected.row_count {
        return Verdict::incorrect(format!(
            "Row count mismatch: expected {}, got {}",
            expected.row_count, user.row_count
        ));
    }

    if normalize(user) != normalize(expected) {
        return Verdict::incorrect("Query results do not match expected output");
    }

    Verdict {
        correct: true,
        message: "Correct! Well done!".to_string(),
        diff: None,
    }
}

fn column_diff(user: &ExecutionResult, expected: &ExecutionResult) -> ColumnDiff {
    let user_set: BTreeSet<&String> = user.columns.iter().collect();
    let expected_set: BTreeSet<&String> = expected.columns.iter().collect();

    ColumnDiff {
        missing_columns: expected_set
            .difference(&user_set)
            .map(|c| (*c).clone())
            .collect(),
        extra_columns: user_set
            .difference(&expected_set)
            .map(|c| (*c).clone())
            .collect(),
        user_columns: user.columns.clone(),
        expected_columns: expected.columns.clone(),
    }
}

/// Collapse a result into a set of rows, each row being the sorted
/// strings of its values. Order-free in both dimensions; multiplicity
/// differences are caught earlier by the row count check.
fn normalize(result: &ExecutionResult) -> HashSet<Vec<String>> {
    result
        .rows
        .iter()
        .map(|row| {
            let mut values: Vec<String> = row.iter().map(scalar_repr).collect();
            values.sort();
            values
        })
        .collect()
}

fn scalar_repr(value: &Json) -> String {
    match value {
        Json::Null => "NULL".to_string(),
        Json::String(s) => s.clone(),
        other => other.to_string(),
    }
}
