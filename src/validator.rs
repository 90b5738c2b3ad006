//! Static policy check applied to student SQL before any connection is
//! opened. The checks are deliberately blunt: keyword detection is plain
//! substring search over the uppercased text, so a denylisted word inside
//! an identifier or string literal is rejected too. Over-rejection is the
//! intended trade-off for code that executes untrusted SQL.

use crate::error::{EngineError, Result};

/// Keywords whose presence anywhere in the query causes rejection.
pub const DENYLIST: &[&str] = &[
    "DROP", "DELETE", "UPDATE", "INSERT", "ALTER", "CREATE", "TRUNCATE", "GRANT", "REVOKE",
    "EXEC",
];

/// Validate one query against the security policy.
///
/// Only the uppercased copy is inspected; callers execute the original
/// text untouched. Deterministic and side-effect free.
pub fn validate(sql: &str) -> Result<()> {
    let upper = sql.trim().to_uppercase();

    if !upper.starts_with("SELECT") {
        return Err(EngineError::NotSelect);
    }

    for keyword in DENYLIST {
        if upper.contains(keyword) {
            return Err(EngineError::ForbiddenKeyword(keyword));
        }
    }

    if sql.contains("--") || sql.contains("/*") || sql.contains("*/") {
        return Err(EngineError::CommentNotAllowed);
    }

    // One trailing terminator is tolerated; more than one semicolon
    // implies chained statements.
    if sql.matches(';').count() > 1 {
        return Err(EngineError::MultipleStatements);
    }

    Ok(())
}
