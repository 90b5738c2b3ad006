// Query execution & verification engine for SQL practice exercises:
// validates untrusted student SQL, runs it against a named practice
// database under time and row bounds, and grades the result against the
// exercise's expected query.

pub mod comparator;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod router;
pub mod validator;

// Re-export commonly used types
pub use comparator::{ColumnDiff, Verdict};
pub use config::{DatabaseTarget, TargetRegistry, CONNECT_TIMEOUT, MAX_ROWS, READ_TIMEOUT};
pub use engine::{Engine, Exercise, GradeOutcome};
pub use error::{EngineError, Result};
pub use executor::{ExecutionResult, Executor};
