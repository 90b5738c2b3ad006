//! Pipeline entry points consumed by the request-handling layer:
//! resolve the target, execute, and (for submissions) grade against the
//! exercise's expected query.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::comparator::{self, ColumnDiff};
use crate::config::TargetRegistry;
use crate::error::EngineError;
use crate::executor::{ExecutionResult, Executor, MysqlFactory, SessionFactory};
use crate::router;

/// The slice of an exercise record the engine needs. Persistence of
/// exercises lives outside this crate.
#[derive(Debug, Clone)]
pub struct Exercise {
    /// Display title; a leading workshop prefix ("WS3-1: ...") routes
    /// the exercise to that workshop's database.
    pub title: String,
    /// Statically assigned practice database, used when the title does
    /// not select a configured workshop target.
    pub schema_db: String,
    /// Known-correct answer executed as the right-hand side of the
    /// comparison.
    pub expected_sql: String,
}

/// Submit/verify response shape.
#[derive(Debug, Clone, Serialize)]
pub struct GradeOutcome {
    pub correct: bool,
    pub message: String,
    pub user_result: ExecutionResult,
    pub diff: Option<ColumnDiff>,
}

/// Stateless facade over the validate → execute → compare pipeline.
/// Holds only the shared read-only target registry, so one instance
/// serves concurrent invocations.
pub struct Engine {
    registry: Arc<TargetRegistry>,
    executor: Executor,
}

impl Engine {
    pub fn new(registry: TargetRegistry) -> Self {
        let registry = Arc::new(registry);
        Self {
            executor: Executor::new(Arc::clone(&registry)),
            registry,
        }
    }

    pub fn registry(&self) -> &TargetRegistry {
        &self.registry
    }

    /// Execute-only path: run the student's query and return the raw
    /// result without grading.
    pub fn run(&self, exercise: &Exercise, sql: &str) -> ExecutionResult {
        self.run_with(&MysqlFactory, exercise, sql)
    }

    /// Submit path: run the student's query and the expected query
    /// against the same target and compare.
    pub fn grade(&self, exercise: &Exercise, sql: &str) -> GradeOutcome {
        self.grade_with(&MysqlFactory, exercise, sql)
    }

    pub(crate) fn run_with<F: SessionFactory>(
        &self,
        factory: &F,
        exercise: &Exercise,
        sql: &str,
    ) -> ExecutionResult {
        let sql = sql.trim();
        if sql.is_empty() {
            return ExecutionResult::failure(EngineError::EmptyQuery.to_string(), 0.0);
        }

        let target = router::resolve_target(&exercise.title, &exercise.schema_db, &self.registry);
        self.executor.execute_with(factory, &target, sql)
    }

    pub(crate) fn grade_with<F: SessionFactory>(
        &self,
        factory: &F,
        exercise: &Exercise,
        sql: &str,
    ) -> GradeOutcome {
        let submission_id = Uuid::new_v4();
        let sql = sql.trim();
        if sql.is_empty() {
            return GradeOutcome {
                correct: false,
                message: "Query execution failed".to_string(),
                user_result: ExecutionResult::failure(EngineError::EmptyQuery.to_string(), 0.0),
                diff: None,
            };
        }

        let target = router::resolve_target(&exercise.title, &exercise.schema_db, &self.registry);
        let user_result = self.executor.execute_with(factory, &target, sql);

        // Repair is applied to the stored expected SQL only, never to
        // the student's text.
        let expected_sql =
            router::repair_with(factory, &exercise.expected_sql, &target, &self.registry);
        let expected_result = self.executor.execute_with(factory, &target, &expected_sql);

        let verdict = comparator::compare(&user_result, &expected_result);
        info!(
            %submission_id,
            db = %target,
            correct = verdict.correct,
            "submission graded"
        );

        GradeOutcome {
            correct: verdict.correct,
            message: verdict.message,
            user_result,
            diff: verdict.diff,
        }
    }
}
