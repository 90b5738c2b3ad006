//! Bounded execution of a single validated statement against one named
//! practice database. Every failure mode — policy rejection, incomplete
//! profile, unreachable server, engine error — collapses into the same
//! `ExecutionResult` shape; nothing is raised across this boundary.

use std::sync::Arc;
use std::time::{Duration, Instant};

use mysql::prelude::Queryable;
use serde::Serialize;
use serde_json::Value as Json;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::{
    DatabaseTarget, TargetRegistry, CONNECT_TIMEOUT, MAX_ROWS, PROBE_TIMEOUT, READ_TIMEOUT,
};
use crate::error::EngineError;
use crate::validator;

/// MySQL server error code for "Unknown database".
const ER_BAD_DB_ERROR: u16 = 1049;

/// Uniform outcome of one query execution, serialized as-is to the
/// request-handling layer.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Json>>,
    pub row_count: usize,
    /// Wall-clock seconds from invocation to fetch completion, rounded
    /// to 3 decimal places.
    pub execution_time: f64,
    pub error: Option<String>,
}

impl ExecutionResult {
    fn from_table(data: TableData, elapsed: f64) -> Self {
        let row_count = data.rows.len();
        Self {
            success: true,
            columns: data.columns,
            rows: data.rows,
            row_count,
            execution_time: elapsed,
            error: None,
        }
    }

    pub(crate) fn failure(error: String, elapsed: f64) -> Self {
        Self {
            success: false,
            columns: Vec::new(),
            rows: Vec::new(),
            row_count: 0,
            execution_time: elapsed,
            error: Some(error),
        }
    }
}

/// Column names plus row data as fetched from a session, before being
/// wrapped into an `ExecutionResult`.
pub(crate) struct TableData {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Json>>,
}

/// Fully specified connection parameters, produced from a
/// `DatabaseTarget` once all required fields are present.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedProfile {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

pub(crate) fn resolve_profile(
    name: &str,
    target: &DatabaseTarget,
) -> Result<ResolvedProfile, EngineError> {
    let missing = |field: &'static str, env_var: &'static str| EngineError::IncompleteProfile {
        target: name.to_string(),
        field,
        env_var,
    };

    let host = target.host.clone().ok_or_else(|| missing("HOST", "WS_DB_HOST"))?;
    let user = target.user.clone().ok_or_else(|| missing("USER", "WS_DB_USER"))?;
    let password = target
        .password
        .clone()
        .ok_or_else(|| missing("PASSWORD", "WS_DB_PASSWORD"))?;
    let database = target.database.clone().ok_or_else(|| missing("NAME", "WS_DB_NAME"))?;

    Ok(ResolvedProfile {
        host,
        port: target.port,
        user,
        password,
        database,
    })
}

/// One live connection. Dropping the session closes the connection, so
/// release-on-every-path comes from scoping alone.
pub(crate) trait Session {
    fn fetch(&mut self, sql: &str, max_rows: usize) -> Result<TableData, mysql::Error>;
}

/// Seam between the executor and the MySQL driver. Tests substitute a
/// counting double to observe connection lifecycle and row delivery.
pub(crate) trait SessionFactory {
    type Session: Session;

    fn connect(
        &self,
        profile: &ResolvedProfile,
        connect_timeout: Duration,
        read_timeout: Option<Duration>,
    ) -> Result<Self::Session, mysql::Error>;
}

pub(crate) struct MysqlFactory;

pub(crate) struct MysqlSession {
    conn: mysql::Conn,
}

impl SessionFactory for MysqlFactory {
    type Session = MysqlSession;

    fn connect(
        &self,
        profile: &ResolvedProfile,
        connect_timeout: Duration,
        read_timeout: Option<Duration>,
    ) -> Result<MysqlSession, mysql::Error> {
        let opts = mysql::OptsBuilder::new()
            .ip_or_hostname(Some(profile.host.as_str()))
            .tcp_port(profile.port)
            .user(Some(profile.user.as_str()))
            .pass(Some(profile.password.as_str()))
            .db_name(Some(profile.database.as_str()))
            .tcp_connect_timeout(Some(connect_timeout))
            .read_timeout(read_timeout);

        Ok(MysqlSession {
            conn: mysql::Conn::new(opts)?,
        })
    }
}

impl Session for MysqlSession {
    fn fetch(&mut self, sql: &str, max_rows: usize) -> Result<TableData, mysql::Error> {
        let mut result = self.conn.query_iter(sql)?;

        let columns: Vec<String> = result
            .columns()
            .as_ref()
            .iter()
            .map(|c| c.name_str().into_owned())
            .collect();

        let mut rows = Vec::new();
        for row in result.by_ref() {
            if rows.len() == max_rows {
                // Truncation, not an error: remaining rows are left on
                // the wire and discarded with the connection.
                break;
            }
            let row = row?;
            rows.push(row.unwrap().into_iter().map(value_to_json).collect());
        }

        Ok(TableData { columns, rows })
    }
}

/// Convert one MySQL cell into a JSON scalar for the response payload.
fn value_to_json(value: mysql::Value) -> Json {
    match value {
        mysql::Value::NULL => Json::Null,
        mysql::Value::Bytes(bytes) => Json::String(String::from_utf8_lossy(&bytes).into_owned()),
        mysql::Value::Int(i) => Json::from(i),
        mysql::Value::UInt(u) => Json::from(u),
        mysql::Value::Float(f) => serde_json::Number::from_f64(f64::from(f))
            .map(Json::Number)
            .unwrap_or(Json::Null),
        mysql::Value::Double(d) => serde_json::Number::from_f64(d)
            .map(Json::Number)
            .unwrap_or(Json::Null),
        mysql::Value::Date(year, month, day, hour, minute, second, micros) => {
            if hour == 0 && minute == 0 && second == 0 && micros == 0 {
                Json::String(format!("{:04}-{:02}-{:02}", year, month, day))
            } else {
                Json::String(format!(
                    "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                    year, month, day, hour, minute, second
                ))
            }
        }
        mysql::Value::Time(negative, days, hours, minutes, seconds, _micros) => {
            let sign = if negative { "-" } else { "" };
            let total_hours = u32::from(hours) + days * 24;
            Json::String(format!("{}{:02}:{:02}:{:02}", sign, total_hours, minutes, seconds))
        }
    }
}

fn is_unknown_database(err: &mysql::Error) -> bool {
    matches!(err, mysql::Error::MySqlError(e) if e.code == ER_BAD_DB_ERROR)
}

/// Runs validated statements against named targets from the registry.
pub struct Executor {
    registry: Arc<TargetRegistry>,
}

impl Executor {
    pub fn new(registry: Arc<TargetRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &TargetRegistry {
        &self.registry
    }

    /// Validate and execute one statement against the named target.
    pub fn execute(&self, target_name: &str, sql: &str) -> ExecutionResult {
        self.execute_with(&MysqlFactory, target_name, sql)
    }

    pub(crate) fn execute_with<F: SessionFactory>(
        &self,
        factory: &F,
        target_name: &str,
        sql: &str,
    ) -> ExecutionResult {
        let started = Instant::now();
        let query_id = Uuid::new_v4();
        debug!(%query_id, db = target_name, "executing practice query");

        if let Err(e) = validator::validate(sql) {
            debug!(%query_id, reason = %e, "query rejected by policy");
            return ExecutionResult::failure(e.to_string(), elapsed_secs(started));
        }

        let target = match self.registry.get(target_name) {
            Some(target) => target,
            None => {
                return ExecutionResult::failure(
                    EngineError::UnknownTarget(target_name.to_string()).to_string(),
                    elapsed_secs(started),
                );
            }
        };

        let profile = match resolve_profile(target_name, target) {
            Ok(profile) => profile,
            Err(e) => {
                warn!(%query_id, db = target_name, "incomplete connection profile");
                return ExecutionResult::failure(e.to_string(), elapsed_secs(started));
            }
        };

        match self.run_statement(factory, &profile, sql) {
            Ok(mut data) => {
                data.rows.truncate(MAX_ROWS);
                debug!(%query_id, rows = data.rows.len(), "query completed");
                ExecutionResult::from_table(data, elapsed_secs(started))
            }
            Err(err) => {
                let message = self.describe_failure(factory, &profile, &err);
                debug!(%query_id, error = %message, "query failed");
                ExecutionResult::failure(message, elapsed_secs(started))
            }
        }
    }

    /// Connect, execute, fetch. The session owns the connection and is
    /// dropped on every return path.
    fn run_statement<F: SessionFactory>(
        &self,
        factory: &F,
        profile: &ResolvedProfile,
        sql: &str,
    ) -> Result<TableData, mysql::Error> {
        let mut session = factory.connect(profile, CONNECT_TIMEOUT, Some(READ_TIMEOUT))?;
        session.fetch(sql, MAX_ROWS)
    }

    fn describe_failure<F: SessionFactory>(
        &self,
        factory: &F,
        profile: &ResolvedProfile,
        err: &mysql::Error,
    ) -> String {
        if is_unknown_database(err) {
            let mut message = format!("Database '{}' does not exist. {}", profile.database, err);
            if let Some(hint) = self.suggest_alternatives(factory, &profile.database) {
                message.push(' ');
                message.push_str(&hint);
            }
            return message;
        }
        err.to_string()
    }

    /// Probe sibling targets; once any of them accepts a connection,
    /// list the configured fleet so the caller can pick the intended
    /// database. Best-effort: returns None when nothing answers.
    fn suggest_alternatives<F: SessionFactory>(
        &self,
        factory: &F,
        failed_database: &str,
    ) -> Option<String> {
        for name in self.registry.names() {
            let target = match self.registry.get(name) {
                Some(target) => target,
                None => continue,
            };
            if target.database.as_deref() == Some(failed_database) {
                continue;
            }
            let profile = match resolve_profile(name, target) {
                Ok(profile) => profile,
                Err(_) => continue,
            };
            if factory.connect(&profile, PROBE_TIMEOUT, None).is_ok() {
                let fleet: Vec<&str> = self.registry.names().collect();
                return Some(format!(
                    "Known practice databases on this server: {}",
                    fleet.join(", ")
                ));
            }
        }
        None
    }
}

fn elapsed_secs(started: Instant) -> f64 {
    (started.elapsed().as_secs_f64() * 1000.0).round() / 1000.0
}
