//! Maps an exercise to the practice database it should run against and
//! repairs table-name casing in the exercise's stored expected SQL.
//!
//! Identifier repair is a convenience for exercises authored against a
//! server with different case sensitivity settings. It only ever touches
//! the system's own expected SQL; student SQL is executed exactly as
//! submitted.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use tracing::debug;

use crate::config::{TargetRegistry, MAX_ROWS, PROBE_TIMEOUT};
use crate::executor::{resolve_profile, MysqlFactory, Session, SessionFactory};

lazy_static! {
    /// Leading workshop index in an exercise title, e.g. "WS3-2: Joins".
    static ref WORKSHOP_PREFIX: Regex = Regex::new(r"^WS(\d+)").unwrap();

    /// A table reference: the identifier following FROM/JOIN/UPDATE/
    /// INTO/TABLE, optionally quoted or backticked.
    static ref TABLE_REF: Regex =
        Regex::new(r#"(?i)\b(?:FROM|JOIN|UPDATE|INTO|TABLE)\s+[`"]?(\w+)[`"]?"#).unwrap();
}

/// Pick the target for an exercise: a configured `WS<n>` target derived
/// from the title prefix wins, otherwise the exercise's statically
/// assigned schema database.
pub fn resolve_target(title: &str, schema_db: &str, registry: &TargetRegistry) -> String {
    if let Some(caps) = WORKSHOP_PREFIX.captures(title) {
        let derived = format!("WS{}", &caps[1]);
        if registry.contains(&derived) {
            return derived;
        }
    }
    schema_db.to_string()
}

/// Rewrite table references in the expected SQL to the casing the live
/// database actually uses. Best-effort: any failure along the way
/// returns the input unchanged.
pub fn repair_table_names(sql: &str, target_name: &str, registry: &TargetRegistry) -> String {
    repair_with(&MysqlFactory, sql, target_name, registry)
}

pub(crate) fn repair_with<F: SessionFactory>(
    factory: &F,
    sql: &str,
    target_name: &str,
    registry: &TargetRegistry,
) -> String {
    let actual = table_names(factory, target_name, registry);
    if actual.is_empty() {
        return sql.to_string();
    }
    rewrite_table_references(sql, &actual)
}

/// Live table names of the target keyed by lowercased name. Fails
/// silently to an empty map; callers treat that as "no repair".
pub(crate) fn table_names<F: SessionFactory>(
    factory: &F,
    target_name: &str,
    registry: &TargetRegistry,
) -> HashMap<String, String> {
    let Some(target) = registry.get(target_name) else {
        return HashMap::new();
    };
    let Ok(profile) = resolve_profile(target_name, target) else {
        return HashMap::new();
    };

    let mut session = match factory.connect(&profile, PROBE_TIMEOUT, Some(PROBE_TIMEOUT)) {
        Ok(session) => session,
        Err(e) => {
            debug!(db = target_name, error = %e, "table introspection skipped");
            return HashMap::new();
        }
    };

    match session.fetch("SHOW TABLES", MAX_ROWS) {
        Ok(data) => data
            .rows
            .iter()
            .filter_map(|row| row.first())
            .filter_map(|v| v.as_str())
            .map(|name| (name.to_lowercase(), name.to_string()))
            .collect(),
        Err(e) => {
            debug!(db = target_name, error = %e, "table introspection failed");
            HashMap::new()
        }
    }
}

fn rewrite_table_references(sql: &str, actual: &HashMap<String, String>) -> String {
    TABLE_REF
        .replace_all(sql, |caps: &Captures| {
            let whole = &caps[0];
            let referenced = &caps[1];
            match actual.get(&referenced.to_lowercase()) {
                Some(correct) if correct != referenced => whole.replacen(referenced, correct, 1),
                _ => whole.to_string(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseTarget;
    use crate::executor::{ResolvedProfile, TableData};
    use serde_json::Value as Json;
    use std::time::Duration;

    fn registry_with(names: &[&str]) -> TargetRegistry {
        TargetRegistry::from_targets(names.iter().map(|n| {
            (
                n.to_string(),
                DatabaseTarget {
                    host: Some("127.0.0.1".to_string()),
                    port: 3306,
                    user: Some("practice".to_string()),
                    password: Some("secret".to_string()),
                    database: Some(n.to_string()),
                },
            )
        }))
    }

    // ------------------------------------------------------------------
    // resolve_target
    // ------------------------------------------------------------------

    #[test]
    fn workshop_prefix_selects_configured_target() {
        let registry = registry_with(&["WS1", "WS2", "WS10"]);
        assert_eq!(resolve_target("WS2-3: Aggregates", "practice_hr", &registry), "WS2");
        assert_eq!(resolve_target("WS10-1: Windows", "practice_hr", &registry), "WS10");
    }

    #[test]
    fn unconfigured_workshop_falls_back_to_schema_db() {
        let registry = registry_with(&["WS1"]);
        assert_eq!(resolve_target("WS7-1: Subqueries", "practice_hr", &registry), "practice_hr");
    }

    #[test]
    fn titles_without_prefix_fall_back_to_schema_db() {
        let registry = registry_with(&["WS1"]);
        assert_eq!(resolve_target("Find cheap products", "practice_ecommerce", &registry),
            "practice_ecommerce");
        // Prefix must lead the title.
        assert_eq!(resolve_target("Intro to WS1", "practice_hr", &registry), "practice_hr");
    }

    // ------------------------------------------------------------------
    // identifier repair
    // ------------------------------------------------------------------

    fn tables(names: &[&str]) -> HashMap<String, String> {
        names.iter().map(|n| (n.to_lowercase(), n.to_string())).collect()
    }

    #[test]
    fn repairs_casing_after_from_and_join() {
        let actual = tables(&["Products", "Orders"]);
        let sql = "SELECT * FROM products JOIN orders ON products.id = orders.product_id";
        assert_eq!(
            rewrite_table_references(sql, &actual),
            "SELECT * FROM Products JOIN Orders ON products.id = orders.product_id"
        );
    }

    #[test]
    fn leaves_unknown_tables_alone() {
        let actual = tables(&["Products"]);
        let sql = "SELECT * FROM inventory";
        assert_eq!(rewrite_table_references(sql, &actual), sql);
    }

    #[test]
    fn handles_backticked_references() {
        let actual = tables(&["Employees"]);
        let sql = "SELECT name FROM `employees`";
        assert_eq!(rewrite_table_references(sql, &actual), "SELECT name FROM `Employees`");
    }

    #[test]
    fn column_names_are_not_rewritten() {
        let actual = tables(&["Products"]);
        let sql = "SELECT products_sold FROM products";
        assert_eq!(
            rewrite_table_references(sql, &actual),
            "SELECT products_sold FROM Products"
        );
    }

    // ------------------------------------------------------------------
    // best-effort behavior against a live (fake) target
    // ------------------------------------------------------------------

    struct ShowTablesFactory {
        tables: Vec<&'static str>,
    }

    struct ShowTablesSession {
        tables: Vec<&'static str>,
    }

    impl SessionFactory for ShowTablesFactory {
        type Session = ShowTablesSession;

        fn connect(
            &self,
            _profile: &ResolvedProfile,
            _connect_timeout: Duration,
            _read_timeout: Option<Duration>,
        ) -> Result<ShowTablesSession, mysql::Error> {
            Ok(ShowTablesSession {
                tables: self.tables.clone(),
            })
        }
    }

    impl Session for ShowTablesSession {
        fn fetch(&mut self, _sql: &str, _max_rows: usize) -> Result<TableData, mysql::Error> {
            Ok(TableData {
                columns: vec!["Tables_in_ws1".to_string()],
                rows: self.tables.iter().map(|t| vec![Json::from(*t)]).collect(),
            })
        }
    }

    struct UnreachableFactory;

    impl SessionFactory for UnreachableFactory {
        type Session = ShowTablesSession;

        fn connect(
            &self,
            _profile: &ResolvedProfile,
            _connect_timeout: Duration,
            _read_timeout: Option<Duration>,
        ) -> Result<ShowTablesSession, mysql::Error> {
            Err(mysql::Error::MySqlError(mysql::error::MySqlError {
                state: "HY000".to_string(),
                code: 2003,
                message: "Can't connect to MySQL server".to_string(),
            }))
        }
    }

    #[test]
    fn repair_uses_live_table_casing() {
        let registry = registry_with(&["WS1"]);
        let factory = ShowTablesFactory {
            tables: vec!["Products"],
        };

        let repaired = repair_with(&factory, "SELECT * FROM products", "WS1", &registry);
        assert_eq!(repaired, "SELECT * FROM Products");
    }

    #[test]
    fn repair_returns_input_when_target_unreachable() {
        let registry = registry_with(&["WS1"]);
        let sql = "SELECT * FROM products";

        assert_eq!(repair_with(&UnreachableFactory, sql, "WS1", &registry), sql);
    }

    #[test]
    fn repair_returns_input_for_unknown_target() {
        let registry = registry_with(&["WS1"]);
        let factory = ShowTablesFactory { tables: vec![] };
        let sql = "SELECT * FROM products";

        assert_eq!(repair_with(&factory, sql, "WS9", &registry), sql);
    }
}
