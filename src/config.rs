use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::time::Duration;
use anyhow::Result;

/// Hard cap on rows fetched from a practice database per query.
pub const MAX_ROWS: usize = 1000;

/// Bound on total query execution (socket read timeout).
pub const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Bound on establishing a connection to a practice database.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Shorter bound used when probing sibling databases for error hints
/// and when introspecting table names. Probes are best-effort and must
/// not hold up the caller.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

const DEFAULT_MYSQL_PORT: u16 = 3306;

fn default_port() -> u16 {
    DEFAULT_MYSQL_PORT
}

/// Connection profile for one named practice database.
///
/// Fields are optional so that a partially configured deployment is
/// representable; the executor verifies completeness before it ever
/// opens a socket and reports the missing field by name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseTarget {
    pub host: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Database (schema) name on the server. Usually equal to the
    /// target's registry key.
    pub database: Option<String>,
}

impl DatabaseTarget {
    fn from_env(database: &str, env: &EnvCredentials) -> Self {
        Self {
            host: env.host.clone(),
            port: env.port,
            user: env.user.clone(),
            password: env.password.clone(),
            database: Some(database.to_string()),
        }
    }
}

struct EnvCredentials {
    host: Option<String>,
    port: u16,
    user: Option<String>,
    password: Option<String>,
}

impl EnvCredentials {
    fn read() -> Self {
        let port = std::env::var("WS_DB_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(DEFAULT_MYSQL_PORT);

        Self {
            host: std::env::var("WS_DB_HOST").ok(),
            port,
            user: std::env::var("WS_DB_USER").ok(),
            password: std::env::var("WS_DB_PASSWORD").ok(),
        }
    }
}

/// Names given to targets when no config file supplies its own set:
/// the workshop fleet plus the standalone practice schemas.
const DEFAULT_TARGETS: &[&str] = &[
    "WS1", "WS2", "WS3", "WS4", "WS5", "WS6", "WS7", "WS8", "WS9", "WS10", "WS11",
    "practice_hr", "practice_ecommerce", "practice_school",
];

/// Immutable mapping from target identifier to connection profile.
///
/// Built once at process start and then only read; entry points take it
/// by shared reference, so concurrent invocations need no locking.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetRegistry {
    targets: BTreeMap<String, DatabaseTarget>,
}

impl TargetRegistry {
    /// Load the registry from `practice_targets.json` if present,
    /// otherwise synthesize the default fleet. In both cases the shared
    /// `WS_DB_*` environment variables fill in any profile fields the
    /// file left unset.
    pub fn load() -> Result<Self> {
        let env = EnvCredentials::read();

        let mut registry = match fs::read_to_string("practice_targets.json") {
            Ok(content) => {
                let registry: TargetRegistry = serde_json::from_str(&content)?;
                registry
            }
            Err(_) => {
                let mut targets = BTreeMap::new();
                for name in DEFAULT_TARGETS {
                    targets.insert(name.to_string(), DatabaseTarget::from_env(name, &env));
                }
                TargetRegistry { targets }
            }
        };

        // Environment credentials backfill profiles from the file too.
        for (name, target) in registry.targets.iter_mut() {
            if target.host.is_none() {
                target.host = env.host.clone();
            }
            if target.user.is_none() {
                target.user = env.user.clone();
            }
            if target.password.is_none() {
                target.password = env.password.clone();
            }
            if target.database.is_none() {
                target.database = Some(name.clone());
            }
        }

        Ok(registry)
    }

    /// Build a registry from an explicit set of profiles. Used by tests
    /// and by callers that manage configuration themselves.
    pub fn from_targets<I>(targets: I) -> Self
    where
        I: IntoIterator<Item = (String, DatabaseTarget)>,
    {
        Self {
            targets: targets.into_iter().collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&DatabaseTarget> {
        self.targets.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.targets.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.targets.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_target(db: &str) -> DatabaseTarget {
        DatabaseTarget {
            host: Some("127.0.0.1".to_string()),
            port: 3306,
            user: Some("practice".to_string()),
            password: Some("secret".to_string()),
            database: Some(db.to_string()),
        }
    }

    #[test]
    fn registry_lookup_by_name() {
        let registry = TargetRegistry::from_targets(vec![
            ("WS1".to_string(), complete_target("WS1")),
            ("WS2".to_string(), complete_target("WS2")),
        ]);

        assert!(registry.contains("WS1"));
        assert!(!registry.contains("WS3"));
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.get("WS2").and_then(|t| t.database.as_deref()),
            Some("WS2")
        );
    }

    #[test]
    fn names_are_sorted_for_stable_hints() {
        let registry = TargetRegistry::from_targets(vec![
            ("WS2".to_string(), complete_target("WS2")),
            ("WS1".to_string(), complete_target("WS1")),
        ]);

        let names: Vec<&str> = registry.names().collect();
        assert_eq!(names, vec!["WS1", "WS2"]);
    }

    #[test]
    fn default_port_applies_when_missing() {
        let json = r#"{"targets": {"WS1": {"host": "db.example.com"}}}"#;
        let registry: TargetRegistry = serde_json::from_str(json).unwrap();
        assert_eq!(registry.get("WS1").unwrap().port, 3306);
    }
}
