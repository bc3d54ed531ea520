//! Application configuration management.

use serde::Deserialize;
use uuid::Uuid;

pub use config::ConfigError;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Ledger behaviour configuration.
    #[serde(default)]
    pub ledger: LedgerConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Logging configuration consumed by the binaries when installing the
/// tracing subscriber.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    #[serde(default = "default_log_filter")]
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_log_filter() -> String {
    "obligo=info,seeder=info,sea_orm=warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
        }
    }
}

/// Ledger behaviour configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Upper edges (in days overdue) of the aging buckets.
    #[serde(default = "default_aging_edges")]
    pub aging_bucket_edges: Vec<i64>,
    /// Entity used by the development seeder.
    #[serde(default = "default_demo_entity")]
    pub demo_entity_id: Uuid,
}

fn default_aging_edges() -> Vec<i64> {
    vec![7, 30, 60, 90]
}

fn default_demo_entity() -> Uuid {
    Uuid::from_u128(1)
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            aging_bucket_edges: default_aging_edges(),
            demo_entity_id: default_demo_entity(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// Sources, lowest precedence first: `config/default`, `config/{RUN_MODE}`,
    /// then `OBLIGO__SECTION__KEY` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(
                config::Environment::with_prefix("OBLIGO")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("ledger.aging_bucket_edges")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_environment() {
        temp_env::with_vars(
            [
                ("OBLIGO__DATABASE__URL", Some("postgres://localhost/obligo_test")),
                ("OBLIGO__DATABASE__MAX_CONNECTIONS", Some("4")),
                ("OBLIGO__LOGGING__JSON", Some("true")),
                ("RUN_MODE", Some("test-nonexistent")),
            ],
            || {
                let config = AppConfig::load().unwrap();
                assert_eq!(config.database.url, "postgres://localhost/obligo_test");
                assert_eq!(config.database.max_connections, 4);
                assert_eq!(config.database.min_connections, 1);
                assert!(config.logging.json);
                assert_eq!(config.ledger.aging_bucket_edges, vec![7, 30, 60, 90]);
            },
        );
    }

    #[test]
    fn test_aging_edges_from_environment_list() {
        temp_env::with_vars(
            [
                ("OBLIGO__DATABASE__URL", Some("postgres://localhost/obligo_test")),
                ("OBLIGO__LEDGER__AGING_BUCKET_EDGES", Some("15,45")),
                ("RUN_MODE", Some("test-nonexistent")),
            ],
            || {
                let config = AppConfig::load().unwrap();
                assert_eq!(config.ledger.aging_bucket_edges, vec![15, 45]);
            },
        );
    }

    #[test]
    fn test_missing_database_url_is_an_error() {
        temp_env::with_vars(
            [
                ("OBLIGO__DATABASE__URL", None::<&str>),
                ("RUN_MODE", Some("test-nonexistent")),
            ],
            || {
                assert!(AppConfig::load().is_err());
            },
        );
    }

    #[test]
    fn test_logging_defaults() {
        let logging = LoggingConfig::default();
        assert_eq!(logging.filter, "obligo=info,seeder=info,sea_orm=warn");
        assert!(!logging.json);
    }
}
