//! Application settings read from environment variables.

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use todo_search_repository::{DataSourceConfig, SearchResourceNames, SearchServiceConfig};
use todo_store_repository::config::{DEFAULT_COLLECTION, DEFAULT_DATABASE, DEFAULT_PARTITION_KEY_PATH};
use todo_store_repository::StoreConfig;
use todo_sync::CoordinatorConfig;
use tracing::warn;

use crate::AppError;

/// Default listen address.
const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:8080";

/// Default connection retry interval in seconds.
const DEFAULT_RETRY_INTERVAL_SECS: u64 = 15;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Endpoint placeholder when the search index is held in memory.
const MEMORY_SEARCH_ENDPOINT: &str = "http://localhost";

const DEFAULT_CORS_ORIGINS: &str =
    "http://localhost:3000,http://localhost:5173,http://127.0.0.1:3000,http://127.0.0.1:5173";

/// Connection mode for the backing services at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Fail immediately if a connection fails.
    FailFast,
    /// Retry every retry interval until successful.
    Retry,
}

impl ConnectionMode {
    /// Valid values: "fail-fast" or "retry" (case-insensitive).
    /// Defaults to "retry" if not set or invalid.
    fn parse(value: Option<String>) -> Self {
        match value
            .unwrap_or_else(|| "retry".to_string())
            .to_lowercase()
            .as_str()
        {
            "fail-fast" | "failfast" | "fail_fast" => Self::FailFast,
            "retry" => Self::Retry,
            _ => {
                warn!("Invalid STARTUP_CONNECTION_MODE, defaulting to 'retry'");
                Self::Retry
            }
        }
    }
}

/// Where items are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

/// Where the search index lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchBackend {
    Rest,
    Memory,
}

/// Who keeps the index in step with the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// The in-process coordinator pushes changes into the index.
    Embedded,
    /// The search service's indexer pulls from the store on its own schedule.
    Managed,
}

/// Complete application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub store: StoreConfig,
    pub search_backend: SearchBackend,
    pub search: SearchServiceConfig,
    pub sync_mode: SyncMode,
    pub coordinator: CoordinatorConfig,
    pub connection_mode: ConnectionMode,
    pub retry_interval: Duration,
    pub server_addr: SocketAddr,
    pub cors_origins: Vec<String>,
}

fn parse_number<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, AppError> {
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::config(format!("{} must be a number, got '{}'", key, value))),
        None => Ok(default),
    }
}

/// Name the store database in a data source connection string unless it
/// already does, so the managed indexer reads the same database as the app.
fn with_database_id(connection: &str, database: &str) -> String {
    let names_database = connection.split(';').any(|segment| {
        segment
            .split_once('=')
            .map(|(key, _)| {
                let key = key.trim();
                key.eq_ignore_ascii_case("DatabaseId") || key.eq_ignore_ascii_case("Database")
            })
            .unwrap_or(false)
    });
    if names_database {
        return connection.to_string();
    }
    format!("{};DatabaseId={}", connection.trim_end_matches(';'), database)
}

impl AppConfig {
    /// Read the configuration from the process environment.
    ///
    /// # Environment Variables
    ///
    /// - `STORE_BACKEND`: "postgres" or "memory" (default: postgres)
    /// - `DATABASE_URL`: PostgreSQL URL, required for the postgres backend
    /// - `TODO_DATABASE` / `TODO_COLLECTION` / `TODO_PARTITION_KEY_PATH`
    /// - `SEARCH_BACKEND`: "rest" or "memory" (default: rest)
    /// - `SEARCH_ENDPOINT` / `SEARCH_API_KEY`: required for the rest backend
    /// - `SEARCH_API_VERSION`, `SEARCH_INDEX`, `SEARCH_INDEXER`, `SEARCH_DATASOURCE`
    /// - `SEARCH_DATASOURCE_TYPE` / `SEARCH_DATASOURCE_CONNECTION`: the
    ///   connection is required in managed mode and gets `DatabaseId` appended
    ///   when it does not name a database
    /// - `SYNC_MODE`: "embedded" or "managed" (default: embedded). Managed mode
    ///   needs the rest backend; embedded mode needs the `/id` partition path
    /// - `SYNC_INTERVAL_SECS` / `SYNC_SCAN_OVERLAP_MS` / `SYNC_CYCLE_TIMEOUT_SECS`
    /// - `REQUEST_TIMEOUT_SECS`: deadline for store and search calls (default: 30)
    /// - `STARTUP_CONNECTION_MODE`: "fail-fast" or "retry" (default: retry)
    /// - `STARTUP_RETRY_INTERVAL_SECS`: retry interval in seconds (default: 15)
    /// - `SERVER_ADDR`: listen address (default: 127.0.0.1:8080)
    /// - `CORS_ALLOWED_ORIGINS`: comma-separated browser origins
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok().filter(|v| !v.is_empty()))
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let store_backend = match lookup("STORE_BACKEND").as_deref() {
            None | Some("postgres") => StoreBackend::Postgres,
            Some("memory") => StoreBackend::Memory,
            Some(other) => {
                return Err(AppError::config(format!(
                    "STORE_BACKEND must be 'postgres' or 'memory', got '{}'",
                    other
                )))
            }
        };
        let database_url = lookup("DATABASE_URL");
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(AppError::config("DATABASE_URL is required for the postgres store"));
        }

        let request_timeout = Duration::from_secs(parse_number(
            &lookup,
            "REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?);

        let store = StoreConfig::new(
            lookup("TODO_DATABASE").unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
            lookup("TODO_COLLECTION").unwrap_or_else(|| DEFAULT_COLLECTION.to_string()),
        )
        .with_partition_key_path(
            lookup("TODO_PARTITION_KEY_PATH").unwrap_or_else(|| DEFAULT_PARTITION_KEY_PATH.to_string()),
        )
        .with_operation_timeout(request_timeout);
        store.validate()?;

        let search_backend = match lookup("SEARCH_BACKEND").as_deref() {
            None | Some("rest") => SearchBackend::Rest,
            Some("memory") => SearchBackend::Memory,
            Some(other) => {
                return Err(AppError::config(format!(
                    "SEARCH_BACKEND must be 'rest' or 'memory', got '{}'",
                    other
                )))
            }
        };

        let sync_mode = match lookup("SYNC_MODE").as_deref() {
            None | Some("embedded") => SyncMode::Embedded,
            Some("managed") => SyncMode::Managed,
            Some(other) => {
                return Err(AppError::config(format!(
                    "SYNC_MODE must be 'embedded' or 'managed', got '{}'",
                    other
                )))
            }
        };
        match sync_mode {
            SyncMode::Managed if search_backend == SearchBackend::Memory => {
                return Err(AppError::config(
                    "SYNC_MODE=managed needs a search service indexer; use SEARCH_BACKEND=rest",
                ));
            }
            // Index entries, ledger and live keys are keyed by id alone
            SyncMode::Embedded if store.partition_key_path != "/id" => {
                return Err(AppError::config(format!(
                    "SYNC_MODE=embedded requires TODO_PARTITION_KEY_PATH=/id, got '{}'",
                    store.partition_key_path
                )));
            }
            _ => {}
        }

        let search = Self::search_config(&lookup, search_backend, sync_mode, &store, request_timeout)?;

        let defaults = CoordinatorConfig::default();
        let coordinator = CoordinatorConfig {
            interval: Duration::from_secs(parse_number(
                &lookup,
                "SYNC_INTERVAL_SECS",
                defaults.interval.as_secs(),
            )?),
            scan_overlap: Duration::from_millis(parse_number(
                &lookup,
                "SYNC_SCAN_OVERLAP_MS",
                defaults.scan_overlap.as_millis() as u64,
            )?),
            cycle_timeout: Duration::from_secs(parse_number(
                &lookup,
                "SYNC_CYCLE_TIMEOUT_SECS",
                defaults.cycle_timeout.as_secs(),
            )?),
            ..defaults
        };
        if coordinator.interval.is_zero() {
            return Err(AppError::config("SYNC_INTERVAL_SECS must be positive"));
        }

        let server_addr = lookup("SERVER_ADDR")
            .unwrap_or_else(|| DEFAULT_SERVER_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| AppError::config(format!("SERVER_ADDR is invalid: {}", e)))?;

        let cors_origins = lookup("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| DEFAULT_CORS_ORIGINS.to_string())
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            store_backend,
            database_url,
            store,
            search_backend,
            search,
            sync_mode,
            coordinator,
            connection_mode: ConnectionMode::parse(lookup("STARTUP_CONNECTION_MODE")),
            retry_interval: Duration::from_secs(parse_number(
                &lookup,
                "STARTUP_RETRY_INTERVAL_SECS",
                DEFAULT_RETRY_INTERVAL_SECS,
            )?),
            server_addr,
            cors_origins,
        })
    }

    fn search_config(
        lookup: &impl Fn(&str) -> Option<String>,
        backend: SearchBackend,
        sync_mode: SyncMode,
        store: &StoreConfig,
        request_timeout: Duration,
    ) -> Result<SearchServiceConfig, AppError> {
        let (endpoint, api_key) = match backend {
            SearchBackend::Rest => (
                lookup("SEARCH_ENDPOINT")
                    .ok_or_else(|| AppError::config("SEARCH_ENDPOINT is required for the rest search backend"))?,
                lookup("SEARCH_API_KEY")
                    .ok_or_else(|| AppError::config("SEARCH_API_KEY is required for the rest search backend"))?,
            ),
            SearchBackend::Memory => (MEMORY_SEARCH_ENDPOINT.to_string(), String::new()),
        };

        let defaults = SearchResourceNames::default();
        let names = SearchResourceNames {
            index: lookup("SEARCH_INDEX").unwrap_or(defaults.index),
            indexer: lookup("SEARCH_INDEXER").unwrap_or(defaults.indexer),
            datasource: lookup("SEARCH_DATASOURCE").unwrap_or(defaults.datasource),
        };

        let mut datasource = DataSourceConfig {
            container: store.collection.clone(),
            ..DataSourceConfig::default()
        };
        if let Some(kind) = lookup("SEARCH_DATASOURCE_TYPE") {
            datasource.kind = kind;
        }
        match (sync_mode, lookup("SEARCH_DATASOURCE_CONNECTION")) {
            (SyncMode::Managed, None) => {
                return Err(AppError::config(
                    "SEARCH_DATASOURCE_CONNECTION is required when SYNC_MODE=managed",
                ));
            }
            (SyncMode::Managed, Some(connection)) => {
                datasource.connection_string = with_database_id(&connection, &store.database);
            }
            (SyncMode::Embedded, Some(connection)) => datasource.connection_string = connection,
            (SyncMode::Embedded, None) => {}
        }

        let mut config = SearchServiceConfig::new(&endpoint, api_key)
            .map_err(|e| AppError::config(format!("SEARCH_ENDPOINT: {}", e)))?
            .with_names(names)
            .with_datasource(datasource)
            .with_request_timeout(request_timeout);
        if let Some(version) = lookup("SEARCH_API_VERSION") {
            config = config.with_api_version(version);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, AppError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(move |key| vars.get(key).cloned())
    }

    #[test]
    fn test_memory_profile_defaults() {
        let config = config(&[("STORE_BACKEND", "memory"), ("SEARCH_BACKEND", "memory")]).unwrap();

        assert_eq!(config.sync_mode, SyncMode::Embedded);
        assert_eq!(config.connection_mode, ConnectionMode::Retry);
        assert_eq!(config.retry_interval, Duration::from_secs(15));
        assert_eq!(config.server_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.store.collection, "items");
        assert_eq!(config.search.names.index, "todo");
        assert_eq!(config.search.datasource.kind, "documentdb");
        assert_eq!(config.search.datasource.container, "items");
        assert_eq!(config.coordinator.interval, Duration::from_secs(300));
        assert_eq!(config.coordinator.scan_overlap, Duration::from_millis(5000));
        assert_eq!(config.cors_origins.len(), 4);
    }

    #[test]
    fn test_rest_backend_requires_credentials() {
        let result = config(&[("STORE_BACKEND", "memory")]);
        assert!(matches!(result, Err(AppError::ConfigError(_))));

        let config = config(&[
            ("STORE_BACKEND", "memory"),
            ("SEARCH_ENDPOINT", "https://todo.search.example.net"),
            ("SEARCH_API_KEY", "secret"),
            ("SEARCH_INDEX", "tasks"),
        ])
        .unwrap();
        assert_eq!(config.search_backend, SearchBackend::Rest);
        assert_eq!(config.search.names.index, "tasks");
        assert_eq!(config.sync_mode, SyncMode::Embedded);
    }

    const MANAGED: [(&str, &str); 4] = [
        ("STORE_BACKEND", "memory"),
        ("SEARCH_ENDPOINT", "https://todo.search.example.net"),
        ("SEARCH_API_KEY", "secret"),
        ("SYNC_MODE", "managed"),
    ];

    #[test]
    fn test_managed_mode_requires_datasource_connection() {
        let result = config(&MANAGED);

        match result {
            Err(AppError::ConfigError(message)) => {
                assert!(message.contains("SEARCH_DATASOURCE_CONNECTION"))
            }
            other => panic!("unexpected result: {:?}", other.map(|c| c.sync_mode)),
        }
    }

    #[test]
    fn test_managed_datasource_names_store_database() {
        let mut vars = MANAGED.to_vec();
        vars.push(("TODO_DATABASE", "tasks"));
        vars.push(("SEARCH_DATASOURCE_CONNECTION", "AccountName=acct;AuthKey=key;"));

        let config = config(&vars).unwrap();

        assert_eq!(config.sync_mode, SyncMode::Managed);
        assert_eq!(
            config.search.datasource.connection_string,
            "AccountName=acct;AuthKey=key;DatabaseId=tasks"
        );
    }

    #[test]
    fn test_managed_datasource_keeps_explicit_database() {
        let mut vars = MANAGED.to_vec();
        vars.push(("SEARCH_DATASOURCE_CONNECTION", "AccountEndpoint=x;Database=other"));

        let config = config(&vars).unwrap();

        assert_eq!(
            config.search.datasource.connection_string,
            "AccountEndpoint=x;Database=other"
        );
    }

    #[test]
    fn test_managed_mode_rejects_memory_search() {
        let result = config(&[
            ("STORE_BACKEND", "memory"),
            ("SEARCH_BACKEND", "memory"),
            ("SYNC_MODE", "managed"),
            ("SEARCH_DATASOURCE_CONNECTION", "AccountName=acct;AuthKey=key"),
        ]);

        assert!(matches!(result, Err(AppError::ConfigError(_))));
    }

    #[test]
    fn test_embedded_mode_requires_id_partition_path() {
        let result = config(&[
            ("STORE_BACKEND", "memory"),
            ("SEARCH_BACKEND", "memory"),
            ("TODO_PARTITION_KEY_PATH", "/owner"),
        ]);
        assert!(matches!(result, Err(AppError::ConfigError(_))));

        let mut vars = MANAGED.to_vec();
        vars.push(("TODO_PARTITION_KEY_PATH", "/owner"));
        vars.push(("SEARCH_DATASOURCE_CONNECTION", "AccountName=acct;AuthKey=key"));
        let config = config(&vars).unwrap();
        assert_eq!(config.store.partition_key_path, "/owner");
    }

    #[test]
    fn test_postgres_requires_database_url() {
        let result = config(&[("SEARCH_BACKEND", "memory")]);
        assert!(matches!(result, Err(AppError::ConfigError(_))));
    }

    #[test]
    fn test_rejects_malformed_values() {
        let base = [("STORE_BACKEND", "memory"), ("SEARCH_BACKEND", "memory")];

        let mut vars = base.to_vec();
        vars.push(("SYNC_INTERVAL_SECS", "soon"));
        assert!(config(&vars).is_err());

        let mut vars = base.to_vec();
        vars.push(("SYNC_MODE", "sometimes"));
        assert!(config(&vars).is_err());

        let mut vars = base.to_vec();
        vars.push(("TODO_COLLECTION", "bad name"));
        assert!(config(&vars).is_err());
    }

    #[test]
    fn test_connection_mode_parsing() {
        assert_eq!(ConnectionMode::parse(Some("FAIL-FAST".into())), ConnectionMode::FailFast);
        assert_eq!(ConnectionMode::parse(None), ConnectionMode::Retry);
        assert_eq!(ConnectionMode::parse(Some("bogus".into())), ConnectionMode::Retry);
    }
}
