use std::env;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    Var(#[from] env::VarError),

    #[error("Unknown ITEM_STORE value {0:?} (expected \"postgres\" or \"memory\")")]
    UnknownStore(String),
}

/// Which Record Store backend the server runs against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub server_host: String,
    pub server_port: u16,
    pub db_max_connections: u32,
    pub run_migrations: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key))
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        let store_backend = match lookup("ITEM_STORE").ok().as_deref() {
            None | Some("") | Some("postgres") => StoreBackend::Postgres,
            Some("memory") => StoreBackend::Memory,
            Some(other) => return Err(ConfigError::UnknownStore(other.to_string())),
        };

        let database_url = match store_backend {
            StoreBackend::Postgres => Some(lookup("DATABASE_URL")?),
            StoreBackend::Memory => lookup("DATABASE_URL").ok(),
        };

        Ok(Config {
            store_backend,
            database_url,
            server_host: lookup("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: lookup("SERVER_PORT")
                .unwrap_or_else(|_| "2022".to_string())
                .parse()
                .unwrap_or(2022),
            db_max_connections: lookup("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            run_migrations: lookup("RUN_MIGRATIONS")
                .map(|v| !matches!(v.as_str(), "0" | "false" | "no"))
                .unwrap_or(true),
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Result<String, env::VarError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned().ok_or(env::VarError::NotPresent)
    }

    #[test]
    fn test_defaults_with_database_url() {
        let config =
            Config::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://localhost/market")]))
                .unwrap();
        assert_eq!(config.store_backend, StoreBackend::Postgres);
        assert_eq!(config.server_addr(), "0.0.0.0:2022");
        assert_eq!(config.db_max_connections, 10);
        assert!(config.run_migrations);
    }

    #[test]
    fn test_postgres_requires_database_url() {
        assert!(Config::from_lookup(lookup_from(&[])).is_err());
    }

    #[test]
    fn test_unknown_store_is_rejected() {
        let result = Config::from_lookup(lookup_from(&[
            ("ITEM_STORE", "memroy"),
            ("DATABASE_URL", "postgres://localhost/market"),
        ]));
        assert!(matches!(result, Err(ConfigError::UnknownStore(v)) if v == "memroy"));
    }

    #[test]
    fn test_explicit_postgres_backend() {
        let config = Config::from_lookup(lookup_from(&[
            ("ITEM_STORE", "postgres"),
            ("DATABASE_URL", "postgres://localhost/market"),
        ]))
        .unwrap();
        assert_eq!(config.store_backend, StoreBackend::Postgres);
    }

    #[test]
    fn test_memory_backend_without_database() {
        let config = Config::from_lookup(lookup_from(&[
            ("ITEM_STORE", "memory"),
            ("SERVER_PORT", "50051"),
            ("RUN_MIGRATIONS", "false"),
        ]))
        .unwrap();
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert!(config.database_url.is_none());
        assert_eq!(config.server_port, 50051);
        assert!(!config.run_migrations);
    }
}
