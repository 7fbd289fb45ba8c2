//! Application configuration module
//!
//! Handles loading and validating configuration from environment variables.

use crate::db::queries::validate_identifier;
use serde::Deserialize;
use std::net::Ipv4Addr;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
#[allow(dead_code)]
pub enum ConfigError {
    #[error("Failed to load environment variables: {0}")]
    EnvLoad(#[from] dotenvy::Error),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: Ipv4Addr,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Ipv4Addr::new(0, 0, 0, 0),
            port: 8080,
        }
    }
}

/// Database configuration for the governance store
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub max_pool_size: usize,
    pub require_tls: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: String::new(),
            database: "postgres".to_string(),
            max_pool_size: 10,
            require_tls: false,
        }
    }
}

/// CORS configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:5173".to_string()],
        }
    }
}

/// Where governance records are persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(ConfigError::InvalidValue(format!(
                "STORE_BACKEND must be 'postgres' or 'memory', got '{}'",
                other
            ))),
        }
    }
}

/// Governance workflow configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GovernanceConfig {
    /// Catalog used when a request does not name one
    pub target_catalog: String,
    /// Schema holding the governance table
    pub governance_schema: String,
    pub store_backend: StoreBackend,
    /// Failed apply attempts before a record is dead-lettered
    pub max_apply_attempts: u32,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            target_catalog: "main".to_string(),
            governance_schema: "governance".to_string(),
            store_backend: StoreBackend::Postgres,
            max_apply_attempts: 5,
        }
    }
}

/// Catalog server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    /// Server holding the catalogs; each catalog is a database on it
    pub server: DatabaseConfig,
    pub statement_timeout_ms: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            server: DatabaseConfig::default(),
            statement_timeout_ms: 30_000,
        }
    }
}

/// Accepted range for `GENERATOR_REQUESTS_PER_SECOND`
pub const MIN_REQUESTS_PER_SECOND: f64 = 0.01;
pub const MAX_REQUESTS_PER_SECOND: f64 = 1_000.0;

/// Model serving endpoint configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorConfig {
    pub base_url: String,
    pub endpoint: String,
    pub api_token: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub requests_per_second: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            endpoint: "databricks-meta-llama-3-1-70b-instruct".to_string(),
            api_token: String::new(),
            max_tokens: 200,
            temperature: 0.3,
            timeout_secs: 30,
            max_retries: 3,
            requests_per_second: 2.0,
        }
    }
}

/// Complete application settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cors: CorsConfig,
    pub governance: GovernanceConfig,
    pub catalog: CatalogConfig,
    pub generator: GeneratorConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            cors: CorsConfig::default(),
            governance: GovernanceConfig::default(),
            catalog: CatalogConfig::default(),
            generator: GeneratorConfig::default(),
        }
    }
}

impl Settings {
    /// Load settings from environment variables
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if it exists (ignore errors if file not found)
        let _ = dotenvy::dotenv();

        let server = ServerConfig {
            host: env_parse("HOST")?.unwrap_or_else(|| ServerConfig::default().host),
            port: env_parse("PORT")?.unwrap_or_else(|| ServerConfig::default().port),
        };

        // Try to load DATABASE_URL first, fall back to individual vars
        let database = if let Ok(database_url) = std::env::var("DATABASE_URL") {
            Self::parse_database_url(&database_url)?
        } else {
            let defaults = DatabaseConfig::default();
            DatabaseConfig {
                host: std::env::var("DB_HOST").unwrap_or(defaults.host),
                port: env_parse("DB_PORT")?.unwrap_or(defaults.port),
                user: std::env::var("DB_USER").unwrap_or(defaults.user),
                password: std::env::var("DB_PASSWORD").unwrap_or_default(),
                database: std::env::var("DB_NAME").unwrap_or(defaults.database),
                max_pool_size: env_parse("DB_MAX_CONNECTIONS")?.unwrap_or(defaults.max_pool_size),
                require_tls: false,
            }
        };

        let cors = CorsConfig {
            allowed_origins: std::env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(|| CorsConfig::default().allowed_origins),
        };

        let governance_defaults = GovernanceConfig::default();
        let governance = GovernanceConfig {
            target_catalog: std::env::var("TARGET_CATALOG")
                .unwrap_or(governance_defaults.target_catalog),
            governance_schema: std::env::var("GOVERNANCE_SCHEMA")
                .unwrap_or(governance_defaults.governance_schema),
            store_backend: env_parse("STORE_BACKEND")?
                .unwrap_or(governance_defaults.store_backend),
            max_apply_attempts: env_parse("APPLY_MAX_ATTEMPTS")?
                .unwrap_or(governance_defaults.max_apply_attempts),
        };

        let catalog = CatalogConfig {
            server: match std::env::var("CATALOG_URL") {
                Ok(url) => Self::parse_database_url(&url)?,
                Err(_) => database.clone(),
            },
            statement_timeout_ms: env_parse("CATALOG_STATEMENT_TIMEOUT_MS")?
                .unwrap_or(CatalogConfig::default().statement_timeout_ms),
        };

        let generator_defaults = GeneratorConfig::default();
        let generator = GeneratorConfig {
            base_url: std::env::var("MODEL_ENDPOINT_URL").unwrap_or(generator_defaults.base_url),
            endpoint: std::env::var("MODEL_ENDPOINT").unwrap_or(generator_defaults.endpoint),
            api_token: std::env::var("MODEL_API_TOKEN").unwrap_or_default(),
            max_tokens: env_parse("GENERATOR_MAX_TOKENS")?.unwrap_or(generator_defaults.max_tokens),
            temperature: env_parse("GENERATOR_TEMPERATURE")?
                .unwrap_or(generator_defaults.temperature),
            timeout_secs: env_parse("GENERATOR_TIMEOUT_SECS")?
                .unwrap_or(generator_defaults.timeout_secs),
            max_retries: env_parse("GENERATOR_MAX_RETRIES")?
                .unwrap_or(generator_defaults.max_retries),
            requests_per_second: env_parse("GENERATOR_REQUESTS_PER_SECOND")?
                .unwrap_or(generator_defaults.requests_per_second),
        };

        let settings = Self {
            server,
            database,
            cors,
            governance,
            catalog,
            generator,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values that would only fail later, deep inside a request
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_identifier(&self.governance.target_catalog, "TARGET_CATALOG")
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;
        validate_identifier(&self.governance.governance_schema, "GOVERNANCE_SCHEMA")
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        if self.governance.max_apply_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "APPLY_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }
        if !(MIN_REQUESTS_PER_SECOND..=MAX_REQUESTS_PER_SECOND).contains(&self.generator.requests_per_second) {
            return Err(ConfigError::InvalidValue(format!(
                "GENERATOR_REQUESTS_PER_SECOND must be between {} and {}",
                MIN_REQUESTS_PER_SECOND, MAX_REQUESTS_PER_SECOND
            )));
        }
        if !(0.0..=2.0).contains(&self.generator.temperature) {
            return Err(ConfigError::InvalidValue(
                "GENERATOR_TEMPERATURE must be between 0 and 2".to_string(),
            ));
        }
        url::Url::parse(&self.generator.base_url).map_err(|e| {
            ConfigError::InvalidValue(format!("MODEL_ENDPOINT_URL is not a valid URL: {}", e))
        })?;

        Ok(())
    }

    /// Parse a DATABASE_URL connection string (postgresql://...)
    fn parse_database_url(url: &str) -> Result<DatabaseConfig, ConfigError> {
        match url::Url::parse(url) {
            Ok(parsed) => {
                let host = parsed
                    .host_str()
                    .ok_or_else(|| ConfigError::InvalidValue("Missing host in DATABASE_URL".to_string()))?
                    .to_string();

                let port = parsed.port().unwrap_or(5432);

                let user = parsed.username().to_string();
                let password = parsed.password().map(|p| p.to_string()).unwrap_or_default();

                let database = parsed.path().trim_start_matches('/').to_string();
                if database.is_empty() {
                    return Err(ConfigError::InvalidValue(
                        "Missing database name in connection URL".to_string(),
                    ));
                }

                let require_tls = parsed
                    .query_pairs()
                    .any(|(k, v)| k == "sslmode" && v == "require");

                Ok(DatabaseConfig {
                    host,
                    port,
                    user,
                    password,
                    database,
                    max_pool_size: env_parse("DB_MAX_CONNECTIONS")?.unwrap_or(10),
                    require_tls,
                })
            }
            Err(_) => Err(ConfigError::InvalidValue(
                "Invalid DATABASE_URL format (expected postgresql://...)".to_string(),
            )),
        }
    }
}

/// Read and parse an optional environment variable
fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::ParseError(format!("{} has an invalid value: '{}'", name, raw))),
        Err(_) => Ok(None),
    }
}
