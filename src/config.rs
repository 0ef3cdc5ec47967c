use std::env;
use std::fmt;
use std::time::Duration;

/// URL that selects the in-process store instead of Postgres
pub const MEMORY_DATABASE_URL: &str = "memory://";

/// Which persistence substrate backs the repositories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
    pub test_before_acquire: bool,
}

/// Application configuration
#[derive(Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub log_level: String,
    pub environment: String,
    pub app_name: String,
    /// CORS origins for the transport layer that serves `AppState`
    /// (`ALLOWED_ORIGINS`, comma separated)
    pub allowed_origins: Vec<String>,
    /// Token-signing key for that transport layer; never printed
    pub secret_key: String,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("database", &self.database)
            .field("log_level", &self.log_level)
            .field("environment", &self.environment)
            .field("app_name", &self.app_name)
            .field("allowed_origins", &self.allowed_origins)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse::<T>().ok())
        .unwrap_or(default)
}

impl DatabaseConfig {
    /// Create database config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let url = env::var("DATABASE_URL")
            .map_err(|_| "DATABASE_URL environment variable is required")?;

        let config = Self {
            url,
            max_connections: env_parsed("DATABASE_MAX_CONNECTIONS", 10),
            acquire_timeout_secs: env_parsed("DATABASE_ACQUIRE_TIMEOUT_SECS", 30),
            idle_timeout_secs: env_parsed("DATABASE_IDLE_TIMEOUT_SECS", 600), // 10 minutes
            max_lifetime_secs: env_parsed("DATABASE_MAX_LIFETIME_SECS", 1800), // 30 minutes
            test_before_acquire: env_parsed("DATABASE_TEST_BEFORE_ACQUIRE", true),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.url.trim().is_empty() {
            return Err("DATABASE_URL must not be empty".to_string());
        }

        if self.max_connections == 0 {
            return Err("DATABASE_MAX_CONNECTIONS must be greater than 0".to_string());
        }

        if self.acquire_timeout_secs == 0 {
            return Err("DATABASE_ACQUIRE_TIMEOUT_SECS must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Config for the in-process store
    pub fn in_memory() -> Self {
        Self {
            url: MEMORY_DATABASE_URL.to_string(),
            ..Self::default()
        }
    }

    pub fn backend(&self) -> StoreBackend {
        if self.url.starts_with(MEMORY_DATABASE_URL) {
            StoreBackend::Memory
        } else {
            StoreBackend::Postgres
        }
    }

    /// Get acquire timeout as Duration
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    /// Get idle timeout as Duration
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Get max lifetime as Duration
    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/paisasplit".to_string(),
            max_connections: 10,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 600,
            max_lifetime_secs: 1800,
            test_before_acquire: true,
        }
    }
}

impl AppConfig {
    /// Create application config from environment variables (and `.env`)
    pub fn from_env() -> Result<Self, String> {
        dotenv::dotenv().ok();

        let database = DatabaseConfig::from_env()?;

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let app_name = env::var("APP_NAME").unwrap_or_else(|_| "PaisaSplit API".to_string());

        let allowed_origins = env::var("ALLOWED_ORIGINS")
            .map(|raw| parse_origins(&raw))
            .unwrap_or_else(|_| default_origins());

        let secret_key = env::var("SECRET_KEY").unwrap_or_default();

        let config = Self {
            database,
            log_level: log_level.to_lowercase(),
            environment: environment.to_lowercase(),
            app_name,
            allowed_origins,
            secret_key,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        // Validate log level
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid LOG_LEVEL: {}. Must be one of: {:?}",
                self.log_level, valid_log_levels
            ));
        }

        // Validate environment
        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&self.environment.as_str()) {
            return Err(format!(
                "Invalid ENVIRONMENT: {}. Must be one of: {:?}",
                self.environment, valid_environments
            ));
        }

        if self.is_production() && self.secret_key.len() < 32 {
            return Err("SECRET_KEY must be at least 32 characters in production".to_string());
        }

        self.database.validate()
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Check if running in development
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            log_level: "info".to_string(),
            environment: "development".to_string(),
            app_name: "PaisaSplit API".to_string(),
            allowed_origins: default_origins(),
            secret_key: String::new(),
        }
    }
}

fn default_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:8081".to_string(),
        "exp://localhost:8081".to_string(),
    ]
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
