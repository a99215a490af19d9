use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub query: QueryConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    /// Base URL used when building links sent by mail (password reset)
    pub public_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    pub default_limit: u64,
    pub max_limit: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Postgres connection string; the in-memory store is used when unset
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub jwt_expiry_secs: u64,
    pub password_reset_expiry_secs: u64,
    pub cookie_secure: bool,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("JWT_SECRET must be set outside development")]
    MissingSecret,

    #[error("JWT_SECRET must be at least {min} bytes in {environment:?}")]
    WeakSecret { min: usize, environment: Environment },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("{name} must not exceed {max} seconds")]
    TooLong { name: &'static str, max: u64 },
}

impl SecurityConfig {
    /// Longest accepted token or reset-link lifetime (ten years)
    pub const MAX_EXPIRY_SECS: u64 = 10 * 365 * 24 * 60 * 60;

    pub fn jwt_ttl(&self) -> Duration {
        Self::bounded(self.jwt_expiry_secs)
    }

    pub fn password_reset_ttl(&self) -> Duration {
        Self::bounded(self.password_reset_expiry_secs)
    }

    fn bounded(secs: u64) -> Duration {
        let secs = i64::try_from(secs.min(Self::MAX_EXPIRY_SECS)).unwrap_or_default();
        Duration::try_seconds(secs).unwrap_or_else(Duration::zero)
    }
}

impl AppConfig {
    pub const MIN_SECRET_LEN: usize = 32;

    // Only ever used by development profiles
    const DEVELOPMENT_SECRET: &'static str = "tours-api-development-secret-do-not-deploy";

    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Some(port) = env::var("TOURS_API_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|v| v.parse().ok())
        {
            self.server.port = port;
        }
        if let Ok(v) = env::var("PUBLIC_URL") {
            self.server.public_url = v.trim_end_matches('/').to_string();
        }

        // Query overrides
        if let Ok(v) = env::var("QUERY_DEFAULT_LIMIT") {
            self.query.default_limit = v.parse().unwrap_or(self.query.default_limit);
        }
        if let Ok(v) = env::var("QUERY_MAX_LIMIT") {
            self.query.max_limit = v.parse().unwrap_or(self.query.max_limit);
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v).filter(|v| !v.trim().is_empty());
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // Security overrides
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("JWT_EXPIRES_IN_SECS") {
            self.security.jwt_expiry_secs = v.parse().unwrap_or(self.security.jwt_expiry_secs);
        }
        if let Ok(v) = env::var("PASSWORD_RESET_EXPIRES_IN_SECS") {
            self.security.password_reset_expiry_secs =
                v.parse().unwrap_or(self.security.password_reset_expiry_secs);
        }
        if let Ok(v) = env::var("SECURITY_COOKIE_SECURE") {
            self.security.cookie_secure = v.parse().unwrap_or(self.security.cookie_secure);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        self
    }

    /// Reject configurations the service must not start with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.security.jwt_secret.is_empty() {
            return Err(ConfigError::MissingSecret);
        }
        if self.environment != Environment::Development
            && self.security.jwt_secret.len() < Self::MIN_SECRET_LEN
        {
            return Err(ConfigError::WeakSecret {
                min: Self::MIN_SECRET_LEN,
                environment: self.environment,
            });
        }
        if self.security.jwt_expiry_secs == 0 {
            return Err(ConfigError::Zero("JWT_EXPIRES_IN_SECS"));
        }
        for (name, secs) in [
            ("JWT_EXPIRES_IN_SECS", self.security.jwt_expiry_secs),
            ("PASSWORD_RESET_EXPIRES_IN_SECS", self.security.password_reset_expiry_secs),
        ] {
            if secs > SecurityConfig::MAX_EXPIRY_SECS {
                return Err(ConfigError::TooLong { name, max: SecurityConfig::MAX_EXPIRY_SECS });
            }
        }
        if self.query.default_limit == 0 {
            return Err(ConfigError::Zero("QUERY_DEFAULT_LIMIT"));
        }
        if self.query.max_limit == 0 {
            return Err(ConfigError::Zero("QUERY_MAX_LIMIT"));
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                port: 3000,
                public_url: "http://127.0.0.1:3000".to_string(),
            },
            query: QueryConfig {
                default_limit: 100,
                max_limit: 1000,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
            },
            security: SecurityConfig {
                jwt_secret: Self::DEVELOPMENT_SECRET.to_string(),
                jwt_expiry_secs: 90 * 24 * 60 * 60, // 90 days
                password_reset_expiry_secs: 10 * 60,
                cookie_secure: false,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
            },
        }
    }

    pub fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                port: 3000,
                public_url: "https://staging.example.com".to_string(),
            },
            query: QueryConfig {
                default_limit: 100,
                max_limit: 500,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 20,
                connection_timeout: 10,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_secs: 7 * 24 * 60 * 60,
                password_reset_expiry_secs: 10 * 60,
                cookie_secure: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
            },
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                port: 3000,
                public_url: "https://app.example.com".to_string(),
            },
            query: QueryConfig {
                default_limit: 100,
                max_limit: 100,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 50,
                connection_timeout: 5,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_secs: 24 * 60 * 60,
                password_reset_expiry_secs: 10 * 60,
                cookie_secure: true,
                cors_origins: vec!["https://app.example.com".to_string()],
            },
        }
    }
}
