//! Configuration management for the loan service
//!
//! This module handles loading and validating configuration from environment variables,
//! with support for different environments (development, staging, production).

use std::env;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid environment value: {0}")]
    InvalidValue(String),

    #[error("Invalid port number: {0}")]
    InvalidPort(String),
}

/// Application environment
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    /// Parse environment from string
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "prod" | "production" => Ok(Environment::Production),
            _ => Err(ConfigError::InvalidValue(format!(
                "Invalid environment: '{}'. Expected: dev, staging, or prod",
                s
            ))),
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

/// Where loans are persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres { database_url: String },
    /// Process-local store, lost on restart
    Memory,
}

/// Mail relay used for investor agreement notices
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub from_address: String,
    pub recipient_domain: String,
}

/// Authenticated SMTP server for investor agreement notices
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
    pub recipient_domain: String,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,

    pub storage: StorageBackend,

    /// Server port
    pub port: u16,

    /// Maximum database connections
    pub db_max_connections: u32,

    /// CORS allowed origins
    pub cors_allowed_origins: Option<String>,

    /// Log level (RUST_LOG)
    pub log_level: String,

    /// Per-request deadline
    pub request_timeout_secs: u64,

    /// Attempts per lifecycle operation when a concurrent write wins
    pub max_conflict_retries: u32,

    /// Host that serves generated agreement letters
    pub agreement_base_url: String,

    /// Preferred over the relay when both are set
    pub smtp: Option<SmtpConfig>,

    /// None (with no SMTP server) means notices are only logged
    pub mail: Option<MailConfig>,
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors)
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .map(|s| Environment::parse(&s))
            .unwrap_or(Ok(Environment::Development))?;

        let storage = match env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "postgres".to_string())
            .to_lowercase()
            .as_str()
        {
            "postgres" => StorageBackend::Postgres {
                database_url: env::var("DATABASE_URL")
                    .map_err(|_| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?,
            },
            "memory" => StorageBackend::Memory,
            other => {
                return Err(ConfigError::InvalidValue(format!(
                    "Invalid storage backend: '{}'. Expected: postgres or memory",
                    other
                )))
            }
        };

        let port = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort("PORT must be a valid number".to_string()))?;

        let recipient_domain =
            env::var("MAIL_RECIPIENT_DOMAIN").unwrap_or_else(|_| "example.com".to_string());

        let smtp = match env::var("SMTP_HOST") {
            Ok(host) => {
                let username = env::var("SMTP_USERNAME")
                    .unwrap_or_else(|_| "noreply@example.com".to_string());
                Some(SmtpConfig {
                    host,
                    port: env::var("SMTP_PORT")
                        .unwrap_or_else(|_| "587".to_string())
                        .parse::<u16>()
                        .map_err(|_| {
                            ConfigError::InvalidPort("SMTP_PORT must be a valid number".to_string())
                        })?,
                    password: env::var("SMTP_PASSWORD")
                        .map_err(|_| ConfigError::MissingEnvVar("SMTP_PASSWORD".to_string()))?,
                    from_address: env::var("MAIL_FROM").unwrap_or_else(|_| username.clone()),
                    username,
                    recipient_domain: recipient_domain.clone(),
                })
            }
            Err(_) => None,
        };

        let mail = match env::var("MAIL_API_URL") {
            Ok(api_url) => Some(MailConfig {
                api_url,
                api_key: env::var("MAIL_API_KEY").ok(),
                from_address: env::var("MAIL_FROM")
                    .unwrap_or_else(|_| "noreply@example.com".to_string()),
                recipient_domain,
            }),
            Err(_) => None,
        };

        Ok(Config {
            environment,
            storage,
            port,
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", 5),
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS").ok(),
            log_level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            request_timeout_secs: parse_or("REQUEST_TIMEOUT_SECS", 30),
            max_conflict_retries: parse_or("MAX_CONFLICT_RETRIES", 3),
            agreement_base_url: env::var("AGREEMENT_BASE_URL")
                .unwrap_or_else(|_| "https://agreements.example.com".to_string()),
            smtp,
            mail,
        })
    }

    /// Database URL with the password masked, for logging
    pub fn database_url_masked(&self) -> Option<String> {
        let StorageBackend::Postgres { database_url } = &self.storage else {
            return None;
        };

        if let Some(at_pos) = database_url.find('@') {
            if let Some(colon_pos) = database_url[..at_pos].rfind(':') {
                let prefix = &database_url[..colon_pos + 1];
                let suffix = &database_url[at_pos..];
                return Some(format!("{}****{}", prefix, suffix));
            }
        }
        Some(database_url.clone())
    }
}
