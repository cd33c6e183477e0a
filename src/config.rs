use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub directory: String,
    pub level: String,
    pub retention_days: usize,
    pub json_console: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    pub rate_limit_rps: f64,
    pub rate_limit_burst: u32,
    pub rate_limit_sweep_secs: u64,
    /// Key clients by `X-Forwarded-For` / `X-Real-IP`. Only safe behind a
    /// proxy that overwrites those headers.
    pub trust_proxy_headers: bool,
    pub request_timeout: Duration,
    pub max_request_bytes: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub limits: LimitsConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from a key lookup. Missing keys take their
    /// defaults; present but unparseable numbers are an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let environment = match var("ENV", "development").to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        };

        let cors_origins = var("CORS_ORIGINS", "")
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();

        let server = ServerConfig {
            host: var("SERVER_HOST", "0.0.0.0"),
            port: parse(&lookup, "SERVER_PORT", 8085)?,
            cors_origins,
        };

        let url = match lookup("DATABASE_URL") {
            Some(url) => url,
            None => format!(
                "postgres://{}:{}@{}:{}/{}",
                var("DB_USER", "postgres"),
                var("DB_PASSWORD", "postgres"),
                var("DB_HOST", "localhost"),
                parse::<u16>(&lookup, "DB_PORT", 5432)?,
                var("DB_NAME", "orderdesk"),
            ),
        };
        let database = DatabaseConfig {
            url,
            max_connections: parse(&lookup, "DB_MAX_CONNECTIONS", 10)?,
        };

        let logging = LoggingConfig {
            directory: var("LOG_DIRECTORY", "./logs"),
            level: var("LOG_LEVEL", "info"),
            retention_days: parse(&lookup, "LOG_RETENTION_DAYS", 30)?,
            json_console: var("LOG_FORMAT", "") == "json"
                || environment == Environment::Production,
        };

        let max_request_mb: u64 = parse(&lookup, "MAX_REQUEST_SIZE_MB", 10)?;
        let limits = LimitsConfig {
            rate_limit_rps: parse(&lookup, "RATE_LIMIT_RPS", 100.0)?,
            rate_limit_burst: parse(&lookup, "RATE_LIMIT_BURST", 200)?,
            rate_limit_sweep_secs: parse(&lookup, "RATE_LIMIT_SWEEP_SECONDS", 3600)?,
            trust_proxy_headers: parse(&lookup, "TRUST_PROXY_HEADERS", false)?,
            request_timeout: Duration::from_secs(parse(&lookup, "REQUEST_TIMEOUT_SECONDS", 30)?),
            max_request_bytes: max_request_mb * 1024 * 1024,
        };

        if limits.rate_limit_rps <= 0.0 || !limits.rate_limit_rps.is_finite() {
            bail!("RATE_LIMIT_RPS must be a positive number");
        }
        if limits.rate_limit_burst == 0 {
            bail!("RATE_LIMIT_BURST must be at least 1");
        }
        if limits.request_timeout.is_zero() {
            bail!("REQUEST_TIMEOUT_SECONDS must be at least 1");
        }

        Ok(Self {
            environment,
            server,
            database,
            logging,
            limits,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        None => Ok(default),
    }
}
