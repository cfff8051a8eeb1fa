use std::env;
use std::net::{IpAddr, SocketAddr};

use crate::lifecycle::{RetentionPolicy, SweepSchedule};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub retention: RetentionConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let retention = RetentionConfig {
            window_days: parse_env_number("APP_RETENTION_DAYS", 15)?,
            withdrawn_sweep_hour: parse_env_number("APP_WITHDRAWN_SWEEP_HOUR", 2)?,
            expired_sweep_hour: parse_env_number("APP_EXPIRED_SWEEP_HOUR", 4)?,
            orphan_scan_hour: parse_env_number("APP_ORPHAN_SCAN_HOUR", 3)?,
        };
        if retention.window_days <= 0 {
            return Err(ConfigError::InvalidRetentionWindow);
        }

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            retention,
        })
    }
}

fn parse_env_number<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { key }),
        Err(_) => Ok(default),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Retention window and daily sweep anchors.
#[derive(Debug, Clone, Copy)]
pub struct RetentionConfig {
    pub window_days: i64,
    pub withdrawn_sweep_hour: u32,
    pub expired_sweep_hour: u32,
    pub orphan_scan_hour: u32,
}

impl RetentionConfig {
    pub fn policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            window_days: self.window_days,
        }
    }

    pub fn schedule(&self) -> SweepSchedule {
        SweepSchedule {
            withdrawn_hour: self.withdrawn_sweep_hour,
            expired_hour: self.expired_sweep_hour,
            orphan_hour: self.orphan_scan_hour,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("APP_PORT must be a valid u16")]
    InvalidPort,
    #[error("APP_HOST must parse to an IPv4 or IPv6 address")]
    InvalidHost { source: std::net::AddrParseError },
    #[error("{key} must be a number")]
    InvalidNumber { key: &'static str },
    #[error("APP_RETENTION_DAYS must be positive")]
    InvalidRetentionWindow,
}
