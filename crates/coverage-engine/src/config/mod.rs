use crate::coverage::config::{AnalyticsConfig, TierBoundaries};
use serde::Serialize;
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

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

/// Top-level configuration, built once at startup and handed to each component.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub ingestion: IngestionConfig,
    pub analytics: AnalyticsConfig,
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

        let source = match env::var("VACCINATION_DATA_SOURCE") {
            Ok(raw) => raw.parse::<DataSourceKind>()?,
            Err(_) => DataSourceKind::Csv,
        };
        let data_path = env::var("VACCINATION_DATA_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_PATH));
        let max_upload_bytes = parse_var("MAX_UPLOAD_SIZE", DEFAULT_MAX_UPLOAD_BYTES)?;
        if max_upload_bytes == 0 {
            return Err(ConfigError::OutOfRange {
                key: "MAX_UPLOAD_SIZE",
                value: "0".to_string(),
            });
        }

        let defaults = AnalyticsConfig::default();
        let analytics = AnalyticsConfig {
            target_threshold: parse_var("COVERAGE_TARGET_THRESHOLD", defaults.target_threshold)?,
            tiers: TierBoundaries {
                green_min: parse_var("COVERAGE_TIER_GREEN", defaults.tiers.green_min)?,
                orange_min: parse_var("COVERAGE_TIER_ORANGE", defaults.tiers.orange_min)?,
            },
            alert_threshold: parse_var("COVERAGE_ALERT_THRESHOLD", defaults.alert_threshold)?,
            max_export_rows: parse_var("MAX_EXPORT_ROWS", defaults.max_export_rows)?,
            ..defaults
        };
        validate_analytics(&analytics)?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            ingestion: IngestionConfig {
                source,
                data_path,
                max_upload_bytes,
            },
            analytics,
        })
    }
}

const DEFAULT_DATA_PATH: &str = "vaccination_data.csv";
const DEFAULT_MAX_UPLOAD_BYTES: u64 = 200 * 1024 * 1024;

fn parse_var<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { key, value: raw }),
        Err(_) => Ok(default),
    }
}

fn validate_analytics(config: &AnalyticsConfig) -> Result<(), ConfigError> {
    let percentages = [
        ("COVERAGE_TARGET_THRESHOLD", config.target_threshold),
        ("COVERAGE_TIER_GREEN", config.tiers.green_min),
        ("COVERAGE_TIER_ORANGE", config.tiers.orange_min),
        ("COVERAGE_ALERT_THRESHOLD", config.alert_threshold),
    ];
    for (key, value) in percentages {
        if !value.is_finite() || !(0.0..=100.0).contains(&value) {
            return Err(ConfigError::OutOfRange {
                key,
                value: value.to_string(),
            });
        }
    }

    if config.tiers.orange_min > config.tiers.green_min {
        return Err(ConfigError::TierOrder {
            green_min: config.tiers.green_min,
            orange_min: config.tiers.orange_min,
        });
    }

    if config.max_export_rows == 0 {
        return Err(ConfigError::OutOfRange {
            key: "MAX_EXPORT_ROWS",
            value: "0".to_string(),
        });
    }

    Ok(())
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

/// Which ingestion collaborator feeds rows to the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSourceKind {
    Csv,
    Api,
    Database,
}

impl DataSourceKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Api => "api",
            Self::Database => "database",
        }
    }
}

impl fmt::Display for DataSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DataSourceKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "api" => Ok(Self::Api),
            "database" | "db" => Ok(Self::Database),
            _ => Err(ConfigError::InvalidDataSource(value.to_string())),
        }
    }
}

/// Source selection and the byte ceiling applied before rows reach the validator.
#[derive(Debug, Clone)]
pub struct IngestionConfig {
    pub source: DataSourceKind,
    pub data_path: PathBuf,
    pub max_upload_bytes: u64,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost {
        source: std::net::AddrParseError,
    },
    InvalidDataSource(String),
    InvalidNumber {
        key: &'static str,
        value: String,
    },
    OutOfRange {
        key: &'static str,
        value: String,
    },
    TierOrder {
        green_min: f64,
        orange_min: f64,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidDataSource(value) => write!(
                f,
                "VACCINATION_DATA_SOURCE must be one of csv, api, database (found '{value}')"
            ),
            ConfigError::InvalidNumber { key, value } => {
                write!(f, "{key} must be numeric (found '{value}')")
            }
            ConfigError::OutOfRange { key, value } => {
                write!(f, "{key} is out of range (found {value})")
            }
            ConfigError::TierOrder {
                green_min,
                orange_min,
            } => write!(
                f,
                "COVERAGE_TIER_ORANGE ({orange_min}) must not exceed COVERAGE_TIER_GREEN ({green_min})"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
