use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use crate::workflows::review::config::{
    QueueSettings, DEFAULT_BULK_LIMIT, DEFAULT_HISTORY_WINDOW_DAYS, MAX_BULK_LIMIT,
};
use crate::workflows::review::domain::ReviewCategory;
use crate::workflows::review::sla::{SlaPolicy, DEFAULT_AT_RISK_THRESHOLD, DEFAULT_TARGET_HOURS};

const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;

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

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub queue: QueueSettings,
    pub sweep: SweepConfig,
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

        let sweep_secs = parse_var("REVIEW_SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL_SECS)?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                ansi: environment == AppEnvironment::Development,
            },
            queue: load_queue_settings()?,
            sweep: SweepConfig {
                interval: (sweep_secs > 0).then(|| Duration::from_secs(sweep_secs)),
            },
        })
    }
}

fn load_queue_settings() -> Result<QueueSettings, ConfigError> {
    let bulk_limit = parse_var("REVIEW_BULK_LIMIT", DEFAULT_BULK_LIMIT)?;
    if !(1..=MAX_BULK_LIMIT).contains(&bulk_limit) {
        return Err(ConfigError::OutOfRange {
            variable: "REVIEW_BULK_LIMIT",
            value: bulk_limit.to_string(),
        });
    }

    let at_risk_threshold = parse_var("REVIEW_AT_RISK_THRESHOLD", DEFAULT_AT_RISK_THRESHOLD)?;
    if !(at_risk_threshold > 0.0 && at_risk_threshold <= 1.0) {
        return Err(ConfigError::OutOfRange {
            variable: "REVIEW_AT_RISK_THRESHOLD",
            value: at_risk_threshold.to_string(),
        });
    }

    let history_window_days = parse_var("REVIEW_HISTORY_WINDOW_DAYS", DEFAULT_HISTORY_WINDOW_DAYS)?;
    if history_window_days < 0 {
        return Err(ConfigError::OutOfRange {
            variable: "REVIEW_HISTORY_WINDOW_DAYS",
            value: history_window_days.to_string(),
        });
    }

    let mut sla = SlaPolicy::standard()
        .with_default_hours(parse_var("REVIEW_SLA_DEFAULT_HOURS", DEFAULT_TARGET_HOURS)?);
    for category in ReviewCategory::known() {
        let variable = sla_override_variable(&category);
        if let Ok(raw) = env::var(&variable) {
            let hours = raw
                .trim()
                .parse::<u32>()
                .map_err(|_| ConfigError::InvalidSlaOverride {
                    variable: variable.clone(),
                    value: raw.clone(),
                })?;
            sla = sla.with_target(category, hours);
        }
    }

    Ok(QueueSettings {
        sla,
        at_risk_threshold,
        bulk_limit,
        history_window_days,
    })
}

/// `REVIEW_SLA_<CATEGORY>_HOURS`, e.g. `REVIEW_SLA_BUSINESS_LICENSE_HOURS`.
pub fn sla_override_variable(category: &ReviewCategory) -> String {
    format!("REVIEW_SLA_{}_HOURS", category.label().to_ascii_uppercase())
}

fn parse_var<T: FromStr>(variable: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(variable) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|_| ConfigError::InvalidNumber {
            variable,
            value: raw,
        }),
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
    pub ansi: bool,
}

/// Periodic SLA sweep cadence. `None` disables the background sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepConfig {
    pub interval: Option<Duration>,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { variable: &'static str, value: String },
    OutOfRange { variable: &'static str, value: String },
    InvalidSlaOverride { variable: String, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { variable, value } => {
                write!(f, "{variable} must be numeric (found '{value}')")
            }
            ConfigError::OutOfRange { variable, value } => {
                write!(f, "{variable} is out of range (found {value})")
            }
            ConfigError::InvalidSlaOverride { variable, value } => {
                write!(f, "{variable} must be a whole number of hours (found '{value}')")
            }
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
