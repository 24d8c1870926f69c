use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use url::Url;

use crate::workflows::cadastro::reminder::ReminderPolicy;
use crate::workflows::inscricao::FieldLimits;

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

/// Top-level configuration for the form engine and the dev backend.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub backend: BackendConfig,
    pub cep: CepConfig,
    pub limits: FieldLimits,
    pub reminder: ReminderPolicy,
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

        let base_url = parse_url(
            "APP_API_BASE_URL",
            env::var("APP_API_BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:3000".to_string()),
        )?;
        let token = env::var("APP_API_TOKEN")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        let cep_base_url = parse_url(
            "APP_CEP_BASE_URL",
            env::var("APP_CEP_BASE_URL").unwrap_or_else(|_| "https://viacep.com.br/ws".to_string()),
        )?;

        let defaults = FieldLimits::default();
        let limits = FieldLimits {
            text_max_len: parse_number("APP_TEXT_MAX_LEN", defaults.text_max_len)?,
            text_area_max_len: parse_number("APP_TEXT_AREA_MAX_LEN", defaults.text_area_max_len)?,
        };

        let reminder_defaults = ReminderPolicy::default();
        let initial_hours = parse_number(
            "APP_REMINDER_INITIAL_HOURS",
            reminder_defaults.initial_interval().num_hours(),
        )?;
        let max_hours = parse_number(
            "APP_REMINDER_MAX_HOURS",
            reminder_defaults.max_interval().num_hours(),
        )?;
        let reminder = ReminderPolicy::from_hours(initial_hours, max_hours).map_err(|_| {
            let key = if chrono::Duration::try_hours(initial_hours).is_none() {
                "APP_REMINDER_INITIAL_HOURS"
            } else {
                "APP_REMINDER_MAX_HOURS"
            };
            ConfigError::InvalidNumber { key }
        })?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            backend: BackendConfig { base_url, token },
            cep: CepConfig {
                base_url: cep_base_url,
            },
            limits,
            reminder,
        })
    }
}

fn parse_url(key: &'static str, raw: String) -> Result<Url, ConfigError> {
    Url::parse(raw.trim()).map_err(|source| ConfigError::InvalidUrl { key, source })
}

fn parse_number<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { key }),
        Err(_) => Ok(default),
    }
}

/// Settings controlling the dev backend binding.
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

/// Where the process backend lives and the bearer token sent with every call.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: Url,
    pub token: Option<String>,
}

/// Postal-code lookup service.
#[derive(Debug, Clone)]
pub struct CepConfig {
    pub base_url: Url,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost {
        source: std::net::AddrParseError,
    },
    InvalidUrl {
        key: &'static str,
        source: url::ParseError,
    },
    InvalidNumber {
        key: &'static str,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidUrl { key, .. } => write!(f, "{key} must be an absolute URL"),
            ConfigError::InvalidNumber { key } => write!(f, "{key} must be a positive integer"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidNumber { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidUrl { source, .. } => Some(source),
        }
    }
}
