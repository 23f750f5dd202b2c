use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::workflows::recommendation::RefinementSettings;

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
    pub refinement: RefinementSettings,
    pub llm: Option<LlmConfig>,
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

        let refinement = load_refinement()?;

        let llm = env::var("LLM_BASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .map(|base_url| LlmConfig {
                base_url,
                api_key: env::var("LLM_API_KEY").ok().filter(|key| !key.is_empty()),
                model: env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o".to_string()),
            });

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            refinement,
            llm,
        })
    }
}

fn load_refinement() -> Result<RefinementSettings, ConfigError> {
    let defaults = RefinementSettings::default();

    let max_iterations = match env::var("REFINE_MAX_ITERATIONS") {
        Ok(raw) => raw
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|value| *value >= 1)
            .ok_or(ConfigError::InvalidMaxIterations)?,
        Err(_) => defaults.max_iterations,
    };

    let score_threshold = match env::var("REFINE_SCORE_THRESHOLD") {
        Ok(raw) => raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|value| (0.0..=100.0).contains(value))
            .ok_or(ConfigError::InvalidScoreThreshold)?,
        Err(_) => defaults.score_threshold,
    };

    let max_options = match env::var("REFINE_MAX_OPTIONS") {
        Ok(raw) => raw
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|value| *value >= 1)
            .ok_or(ConfigError::InvalidMaxOptions)?,
        Err(_) => defaults.max_options,
    };

    Ok(RefinementSettings {
        max_iterations,
        score_threshold,
        max_options,
    })
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

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Connection details for an OpenAI-compatible completion endpoint.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidMaxIterations,
    InvalidScoreThreshold,
    InvalidMaxOptions,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidMaxIterations => {
                write!(f, "REFINE_MAX_ITERATIONS must be a positive integer")
            }
            ConfigError::InvalidScoreThreshold => {
                write!(f, "REFINE_SCORE_THRESHOLD must be a number between 0 and 100")
            }
            ConfigError::InvalidMaxOptions => {
                write!(f, "REFINE_MAX_OPTIONS must be a positive integer")
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

/// Serialises tests that mutate process environment variables.
#[cfg(test)]
pub(crate) fn env_guard() -> &'static std::sync::Mutex<()> {
    static GUARD: std::sync::OnceLock<std::sync::Mutex<()>> = std::sync::OnceLock::new();
    GUARD.get_or_init(|| std::sync::Mutex::new(()))
}
