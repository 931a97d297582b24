use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::narrative::guardrail::GuardrailConfig;
use crate::narrative::provider::AnthropicSettings;
use crate::narrative::resolver::ResolverConfig;

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
    pub dataset: DatasetConfig,
    pub resolver: ResolverConfig,
    pub guardrail: GuardrailConfig,
    pub generation: GenerationConfig,
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

        let dataset_dir = env::var("APP_DATASET_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DatasetConfig::DEFAULT_DIR));

        let defaults = ResolverConfig::default();
        let resolver = ResolverConfig {
            acceptance_threshold: parse_var("APP_MATCH_THRESHOLD", defaults.acceptance_threshold)?,
            tie_margin: parse_var("APP_MATCH_TIE_MARGIN", defaults.tie_margin)?,
            ..defaults
        };
        for (key, value) in [
            ("APP_MATCH_THRESHOLD", resolver.acceptance_threshold),
            ("APP_MATCH_TIE_MARGIN", resolver.tie_margin),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfRange {
                    key,
                    value: value.to_string(),
                });
            }
        }

        let guardrail = GuardrailConfig {
            max_words: parse_var("APP_NARRATIVE_MAX_WORDS", GuardrailConfig::default().max_words)?,
        };

        let provider = ProviderKind::parse(
            &env::var("APP_NARRATIVE_PROVIDER").unwrap_or_else(|_| "anthropic".to_string()),
        )?;
        let generation = GenerationConfig {
            provider,
            api_key: env::var("ANTHROPIC_API_KEY").ok().filter(|key| !key.trim().is_empty()),
            model: env::var("APP_ANTHROPIC_MODEL").ok(),
            max_tokens: parse_optional("APP_ANTHROPIC_MAX_TOKENS")?,
            generation_timeout: Duration::from_secs(parse_var(
                "APP_GENERATION_TIMEOUT_SECS",
                30u64,
            )?),
            request_timeout: Duration::from_secs(parse_var("APP_REQUEST_TIMEOUT_SECS", 60u64)?),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            dataset: DatasetConfig { dir: dataset_dir },
            resolver,
            guardrail,
            generation,
        })
    }
}

fn parse_var<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    Ok(parse_optional(key)?.unwrap_or(default))
}

fn parse_optional<T: FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { key, value }),
        Err(_) => Ok(None),
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

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Where the reference dataset lives on disk.
#[derive(Debug, Clone)]
pub struct DatasetConfig {
    pub dir: PathBuf,
}

impl DatasetConfig {
    pub const DEFAULT_DIR: &'static str = "crates/quality-narrative/data";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Anthropic,
    Template,
}

impl ProviderKind {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "template" | "offline" => Ok(Self::Template),
            _ => Err(ConfigError::UnknownProvider(value.to_string())),
        }
    }
}

/// Narrative provider selection and deadlines.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub provider: ProviderKind,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub generation_timeout: Duration,
    pub request_timeout: Duration,
}

impl GenerationConfig {
    pub fn anthropic_settings(&self) -> Result<AnthropicSettings, ConfigError> {
        let api_key = self.api_key.clone().ok_or(ConfigError::MissingApiKey)?;
        let mut settings = AnthropicSettings::new(api_key);
        if let Some(model) = &self.model {
            settings.model = model.clone();
        }
        if let Some(max_tokens) = self.max_tokens {
            settings.max_tokens = max_tokens;
        }
        Ok(settings)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str, value: String },
    OutOfRange { key: &'static str, value: String },
    UnknownProvider(String),
    MissingApiKey,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key, value } => {
                write!(f, "{key} must be numeric, got '{value}'")
            }
            ConfigError::OutOfRange { key, value } => {
                write!(f, "{key} must be between 0 and 1, got {value}")
            }
            ConfigError::UnknownProvider(value) => write!(
                f,
                "APP_NARRATIVE_PROVIDER must be 'anthropic' or 'template', got '{value}'"
            ),
            ConfigError::MissingApiKey => write!(
                f,
                "ANTHROPIC_API_KEY is required when APP_NARRATIVE_PROVIDER=anthropic"
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
