//! Server configuration read from the environment.
//!
//! | variable | default |
//! |---|---|
//! | `PORT` | `3001` |
//! | `CORS_ORIGIN` | `http://localhost:5173` |
//! | `NODE_ENV` | `development` |
//! | `OPENROUTER_API_KEY` | unset: the offline scripted agent is used |
//! | `OPENROUTER_MODEL` | `openai/gpt-4o-mini` |
//! | `OPENROUTER_BASE_URL` | `https://openrouter.ai/api/v1` |
//! | `OPENROUTER_TIMEOUT_SECS` | `60` |
//! | `OPENSKY_BASE_URL` | `https://opensky-network.org/api` |
//! | `OPEN_METEO_BASE_URL` | `https://api.open-meteo.com/v1` |
//! | `UPSTREAM_TIMEOUT_SECS` | `10` |
//! | `STREAM_PACING` | `on` |

use std::time::Duration;
use thiserror::Error;

const DEFAULT_PORT: u16 = 3001;
const DEFAULT_CORS_ORIGIN: &str = "http://localhost:5173";
const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";
const DEFAULT_OPENROUTER_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_OPENSKY_URL: &str = "https://opensky-network.org/api";
const DEFAULT_OPEN_METEO_URL: &str = "https://api.open-meteo.com/v1";
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 10;
const DEFAULT_MODEL_TIMEOUT_SECS: u64 = 60;

/// Invalid configuration value.
#[derive(Error, Debug, PartialEq, Eq)]
#[error("invalid value for {key}: '{value}' ({reason})")]
pub struct ConfigError {
    /// Environment variable name.
    pub key: &'static str,
    /// Offending value.
    pub value: String,
    /// What was expected.
    pub reason: &'static str,
}

/// Deployment environment, from `NODE_ENV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Error details are returned to clients.
    #[default]
    Development,
    /// Error details are hidden.
    Production,
    /// Automated tests.
    Test,
}

impl Environment {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "test" => Self::Test,
            _ => Self::Development,
        }
    }

    /// Whether internal error details may be shown to clients.
    #[must_use]
    pub fn exposes_errors(self) -> bool {
        matches!(self, Self::Development | Self::Test)
    }

    /// Name as written in `NODE_ENV`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

/// OpenRouter (OpenAI-compatible) connection settings.
#[derive(Clone, PartialEq, Eq)]
pub struct OpenRouterConfig {
    /// Bearer token.
    pub api_key: String,
    /// Model id, e.g. `openai/gpt-4o-mini`.
    pub model: String,
    /// Base URL without the `/chat/completions` suffix.
    pub base_url: String,
    /// Limit for one chat-completions round trip.
    pub timeout: Duration,
}

impl std::fmt::Debug for OpenRouterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenRouterConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Public data APIs used by the flight tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamConfig {
    /// OpenSky Network REST base.
    pub opensky_base_url: String,
    /// Open-Meteo forecast API base.
    pub open_meteo_base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            opensky_base_url: DEFAULT_OPENSKY_URL.to_string(),
            open_meteo_base_url: DEFAULT_OPEN_METEO_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS),
        }
    }
}

impl UpstreamConfig {
    /// HTTP client shared by every tool.
    ///
    /// # Errors
    ///
    /// Fails when the TLS backend cannot be initialised.
    pub fn http_client(&self) -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("flightdesk/", env!("CARGO_PKG_VERSION")))
            .build()
    }
}

/// Cosmetic delays inserted between streamed events.
///
/// The UI animates tool calls and text, so the production stream is paced;
/// tests run with [`Pacing::none`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// Between `THINKING_START` and `THINKING_END`.
    pub thinking: Duration,
    /// After `TOOL_CALL_START`.
    pub tool_start: Duration,
    /// After `TOOL_CALL_ARGS`.
    pub tool_args: Duration,
    /// After `TOOL_CALL_RESULT`.
    pub tool_result: Duration,
    /// After each `TEXT_MESSAGE_CONTENT` chunk.
    pub text_chunk: Duration,
    /// Minimum simulated latency of the REST mock search.
    pub search_latency: Duration,
    /// Random extra latency added on top of `search_latency`.
    pub search_jitter: Duration,
}

impl Pacing {
    /// Delays the browser UI is tuned for.
    #[must_use]
    pub const fn standard() -> Self {
        Self {
            thinking: Duration::from_millis(300),
            tool_start: Duration::from_millis(200),
            tool_args: Duration::from_millis(300),
            tool_result: Duration::from_millis(200),
            text_chunk: Duration::from_millis(50),
            search_latency: Duration::from_millis(1000),
            search_jitter: Duration::from_millis(2000),
        }
    }

    /// No delays at all.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            thinking: Duration::ZERO,
            tool_start: Duration::ZERO,
            tool_args: Duration::ZERO,
            tool_result: Duration::ZERO,
            text_chunk: Duration::ZERO,
            search_latency: Duration::ZERO,
            search_jitter: Duration::ZERO,
        }
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self::standard()
    }
}

/// Complete server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen port.
    pub port: u16,
    /// Allowed browser origin.
    pub cors_origin: String,
    /// Deployment environment.
    pub environment: Environment,
    /// LLM provider; `None` selects the scripted agent.
    pub openrouter: Option<OpenRouterConfig>,
    /// Public flight and weather APIs.
    pub upstream: UpstreamConfig,
    /// Stream pacing.
    pub pacing: Pacing,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            cors_origin: DEFAULT_CORS_ORIGIN.to_string(),
            environment: Environment::Development,
            openrouter: None,
            upstream: UpstreamConfig::default(),
            pacing: Pacing::standard(),
        }
    }
}

impl ServerConfig {
    /// Read configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a variable is set to an unusable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary lookup function.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a variable is set to an unusable value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match get("PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError {
                key: "PORT",
                value: raw.clone(),
                reason: "expected a port number",
            })?,
            None => DEFAULT_PORT,
        };

        let seconds = |key: &'static str, default: u64| match get(key) {
            Some(raw) => raw.trim().parse().map(Duration::from_secs).map_err(|_| ConfigError {
                key,
                value: raw.clone(),
                reason: "expected whole seconds",
            }),
            None => Ok(Duration::from_secs(default)),
        };
        let upstream_timeout = seconds("UPSTREAM_TIMEOUT_SECS", DEFAULT_UPSTREAM_TIMEOUT_SECS)?;
        let model_timeout = seconds("OPENROUTER_TIMEOUT_SECS", DEFAULT_MODEL_TIMEOUT_SECS)?;

        let pacing = match get("STREAM_PACING").as_deref().map(str::trim) {
            None | Some("on" | "true" | "1") => Pacing::standard(),
            Some("off" | "false" | "0") => Pacing::none(),
            Some(other) => {
                return Err(ConfigError {
                    key: "STREAM_PACING",
                    value: other.to_string(),
                    reason: "expected on or off",
                })
            }
        };

        let openrouter = get("OPENROUTER_API_KEY").map(|api_key| OpenRouterConfig {
            api_key,
            model: get("OPENROUTER_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: get("OPENROUTER_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENROUTER_URL.to_string()),
            timeout: model_timeout,
        });

        Ok(Self {
            port,
            cors_origin: get("CORS_ORIGIN").unwrap_or_else(|| DEFAULT_CORS_ORIGIN.to_string()),
            environment: get("NODE_ENV")
                .map(|v| Environment::parse(&v))
                .unwrap_or_default(),
            openrouter,
            upstream: UpstreamConfig {
                opensky_base_url: get("OPENSKY_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_OPENSKY_URL.to_string()),
                open_meteo_base_url: get("OPEN_METEO_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_OPEN_METEO_URL.to_string()),
                timeout: upstream_timeout,
            },
            pacing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = config_from(&[]).expect("defaults are valid");
        assert_eq!(config.port, 3001);
        assert_eq!(config.cors_origin, "http://localhost:5173");
        assert_eq!(config.environment, Environment::Development);
        assert!(config.openrouter.is_none());
        assert_eq!(config.pacing, Pacing::standard());
        assert_eq!(config.upstream, UpstreamConfig::default());
    }

    #[test]
    fn api_key_enables_openrouter() {
        let config = config_from(&[
            ("OPENROUTER_API_KEY", "sk-test"),
            ("OPENROUTER_MODEL", "anthropic/claude-3.5-haiku"),
        ])
        .expect("valid config");

        let openrouter = config.openrouter.expect("openrouter configured");
        assert_eq!(openrouter.model, "anthropic/claude-3.5-haiku");
        assert_eq!(openrouter.base_url, "https://openrouter.ai/api/v1");
        assert_eq!(openrouter.timeout, Duration::from_secs(60));
        assert!(!format!("{openrouter:?}").contains("sk-test"));
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = config_from(&[("OPENROUTER_API_KEY", "  "), ("PORT", "")]).expect("valid");
        assert!(config.openrouter.is_none());
        assert_eq!(config.port, 3001);
    }

    #[test]
    fn pacing_can_be_disabled() {
        let config = config_from(&[("STREAM_PACING", "off")]).expect("valid config");
        assert_eq!(config.pacing, Pacing::none());
    }

    #[test]
    fn bad_values_are_reported() {
        let err = config_from(&[("PORT", "eighty")]).unwrap_err();
        assert_eq!(err.key, "PORT");

        let err = config_from(&[("STREAM_PACING", "sometimes")]).unwrap_err();
        assert_eq!(err.key, "STREAM_PACING");

        let err = config_from(&[("OPENROUTER_TIMEOUT_SECS", "1m")]).unwrap_err();
        assert_eq!(err.key, "OPENROUTER_TIMEOUT_SECS");
    }

    #[test]
    fn production_hides_errors() {
        let config = config_from(&[("NODE_ENV", "production")]).expect("valid config");
        assert!(!config.environment.exposes_errors());
        assert!(Environment::Development.exposes_errors());
    }
}
