//! Relay server configuration.
//!
//! Built with [`RelayConfig::builder`] or read from the environment with
//! [`RelayConfig::from_env`]. Unset variables fall back to the defaults
//! below; a variable that is set but invalid is an error naming it.

use std::fmt::Display;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use relay_model::{GenerationParams, InferenceConfig};
use relay_rag::RagConfig;

use crate::error::{RelayError, RelayResult};
use crate::telemetry::LogFormat;

pub const ENV_BIND_ADDR: &str = "RELAY_BIND_ADDR";
pub const ENV_AI_SERVER_URL: &str = "AI_SERVER_URL";
pub const ENV_STREAM_PATH: &str = "RELAY_STREAM_PATH";
pub const ENV_GENERATE_PATH: &str = "RELAY_GENERATE_PATH";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "RELAY_REQUEST_TIMEOUT_SECS";
pub const ENV_STREAM_IDLE_TIMEOUT_SECS: &str = "RELAY_STREAM_IDLE_TIMEOUT_SECS";
pub const ENV_EMBEDDING_MODEL: &str = "RELAY_EMBEDDING_MODEL";
pub const ENV_EMBEDDING_DIMENSIONS: &str = "RELAY_EMBEDDING_DIMENSIONS";
pub const ENV_TOP_K: &str = "RELAY_TOP_K";
pub const ENV_MAX_CONTEXT_CHARS: &str = "RELAY_MAX_CONTEXT_CHARS";
pub const ENV_CORPUS_PATH: &str = "RELAY_CORPUS_PATH";
pub const ENV_PERSONA: &str = "RELAY_PERSONA";
pub const ENV_MAX_TOKENS: &str = "RELAY_MAX_TOKENS";
pub const ENV_TEMPERATURE: &str = "RELAY_TEMPERATURE";
pub const ENV_LOG_FORMAT: &str = "RELAY_LOG_FORMAT";

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_CORPUS_PATH: &str = "data/menu.json";
pub const DEFAULT_PERSONA: &str = "You are Gemma, a friendly staff member at Gemma Burger.";

/// Everything the relay binary needs to start.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address the HTTP listener binds to.
    pub bind_addr: SocketAddr,
    /// Menu corpus ingested at startup.
    pub corpus_path: PathBuf,
    /// Opening line of every prompt.
    pub persona: String,
    /// Sampling parameters for synchronous completions.
    pub generation: GenerationParams,
    pub rag: RagConfig,
    pub inference: InferenceConfig,
    pub log_format: LogFormat,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            corpus_path: PathBuf::from(DEFAULT_CORPUS_PATH),
            persona: DEFAULT_PERSONA.to_string(),
            generation: GenerationParams::default(),
            rag: RagConfig::default(),
            inference: InferenceConfig::default(),
            log_format: LogFormat::default(),
        }
    }
}

impl RelayConfig {
    /// Create a new config builder
    pub fn builder() -> RelayConfigBuilder {
        RelayConfigBuilder::default()
    }

    /// Read the configuration from process environment variables.
    pub fn from_env() -> RelayResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load `.env` from the working directory (if any), then [`from_env`](Self::from_env).
    /// Variables already set in the process environment win.
    pub fn load() -> RelayResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Read the configuration through `lookup`, which maps a variable name to
    /// its value. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> RelayResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mut rag = RagConfig::builder();
        if let Some(model) = get(ENV_EMBEDDING_MODEL) {
            rag = rag.embedding_model(model);
        }
        if let Some(v) = get(ENV_EMBEDDING_DIMENSIONS) {
            rag = rag.embedding_dimensions(parse(ENV_EMBEDDING_DIMENSIONS, &v)?);
        }
        if let Some(v) = get(ENV_TOP_K) {
            rag = rag.top_k(parse(ENV_TOP_K, &v)?);
        }
        if let Some(v) = get(ENV_MAX_CONTEXT_CHARS) {
            rag = rag.max_context_chars(Some(parse(ENV_MAX_CONTEXT_CHARS, &v)?));
        }
        let rag = rag.build().map_err(|e| RelayError::Config(e.to_string()))?;

        let mut inference = InferenceConfig::builder();
        if let Some(url) = get(ENV_AI_SERVER_URL) {
            inference = inference.base_url(url);
        }
        if let Some(path) = get(ENV_STREAM_PATH) {
            inference = inference.stream_path(path);
        }
        if let Some(path) = get(ENV_GENERATE_PATH) {
            inference = inference.generate_path(path);
        }
        if let Some(v) = get(ENV_REQUEST_TIMEOUT_SECS) {
            inference = inference
                .request_timeout(Duration::from_secs(parse(ENV_REQUEST_TIMEOUT_SECS, &v)?));
        }
        if let Some(v) = get(ENV_STREAM_IDLE_TIMEOUT_SECS) {
            inference = inference.stream_idle_timeout(Some(Duration::from_secs(parse(
                ENV_STREAM_IDLE_TIMEOUT_SECS,
                &v,
            )?)));
        }
        let inference = inference.build().map_err(|e| RelayError::Config(e.to_string()))?;

        let mut builder = Self::builder().rag(rag).inference(inference);
        if let Some(v) = get(ENV_BIND_ADDR) {
            builder = builder.bind_addr(parse(ENV_BIND_ADDR, &v)?);
        }
        if let Some(path) = get(ENV_CORPUS_PATH) {
            builder = builder.corpus_path(path);
        }
        if let Some(persona) = get(ENV_PERSONA) {
            builder = builder.persona(persona);
        }
        let mut generation = GenerationParams::default();
        if let Some(v) = get(ENV_MAX_TOKENS) {
            generation.max_tokens = parse(ENV_MAX_TOKENS, &v)?;
        }
        if let Some(v) = get(ENV_TEMPERATURE) {
            generation.temperature = parse(ENV_TEMPERATURE, &v)?;
        }
        builder = builder.generation(generation);
        if let Some(v) = get(ENV_LOG_FORMAT) {
            builder = builder.log_format(parse(ENV_LOG_FORMAT, &v)?);
        }
        builder.build()
    }
}

fn parse<T>(key: &str, value: &str) -> RelayResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    value.parse().map_err(|e| RelayError::Config(format!("invalid {key} '{value}': {e}")))
}

/// Builder for [`RelayConfig`].
#[derive(Debug, Clone, Default)]
pub struct RelayConfigBuilder {
    config: RelayConfig,
}

impl RelayConfigBuilder {
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.config.bind_addr = addr;
        self
    }

    pub fn corpus_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.corpus_path = path.into();
        self
    }

    pub fn persona(mut self, persona: impl Into<String>) -> Self {
        self.config.persona = persona.into();
        self
    }

    pub fn generation(mut self, params: GenerationParams) -> Self {
        self.config.generation = params;
        self
    }

    pub fn rag(mut self, rag: RagConfig) -> Self {
        self.config.rag = rag;
        self
    }

    pub fn inference(mut self, inference: InferenceConfig) -> Self {
        self.config.inference = inference;
        self
    }

    pub fn log_format(mut self, format: LogFormat) -> Self {
        self.config.log_format = format;
        self
    }

    /// Build and validate the config.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Config`] if the persona is blank, `max_tokens`
    /// is zero, or the temperature is negative or not finite.
    pub fn build(self) -> RelayResult<RelayConfig> {
        if self.config.persona.trim().is_empty() {
            return Err(RelayError::Config("persona must not be empty".to_string()));
        }
        if self.config.generation.max_tokens == 0 {
            return Err(RelayError::Config("max_tokens must be greater than zero".to_string()));
        }
        let temperature = self.config.generation.temperature;
        if !temperature.is_finite() || temperature < 0.0 {
            return Err(RelayError::Config(format!(
                "temperature must be a non-negative number, got {temperature}"
            )));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_vars(vars: &[(&str, &str)]) -> RelayResult<RelayConfig> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        RelayConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = from_vars(&[]).unwrap();
        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(config.corpus_path, PathBuf::from("data/menu.json"));
        assert_eq!(config.persona, DEFAULT_PERSONA);
        assert_eq!(config.rag.top_k, 3);
        assert_eq!(config.rag.max_context_chars, Some(4000));
        assert_eq!(config.inference.stream_url(), "http://localhost:8000/chat");
        assert_eq!(config.generation.max_tokens, 300);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn variables_override_defaults() {
        let config = from_vars(&[
            (ENV_AI_SERVER_URL, "http://model:9000"),
            (ENV_STREAM_IDLE_TIMEOUT_SECS, "15"),
            (ENV_TOP_K, "5"),
            (ENV_BIND_ADDR, "127.0.0.1:8080"),
            (ENV_TEMPERATURE, "0.2"),
            (ENV_LOG_FORMAT, "json"),
        ])
        .unwrap();
        assert_eq!(config.inference.stream_url(), "http://model:9000/chat");
        assert_eq!(config.inference.stream_idle_timeout, Some(Duration::from_secs(15)));
        assert_eq!(config.rag.top_k, 5);
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.generation.temperature, 0.2);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = from_vars(&[(ENV_PERSONA, "   "), (ENV_TOP_K, "")]).unwrap();
        assert_eq!(config.persona, DEFAULT_PERSONA);
        assert_eq!(config.rag.top_k, 3);
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let err = from_vars(&[(ENV_TOP_K, "three")]).unwrap_err();
        assert!(err.to_string().contains(ENV_TOP_K));

        let err = from_vars(&[(ENV_REQUEST_TIMEOUT_SECS, "-1")]).unwrap_err();
        assert!(err.to_string().contains(ENV_REQUEST_TIMEOUT_SECS));

        assert!(from_vars(&[(ENV_TOP_K, "0")]).is_err());
        assert!(from_vars(&[(ENV_AI_SERVER_URL, "not a url")]).is_err());
        assert!(from_vars(&[(ENV_LOG_FORMAT, "xml")]).is_err());
    }

    #[test]
    fn builder_rejects_bad_generation_params() {
        let params = GenerationParams { max_tokens: 0, temperature: 0.7 };
        assert!(RelayConfig::builder().generation(params).build().is_err());

        let params = GenerationParams { max_tokens: 10, temperature: f32::NAN };
        assert!(RelayConfig::builder().generation(params).build().is_err());
    }

    #[test]
    fn dotenv_file_entries_are_read() {
        let file = "# relay settings\nAI_SERVER_URL=http://gpu-box:8000\nRELAY_TOP_K=\"4\"\n";
        let vars: HashMap<String, String> =
            dotenvy::from_read_iter(file.as_bytes()).map(|entry| entry.unwrap()).collect();

        let config = RelayConfig::from_lookup(|key| vars.get(key).cloned()).unwrap();
        assert_eq!(config.inference.stream_url(), "http://gpu-box:8000/chat");
        assert_eq!(config.rag.top_k, 4);
    }
}
