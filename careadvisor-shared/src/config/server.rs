use serde::{Deserialize, Serialize};
use std::{env, fs, path::PathBuf};

/// The main configuration structure for the CareAdvisor server.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Session cookie settings
    pub session: SessionConfig,

    /// Admission limits (input size, rate window, context window)
    pub limits: LimitsConfig,

    /// Upstream language-model provider settings
    pub llm: LlmConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// HTTP server settings.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    /// Port for the HTTP server
    pub port: u16,

    /// Header used to propagate request ids
    pub request_id_header: String,

    /// CORS allowed origins; empty means any origin
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            request_id_header: "x-request-id".to_string(),
            allowed_origins: Vec::new(),
        }
    }
}

/// Session cookie settings.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct SessionConfig {
    /// Name of the cookie carrying the portal session token
    pub cookie_name: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "careadvisor_session".to_string(),
        }
    }
}

/// Admission limits enforced before any upstream call is made.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct LimitsConfig {
    /// Upper bound on accepted message length, in characters
    pub input_max_chars: usize,

    /// Fixed-window rate ceiling per identity
    pub requests_per_minute: u32,

    /// Rate-limit window duration in seconds
    pub window_seconds: u64,

    /// Number of trailing history turns retained when assembling context
    pub context_messages: usize,

    /// How long an expired window entry survives before eviction
    pub grace_seconds: u64,

    /// Cadence of the limiter eviction sweep
    pub sweep_interval_seconds: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            input_max_chars: 1000,
            requests_per_minute: 10,
            window_seconds: 60,
            context_messages: 6,
            grace_seconds: 300,
            sweep_interval_seconds: 60,
        }
    }
}

/// Upstream language-model provider settings.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of the OpenAI-compatible provider
    pub base_url: String,

    /// API key for the provider; usually supplied via `CAREADVISOR_LLM_API_KEY`
    pub api_key: Option<String>,

    /// Model identifier sent upstream
    pub model: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Upper bound on generated response length, in tokens
    pub max_output_tokens: u32,

    /// Connect timeout for the upstream call, in seconds
    pub connect_timeout_seconds: u64,

    /// Upper bound on total streaming duration, in seconds
    pub stream_deadline_seconds: u64,

    /// Overrides the built-in health-advisor system prompt when set
    pub system_prompt: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_output_tokens: 500,
            connect_timeout_seconds: 10,
            stream_deadline_seconds: 120,
            system_prompt: None,
        }
    }
}

/// Output format for log events.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

/// Logging settings.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level filter
    pub level: String,

    /// Log output format
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

impl Config {
    /// Generates a default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::default()
    }

    /// Loads the configuration from a file, environment variables, or defaults.
    ///
    /// Precedence, lowest to highest: built-in defaults, configuration file,
    /// `CAREADVISOR_*` environment variables, command-line port override.
    ///
    /// # Arguments
    /// * `config_path` - Optional path to the configuration file.
    /// * `port_override` - Optional port number to override the configuration.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or if the
    /// resolved configuration fails validation.
    pub fn load_config(
        config_path: Option<PathBuf>,
        port_override: Option<u16>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let mut config = if let Some(path) = config_path {
            let content = fs::read_to_string(&path)?;
            match path.extension().and_then(|ext| ext.to_str()) {
                Some("yaml" | "yml") => serde_yaml::from_str(&content)?,
                Some("json") => serde_json::from_str(&content)?,
                _ => {
                    return Err("Unsupported configuration format. Use 'yaml' or 'json'.".into());
                }
            }
        } else {
            Config::with_defaults()
        };

        config.apply_env_overrides();

        if let Some(port) = port_override {
            config.server.port = port;
        }

        if let Err(errors) = config.validate() {
            return Err(errors.join("; ").into());
        }

        Ok(config)
    }

    /// Applies `CAREADVISOR_*` environment variable overrides to this config.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(port) = env::var("CAREADVISOR_PORT") {
            if let Ok(parsed) = port.parse() {
                self.server.port = parsed;
            }
        }
        if let Ok(level) = env::var("CAREADVISOR_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(base_url) = env::var("CAREADVISOR_LLM_BASE_URL") {
            self.llm.base_url = base_url;
        }
        if let Ok(api_key) = env::var("CAREADVISOR_LLM_API_KEY") {
            self.llm.api_key = Some(api_key);
        }
        if let Ok(model) = env::var("CAREADVISOR_LLM_MODEL") {
            self.llm.model = model;
        }
    }

    /// Validate the complete configuration.
    ///
    /// # Errors
    /// Returns the list of validation failures when any setting is out of
    /// range.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push("Invalid server port. Must be greater than 0.".to_string());
        }

        if self.limits.input_max_chars == 0 {
            errors.push("limits.input_max_chars must be at least 1".to_string());
        }
        if self.limits.requests_per_minute == 0 {
            errors.push("limits.requests_per_minute must be at least 1".to_string());
        }
        if self.limits.window_seconds == 0 {
            errors.push("limits.window_seconds must be at least 1".to_string());
        }

        if self.llm.base_url.trim().is_empty() {
            errors.push("llm.base_url must not be empty".to_string());
        }
        if self.llm.model.trim().is_empty() {
            errors.push("llm.model must not be empty".to_string());
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            errors.push("llm.temperature must be between 0.0 and 2.0".to_string());
        }
        if self.llm.max_output_tokens == 0 {
            errors.push("llm.max_output_tokens must be at least 1".to_string());
        }
        if self.llm.stream_deadline_seconds == 0 {
            errors.push("llm.stream_deadline_seconds must be at least 1".to_string());
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}
