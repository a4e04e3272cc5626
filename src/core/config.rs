//! Configuration management for mutuals
//!
//! Supports environment variables, a config file, and CLI overrides.
//! The loaded configuration is validated once at startup and then handed
//! to the orchestrator and environments as an immutable value.
//!
//! Config file location: ~/.config/mutuals/config.toml

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

use crate::core::error::{MutualsError, Result};

/// Environment variable holding the agent backend key
pub const API_KEY_ENV: &str = "GOOGLE_API_KEY";

/// Main configuration for mutuals
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Agent / LLM configuration
    pub agent: AgentConfig,
    /// Browser environment configuration
    pub browser: BrowserConfig,
    /// Batch processing configuration
    pub batch: BatchConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Agent backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// API key, read from the environment only
    #[serde(skip)]
    pub api_key: Option<String>,
    /// Model driving the browser agent
    /// Default: gemini-2.5-pro
    pub model: String,
    /// Base URL of the generative language API
    pub api_base: String,
    /// Maximum agent steps per task
    pub max_steps: usize,
    /// Consecutive failed steps before the agent gives up
    pub max_failures: usize,
    /// Sampling temperature for action selection
    pub temperature: f32,
    /// HTTP timeout for a single LLM request in seconds
    pub request_timeout_secs: u64,
}

/// Browser launch and teardown configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Chrome executable
    pub chrome_path: String,
    /// First debugging port to try
    pub debugging_port: u16,
    /// How many consecutive ports to probe
    pub port_window: u16,
    /// Persistent automation profile (keeps the LinkedIn login)
    pub user_data_dir: PathBuf,
    /// One-second polls before the debugging port is declared dead
    pub launch_attempts: u32,
    /// Landing page used to verify the session is logged in
    pub verify_url: String,
    /// Seconds to let the landing page settle before classifying it
    pub settle_secs: u64,
    /// Seconds between SIGTERM and SIGKILL
    pub shutdown_grace_secs: u64,
    /// Seconds to wait after closing the session before terminating Chrome
    pub session_close_grace_secs: u64,
}

/// Batch behaviour configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Number of mutual connection names to extract per profile
    pub target_count: usize,
    /// Retries after the first attempt
    pub retry_attempts: u32,
    /// Fixed delay between attempts in seconds
    pub retry_delay_secs: u64,
    /// Time budget for one agent run in seconds
    pub task_timeout_secs: u64,
    /// Save the store every N items
    pub checkpoint_every: usize,
    /// Pause between items in seconds
    pub item_pause_secs: u64,
    /// Keyword searched in the page when the agent fails
    pub page_keyword: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Persistent log file (appended)
    pub file: PathBuf,
    /// Console verbosity when RUST_LOG is unset
    pub console_level: String,
}


fn default_chrome_path() -> String {
    if cfg!(target_os = "windows") {
        "C:\\Program Files\\Google\\Chrome\\Application\\chrome.exe".to_string()
    } else if cfg!(target_os = "macos") {
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome".to_string()
    } else {
        "google-chrome".to_string()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            agent: AgentConfig::default(),
            browser: BrowserConfig::default(),
            batch: BatchConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.5-pro".to_string(),
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            max_steps: 25,
            max_failures: 3,
            temperature: 0.1,
            request_timeout_secs: 120,
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            chrome_path: default_chrome_path(),
            debugging_port: 9222,
            port_window: 10,
            user_data_dir: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("linkedin-automation"),
            launch_attempts: 30,
            verify_url: "https://www.linkedin.com/feed/".to_string(),
            settle_secs: 3,
            shutdown_grace_secs: 3,
            session_close_grace_secs: 2,
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            target_count: 10,
            retry_attempts: 3,
            retry_delay_secs: 2,
            task_timeout_secs: 120,
            checkpoint_every: 5,
            item_pause_secs: 3,
            page_keyword: "mutual connection".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("linkedin_automation.log"),
            console_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mutuals")
    }

    /// Get the config file path
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from file, environment, and defaults
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load() -> Self {
        // Try to load .env file if it exists
        let _ = dotenvy::dotenv();

        let mut config = Self::load_from_file().unwrap_or_default();
        config.apply_env_overrides(|key| env::var(key).ok());
        config
    }

    /// Overlay environment variables read through `lookup`. Unset, blank or
    /// unparsable values leave the current setting alone.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let parse = |key: &str| get(key).and_then(|v| v.parse::<u64>().ok());

        if let Some(key) = get(API_KEY_ENV) {
            self.agent.api_key = Some(key);
        }
        if let Some(model) = get("MUTUALS_MODEL") {
            self.agent.model = model;
        }
        if let Some(path) = get("CHROME_PATH") {
            self.browser.chrome_path = path;
        }
        if let Some(port) = parse("CHROME_DEBUG_PORT").and_then(|p| u16::try_from(p).ok()) {
            self.browser.debugging_port = port;
        }
        if let Some(dir) = get("CHROME_USER_DATA_DIR") {
            self.browser.user_data_dir = PathBuf::from(dir);
        }
        if let Some(count) = parse("MUTUAL_CONNECTIONS_COUNT") {
            self.batch.target_count = count as usize;
        }
        if let Some(retries) = parse("RETRY_ATTEMPTS").and_then(|r| u32::try_from(r).ok()) {
            self.batch.retry_attempts = retries;
        }
        // PAGE_TIMEOUT is expressed in milliseconds
        if let Some(ms) = parse("PAGE_TIMEOUT") {
            self.batch.task_timeout_secs = (ms / 1000).max(1);
        }
    }

    /// Load configuration from file only
    pub fn load_from_file() -> Result<Self> {
        let config_path = Self::config_file();

        if !config_path.exists() {
            return Err(MutualsError::config("Config file not found"));
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|e| MutualsError::config(format!("Failed to read config: {}", e)))?;

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| MutualsError::config(format!("Failed to parse config: {}", e)))
    }

    /// Check required secrets and value ranges. Called once at startup.
    pub fn validate(&self) -> Result<()> {
        if self.agent.api_key.is_none() {
            return Err(MutualsError::config(format!(
                "{} environment variable is required. Set it in your .env file or environment.",
                API_KEY_ENV
            )));
        }
        if self.batch.target_count == 0 {
            return Err(MutualsError::config("target_count must be at least 1"));
        }
        if self.batch.task_timeout_secs == 0 {
            return Err(MutualsError::config("task_timeout_secs must be at least 1"));
        }
        if self.browser.launch_attempts == 0 {
            return Err(MutualsError::config("launch_attempts must be at least 1"));
        }
        if self.agent.max_steps == 0 {
            return Err(MutualsError::config("max_steps must be at least 1"));
        }
        Ok(())
    }

    /// The API key after validation
    pub fn api_key(&self) -> Result<&str> {
        self.agent
            .api_key
            .as_deref()
            .ok_or_else(|| MutualsError::config(format!("{} is not set", API_KEY_ENV)))
    }

    /// Generate a default config file content for display
    pub fn default_config_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config)
            .unwrap_or_else(|_| String::from("# Error generating config"))
    }
}
