//! Custom error types for mutuals
//!
//! Provides a unified error handling system across the store, the browser
//! environment, the agent, and the batch pipeline.

use thiserror::Error;

/// Main error type for mutuals operations
#[derive(Error, Debug)]
pub enum MutualsError {
    /// The backing spreadsheet could not be read or is not tabular
    #[error("Data load error: {0}")]
    DataLoad(String),

    /// The work store could not be written back to disk
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// No column qualified as the profile URL column
    #[error("No LinkedIn URL column found in {0}")]
    NoIdentifierColumn(String),

    /// Row index outside the store
    #[error("Row {index} out of range (store has {len} rows)")]
    RowOutOfRange { index: usize, len: usize },

    /// The debugging port never opened
    #[error("Chrome debugging port {port} did not open after {attempts} attempts")]
    LaunchTimeout { port: u16, attempts: u32 },

    /// The browser exited before its debugging port opened
    #[error("Chrome exited before the debugging port opened (exit code {code:?}): {stderr}")]
    ProcessExit { code: Option<i32>, stderr: String },

    /// The automation session could not attach to the browser
    #[error("Failed to connect automation session: {0}")]
    Connect(String),

    /// The target site demands a manual login
    #[error("LinkedIn login required (landed on {url}). Log in manually in the automation profile and restart.")]
    AuthRequired { url: String },

    /// The agent run exceeded its time budget
    #[error("Agent run timed out after {secs}s")]
    AgentTimeout { secs: u64 },

    /// Browser automation errors
    #[error("Browser error: {0}")]
    Browser(String),

    /// Chrome DevTools Protocol errors
    #[error("CDP error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),

    /// LLM backend errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A shutdown request cut the current item short
    #[error("Interrupted by shutdown request")]
    Interrupted,

    /// The item's task panicked
    #[error("panic: {0}")]
    Panic(String),

    /// Generic error for other cases
    #[error("{0}")]
    Other(String),
}

/// Convenience Result type for mutuals operations
pub type Result<T> = std::result::Result<T, MutualsError>;

impl MutualsError {
    /// Create a data load error
    pub fn data_load(msg: impl Into<String>) -> Self {
        Self::DataLoad(msg.into())
    }

    /// Create a persistence error
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Create a connect error
    pub fn connect(msg: impl Into<String>) -> Self {
        Self::Connect(msg.into())
    }

    /// Create a browser error
    pub fn browser(msg: impl Into<String>) -> Self {
        Self::Browser(msg.into())
    }

    /// Create an LLM error
    pub fn llm(msg: impl Into<String>) -> Self {
        Self::Llm(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Wrap an error with additional context
    pub fn with_context<E>(context: impl Into<String>, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::WithContext {
            context: context.into(),
            source: Box::new(error),
        }
    }

    /// Errors that stop the whole batch rather than the current row.
    ///
    /// Store I/O and a missing login cannot be fixed by moving on to the next
    /// profile; everything else is scoped to the item that raised it.
    pub fn is_batch_fatal(&self) -> bool {
        matches!(
            self,
            Self::DataLoad(_)
                | Self::Persistence(_)
                | Self::NoIdentifierColumn(_)
                | Self::AuthRequired { .. }
        )
    }

    /// Errors worth another attempt in a fresh environment
    pub fn is_retryable(&self) -> bool {
        !self.is_batch_fatal()
            && !matches!(
                self,
                Self::Config(_) | Self::RowOutOfRange { .. } | Self::Interrupted | Self::Panic(_)
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_fatal_classification() {
        assert!(MutualsError::data_load("bad file").is_batch_fatal());
        assert!(MutualsError::persistence("disk full").is_batch_fatal());
        assert!(MutualsError::AuthRequired {
            url: "https://www.linkedin.com/login".to_string()
        }
        .is_batch_fatal());

        assert!(!MutualsError::LaunchTimeout {
            port: 9222,
            attempts: 30
        }
        .is_batch_fatal());
        assert!(!MutualsError::connect("handshake").is_batch_fatal());
        assert!(!MutualsError::AgentTimeout { secs: 120 }.is_batch_fatal());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(MutualsError::AgentTimeout { secs: 5 }.is_retryable());
        assert!(MutualsError::browser("detached").is_retryable());
        assert!(!MutualsError::AuthRequired { url: String::new() }.is_retryable());
        assert!(!MutualsError::config("missing key").is_retryable());
        assert!(MutualsError::connect("handshake reset").is_retryable());
        assert!(MutualsError::LaunchTimeout { port: 9222, attempts: 30 }.is_retryable());
        assert!(!MutualsError::Interrupted.is_retryable());
        assert!(!MutualsError::Panic("boom".to_string()).is_retryable());
    }

    #[test]
    fn test_process_exit_message_carries_stderr() {
        let err = MutualsError::ProcessExit {
            code: Some(21),
            stderr: "profile in use".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("21"));
        assert!(msg.contains("profile in use"));
    }
}
