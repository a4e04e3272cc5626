//! Isolated execution environments
//!
//! One environment owns one Chrome process, one debugging port, one
//! automation session and the agent that drives it. A fresh environment is
//! provisioned for every attempt at a work item and torn down before the
//! next one is created.

mod chrome;

use async_trait::async_trait;

use crate::agent::BrowserAgent;
use crate::browser::AutomationSession;
use crate::core::Result;

pub use chrome::{ChromeEnvironment, ChromeEnvironmentProvider};

/// Lifecycle state of an environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvironmentState {
    Uninitialized,
    ChromeLaunching,
    ChromeReady,
    SessionConnecting,
    SessionReady,
    AccessVerified,
    TornDown,
}

impl EnvironmentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::ChromeLaunching => "chrome_launching",
            Self::ChromeReady => "chrome_ready",
            Self::SessionConnecting => "session_connecting",
            Self::SessionReady => "session_ready",
            Self::AccessVerified => "access_verified",
            Self::TornDown => "torn_down",
        }
    }

    /// Whether a browser is up and reachable in this state
    pub fn is_ready(&self) -> bool {
        matches!(
            self,
            Self::ChromeReady | Self::SessionConnecting | Self::SessionReady | Self::AccessVerified
        )
    }

    /// Whether moving from `self` to `next` follows the lifecycle.
    /// Any non-terminal state may fall through to `TornDown`.
    pub fn can_transition_to(&self, next: EnvironmentState) -> bool {
        use EnvironmentState::*;
        match (self, next) {
            (TornDown, _) => false,
            (_, TornDown) => true,
            (Uninitialized, ChromeLaunching)
            | (ChromeLaunching, ChromeReady)
            | (ChromeReady, SessionConnecting)
            | (SessionConnecting, SessionReady)
            | (SessionReady, AccessVerified) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for EnvironmentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of checking the landing page after connecting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessStatus {
    Authenticated,
    AuthRequired,
    Ambiguous,
}

/// URL fragments that mean the site wants a manual login
const AUTH_MARKERS: [&str; 5] = ["/login", "/checkpoint", "/authwall", "/uas/login", "challenge"];

/// Classify the URL the browser ended up on after loading the landing page.
///
/// Login and checkpoint pages win over everything else; any other page on
/// `domain` counts as authenticated.
pub fn classify_access(current_url: &str, domain: &str) -> AccessStatus {
    let lower = current_url.to_lowercase();
    if AUTH_MARKERS.iter().any(|marker| lower.contains(marker)) {
        return AccessStatus::AuthRequired;
    }

    let on_domain = url::Url::parse(&lower)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .map(|host| host == domain || host.ends_with(&format!(".{}", domain)))
        .unwrap_or(false);

    if on_domain {
        AccessStatus::Authenticated
    } else {
        AccessStatus::Ambiguous
    }
}

/// One browser, session and agent aggregate with a single teardown entry point
#[async_trait]
pub trait ExecutionEnvironment: Send + Sync {
    fn state(&self) -> EnvironmentState;

    /// Launch, connect and verify access. On error the environment is left
    /// in whatever state it reached; the caller still owes a `teardown`.
    async fn provision(&mut self) -> Result<()>;

    /// Live session, available once provisioning has connected
    fn session(&self) -> Option<&dyn AutomationSession>;

    /// Agent handed to this environment at creation, released on teardown
    fn agent(&self) -> Option<&dyn BrowserAgent>;

    /// Release every resource. Safe to call from any state and never fails.
    async fn teardown(&mut self);
}

/// Creates a fresh environment per work item
pub trait EnvironmentProvider: Send + Sync {
    fn create(&self) -> Box<dyn ExecutionEnvironment>;
}
