//! Chrome-backed execution environment

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::agent::BrowserAgent;
use crate::browser::ports::acquire_port;
use crate::browser::{terminate_conflicting_processes, AutomationSession, CdpSession, ChromeProcess};
use crate::core::config::BrowserConfig;
use crate::core::{MutualsError, Result};
use crate::environment::{
    classify_access, AccessStatus, EnvironmentProvider, EnvironmentState, ExecutionEnvironment,
};

/// Timeout for the DevTools probe and CDP handshake
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A dedicated Chrome instance plus its automation session and agent
pub struct ChromeEnvironment {
    config: BrowserConfig,
    state: EnvironmentState,
    port: Option<u16>,
    process: Option<ChromeProcess>,
    session: Option<CdpSession>,
    agent: Option<Arc<dyn BrowserAgent>>,
}

impl ChromeEnvironment {
    pub fn new(config: BrowserConfig, agent: Arc<dyn BrowserAgent>) -> Self {
        Self {
            config,
            state: EnvironmentState::Uninitialized,
            port: None,
            process: None,
            session: None,
            agent: Some(agent),
        }
    }

    /// Debugging port, once acquired
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Whether the Chrome child is still alive. The handle outlives
    /// teardown, so this stays accurate afterwards.
    pub fn is_process_running(&mut self) -> bool {
        self.process
            .as_mut()
            .map(|p| p.is_running())
            .unwrap_or(false)
    }

    fn transition(&mut self, next: EnvironmentState) {
        if !self.state.can_transition_to(next) {
            warn!(from = %self.state, to = %next, "Unexpected environment transition");
        }
        debug!(from = %self.state, to = %next, port = ?self.port, "Environment state");
        self.state = next;
    }

    /// Domain the landing page belongs to, without a `www.` prefix
    fn target_domain(&self) -> String {
        url::Url::parse(&self.config.verify_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .map(|h| h.trim_start_matches("www.").to_string())
            .unwrap_or_else(|| "linkedin.com".to_string())
    }

    /// Start Chrome on a free port
    pub async fn launch(&mut self) -> Result<()> {
        self.transition(EnvironmentState::ChromeLaunching);

        terminate_conflicting_processes(&self.config.user_data_dir).await;
        let port = acquire_port(self.config.debugging_port, self.config.port_window);
        self.port = Some(port);

        let process = ChromeProcess::launch(&self.config, port).await?;
        info!(port, pid = ?process.pid(), "Chrome ready");
        self.process = Some(process);
        self.transition(EnvironmentState::ChromeReady);
        Ok(())
    }

    /// Attach the automation session. No retry at this layer.
    pub async fn connect_session(&mut self) -> Result<()> {
        let port = self
            .port
            .ok_or_else(|| MutualsError::connect("Chrome has not been launched"))?;
        self.transition(EnvironmentState::SessionConnecting);

        let session = CdpSession::connect(port, CONNECT_TIMEOUT).await?;
        self.session = Some(session);
        self.transition(EnvironmentState::SessionReady);
        Ok(())
    }

    /// Load the landing page and classify where the browser ended up
    pub async fn verify_access(&mut self) -> Result<AccessStatus> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| MutualsError::browser("No automation session to verify"))?;

        info!(url = %self.config.verify_url, "Verifying access");
        session.navigate(&self.config.verify_url).await?;
        tokio::time::sleep(Duration::from_secs(self.config.settle_secs)).await;
        let url = session.current_url().await?;

        let status = classify_access(&url, &self.target_domain());
        match status {
            AccessStatus::Authenticated => info!(url = %url, "Access verified"),
            AccessStatus::AuthRequired => {
                warn!(url = %url, "Manual login required");
                return Err(MutualsError::AuthRequired { url });
            }
            AccessStatus::Ambiguous => {
                warn!(url = %url, "Could not confirm login state, continuing")
            }
        }

        self.transition(EnvironmentState::AccessVerified);
        Ok(status)
    }
}

#[async_trait]
impl ExecutionEnvironment for ChromeEnvironment {
    fn state(&self) -> EnvironmentState {
        self.state
    }

    async fn provision(&mut self) -> Result<()> {
        let result = async {
            self.launch().await?;
            self.connect_session().await?;
            self.verify_access().await?;
            Ok::<(), MutualsError>(())
        }
        .await;

        if let Err(e) = &result {
            warn!(state = %self.state, error = %e, "Environment provisioning failed");
        }
        result
    }

    fn session(&self) -> Option<&dyn AutomationSession> {
        self.session.as_ref().map(|s| s as &dyn AutomationSession)
    }

    fn agent(&self) -> Option<&dyn BrowserAgent> {
        self.agent.as_deref()
    }

    async fn teardown(&mut self) {
        if self.state == EnvironmentState::TornDown {
            debug!("Environment already torn down");
            return;
        }
        info!(state = %self.state, port = ?self.port, "Tearing down environment");

        if let Some(session) = self.session.take() {
            if let Err(e) = session.close().await {
                warn!(error = %e, "Failed to close automation session");
            }
            tokio::time::sleep(Duration::from_secs(self.config.session_close_grace_secs)).await;
        }

        self.agent = None;
        if let Some(process) = self.process.as_mut() {
            process
                .terminate(Duration::from_secs(self.config.shutdown_grace_secs))
                .await;
        }

        if self.state != EnvironmentState::Uninitialized {
            terminate_conflicting_processes(&self.config.user_data_dir).await;
        }

        self.transition(EnvironmentState::TornDown);
        info!(port = ?self.port, "Environment torn down");
    }
}

/// Builds a [`ChromeEnvironment`] per work item from a fixed config,
/// handing each one its own agent handle
#[derive(Clone)]
pub struct ChromeEnvironmentProvider {
    config: BrowserConfig,
    agent: Arc<dyn BrowserAgent>,
}

impl ChromeEnvironmentProvider {
    pub fn new(config: BrowserConfig, agent: Arc<dyn BrowserAgent>) -> Self {
        Self { config, agent }
    }
}

impl EnvironmentProvider for ChromeEnvironmentProvider {
    fn create(&self) -> Box<dyn ExecutionEnvironment> {
        Box::new(ChromeEnvironment::new(
            self.config.clone(),
            Arc::clone(&self.agent),
        ))
    }
}
