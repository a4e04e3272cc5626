//! In-memory fakes for the trait seams, shared by unit tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::agent::{AgentHistory, BrowserAgent};
use crate::browser::{AutomationSession, Snapshot};
use crate::core::{Message, MutualsError, Result, ToolDefinition};
use crate::environment::{EnvironmentProvider, EnvironmentState, ExecutionEnvironment};
use crate::llm::{GenerateOptions, LLMProvider, LLMResponse};

/// Session that records actions instead of driving a browser
pub struct FakeSession {
    url: Mutex<String>,
    page_text: Option<String>,
    actions: Mutex<Vec<String>>,
}

impl FakeSession {
    pub fn new(url: &str, page_text: &str) -> Self {
        Self {
            url: Mutex::new(url.to_string()),
            page_text: Some(page_text.to_string()),
            actions: Mutex::new(Vec::new()),
        }
    }

    /// A session whose page text cannot be read
    pub fn unreadable(url: &str) -> Self {
        Self {
            page_text: None,
            ..Self::new(url, "")
        }
    }

    pub fn actions(&self) -> Vec<String> {
        self.actions.lock().unwrap().clone()
    }

    fn record(&self, action: String) {
        self.actions.lock().unwrap().push(action);
    }
}

#[async_trait]
impl AutomationSession for FakeSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.record(format!("navigate {}", url));
        *self.url.lock().unwrap() = url.to_string();
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.url.lock().unwrap().clone())
    }

    async fn page_text(&self) -> Result<String> {
        self.page_text
            .clone()
            .ok_or_else(|| MutualsError::browser("target closed"))
    }

    async fn snapshot(&self) -> Result<Snapshot> {
        Ok(Snapshot {
            url: self.url.lock().unwrap().clone(),
            ..Snapshot::default()
        })
    }

    async fn click(&self, element_ref: &str) -> Result<()> {
        self.record(format!("click {}", element_ref));
        Ok(())
    }

    async fn fill(&self, element_ref: &str, text: &str) -> Result<()> {
        self.record(format!("fill {} {}", element_ref, text));
        Ok(())
    }

    async fn scroll(&self, pixels: i64) -> Result<()> {
        self.record(format!("scroll {}", pixels));
        Ok(())
    }

    async fn go_back(&self) -> Result<()> {
        self.record("go_back".to_string());
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// LLM that replays canned responses in order
pub struct ScriptedLlm {
    responses: Mutex<VecDeque<Result<LLMResponse>>>,
}

impl ScriptedLlm {
    pub fn new(responses: Vec<Result<LLMResponse>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
        }
    }

    fn next(&self) -> Result<LLMResponse> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(MutualsError::llm("script exhausted")))
    }
}

#[async_trait]
impl LLMProvider for ScriptedLlm {
    async fn chat_with_tools(
        &self,
        _model: &str,
        _messages: &[Message],
        _tools: &[ToolDefinition],
        _options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        self.next()
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

type HistoryFn = dyn Fn(usize) -> Result<AgentHistory> + Send + Sync;

/// Agent whose result is computed from the call index
pub struct ScriptedAgent {
    script: Box<HistoryFn>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    tasks: Mutex<Vec<String>>,
}

impl ScriptedAgent {
    pub fn new(script: impl Fn(usize) -> Result<AgentHistory> + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
            delay: None,
            calls: AtomicUsize::new(0),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Sleep before answering, to exercise timeouts
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn tasks(&self) -> Vec<String> {
        self.tasks.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrowserAgent for ScriptedAgent {
    async fn run(&self, task: &str, _session: &dyn AutomationSession) -> Result<AgentHistory> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        self.tasks.lock().unwrap().push(task.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.script)(index)
    }
}

/// Agent that finishes every run without doing anything
pub fn idle_agent() -> Arc<dyn BrowserAgent> {
    Arc::new(ScriptedAgent::new(|_| Ok(AgentHistory::new())))
}

/// Lifecycle counters shared between a provider and its environments
#[derive(Default)]
pub struct EnvStats {
    pub created: AtomicUsize,
    pub live: AtomicUsize,
    pub max_live: AtomicUsize,
    pub torn_down: AtomicUsize,
    pub events: Mutex<Vec<String>>,
}

impl EnvStats {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn event(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

type ProvisionFn = dyn Fn(usize) -> Result<()> + Send + Sync;

/// Environment that only tracks its lifecycle
pub struct FakeEnvironment {
    id: usize,
    state: EnvironmentState,
    live: bool,
    session: FakeSession,
    agent: Option<Arc<dyn BrowserAgent>>,
    stats: Arc<EnvStats>,
    provision: Arc<ProvisionFn>,
}

#[async_trait]
impl ExecutionEnvironment for FakeEnvironment {
    fn state(&self) -> EnvironmentState {
        self.state
    }

    async fn provision(&mut self) -> Result<()> {
        self.stats.event(format!("provision {}", self.id));
        self.state = EnvironmentState::ChromeLaunching;
        (self.provision)(self.id)?;

        self.live = true;
        let live = self.stats.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.max_live.fetch_max(live, Ordering::SeqCst);
        self.state = EnvironmentState::AccessVerified;
        Ok(())
    }

    fn session(&self) -> Option<&dyn AutomationSession> {
        (self.state == EnvironmentState::AccessVerified)
            .then_some(&self.session as &dyn AutomationSession)
    }

    fn agent(&self) -> Option<&dyn BrowserAgent> {
        self.agent.as_deref()
    }

    async fn teardown(&mut self) {
        if self.state == EnvironmentState::TornDown {
            return;
        }
        if self.live {
            self.stats.live.fetch_sub(1, Ordering::SeqCst);
            self.live = false;
        }
        self.agent = None;
        self.stats.torn_down.fetch_add(1, Ordering::SeqCst);
        self.stats.event(format!("teardown {}", self.id));
        self.state = EnvironmentState::TornDown;
    }
}

/// Provider of [`FakeEnvironment`]s
pub struct FakeProvider {
    pub stats: Arc<EnvStats>,
    agent: Arc<dyn BrowserAgent>,
    provision: Arc<ProvisionFn>,
    page_text: String,
}

impl FakeProvider {
    pub fn new(agent: Arc<dyn BrowserAgent>) -> Self {
        Self::with_provision(agent, |_| Ok(()))
    }

    /// Decide per environment index whether provisioning succeeds
    pub fn with_provision(
        agent: Arc<dyn BrowserAgent>,
        provision: impl Fn(usize) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            stats: Arc::new(EnvStats::default()),
            agent,
            provision: Arc::new(provision),
            page_text: String::new(),
        }
    }

    pub fn with_page_text(mut self, text: &str) -> Self {
        self.page_text = text.to_string();
        self
    }
}

impl EnvironmentProvider for FakeProvider {
    fn create(&self) -> Box<dyn ExecutionEnvironment> {
        let id = self.stats.created.fetch_add(1, Ordering::SeqCst);
        self.stats.event(format!("create {}", id));
        Box::new(FakeEnvironment {
            id,
            state: EnvironmentState::Uninitialized,
            live: false,
            session: FakeSession::new("https://www.linkedin.com/feed/", &self.page_text),
            agent: Some(Arc::clone(&self.agent)),
            stats: Arc::clone(&self.stats),
            provision: Arc::clone(&self.provision),
        })
    }
}
