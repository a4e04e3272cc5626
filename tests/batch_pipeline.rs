//! Batch pipeline integration tests
//!
//! Runs the orchestrator through the public API against fake environments
//! and a scripted agent, with real spreadsheet files on disk.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

use mutuals::agent::{ActionResult, AgentHistory, BrowserAgent, HistoryStep};
use mutuals::browser::{AutomationSession, Snapshot};
use mutuals::core::config::BatchConfig;
use mutuals::core::WorkStatus;
use mutuals::environment::{EnvironmentProvider, EnvironmentState, ExecutionEnvironment};
use mutuals::store::Table;
use mutuals::{BatchOrchestrator, MutualsError, Result, WorkStore};

struct StaticSession {
    page_text: String,
}

#[async_trait]
impl AutomationSession for StaticSession {
    async fn navigate(&self, _url: &str) -> Result<()> {
        Ok(())
    }
    async fn current_url(&self) -> Result<String> {
        Ok("https://www.linkedin.com/feed/".to_string())
    }
    async fn page_text(&self) -> Result<String> {
        Ok(self.page_text.clone())
    }
    async fn snapshot(&self) -> Result<Snapshot> {
        Ok(Snapshot::default())
    }
    async fn click(&self, _element_ref: &str) -> Result<()> {
        Ok(())
    }
    async fn fill(&self, _element_ref: &str, _text: &str) -> Result<()> {
        Ok(())
    }
    async fn scroll(&self, _pixels: i64) -> Result<()> {
        Ok(())
    }
    async fn go_back(&self) -> Result<()> {
        Ok(())
    }
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
struct Lifecycle {
    live: AtomicUsize,
    max_live: AtomicUsize,
    log: Mutex<Vec<String>>,
}

struct TrackedEnvironment {
    id: usize,
    state: EnvironmentState,
    session: StaticSession,
    agent: Option<Arc<dyn BrowserAgent>>,
    lifecycle: Arc<Lifecycle>,
}

#[async_trait]
impl ExecutionEnvironment for TrackedEnvironment {
    fn state(&self) -> EnvironmentState {
        self.state
    }

    async fn provision(&mut self) -> Result<()> {
        let live = self.lifecycle.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.lifecycle.max_live.fetch_max(live, Ordering::SeqCst);
        self.lifecycle.log.lock().unwrap().push(format!("up {}", self.id));
        self.state = EnvironmentState::AccessVerified;
        Ok(())
    }

    fn session(&self) -> Option<&dyn AutomationSession> {
        self.state.is_ready().then_some(&self.session as &dyn AutomationSession)
    }

    fn agent(&self) -> Option<&dyn BrowserAgent> {
        self.agent.as_deref()
    }

    async fn teardown(&mut self) {
        if self.state == EnvironmentState::AccessVerified {
            self.lifecycle.live.fetch_sub(1, Ordering::SeqCst);
        }
        self.agent = None;
        self.lifecycle.log.lock().unwrap().push(format!("down {}", self.id));
        self.state = EnvironmentState::TornDown;
    }
}

struct TrackedProvider {
    created: AtomicUsize,
    page_text: String,
    lifecycle: Arc<Lifecycle>,
}

impl TrackedProvider {
    fn new(page_text: &str) -> Self {
        Self {
            created: AtomicUsize::new(0),
            page_text: page_text.to_string(),
            lifecycle: Arc::new(Lifecycle::default()),
        }
    }
}

impl EnvironmentProvider for TrackedProvider {
    fn create(&self) -> Box<dyn ExecutionEnvironment> {
        Box::new(TrackedEnvironment {
            id: self.created.fetch_add(1, Ordering::SeqCst),
            state: EnvironmentState::Uninitialized,
            session: StaticSession {
                page_text: self.page_text.clone(),
            },
            agent: Some(Arc::new(SlugAgent)),
            lifecycle: Arc::clone(&self.lifecycle),
        })
    }
}

/// Answers by profile slug: alice has mutuals, carol gives up, anyone else
/// has none.
struct SlugAgent;

#[async_trait]
impl BrowserAgent for SlugAgent {
    async fn run(&self, task: &str, _session: &dyn AutomationSession) -> Result<AgentHistory> {
        let result = if task.contains("/in/alice") {
            ActionResult::done("Jane Doe | Mike Lee", true)
        } else if task.contains("/in/carol") {
            ActionResult::done("", false)
        } else {
            ActionResult::done("I checked: No mutual connections found.", true)
        };
        Ok(AgentHistory {
            steps: vec![HistoryStep {
                step: 1,
                url: None,
                results: vec![result],
            }],
        })
    }
}

fn config() -> BatchConfig {
    BatchConfig {
        target_count: 10,
        retry_attempts: 0,
        retry_delay_secs: 0,
        task_timeout_secs: 30,
        checkpoint_every: 5,
        item_pause_secs: 0,
        page_keyword: "mutual connection".to_string(),
    }
}

fn people_table() -> Table {
    Table::new(
        vec!["name".to_string(), "profile".to_string(), "notes".to_string()],
        vec![
            vec!["Alice".into(), "https://www.linkedin.com/in/alice/".into(), "".into()],
            vec!["Bob".into(), "linkedin.com/in/bob".into(), "met at expo".into()],
            vec!["Carol".into(), "https://linkedin.com/in/carol".into(), "".into()],
            vec!["Dan".into(), "not a profile".into(), "".into()],
            vec!["Eve".into(), "".into(), "".into()],
        ],
    )
}

fn backups_in(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.to_string_lossy().contains(".backup"))
        .collect()
}

async fn run_batch(path: &Path, provider: Arc<TrackedProvider>) -> Result<mutuals::BatchReport> {
    BatchOrchestrator::new(&config(), provider).run(path).await
}

#[tokio::test]
async fn test_xlsx_batch_writes_results_next_to_urls() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("people.xlsx");
    WorkStore::from_table(&path, people_table()).save(false).unwrap();

    let provider = Arc::new(TrackedProvider::new("Carol\n3 mutual connections\nMessage"));
    let report = assert_ok!(run_batch(&path, provider.clone()).await);

    assert_eq!(report.pending, 3);
    assert_eq!(report.succeeded, 3);
    assert_eq!(report.failed, 0);

    let store = WorkStore::load(&path).unwrap();
    assert_eq!(
        store.table().headers(),
        ["name", "profile", "mutual_connections", "status", "notes"]
    );
    assert_eq!(store.payload(0).unwrap(), "Jane Doe | Mike Lee");
    assert_eq!(store.payload(1).unwrap(), "No mutual connections found");
    assert_eq!(
        store.payload(2).unwrap(),
        "Mutual connections found but extraction failed"
    );
    for row in 0..3 {
        assert_eq!(store.status(row).unwrap(), WorkStatus::Done);
    }
    assert_eq!(store.status(3).unwrap(), WorkStatus::Pending);
    assert_eq!(store.status(4).unwrap(), WorkStatus::Pending);
    assert!(!backups_in(dir.path()).is_empty());
}

#[tokio::test]
async fn test_environments_never_overlap() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("people.csv");
    WorkStore::from_table(&path, people_table()).save(false).unwrap();

    let provider = Arc::new(TrackedProvider::new(""));
    run_batch(&path, provider.clone()).await.unwrap();

    assert_eq!(provider.lifecycle.max_live.load(Ordering::SeqCst), 1);
    assert_eq!(
        *provider.lifecycle.log.lock().unwrap(),
        vec!["up 0", "down 0", "up 1", "down 1", "up 2", "down 2"]
    );
}

#[tokio::test]
async fn test_rerun_resumes_after_done_rows() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("people.csv");
    std::fs::write(
        &path,
        "profile,mutual_connections,status\n\
         https://linkedin.com/in/alice,Jane Doe,DONE\n\
         https://linkedin.com/in/bob,,processing\n\
         https://linkedin.com/in/carol,,\n",
    )
    .unwrap();

    let provider = Arc::new(TrackedProvider::new(""));
    let report = assert_ok!(run_batch(&path, provider.clone()).await);
    assert_eq!(report.pending, 2);
    assert_eq!(provider.created.load(Ordering::SeqCst), 2);

    let store = WorkStore::load(&path).unwrap();
    assert_eq!(store.payload(0).unwrap(), "Jane Doe");
    assert_eq!(store.payload(1).unwrap(), "No mutual connections found");
    assert_eq!(store.payload(2).unwrap(), "No mutual connections found");

    let again = assert_ok!(run_batch(&path, provider.clone()).await);
    assert_eq!(again.pending, 0);
    assert_eq!(provider.created.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_missing_file_is_data_load_error() {
    let dir = TempDir::new().unwrap();
    let err = assert_err!(
        run_batch(&dir.path().join("absent.xlsx"), Arc::new(TrackedProvider::new(""))).await
    );
    assert!(matches!(err, MutualsError::DataLoad(_)));
    assert!(err.is_batch_fatal());
}

#[tokio::test]
async fn test_unsupported_extension_is_data_load_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("people.xls");
    std::fs::write(&path, b"legacy").unwrap();

    let err = assert_err!(run_batch(&path, Arc::new(TrackedProvider::new(""))).await);
    assert!(matches!(err, MutualsError::DataLoad(_)));
}
