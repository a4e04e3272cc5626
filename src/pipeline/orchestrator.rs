//! Batch orchestrator
//!
//! Drives the whole run over one spreadsheet: store setup, resume point,
//! then strictly sequential items. Every attempt at an item runs in a
//! freshly provisioned environment that is torn down before the next one is
//! created.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::core::config::BatchConfig;
use crate::core::{AttemptResult, MutualsError, Result, WorkItem, WorkStatus};
use crate::environment::{EnvironmentProvider, ExecutionEnvironment};
use crate::pipeline::executor::TaskExecutor;
use crate::pipeline::retry::process_with_retry;
use crate::store::{StoreSummary, WorkStore};

/// Outcome of a batch run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// File the results were written to
    pub path: PathBuf,
    /// Items selected for this run
    pub pending: usize,
    /// Items that reached a final status
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// The run stopped on a shutdown request
    pub interrupted: bool,
    /// Store state after the final save
    pub summary: StoreSummary,
}

impl BatchReport {
    /// Whether the batch ran to completion
    pub fn is_complete(&self) -> bool {
        !self.interrupted
    }
}

enum ItemOutcome {
    Finished(AttemptResult),
    Failed(String),
    AuthRequired(MutualsError),
    Interrupted,
}

/// Runs every pending row of a spreadsheet through the agent
pub struct BatchOrchestrator {
    config: BatchConfig,
    provider: Arc<dyn EnvironmentProvider>,
    executor: TaskExecutor,
    shutdown: watch::Receiver<bool>,
}

impl BatchOrchestrator {
    /// Orchestrator over environments from `provider`, each of which brings
    /// its own agent
    pub fn new(config: &BatchConfig, provider: Arc<dyn EnvironmentProvider>) -> Self {
        // no sender: shutdown never fires
        let (_, shutdown) = watch::channel(false);
        Self {
            config: config.clone(),
            provider,
            executor: TaskExecutor::new(config),
            shutdown,
        }
    }

    /// Stop cooperatively once `true` is sent on the channel
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Process every pending row of the file at `path`.
    ///
    /// Per-item failures are written to the row and the batch moves on.
    /// Store I/O errors and a required login end the run with an error; the
    /// store is saved first whenever it is still writable.
    pub async fn run(&self, path: &Path) -> Result<BatchReport> {
        let mut store = WorkStore::load(path)?;
        if store.detect_identifier_column().is_none() {
            return Err(MutualsError::NoIdentifierColumn(path.display().to_string()));
        }
        store.ensure_result_columns()?;
        info!(summary = %store.summary(), "Spreadsheet ready");

        let resume = store.find_resume_index();
        let items: Vec<WorkItem> = store.pending_items(resume).collect();

        let mut report = BatchReport {
            path: path.to_path_buf(),
            pending: items.len(),
            ..Default::default()
        };

        if items.is_empty() {
            info!("No LinkedIn URLs to process");
        } else {
            info!(count = items.len(), "Processing LinkedIn profiles");
        }

        let total = items.len();
        for (i, item) in items.iter().enumerate() {
            if self.shutdown_requested() {
                warn!(row = item.row_index + 1, "Shutdown requested, stopping before next item");
                report.interrupted = true;
                break;
            }

            info!(
                row = item.row_index + 1,
                "Processing {}/{}: {}",
                i + 1,
                total,
                item.target_identifier
            );
            store.mark_processing(item.row_index)?;
            if self.config.checkpoint_every > 0 && i % self.config.checkpoint_every == 0 {
                store.save(true)?;
            }

            match self.run_item(item).await {
                ItemOutcome::Finished(result) => {
                    store.update(item.row_index, &result.result_payload, result.status)?;
                    report.processed += 1;
                    if result.success {
                        report.succeeded += 1;
                        info!(row = item.row_index + 1, "Row processed");
                    } else {
                        report.failed += 1;
                        warn!(
                            row = item.row_index + 1,
                            detail = result.error_detail.as_deref().unwrap_or("unknown error"),
                            "Row failed"
                        );
                    }
                }
                ItemOutcome::Failed(detail) => {
                    error!(row = item.row_index + 1, error = %detail, "Error processing row");
                    store.update(item.row_index, &format!("Error: {}", detail), WorkStatus::Error)?;
                    report.processed += 1;
                    report.failed += 1;
                }
                ItemOutcome::AuthRequired(e) => {
                    error!(row = item.row_index + 1, error = %e, "Login required, aborting batch");
                    store.update(item.row_index, &format!("Error: {}", e), WorkStatus::Error)?;
                    store.save(true)?;
                    return Err(e);
                }
                ItemOutcome::Interrupted => {
                    warn!(row = item.row_index + 1, "Interrupted, row left as processing");
                    report.interrupted = true;
                    break;
                }
            }

            if i + 1 < total && !self.pause().await {
                report.interrupted = true;
                break;
            }
        }

        store.save(true)?;
        report.summary = store.summary();
        info!(summary = %report.summary, "Final data summary");
        Ok(report)
    }

    /// All attempts at one item. Each attempt gets its own environment.
    async fn run_item(&self, item: &WorkItem) -> ItemOutcome {
        let instruction = self.executor.instruction_for(&item.target_identifier);
        let delay = Duration::from_secs(self.config.retry_delay_secs);

        let result = process_with_retry(item, self.config.retry_attempts, delay, |attempt| {
            self.run_attempt(item, attempt, &instruction)
        })
        .await;

        match result {
            Ok(result) => ItemOutcome::Finished(result),
            Err(e @ MutualsError::AuthRequired { .. }) => ItemOutcome::AuthRequired(e),
            Err(MutualsError::Interrupted) => ItemOutcome::Interrupted,
            Err(e) => ItemOutcome::Failed(e.to_string()),
        }
    }

    /// Create, provision, run and tear down one environment. Teardown runs
    /// on every path, including panics and shutdown requests.
    async fn run_attempt(
        &self,
        item: &WorkItem,
        attempt: u32,
        instruction: &str,
    ) -> Result<AttemptResult> {
        if self.shutdown_requested() {
            return Err(MutualsError::Interrupted);
        }

        info!(row = item.row_index + 1, attempt, "Creating fresh environment");
        let mut env = self.provider.create();
        let mut shutdown = self.shutdown.clone();

        let outcome = {
            let work = AssertUnwindSafe(self.provision_and_run(env.as_mut(), instruction))
                .catch_unwind();
            tokio::select! {
                result = work => result.unwrap_or_else(|panic| {
                    Err(MutualsError::Panic(panic_message(panic.as_ref())))
                }),
                _ = wait_for_shutdown(&mut shutdown) => Err(MutualsError::Interrupted),
            }
        };

        info!(row = item.row_index + 1, attempt, state = %env.state(), "Tearing down environment");
        env.teardown().await;
        info!(row = item.row_index + 1, attempt, "Environment torn down");
        outcome
    }

    async fn provision_and_run(
        &self,
        env: &mut dyn ExecutionEnvironment,
        instruction: &str,
    ) -> Result<AttemptResult> {
        if let Err(e) = env.provision().await {
            error!(state = %env.state(), error = %e, "Environment provisioning failed");
            return Err(e);
        }

        let session = env
            .session()
            .ok_or_else(|| MutualsError::browser("environment has no live session"))?;
        let agent = env
            .agent()
            .ok_or_else(|| MutualsError::browser("environment has no agent"))?;
        Ok(self.executor.run(agent, session, instruction).await)
    }

    fn shutdown_requested(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Pause between items. Returns false when interrupted.
    async fn pause(&self) -> bool {
        if self.config.item_pause_secs == 0 {
            return !self.shutdown_requested();
        }
        info!(secs = self.config.item_pause_secs, "Waiting before next URL");
        let mut shutdown = self.shutdown.clone();
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(self.config.item_pause_secs)) => true,
            _ = wait_for_shutdown(&mut shutdown) => false,
        }
    }
}

/// Resolves once `true` is observed. Never resolves if the sender is gone.
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".to_string())
}
