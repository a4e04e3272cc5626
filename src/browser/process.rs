//! Chrome process control
//!
//! Spawns a Chrome instance bound to a debugging port and a persistent
//! profile directory, waits for the port to open, and shuts it down again.

use std::collections::VecDeque;
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::browser::ports::is_port_open;
use crate::core::config::BrowserConfig;
use crate::core::{MutualsError, Result};

/// Lines of stderr kept for diagnostics
const STDERR_TAIL_LINES: usize = 40;

/// Command-line flags for an automation Chrome instance
pub fn chrome_args(port: u16, user_data_dir: &Path) -> Vec<String> {
    vec![
        format!("--remote-debugging-port={}", port),
        format!("--user-data-dir={}", user_data_dir.display()),
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
        "--disable-default-apps".to_string(),
        "--disable-popup-blocking".to_string(),
        "--disable-translate".to_string(),
        "--disable-background-timer-throttling".to_string(),
        "--disable-renderer-backgrounding".to_string(),
        "--disable-device-discovery-notifications".to_string(),
    ]
}

/// A running Chrome child process
pub struct ChromeProcess {
    child: Child,
    pid: Option<u32>,
    port: u16,
    stderr_tail: Arc<Mutex<VecDeque<String>>>,
}

impl ChromeProcess {
    /// Start Chrome and poll the debugging port once per second until it
    /// accepts connections.
    ///
    /// Fails with `ProcessExit` if Chrome dies first and with
    /// `LaunchTimeout` if the port never opens.
    pub async fn launch(config: &BrowserConfig, port: u16) -> Result<Self> {
        std::fs::create_dir_all(&config.user_data_dir).map_err(|e| {
            MutualsError::with_context(
                format!(
                    "Failed to create profile directory {}",
                    config.user_data_dir.display()
                ),
                e,
            )
        })?;

        let args = chrome_args(port, &config.user_data_dir);
        info!(chrome = %config.chrome_path, port, "Launching Chrome");
        debug!(?args, "Chrome arguments");

        let mut child = Command::new(&config.chrome_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| MutualsError::ProcessExit {
                code: None,
                stderr: format!("failed to start {}: {}", config.chrome_path, e),
            })?;

        let pid = child.id();
        let stderr_tail = Arc::new(Mutex::new(VecDeque::new()));
        if let Some(stderr) = child.stderr.take() {
            let tail = Arc::clone(&stderr_tail);
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if let Ok(mut tail) = tail.lock() {
                        if tail.len() == STDERR_TAIL_LINES {
                            tail.pop_front();
                        }
                        tail.push_back(line);
                    }
                }
            });
        }

        let mut process = Self {
            child,
            pid,
            port,
            stderr_tail,
        };

        for attempt in 1..=config.launch_attempts {
            if let Some(status) = process.child.try_wait()? {
                // let the reader drain what Chrome printed before exiting
                tokio::time::sleep(Duration::from_millis(100)).await;
                return Err(MutualsError::ProcessExit {
                    code: status.code(),
                    stderr: process.stderr_text(),
                });
            }

            if is_port_open(port, Duration::from_secs(1)).await {
                info!(port, pid = ?pid, attempt, "Chrome debugging port is open");
                return Ok(process);
            }

            debug!(port, attempt, "Waiting for Chrome debugging port");
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        warn!(port, attempts = config.launch_attempts, "Chrome never opened its debugging port");
        if let Err(e) = process.child.kill().await {
            warn!(error = %e, "Failed to kill Chrome after launch timeout");
        }
        Err(MutualsError::LaunchTimeout {
            port,
            attempts: config.launch_attempts,
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Whether the process has not exited yet
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Captured stderr, most recent lines last
    pub fn stderr_text(&self) -> String {
        self.stderr_tail
            .lock()
            .map(|tail| tail.iter().cloned().collect::<Vec<_>>().join("\n"))
            .unwrap_or_default()
    }

    /// Ask Chrome to exit, then kill it if it is still alive after `grace`.
    /// Never fails; problems are logged.
    pub async fn terminate(&mut self, grace: Duration) {
        if !self.is_running() {
            debug!(pid = ?self.pid, "Chrome already exited");
            return;
        }

        if let Some(pid) = self.pid {
            info!(pid, "Terminating Chrome");
            send_terminate(pid).await;
        }

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                info!(pid = ?self.pid, ?status, "Chrome exited");
            }
            Ok(Err(e)) => {
                warn!(pid = ?self.pid, error = %e, "Failed waiting for Chrome");
            }
            Err(_) => {
                warn!(pid = ?self.pid, "Chrome did not exit in time, killing");
                if let Err(e) = self.child.kill().await {
                    warn!(pid = ?self.pid, error = %e, "Failed to kill Chrome");
                }
            }
        }
    }
}

#[cfg(unix)]
async fn send_terminate(pid: u32) {
    let status = Command::new("kill")
        .args(["-TERM", &pid.to_string()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    if let Err(e) = status {
        warn!(pid, error = %e, "Failed to send SIGTERM");
    }
}

#[cfg(windows)]
async fn send_terminate(pid: u32) {
    let status = Command::new("taskkill")
        .args(["/PID", &pid.to_string()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    if let Err(e) = status {
        warn!(pid, error = %e, "Failed to ask Chrome to close");
    }
}

/// Kill Chrome processes that hold the automation profile.
///
/// Best effort: a failure is logged and the caller carries on.
pub async fn terminate_conflicting_processes(user_data_dir: &Path) {
    let result = kill_profile_holders(user_data_dir).await;
    match result {
        Ok(true) => {
            info!(profile = %user_data_dir.display(), "Closed existing Chrome processes");
            // profile lock files are released asynchronously
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        Ok(false) => debug!("No conflicting Chrome processes found"),
        Err(e) => warn!(error = %e, "Could not terminate existing Chrome processes"),
    }
}

#[cfg(unix)]
async fn kill_profile_holders(user_data_dir: &Path) -> std::io::Result<bool> {
    let pattern = format!("--user-data-dir={}", user_data_dir.display());
    let status = Command::new("pkill")
        .args(["-f", "--", &pattern])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await?;
    // pkill exits 1 when nothing matched
    Ok(status.success())
}

#[cfg(windows)]
async fn kill_profile_holders(_user_data_dir: &Path) -> std::io::Result<bool> {
    let status = Command::new("taskkill")
        .args(["/F", "/IM", "chrome.exe"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await?;
    Ok(status.success())
}
