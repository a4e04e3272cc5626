//! Automation session over the Chrome DevTools Protocol
//!
//! The session attaches to an already running Chrome through its
//! browser-level WebSocket URL. Closing the session detaches only; the
//! Chrome process keeps running until the environment terminates it.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::browser::devtools;
use crate::browser::snapshot::{ref_selector, snapshot_script, Snapshot};
use crate::core::{MutualsError, Result};

/// Page-level operations the agent drives
#[async_trait]
pub trait AutomationSession: Send + Sync {
    /// Load `url` and wait for the navigation to finish
    async fn navigate(&self, url: &str) -> Result<()>;

    /// URL of the current page
    async fn current_url(&self) -> Result<String>;

    /// Rendered text of the current page
    async fn page_text(&self) -> Result<String>;

    /// Tag and list the interactive elements of the current page
    async fn snapshot(&self) -> Result<Snapshot>;

    async fn click(&self, element_ref: &str) -> Result<()>;

    /// Replace the contents of an input with `text`
    async fn fill(&self, element_ref: &str, text: &str) -> Result<()>;

    /// Scroll vertically; negative values scroll up
    async fn scroll(&self, pixels: i64) -> Result<()>;

    async fn go_back(&self) -> Result<()>;

    /// Detach from the browser without closing it
    async fn close(&self) -> Result<()>;
}

/// CDP-backed session on one Chrome instance
pub struct CdpSession {
    _browser: Browser,
    page: Page,
    handler: Mutex<Option<JoinHandle<()>>>,
}

impl CdpSession {
    /// Attach to the Chrome instance listening on `port`
    pub async fn connect(port: u16, timeout: Duration) -> Result<Self> {
        let version = devtools::fetch_version(port, timeout).await?;
        debug!(browser = %version.browser, url = %version.web_socket_debugger_url, "DevTools endpoint ready");

        let connect = Browser::connect(version.web_socket_debugger_url.clone());
        let (browser, mut handler) = tokio::time::timeout(timeout, connect)
            .await
            .map_err(|_| {
                MutualsError::connect(format!("CDP handshake on port {} timed out", port))
            })?
            .map_err(|e| MutualsError::connect(format!("CDP handshake failed: {}", e)))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "CDP handler event error");
                }
            }
        });

        let page = match Self::attach_page(&browser).await {
            Ok(page) => page,
            Err(e) => {
                handler_task.abort();
                return Err(e);
            }
        };

        info!(port, browser = %version.browser, "Automation session connected");
        Ok(Self {
            _browser: browser,
            page,
            handler: Mutex::new(Some(handler_task)),
        })
    }

    /// Reuse the first open tab, or open one
    async fn attach_page(browser: &Browser) -> Result<Page> {
        // targets are discovered asynchronously after connect
        tokio::time::sleep(Duration::from_millis(500)).await;

        let pages = browser
            .pages()
            .await
            .map_err(|e| MutualsError::connect(format!("Failed to list tabs: {}", e)))?;
        if let Some(page) = pages.into_iter().next() {
            return Ok(page);
        }

        browser
            .new_page("about:blank")
            .await
            .map_err(|e| MutualsError::connect(format!("Failed to open a tab: {}", e)))
    }

    async fn eval_string(&self, script: &str) -> Result<String> {
        self.page
            .evaluate(script)
            .await?
            .into_value::<String>()
            .map_err(|e| MutualsError::browser(format!("Unexpected script result: {}", e)))
    }
}

#[async_trait]
impl AutomationSession for CdpSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        debug!(url, "Navigating");
        self.page.goto(url).await?;
        self.page.wait_for_navigation().await?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.page.url().await?.unwrap_or_default())
    }

    async fn page_text(&self) -> Result<String> {
        self.eval_string("document.body ? document.body.innerText : ''")
            .await
    }

    async fn snapshot(&self) -> Result<Snapshot> {
        let json = self.eval_string(&snapshot_script()).await?;
        Ok(Snapshot::from_json(&json)?)
    }

    async fn click(&self, element_ref: &str) -> Result<()> {
        let element = self.page.find_element(ref_selector(element_ref)).await?;
        element.click().await?;
        // clicks often trigger client-side navigation
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(())
    }

    async fn fill(&self, element_ref: &str, text: &str) -> Result<()> {
        let selector = ref_selector(element_ref);
        let clear = format!(
            "(() => {{ const el = document.querySelector({}); if (el && 'value' in el) {{ el.value = ''; }} return ''; }})()",
            serde_json::to_string(&selector)?
        );
        self.eval_string(&clear).await?;

        let element = self.page.find_element(selector).await?;
        element.click().await?;
        element.type_str(text).await?;
        Ok(())
    }

    async fn scroll(&self, pixels: i64) -> Result<()> {
        self.page
            .evaluate(format!("window.scrollBy(0, {})", pixels))
            .await?;
        Ok(())
    }

    async fn go_back(&self) -> Result<()> {
        self.page.evaluate("history.back()").await?;
        tokio::time::sleep(Duration::from_secs(1)).await;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let handle = self
            .handler
            .lock()
            .map_err(|_| MutualsError::browser("session handler lock poisoned"))?
            .take();
        match handle {
            Some(handle) => {
                handle.abort();
                info!("Automation session closed");
            }
            None => warn!("Automation session already closed"),
        }
        Ok(())
    }
}
