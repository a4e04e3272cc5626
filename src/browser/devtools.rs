//! Chrome DevTools HTTP endpoint
//!
//! `/json/version` is used as a liveness probe and to discover the
//! browser-level WebSocket URL that the automation session attaches to.

use std::time::Duration;

use serde::Deserialize;

use crate::core::{MutualsError, Result};

/// Response of `GET /json/version`
#[derive(Debug, Clone, Deserialize)]
pub struct VersionInfo {
    #[serde(rename = "Browser", default)]
    pub browser: String,
    #[serde(rename = "Protocol-Version", default)]
    pub protocol_version: String,
    #[serde(rename = "User-Agent", default)]
    pub user_agent: String,
    #[serde(rename = "webSocketDebuggerUrl")]
    pub web_socket_debugger_url: String,
}

/// URL of the version endpoint for a local debugging port
pub fn version_url(port: u16) -> String {
    format!("http://127.0.0.1:{}/json/version", port)
}

/// Fetch `/json/version` from the browser listening on `port`
pub async fn fetch_version(port: u16, timeout: Duration) -> Result<VersionInfo> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| MutualsError::connect(format!("Failed to build HTTP client: {}", e)))?;

    let response = client.get(version_url(port)).send().await.map_err(|e| {
        MutualsError::connect(format!("DevTools endpoint on port {} unreachable: {}", port, e))
    })?;

    if !response.status().is_success() {
        return Err(MutualsError::connect(format!(
            "DevTools endpoint on port {} returned {}",
            port,
            response.status()
        )));
    }

    let body = response.text().await?;
    parse_version(&body)
}

pub(crate) fn parse_version(body: &str) -> Result<VersionInfo> {
    serde_json::from_str(body)
        .map_err(|e| MutualsError::connect(format!("Malformed /json/version response: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version() {
        let body = r#"{
            "Browser": "Chrome/126.0.6478.126",
            "Protocol-Version": "1.3",
            "User-Agent": "Mozilla/5.0",
            "V8-Version": "12.6.228.21",
            "WebKit-Version": "537.36",
            "webSocketDebuggerUrl": "ws://127.0.0.1:9222/devtools/browser/abc"
        }"#;
        let info = parse_version(body).unwrap();
        assert_eq!(info.browser, "Chrome/126.0.6478.126");
        assert_eq!(
            info.web_socket_debugger_url,
            "ws://127.0.0.1:9222/devtools/browser/abc"
        );
    }

    #[test]
    fn test_parse_version_without_ws_url() {
        let err = parse_version(r#"{"Browser": "Chrome"}"#).unwrap_err();
        assert!(matches!(err, MutualsError::Connect(_)));
    }

    #[test]
    fn test_version_url() {
        assert_eq!(version_url(9223), "http://127.0.0.1:9223/json/version");
    }
}
