//! Debugging port selection and liveness probing

use std::net::{Ipv4Addr, SocketAddr, TcpListener};
use std::time::Duration;

use tokio::net::TcpStream;
use tracing::{debug, warn};

/// Whether nothing is listening on `port` on the loopback interface
pub fn is_port_free(port: u16) -> bool {
    TcpListener::bind((Ipv4Addr::LOCALHOST, port)).is_ok()
}

/// First free port in `[default, default + window)`, or `default` when the
/// whole window is taken.
pub fn acquire_port(default: u16, window: u16) -> u16 {
    for offset in 0..window.max(1) {
        let Some(port) = default.checked_add(offset) else {
            break;
        };
        if is_port_free(port) {
            debug!(port, "Found free debugging port");
            return port;
        }
    }

    warn!(
        default,
        window, "No free debugging port found, falling back to default"
    );
    default
}

/// Whether a TCP connect to `127.0.0.1:port` succeeds within `within`
pub async fn is_port_open(port: u16, within: Duration) -> bool {
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    matches!(
        tokio::time::timeout(within, TcpStream::connect(addr)).await,
        Ok(Ok(_))
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_skips_busy_port() {
        let busy = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let port = busy.local_addr().unwrap().port();

        let acquired = acquire_port(port, 10);
        assert_ne!(acquired, port);
        assert!(acquired > port && acquired < port.saturating_add(10));
    }

    #[test]
    fn test_acquire_falls_back_to_default() {
        let busy = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let port = busy.local_addr().unwrap().port();

        assert_eq!(acquire_port(port, 1), port);
    }

    #[tokio::test]
    async fn test_port_open_probe() {
        let listener = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .unwrap();
        let port = listener.local_addr().unwrap().port();
        assert!(is_port_open(port, Duration::from_millis(500)).await);

        drop(listener);
        assert!(!is_port_open(port, Duration::from_millis(200)).await);
    }
}
