//! Network probes for the health monitor

use std::sync::Arc;
#[cfg(not(feature = "health-http"))]
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use devdeck_core::monitor::{ProbeOutcome, ProbeRequest, Prober};
#[cfg(feature = "health-http")]
use devdeck_core::model::ServiceKind;

/// HTTP prober: HEAD for the frontend existence check, GET for backend health
#[cfg(feature = "health-http")]
pub struct HttpProber {
    client: reqwest::Client,
}

#[cfg(feature = "health-http")]
impl HttpProber {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[cfg(feature = "health-http")]
#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, request: &ProbeRequest) -> ProbeOutcome {
        let mut builder = match request.kind {
            ServiceKind::Frontend => self.client.head(&request.url),
            ServiceKind::Backend => self.client.get(&request.url),
        };
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        match builder.send().await {
            Ok(resp) => ProbeOutcome::Responded {
                status: resp.status().as_u16(),
            },
            Err(e) => {
                debug!(url = %request.url, error = %e, "probe failed");
                ProbeOutcome::Unreachable
            }
        }
    }
}

/// Fallback when the HTTP client is compiled out: a TCP connect counts as a 200
#[cfg(not(feature = "health-http"))]
pub struct TcpProber;

#[cfg(not(feature = "health-http"))]
#[async_trait]
impl Prober for TcpProber {
    async fn probe(&self, request: &ProbeRequest) -> ProbeOutcome {
        let authority = request
            .url
            .trim_start_matches("http://")
            .split('/')
            .next()
            .unwrap_or_default();
        let timeout = request.timeout.unwrap_or(Duration::from_secs(2));

        match tokio::time::timeout(timeout, tokio::net::TcpStream::connect(authority)).await {
            Ok(Ok(_)) => ProbeOutcome::Responded { status: 200 },
            Ok(Err(e)) => {
                debug!(url = %request.url, error = %e, "probe failed");
                ProbeOutcome::Unreachable
            }
            Err(_) => ProbeOutcome::Unreachable,
        }
    }
}

pub fn default_prober() -> Arc<dyn Prober> {
    #[cfg(feature = "health-http")]
    {
        Arc::new(HttpProber::new())
    }
    #[cfg(not(feature = "health-http"))]
    {
        Arc::new(TcpProber)
    }
}

#[cfg(all(test, feature = "health-http"))]
mod tests {
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    /// Answer one request with the given status line, then close
    async fn serve_once(status_line: &'static str) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                    status_line
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        port
    }

    fn request(kind: ServiceKind, url: String) -> ProbeRequest {
        ProbeRequest {
            kind,
            url,
            timeout: Some(Duration::from_secs(2)),
        }
    }

    #[tokio::test]
    async fn test_backend_ok() {
        let port = serve_once("200 OK").await;
        let outcome = HttpProber::new()
            .probe(&request(ServiceKind::Backend, format!("http://127.0.0.1:{}/health", port)))
            .await;
        assert_eq!(outcome, ProbeOutcome::Responded { status: 200 });
    }

    #[tokio::test]
    async fn test_frontend_error_page_still_responds() {
        let port = serve_once("404 Not Found").await;
        let outcome = HttpProber::new()
            .probe(&request(ServiceKind::Frontend, format!("http://127.0.0.1:{}/", port)))
            .await;
        assert_eq!(outcome, ProbeOutcome::Responded { status: 404 });
    }

    #[tokio::test]
    async fn test_closed_port_is_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let outcome = HttpProber::new()
            .probe(&request(ServiceKind::Frontend, format!("http://127.0.0.1:{}/", port)))
            .await;
        assert_eq!(outcome, ProbeOutcome::Unreachable);
    }
}
