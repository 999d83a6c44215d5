//! Two-step "redirect" retrieval used by every AEMET OpenData endpoint.
//!
//! The first request answers with a small JSON envelope whose `datos` field
//! holds the URL of the real payload; a second request fetches that payload.

use std::{fmt::Debug, sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, de::DeserializeOwned};
use tracing::{debug, warn};

use crate::error::{Error, Result};

pub const AEMET_API_BASE: &str = "https://opendata.aemet.es/opendata";

pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Issues a single authenticated GET and returns the response body.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    async fn get(&self, url: &str, api_key: &str) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: Client,
}

impl ReqwestTransport {
    /// A transport with a fixed 30 second overall timeout.
    pub fn new() -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http })
    }

    pub fn with_client(http: Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str, api_key: &str) -> Result<String> {
        let res = self
            .http
            .get(url)
            .query(&[("api_key", api_key)])
            .send()
            .await
            .map_err(|e| Error::transport(url, e.without_url().to_string()))?;

        let status = res.status();
        // `text` honours the charset of the response; AEMET serves payloads
        // as ISO-8859-15.
        let body = res.text().await.map_err(|e| {
            Error::transport(url, format!("failed to read response body: {}", e.without_url()))
        })?;

        if !status.is_success() {
            return Err(Error::transport(
                url,
                format!("status {status}: {}", truncate_body(&body)),
            ));
        }

        Ok(body)
    }
}

/// How often and how patiently a failed redirect fetch is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 3, base_backoff: Duration::from_millis(100) }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_backoff: Duration) -> Self {
        Self { max_retries, base_backoff }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before the `retry`-th retry (1-indexed): `base * 2^(retry - 1)`.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_backoff.saturating_mul(factor)
    }
}

/// First-hop response. AEMET fills `descripcion` with the reason when it
/// cannot serve the request.
#[derive(Debug, Deserialize)]
struct Redirect {
    datos: Option<String>,
    #[serde(default)]
    descripcion: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Fetcher {
    base_url: String,
    api_key: String,
    transport: Arc<dyn Transport>,
}

impl Fetcher {
    pub fn new(api_key: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self { base_url: AEMET_API_BASE.to_owned(), api_key: api_key.into(), transport }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Fetch `<base>/<path>`, follow the `datos` link and decode its body as `T`.
    pub async fn fetch_redirected<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'));

        debug!(%url, "requesting redirect");
        let body = self.transport.get(&url, &self.api_key).await?;

        let redirect: Redirect = serde_json::from_str(&body)
            .map_err(|e| Error::decode(&url, format!("invalid redirect envelope: {e}")))?;

        let datos = redirect.datos.ok_or_else(|| match redirect.descripcion {
            Some(reason) => Error::decode(&url, format!("missing \"datos\" field: {reason}")),
            None => Error::decode(&url, "missing \"datos\" field"),
        })?;

        debug!(url = %datos, "following datos link");
        let body = self.transport.get(&datos, &self.api_key).await?;

        serde_json::from_str(&body).map_err(|e| Error::decode(&datos, e.to_string()))
    }

    /// [`Fetcher::fetch_redirected`] with exponential backoff.
    ///
    /// Every failure is retried the same way, whether it came from the network
    /// or from a response that will never decode. After the last attempt the
    /// final error is wrapped in [`Error::Exhausted`].
    pub async fn fetch_redirected_with_retry<T: DeserializeOwned>(
        &self,
        path: &str,
        policy: RetryPolicy,
    ) -> Result<T> {
        let max_attempts = policy.max_attempts();
        let mut retry = 0;

        loop {
            if retry > 0 {
                let backoff = policy.backoff(retry);
                warn!(attempt = retry + 1, max_attempts, ?backoff, "retrying request");
                tokio::time::sleep(backoff).await;
            }

            match self.fetch_redirected(path).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!(attempt = retry + 1, max_attempts, error = %e, "request failed");

                    if retry >= policy.max_retries {
                        return Err(Error::Exhausted { attempts: max_attempts, source: Box::new(e) });
                    }
                }
            }

            retry += 1;
        }
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}


#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{testing::ScriptedTransport, *};
    use crate::error::ErrorKind;

    const FIRST: &str = "https://opendata.aemet.es/opendata/api/test";

    fn fetcher(transport: &Arc<ScriptedTransport>) -> Fetcher {
        Fetcher::new("KEY", transport.clone())
    }

    #[tokio::test]
    async fn follows_datos_link() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .route(FIRST, r#"{"descripcion": "exito", "estado": 200, "datos": "https://x/y"}"#)
                .route("https://x/y", r#"{"a": 1}"#),
        );

        let body: HashMap<String, i32> = fetcher(&transport).fetch_redirected("api/test").await.unwrap();

        assert_eq!(body["a"], 1);
        assert_eq!(transport.urls(), [FIRST, "https://x/y"]);
        assert_eq!(transport.keys(), ["KEY", "KEY"]);
    }

    #[tokio::test]
    async fn missing_datos_is_decode_error_without_second_request() {
        let transport = Arc::new(
            ScriptedTransport::new().route(FIRST, r#"{"descripcion": "API key invalido", "estado": 401}"#),
        );

        let err = fetcher(&transport)
            .fetch_redirected::<serde_json::Value>("api/test")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Decode);
        assert!(err.to_string().contains("API key invalido"));
        assert_eq!(transport.urls(), [FIRST]);
    }

    #[tokio::test]
    async fn invalid_first_body_is_decode_error() {
        let transport = Arc::new(ScriptedTransport::new().route(FIRST, "<html>busy</html>"));

        let err = fetcher(&transport)
            .fetch_redirected::<serde_json::Value>("api/test")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Decode);
        assert_eq!(transport.urls().len(), 1);
    }

    #[tokio::test]
    async fn payload_schema_mismatch_is_decode_error() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .route(FIRST, r#"{"datos": "https://x/y"}"#)
                .route("https://x/y", r#"{"a": "not a number"}"#),
        );

        let err = fetcher(&transport)
            .fetch_redirected::<HashMap<String, i32>>("api/test")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Decode);
        assert!(err.to_string().contains("https://x/y"));
    }

    #[tokio::test]
    async fn unreachable_payload_is_transport_error() {
        let transport = Arc::new(ScriptedTransport::new().route(FIRST, r#"{"datos": "https://x/gone"}"#));

        let err = fetcher(&transport)
            .fetch_redirected::<serde_json::Value>("api/test")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_with_exponential_backoff() {
        let transport = Arc::new(ScriptedTransport::new());
        let policy = RetryPolicy::new(3, Duration::from_millis(100));

        let err = fetcher(&transport)
            .fetch_redirected_with_retry::<serde_json::Value>("api/test", policy)
            .await
            .unwrap_err();

        let instants = transport.instants();
        assert_eq!(instants.len(), 4);

        let gaps: Vec<_> = instants.windows(2).map(|w| w[1] - w[0]).collect();
        assert_eq!(
            gaps,
            [Duration::from_millis(100), Duration::from_millis(200), Duration::from_millis(400)]
        );

        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(err.attempts(), 4);
        assert!(err.to_string().contains("4 attempts"));
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failures() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .route(FIRST, r#"{"datos": "https://x/y"}"#)
                .route("https://x/y", "[1, 2, 3]")
                .failing_first(2),
        );

        let values: Vec<i32> = fetcher(&transport)
            .fetch_redirected_with_retry("api/test", RetryPolicy::default())
            .await
            .unwrap();

        assert_eq!(values, [1, 2, 3]);
        assert_eq!(transport.urls().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_retries_makes_a_single_attempt() {
        let transport = Arc::new(ScriptedTransport::new());

        let err = fetcher(&transport)
            .fetch_redirected_with_retry::<serde_json::Value>("api/test", RetryPolicy::new(0, Duration::from_secs(1)))
            .await
            .unwrap_err();

        assert_eq!(err.attempts(), 1);
        assert_eq!(transport.urls().len(), 1);
    }

    #[tokio::test]
    async fn base_url_and_path_are_joined_once() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .route("http://localhost/api/test", r#"{"datos": "https://x/y"}"#)
                .route("https://x/y", "null"),
        );

        let fetcher = fetcher(&transport).with_base_url("http://localhost/");
        let _: Option<i32> = fetcher.fetch_redirected("/api/test").await.unwrap();

        assert_eq!(transport.urls()[0], "http://localhost/api/test");
    }

    /// Serves one canned HTTP response on a loopback port and hands back the
    /// request head it received.
    async fn serve_once(response: String) -> (String, tokio::sync::oneshot::Receiver<String>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            let _ = tx.send(String::from_utf8_lossy(&head).into_owned());
        });

        (format!("http://{addr}/api/test"), rx)
    }

    fn loopback_transport() -> ReqwestTransport {
        ReqwestTransport::with_client(Client::builder().no_proxy().build().unwrap())
    }

    #[tokio::test]
    async fn reqwest_transport_reports_status_and_keeps_key_out_of_errors() {
        let body = format!("{{\"descripcion\": \"fallo interno\", \"pad\": \"{}\"}}", "x".repeat(400));
        let response = format!(
            "HTTP/1.1 500 Internal Server Error\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let (url, request) = serve_once(response).await;

        let err = loopback_transport().get(&url, "SECRETKEY").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transport);
        let message = err.to_string();
        assert!(message.contains("500"), "{message}");
        assert!(message.contains("fallo interno"), "{message}");
        assert!(message.ends_with("..."), "{message}");
        assert!(!message.contains("SECRETKEY"), "{message}");

        let request = request.await.unwrap();
        let request_line = request.lines().next().unwrap();
        assert!(request_line.starts_with("GET /api/test?api_key=SECRETKEY "), "{request_line}");
    }

    #[tokio::test]
    async fn reqwest_transport_returns_body_on_success() {
        let body = r#"{"datos": "https://x/y"}"#;
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let (url, _request) = serve_once(response).await;

        let got = loopback_transport().get(&url, "KEY").await.unwrap();

        assert_eq!(got, body);
    }

    #[tokio::test]
    async fn unreachable_host_error_omits_key() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = format!("http://{addr}/api/test");
        let err = loopback_transport().get(&url, "SECRETKEY").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(!err.to_string().contains("SECRETKEY"));
    }

    #[test]
    fn backoff_doubles_per_retry() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let long = "ñ".repeat(300);
        let truncated = truncate_body(&long);
        assert_eq!(truncated.chars().count(), 203);
        assert_eq!(truncate_body("short"), "short");
    }
}
