//! MPP conversion service client
//!
//! Binary `.mpp` files are posted to an external converter
//! (`POST {url}/api/parse-mpp`, multipart field `file`, `X-API-KEY` header)
//! which answers with converter JSON. Transport failures and 5xx answers are
//! retried with exponential backoff; 4xx answers never are.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{assemble, json, Ingested};

/// Longest error body kept in an error message
const MAX_ERROR_BODY: usize = 500;

/// Connection settings for the conversion service
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL, e.g. `https://converter.example.org`
    pub url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_ms: u64,
    /// Reuse answers for byte-identical files within one client
    pub cache: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: None,
            timeout_secs: 300,
            max_retries: 2,
            backoff_ms: 500,
            cache: true,
        }
    }
}

impl ServiceConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn retries(mut self, max_retries: u32, backoff_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.backoff_ms = backoff_ms;
        self
    }

    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty()
    }

    /// Full endpoint URL
    pub fn endpoint(&self) -> String {
        format!("{}/api/parse-mpp", self.url.trim().trim_end_matches('/'))
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_ms.saturating_mul(1u64 << attempt.min(16)))
    }
}

/// Conversion failure
#[derive(Debug, Error)]
pub enum RemoteServiceError {
    #[error("conversion service not configured: set a service URL")]
    NotConfigured,

    #[error("conversion service unreachable at {url}: {message}")]
    Unreachable { url: String, message: String },

    #[error("conversion service timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("conversion service rejected the file (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("conversion service failed (HTTP {status}): {body}")]
    ServerError { status: u16, body: String },

    #[error("conversion service returned an unusable response: {0}")]
    MalformedResponse(String),
}

impl RemoteServiceError {
    /// Transport failures and server errors may succeed on a later attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Unreachable { .. } | Self::Timeout { .. } | Self::ServerError { .. }
        )
    }
}

/// Blocking client for the conversion service
pub struct ConversionClient {
    config: ServiceConfig,
    client: reqwest::blocking::Client,
    cache: HashMap<[u8; 32], Vec<u8>>,
}

impl ConversionClient {
    pub fn new(config: ServiceConfig) -> Result<Self, RemoteServiceError> {
        if !config.is_configured() {
            return Err(RemoteServiceError::NotConfigured);
        }

        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("monitorail/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RemoteServiceError::Unreachable {
                url: config.endpoint(),
                message: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            config,
            client,
            cache: HashMap::new(),
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Convert an MPP file and ingest the answer
    pub fn convert(
        &mut self,
        bytes: &[u8],
        file_name: &str,
    ) -> Result<Ingested, RemoteServiceError> {
        self.answer(bytes, file_name).map(|(_, ingested)| ingested)
    }

    /// Raw converter JSON for an MPP file, served from the cache when the
    /// same bytes were converted before
    pub fn fetch(&mut self, bytes: &[u8], file_name: &str) -> Result<Vec<u8>, RemoteServiceError> {
        self.answer(bytes, file_name).map(|(body, _)| body)
    }

    /// Only answers that ingest cleanly are cached
    fn answer(
        &mut self,
        bytes: &[u8],
        file_name: &str,
    ) -> Result<(Vec<u8>, Ingested), RemoteServiceError> {
        let key: [u8; 32] = Sha256::digest(bytes).into();
        if self.config.cache {
            if let Some(body) = self.cache.get(&key) {
                debug!(file = file_name, "conversion served from cache");
                let ingested = ingest_answer(body, file_name)?;
                return Ok((body.clone(), ingested));
            }
        }

        let body = self.post_with_retry(bytes, file_name)?;
        let ingested = ingest_answer(&body, file_name)?;
        if self.config.cache {
            self.cache.insert(key, body.clone());
        }
        Ok((body, ingested))
    }

    fn post_with_retry(
        &self,
        bytes: &[u8],
        file_name: &str,
    ) -> Result<Vec<u8>, RemoteServiceError> {
        let mut attempt = 0;
        loop {
            match self.post_once(bytes, file_name) {
                Ok(body) => return Ok(body),
                Err(err) if err.is_retryable() && attempt < self.config.max_retries => {
                    let delay = self.config.backoff(attempt);
                    warn!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "conversion failed, retrying: {err}"
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn post_once(&self, bytes: &[u8], file_name: &str) -> Result<Vec<u8>, RemoteServiceError> {
        let url = self.config.endpoint();
        info!(
            url = %url,
            file = file_name,
            size = bytes.len(),
            "posting file to conversion service"
        );

        let part = reqwest::blocking::multipart::Part::bytes(bytes.to_vec())
            .file_name(file_name.to_string());
        let form = reqwest::blocking::multipart::Form::new().part("file", part);

        let mut request = self.client.post(&url).multipart(form);
        if let Some(key) = &self.config.api_key {
            request = request.header("X-API-KEY", key);
        }

        let response = request.send().map_err(|e| self.transport_error(&e))?;
        let status = response.status();
        let body = response.bytes().map_err(|e| self.transport_error(&e))?;

        if status.is_success() {
            return Ok(body.to_vec());
        }

        let message = error_message(&body);
        if status.is_server_error() {
            Err(RemoteServiceError::ServerError {
                status: status.as_u16(),
                body: message,
            })
        } else {
            Err(RemoteServiceError::Rejected {
                status: status.as_u16(),
                body: message,
            })
        }
    }

    fn transport_error(&self, err: &reqwest::Error) -> RemoteServiceError {
        if err.is_timeout() {
            RemoteServiceError::Timeout {
                secs: self.config.timeout_secs,
            }
        } else {
            RemoteServiceError::Unreachable {
                url: self.config.endpoint(),
                message: err.to_string(),
            }
        }
    }
}

fn ingest_answer(body: &[u8], file_name: &str) -> Result<Ingested, RemoteServiceError> {
    let raw =
        json::read_json(body).map_err(|e| RemoteServiceError::MalformedResponse(e.to_string()))?;
    assemble::assemble(raw, file_name)
        .map_err(|e| RemoteServiceError::MalformedResponse(e.to_string()))
}

/// `{"error": "..."}` bodies yield their message, anything else its text
fn error_message(body: &[u8]) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: String,
    }

    if let Ok(parsed) = serde_json::from_slice::<ErrorBody>(body) {
        return parsed.error;
    }
    let text = String::from_utf8_lossy(body).trim().to_string();
    if text.chars().count() > MAX_ERROR_BODY {
        let cut: String = text.chars().take(MAX_ERROR_BODY).collect();
        format!("{cut}...")
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Serve canned HTTP answers, one per connection, counting requests
    fn serve(answers: Vec<(u16, &'static str)>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        std::thread::spawn(move || {
            for (status, body) in answers {
                let Ok((mut stream, _)) = listener.accept() else {
                    return;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                read_request(&mut stream);
                let response = format!(
                    "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes());
            }
        });

        (url, hits)
    }

    /// Drain headers and the declared body so the client sees a clean answer
    fn read_request(stream: &mut std::net::TcpStream) {
        let mut data = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = stream.read(&mut buf).unwrap_or(0);
            if n == 0 {
                return;
            }
            data.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&data);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|l| {
                        let lower = l.to_ascii_lowercase();
                        lower
                            .strip_prefix("content-length:")
                            .and_then(|v| v.trim().parse::<usize>().ok())
                    })
                    .unwrap_or(0);
                if data.len() >= end + 4 + length {
                    return;
                }
            }
        }
    }

    const CONVERTED: &str = r#"{"projectName":"P","tasks":[{"id":1,"name":"A","percentComplete":50}]}"#;

    fn client(url: &str) -> ConversionClient {
        ConversionClient::new(ServiceConfig::new(url).api_key("k").retries(2, 1)).unwrap()
    }

    #[test]
    fn defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.timeout_secs, 300);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.backoff(0), Duration::from_millis(500));
        assert_eq!(config.backoff(2), Duration::from_millis(2000));
    }

    #[test]
    fn endpoint_joins_path() {
        assert_eq!(
            ServiceConfig::new("https://conv.example.org/").endpoint(),
            "https://conv.example.org/api/parse-mpp"
        );
    }

    #[test]
    fn unconfigured_client_rejected() {
        assert!(matches!(
            ConversionClient::new(ServiceConfig::default()),
            Err(RemoteServiceError::NotConfigured)
        ));
    }

    #[test]
    fn retryability() {
        let cases = [
            (RemoteServiceError::Timeout { secs: 1 }, true),
            (
                RemoteServiceError::ServerError {
                    status: 503,
                    body: String::new(),
                },
                true,
            ),
            (
                RemoteServiceError::Rejected {
                    status: 401,
                    body: String::new(),
                },
                false,
            ),
            (RemoteServiceError::MalformedResponse("x".into()), false),
        ];
        for (err, expected) in cases {
            assert_eq!(err.is_retryable(), expected, "{err}");
        }
    }

    #[test]
    fn error_body_message_extracted() {
        assert_eq!(error_message(br#"{"error":"Invalid API key"}"#), "Invalid API key");
        assert_eq!(error_message(b"  boom  "), "boom");
    }

    #[test]
    fn converts_and_caches() {
        let (url, hits) = serve(vec![(200, CONVERTED)]);
        let mut client = client(&url);

        let ingested = client.convert(b"mpp-bytes", "lotto.mpp").unwrap();
        assert_eq!(ingested.schedule.project_name, "P");
        assert_eq!(ingested.schedule.activities[0].percent_complete, Some(50.0));

        // Second conversion of the same bytes never reaches the server
        client.convert(b"mpp-bytes", "lotto.mpp").unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn retries_server_errors() {
        let (url, hits) = serve(vec![(503, "{}"), (500, "{}"), (200, CONVERTED)]);
        let mut client = client(&url);

        assert!(client.convert(b"x", "a.mpp").is_ok());
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn never_retries_client_errors() {
        let (url, hits) = serve(vec![(401, r#"{"error":"Invalid API key"}"#), (200, CONVERTED)]);
        let mut client = client(&url);

        let err = client.convert(b"x", "a.mpp").unwrap_err();
        match err {
            RemoteServiceError::Rejected { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "Invalid API key");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn gives_up_after_max_retries() {
        let (url, hits) = serve(vec![
            (502, "bad gateway"),
            (502, "bad gateway"),
            (502, "bad gateway"),
        ]);
        let mut client = client(&url);

        let err = client.convert(b"x", "a.mpp").unwrap_err();
        assert!(matches!(err, RemoteServiceError::ServerError { status: 502, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn malformed_answer() {
        let (url, _) = serve(vec![(200, "not json")]);
        let mut client = client(&url);

        assert!(matches!(
            client.convert(b"x", "a.mpp"),
            Err(RemoteServiceError::MalformedResponse(_))
        ));
    }

    #[test]
    fn unusable_answer_not_cached() {
        let (url, hits) = serve(vec![
            (200, r#"{"projectName":"P","tasks":[]}"#),
            (200, CONVERTED),
        ]);
        let mut client = client(&url);

        assert!(matches!(
            client.fetch(b"x", "a.mpp"),
            Err(RemoteServiceError::MalformedResponse(_))
        ));
        let ingested = client.convert(b"x", "a.mpp").unwrap();
        assert_eq!(ingested.schedule.len(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unreachable_service() {
        // Bind then drop to get a port nothing listens on
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let mut client = ConversionClient::new(
            ServiceConfig::new(format!("http://127.0.0.1:{port}")).retries(0, 1),
        )
        .unwrap();

        assert!(matches!(
            client.convert(b"x", "a.mpp"),
            Err(RemoteServiceError::Unreachable { .. })
        ));
    }
}
