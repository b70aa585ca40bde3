//! Collector HTTP client for tabpulse.
//!
//! A batch is one `POST` to the configured endpoint:
//!
//! ```text
//! POST /events
//! Content-Type: application/json
//! X-Installation-Id: 6f1c...-...
//!
//! {"events":[{"kind":"active","domain":"example.com","timestamp":"2025-01-01T00:00:00.000Z"}]}
//! ```
//!
//! Any 2xx status (including `204 No Content`) acknowledges the whole batch.
//! Everything else, and every transport error, is a [`DeliveryError`].

use std::fmt;
use std::future::Future;
use std::time::Duration;

use reqwest::Url;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use thiserror::Error;
use tp_core::{Event, Identity};

/// Default request timeout for batch uploads.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Header carrying the installation identity.
pub const IDENTITY_HEADER: &str = "X-Installation-Id";
/// Longest response body excerpt kept in errors.
const MAX_ERROR_BODY: usize = 512;

/// Delivery errors. All of them are retryable from the scheduler's view.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The configured endpoint is not an http(s) URL.
    #[error("invalid collector endpoint {endpoint}: {reason}")]
    InvalidEndpoint {
        endpoint: String,
        reason: &'static str,
    },
    /// Failed to build HTTP client.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    /// HTTP request failed before a response arrived.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The collector answered with a non-success status.
    #[error("collector rejected batch with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Something that can deliver a batch of events.
///
/// The agent is generic over this so tests can script outcomes without a
/// network.
pub trait Transport: Send + Sync + 'static {
    fn send_batch(
        &self,
        identity: Identity,
        events: &[Event],
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}

/// Request body of one batch.
#[derive(Debug, Serialize)]
pub struct BatchPayload<'a> {
    pub events: Vec<WireEvent<'a>>,
}

/// One event as the collector sees it.
#[derive(Debug, Serialize)]
pub struct WireEvent<'a> {
    pub kind: &'static str,
    pub domain: &'a str,
    /// ISO 8601 in UTC with millisecond precision.
    pub timestamp: String,
}

impl<'a> BatchPayload<'a> {
    pub fn new(events: &'a [Event]) -> Self {
        let events = events
            .iter()
            .map(|event| WireEvent {
                kind: event.kind.as_str(),
                domain: event.domain.as_str(),
                timestamp: event.occurred_at.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            })
            .collect();
        Self { events }
    }
}

/// HTTP client for the remote collector.
///
/// # Thread Safety
///
/// The client is safe to share across tasks. Clones share the underlying
/// connection pool.
#[derive(Clone)]
pub struct CollectorClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl fmt::Debug for CollectorClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectorClient")
            .field("endpoint", &self.endpoint.as_str())
            .finish_non_exhaustive()
    }
}

impl CollectorClient {
    /// Creates a client for the given endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is not an absolute http(s) URL, or if
    /// the HTTP client fails to build.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, DeliveryError> {
        let endpoint = parse_endpoint(endpoint)?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tabpulse/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(DeliveryError::ClientBuild)?;
        Ok(Self { http, endpoint })
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    /// Checks that the collector answers at all.
    ///
    /// Sends a `HEAD` to the endpoint and returns the status code, whatever
    /// it is. Only transport failures are errors.
    pub async fn ping(&self) -> Result<u16, DeliveryError> {
        let response = self.http.head(self.endpoint.clone()).send().await?;
        Ok(response.status().as_u16())
    }

    async fn post_batch(&self, identity: Identity, events: &[Event]) -> Result<(), DeliveryError> {
        let payload = BatchPayload::new(events);
        let response = self
            .http
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(IDENTITY_HEADER, identity.token())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(status = status.as_u16(), events = events.len(), "batch accepted");
            return Ok(());
        }
        let mut body = response.text().await.unwrap_or_default();
        truncate_on_char_boundary(&mut body, MAX_ERROR_BODY);
        Err(DeliveryError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

impl Transport for CollectorClient {
    fn send_batch(
        &self,
        identity: Identity,
        events: &[Event],
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send {
        self.post_batch(identity, events)
    }
}

fn parse_endpoint(endpoint: &str) -> Result<Url, DeliveryError> {
    let invalid = |reason| DeliveryError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason,
    };
    let url = Url::parse(endpoint.trim()).map_err(|_| invalid("not a URL"))?;
    match url.scheme() {
        "http" | "https" => {}
        _ => return Err(invalid("scheme must be http or https")),
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host"));
    }
    Ok(url)
}

fn truncate_on_char_boundary(text: &mut String, max: usize) {
    if text.len() <= max {
        return;
    }
    let mut cut = max;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
}
