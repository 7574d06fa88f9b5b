//! Multi-host, multi-retry HTTP fetch client.
//!
//! ## Failover order
//!
//! 1. Walk the endpoint list in configured order.
//! 2. Per endpoint, make up to `retry_times_per_host + 1` attempts.
//! 3. Sleep `retry_sleep` after every failed attempt (transport error or
//!    non-2xx status alike).
//! 4. Only when every endpoint/attempt pair has failed, report
//!    [`FetchError::ExhaustedEndpoints`]. The failure is always delivered
//!    after at least one suspension point, even with zero endpoints.
//!
//! The blocking `ureq` call runs on tokio's blocking pool; the transport is a
//! trait so the retry logic can be driven without a network.

use std::sync::Arc;

use serde_json::Value;

use disconf_core::FetchConfig;

use crate::error::FetchError;

const PROTOCOL: &str = "http://";

// ---------------------------------------------------------------------------
// Endpoints
// ---------------------------------------------------------------------------

/// Ordered, scheme-qualified base URLs. Immutable after construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Endpoints(Vec<String>);

impl Endpoints {
    /// Parse a comma-separated host list such as `10.0.0.1:8080,10.0.0.2:8080`.
    pub fn parse(hosts: &str) -> Self {
        Self::from_hosts(hosts.split(','))
    }

    pub fn from_hosts<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let list = hosts
            .into_iter()
            .map(|h| h.as_ref().trim().trim_end_matches('/').to_string())
            .filter(|h| !h.is_empty())
            .map(|h| {
                if h.starts_with("http://") || h.starts_with("https://") {
                    h
                } else {
                    format!("{PROTOCOL}{h}")
                }
            })
            .collect();
        Self(list)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Status and body of one HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// One blocking `GET`. Non-2xx answers are returned as responses, not errors.
pub trait HttpTransport: Send + Sync + 'static {
    fn get(&self, url: &str) -> Result<HttpResponse, FetchError>;
}

/// [`HttpTransport`] backed by a shared `ureq` agent.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        let agent = ureq::AgentBuilder::new()
            .user_agent(concat!("disconf-sync/", env!("CARGO_PKG_VERSION")))
            .build();
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport for UreqTransport {
    fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
        match self.agent.get(url).call() {
            Ok(response) => {
                let status = response.status();
                let body = response.into_string().map_err(|e| FetchError::Transport {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;
                Ok(HttpResponse { status, body })
            }
            Err(ureq::Error::Status(status, response)) => Ok(HttpResponse {
                status,
                body: response.into_string().unwrap_or_default(),
            }),
            Err(ureq::Error::Transport(transport)) => Err(FetchError::Transport {
                url: url.to_string(),
                reason: transport.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Body
// ---------------------------------------------------------------------------

/// A response body after opportunistic JSON decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Json(Value),
    Text(String),
}

impl Body {
    /// The `value` field of a `{status, message, value}` envelope, as text.
    ///
    /// Strings come back verbatim; other JSON values as compact JSON.
    pub fn value_text(&self) -> Option<String> {
        match self {
            Body::Json(Value::Object(map)) => match map.get("value") {
                None | Some(Value::Null) => None,
                Some(Value::String(s)) => Some(s.clone()),
                Some(other) => Some(other.to_string()),
            },
            _ => None,
        }
    }
}

fn decode(path: &str, raw: String) -> Body {
    match serde_json::from_str::<Value>(&raw) {
        Ok(value) => Body::Json(value),
        Err(_) => {
            tracing::debug!(path, "response body is not JSON, keeping raw text");
            Body::Text(raw)
        }
    }
}

// ---------------------------------------------------------------------------
// HttpFetcher
// ---------------------------------------------------------------------------

/// Failover fetch client over an [`Endpoints`] list.
#[derive(Clone)]
pub struct HttpFetcher {
    endpoints: Arc<Endpoints>,
    config: FetchConfig,
    transport: Arc<dyn HttpTransport>,
}

impl std::fmt::Debug for HttpFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFetcher")
            .field("endpoints", &self.endpoints)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl HttpFetcher {
    pub fn new(endpoints: Endpoints, config: FetchConfig) -> Self {
        Self::with_transport(endpoints, config, Arc::new(UreqTransport::new()))
    }

    pub fn with_transport(
        endpoints: Endpoints,
        config: FetchConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            endpoints: Arc::new(endpoints),
            config,
            transport,
        }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Structured fetch: JSON-decoded when possible, raw text otherwise.
    pub async fn fetch(&self, path: &str) -> Result<Body, FetchError> {
        let raw = self.request(path).await?;
        Ok(decode(path, raw))
    }

    /// Raw fetch: the body is never decoded.
    pub async fn fetch_raw(&self, path: &str) -> Result<String, FetchError> {
        self.request(path).await
    }

    async fn request(&self, path: &str) -> Result<String, FetchError> {
        let mut attempts = 0usize;
        for base in self.endpoints.iter() {
            for retry in 0..self.config.attempts_per_host() {
                let url = format!("{base}{path}");
                attempts += 1;
                match self.attempt(&url).await {
                    Ok(body) => return Ok(body),
                    Err(err) => {
                        tracing::warn!(url = %url, retry, error = %err, "request attempt failed");
                        tokio::time::sleep(self.config.retry_sleep).await;
                    }
                }
            }
        }

        // Zero endpoints never reach the loop above; still fail asynchronously.
        tokio::task::yield_now().await;
        Err(FetchError::ExhaustedEndpoints {
            path: path.to_string(),
            attempts,
        })
    }

    async fn attempt(&self, url: &str) -> Result<String, FetchError> {
        let transport = Arc::clone(&self.transport);
        let owned = url.to_string();
        let response = tokio::task::spawn_blocking(move || transport.get(&owned))
            .await
            .map_err(|err| FetchError::Join(err.to_string()))??;

        if (200..300).contains(&response.status) {
            Ok(response.body)
        } else {
            Err(FetchError::Status {
                url: url.to_string(),
                status: response.status,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
