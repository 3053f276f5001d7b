//! Outbound HTTP transport for the Gemini API.
//!
//! [`KeyedProxyTransport`] decorates any [`RoundTrip`] implementation: every
//! request leaves with the `key` query parameter set to the configured API key,
//! and when a proxy is configured the traffic goes through a dedicated client
//! that authenticates against the proxy and skips certificate verification.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Proxy, Request, Response, Url};
use tracing::{debug, info};

/// Query parameter carrying the API key.
pub const KEY_PARAM: &str = "key";

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A single HTTP request/response exchange.
#[async_trait]
pub trait RoundTrip: Send + Sync {
    async fn round_trip(&self, req: Request) -> Result<Response, BoxError>;
}

#[async_trait]
impl RoundTrip for Client {
    async fn round_trip(&self, req: Request) -> Result<Response, BoxError> {
        // reqwest puts the full URL in its errors, key included.
        self.execute(req)
            .await
            .map_err(|e| Box::new(e.without_url()) as BoxError)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Bad proxy URL or a client that could not be built. Raised at construction,
    /// before any request is sent.
    #[error("transport configuration: {context}: {source}")]
    Configuration {
        context: String,
        #[source]
        source: BoxError,
    },
    /// The inner round-tripper failed. Never retried.
    #[error("error during round trip to {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: BoxError,
    },
}

/// Authenticated HTTP proxy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyConfig {
    pub url: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Default)]
pub struct TransportConfig {
    pub api_key: String,
    pub proxy: Option<ProxyConfig>,
    /// Applied to clients this module builds itself.
    pub timeout: Option<Duration>,
}

/// Adds the API key to every request and optionally routes through a proxy.
///
/// The inner transport is resolved once, in [`KeyedProxyTransport::new`], and never
/// changed afterwards, so one instance can be shared across concurrent handlers.
pub struct KeyedProxyTransport {
    api_key: String,
    inner: Arc<dyn RoundTrip>,
    proxied: bool,
}

impl KeyedProxyTransport {
    /// Resolve the inner transport.
    ///
    /// With a proxy configured, a fresh pooling client is built for it and `inner` is
    /// left untouched. Without one, `inner` is used as given, defaulting to a plain
    /// `reqwest::Client`.
    pub fn new(
        config: TransportConfig,
        inner: Option<Arc<dyn RoundTrip>>,
    ) -> Result<Self, TransportError> {
        let (inner, proxied) = match &config.proxy {
            Some(proxy) => {
                let client = proxied_client(proxy, config.timeout)?;
                info!(proxy = %redact(&proxy.url), "routing AI traffic through proxy");
                (Arc::new(client) as Arc<dyn RoundTrip>, true)
            }
            None => match inner {
                Some(inner) => (inner, false),
                None => (Arc::new(plain_client(config.timeout)?) as Arc<dyn RoundTrip>, false),
            },
        };

        Ok(Self {
            api_key: config.api_key,
            inner,
            proxied,
        })
    }

    pub fn is_proxied(&self) -> bool {
        self.proxied
    }

    /// Send `req` with the API key attached.
    pub async fn send(&self, mut req: Request) -> Result<Response, TransportError> {
        let keyed = with_key(req.url(), &self.api_key);
        *req.url_mut() = keyed;

        let url = redact(req.url().as_str());
        debug!(method = %req.method(), url = %url, proxied = self.proxied, "round trip");

        self.inner
            .round_trip(req)
            .await
            .map_err(|source| TransportError::Transport { url, source })
    }
}

#[async_trait]
impl RoundTrip for KeyedProxyTransport {
    async fn round_trip(&self, req: Request) -> Result<Response, BoxError> {
        self.send(req).await.map_err(Into::into)
    }
}

/// Copy of `url` whose `key` parameter is exactly `key`.
///
/// Other query pairs keep their order; any existing `key` pairs are dropped.
pub fn with_key(url: &Url, key: &str) -> Url {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(name, _)| name != KEY_PARAM)
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();

    let mut keyed = url.clone();
    keyed
        .query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(KEY_PARAM, key);
    keyed
}

/// Strip query and credentials so URLs can be logged.
fn redact(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_query(None);
            let _ = parsed.set_username("");
            let _ = parsed.set_password(None);
            parsed.to_string()
        }
        Err(_) => "<unparseable url>".to_string(),
    }
}

const PROXY_SCHEMES: &[&str] = &["http", "https"];

fn proxied_client(proxy: &ProxyConfig, timeout: Option<Duration>) -> Result<Client, TransportError> {
    let invalid = |source: BoxError| TransportError::Configuration {
        context: format!("invalid proxy url '{}'", redact(&proxy.url)),
        source,
    };

    let url = Url::parse(&proxy.url).map_err(|e| invalid(Box::new(e)))?;
    if !PROXY_SCHEMES.contains(&url.scheme()) {
        return Err(invalid(format!("unsupported proxy scheme '{}'", url.scheme()).into()));
    }

    let mut rule = Proxy::all(url).map_err(|e| invalid(Box::new(e)))?;
    if !proxy.username.is_empty() {
        rule = rule.basic_auth(&proxy.username, &proxy.password);
    }

    let mut builder = Client::builder()
        .proxy(rule)
        .danger_accept_invalid_certs(true);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().map_err(|e| TransportError::Configuration {
        context: "failed to build proxied client".to_string(),
        source: Box::new(e),
    })
}

fn plain_client(timeout: Option<Duration>) -> Result<Client, TransportError> {
    let mut builder = Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().map_err(|e| TransportError::Configuration {
        context: "failed to build client".to_string(),
        source: Box::new(e),
    })
}
