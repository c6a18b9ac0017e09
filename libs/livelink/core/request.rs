//! Handshake request construction

use super::credential::Credential;
use crate::traits::{HeaderProvider, LiveLinkError, Result, DEFAULT_AUTHORIZATION_HEADER};
use std::sync::Arc;
use std::time::Duration;
use tokio_tungstenite::tungstenite::http::Uri;
use tracing::info;

/// Header carrying the fallback session id
pub const SESSION_ID_HEADER: &str = "X-SessionId";

/// Default handshake timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything a transport needs to perform the upgrade
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRequest {
    pub url: String,
    pub host: String,
    /// Applied in order; later entries win on duplicate names
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
}

impl HandshakeRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .rev()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Turns a credential into a handshake request. Must be pure.
pub trait RequestBuilder: Send + Sync {
    fn build(&self, credential: &Credential) -> HandshakeRequest;
}

/// Validated `ws://` or `wss://` endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    url: String,
    host: String,
}

impl Endpoint {
    pub fn parse(url: &str) -> Result<Self> {
        let uri: Uri = url
            .parse()
            .map_err(|e| LiveLinkError::InvalidEndpoint(format!("{}: {}", url, e)))?;

        match uri.scheme_str() {
            Some("ws") | Some("wss") => {}
            other => {
                return Err(LiveLinkError::InvalidEndpoint(format!(
                    "{}: unsupported scheme {:?}",
                    url, other
                )))
            }
        }

        let host = uri
            .host()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| LiveLinkError::InvalidEndpoint(format!("{}: missing host", url)))?;

        Ok(Self {
            url: url.to_string(),
            host: host.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

/// Default builder: credential token in the authorization header
///
/// The token is sent as-is (no scheme prefix). Without a header provider
/// that supplies defaults, a random session id generated once per builder
/// is attached so the backend can still correlate the upgrade.
pub struct BearerRequestBuilder {
    endpoint: Endpoint,
    headers: Option<Arc<dyn HeaderProvider>>,
    timeout: Duration,
    fallback_session_id: String,
}

impl BearerRequestBuilder {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            headers: None,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            fallback_session_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn with_headers(mut self, provider: Arc<dyn HeaderProvider>) -> Self {
        self.headers = Some(provider);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn fallback_session_id(&self) -> &str {
        &self.fallback_session_id
    }
}

impl RequestBuilder for BearerRequestBuilder {
    fn build(&self, credential: &Credential) -> HandshakeRequest {
        let auth_key = self
            .headers
            .as_ref()
            .map(|provider| provider.authorization_header_key().to_string())
            .unwrap_or_else(|| DEFAULT_AUTHORIZATION_HEADER.to_string());

        let mut headers = vec![(auth_key, credential.token().to_string())];

        match self.headers.as_ref().and_then(|provider| provider.default_headers()) {
            Some(defaults) => {
                let mut defaults: Vec<(String, String)> = defaults.into_iter().collect();
                defaults.sort();
                headers.extend(defaults);
            }
            None => {
                info!(
                    "No default headers configured, using fallback session id {}",
                    self.fallback_session_id
                );
                headers.push((SESSION_ID_HEADER.to_string(), self.fallback_session_id.clone()));
            }
        }

        HandshakeRequest {
            url: self.endpoint.url().to_string(),
            host: self.endpoint.host().to_string(),
            headers,
            timeout: self.timeout,
        }
    }
}
