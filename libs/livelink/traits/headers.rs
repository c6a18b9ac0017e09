use std::collections::HashMap;

/// HTTP headers to send with the WebSocket upgrade
pub type Headers = HashMap<String, String>;

/// Header key used for the credential when no provider overrides it
pub const DEFAULT_AUTHORIZATION_HEADER: &str = "Authorization";

/// Trait for supplying handshake headers
///
/// The request builder consults the provider every time a handshake
/// request is built, so rotating values (session ids, app versions) are
/// picked up on the next reconnect.
///
/// # Example
/// ```ignore
/// struct AppHeaders {
///     session_id: String,
/// }
///
/// impl HeaderProvider for AppHeaders {
///     fn default_headers(&self) -> Option<Headers> {
///         let mut headers = Headers::new();
///         headers.insert("X-SessionId".to_string(), self.session_id.clone());
///         Some(headers)
///     }
/// }
/// ```
pub trait HeaderProvider: Send + Sync {
    /// Header name that carries the credential token
    fn authorization_header_key(&self) -> &str {
        DEFAULT_AUTHORIZATION_HEADER
    }

    /// Headers added to every handshake
    ///
    /// Returning `None` lets the request builder fall back to its own
    /// session id header so the backend can still accept the upgrade.
    fn default_headers(&self) -> Option<Headers>;
}

/// A header provider that supplies nothing
pub struct NoHeaders;

impl HeaderProvider for NoHeaders {
    fn default_headers(&self) -> Option<Headers> {
        None
    }
}

/// Fixed set of headers, optionally with a custom authorization key
#[derive(Debug, Clone, Default)]
pub struct StaticHeaders {
    authorization_key: Option<String>,
    headers: Headers,
}

impl StaticHeaders {
    pub fn new(headers: Headers) -> Self {
        Self {
            authorization_key: None,
            headers,
        }
    }

    /// Send the credential under `key` instead of `Authorization`
    pub fn with_authorization_key(mut self, key: impl Into<String>) -> Self {
        self.authorization_key = Some(key.into());
        self
    }
}

impl HeaderProvider for StaticHeaders {
    fn authorization_header_key(&self) -> &str {
        self.authorization_key
            .as_deref()
            .unwrap_or(DEFAULT_AUTHORIZATION_HEADER)
    }

    fn default_headers(&self) -> Option<Headers> {
        Some(self.headers.clone())
    }
}
