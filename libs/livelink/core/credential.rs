use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::fmt;

/// Bearer token used to authenticate the connection handshake
///
/// Immutable: a new credential replaces the old one wholesale.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
    expiry: DateTime<Utc>,
}

impl Credential {
    pub fn new(token: impl Into<String>, expiry: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expiry,
        }
    }

    /// Placeholder credential meaning "do not connect yet"
    pub fn empty() -> Self {
        Self::new(String::new(), Utc::now())
    }

    /// Credential valid for `ttl` from now
    pub fn valid_for(token: impl Into<String>, ttl: std::time::Duration) -> Self {
        let ttl = ChronoDuration::from_std(ttl).unwrap_or(ChronoDuration::MAX);
        let expiry = Utc::now().checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self::new(token, expiry)
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn expiry(&self) -> DateTime<Utc> {
        self.expiry
    }

    pub fn is_empty(&self) -> bool {
        self.token.is_empty()
    }

    /// `now > expiry`, wall clock, no skew allowance
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expiry
    }

    /// Treat the credential as expired `skew` before its real expiry
    pub fn is_expired_with_skew(&self, skew: std::time::Duration) -> bool {
        let skew = ChronoDuration::from_std(skew).unwrap_or(ChronoDuration::zero());
        match Utc::now().checked_add_signed(skew) {
            Some(now) => self.is_expired_at(now),
            None => true,
        }
    }

    /// Whether a connection attempt makes sense with this credential
    pub fn is_usable(&self) -> bool {
        !self.is_empty() && !self.is_expired()
    }
}

// Keep the token out of logs
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &format_args!("<{} chars>", self.token.len()))
            .field("expiry", &self.expiry)
            .finish()
    }
}
