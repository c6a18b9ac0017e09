use std::time::Duration;

/// Delay used by the default strategy after an unexpected drop
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Trait for deciding when the reconnect timer fires
///
/// The state machine asks for a delay every time the connection is lost
/// with a still-valid credential. `attempt` counts consecutive losses and
/// goes back to zero once the connection is established again.
pub trait ReconnectionStrategy: Send + Sync {
    /// Delay before the next automatic reconnect
    ///
    /// # Returns
    /// * `Some(duration)` - Arm the reconnect timer with this delay
    /// * `None` - Stay in `ConnectionLost` and wait for the caller
    fn next_delay(&self, attempt: usize) -> Option<Duration>;

    /// Reset the strategy state (called after a successful connection)
    fn reset(&mut self);

    /// Check if another attempt is allowed
    fn should_reconnect(&self, attempt: usize) -> bool;
}

/// Exponential backoff reconnection strategy
///
/// Delays grow as initial_delay * 2^attempt, capped at max_delay
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial_delay: Duration,
    max_delay: Duration,
    max_attempts: Option<usize>,
}

impl ExponentialBackoff {
    /// Create a new exponential backoff strategy
    ///
    /// # Arguments
    /// * `initial_delay` - Delay before the first reconnect
    /// * `max_delay` - Upper bound for any delay
    /// * `max_attempts` - Maximum number of attempts (None = unlimited)
    pub fn new(initial_delay: Duration, max_delay: Duration, max_attempts: Option<usize>) -> Self {
        Self {
            initial_delay,
            max_delay,
            max_attempts,
        }
    }
}

impl ReconnectionStrategy for ExponentialBackoff {
    fn next_delay(&self, attempt: usize) -> Option<Duration> {
        if !self.should_reconnect(attempt) {
            return None;
        }

        let factor = 1u32.checked_shl(attempt as u32).unwrap_or(u32::MAX);
        let delay = self
            .initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay);
        Some(delay.min(self.max_delay))
    }

    fn reset(&mut self) {}

    fn should_reconnect(&self, attempt: usize) -> bool {
        self.max_attempts.map_or(true, |max| attempt < max)
    }
}

/// Fixed delay reconnection strategy
///
/// Always waits the same amount of time. With `DEFAULT_RECONNECT_DELAY`
/// and no attempt limit this is the strategy a manager gets by default.
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
    max_attempts: Option<usize>,
}

impl FixedDelay {
    /// Create a new fixed delay strategy
    ///
    /// # Arguments
    /// * `delay` - The fixed delay between reconnects
    /// * `max_attempts` - Maximum number of attempts (None = unlimited)
    pub fn new(delay: Duration, max_attempts: Option<usize>) -> Self {
        Self { delay, max_attempts }
    }
}

impl Default for FixedDelay {
    fn default() -> Self {
        Self::new(DEFAULT_RECONNECT_DELAY, None)
    }
}

impl ReconnectionStrategy for FixedDelay {
    fn next_delay(&self, attempt: usize) -> Option<Duration> {
        if !self.should_reconnect(attempt) {
            return None;
        }
        Some(self.delay)
    }

    fn reset(&mut self) {}

    fn should_reconnect(&self, attempt: usize) -> bool {
        self.max_attempts.map_or(true, |max| attempt < max)
    }
}

/// Never reconnect automatically
///
/// Losing the connection leaves the manager in `ConnectionLost` until the
/// caller invokes `reconnect()` or `update(.., needs_reconnect: true, ..)`.
#[derive(Debug, Clone)]
pub struct NeverReconnect;

impl ReconnectionStrategy for NeverReconnect {
    fn next_delay(&self, _attempt: usize) -> Option<Duration> {
        None
    }

    fn reset(&mut self) {}

    fn should_reconnect(&self, _attempt: usize) -> bool {
        false
    }
}
