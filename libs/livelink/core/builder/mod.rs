pub mod states;

use super::config::{ManagerConfig, TimingConfig};
use super::credential::Credential;
use super::machine::{Collaborators, MachineTiming};
use super::request::{BearerRequestBuilder, Endpoint, RequestBuilder};
use super::timers::TokioScheduler;
use crate::manager::ConnectionManager;
use crate::traits::*;
use states::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::unbounded_channel;
use tracing::info;

/// Type-state builder for [`ConnectionManager`]
///
/// The endpoint and the transport factory are required; `build()` only
/// exists once both have been supplied. Everything else has a default:
///
/// - reachability: [`NoReachability`]
/// - request builder: [`BearerRequestBuilder`] over the endpoint
/// - reconnection: [`FixedDelay`] with the configured reconnect delay
/// - timings: [`TimingConfig::default`]
/// - credential: [`Credential::empty`]
pub struct ConnectionManagerBuilder<E, T>
where
    E: EndpointState,
    T: TransportState,
{
    _state: TypeState<E, T>,
    endpoint: Option<String>,
    transport_factory: Option<Arc<dyn TransportFactory>>,
    reachability: Option<Arc<dyn ReachabilityFactory>>,
    headers: Option<Arc<dyn HeaderProvider>>,
    request_builder: Option<Arc<dyn RequestBuilder>>,
    reconnect_strategy: Option<Box<dyn ReconnectionStrategy>>,
    timing: TimingConfig,
    expiry_skew: Duration,
    credential: Credential,
}

impl ConnectionManagerBuilder<NoEndpoint, NoTransport> {
    /// Create a new builder instance
    pub fn new() -> Self {
        Self {
            _state: TypeState::new(),
            endpoint: None,
            transport_factory: None,
            reachability: None,
            headers: None,
            request_builder: None,
            reconnect_strategy: None,
            timing: TimingConfig::default(),
            expiry_skew: Duration::ZERO,
            credential: Credential::empty(),
        }
    }
}

impl Default for ConnectionManagerBuilder<NoEndpoint, NoTransport> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E, T> ConnectionManagerBuilder<E, T>
where
    E: EndpointState,
    T: TransportState,
{
    fn transition<E2, T2>(self) -> ConnectionManagerBuilder<E2, T2>
    where
        E2: EndpointState,
        T2: TransportState,
    {
        ConnectionManagerBuilder {
            _state: TypeState::new(),
            endpoint: self.endpoint,
            transport_factory: self.transport_factory,
            reachability: self.reachability,
            headers: self.headers,
            request_builder: self.request_builder,
            reconnect_strategy: self.reconnect_strategy,
            timing: self.timing,
            expiry_skew: self.expiry_skew,
            credential: self.credential,
        }
    }

    pub fn reachability(mut self, factory: impl ReachabilityFactory + 'static) -> Self {
        self.reachability = Some(Arc::new(factory));
        self
    }

    pub fn headers(mut self, provider: impl HeaderProvider + 'static) -> Self {
        self.headers = Some(Arc::new(provider));
        self
    }

    /// Replace the default bearer request builder
    ///
    /// Header providers are ignored once a custom builder is set.
    pub fn request_builder(mut self, builder: impl RequestBuilder + 'static) -> Self {
        self.request_builder = Some(Arc::new(builder));
        self
    }

    pub fn reconnect_strategy(mut self, strategy: impl ReconnectionStrategy + 'static) -> Self {
        self.reconnect_strategy = Some(Box::new(strategy));
        self
    }

    pub fn timing(mut self, timing: TimingConfig) -> Self {
        self.timing = timing;
        self
    }

    /// Treat credentials as expired `skew` before their expiry
    pub fn expiry_skew(mut self, skew: Duration) -> Self {
        self.expiry_skew = skew;
        self
    }

    /// Apply timings and expiry skew from a loaded configuration
    pub fn config(mut self, config: &ManagerConfig) -> Self {
        self.timing = config.timing.clone();
        self.expiry_skew = config.expiry_skew();
        self
    }

    /// Credential held before the first `connect`
    ///
    /// A usable credential lets the manager create its transport eagerly.
    pub fn credential(mut self, credential: Credential) -> Self {
        self.credential = credential;
        self
    }
}

// Endpoint setting
impl<T> ConnectionManagerBuilder<NoEndpoint, T>
where
    T: TransportState,
{
    pub fn endpoint(self, url: impl Into<String>) -> ConnectionManagerBuilder<HasEndpoint, T> {
        let mut builder = self.transition();
        builder.endpoint = Some(url.into());
        builder
    }
}

// Transport setting
impl<E> ConnectionManagerBuilder<E, NoTransport>
where
    E: EndpointState,
{
    pub fn transport(
        self,
        factory: impl TransportFactory + 'static,
    ) -> ConnectionManagerBuilder<E, HasTransport> {
        let mut builder = self.transition();
        builder.transport_factory = Some(Arc::new(factory));
        builder
    }
}

impl ConnectionManagerBuilder<HasEndpoint, HasTransport> {
    /// Validate the configuration and start the manager task
    ///
    /// Must be called from inside a tokio runtime.
    ///
    /// # Errors
    /// * `InvalidEndpoint` - the endpoint is not a `ws://`/`wss://` URL with a host
    /// * `Configuration` - a timing is zero, or no runtime is available
    pub fn build(self) -> Result<ConnectionManager> {
        let url = self
            .endpoint
            .ok_or_else(|| LiveLinkError::Configuration("endpoint not set".to_string()))?;
        let endpoint = Endpoint::parse(&url)?;

        let transport_factory = self
            .transport_factory
            .ok_or_else(|| LiveLinkError::Configuration("transport not set".to_string()))?;

        validate_timing(&self.timing)?;

        let request_builder = match self.request_builder {
            Some(builder) => builder,
            None => {
                let mut builder = BearerRequestBuilder::new(endpoint.clone())
                    .with_timeout(self.timing.request_timeout());
                if let Some(headers) = self.headers {
                    builder = builder.with_headers(headers);
                }
                Arc::new(builder)
            }
        };

        let reconnect_strategy = self
            .reconnect_strategy
            .unwrap_or_else(|| Box::new(FixedDelay::new(self.timing.reconnect_delay(), None)));

        let reachability_factory = self
            .reachability
            .unwrap_or_else(|| Arc::new(NoReachability));

        let (mailbox, inbox) = unbounded_channel();

        let collaborators = Collaborators {
            request_builder,
            transport_factory,
            reachability_factory,
            reconnect_strategy,
            scheduler: Box::new(TokioScheduler::new(mailbox.clone())),
        };

        let timing = MachineTiming {
            watchdog_timeout: self.timing.watchdog_timeout(),
            truly_lost_after: self.timing.truly_lost_after(),
            expiry_skew: self.expiry_skew,
        };

        info!("Building connection manager for {}", endpoint.url());

        ConnectionManager::start(self.credential, collaborators, timing, mailbox, inbox)
    }
}

fn validate_timing(timing: &TimingConfig) -> Result<()> {
    let durations = [
        ("watchdog timeout", timing.watchdog_timeout_secs),
        ("truly lost debounce", timing.truly_lost_after_secs),
        ("request timeout", timing.request_timeout_secs),
        ("reconnect delay", timing.reconnect_delay_secs),
    ];
    for (name, secs) in durations {
        if secs == 0 {
            return Err(LiveLinkError::Configuration(format!(
                "{} must be greater than 0",
                name
            )));
        }
    }
    Ok(())
}
