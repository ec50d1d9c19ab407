//! Connector factory - maps source_type strings to adapter constructors
//!
//! Adding a provider requires a new [`Provider`] impl, one enum variant, and
//! one match arm here - nothing else changes.
//!
//! [`Provider`]: crate::traits::Provider

use tokio::sync::mpsc;

use inlet_protocol::{ConnectionResult, FetchRequest, FetchResult, SourceConfig, SourceSchema};

use crate::connector::{Connector, Heartbeat};
use crate::error::ConnectorError;

#[cfg(feature = "posthog")]
use crate::posthog::PostHog;
#[cfg(feature = "rb2b")]
use crate::rb2b::Rb2b;
#[cfg(feature = "unipile")]
use crate::unipile::Unipile;
#[cfg(feature = "x")]
use crate::x::X;

/// Source types compiled into this build
pub fn available_sources() -> &'static [&'static str] {
    &[
        #[cfg(feature = "posthog")]
        "posthog",
        #[cfg(feature = "rb2b")]
        "rb2b",
        #[cfg(feature = "unipile")]
        "unipile",
        #[cfg(feature = "x")]
        "x",
    ]
}

/// A constructed connector for one source type
///
/// Enum dispatch keeps the registry and the supported set in one place the
/// compiler checks - runtime polymorphism without `dyn`.
#[derive(Debug)]
pub enum SourceConnector {
    #[cfg(feature = "unipile")]
    Unipile(Connector<Unipile>),
    #[cfg(feature = "x")]
    X(Connector<X>),
    #[cfg(feature = "posthog")]
    PostHog(Connector<PostHog>),
    #[cfg(feature = "rb2b")]
    Rb2b(Connector<Rb2b>),
    // Placeholder to prevent an empty enum when no features are enabled
    #[cfg(not(any(feature = "unipile", feature = "x", feature = "posthog", feature = "rb2b")))]
    _None,
}

/// Instantiate the connector for the given source type
///
/// # Errors
///
/// Unknown source types and invalid rate limits are construction-time errors
/// naming the problem - caller bugs, not external conditions.
pub fn get(config: SourceConfig) -> Result<SourceConnector, ConnectorError> {
    match config.source_type.as_str() {
        #[cfg(feature = "unipile")]
        "unipile" => Ok(SourceConnector::Unipile(Connector::new(Unipile, config)?)),
        #[cfg(feature = "x")]
        "x" => Ok(SourceConnector::X(Connector::new(X, config)?)),
        #[cfg(feature = "posthog")]
        "posthog" => Ok(SourceConnector::PostHog(Connector::new(PostHog, config)?)),
        #[cfg(feature = "rb2b")]
        "rb2b" => Ok(SourceConnector::Rb2b(Connector::new(Rb2b, config)?)),
        other => Err(ConnectorError::UnknownSource {
            source_type: other.to_string(),
            supported: available_sources().join(", "),
        }),
    }
}

macro_rules! dispatch {
    ($self:expr, $connector:pat => $body:expr) => {
        match $self {
            #[cfg(feature = "unipile")]
            SourceConnector::Unipile($connector) => $body,
            #[cfg(feature = "x")]
            SourceConnector::X($connector) => $body,
            #[cfg(feature = "posthog")]
            SourceConnector::PostHog($connector) => $body,
            #[cfg(feature = "rb2b")]
            SourceConnector::Rb2b($connector) => $body,
            #[cfg(not(any(
                feature = "unipile",
                feature = "x",
                feature = "posthog",
                feature = "rb2b"
            )))]
            SourceConnector::_None => unreachable!(),
        }
    };
}

impl SourceConnector {
    /// Attach a liveness channel; delivery is best-effort
    pub fn with_heartbeat(self, sender: mpsc::Sender<Heartbeat>) -> Self {
        match self {
            #[cfg(feature = "unipile")]
            SourceConnector::Unipile(c) => SourceConnector::Unipile(c.with_heartbeat(sender)),
            #[cfg(feature = "x")]
            SourceConnector::X(c) => SourceConnector::X(c.with_heartbeat(sender)),
            #[cfg(feature = "posthog")]
            SourceConnector::PostHog(c) => SourceConnector::PostHog(c.with_heartbeat(sender)),
            #[cfg(feature = "rb2b")]
            SourceConnector::Rb2b(c) => SourceConnector::Rb2b(c.with_heartbeat(sender)),
            #[cfg(not(any(
                feature = "unipile",
                feature = "x",
                feature = "posthog",
                feature = "rb2b"
            )))]
            SourceConnector::_None => unreachable!(),
        }
    }

    /// Source type string of the wrapped connector
    pub fn source_type(&self) -> &'static str {
        dispatch!(self, c => c.source_type())
    }

    /// Verify connectivity and return API metadata
    pub async fn connect(&mut self) -> ConnectionResult {
        dispatch!(self, c => c.connect().await)
    }

    /// Lightweight credential validation
    pub async fn test_connection(&mut self) -> ConnectionResult {
        dispatch!(self, c => c.test_connection().await)
    }

    /// Fetch records with auto-pagination
    pub async fn fetch_data(&mut self, request: &FetchRequest) -> FetchResult {
        dispatch!(self, c => c.fetch_data(request).await)
    }

    /// Discover field names and types from a sample
    pub async fn get_schema(&mut self, request: &FetchRequest) -> SourceSchema {
        dispatch!(self, c => c.get_schema(request).await)
    }

    /// Request attempts issued so far
    pub fn request_count(&self) -> u64 {
        dispatch!(self, c => c.request_count())
    }

    /// Release the underlying HTTP client; idempotent
    pub fn close(&mut self) {
        dispatch!(self, c => c.close())
    }
}
