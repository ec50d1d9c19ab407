//! Inlet - Connectors
//!
//! Pull-based connectors that fetch records from heterogeneous external data
//! providers and normalize them into a single shape for downstream storage.
//!
//! # Available Connectors
//!
//! - **Unipile** - unified social/email API (LinkedIn/Instagram posts, Gmail)
//! - **X** - microblogging API v2 (owned-account posts + public metrics)
//! - **PostHog** - product analytics (events, person profiles)
//! - **RB2B** - B2B identity enrichment (API calls + local file dumps)
//!
//! # Design Principles
//!
//! - **Results, not exceptions**: expected failures (missing credential,
//!   unreachable provider, bad config) come back as `success = false` result
//!   objects. Only contract bugs - unknown source type, invalid rate limit -
//!   surface as errors, at construction time.
//! - **Shared lifecycle**: rate limiting, bounded retry, pagination, and
//!   schema sampling live in [`Connector`]; each provider contributes only
//!   its customization points via the [`Provider`] trait.
//! - **One instance, one operation**: a connector is built by the factory,
//!   used for one connect/fetch/schema call, and closed by the caller.
//!
//! # Feature Flags
//!
//! Connectors can be selectively compiled using feature flags:
//!
//! ```toml
//! [dependencies]
//! inlet-connectors = { version = "0.1", default-features = false, features = ["posthog"] }
//! ```
//!
//! Available features: `unipile`, `x`, `posthog`, `rb2b` (all default).
//!
//! # Example
//!
//! ```ignore
//! use inlet_connectors::ops;
//! use inlet_protocol::FetchRequest;
//!
//! let request = FetchRequest {
//!     source_id: "analytics-main".into(),
//!     source_type: "posthog".into(),
//!     resource_type: "events".into(),
//!     auth_env_var: Some("POSTHOG_API_KEY".into()),
//!     config_json: Some(r#"{"project_id": "12345"}"#.into()),
//!     ..Default::default()
//! };
//!
//! let result = ops::fetch_source_data(request, None).await?;
//! if result.success {
//!     println!("{} records", result.record_count);
//! }
//! ```

pub mod connector;
mod error;
pub mod factory;
pub mod ops;
pub mod ratelimit;
pub mod resilience;
pub mod transport;
mod traits;

// Conditionally compiled connectors
#[cfg(feature = "posthog")]
mod posthog;
#[cfg(feature = "rb2b")]
mod rb2b;
#[cfg(feature = "unipile")]
mod unipile;
#[cfg(feature = "x")]
mod x;

// Re-exports
pub use connector::{Connector, Heartbeat};
pub use error::ConnectorError;
pub use factory::{available_sources, SourceConnector};
pub use ratelimit::TokenBucket;
pub use traits::{Page, Probe, Provider};

#[cfg(feature = "posthog")]
pub use posthog::PostHog;
#[cfg(feature = "rb2b")]
pub use rb2b::Rb2b;
#[cfg(feature = "unipile")]
pub use unipile::Unipile;
#[cfg(feature = "x")]
pub use x::X;
