//! Source configuration and fetch request types
//!
//! Both types are created by the caller per operation and are read-only once
//! constructed. `FetchRequest` duplicates the connection fields of
//! `SourceConfig` because the two cross different boundaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default sustained request rate per connector instance (requests/second)
pub const DEFAULT_RATE_LIMIT_PER_SECOND: f64 = 5.0;

/// Default pagination ceiling for a single fetch
pub const DEFAULT_MAX_PAGES: u32 = 100;

fn default_rate_limit() -> f64 {
    DEFAULT_RATE_LIMIT_PER_SECOND
}

fn default_max_pages() -> u32 {
    DEFAULT_MAX_PAGES
}

fn default_resource_type() -> String {
    "posts".to_string()
}

/// Describes how to connect to an external data source
///
/// `auth_env_var` names an environment variable holding the API credential;
/// the credential itself never crosses this boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Caller-assigned identifier for this source
    pub source_id: String,
    /// Adapter selector (e.g. "unipile", "x", "posthog", "rb2b")
    pub source_type: String,
    /// Override for the adapter's default API base URL
    #[serde(default)]
    pub base_url: Option<String>,
    /// Name of the environment variable holding the API credential
    #[serde(default)]
    pub auth_env_var: Option<String>,
    /// Opaque adapter-specific configuration blob (a JSON object)
    #[serde(default)]
    pub config_json: Option<String>,
    /// Sustained outbound request rate in requests/second
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_second: f64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            source_id: String::new(),
            source_type: String::new(),
            base_url: None,
            auth_env_var: None,
            config_json: None,
            rate_limit_per_second: DEFAULT_RATE_LIMIT_PER_SECOND,
        }
    }
}

/// Parameters for a fetch or schema-discovery operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchRequest {
    /// Caller-assigned identifier for this source
    pub source_id: String,
    /// Adapter selector (e.g. "unipile", "x", "posthog", "rb2b")
    pub source_type: String,
    /// Sub-resource to fetch (adapter-interpreted, e.g. "posts", "emails")
    #[serde(default = "default_resource_type")]
    pub resource_type: String,
    /// Optional lower-bound timestamp filter, adapter-interpreted
    #[serde(default)]
    pub since: Option<DateTime<Utc>>,
    /// Hard ceiling on page fetches for one invocation
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    /// Name of the environment variable holding the API credential
    #[serde(default)]
    pub auth_env_var: Option<String>,
    /// Override for the adapter's default API base URL
    #[serde(default)]
    pub base_url: Option<String>,
    /// Opaque adapter-specific configuration blob (a JSON object)
    #[serde(default)]
    pub config_json: Option<String>,
    /// Sustained outbound request rate in requests/second
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_second: f64,
}

impl FetchRequest {
    /// Project the connection-relevant fields into a `SourceConfig`
    pub fn source_config(&self) -> SourceConfig {
        SourceConfig {
            source_id: self.source_id.clone(),
            source_type: self.source_type.clone(),
            base_url: self.base_url.clone(),
            auth_env_var: self.auth_env_var.clone(),
            config_json: self.config_json.clone(),
            rate_limit_per_second: self.rate_limit_per_second,
        }
    }
}

impl Default for FetchRequest {
    fn default() -> Self {
        Self {
            source_id: String::new(),
            source_type: String::new(),
            resource_type: default_resource_type(),
            since: None,
            max_pages: DEFAULT_MAX_PAGES,
            auth_env_var: None,
            base_url: None,
            config_json: None,
            rate_limit_per_second: DEFAULT_RATE_LIMIT_PER_SECOND,
        }
    }
}
