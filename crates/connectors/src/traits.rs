//! Provider trait definition
//!
//! A provider contributes only its customization points: base URL, auth
//! header construction, a connectivity probe, and a single-page fetch.
//! Everything cross-cutting - credential resolution, client lifecycle, rate
//! limiting, retries, pagination, schema sampling - lives in
//! [`crate::connector::Connector`]. A new data source is a new `Provider`
//! impl plus one factory entry.

use std::future::Future;

use reqwest::header::HeaderMap;
use serde_json::Value;

use inlet_protocol::{FetchRequest, Record, SourceConfig};

use crate::error::ConnectorError;
use crate::transport::Transport;

/// One page of provider data plus the cursor for the next one
#[derive(Debug, Default)]
pub struct Page {
    /// Normalized records from this page, in provider order
    pub records: Vec<Record>,
    /// Opaque cursor for the next page; `None` means exhausted
    pub next_cursor: Option<String>,
}

/// Outcome of a successful connection probe
#[derive(Debug)]
pub struct Probe {
    /// Human-readable success message
    pub message: String,
    /// Provider metadata surfaced to the caller (account counts, balances)
    pub data: Option<Value>,
}

impl Probe {
    /// Probe result with a message and no metadata
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: None,
        }
    }

    /// Attach provider metadata to the probe result
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Trait for provider adapters behind the shared connector lifecycle
pub trait Provider: Send + Sync {
    /// Source type string this provider answers to (e.g. "posthog")
    fn source_type(&self) -> &'static str;

    /// Default API base URL, used unless the config overrides it
    fn default_base_url(&self) -> &'static str;

    /// Build authentication headers from the resolved credential
    fn auth_headers(
        &self,
        config: &SourceConfig,
        credential: &str,
    ) -> Result<HeaderMap, ConnectorError>;

    /// Cheap, side-effect-free call that validates credentials
    fn check_connection(
        &self,
        transport: &Transport,
        config: &SourceConfig,
    ) -> impl Future<Output = Result<Probe, ConnectorError>> + Send;

    /// Fetch one page of records; `cursor` is `None` for the first page
    fn fetch_page(
        &self,
        transport: &Transport,
        request: &FetchRequest,
        cursor: Option<&str>,
    ) -> impl Future<Output = Result<Page, ConnectorError>> + Send;
}

/// Convert a JSON object literal into a [`Record`]
///
/// Only meaningful for `json!({...})` object literals; non-objects collapse
/// to an empty record.
pub(crate) fn record_from(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

/// Build a header value from a credential, rejecting non-ASCII input
/// without echoing the credential into the error.
pub(crate) fn credential_header(
    value: &str,
) -> Result<reqwest::header::HeaderValue, ConnectorError> {
    reqwest::header::HeaderValue::from_str(value).map_err(|_| {
        ConnectorError::Config("credential contains characters invalid in a header".to_string())
    })
}
