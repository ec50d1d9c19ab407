//! Shared connector lifecycle
//!
//! `Connector<P>` wraps one [`Provider`] with everything cross-cutting:
//! credential resolution, lazy HTTP client construction, the pagination
//! loop, schema sampling, and the mapping from internal errors to
//! `success = false` result objects at the framework boundary.

use std::collections::BTreeMap;
use std::env;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use inlet_protocol::{
    ConnectionResult, FetchRequest, FetchResult, Record, SourceConfig, SourceSchema,
};

use crate::error::ConnectorError;
use crate::ratelimit::TokenBucket;
use crate::resilience::ResilienceConfig;
use crate::traits::{Probe, Provider};
use crate::transport::Transport;

/// Best-effort liveness signal emitted after each fetched page
///
/// Delivery uses `try_send` and ignores failure: a missing, closed, or full
/// channel never fails the surrounding fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat {
    /// Pages fetched so far in this operation
    pub pages_fetched: u32,
    /// Records accumulated so far
    pub record_count: usize,
}

/// Shared lifecycle wrapper around one [`Provider`]
///
/// Owns the per-instance token bucket and the lazily-built transport. One
/// instance serves exactly one logical operation (connect, one fetch, or one
/// schema sample) and is closed by the caller afterwards, success or failure.
#[derive(Debug)]
pub struct Connector<P: Provider> {
    provider: P,
    config: SourceConfig,
    limiter: TokenBucket,
    resilience: ResilienceConfig,
    transport: Option<Transport>,
    heartbeat: Option<mpsc::Sender<Heartbeat>>,
}

impl<P: Provider> Connector<P> {
    /// Create a connector for the given source configuration
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::Config` when the configured rate limit is not
    /// a positive number - a config bug, rejected at construction rather than
    /// surfaced as a failed result.
    pub fn new(provider: P, config: SourceConfig) -> Result<Self, ConnectorError> {
        let limiter = TokenBucket::new(config.rate_limit_per_second)?;
        Ok(Self {
            provider,
            config,
            limiter,
            resilience: ResilienceConfig::default(),
            transport: None,
            heartbeat: None,
        })
    }

    /// Attach a liveness channel; delivery is best-effort
    pub fn with_heartbeat(mut self, sender: mpsc::Sender<Heartbeat>) -> Self {
        self.heartbeat = Some(sender);
        self
    }

    /// Source type of the wrapped provider
    pub fn source_type(&self) -> &'static str {
        self.provider.source_type()
    }

    /// The configuration this connector was built from
    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// Request attempts issued so far (usage observability, not correctness)
    pub fn request_count(&self) -> u64 {
        self.transport.as_ref().map_or(0, Transport::request_count)
    }

    /// Verify connectivity and return API metadata
    pub async fn connect(&mut self) -> ConnectionResult {
        match self.try_connect().await {
            Ok(probe) => ConnectionResult {
                success: true,
                message: probe.message,
                source_id: self.config.source_id.clone(),
                source_type: self.config.source_type.clone(),
                data: probe.data,
            },
            Err(e) => {
                warn!(
                    source = %self.config.source_id,
                    source_type = %self.config.source_type,
                    error = %e,
                    "connection failed"
                );
                ConnectionResult {
                    success: false,
                    message: format!("Connection failed: {e}"),
                    source_id: self.config.source_id.clone(),
                    source_type: self.config.source_type.clone(),
                    data: None,
                }
            }
        }
    }

    /// Lightweight credential validation - same semantics as [`connect`],
    /// kept distinct for caller intent
    ///
    /// [`connect`]: Connector::connect
    pub async fn test_connection(&mut self) -> ConnectionResult {
        self.connect().await
    }

    /// Fetch records with auto-pagination
    ///
    /// Collects pages into memory up to `request.max_pages`. A failure
    /// mid-pagination returns the records gathered so far with
    /// `success = false`; errors never cross this boundary.
    pub async fn fetch_data(&mut self, request: &FetchRequest) -> FetchResult {
        let mut records = Vec::new();
        let mut has_more = false;

        match self.paginate(request, &mut records, &mut has_more).await {
            Ok(pages_fetched) => FetchResult {
                success: true,
                message: format!(
                    "Fetched {} records in {} pages",
                    records.len(),
                    pages_fetched
                ),
                source_id: request.source_id.clone(),
                record_count: records.len(),
                records,
                has_more,
            },
            Err(e) => {
                warn!(
                    source = %request.source_id,
                    resource = %request.resource_type,
                    error = %e,
                    "fetch failed"
                );
                FetchResult {
                    success: false,
                    message: format!("Fetch failed: {e}"),
                    source_id: request.source_id.clone(),
                    record_count: records.len(),
                    records,
                    has_more: false,
                }
            }
        }
    }

    /// Discover field names and coarse value types from a one-page sample
    ///
    /// An empty sample yields an empty field map with `success = true`.
    pub async fn get_schema(&mut self, request: &FetchRequest) -> SourceSchema {
        let mut sample = request.clone();
        sample.max_pages = 1;

        let mut records = Vec::new();
        let mut has_more = false;

        match self.paginate(&sample, &mut records, &mut has_more).await {
            Ok(_) => {
                let fields = records.first().map(infer_fields).unwrap_or_default();
                SourceSchema {
                    success: true,
                    message: format!("Discovered {} fields", fields.len()),
                    source_id: request.source_id.clone(),
                    fields,
                }
            }
            Err(e) => {
                warn!(
                    source = %request.source_id,
                    error = %e,
                    "schema discovery failed"
                );
                SourceSchema {
                    success: false,
                    message: format!("Schema discovery failed: {e}"),
                    source_id: request.source_id.clone(),
                    fields: BTreeMap::new(),
                }
            }
        }
    }

    /// Release the underlying HTTP client; idempotent
    pub fn close(&mut self) {
        self.transport = None;
    }

    async fn try_connect(&mut self) -> Result<Probe, ConnectorError> {
        self.ensure_transport()?;
        let transport = self.transport()?;
        self.provider.check_connection(transport, &self.config).await
    }

    /// Run the pagination state machine, appending into `records`
    ///
    /// Returns the number of pages fetched; `has_more` is set when the loop
    /// stopped at the page ceiling with a cursor still pending.
    async fn paginate(
        &mut self,
        request: &FetchRequest,
        records: &mut Vec<Record>,
        has_more: &mut bool,
    ) -> Result<u32, ConnectorError> {
        self.ensure_transport()?;
        let transport = self.transport()?;

        let mut cursor: Option<String> = None;
        let mut pages_fetched = 0u32;

        while pages_fetched < request.max_pages {
            let page = self
                .provider
                .fetch_page(transport, request, cursor.as_deref())
                .await?;
            records.extend(page.records);
            pages_fetched += 1;

            if let Some(sender) = &self.heartbeat {
                let _ = sender.try_send(Heartbeat {
                    pages_fetched,
                    record_count: records.len(),
                });
            }
            debug!(
                source = %request.source_id,
                page = pages_fetched,
                records = records.len(),
                "fetched page"
            );

            // Empty cursors mean exhaustion, same as absent ones
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => {
                    cursor = None;
                    break;
                }
            }
        }

        *has_more = cursor.is_some();
        Ok(pages_fetched)
    }

    /// Read the credential from the environment variable named in config
    ///
    /// The value is used only to build auth headers and is never logged.
    fn resolve_credential(&self) -> Result<String, ConnectorError> {
        let name = self
            .config
            .auth_env_var
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                ConnectorError::Config(format!(
                    "no auth_env_var configured for source '{}'",
                    self.config.source_id
                ))
            })?;
        match env::var(name) {
            Ok(value) if !value.is_empty() => Ok(value),
            _ => Err(ConnectorError::MissingCredential(name.to_string())),
        }
    }

    fn base_url(&self) -> &str {
        self.config
            .base_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| self.provider.default_base_url())
    }

    /// Build the transport on first use; credentials resolve exactly once
    fn ensure_transport(&mut self) -> Result<(), ConnectorError> {
        if self.transport.is_none() {
            let credential = self.resolve_credential()?;
            let headers = self.provider.auth_headers(&self.config, &credential)?;
            let transport = Transport::new(
                self.base_url(),
                headers,
                self.limiter.clone(),
                self.resilience.clone(),
            )?;
            self.transport = Some(transport);
        }
        Ok(())
    }

    fn transport(&self) -> Result<&Transport, ConnectorError> {
        self.transport
            .as_ref()
            .ok_or_else(|| ConnectorError::Init("transport not initialized".to_string()))
    }
}

/// Coarse JSON type name for a sampled value
fn value_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn infer_fields(record: &Record) -> BTreeMap<String, String> {
    record
        .iter()
        .map(|(key, value)| (key.clone(), value_type(value).to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use reqwest::header::HeaderMap;
    use serde_json::json;

    use inlet_protocol::{FetchRequest, SourceConfig};

    use super::*;
    use crate::traits::{record_from, Page};

    /// Provider that replays a scripted sequence of page results.
    struct Scripted {
        pages: Mutex<VecDeque<Result<Page, ConnectorError>>>,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(pages: Vec<Result<Page, ConnectorError>>) -> Self {
            Self {
                pages: Mutex::new(pages.into()),
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::Relaxed)
        }
    }

    impl Provider for Scripted {
        fn source_type(&self) -> &'static str {
            "scripted"
        }

        fn default_base_url(&self) -> &'static str {
            "https://scripted.invalid/api/"
        }

        fn auth_headers(
            &self,
            _config: &SourceConfig,
            _credential: &str,
        ) -> Result<HeaderMap, ConnectorError> {
            Ok(HeaderMap::new())
        }

        async fn check_connection(
            &self,
            _transport: &Transport,
            _config: &SourceConfig,
        ) -> Result<Probe, ConnectorError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(Probe::new("scripted connection ok").with_data(json!({"probe": true})))
        }

        async fn fetch_page(
            &self,
            _transport: &Transport,
            _request: &FetchRequest,
            _cursor: Option<&str>,
        ) -> Result<Page, ConnectorError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            self.pages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Page::default()))
        }
    }

    fn page(ids: &[&str], next: Option<&str>) -> Result<Page, ConnectorError> {
        Ok(Page {
            records: ids
                .iter()
                .map(|id| record_from(json!({"id": id, "likes": 1})))
                .collect(),
            next_cursor: next.map(str::to_string),
        })
    }

    fn config_with_env(env_var: &str) -> SourceConfig {
        SourceConfig {
            source_id: "test-scripted".into(),
            source_type: "scripted".into(),
            auth_env_var: Some(env_var.into()),
            rate_limit_per_second: 1000.0,
            ..Default::default()
        }
    }

    fn request() -> FetchRequest {
        FetchRequest {
            source_id: "test-scripted".into(),
            source_type: "scripted".into(),
            rate_limit_per_second: 1000.0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_fetch_concatenates_pages_in_order() {
        std::env::set_var("INLET_TEST_KEY_PAGES", "k");
        let provider = Scripted::new(vec![
            page(&["a", "b"], Some("c1")),
            page(&["c"], Some("c2")),
            page(&["d"], None),
        ]);
        let mut connector =
            Connector::new(provider, config_with_env("INLET_TEST_KEY_PAGES")).unwrap();

        let result = connector.fetch_data(&request()).await;
        assert!(result.success, "{}", result.message);
        assert_eq!(result.record_count, 4);
        assert!(!result.has_more);
        let ids: Vec<_> = result.records.iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec![json!("a"), json!("b"), json!("c"), json!("d")]);
        assert!(result.message.contains("4 records"));
        assert!(result.message.contains("3 pages"));
    }

    #[tokio::test]
    async fn test_fetch_respects_max_pages_ceiling() {
        std::env::set_var("INLET_TEST_KEY_CEILING", "k");
        let provider = Scripted::new(vec![
            page(&["a"], Some("c1")),
            page(&["b"], Some("c2")),
            page(&["c"], None),
        ]);
        let mut connector =
            Connector::new(provider, config_with_env("INLET_TEST_KEY_CEILING")).unwrap();

        let mut req = request();
        req.max_pages = 2;
        let result = connector.fetch_data(&req).await;
        assert!(result.success);
        assert_eq!(result.record_count, 2);
        assert!(result.has_more, "cursor was still pending at the ceiling");
    }

    #[tokio::test]
    async fn test_fetch_zero_max_pages_fetches_nothing() {
        std::env::set_var("INLET_TEST_KEY_ZERO", "k");
        let provider = Scripted::new(vec![page(&["a"], None)]);
        let mut connector =
            Connector::new(provider, config_with_env("INLET_TEST_KEY_ZERO")).unwrap();

        let mut req = request();
        req.max_pages = 0;
        let result = connector.fetch_data(&req).await;
        assert!(result.success);
        assert_eq!(result.record_count, 0);
        assert!(!result.has_more);
    }

    #[tokio::test]
    async fn test_fetch_preserves_partial_records_on_error() {
        std::env::set_var("INLET_TEST_KEY_PARTIAL", "k");
        let provider = Scripted::new(vec![
            page(&["a", "b"], Some("c1")),
            Err(ConnectorError::Config("page 2 exploded".into())),
        ]);
        let mut connector =
            Connector::new(provider, config_with_env("INLET_TEST_KEY_PARTIAL")).unwrap();

        let result = connector.fetch_data(&request()).await;
        assert!(!result.success);
        assert_eq!(result.record_count, 2);
        assert_eq!(result.records[0]["id"], "a");
        assert!(result.message.contains("page 2 exploded"));
        assert!(!result.has_more);
    }

    #[tokio::test]
    async fn test_connect_missing_env_var_names_it_and_skips_network() {
        let provider = Scripted::new(vec![]);
        let mut connector = Connector::new(
            provider,
            config_with_env("INLET_TEST_KEY_DEFINITELY_UNSET"),
        )
        .unwrap();

        let result = connector.connect().await;
        assert!(!result.success);
        assert!(result.message.contains("INLET_TEST_KEY_DEFINITELY_UNSET"));
        assert_eq!(connector.request_count(), 0);
        // The provider was never reached either
        assert_eq!(connector.provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_connect_no_env_var_configured() {
        let provider = Scripted::new(vec![]);
        let mut config = config_with_env("UNUSED");
        config.auth_env_var = None;
        let mut connector = Connector::new(provider, config).unwrap();

        let result = connector.connect().await;
        assert!(!result.success);
        assert!(result.message.contains("auth_env_var"));
    }

    #[tokio::test]
    async fn test_connect_success_carries_probe_data() {
        std::env::set_var("INLET_TEST_KEY_CONNECT", "k");
        let provider = Scripted::new(vec![]);
        let mut connector =
            Connector::new(provider, config_with_env("INLET_TEST_KEY_CONNECT")).unwrap();

        let result = connector.connect().await;
        assert!(result.success);
        assert_eq!(result.message, "scripted connection ok");
        assert_eq!(result.source_type, "scripted");
        assert_eq!(result.data.unwrap()["probe"], true);
    }

    #[tokio::test]
    async fn test_test_connection_matches_connect() {
        std::env::set_var("INLET_TEST_KEY_TESTCONN", "k");
        let provider = Scripted::new(vec![]);
        let mut connector =
            Connector::new(provider, config_with_env("INLET_TEST_KEY_TESTCONN")).unwrap();

        let result = connector.test_connection().await;
        assert!(result.success);
        assert_eq!(result.message, "scripted connection ok");
    }

    #[tokio::test]
    async fn test_schema_infers_coarse_types() {
        std::env::set_var("INLET_TEST_KEY_SCHEMA", "k");
        let provider = Scripted::new(vec![Ok(Page {
            records: vec![record_from(json!({
                "id": "post-1",
                "likes": 42,
                "score": 0.5,
                "read": false,
                "tags": [],
                "meta": {},
                "gone": null
            }))],
            next_cursor: Some("ignored".into()),
        })]);
        let mut connector =
            Connector::new(provider, config_with_env("INLET_TEST_KEY_SCHEMA")).unwrap();

        let schema = connector.get_schema(&request()).await;
        assert!(schema.success);
        assert_eq!(schema.fields["id"], "string");
        assert_eq!(schema.fields["likes"], "integer");
        assert_eq!(schema.fields["score"], "float");
        assert_eq!(schema.fields["read"], "boolean");
        assert_eq!(schema.fields["tags"], "array");
        assert_eq!(schema.fields["meta"], "object");
        assert_eq!(schema.fields["gone"], "null");
        // One page only, even though a cursor was offered
        assert_eq!(connector.provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_schema_empty_sample_is_success() {
        std::env::set_var("INLET_TEST_KEY_SCHEMA_EMPTY", "k");
        let provider = Scripted::new(vec![page(&[], None)]);
        let mut connector =
            Connector::new(provider, config_with_env("INLET_TEST_KEY_SCHEMA_EMPTY")).unwrap();

        let schema = connector.get_schema(&request()).await;
        assert!(schema.success);
        assert!(schema.fields.is_empty());
        assert!(schema.message.contains("0 fields"));
    }

    #[tokio::test]
    async fn test_heartbeat_emitted_per_page() {
        std::env::set_var("INLET_TEST_KEY_HEARTBEAT", "k");
        let provider = Scripted::new(vec![
            page(&["a"], Some("c1")),
            page(&["b", "c"], None),
        ]);
        let (tx, mut rx) = mpsc::channel(8);
        let mut connector = Connector::new(provider, config_with_env("INLET_TEST_KEY_HEARTBEAT"))
            .unwrap()
            .with_heartbeat(tx);

        let result = connector.fetch_data(&request()).await;
        assert!(result.success);

        assert_eq!(
            rx.try_recv().unwrap(),
            Heartbeat {
                pages_fetched: 1,
                record_count: 1
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            Heartbeat {
                pages_fetched: 2,
                record_count: 3
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_heartbeat_failure_is_swallowed() {
        std::env::set_var("INLET_TEST_KEY_HEARTBEAT_DROP", "k");
        let provider = Scripted::new(vec![page(&["a"], None)]);
        let (tx, rx) = mpsc::channel(1);
        drop(rx); // receiver gone - delivery must fail silently
        let mut connector =
            Connector::new(provider, config_with_env("INLET_TEST_KEY_HEARTBEAT_DROP"))
                .unwrap()
                .with_heartbeat(tx);

        let result = connector.fetch_data(&request()).await;
        assert!(result.success);
        assert_eq!(result.record_count, 1);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        std::env::set_var("INLET_TEST_KEY_CLOSE", "k");
        let provider = Scripted::new(vec![]);
        let mut connector =
            Connector::new(provider, config_with_env("INLET_TEST_KEY_CLOSE")).unwrap();

        let _ = connector.connect().await;
        connector.close();
        connector.close();
        assert_eq!(connector.request_count(), 0);
    }

    #[test]
    fn test_invalid_rate_rejected_at_construction() {
        let provider = Scripted::new(vec![]);
        let mut config = config_with_env("UNUSED");
        config.rate_limit_per_second = 0.0;
        assert!(matches!(
            Connector::new(provider, config),
            Err(ConnectorError::Config(_))
        ));
    }
}
