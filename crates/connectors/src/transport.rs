//! Rate-limited, retrying HTTP transport shared by all adapters
//!
//! One `Transport` is owned by one connector instance. Auth headers and the
//! request timeout are baked into the client at construction; every request
//! passes through the token bucket and the bounded retry loop before it
//! reaches the wire.

use std::sync::atomic::{AtomicU64, Ordering};

use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::ConnectorError;
use crate::ratelimit::TokenBucket;
use crate::resilience::{self, ResilienceConfig};

/// HTTP transport for one connector instance
#[derive(Debug)]
pub struct Transport {
    http: reqwest::Client,
    base_url: Url,
    limiter: TokenBucket,
    resilience: ResilienceConfig,
    requests: AtomicU64,
}

impl Transport {
    /// Build the transport with auth headers and timeout baked in
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::Init` when the HTTP client cannot be built or
    /// the base URL does not parse.
    pub fn new(
        base_url: &str,
        headers: HeaderMap,
        limiter: TokenBucket,
        resilience: ResilienceConfig,
    ) -> Result<Self, ConnectorError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("inlet/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(resilience.timeout())
            .build()
            .map_err(|e| ConnectorError::Init(format!("HTTP client: {e}")))?;
        let base_url = Url::parse(base_url)
            .map_err(|e| ConnectorError::Init(format!("base URL '{base_url}': {e}")))?;
        Ok(Self {
            http,
            base_url,
            limiter,
            resilience,
            requests: AtomicU64::new(0),
        })
    }

    /// Total request attempts issued through this transport
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// GET a JSON document from a path (or an absolute URL)
    pub async fn get_json(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Value, ConnectorError> {
        self.request_json(Method::GET, path, query, None).await
    }

    /// POST a JSON body, returning the JSON response
    pub async fn post_json(&self, path: &str, body: &Value) -> Result<Value, ConnectorError> {
        self.request_json(Method::POST, path, &[], Some(body)).await
    }

    /// Resolve a path against the base URL
    ///
    /// Absolute `http(s)` URLs - provider-returned "next" links - pass through
    /// verbatim instead of being rebuilt.
    fn endpoint(&self, path: &str) -> Result<Url, ConnectorError> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Url::parse(path)
                .map_err(|e| ConnectorError::Init(format!("request URL '{path}': {e}")));
        }
        self.base_url
            .join(path)
            .map_err(|e| ConnectorError::Init(format!("request path '{path}': {e}")))
    }

    /// Execute one logical request with rate limiting and bounded retry
    ///
    /// Each attempt acquires a token and bumps the request counter. Transient
    /// transport errors retry with exponential backoff; everything else
    /// propagates on the first attempt.
    async fn request_json(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value, ConnectorError> {
        let url = self.endpoint(path)?;
        let mut last_error = String::new();

        for attempt in 0..self.resilience.max_attempts {
            if attempt > 0 {
                let delay = self.resilience.backoff_delay(attempt - 1);
                debug!(
                    url = %url,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "retrying after transient failure"
                );
                tokio::time::sleep(delay).await;
            }

            self.limiter.acquire().await;
            self.requests.fetch_add(1, Ordering::Relaxed);

            let mut request = self.http.request(method.clone(), url.clone());
            if !query.is_empty() {
                request = request.query(query);
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if !status.is_success() {
                        return Err(status_error(status, url.path()));
                    }
                    return Ok(response.json().await?);
                }
                Err(e) if resilience::is_transient(&e) => {
                    last_error = e.to_string();
                }
                Err(e) => return Err(ConnectorError::Http(e)),
            }
        }

        Err(ConnectorError::RetriesExhausted {
            attempts: self.resilience.max_attempts,
            last_error,
        })
    }
}

/// Map a non-2xx response to a typed error
fn status_error(status: StatusCode, context: &str) -> ConnectorError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ConnectorError::AuthFailed(format!("{status} from {context}"))
        }
        StatusCode::NOT_FOUND => ConnectorError::NotFound(context.to_string()),
        StatusCode::TOO_MANY_REQUESTS => ConnectorError::RateLimited {
            retry_after_secs: 60,
        },
        _ => ConnectorError::Status {
            status: status.as_u16(),
            context: context.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn transport_for(uri: &str) -> Transport {
        Transport::new(
            uri,
            HeaderMap::new(),
            TokenBucket::new(1000.0).unwrap(),
            ResilienceConfig::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_get_json_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/items"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"count": 3})))
            .mount(&server)
            .await;

        let transport = transport_for(&server.uri());
        let value = transport.get_json("/items", &[]).await.unwrap();
        assert_eq!(value["count"], 3);
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_post_json_sends_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/enrich"))
            .and(wiremock::matchers::body_json(json!({"email": "a@b.com"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {}})))
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport_for(&server.uri());
        transport
            .post_json("/enrich", &json!({"email": "a@b.com"}))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_status_404_maps_to_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let transport = transport_for(&server.uri());
        let err = transport.get_json("/missing", &[]).await.unwrap_err();
        assert!(matches!(err, ConnectorError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_status_401_maps_to_auth_failed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let transport = transport_for(&server.uri());
        let err = transport.get_json("/secure", &[]).await.unwrap_err();
        assert!(matches!(err, ConnectorError::AuthFailed(_)));
    }

    #[tokio::test]
    async fn test_status_429_maps_to_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let transport = transport_for(&server.uri());
        let err = transport.get_json("/busy", &[]).await.unwrap_err();
        assert!(matches!(err, ConnectorError::RateLimited { .. }));
    }

    #[tokio::test]
    async fn test_server_error_is_not_retried() {
        // 5xx is delegated to the caller's invocation-level retry; the
        // transport must issue exactly one attempt.
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport_for(&server.uri());
        let err = transport.get_json("/flaky", &[]).await.unwrap_err();
        assert!(matches!(err, ConnectorError::Status { status: 500, .. }));
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_failure_exhausts_attempts() {
        // Nothing listens on this port; every attempt fails to connect.
        let transport = transport_for("http://127.0.0.1:9");
        let err = transport.get_json("/anything", &[]).await.unwrap_err();

        match err {
            ConnectorError::RetriesExhausted {
                attempts,
                last_error,
            } => {
                assert_eq!(attempts, 3);
                assert!(!last_error.is_empty());
            }
            other => panic!("expected RetriesExhausted, got {other}"),
        }
        assert_eq!(transport.request_count(), 3);
    }

    #[tokio::test]
    async fn test_absolute_url_bypasses_base() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/absolute/next"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;

        // Base URL points somewhere unrelated; the absolute URL must win.
        let transport = transport_for("https://unrelated.example.com/api/");
        let url = format!("{}/absolute/next", server.uri());
        let value = transport.get_json(&url, &[]).await.unwrap();
        assert_eq!(value["ok"], true);
    }

    #[tokio::test]
    async fn test_query_params_are_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(wiremock::matchers::query_param("limit", "100"))
            .and(wiremock::matchers::query_param("cursor", "abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport_for(&server.uri());
        transport
            .get_json(
                "/search",
                &[("limit", "100".to_string()), ("cursor", "abc".to_string())],
            )
            .await
            .unwrap();
    }
}
