//! PostHog connector - product analytics events and person profiles
//!
//! Fetches events and person profiles from a project-scoped API. The API
//! returns a full `next` URL for the following page; when present it is
//! called verbatim instead of rebuilding query params, otherwise the cursor
//! is treated as an offset.
//!
//! Auth: personal API key as a bearer token.
//! Base URL: https://us.posthog.com/api/

use reqwest::header::{HeaderMap, AUTHORIZATION};
use serde::Deserialize;
use serde_json::{json, Value};

use inlet_protocol::{FetchRequest, Record, SourceConfig};

use crate::error::ConnectorError;
use crate::traits::{credential_header, record_from, Page, Probe, Provider};
use crate::transport::Transport;

const PAGE_SIZE: u32 = 100;

/// Adapter-specific settings parsed from `config_json`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Settings {
    project_id: String,
}

fn settings(config_json: Option<&str>) -> Result<Settings, ConnectorError> {
    match config_json {
        Some(raw) if !raw.is_empty() => serde_json::from_str(raw)
            .map_err(|e| ConnectorError::Config(format!("invalid posthog config_json: {e}"))),
        _ => Ok(Settings::default()),
    }
}

/// Project-scoped URL prefix, or an error naming the missing key
fn project_prefix(config_json: Option<&str>) -> Result<String, ConnectorError> {
    let settings = settings(config_json)?;
    if settings.project_id.is_empty() {
        return Err(ConnectorError::Config(
            "posthog connector requires 'project_id' in config_json".to_string(),
        ));
    }
    Ok(format!("projects/{}/", settings.project_id))
}

/// Connector for the PostHog analytics API
#[derive(Debug)]
pub struct PostHog;

impl Provider for PostHog {
    fn source_type(&self) -> &'static str {
        "posthog"
    }

    fn default_base_url(&self) -> &'static str {
        "https://us.posthog.com/api/"
    }

    fn auth_headers(
        &self,
        _config: &SourceConfig,
        credential: &str,
    ) -> Result<HeaderMap, ConnectorError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            credential_header(&format!("Bearer {credential}"))?,
        );
        Ok(headers)
    }

    async fn check_connection(
        &self,
        transport: &Transport,
        config: &SourceConfig,
    ) -> Result<Probe, ConnectorError> {
        let prefix = project_prefix(config.config_json.as_deref())?;
        let data = transport.get_json(prefix.trim_end_matches('/'), &[]).await?;
        let project_name = data
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        Ok(
            Probe::new(format!("Connected to PostHog project '{project_name}'"))
                .with_data(json!({ "project_name": project_name })),
        )
    }

    async fn fetch_page(
        &self,
        transport: &Transport,
        request: &FetchRequest,
        cursor: Option<&str>,
    ) -> Result<Page, ConnectorError> {
        let prefix = project_prefix(request.config_json.as_deref())?;
        match request.resource_type.as_str() {
            "persons" => fetch_persons_page(transport, &prefix, cursor).await,
            _ => fetch_events_page(transport, request, &prefix, cursor).await,
        }
    }
}

/// Fetch one page of events
async fn fetch_events_page(
    transport: &Transport,
    request: &FetchRequest,
    prefix: &str,
    cursor: Option<&str>,
) -> Result<Page, ConnectorError> {
    let data = match cursor {
        // A full next URL from the API is called verbatim
        Some(next) if next.starts_with("http") => transport.get_json(next, &[]).await?,
        _ => {
            let mut query: Vec<(&str, String)> = vec![("limit", PAGE_SIZE.to_string())];
            if let Some(since) = request.since {
                query.push(("after", since.to_rfc3339()));
            }
            if let Some(offset) = cursor {
                query.push(("offset", offset.to_string()));
            }
            transport.get_json(&format!("{prefix}events/"), &query).await?
        }
    };

    let response: ResultsResponse = serde_json::from_value(data)?;
    Ok(Page {
        records: response.results.iter().map(normalize_event).collect(),
        next_cursor: response.next,
    })
}

/// Fetch one page of person profiles
async fn fetch_persons_page(
    transport: &Transport,
    prefix: &str,
    cursor: Option<&str>,
) -> Result<Page, ConnectorError> {
    let data = match cursor {
        Some(next) if next.starts_with("http") => transport.get_json(next, &[]).await?,
        _ => {
            let mut query: Vec<(&str, String)> = vec![("limit", PAGE_SIZE.to_string())];
            if let Some(offset) = cursor {
                query.push(("offset", offset.to_string()));
            }
            transport
                .get_json(&format!("{prefix}persons/"), &query)
                .await?
        }
    };

    let response: ResultsResponse = serde_json::from_value(data)?;
    Ok(Page {
        records: response.results.iter().map(normalize_person).collect(),
        next_cursor: response.next,
    })
}

// --- API Response Types ---

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ResultsResponse {
    results: Vec<Value>,
    next: Option<String>,
}

// --- Normalization ---

/// Normalize a PostHog event to the stable record shape
fn normalize_event(item: &Value) -> Record {
    record_from(json!({
        "id": item.get("id").and_then(Value::as_str).unwrap_or_default(),
        "event": item.get("event").and_then(Value::as_str).unwrap_or_default(),
        "distinct_id": item.get("distinct_id").and_then(Value::as_str).unwrap_or_default(),
        "timestamp": item.get("timestamp").cloned().unwrap_or(Value::Null),
        "properties": item.get("properties").cloned().unwrap_or_else(|| json!({})),
        "elements": item.get("elements").cloned().unwrap_or_else(|| json!([])),
    }))
}

/// Normalize a PostHog person to the stable record shape
///
/// Person ids arrive as numbers or strings depending on endpoint version;
/// both stringify.
fn normalize_person(item: &Value) -> Record {
    record_from(json!({
        "id": stringify_id(item.get("id")),
        "distinct_ids": item.get("distinct_ids").cloned().unwrap_or_else(|| json!([])),
        "properties": item.get("properties").cloned().unwrap_or_else(|| json!({})),
        "created_at": item.get("created_at").cloned().unwrap_or(Value::Null),
        "is_identified": item.get("is_identified").and_then(Value::as_bool).unwrap_or(false),
    }))
}

fn stringify_id(id: Option<&Value>) -> String {
    match id {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}
