//! Unipile connector - unified API for LinkedIn, Instagram, and Gmail
//!
//! One API proxies several social/email platforms. We pull:
//!   - LinkedIn/Instagram posts with raw engagement counts
//!   - Gmail messages for outreach tracking
//!
//! Auth and pagination depend on the API contract version, selected
//! explicitly by the `contract` key in `config_json` (default `v2`):
//!   - `v1` (legacy): `Authorization: Bearer` header; cursor nested under
//!     `pagination.cursor`, gated by `pagination.has_more`; email addresses
//!     as `{address}` objects
//!   - `v2`: `X-API-KEY` header; opaque top-level `cursor` field (absent or
//!     null means exhausted); email parties as attendee objects flattened to
//!     display names; `is_read` derived from the presence of `read_date`
//!
//! Base URL: https://api1.unipile.com:13337/api/v1/

use reqwest::header::{HeaderMap, AUTHORIZATION};
use serde::Deserialize;
use serde_json::{json, Value};

use inlet_protocol::{FetchRequest, Record, SourceConfig};

use crate::error::ConnectorError;
use crate::traits::{credential_header, record_from, Page, Probe, Provider};
use crate::transport::Transport;

const PAGE_SIZE: u32 = 100;

/// Unipile API contract version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiContract {
    /// Legacy contract: bearer auth, pagination envelope
    V1,
    /// Current contract: API-key auth, top-level cursor
    #[default]
    V2,
}

/// Adapter-specific settings parsed from `config_json`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Settings {
    account_id: String,
    contract: ApiContract,
}

fn settings(config_json: Option<&str>) -> Result<Settings, ConnectorError> {
    match config_json {
        Some(raw) if !raw.is_empty() => serde_json::from_str(raw)
            .map_err(|e| ConnectorError::Config(format!("invalid unipile config_json: {e}"))),
        _ => Ok(Settings::default()),
    }
}

/// Connector for the Unipile unified social/email API
#[derive(Debug)]
pub struct Unipile;

impl Provider for Unipile {
    fn source_type(&self) -> &'static str {
        "unipile"
    }

    fn default_base_url(&self) -> &'static str {
        "https://api1.unipile.com:13337/api/v1/"
    }

    fn auth_headers(
        &self,
        config: &SourceConfig,
        credential: &str,
    ) -> Result<HeaderMap, ConnectorError> {
        let contract = settings(config.config_json.as_deref())?.contract;
        let mut headers = HeaderMap::new();
        match contract {
            ApiContract::V1 => {
                headers.insert(
                    AUTHORIZATION,
                    credential_header(&format!("Bearer {credential}"))?,
                );
            }
            ApiContract::V2 => {
                headers.insert("x-api-key", credential_header(credential)?);
            }
        }
        Ok(headers)
    }

    async fn check_connection(
        &self,
        transport: &Transport,
        _config: &SourceConfig,
    ) -> Result<Probe, ConnectorError> {
        let data = transport.get_json("accounts", &[]).await?;
        let account_count = data
            .get("items")
            .and_then(Value::as_array)
            .map(Vec::len)
            .or_else(|| data.as_array().map(Vec::len))
            .unwrap_or(0);
        Ok(
            Probe::new(format!(
                "Connected to Unipile, {account_count} accounts available"
            ))
            .with_data(json!({ "account_count": account_count })),
        )
    }

    async fn fetch_page(
        &self,
        transport: &Transport,
        request: &FetchRequest,
        cursor: Option<&str>,
    ) -> Result<Page, ConnectorError> {
        let settings = settings(request.config_json.as_deref())?;
        match request.resource_type.as_str() {
            "emails" => fetch_emails_page(transport, request, cursor, &settings).await,
            _ => fetch_posts_page(transport, request, cursor, &settings).await,
        }
    }
}

/// Fetch one page of LinkedIn or Instagram posts
async fn fetch_posts_page(
    transport: &Transport,
    request: &FetchRequest,
    cursor: Option<&str>,
    settings: &Settings,
) -> Result<Page, ConnectorError> {
    let mut query: Vec<(&str, String)> = vec![("limit", PAGE_SIZE.to_string())];
    if let Some(cursor) = cursor {
        query.push(("cursor", cursor.to_string()));
    }
    if let Some(since) = request.since {
        query.push(("after", since.to_rfc3339()));
    }

    let path = if settings.account_id.is_empty() {
        "posts".to_string()
    } else {
        format!("users/{}/posts", settings.account_id)
    };
    let data = transport.get_json(&path, &query).await?;
    let envelope: Envelope<PostItem> = serde_json::from_value(data)?;
    let next_cursor = envelope.next_cursor(settings.contract);

    Ok(Page {
        records: envelope.items.into_iter().map(normalize_post).collect(),
        next_cursor,
    })
}

/// Fetch one page of Gmail emails
async fn fetch_emails_page(
    transport: &Transport,
    request: &FetchRequest,
    cursor: Option<&str>,
    settings: &Settings,
) -> Result<Page, ConnectorError> {
    let mut query: Vec<(&str, String)> = vec![("limit", PAGE_SIZE.to_string())];
    if let Some(cursor) = cursor {
        query.push(("cursor", cursor.to_string()));
    }
    if let Some(since) = request.since {
        query.push(("after", since.to_rfc3339()));
    }
    if !settings.account_id.is_empty() {
        query.push(("account_id", settings.account_id.clone()));
    }

    let data = transport.get_json("emails", &query).await?;
    let envelope: Envelope<EmailItem> = serde_json::from_value(data)?;
    let contract = settings.contract;
    let next_cursor = envelope.next_cursor(contract);

    Ok(Page {
        records: envelope
            .items
            .into_iter()
            .map(|item| normalize_email(item, contract))
            .collect(),
        next_cursor,
    })
}

// --- API Response Types ---

/// Paged response envelope, covering both contract versions
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    items: Vec<T>,
    /// v2: opaque cursor at the top level
    #[serde(default)]
    cursor: Option<String>,
    /// v1: nested pagination object
    #[serde(default)]
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    #[serde(default)]
    cursor: Option<String>,
    #[serde(default)]
    has_more: bool,
}

impl<T> Envelope<T> {
    /// Extract the next-page cursor for the configured contract
    fn next_cursor(&self, contract: ApiContract) -> Option<String> {
        match contract {
            ApiContract::V1 => {
                let pagination = self.pagination.as_ref()?;
                if !pagination.has_more {
                    return None;
                }
                pagination.cursor.clone()
            }
            ApiContract::V2 => self.cursor.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PostItem {
    id: String,
    provider: String,
    account_id: String,
    text: String,
    created_at: Option<String>,
    url: String,
    likes: i64,
    comments: i64,
    shares: i64,
    impressions: i64,
    reach: i64,
    attachments: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EmailItem {
    id: String,
    account_id: String,
    subject: String,
    date: Option<String>,
    folder: String,
    attachments: Vec<Value>,
    // v1 shape: address objects (or bare strings) and a body object
    from: Value,
    to: Vec<Value>,
    cc: Vec<Value>,
    body: Value,
    is_read: Option<bool>,
    // v2 shape: attendee objects, split body fields, read timestamp
    from_attendee: Option<Attendee>,
    to_attendees: Vec<Attendee>,
    cc_attendees: Vec<Attendee>,
    body_plain: String,
    read_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Attendee {
    display_name: String,
    identifier: String,
}

// --- Normalization ---

/// Normalize a Unipile post to the stable record shape
fn normalize_post(item: PostItem) -> Record {
    record_from(json!({
        "id": item.id,
        "provider": item.provider,
        "account_id": item.account_id,
        "text": item.text,
        "created_at": item.created_at,
        "url": item.url,
        "likes": item.likes,
        "comments": item.comments,
        "shares": item.shares,
        "impressions": item.impressions,
        "reach": item.reach,
        "attachments": item.attachments,
    }))
}

/// Normalize a Unipile email to the stable record shape
///
/// Key names are identical across contracts; only the source fields differ.
fn normalize_email(item: EmailItem, contract: ApiContract) -> Record {
    let (sender, recipients, cc, body_plain, body_html, is_read) = match contract {
        ApiContract::V1 => (
            address_of(&item.from),
            item.to.iter().map(address_of).collect::<Vec<_>>(),
            item.cc.iter().map(address_of).collect::<Vec<_>>(),
            text_at(&item.body, "plain"),
            text_at(&item.body, "html"),
            item.is_read.unwrap_or(false),
        ),
        ApiContract::V2 => (
            item.from_attendee.map(display_name).unwrap_or_default(),
            item.to_attendees.into_iter().map(display_name).collect(),
            item.cc_attendees.into_iter().map(display_name).collect(),
            item.body_plain,
            item.body.as_str().unwrap_or_default().to_string(),
            item.read_date.is_some(),
        ),
    };

    record_from(json!({
        "id": item.id,
        "account_id": item.account_id,
        "subject": item.subject,
        "sender": sender,
        "recipients": recipients,
        "cc": cc,
        "date": item.date,
        "body_plain": body_plain,
        "body_html": body_html,
        "is_read": is_read,
        "folder": item.folder,
        "attachments": item.attachments,
    }))
}

/// Pull an email address out of a v1 party value (`{address}` or bare string)
fn address_of(value: &Value) -> String {
    match value {
        Value::Object(map) => map
            .get("address")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        Value::String(s) => s.clone(),
        _ => String::new(),
    }
}

/// Flatten a v2 attendee to its display name, falling back to the identifier
fn display_name(attendee: Attendee) -> String {
    if attendee.display_name.is_empty() {
        attendee.identifier
    } else {
        attendee.display_name
    }
}

fn text_at(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
