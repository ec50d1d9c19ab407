//! X.com connector - API v2 for owned-account posts and metrics
//!
//! Reads our own account's posts and their public engagement metrics. The
//! nested `public_metrics` object is flattened into the record so downstream
//! consumers see one flat shape.
//!
//! Auth: OAuth 2.0 Bearer token (app-only).
//! Pagination: `meta.next_token`, echoed back as `pagination_token`.
//! Pricing: pay-per-use; each page logs an estimated cost for awareness.
//! Base URL: https://api.x.com/2/

use reqwest::header::{HeaderMap, AUTHORIZATION};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use inlet_protocol::{FetchRequest, Record, SourceConfig};

use crate::error::ConnectorError;
use crate::traits::{credential_header, record_from, Page, Probe, Provider};
use crate::transport::Transport;

/// Fixed page size for the tweets endpoint
const PAGE_SIZE: u32 = 100;

/// Tweet fields requested on every page
const TWEET_FIELDS: &str =
    "created_at,author_id,conversation_id,public_metrics,lang,edit_history_tweet_ids";

/// Approximate read cost per tweet (observability only)
const COST_PER_TWEET_USD: f64 = 0.005;

/// Adapter-specific settings parsed from `config_json`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Settings {
    user_id: String,
    username: String,
}

fn settings(config_json: Option<&str>) -> Result<Settings, ConnectorError> {
    match config_json {
        Some(raw) if !raw.is_empty() => serde_json::from_str(raw)
            .map_err(|e| ConnectorError::Config(format!("invalid x config_json: {e}"))),
        _ => Ok(Settings::default()),
    }
}

/// Connector for the X.com API v2
#[derive(Debug)]
pub struct X;

impl Provider for X {
    fn source_type(&self) -> &'static str {
        "x"
    }

    fn default_base_url(&self) -> &'static str {
        "https://api.x.com/2/"
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
        let settings = settings(config.config_json.as_deref())?;
        if settings.username.is_empty() {
            // App-only tokens have no cheap self-lookup; report the token as
            // configured without spending a read.
            return Ok(Probe::new("X API token configured (no username to probe)"));
        }

        let data = transport
            .get_json(&format!("users/by/username/{}", settings.username), &[])
            .await?;
        let user = data.get("data").cloned().unwrap_or_default();
        let username = user
            .get("username")
            .and_then(Value::as_str)
            .unwrap_or(&settings.username)
            .to_string();
        let user_id = user
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Ok(Probe::new(format!("Connected to X as @{username}"))
            .with_data(json!({ "user_id": user_id, "username": username })))
    }

    async fn fetch_page(
        &self,
        transport: &Transport,
        request: &FetchRequest,
        cursor: Option<&str>,
    ) -> Result<Page, ConnectorError> {
        let settings = settings(request.config_json.as_deref())?;
        if settings.user_id.is_empty() {
            return Err(ConnectorError::Config(
                "x connector requires 'user_id' in config_json".to_string(),
            ));
        }

        let mut query: Vec<(&str, String)> = vec![
            ("max_results", PAGE_SIZE.to_string()),
            ("tweet.fields", TWEET_FIELDS.to_string()),
        ];
        if let Some(cursor) = cursor {
            query.push(("pagination_token", cursor.to_string()));
        }
        if let Some(since) = request.since {
            query.push(("start_time", since.format("%Y-%m-%dT%H:%M:%SZ").to_string()));
        }

        let data = transport
            .get_json(&format!("users/{}/tweets", settings.user_id), &query)
            .await?;
        let response: TweetsResponse = serde_json::from_value(data)?;

        let records: Vec<Record> = response.data.into_iter().map(normalize_tweet).collect();
        if !records.is_empty() {
            debug!(
                tweets = records.len(),
                est_cost_usd = records.len() as f64 * COST_PER_TWEET_USD,
                "fetched tweet page"
            );
        }

        Ok(Page {
            records,
            next_cursor: response.meta.next_token,
        })
    }
}

// --- API Response Types ---

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TweetsResponse {
    data: Vec<Tweet>,
    meta: Meta,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Meta {
    next_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Tweet {
    id: String,
    text: String,
    created_at: Option<String>,
    author_id: String,
    conversation_id: String,
    public_metrics: PublicMetrics,
    lang: String,
    edit_history_tweet_ids: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PublicMetrics {
    retweet_count: i64,
    reply_count: i64,
    like_count: i64,
    quote_count: i64,
    bookmark_count: i64,
    impression_count: i64,
}

// --- Normalization ---

/// Normalize an X API v2 tweet, flattening the metrics object
fn normalize_tweet(item: Tweet) -> Record {
    record_from(json!({
        "id": item.id,
        "text": item.text,
        "created_at": item.created_at,
        "author_id": item.author_id,
        "conversation_id": item.conversation_id,
        "retweet_count": item.public_metrics.retweet_count,
        "reply_count": item.public_metrics.reply_count,
        "like_count": item.public_metrics.like_count,
        "quote_count": item.public_metrics.quote_count,
        "bookmark_count": item.public_metrics.bookmark_count,
        "impression_count": item.public_metrics.impression_count,
        "lang": item.lang,
        "edit_history_tweet_ids": item.edit_history_tweet_ids,
    }))
}
