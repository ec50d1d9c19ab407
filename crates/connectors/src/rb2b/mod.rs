//! RB2B connector - B2B identity resolution via API and file dumps
//!
//! The API Partner Program exposes enrichment endpoints that resolve
//! identity data across namespaces:
//!
//!   Identification (IP -> identity): ip_to_hem, ip_to_maid, ip_to_company
//!   Enrichment (HEM -> profile): hem_to_best_linkedin, hem_to_business_profile,
//!     hem_to_linkedin, hem_to_maid
//!   Enrichment (LinkedIn -> contact): linkedin_to_best_personal_email,
//!     linkedin_to_hashed_emails, linkedin_to_mobile_phone,
//!     linkedin_to_personal_email, linkedin_to_business_profile
//!   Search: linkedin_slug_search
//!
//! Each endpoint is a POST taking one required input field; calls are
//! single-shot and credit-priced. `resource_type` selects the endpoint and
//! is validated against the whitelist before any network traffic.
//!
//! Two modes, selected by `config_json.mode`:
//!   1. `api` (default) - call an enrichment endpoint
//!   2. `file` - parse a CSV/JSON dump exported from the dashboard
//!
//! Auth: API key via `Api-Key` header.
//! Base URL: https://api.rb2b.com/api/v1/

use std::collections::HashMap;
use std::path::Path;

use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use inlet_protocol::{FetchRequest, Record, SourceConfig};

use crate::error::ConnectorError;
use crate::traits::{credential_header, record_from, Page, Probe, Provider};
use crate::transport::Transport;

/// Enrichment endpoints and the one input field each requires
const ENRICHMENT_ENDPOINTS: &[(&str, &str)] = &[
    ("ip_to_hem", "ip_address"),
    ("ip_to_maid", "ip_address"),
    ("ip_to_company", "ip_address"),
    ("hem_to_best_linkedin", "email"),
    ("hem_to_business_profile", "email"),
    ("hem_to_linkedin", "md5"),
    ("hem_to_maid", "md5"),
    ("linkedin_to_best_personal_email", "linkedin_slug"),
    ("linkedin_to_hashed_emails", "linkedin_slug"),
    ("linkedin_to_mobile_phone", "linkedin_slug"),
    ("linkedin_to_personal_email", "linkedin_slug"),
    ("linkedin_to_business_profile", "linkedin_slug"),
    ("linkedin_slug_search", "company_domain"),
];

fn required_input(endpoint: &str) -> Option<&'static str> {
    ENRICHMENT_ENDPOINTS
        .iter()
        .find(|(name, _)| *name == endpoint)
        .map(|(_, field)| *field)
}

/// Operating mode, parsed from `config_json.mode`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Mode {
    #[default]
    Api,
    File,
}

/// Adapter-specific settings parsed from `config_json`
///
/// Enrichment inputs (ip_address, email, md5, ...) stay in the flattened
/// map and are looked up by the endpoint's required field name.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Settings {
    mode: Mode,
    file_path: String,
    #[serde(flatten)]
    inputs: Map<String, Value>,
}

fn settings(config_json: Option<&str>) -> Result<Settings, ConnectorError> {
    match config_json {
        Some(raw) if !raw.is_empty() => serde_json::from_str(raw)
            .map_err(|e| ConnectorError::Config(format!("invalid rb2b config_json: {e}"))),
        _ => Ok(Settings::default()),
    }
}

/// Connector for RB2B identity resolution (API enrichment + file dumps)
#[derive(Debug)]
pub struct Rb2b;

impl Provider for Rb2b {
    fn source_type(&self) -> &'static str {
        "rb2b"
    }

    fn default_base_url(&self) -> &'static str {
        "https://api.rb2b.com/api/v1/"
    }

    fn auth_headers(
        &self,
        _config: &SourceConfig,
        credential: &str,
    ) -> Result<HeaderMap, ConnectorError> {
        let mut headers = HeaderMap::new();
        headers.insert("api-key", credential_header(credential)?);
        Ok(headers)
    }

    /// Verify credentials via the credits endpoint
    ///
    /// `GET credits` returns the remaining balance without consuming any,
    /// so the probe is free.
    async fn check_connection(
        &self,
        transport: &Transport,
        _config: &SourceConfig,
    ) -> Result<Probe, ConnectorError> {
        let data = transport.get_json("credits", &[]).await?;
        let credits = data
            .get("credits_remaining")
            .cloned()
            .unwrap_or_else(|| json!("unknown"));
        let display = match &credits {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Ok(
            Probe::new(format!("Connected to RB2B, {display} credits remaining"))
                .with_data(json!({ "credits_remaining": credits })),
        )
    }

    async fn fetch_page(
        &self,
        transport: &Transport,
        request: &FetchRequest,
        _cursor: Option<&str>,
    ) -> Result<Page, ConnectorError> {
        let settings = settings(request.config_json.as_deref())?;
        match settings.mode {
            Mode::File => Ok(Page {
                records: read_file_dump(&settings).await?,
                next_cursor: None,
            }),
            Mode::Api => enrich(transport, request, &settings).await,
        }
    }
}

/// Call an enrichment endpoint and return its results
///
/// The endpoint name and its input are validated before any network call.
async fn enrich(
    transport: &Transport,
    request: &FetchRequest,
    settings: &Settings,
) -> Result<Page, ConnectorError> {
    let endpoint = request.resource_type.as_str();
    let Some(input_field) = required_input(endpoint) else {
        let valid = ENRICHMENT_ENDPOINTS
            .iter()
            .map(|(name, _)| *name)
            .collect::<Vec<_>>()
            .join(", ");
        return Err(ConnectorError::InvalidResource(format!(
            "unknown rb2b resource_type '{endpoint}'; valid types: {valid}"
        )));
    };

    let input_value = match settings.inputs.get(input_field) {
        Some(Value::String(s)) if !s.is_empty() => Value::String(s.clone()),
        Some(value) if !value.is_null() && !value.is_string() => value.clone(),
        _ => {
            return Err(ConnectorError::Config(format!(
                "rb2b {endpoint} requires '{input_field}' in config_json"
            )));
        }
    };

    let body = json!({ input_field: input_value });
    let data = transport.post_json(endpoint, &body).await?;

    // Enrichment responses use "results" (plural) or "result" (singular)
    let results = data
        .get("results")
        .cloned()
        .filter(|v| !v.is_null())
        .or_else(|| data.get("result").cloned().filter(|v| !v.is_null()));

    let records = match results {
        None => Vec::new(),
        Some(Value::Array(items)) => items.into_iter().map(into_record).collect(),
        Some(Value::Object(map)) => vec![map],
        Some(other) => vec![record_from(json!({ "value": other }))],
    };

    Ok(Page {
        records,
        next_cursor: None,
    })
}

fn into_record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => record_from(json!({ "value": other })),
    }
}

/// Parse a CSV or JSON dump exported from the RB2B dashboard
///
/// Dumps are read whole in one call; there is no pagination. The format is
/// selected by file extension.
async fn read_file_dump(settings: &Settings) -> Result<Vec<Record>, ConnectorError> {
    if settings.file_path.is_empty() {
        return Err(ConnectorError::Config(
            "rb2b file mode requires 'file_path' in config_json".to_string(),
        ));
    }

    let path = Path::new(&settings.file_path);
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let content = tokio::fs::read_to_string(path).await?;

    match extension.as_str() {
        "json" => parse_json_dump(&content),
        "csv" => parse_csv_dump(&content),
        other => Err(ConnectorError::UnsupportedFile(format!(".{other}"))),
    }
}

fn parse_json_dump(content: &str) -> Result<Vec<Record>, ConnectorError> {
    let data: Value = serde_json::from_str(content)?;
    let items = match data {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };
    items
        .into_iter()
        .map(|item| {
            let person: DumpPerson = serde_json::from_value(item)?;
            Ok(normalize_person(person))
        })
        .collect()
}

fn parse_csv_dump(content: &str) -> Result<Vec<Record>, ConnectorError> {
    let mut reader = csv::Reader::from_reader(content.as_bytes());
    let mut records = Vec::new();
    for row in reader.deserialize::<HashMap<String, String>>() {
        records.push(normalize_csv_row(&row?));
    }
    Ok(records)
}

// --- Dump Types ---

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DumpPerson {
    id: Value,
    email: String,
    first_name: String,
    last_name: String,
    title: String,
    linkedin_url: String,
    company: Company,
    page_views: Vec<Value>,
    first_seen: Option<String>,
    last_seen: Option<String>,
    visit_count: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Company {
    name: String,
    domain: String,
    industry: String,
    employee_count: i64,
    revenue_range: String,
    linkedin_url: String,
    location: String,
}

// --- Normalization ---

/// Normalize a visitor/person record from a JSON dump
fn normalize_person(person: DumpPerson) -> Record {
    let id = match &person.id {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    };
    record_from(json!({
        "id": id,
        "email": person.email,
        "first_name": person.first_name,
        "last_name": person.last_name,
        "title": person.title,
        "linkedin_url": person.linkedin_url,
        "company": {
            "name": person.company.name,
            "domain": person.company.domain,
            "industry": person.company.industry,
            "employee_count": person.company.employee_count,
            "revenue_range": person.company.revenue_range,
            "linkedin_url": person.company.linkedin_url,
            "location": person.company.location,
        },
        "page_views": person.page_views,
        "first_seen": person.first_seen,
        "last_seen": person.last_seen,
        "visit_count": person.visit_count,
    }))
}

/// Normalize a CSV row to the same person shape as the JSON path
fn normalize_csv_row(row: &HashMap<String, String>) -> Record {
    let text = |key: &str| row.get(key).cloned().unwrap_or_default();
    let int = |key: &str| {
        row.get(key)
            .and_then(|value| value.parse::<i64>().ok())
            .unwrap_or(0)
    };
    let optional = |key: &str| match row.get(key) {
        Some(value) if !value.is_empty() => json!(value),
        _ => Value::Null,
    };

    record_from(json!({
        "id": text("id"),
        "email": text("email"),
        "first_name": text("first_name"),
        "last_name": text("last_name"),
        "title": text("title"),
        "linkedin_url": text("linkedin_url"),
        "company": {
            "name": text("company_name"),
            "domain": text("company_domain"),
            "industry": text("company_industry"),
            "employee_count": int("company_employee_count"),
            "revenue_range": text("company_revenue_range"),
            "linkedin_url": text("company_linkedin_url"),
            "location": text("company_location"),
        },
        "page_views": [],
        "first_seen": optional("first_seen"),
        "last_seen": optional("last_seen"),
        "visit_count": int("visit_count"),
    }))
}
