//! Result types returned across the framework boundary
//!
//! Every operation answers with one of these value objects. `success = false`
//! carries a human-readable `message` describing the failure; callers branch
//! on `success`, never on thrown errors, for expected failures.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A normalized record: a flat or shallow-nested JSON object
///
/// The framework does not impose a single schema across providers - each
/// adapter guarantees stable key names for its own records.
pub type Record = serde_json::Map<String, Value>;

/// Returned by connect and test-connection operations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionResult {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub source_id: String,
    #[serde(default)]
    pub source_type: String,
    /// Provider metadata from the connection probe (account counts, balances)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Returned by fetch operations - carries raw records as JSON objects
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchResult {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub source_id: String,
    #[serde(default)]
    pub records: Vec<Record>,
    #[serde(default)]
    pub record_count: usize,
    /// True when pagination stopped at the page ceiling with a cursor pending
    #[serde(default)]
    pub has_more: bool,
}

/// Returned by schema discovery - field names and their inferred coarse types
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceSchema {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub source_id: String,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}
