//! Inbound operation entry points
//!
//! The orchestration layer calls these four functions - each an atomic
//! business verb. Every function builds a connector through the factory,
//! delegates the work, and closes the HTTP client on every exit path.
//! Expected failures come back as `success = false` results; only
//! construction-time contract errors surface as `Err`.

use tokio::sync::mpsc;
use tracing::info;

use inlet_protocol::{ConnectionResult, FetchRequest, FetchResult, SourceConfig, SourceSchema};

use crate::connector::Heartbeat;
use crate::error::ConnectorError;
use crate::factory;

/// Verify connectivity to an external data source and return API metadata
///
/// # Errors
///
/// Returns `Err` only for construction-time contract errors (unknown source
/// type, invalid rate limit).
pub async fn connect_source(config: SourceConfig) -> Result<ConnectionResult, ConnectorError> {
    info!(
        source = %config.source_id,
        source_type = %config.source_type,
        "connecting to source"
    );
    let mut connector = factory::get(config)?;
    let result = connector.connect().await;
    connector.close();
    Ok(result)
}

/// Lightweight credential validation for a data source
///
/// Functionally identical to [`connect_source`] but semantically distinct -
/// a quick "does this work?" check without committing to a full setup.
///
/// # Errors
///
/// Returns `Err` only for construction-time contract errors.
pub async fn test_connection(config: SourceConfig) -> Result<ConnectionResult, ConnectorError> {
    info!(
        source = %config.source_id,
        source_type = %config.source_type,
        "testing connection"
    );
    let mut connector = factory::get(config)?;
    let result = connector.test_connection().await;
    connector.close();
    Ok(result)
}

/// Fetch records from an external data source with auto-pagination
///
/// The workhorse operation. Pages are collected into memory up to the
/// request's page ceiling; the optional heartbeat channel receives a
/// best-effort liveness signal per page.
///
/// # Errors
///
/// Returns `Err` only for construction-time contract errors.
pub async fn fetch_source_data(
    request: FetchRequest,
    heartbeat: Option<mpsc::Sender<Heartbeat>>,
) -> Result<FetchResult, ConnectorError> {
    info!(
        source = %request.source_id,
        source_type = %request.source_type,
        resource = %request.resource_type,
        "fetching source data"
    );
    let mut connector = factory::get(request.source_config())?;
    if let Some(sender) = heartbeat {
        connector = connector.with_heartbeat(sender);
    }
    let result = connector.fetch_data(&request).await;
    connector.close();
    Ok(result)
}

/// Discover field names and types from a sample of source data
///
/// # Errors
///
/// Returns `Err` only for construction-time contract errors.
pub async fn get_source_schema(request: FetchRequest) -> Result<SourceSchema, ConnectorError> {
    info!(
        source = %request.source_id,
        source_type = %request.source_type,
        "discovering source schema"
    );
    let mut connector = factory::get(request.source_config())?;
    let result = connector.get_schema(&request).await;
    connector.close();
    Ok(result)
}
