//! Inlet Protocol - boundary models for the connector framework
//!
//! These types cross the framework edge: the orchestration layer builds
//! `SourceConfig`/`FetchRequest` values as operation arguments, and the
//! connector framework answers with `ConnectionResult`/`FetchResult`/
//! `SourceSchema` value objects.
//!
//! # Design Principles
//!
//! - **Results, not exceptions**: `success = false` is a normal outcome.
//!   Callers branch on it; expected failures never cross the boundary as
//!   errors.
//! - **Untyped records at the edge**: `FetchResult::records` is a sequence of
//!   JSON objects. Each adapter guarantees stable key names per provider;
//!   typed views are a downstream concern.
//! - **Credentials stay out of band**: `SourceConfig::auth_env_var` names an
//!   environment variable. The credential value itself never travels through
//!   these types.

mod config;
mod result;

pub use config::{
    FetchRequest, SourceConfig, DEFAULT_MAX_PAGES, DEFAULT_RATE_LIMIT_PER_SECOND,
};
pub use result::{ConnectionResult, FetchResult, Record, SourceSchema};
