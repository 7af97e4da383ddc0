//! `PostgreSQL` configuration store for the smartlogger pipeline.
//!
//! Two lookups live here, both read-only:
//!
//! - [`schema`]: the [`FieldSchemaProvider`](smartlogger_core::schema::FieldSchemaProvider)
//!   implementation reading `api_metadata` / `api_metadata_field` rows
//! - [`connections`]: loading of `data_source_connection` rows into the
//!   broker connection model
//!
//! Queries use sqlx over a shared `PgPool`; this crate never writes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod connections;
pub mod schema;

pub use connections::{load_connections, ConnectionLoadError};
pub use schema::PostgresSchemaProvider;
