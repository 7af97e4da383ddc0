//! Loading of broker connection configuration.
//!
//! Each `data_source_connection` row names one Kafka connection and carries
//! its details as a JSON blob. A malformed blob skips that one row with a
//! warning; one bad connection must not stop ingestion for the others.

use serde_json::Value;
use smartlogger_core::connection::{BrokerConnection, ConnectionDetails};
use sqlx::PgPool;
use thiserror::Error;

/// Errors loading connection rows.
#[derive(Error, Debug)]
pub enum ConnectionLoadError {
    /// The store could not be queried.
    #[error("Failed to load connections: {0}")]
    Database(String),
}

#[derive(Debug, sqlx::FromRow)]
struct ConnectionRow {
    connection_name: String,
    details: Value,
}

/// Parse one row's details blob.
fn connection_from_row(row: ConnectionRow) -> Option<BrokerConnection> {
    let details: ConnectionDetails = match serde_json::from_value(row.details) {
        Ok(details) => details,
        Err(e) => {
            tracing::warn!(
                connection = %row.connection_name,
                error = %e,
                "Skipping connection with malformed details blob"
            );
            return None;
        }
    };

    if !details.is_valid() {
        tracing::warn!(
            connection = %row.connection_name,
            "Skipping connection without brokers or topic"
        );
        return None;
    }

    Some(BrokerConnection {
        connection_name: row.connection_name,
        details,
    })
}

/// Load every usable broker connection.
///
/// # Errors
///
/// Returns [`ConnectionLoadError::Database`] when the query itself fails.
/// Individually malformed rows are skipped with a warning instead.
pub async fn load_connections(pool: &PgPool) -> Result<Vec<BrokerConnection>, ConnectionLoadError> {
    let rows: Vec<ConnectionRow> = sqlx::query_as(
        r"
        SELECT connection_name, details
        FROM data_source_connection
        ORDER BY connection_name
        ",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| ConnectionLoadError::Database(e.to_string()))?;

    let total = rows.len();
    let connections: Vec<BrokerConnection> =
        rows.into_iter().filter_map(connection_from_row).collect();

    tracing::info!(
        usable = connections.len(),
        skipped = total - connections.len(),
        "Loaded broker connections"
    );

    Ok(connections)
}
