//! Database-backed field schema provider.
//!
//! Field definitions live in two tables: `api_metadata` (one row per API)
//! and `api_metadata_field` (one row per field definition). The provider
//! joins them per lookup; the engine calls it once per inbound message and
//! the row counts are tiny, so there is no cache layer.

use smartlogger_core::schema::{
    Datatype, FieldDefinition, FieldSchemaProvider, KeyStatus, MessageAffinity, SchemaError,
};
use sqlx::PgPool;
use std::future::Future;
use std::pin::Pin;

/// One joined `api_metadata_field` row.
#[derive(Debug, sqlx::FromRow)]
struct FieldRow {
    field_name: String,
    field_path: String,
    key_status: String,
    message_type: Option<String>,
    datatype: Option<String>,
    date_pattern: Option<String>,
}

/// Map one row into a definition.
///
/// A row whose `key_status` is unrecognized is skipped rather than failing
/// the whole lookup; the rest of the schema still applies.
fn definition_from_row(row: FieldRow) -> Option<FieldDefinition> {
    let Some(key_status) = KeyStatus::parse(&row.key_status) else {
        tracing::warn!(
            field = %row.field_name,
            key_status = %row.key_status,
            "Skipping schema row with unknown key status"
        );
        return None;
    };

    Some(FieldDefinition {
        field: row.field_name,
        path: row.field_path,
        key_status,
        affinity: MessageAffinity::parse(row.message_type.as_deref()),
        datatype: Datatype::parse(row.datatype.as_deref()),
        date_pattern: row.date_pattern.filter(|p| !p.is_empty()),
    })
}

/// [`FieldSchemaProvider`] over the relational configuration store.
pub struct PostgresSchemaProvider {
    pool: PgPool,
}

impl PostgresSchemaProvider {
    /// Create a provider over an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl FieldSchemaProvider for PostgresSchemaProvider {
    fn fields_for_api(
        &self,
        api_name: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<FieldDefinition>, SchemaError>> + Send + '_>> {
        let api_name = api_name.to_string();

        Box::pin(async move {
            let rows: Vec<FieldRow> = sqlx::query_as(
                r"
                SELECT f.field_name, f.field_path, f.key_status,
                       f.message_type, f.datatype, f.date_pattern
                FROM api_metadata m
                JOIN api_metadata_field f ON f.api_metadata_id = m.id
                WHERE m.api_name = $1
                ORDER BY f.id
                ",
            )
            .bind(&api_name)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| SchemaError::StoreUnavailable(e.to_string()))?;

            let fields: Vec<FieldDefinition> =
                rows.into_iter().filter_map(definition_from_row).collect();

            tracing::debug!(
                api_name = %api_name,
                fields = fields.len(),
                "Loaded field schema"
            );

            Ok(fields)
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)] // Panics: test failures

    use super::*;

    fn row(key_status: &str, message_type: Option<&str>, datatype: Option<&str>) -> FieldRow {
        FieldRow {
            field_name: "ResourcePath".to_string(),
            field_path: "metadata.endpoint".to_string(),
            key_status: key_status.to_string(),
            message_type: message_type.map(ToString::to_string),
            datatype: datatype.map(ToString::to_string),
            date_pattern: None,
        }
    }

    #[test]
    fn maps_a_well_formed_row() {
        let definition =
            definition_from_row(row("mandatory", Some("request"), Some("datetime"))).unwrap();
        assert_eq!(definition.key_status, KeyStatus::Mandatory);
        assert_eq!(definition.affinity, MessageAffinity::Request);
        assert_eq!(definition.datatype, Datatype::Datetime);
    }

    #[test]
    fn unknown_key_status_skips_the_row() {
        assert!(definition_from_row(row("optional", None, None)).is_none());
    }

    #[test]
    fn empty_date_pattern_becomes_none() {
        let mut raw = row("custom", None, None);
        raw.date_pattern = Some(String::new());
        let definition = definition_from_row(raw).unwrap();
        assert_eq!(definition.date_pattern, None);
    }
}
