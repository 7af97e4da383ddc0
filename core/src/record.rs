//! The audit record: the correlation unit indexed into the document store.
//!
//! One record is produced per finalized transaction. The serialized form
//! uses the exact attribute names the search index mappings were built for
//! (`APIName`, `CorrelationID`, ...), so the serde renames here are part of
//! the external contract and must not drift.

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry of the open-ended custom key/value list.
///
/// Custom fields are append-only and deliberately not deduplicated: the
/// same key extracted from both the REQUEST and the RESPONSE side shows up
/// twice, preserving which side said what.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomField {
    /// Schema-declared field name.
    pub key: String,
    /// Extracted value, always stringly typed.
    pub value: String,
}

/// The merged audit record for one transaction.
///
/// Created when the first event for a correlation id is observed, mutated
/// as further events and the field extractor contribute data, and emitted
/// exactly once, on match or on timeout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Document id in the search index. Assigned at emit time when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Name of the API the transaction belongs to.
    #[serde(rename = "APIName")]
    pub api_name: Option<String>,

    /// Correlation id shared by the request and response events.
    #[serde(rename = "CorrelationID")]
    pub correlation_id: String,

    /// Host extracted from the schema, if declared.
    #[serde(rename = "Host")]
    pub host: Option<String>,

    /// Parent transaction id. Seeded from the correlation id.
    #[serde(rename = "ParentID")]
    pub parent_id: Option<String>,

    /// Verbatim JSON of the request-side message.
    #[serde(rename = "RequestPayload")]
    pub request_payload: Option<String>,

    /// Request timestamp as extracted per the schema.
    #[serde(rename = "RequestTime")]
    pub request_time: Option<NaiveDateTime>,

    /// Resource path (endpoint) of the call.
    #[serde(rename = "ResourcePath")]
    pub resource_path: Option<String>,

    /// Verbatim JSON of the response-side message.
    #[serde(rename = "ResponsePayload")]
    pub response_payload: Option<String>,

    /// Response timestamp as extracted per the schema.
    #[serde(rename = "ResponseTime")]
    pub response_time: Option<NaiveDateTime>,

    /// Business status (e.g. `SUCCESS`).
    #[serde(rename = "Status")]
    pub status: Option<String>,

    /// Numeric status code of the response.
    #[serde(rename = "StatusCode")]
    pub status_code: Option<i64>,

    /// Transaction id. Seeded from the correlation id.
    #[serde(rename = "TransactionID")]
    pub transaction_id: Option<String>,

    /// Globally unique transaction id. Seeded from the correlation id.
    #[serde(rename = "UniqueTransactionID")]
    pub unique_transaction_id: Option<String>,

    /// Open-ended key/value list populated by Custom field definitions.
    #[serde(rename = "CustomField", default)]
    pub custom_fields: Vec<CustomField>,

    /// Set once at construction; used only for retention bookkeeping of
    /// finalized records, never for correlation timing.
    #[serde(rename = "indexedAt")]
    pub indexed_at: NaiveDateTime,

    /// True only when both a REQUEST and a RESPONSE contributed data
    /// before finalization.
    #[serde(rename = "isComplete")]
    pub is_complete: bool,
}

impl AuditRecord {
    /// Create a record for a newly observed correlation id.
    ///
    /// The correlation id also seeds `parent_id`, `transaction_id` and
    /// `unique_transaction_id`; Mandatory field extraction may overwrite
    /// any of them later.
    #[must_use]
    pub fn new(correlation_id: impl Into<String>) -> Self {
        let correlation_id = correlation_id.into();
        Self {
            id: None,
            api_name: None,
            correlation_id: correlation_id.clone(),
            host: None,
            parent_id: Some(correlation_id.clone()),
            request_payload: None,
            request_time: None,
            resource_path: None,
            response_payload: None,
            response_time: None,
            status: None,
            status_code: None,
            transaction_id: Some(correlation_id.clone()),
            unique_transaction_id: Some(correlation_id),
            custom_fields: Vec::new(),
            indexed_at: Utc::now().naive_utc(),
            is_complete: false,
        }
    }

    /// Append one custom key/value pair. Duplicate keys are kept.
    pub fn add_custom_field(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.custom_fields.push(CustomField {
            key: key.into(),
            value: value.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)] // Panics: test failures

    use super::*;

    #[test]
    fn new_record_seeds_ids_from_correlation_id() {
        let record = AuditRecord::new("abc");
        assert_eq!(record.correlation_id, "abc");
        assert_eq!(record.parent_id.as_deref(), Some("abc"));
        assert_eq!(record.transaction_id.as_deref(), Some("abc"));
        assert_eq!(record.unique_transaction_id.as_deref(), Some("abc"));
        assert!(!record.is_complete);
    }

    #[test]
    fn serializes_with_index_attribute_names() {
        let mut record = AuditRecord::new("abc");
        record.status = Some("SUCCESS".to_string());
        record.status_code = Some(200);
        record.add_custom_field("grn_number", "G1");

        let doc = serde_json::to_value(&record).unwrap();
        assert_eq!(doc["CorrelationID"], "abc");
        assert_eq!(doc["Status"], "SUCCESS");
        assert_eq!(doc["StatusCode"], 200);
        assert_eq!(doc["CustomField"][0]["key"], "grn_number");
        assert_eq!(doc["isComplete"], false);
        assert!(doc.get("indexedAt").is_some());
        // Absent document id stays out of the document body.
        assert!(doc.get("id").is_none());
    }

    #[test]
    fn custom_fields_keep_duplicates() {
        let mut record = AuditRecord::new("abc");
        record.add_custom_field("k", "from-request");
        record.add_custom_field("k", "from-response");
        assert_eq!(record.custom_fields.len(), 2);
        assert_eq!(record.custom_fields[0].value, "from-request");
        assert_eq!(record.custom_fields[1].value, "from-response");
    }
}
