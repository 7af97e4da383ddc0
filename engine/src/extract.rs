//! Schema-driven field extraction.
//!
//! The extractor is a pure function of its inputs: given a parsed JSON
//! message, the ordered field definitions for its API, and the message's
//! classification, it writes extracted values into an [`AuditRecord`].
//!
//! Per-field failures never abort the rest of the extraction. A missing
//! path, a null leaf, an unparseable integer or timestamp, or a canonical
//! name the record does not know: each is logged at debug level and
//! skipped, and the remaining definitions are still evaluated.

use chrono::NaiveDateTime;
use serde_json::Value;
use smartlogger_core::record::AuditRecord;
use smartlogger_core::schema::{FieldDefinition, KeyStatus, MessageAffinity};
use smartlogger_core::MessageKind;

/// Default chrono pattern for datetime coercion when a definition does not
/// carry its own.
pub const DEFAULT_DATE_PATTERN: &str = "%Y-%m-%dT%H:%M:%S";

/// The fixed canonical attributes a Mandatory definition can target.
///
/// Unrecognized names are not an error; the definition is simply ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CanonicalField {
    ApiName,
    CorrelationId,
    Host,
    ParentId,
    RequestPayload,
    RequestTime,
    ResourcePath,
    ResponsePayload,
    ResponseTime,
    Status,
    StatusCode,
    TransactionId,
    UniqueTransactionId,
}

impl CanonicalField {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "APIName" => Some(Self::ApiName),
            "CorrelationID" => Some(Self::CorrelationId),
            "Host" => Some(Self::Host),
            "ParentID" => Some(Self::ParentId),
            "RequestPayload" => Some(Self::RequestPayload),
            "RequestTime" => Some(Self::RequestTime),
            "ResourcePath" => Some(Self::ResourcePath),
            "ResponsePayload" => Some(Self::ResponsePayload),
            "ResponseTime" => Some(Self::ResponseTime),
            "Status" => Some(Self::Status),
            "StatusCode" => Some(Self::StatusCode),
            "TransactionID" => Some(Self::TransactionId),
            "UniqueTransactionID" => Some(Self::UniqueTransactionId),
            _ => None,
        }
    }
}

/// Resolve a dot-separated path against a JSON document.
///
/// Returns `None` if any segment is missing or the walk hits a non-object.
#[must_use]
pub fn resolve_path<'a>(body: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }
    let mut current = body;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

/// Render a JSON leaf as a string. Containers and nulls yield `None`.
#[must_use]
pub fn leaf_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Apply every matching field definition from `fields` to `record`.
///
/// `kind` drives affinity filtering: a definition restricted to one message
/// side is skipped on the other side (and on SINGLE messages); a definition
/// with no affinity is evaluated against every message it is offered, so
/// the same custom key may be appended by both sides of a transaction.
pub fn apply_schema(
    record: &mut AuditRecord,
    body: &Value,
    fields: &[FieldDefinition],
    kind: MessageKind,
) {
    let mut mandatory = 0_usize;
    let mut custom = 0_usize;

    for definition in fields {
        if !affinity_matches(definition.affinity, kind) {
            tracing::debug!(
                field = %definition.field,
                affinity = ?definition.affinity,
                kind = %kind,
                "Skipping field, affinity does not match message side"
            );
            continue;
        }

        let Some(value) = resolve_path(body, &definition.path).and_then(leaf_to_string) else {
            tracing::debug!(
                field = %definition.field,
                path = %definition.path,
                "Field not found at path"
            );
            continue;
        };

        match definition.key_status {
            KeyStatus::Mandatory => {
                assign_canonical(record, definition, &value);
                mandatory += 1;
            }
            KeyStatus::Custom => {
                record.add_custom_field(&definition.field, value);
                custom += 1;
            }
        }
    }

    tracing::debug!(
        mandatory,
        custom,
        kind = %kind,
        correlation_id = %record.correlation_id,
        "Extracted fields from message"
    );
}

/// Store the full message verbatim into the payload slot for its side.
///
/// SINGLE messages store into the request slot; the record has no better
/// home for them and downstream consumers expect the raw payload there.
pub fn store_payload(record: &mut AuditRecord, body: &Value, kind: MessageKind) {
    let raw = body.to_string();
    match kind {
        MessageKind::Request | MessageKind::Single => record.request_payload = Some(raw),
        MessageKind::Response => record.response_payload = Some(raw),
    }
}

fn affinity_matches(affinity: MessageAffinity, kind: MessageKind) -> bool {
    match affinity {
        MessageAffinity::Any => true,
        MessageAffinity::Request => kind == MessageKind::Request,
        MessageAffinity::Response => kind == MessageKind::Response,
    }
}

/// Assign one extracted value into its canonical record attribute.
fn assign_canonical(record: &mut AuditRecord, definition: &FieldDefinition, value: &str) {
    let Some(target) = CanonicalField::parse(&definition.field) else {
        tracing::debug!(field = %definition.field, "Unknown canonical field name, ignoring");
        return;
    };

    match target {
        CanonicalField::ApiName => record.api_name = Some(value.to_string()),
        CanonicalField::CorrelationId => record.correlation_id = value.to_string(),
        CanonicalField::Host => record.host = Some(value.to_string()),
        CanonicalField::ParentId => record.parent_id = Some(value.to_string()),
        CanonicalField::RequestPayload => record.request_payload = Some(value.to_string()),
        CanonicalField::ResourcePath => record.resource_path = Some(value.to_string()),
        CanonicalField::ResponsePayload => record.response_payload = Some(value.to_string()),
        CanonicalField::Status => record.status = Some(value.to_string()),
        CanonicalField::TransactionId => record.transaction_id = Some(value.to_string()),
        CanonicalField::UniqueTransactionId => {
            record.unique_transaction_id = Some(value.to_string());
        }
        CanonicalField::StatusCode => match value.parse::<i64>() {
            Ok(code) => record.status_code = Some(code),
            Err(_) => {
                tracing::debug!(value = %value, "Invalid status code, skipping");
            }
        },
        CanonicalField::RequestTime => {
            if let Some(ts) = parse_datetime(value, definition.date_pattern.as_deref()) {
                record.request_time = Some(ts);
            }
        }
        CanonicalField::ResponseTime => {
            if let Some(ts) = parse_datetime(value, definition.date_pattern.as_deref()) {
                record.response_time = Some(ts);
            }
        }
    }
}

/// Parse a timestamp with the definition's pattern, or the default one.
///
/// Coercion failure yields `None`, never an error.
fn parse_datetime(value: &str, pattern: Option<&str>) -> Option<NaiveDateTime> {
    let pattern = pattern.filter(|p| !p.is_empty()).unwrap_or(DEFAULT_DATE_PATTERN);
    match NaiveDateTime::parse_from_str(value, pattern) {
        Ok(ts) => Some(ts),
        Err(e) => {
            tracing::debug!(value = %value, pattern = %pattern, error = %e, "Failed to parse datetime");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)] // Panics: test failures

    use super::*;
    use serde_json::json;
    use smartlogger_core::schema::Datatype;

    fn request_body() -> Value {
        json!({
            "request_id": "abc",
            "metadata": {
                "endpoint": "/grn",
                "client_ip": "10.0.0.1",
                "response_status": 200
            },
            "timestamp": "2026-03-01T12:30:00",
            "payload": { "grn_number": "G1" }
        })
    }

    #[test]
    fn resolves_nested_paths() {
        let body = request_body();
        assert_eq!(
            resolve_path(&body, "metadata.endpoint").and_then(leaf_to_string),
            Some("/grn".to_string())
        );
        assert_eq!(resolve_path(&body, "metadata.missing"), None);
        assert_eq!(resolve_path(&body, ""), None);
        // Walking through a leaf fails rather than panicking.
        assert_eq!(resolve_path(&body, "request_id.deeper"), None);
    }

    #[test]
    fn containers_do_not_stringify() {
        let body = request_body();
        assert_eq!(resolve_path(&body, "metadata").and_then(leaf_to_string), None);
    }

    #[test]
    fn mandatory_fields_assign_canonical_attributes() {
        let fields = vec![
            FieldDefinition::mandatory("ResourcePath", "metadata.endpoint"),
            FieldDefinition::mandatory("StatusCode", "metadata.response_status")
                .with_datatype(Datatype::Integer),
            FieldDefinition::mandatory("RequestTime", "timestamp")
                .with_datatype(Datatype::Datetime),
        ];

        let mut record = AuditRecord::new("abc");
        apply_schema(&mut record, &request_body(), &fields, MessageKind::Request);

        assert_eq!(record.resource_path.as_deref(), Some("/grn"));
        assert_eq!(record.status_code, Some(200));
        assert_eq!(
            record.request_time.map(|t| t.to_string()),
            Some("2026-03-01 12:30:00".to_string())
        );
    }

    #[test]
    fn extraction_survives_a_malformed_definition() {
        // One well-formed and one bad-path Mandatory definition: the
        // well-formed field lands, the malformed one is silently absent.
        let fields = vec![
            FieldDefinition::mandatory("Status", "no.such.path"),
            FieldDefinition::mandatory("ResourcePath", "metadata.endpoint"),
        ];

        let mut record = AuditRecord::new("abc");
        apply_schema(&mut record, &request_body(), &fields, MessageKind::Request);

        assert_eq!(record.status, None);
        assert_eq!(record.resource_path.as_deref(), Some("/grn"));
    }

    #[test]
    fn unknown_canonical_name_is_ignored() {
        let fields = vec![FieldDefinition::mandatory("NotARealField", "metadata.endpoint")];
        let mut record = AuditRecord::new("abc");
        apply_schema(&mut record, &request_body(), &fields, MessageKind::Request);
        assert_eq!(record, {
            let mut expected = AuditRecord::new("abc");
            expected.indexed_at = record.indexed_at;
            expected
        });
    }

    #[test]
    fn custom_field_affinity_filters_by_message_side() {
        // A REQUEST-only custom definition never populates from a
        // RESPONSE message, and vice versa.
        let fields = vec![
            FieldDefinition::custom("grn_number", "payload.grn_number")
                .with_affinity(MessageAffinity::Request),
            FieldDefinition::custom("grn_echo", "payload.grn_number")
                .with_affinity(MessageAffinity::Response),
        ];

        let mut record = AuditRecord::new("abc");
        apply_schema(&mut record, &request_body(), &fields, MessageKind::Request);
        assert_eq!(record.custom_fields.len(), 1);
        assert_eq!(record.custom_fields[0].key, "grn_number");

        apply_schema(&mut record, &request_body(), &fields, MessageKind::Response);
        assert_eq!(record.custom_fields.len(), 2);
        assert_eq!(record.custom_fields[1].key, "grn_echo");
    }

    #[test]
    fn any_affinity_appends_on_every_side() {
        let fields = vec![FieldDefinition::custom("grn_number", "payload.grn_number")];
        let mut record = AuditRecord::new("abc");
        apply_schema(&mut record, &request_body(), &fields, MessageKind::Request);
        apply_schema(&mut record, &request_body(), &fields, MessageKind::Response);
        assert_eq!(record.custom_fields.len(), 2);
    }

    #[test]
    fn restricted_fields_skip_single_messages() {
        let fields = vec![
            FieldDefinition::custom("req_only", "payload.grn_number")
                .with_affinity(MessageAffinity::Request),
            FieldDefinition::custom("always", "payload.grn_number"),
        ];
        let mut record = AuditRecord::new("abc");
        apply_schema(&mut record, &request_body(), &fields, MessageKind::Single);
        assert_eq!(record.custom_fields.len(), 1);
        assert_eq!(record.custom_fields[0].key, "always");
    }

    #[test]
    fn bad_status_code_is_skipped_without_aborting() {
        let body = json!({ "code": "not-a-number", "status": "SUCCESS" });
        let fields = vec![
            FieldDefinition::mandatory("StatusCode", "code").with_datatype(Datatype::Integer),
            FieldDefinition::mandatory("Status", "status"),
        ];
        let mut record = AuditRecord::new("abc");
        apply_schema(&mut record, &body, &fields, MessageKind::Response);
        assert_eq!(record.status_code, None);
        assert_eq!(record.status.as_deref(), Some("SUCCESS"));
    }

    #[test]
    fn custom_date_pattern_is_honored() {
        let body = json!({ "ts": "01/03/2026 12:30" });
        let fields = vec![
            FieldDefinition::mandatory("ResponseTime", "ts")
                .with_datatype(Datatype::Datetime)
                .with_date_pattern("%d/%m/%Y %H:%M"),
        ];
        let mut record = AuditRecord::new("abc");
        apply_schema(&mut record, &body, &fields, MessageKind::Response);
        assert_eq!(
            record.response_time.map(|t| t.to_string()),
            Some("2026-03-01 12:30:00".to_string())
        );
    }

    #[test]
    fn payload_lands_on_the_matching_side() {
        let body = request_body();
        let mut record = AuditRecord::new("abc");

        store_payload(&mut record, &body, MessageKind::Request);
        assert!(record.request_payload.is_some());
        assert!(record.response_payload.is_none());

        store_payload(&mut record, &body, MessageKind::Response);
        assert!(record.response_payload.is_some());
    }
}
