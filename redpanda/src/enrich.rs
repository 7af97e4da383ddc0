//! Message enrichment ahead of correlation.
//!
//! Raw audit messages say nothing about where they came from, and each
//! broker connection can declare its own path for the API name. The
//! enricher normalizes both: every message leaving a consumer carries a
//! top-level `connectionName` and, when resolvable, `extractedApiName`.
//! Downstream classification only looks at those two injected keys.

use serde_json::{Map, Value};
use smartlogger_core::connection::BrokerConnection;
use smartlogger_core::event::{CONNECTION_NAME_KEY, EXTRACTED_API_NAME_KEY};
use thiserror::Error;

/// Key under which a non-object message body is preserved when wrapping.
pub const ORIGINAL_MESSAGE_KEY: &str = "originalMessage";

/// Top-level keys tried for the API name when the connection declares no
/// explicit path.
const API_NAME_FALLBACKS: [&str; 3] = ["api_name", "apiName", "API_NAME"];

/// Errors from the enrichment step.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnrichError {
    /// The raw bytes were not valid JSON.
    #[error("Malformed JSON: {0}")]
    MalformedJson(String),
}

/// Enrich one raw message for `connection`.
///
/// Injects `connectionName` and, when an API name can be resolved from the
/// connection's declared path or the conventional fallbacks,
/// `extractedApiName`. Non-object JSON (arrays, scalars) is wrapped in an
/// object under [`ORIGINAL_MESSAGE_KEY`] first so the injected keys always
/// live at the top level.
///
/// A message whose API name cannot be resolved is still returned enriched;
/// the correlation pipeline is where it gets dropped, with its own warning.
///
/// # Errors
///
/// Returns [`EnrichError::MalformedJson`] when the payload does not parse.
pub fn enrich(raw: &str, connection: &BrokerConnection) -> Result<String, EnrichError> {
    let parsed: Value =
        serde_json::from_str(raw).map_err(|e| EnrichError::MalformedJson(e.to_string()))?;

    let api_name = resolve_api_name(&parsed, connection);

    let mut object = match parsed {
        Value::Object(map) => map,
        other => {
            tracing::debug!(
                connection = %connection.connection_name,
                "Non-object message, wrapping under {ORIGINAL_MESSAGE_KEY}"
            );
            let mut map = Map::new();
            map.insert(ORIGINAL_MESSAGE_KEY.to_string(), other);
            map
        }
    };

    object.insert(
        CONNECTION_NAME_KEY.to_string(),
        Value::String(connection.connection_name.clone()),
    );

    if let Some(api_name) = api_name {
        object.insert(EXTRACTED_API_NAME_KEY.to_string(), Value::String(api_name));
    } else {
        tracing::debug!(
            connection = %connection.connection_name,
            "No API name resolvable from message"
        );
    }

    Ok(Value::Object(object).to_string())
}

/// Resolve the API name from the connection's declared path, falling back
/// to the conventional top-level keys.
fn resolve_api_name(body: &Value, connection: &BrokerConnection) -> Option<String> {
    if let Some(path) = connection.details.api_name_path() {
        if let Some(name) = scalar_at_path(body, path) {
            return Some(name);
        }
        tracing::debug!(
            connection = %connection.connection_name,
            path,
            "Declared API name path did not resolve, trying fallbacks"
        );
    }

    API_NAME_FALLBACKS
        .iter()
        .find_map(|key| scalar_at_path(body, key))
}

/// Walk a dot-separated path and render the leaf as a string scalar.
fn scalar_at_path(body: &Value, path: &str) -> Option<String> {
    if path.is_empty() {
        return None;
    }
    let mut current = body;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    match current {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)] // Panics: test failures

    use super::*;
    use serde_json::json;
    use smartlogger_core::connection::{ConnectionDetails, ConnectionField};

    fn connection_with_path(path: Option<&str>) -> BrokerConnection {
        BrokerConnection {
            connection_name: "primary-kafka".to_string(),
            details: ConnectionDetails {
                fields: path
                    .map(|p| {
                        vec![ConnectionField {
                            field: Some("APIName".to_string()),
                            path: Some(p.to_string()),
                        }]
                    })
                    .unwrap_or_default(),
                ..ConnectionDetails::default()
            },
        }
    }

    #[test]
    fn injects_connection_name_and_api_name_from_declared_path() {
        let raw = json!({ "service": { "name": "grn-api" }, "request_id": "abc" }).to_string();
        let enriched = enrich(&raw, &connection_with_path(Some("service.name"))).unwrap();

        let value: Value = serde_json::from_str(&enriched).unwrap();
        assert_eq!(value["connectionName"], "primary-kafka");
        assert_eq!(value["extractedApiName"], "grn-api");
        assert_eq!(value["request_id"], "abc");
    }

    #[test]
    fn falls_back_to_conventional_keys() {
        let raw = json!({ "apiName": "grn-api" }).to_string();
        let enriched = enrich(&raw, &connection_with_path(None)).unwrap();
        let value: Value = serde_json::from_str(&enriched).unwrap();
        assert_eq!(value["extractedApiName"], "grn-api");
    }

    #[test]
    fn declared_path_that_misses_still_tries_fallbacks() {
        let raw = json!({ "API_NAME": "grn-api" }).to_string();
        let enriched = enrich(&raw, &connection_with_path(Some("service.name"))).unwrap();
        let value: Value = serde_json::from_str(&enriched).unwrap();
        assert_eq!(value["extractedApiName"], "grn-api");
    }

    #[test]
    fn unresolvable_api_name_leaves_key_absent() {
        let raw = json!({ "request_id": "abc" }).to_string();
        let enriched = enrich(&raw, &connection_with_path(None)).unwrap();
        let value: Value = serde_json::from_str(&enriched).unwrap();
        assert_eq!(value["connectionName"], "primary-kafka");
        assert!(value.get("extractedApiName").is_none());
    }

    #[test]
    fn non_object_messages_are_wrapped() {
        let enriched = enrich("[1, 2, 3]", &connection_with_path(None)).unwrap();
        let value: Value = serde_json::from_str(&enriched).unwrap();
        assert_eq!(value["originalMessage"], json!([1, 2, 3]));
        assert_eq!(value["connectionName"], "primary-kafka");
    }

    #[test]
    fn malformed_json_is_rejected() {
        let err = enrich("{nope", &connection_with_path(None)).unwrap_err();
        assert!(matches!(err, EnrichError::MalformedJson(_)));
    }
}
