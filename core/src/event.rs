//! Inbound event classification.
//!
//! Every broker message is an audit log entry in JSON form. Before the
//! correlator sees it, the raw pipeline has injected two top-level keys:
//! `connectionName` (which broker connection produced it) and
//! `extractedApiName` (resolved from the connection's field configuration).
//!
//! Classification reads `log_type` to decide whether the message is the
//! REQUEST or RESPONSE side of a transaction; any other value (or no value
//! at all) is treated as a SINGLE message with no correlation semantics.
//!
//! A message without a correlation id (`request_id`) or without an API name
//! cannot be correlated and is dropped by the caller with a warning. That
//! is a data-quality event, not an error.

use serde_json::Value;
use thiserror::Error;

/// Default JSON key carrying the correlation id.
pub const CORRELATION_ID_KEY: &str = "request_id";

/// JSON key carrying the classification of the message.
pub const LOG_TYPE_KEY: &str = "log_type";

/// JSON key injected by the raw pipeline with the resolved API name.
pub const EXTRACTED_API_NAME_KEY: &str = "extractedApiName";

/// JSON key injected by the raw pipeline with the source connection name.
pub const CONNECTION_NAME_KEY: &str = "connectionName";

/// Errors produced while classifying an inbound message.
///
/// All variants translate into "drop with a warning" at the pipeline
/// boundary; none of them propagate to the broker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassifyError {
    /// The raw bytes were not valid JSON.
    #[error("Malformed JSON: {0}")]
    MalformedJson(String),

    /// No `request_id` present, so the message cannot be correlated.
    #[error("Missing correlation id ({CORRELATION_ID_KEY})")]
    MissingCorrelationId,

    /// No `extractedApiName` present, so no field schema can be selected.
    #[error("Missing API name ({EXTRACTED_API_NAME_KEY})")]
    MissingApiName,
}

/// Which side of a transaction an inbound message represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// The request side of a correlated transaction.
    Request,
    /// The response side of a correlated transaction.
    Response,
    /// A standalone message with no request/response correlation.
    Single,
}

impl MessageKind {
    /// Stable uppercase name, matching the wire-level `log_type` values.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Request => "REQUEST",
            Self::Response => "RESPONSE",
            Self::Single => "SINGLE",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An inbound message that passed classification.
///
/// Holds the parsed JSON body together with the fields every downstream
/// step needs: the correlation id, the API name selecting the field schema,
/// and the classification.
#[derive(Debug, Clone)]
pub struct ClassifiedMessage {
    /// Correlation id shared by a REQUEST and its matching RESPONSE.
    pub correlation_id: String,
    /// API name used to look up the field schema.
    pub api_name: String,
    /// Broker connection the message came from, if the raw pipeline set it.
    pub connection_name: Option<String>,
    /// REQUEST, RESPONSE or SINGLE.
    pub kind: MessageKind,
    /// The full parsed message body.
    pub body: Value,
}

impl ClassifiedMessage {
    /// Classify an already-parsed JSON message.
    ///
    /// `log_type` values other than `REQUEST`/`RESPONSE` (including a
    /// missing key) classify as [`MessageKind::Single`].
    ///
    /// # Errors
    ///
    /// Returns [`ClassifyError::MissingCorrelationId`] or
    /// [`ClassifyError::MissingApiName`] when the respective key is absent,
    /// null, or not a scalar.
    pub fn classify(body: Value) -> Result<Self, ClassifyError> {
        let api_name = scalar_at(&body, EXTRACTED_API_NAME_KEY)
            .ok_or(ClassifyError::MissingApiName)?;
        let correlation_id = scalar_at(&body, CORRELATION_ID_KEY)
            .ok_or(ClassifyError::MissingCorrelationId)?;
        let connection_name = scalar_at(&body, CONNECTION_NAME_KEY);

        let kind = match scalar_at(&body, LOG_TYPE_KEY).as_deref() {
            Some("REQUEST") => MessageKind::Request,
            Some("RESPONSE") => MessageKind::Response,
            other => {
                tracing::debug!(log_type = ?other, "No request/response semantics, treating as SINGLE");
                MessageKind::Single
            }
        };

        Ok(Self {
            correlation_id,
            api_name,
            connection_name,
            kind,
            body,
        })
    }

    /// Parse raw broker bytes and classify the result.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifyError::MalformedJson`] when the payload is not
    /// valid JSON, plus everything [`Self::classify`] can return.
    pub fn from_raw(raw: &str) -> Result<Self, ClassifyError> {
        let body: Value = serde_json::from_str(raw)
            .map_err(|e| ClassifyError::MalformedJson(e.to_string()))?;
        Self::classify(body)
    }
}

/// Read a top-level scalar as a string. Containers and nulls yield `None`.
fn scalar_at(body: &Value, key: &str) -> Option<String> {
    match body.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Truncate raw message content for log output.
///
/// Malformed messages are logged with their content so operators can find
/// the producer at fault, but multi-megabyte payloads must not end up in
/// the log stream verbatim.
#[must_use]
pub fn truncate_for_log(raw: &str, max: usize) -> &str {
    match raw.char_indices().nth(max) {
        Some((idx, _)) => &raw[..idx],
        None => raw,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)] // Panics: test failures

    use super::*;
    use serde_json::json;

    fn base_message() -> Value {
        json!({
            "log_id": "log-1",
            "request_id": "abc-123",
            "extractedApiName": "grn-api",
            "connectionName": "primary-kafka",
            "log_type": "REQUEST",
            "payload": { "grn_number": "G1" }
        })
    }

    #[test]
    fn classifies_request() {
        let msg = ClassifiedMessage::classify(base_message()).unwrap();
        assert_eq!(msg.kind, MessageKind::Request);
        assert_eq!(msg.correlation_id, "abc-123");
        assert_eq!(msg.api_name, "grn-api");
        assert_eq!(msg.connection_name.as_deref(), Some("primary-kafka"));
    }

    #[test]
    fn classifies_response() {
        let mut body = base_message();
        body["log_type"] = json!("RESPONSE");
        let msg = ClassifiedMessage::classify(body).unwrap();
        assert_eq!(msg.kind, MessageKind::Response);
    }

    #[test]
    fn unknown_log_type_is_single() {
        let mut body = base_message();
        body["log_type"] = json!("HEARTBEAT");
        let msg = ClassifiedMessage::classify(body).unwrap();
        assert_eq!(msg.kind, MessageKind::Single);
    }

    #[test]
    fn missing_log_type_is_single() {
        let mut body = base_message();
        body.as_object_mut().unwrap().remove("log_type");
        let msg = ClassifiedMessage::classify(body).unwrap();
        assert_eq!(msg.kind, MessageKind::Single);
    }

    #[test]
    fn missing_correlation_id_is_rejected() {
        let mut body = base_message();
        body.as_object_mut().unwrap().remove("request_id");
        let err = ClassifiedMessage::classify(body).unwrap_err();
        assert_eq!(err, ClassifyError::MissingCorrelationId);
    }

    #[test]
    fn missing_api_name_is_rejected() {
        let mut body = base_message();
        body.as_object_mut().unwrap().remove("extractedApiName");
        let err = ClassifiedMessage::classify(body).unwrap_err();
        assert_eq!(err, ClassifyError::MissingApiName);
    }

    #[test]
    fn numeric_correlation_id_is_accepted() {
        let mut body = base_message();
        body["request_id"] = json!(42);
        let msg = ClassifiedMessage::classify(body).unwrap();
        assert_eq!(msg.correlation_id, "42");
    }

    #[test]
    fn malformed_json_is_reported() {
        let err = ClassifiedMessage::from_raw("{not json").unwrap_err();
        assert!(matches!(err, ClassifyError::MalformedJson(_)));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_for_log("hello", 3), "hel");
        assert_eq!(truncate_for_log("héllo", 2), "hé");
        assert_eq!(truncate_for_log("hi", 10), "hi");
    }
}
