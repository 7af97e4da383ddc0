//! Field schema types and the provider trait.
//!
//! Extraction is database-driven: each API has an ordered list of field
//! definitions telling the extractor where in the inbound JSON to look
//! (`path`), what to do with the value (`key_status`), which message side
//! the definition applies to (`message_type`), and how to coerce it
//! (`datatype` / `date_pattern`).

use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Whether a definition targets a fixed record attribute or the custom list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStatus {
    /// Maps onto a fixed, well-known attribute of the audit record.
    Mandatory,
    /// Appended to the open-ended custom key/value list.
    Custom,
}

impl KeyStatus {
    /// Parse the relational-store representation. Unknown values are `None`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            _ if s.eq_ignore_ascii_case("mandatory") => Some(Self::Mandatory),
            _ if s.eq_ignore_ascii_case("custom") => Some(Self::Custom),
            _ => None,
        }
    }
}

/// Restricts a definition to one message side, or neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageAffinity {
    /// Evaluate only against REQUEST-classified messages.
    Request,
    /// Evaluate only against RESPONSE-classified messages.
    Response,
    /// Evaluate against every message the definition is offered.
    #[default]
    Any,
}

impl MessageAffinity {
    /// Parse the relational-store representation.
    ///
    /// `NULL` and empty strings mean [`MessageAffinity::Any`]; so does any
    /// unrecognized value, matching the permissive schema handling of the
    /// rest of the pipeline.
    #[must_use]
    pub fn parse(s: Option<&str>) -> Self {
        match s {
            Some(v) if v.eq_ignore_ascii_case("request") => Self::Request,
            Some(v) if v.eq_ignore_ascii_case("response") => Self::Response,
            _ => Self::Any,
        }
    }
}

/// Coercion hint for extracted values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Datatype {
    /// No coercion; the extracted scalar is used as-is.
    #[default]
    String,
    /// Parse as a signed integer.
    Integer,
    /// Parse as a timestamp, using the definition's date pattern.
    Datetime,
}

impl Datatype {
    /// Parse the relational-store representation. Unknown hints degrade to
    /// [`Datatype::String`].
    #[must_use]
    pub fn parse(s: Option<&str>) -> Self {
        match s {
            Some(v) if v.eq_ignore_ascii_case("integer") => Self::Integer,
            Some(v) if v.eq_ignore_ascii_case("datetime") => Self::Datetime,
            _ => Self::String,
        }
    }
}

/// One schema row: how to extract one field for one API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDefinition {
    /// Canonical attribute name (for Mandatory) or custom key (for Custom).
    pub field: String,
    /// Dot-separated path into the inbound JSON document.
    pub path: String,
    /// Mandatory or Custom.
    pub key_status: KeyStatus,
    /// Which message side this definition applies to.
    pub affinity: MessageAffinity,
    /// Coercion hint.
    pub datatype: Datatype,
    /// chrono format string for datetime coercion; `None` uses the default.
    pub date_pattern: Option<String>,
}

impl FieldDefinition {
    /// Shorthand for a Mandatory definition with no coercion.
    #[must_use]
    pub fn mandatory(field: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            path: path.into(),
            key_status: KeyStatus::Mandatory,
            affinity: MessageAffinity::Any,
            datatype: Datatype::String,
            date_pattern: None,
        }
    }

    /// Shorthand for a Custom definition with no coercion.
    #[must_use]
    pub fn custom(field: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            path: path.into(),
            key_status: KeyStatus::Custom,
            affinity: MessageAffinity::Any,
            datatype: Datatype::String,
            date_pattern: None,
        }
    }

    /// Builder-style affinity override.
    #[must_use]
    pub const fn with_affinity(mut self, affinity: MessageAffinity) -> Self {
        self.affinity = affinity;
        self
    }

    /// Builder-style datatype override.
    #[must_use]
    pub const fn with_datatype(mut self, datatype: Datatype) -> Self {
        self.datatype = datatype;
        self
    }

    /// Builder-style date pattern override.
    #[must_use]
    pub fn with_date_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.date_pattern = Some(pattern.into());
        self
    }
}

/// Errors from schema lookups.
#[derive(Error, Debug, Clone)]
pub enum SchemaError {
    /// The backing store could not be queried.
    #[error("Schema store unavailable: {0}")]
    StoreUnavailable(String),

    /// A row could not be mapped into a [`FieldDefinition`].
    #[error("Invalid schema row: {0}")]
    InvalidRow(String),
}

/// Serves the ordered field definitions for an API.
///
/// The correlator treats this as a pure lookup: an unknown API returns an
/// empty list, never an error. Providers do their own caching if they need
/// any; the engine calls this once per inbound message.
///
/// # Dyn Compatibility
///
/// Uses explicit `Pin<Box<dyn Future>>` returns instead of `async fn` so
/// the engine can hold `Arc<dyn FieldSchemaProvider>`.
pub trait FieldSchemaProvider: Send + Sync {
    /// Fetch the field definitions for `api_name`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::StoreUnavailable`] when the backing store
    /// cannot be reached. An API with no configuration is `Ok(vec![])`.
    fn fields_for_api(
        &self,
        api_name: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<FieldDefinition>, SchemaError>> + Send + '_>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_status_parsing_is_case_insensitive() {
        assert_eq!(KeyStatus::parse("Mandatory"), Some(KeyStatus::Mandatory));
        assert_eq!(KeyStatus::parse("CUSTOM"), Some(KeyStatus::Custom));
        assert_eq!(KeyStatus::parse("optional"), None);
    }

    #[test]
    fn affinity_defaults_to_any() {
        assert_eq!(MessageAffinity::parse(None), MessageAffinity::Any);
        assert_eq!(MessageAffinity::parse(Some("")), MessageAffinity::Any);
        assert_eq!(MessageAffinity::parse(Some("request")), MessageAffinity::Request);
        assert_eq!(MessageAffinity::parse(Some("RESPONSE")), MessageAffinity::Response);
        assert_eq!(MessageAffinity::parse(Some("sideways")), MessageAffinity::Any);
    }

    #[test]
    fn datatype_degrades_to_string() {
        assert_eq!(Datatype::parse(Some("integer")), Datatype::Integer);
        assert_eq!(Datatype::parse(Some("DateTime")), Datatype::Datetime);
        assert_eq!(Datatype::parse(Some("uuid")), Datatype::String);
        assert_eq!(Datatype::parse(None), Datatype::String);
    }
}
