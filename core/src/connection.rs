//! Broker connection configuration.
//!
//! Each `data_source_connection` row in the relational store carries a
//! JSON `details` blob describing one Kafka connection: brokers, topic,
//! consumer group, optional SASL credentials, and the field configuration
//! used to resolve an API name out of raw messages before correlation.

use serde::{Deserialize, Serialize};

/// Parsed `details` blob of one broker connection row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDetails {
    /// Bootstrap broker addresses. The first entry is used.
    #[serde(default)]
    pub kafka_brokers: Vec<String>,

    /// Topic to consume audit events from.
    #[serde(default)]
    pub topic: Option<String>,

    /// Consumer group id for this connection.
    #[serde(default)]
    pub consumer_group_id: Option<String>,

    /// Kafka security protocol (e.g. `SASL_SSL`), passed through verbatim.
    #[serde(default)]
    pub security_protocol: Option<String>,

    /// SASL/PLAIN username.
    #[serde(default)]
    pub user_name: Option<String>,

    /// SASL/PLAIN password.
    #[serde(default)]
    pub password: Option<String>,

    /// Field mappings declared on the connection itself. Only the
    /// `APIName` mapping is consulted, to resolve the API name path for
    /// enrichment.
    #[serde(default)]
    pub fields: Vec<ConnectionField>,
}

/// One field mapping declared in a connection's `details` blob.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionField {
    /// Target field name (`APIName` is the one the enricher looks for).
    #[serde(default)]
    pub field: Option<String>,
    /// Dot-separated path into the message.
    #[serde(default)]
    pub path: Option<String>,
}

impl ConnectionDetails {
    /// The declared path for resolving the API name, if any.
    #[must_use]
    pub fn api_name_path(&self) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.field.as_deref() == Some("APIName"))
            .and_then(|f| f.path.as_deref())
    }

    /// A connection is usable once it names at least one broker and a topic.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.kafka_brokers.is_empty()
            && self.topic.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// One broker connection as loaded from the relational store.
#[derive(Debug, Clone)]
pub struct BrokerConnection {
    /// Human-readable connection name; keys all downstream records.
    pub connection_name: String,
    /// Parsed connection details.
    pub details: ConnectionDetails,
}
