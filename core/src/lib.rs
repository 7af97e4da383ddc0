//! # Smartlogger Core
//!
//! Core types and collaborator traits for the smartlogger audit correlation
//! pipeline.
//!
//! This crate defines the shared vocabulary of the system:
//!
//! - **Inbound events**: classification of raw broker messages into
//!   REQUEST / RESPONSE / SINGLE ([`event`])
//! - **Audit records**: the correlation unit that is ultimately indexed
//!   into the document store ([`record`])
//! - **Field schemas**: database-driven extraction definitions and the
//!   provider trait that serves them ([`schema`])
//! - **Collaborator traits**: the document-store sink ([`sink`]) and the
//!   raw broker producer ([`producer`])
//! - **Connection configuration**: broker connection rows parsed from the
//!   relational store ([`connection`])
//!
//! The correlation engine itself lives in `smartlogger-engine`; broker and
//! store adapters live in `smartlogger-redpanda`, `smartlogger-postgres`
//! and `smartlogger-elasticsearch`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod connection;
pub mod event;
pub mod producer;
pub mod record;
pub mod schema;
pub mod sink;

pub use event::{ClassifiedMessage, ClassifyError, MessageKind};
pub use producer::{ProducerError, RawProducer};
pub use record::{AuditRecord, CustomField};
pub use schema::{Datatype, FieldDefinition, FieldSchemaProvider, KeyStatus, MessageAffinity};
pub use sink::{AuditSink, SinkError};
