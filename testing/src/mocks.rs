//! Test doubles for the pipeline's trait seams.

use smartlogger_core::producer::{ProducerError, RawProducer};
use smartlogger_core::record::AuditRecord;
use smartlogger_core::schema::{FieldDefinition, FieldSchemaProvider, SchemaError};
use smartlogger_core::sink::{AuditSink, SinkError};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// A [`RawProducer`] that fails its first N sends, then succeeds forever.
///
/// Records every attempt and every successful send.
#[derive(Debug, Default)]
pub struct ScriptedProducer {
    failures_remaining: AtomicU32,
    attempts: AtomicU32,
    sent: Mutex<Vec<(String, String, String)>>,
}

impl ScriptedProducer {
    /// A producer whose first `failures` sends return an error.
    #[must_use]
    pub fn failing_first(failures: u32) -> Self {
        Self {
            failures_remaining: AtomicU32::new(failures),
            attempts: AtomicU32::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Total send attempts, failed ones included.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Successful sends, as `(topic, key, body)` triples.
    ///
    /// # Panics
    ///
    /// Panics if the interior lock was poisoned.
    #[must_use]
    #[allow(clippy::unwrap_used)] // Panics: poisoned lock in a test double
    pub fn sent(&self) -> Vec<(String, String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

impl RawProducer for ScriptedProducer {
    fn send(
        &self,
        topic: &str,
        key: &str,
        body: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), ProducerError>> + Send + '_>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let outcome = if self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            Err(ProducerError::SendFailed {
                topic: topic.to_string(),
                reason: "scripted failure".to_string(),
            })
        } else {
            #[allow(clippy::unwrap_used)] // Panics: poisoned lock in a test double
            self.sent
                .lock()
                .unwrap()
                .push((topic.to_string(), key.to_string(), body.to_string()));
            Ok(())
        };
        Box::pin(async move { outcome })
    }
}

/// An [`AuditSink`] that captures every upsert in memory.
#[derive(Debug, Default)]
pub struct CapturingSink {
    rejecting: bool,
    upserts: Mutex<Vec<(String, AuditRecord)>>,
}

impl CapturingSink {
    /// A sink that accepts and records every upsert.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that rejects every upsert with [`SinkError::Unreachable`],
    /// still recording nothing.
    #[must_use]
    pub fn rejecting() -> Self {
        Self {
            rejecting: true,
            upserts: Mutex::new(Vec::new()),
        }
    }

    /// Accepted upserts, in arrival order, as `(document_id, record)`.
    ///
    /// # Panics
    ///
    /// Panics if the interior lock was poisoned.
    #[must_use]
    #[allow(clippy::unwrap_used)] // Panics: poisoned lock in a test double
    pub fn upserts(&self) -> Vec<(String, AuditRecord)> {
        self.upserts.lock().unwrap().clone()
    }

    /// Number of accepted upserts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.upserts().len()
    }

    /// Whether no upsert was accepted yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for CapturingSink {
    fn upsert(
        &self,
        document_id: &str,
        record: &AuditRecord,
    ) -> Pin<Box<dyn Future<Output = Result<(), SinkError>> + Send + '_>> {
        let outcome = if self.rejecting {
            Err(SinkError::Unreachable("rejecting sink".to_string()))
        } else {
            #[allow(clippy::unwrap_used)] // Panics: poisoned lock in a test double
            self.upserts
                .lock()
                .unwrap()
                .push((document_id.to_string(), record.clone()));
            Ok(())
        };
        Box::pin(async move { outcome })
    }
}

/// A [`FieldSchemaProvider`] backed by a fixed in-memory map.
///
/// Unknown APIs resolve to an empty field list, which the engine treats as
/// "no configuration, drop the message".
#[derive(Debug, Default)]
pub struct StaticSchemaProvider {
    schemas: HashMap<String, Vec<FieldDefinition>>,
    unavailable: bool,
}

impl StaticSchemaProvider {
    /// Register a field list for an API name.
    #[must_use]
    pub fn with_api(mut self, api_name: impl Into<String>, fields: Vec<FieldDefinition>) -> Self {
        self.schemas.insert(api_name.into(), fields);
        self
    }

    /// A provider whose every lookup fails with [`SchemaError::StoreUnavailable`].
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            schemas: HashMap::new(),
            unavailable: true,
        }
    }
}

impl FieldSchemaProvider for StaticSchemaProvider {
    fn fields_for_api(
        &self,
        api_name: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<FieldDefinition>, SchemaError>> + Send + '_>> {
        let outcome = if self.unavailable {
            Err(SchemaError::StoreUnavailable(
                "static provider configured unavailable".to_string(),
            ))
        } else {
            Ok(self.schemas.get(api_name).cloned().unwrap_or_default())
        };
        Box::pin(async move { outcome })
    }
}
