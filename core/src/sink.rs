//! The document-store sink contract.
//!
//! The engine consumes this trait; `smartlogger-elasticsearch` implements
//! it. Writes are idempotent upserts keyed by document id, and failures are
//! caught and logged by the engine's emit path: at-most-once toward the
//! sink.

use crate::record::AuditRecord;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors from sink operations.
#[derive(Error, Debug, Clone)]
pub enum SinkError {
    /// The store could not be reached.
    #[error("Sink unreachable: {0}")]
    Unreachable(String),

    /// The store answered with a status the client does not accept.
    #[error("Unexpected sink status {status}: {body}")]
    UnexpectedStatus {
        /// HTTP-level status code.
        status: u16,
        /// Response body, truncated by the implementation.
        body: String,
    },

    /// The record could not be serialized into a document.
    #[error("Failed to serialize record: {0}")]
    Serialization(String),
}

/// Idempotent upsert of finalized audit records.
///
/// # Dyn Compatibility
///
/// Uses explicit `Pin<Box<dyn Future>>` returns instead of `async fn` so
/// the engine can hold `Arc<dyn AuditSink>`.
pub trait AuditSink: Send + Sync {
    /// Upsert `record` under `document_id`. Same id overwrites prior content.
    ///
    /// # Errors
    ///
    /// Returns a [`SinkError`] on any transport or serialization failure.
    /// Callers log and move on; the record is not retried.
    fn upsert(
        &self,
        document_id: &str,
        record: &AuditRecord,
    ) -> Pin<Box<dyn Future<Output = Result<(), SinkError>> + Send + '_>>;
}
