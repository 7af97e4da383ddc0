//! Transaction correlation.
//!
//! The correlator owns all in-flight transaction state. Each correlation
//! id walks a small state machine:
//!
//! ```text
//! Absent ──REQUEST──▶ PendingRequest ──RESPONSE──▶ Finalized(matched)
//!   │                      │
//!   │                      └──deadline──▶ Finalized(timedOut)
//!   │
//!   └──RESPONSE──▶ OrphanResponse ──REQUEST──▶ Finalized(matched)
//!                       │
//!                       └──deadline──▶ Finalized(timedOut)
//! ```
//!
//! SINGLE messages bypass the state machine entirely and finalize on the
//! spot. Whatever the cause, emission funnels through one path, so the
//! sink sees exactly one record per correlation id.
//!
//! # Race discipline
//!
//! The in-flight map is sharded by correlation id; every
//! check-decide-mutate sequence for one id happens under its shard lock,
//! while other ids proceed in parallel. Locks are plain `std::sync::Mutex`
//! and are never held across an await; sink and schema calls happen
//! outside the critical section.
//!
//! Each in-flight entry carries an epoch drawn from a global counter, and
//! its deadline callback captures that epoch. A deadline that fires after
//! its entry was finalized (or replaced by a newer transaction under the
//! same id) finds a missing or newer-epoch entry and does nothing. The
//! policy for a counterpart arriving after finalization is *first writer
//! wins*: the late message is treated as a brand-new transaction under the
//! same id (a fresh pending request, or a fresh orphan response), never as
//! a mutation of the already-emitted record.

use crate::config::EngineConfig;
use crate::extract;
use crate::timeout::TimeoutScheduler;
use chrono::{TimeDelta, Utc};
use smartlogger_core::event::{self, ClassifiedMessage, MessageKind};
use smartlogger_core::record::AuditRecord;
use smartlogger_core::schema::{FieldDefinition, FieldSchemaProvider};
use smartlogger_core::sink::AuditSink;
use std::collections::hash_map::{DefaultHasher, Entry};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Maximum raw-content length reproduced in drop warnings.
const LOG_TRUNCATE_AT: usize = 512;

/// Why a record left the in-flight map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeCause {
    /// Both sides arrived within the window.
    Matched,
    /// The deadline fired before the counterpart arrived.
    TimedOut,
    /// A SINGLE message with no correlation semantics.
    Single,
}

impl FinalizeCause {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Matched => "matched",
            Self::TimedOut => "timed_out",
            Self::Single => "single",
        }
    }
}

/// Correlator occupancy counters, for operational logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrelatorStats {
    /// Transactions currently waiting for a counterpart or a deadline.
    pub in_flight: usize,
    /// Finalized records still held for retention bookkeeping.
    pub held_finalized: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxState {
    PendingRequest,
    OrphanResponse,
}

struct InFlight {
    record: AuditRecord,
    state: TxState,
    epoch: u64,
}

#[derive(Default)]
struct Shard {
    in_flight: HashMap<String, InFlight>,
    finalized: HashMap<String, AuditRecord>,
}

struct Inner {
    shards: Vec<Mutex<Shard>>,
    epoch: AtomicU64,
    schemas: Arc<dyn FieldSchemaProvider>,
    sink: Arc<dyn AuditSink>,
    scheduler: TimeoutScheduler,
    config: EngineConfig,
}

/// The transaction correlator.
///
/// Cheap to clone; clones share the same state. Worker tasks call
/// [`Correlator::process_raw`] (or [`Correlator::process`]) concurrently,
/// one call per inbound broker message.
#[derive(Clone)]
pub struct Correlator {
    inner: Arc<Inner>,
}

impl Correlator {
    /// Create a correlator and start its retention sweep.
    #[must_use]
    pub fn new(
        schemas: Arc<dyn FieldSchemaProvider>,
        sink: Arc<dyn AuditSink>,
        config: EngineConfig,
    ) -> Self {
        let shards = (0..config.shard_count)
            .map(|_| Mutex::new(Shard::default()))
            .collect();

        let correlator = Self {
            inner: Arc::new(Inner {
                shards,
                epoch: AtomicU64::new(0),
                schemas,
                sink,
                scheduler: TimeoutScheduler::new(),
                config,
            }),
        };

        tracing::info!(
            timeout_secs = correlator.inner.config.transaction_timeout.as_secs(),
            retention_secs = correlator.inner.config.cleanup_retention.as_secs(),
            shards = correlator.inner.config.shard_count,
            "Correlator started"
        );

        correlator.arm_cleanup();
        correlator
    }

    /// Classify and process one raw broker message.
    ///
    /// Every failure mode here is terminal for the message and logged: the
    /// broker considers it consumed regardless (at-most-once processing).
    pub async fn process_raw(&self, raw: &str) {
        match ClassifiedMessage::from_raw(raw) {
            Ok(message) => self.process(message).await,
            Err(e) => {
                metrics::counter!("smartlogger_messages_dropped_total", "reason" => "classify")
                    .increment(1);
                tracing::warn!(
                    error = %e,
                    content = event::truncate_for_log(raw, LOG_TRUNCATE_AT),
                    "Dropping unclassifiable message"
                );
            }
        }
    }

    /// Process one classified message.
    pub async fn process(&self, message: ClassifiedMessage) {
        let fields = match self.inner.schemas.fields_for_api(&message.api_name).await {
            Ok(fields) => fields,
            Err(e) => {
                metrics::counter!("smartlogger_messages_dropped_total", "reason" => "schema")
                    .increment(1);
                tracing::warn!(
                    api_name = %message.api_name,
                    error = %e,
                    "Dropping message, schema lookup failed"
                );
                return;
            }
        };

        if fields.is_empty() {
            metrics::counter!("smartlogger_messages_dropped_total", "reason" => "no_schema")
                .increment(1);
            tracing::warn!(
                api_name = %message.api_name,
                correlation_id = %message.correlation_id,
                "Dropping message, no field configuration for API"
            );
            return;
        }

        tracing::debug!(
            correlation_id = %message.correlation_id,
            api_name = %message.api_name,
            kind = %message.kind,
            connection = message.connection_name.as_deref().unwrap_or("-"),
            "Processing message"
        );

        match message.kind {
            MessageKind::Request => self.on_request(message, &fields).await,
            MessageKind::Response => self.on_response(message, &fields).await,
            MessageKind::Single => self.on_single(message, &fields).await,
        }
    }

    /// Current occupancy, summed across shards.
    ///
    /// # Panics
    ///
    /// Panics if a shard lock was poisoned, which only happens after a
    /// panic inside a critical section.
    #[must_use]
    #[allow(clippy::unwrap_used)] // Panics: poisoned shard lock is unrecoverable
    pub fn stats(&self) -> CorrelatorStats {
        let mut stats = CorrelatorStats {
            in_flight: 0,
            held_finalized: 0,
        };
        for shard in &self.inner.shards {
            let shard = shard.lock().unwrap();
            stats.in_flight += shard.in_flight.len();
            stats.held_finalized += shard.finalized.len();
        }
        stats
    }

    /// Stop accepting deadline submissions and release parked timers.
    ///
    /// In-flight records are abandoned; nothing is persisted on shutdown.
    pub fn shutdown(&self) {
        self.inner.scheduler.shutdown();
        let stats = self.stats();
        tracing::info!(
            abandoned = stats.in_flight,
            "Correlator shut down"
        );
    }

    async fn on_request(&self, message: ClassifiedMessage, fields: &[FieldDefinition]) {
        let ClassifiedMessage {
            correlation_id,
            api_name,
            body,
            ..
        } = message;

        let mut armed_epoch = None;
        let mut matched = None;
        {
            #[allow(clippy::unwrap_used)] // Panics: poisoned shard lock is unrecoverable
            let mut shard = self.shard_for(&correlation_id).lock().unwrap();
            match shard.in_flight.entry(correlation_id.clone()) {
                Entry::Vacant(slot) => {
                    let mut record = AuditRecord::new(&correlation_id);
                    record.api_name = Some(api_name);
                    extract::apply_schema(&mut record, &body, fields, MessageKind::Request);
                    extract::store_payload(&mut record, &body, MessageKind::Request);

                    let epoch = self.inner.epoch.fetch_add(1, Ordering::Relaxed);
                    slot.insert(InFlight {
                        record,
                        state: TxState::PendingRequest,
                        epoch,
                    });
                    armed_epoch = Some(epoch);
                }
                Entry::Occupied(mut slot) => match slot.get().state {
                    TxState::OrphanResponse => {
                        // The response got here first; this request completes it.
                        let mut flight = slot.remove();
                        extract::apply_schema(&mut flight.record, &body, fields, MessageKind::Request);
                        extract::store_payload(&mut flight.record, &body, MessageKind::Request);
                        flight.record.is_complete = true;
                        matched = Some(flight.record);
                    }
                    TxState::PendingRequest => {
                        // Duplicate request: refresh the pending entry in
                        // place, keep the original deadline.
                        tracing::debug!(
                            correlation_id = %correlation_id,
                            "Duplicate REQUEST, refreshing pending transaction"
                        );
                        let flight = slot.get_mut();
                        extract::apply_schema(&mut flight.record, &body, fields, MessageKind::Request);
                        extract::store_payload(&mut flight.record, &body, MessageKind::Request);
                    }
                },
            }
        }

        if let Some(epoch) = armed_epoch {
            metrics::gauge!("smartlogger_in_flight_transactions").increment(1.0);
            tracing::debug!(
                correlation_id = %correlation_id,
                "REQUEST stored, waiting for RESPONSE"
            );
            self.arm_deadline(correlation_id, epoch);
        } else if let Some(record) = matched {
            metrics::gauge!("smartlogger_in_flight_transactions").decrement(1.0);
            self.emit(record, FinalizeCause::Matched).await;
        }
    }

    async fn on_response(&self, message: ClassifiedMessage, fields: &[FieldDefinition]) {
        let ClassifiedMessage {
            correlation_id,
            api_name,
            body,
            ..
        } = message;

        let mut armed_epoch = None;
        let mut matched = None;
        {
            #[allow(clippy::unwrap_used)] // Panics: poisoned shard lock is unrecoverable
            let mut shard = self.shard_for(&correlation_id).lock().unwrap();
            match shard.in_flight.entry(correlation_id.clone()) {
                Entry::Vacant(slot) => {
                    // Orphaned response: hold it under its own deadline so a
                    // late request can still match.
                    let mut record = AuditRecord::new(&correlation_id);
                    record.api_name = Some(api_name);
                    extract::apply_schema(&mut record, &body, fields, MessageKind::Response);
                    extract::store_payload(&mut record, &body, MessageKind::Response);

                    let epoch = self.inner.epoch.fetch_add(1, Ordering::Relaxed);
                    slot.insert(InFlight {
                        record,
                        state: TxState::OrphanResponse,
                        epoch,
                    });
                    armed_epoch = Some(epoch);
                }
                Entry::Occupied(mut slot) => match slot.get().state {
                    TxState::PendingRequest => {
                        let mut flight = slot.remove();
                        extract::apply_schema(&mut flight.record, &body, fields, MessageKind::Response);
                        extract::store_payload(&mut flight.record, &body, MessageKind::Response);
                        flight.record.is_complete = true;
                        matched = Some(flight.record);
                    }
                    TxState::OrphanResponse => {
                        tracing::debug!(
                            correlation_id = %correlation_id,
                            "Duplicate RESPONSE, refreshing orphan"
                        );
                        let flight = slot.get_mut();
                        extract::apply_schema(&mut flight.record, &body, fields, MessageKind::Response);
                        extract::store_payload(&mut flight.record, &body, MessageKind::Response);
                    }
                },
            }
        }

        if let Some(epoch) = armed_epoch {
            metrics::gauge!("smartlogger_in_flight_transactions").increment(1.0);
            tracing::info!(
                correlation_id = %correlation_id,
                "Orphaned RESPONSE stored, waiting for REQUEST"
            );
            self.arm_deadline(correlation_id, epoch);
        } else if let Some(record) = matched {
            metrics::gauge!("smartlogger_in_flight_transactions").decrement(1.0);
            self.emit(record, FinalizeCause::Matched).await;
        }
    }

    async fn on_single(&self, message: ClassifiedMessage, fields: &[FieldDefinition]) {
        let mut record = AuditRecord::new(&message.correlation_id);
        record.api_name = Some(message.api_name);
        extract::apply_schema(&mut record, &message.body, fields, MessageKind::Single);
        extract::store_payload(&mut record, &message.body, MessageKind::Single);
        record.is_complete = true;
        self.emit(record, FinalizeCause::Single).await;
    }

    /// Arm the one-shot deadline for a freshly stored transaction.
    fn arm_deadline(&self, correlation_id: String, epoch: u64) {
        let correlator = self.clone();
        self.inner.scheduler.schedule(
            self.inner.config.transaction_timeout,
            async move {
                correlator.on_deadline(&correlation_id, epoch).await;
            },
        );
    }

    /// Finalize a transaction whose deadline fired before its counterpart.
    ///
    /// A stale deadline (the entry is gone, or was replaced by a newer
    /// transaction under the same id) is a silent no-op.
    async fn on_deadline(&self, correlation_id: &str, epoch: u64) {
        let expired = {
            #[allow(clippy::unwrap_used)] // Panics: poisoned shard lock is unrecoverable
            let mut shard = self.shard_for(correlation_id).lock().unwrap();
            match shard.in_flight.entry(correlation_id.to_string()) {
                Entry::Occupied(slot) if slot.get().epoch == epoch => Some(slot.remove()),
                _ => None,
            }
        };

        let Some(mut flight) = expired else {
            tracing::debug!(correlation_id, "Stale deadline, transaction already finalized");
            return;
        };

        metrics::gauge!("smartlogger_in_flight_transactions").decrement(1.0);
        tracing::info!(
            correlation_id,
            state = ?flight.state,
            "Deadline reached, finalizing with available data"
        );
        flight.record.is_complete = false;
        self.emit(flight.record, FinalizeCause::TimedOut).await;
    }

    /// The single emission path: every finalized record goes through here
    /// exactly once, whatever the cause.
    async fn emit(&self, mut record: AuditRecord, cause: FinalizeCause) {
        let document_id = record
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        record.id = Some(document_id.clone());

        {
            #[allow(clippy::unwrap_used)] // Panics: poisoned shard lock is unrecoverable
            let mut shard = self.shard_for(&record.correlation_id).lock().unwrap();
            shard
                .finalized
                .insert(record.correlation_id.clone(), record.clone());
        }

        metrics::counter!("smartlogger_records_finalized_total", "cause" => cause.as_str())
            .increment(1);

        if let Err(e) = self.inner.sink.upsert(&document_id, &record).await {
            // At-most-once toward the sink: the record is lost from the
            // index's perspective, and that is the documented trade-off.
            metrics::counter!("smartlogger_sink_failures_total").increment(1);
            tracing::error!(
                correlation_id = %record.correlation_id,
                document_id = %document_id,
                error = %e,
                "Failed to index finalized record, dropping"
            );
            return;
        }

        tracing::info!(
            correlation_id = %record.correlation_id,
            document_id = %document_id,
            cause = cause.as_str(),
            complete = record.is_complete,
            "Indexed finalized record"
        );
    }

    /// Self-rescheduling retention sweep, riding on the same scheduler as
    /// the transaction deadlines so it obeys shutdown.
    fn arm_cleanup(&self) {
        let correlator = self.clone();
        self.inner.scheduler.schedule(
            self.inner.config.cleanup_retention,
            async move {
                let removed = correlator.sweep_finalized();
                if removed > 0 {
                    tracing::info!(removed, "Cleaned up retained finalized records");
                }
                correlator.arm_cleanup();
            },
        );
    }

    /// Drop retained finalized records older than the retention window.
    fn sweep_finalized(&self) -> usize {
        let Ok(retention) = TimeDelta::from_std(self.inner.config.cleanup_retention) else {
            return 0;
        };
        let cutoff = Utc::now().naive_utc() - retention;

        let mut removed = 0;
        for shard in &self.inner.shards {
            #[allow(clippy::unwrap_used)] // Panics: poisoned shard lock is unrecoverable
            let mut shard = shard.lock().unwrap();
            let before = shard.finalized.len();
            shard.finalized.retain(|_, record| record.indexed_at >= cutoff);
            removed += before - shard.finalized.len();
        }
        removed
    }

    fn shard_for(&self, correlation_id: &str) -> &Mutex<Shard> {
        let mut hasher = DefaultHasher::new();
        correlation_id.hash(&mut hasher);
        let index = (hasher.finish() as usize) % self.inner.shards.len();
        &self.inner.shards[index]
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)] // Panics: test failures

    use super::*;
    use smartlogger_testing::mocks::{CapturingSink, StaticSchemaProvider};
    use std::time::Duration;

    fn correlator_with(provider: StaticSchemaProvider, sink: &Arc<CapturingSink>) -> Correlator {
        Correlator::new(
            Arc::new(provider),
            Arc::clone(sink) as _,
            EngineConfig::builder()
                .transaction_timeout(Duration::from_secs(60))
                .build(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_drops_only_aged_out_records() {
        let sink = Arc::new(CapturingSink::new());
        let correlator = correlator_with(StaticSchemaProvider::default(), &sink);

        let fresh = AuditRecord::new("fresh");
        let mut stale = AuditRecord::new("stale");
        stale.indexed_at = Utc::now().naive_utc() - TimeDelta::try_seconds(600).unwrap();

        {
            let mut shard = correlator.shard_for("fresh").lock().unwrap();
            shard.finalized.insert("fresh".to_string(), fresh);
        }
        {
            let mut shard = correlator.shard_for("stale").lock().unwrap();
            shard.finalized.insert("stale".to_string(), stale);
        }

        assert_eq!(correlator.sweep_finalized(), 1);
        assert_eq!(correlator.stats().held_finalized, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stats_count_in_flight_and_held() {
        let sink = Arc::new(CapturingSink::new());
        let provider =
            StaticSchemaProvider::default().with_api("grn-api", vec![FieldDefinition::mandatory(
                "ResourcePath",
                "metadata.endpoint",
            )]);
        let correlator = correlator_with(provider, &sink);

        let body = serde_json::json!({
            "request_id": "abc",
            "extractedApiName": "grn-api",
            "log_type": "REQUEST",
            "metadata": { "endpoint": "/grn" }
        });
        correlator
            .process(ClassifiedMessage::classify(body).unwrap())
            .await;

        let stats = correlator.stats();
        assert_eq!(stats.in_flight, 1);
        assert_eq!(stats.held_finalized, 0);
    }
}
