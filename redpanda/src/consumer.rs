//! Per-connection consumer loop.
//!
//! Each configured broker connection gets one `StreamConsumer` task. The
//! task enriches every message for its connection and hands it to the
//! pipeline through [`EnrichedMessageHandler`], then commits the offset
//! whatever the handling outcome. Messages the pipeline cannot use are
//! consumed and logged, never redelivered.

use futures::StreamExt;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use smartlogger_core::connection::BrokerConnection;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::enrich;

/// Errors starting a consumer.
#[derive(Error, Debug)]
pub enum ConsumerError {
    /// The connection row is missing brokers or a topic.
    #[error("Connection '{0}' has no usable brokers/topic")]
    InvalidConnection(String),

    /// The underlying client rejected the configuration.
    #[error("Failed to create consumer for '{connection}': {reason}")]
    ClientCreation {
        /// Connection name.
        connection: String,
        /// Client-reported reason.
        reason: String,
    },

    /// Subscribing to the connection's topic failed.
    #[error("Failed to subscribe consumer for '{connection}': {reason}")]
    Subscription {
        /// Connection name.
        connection: String,
        /// Client-reported reason.
        reason: String,
    },
}

/// Receives enriched messages from the consumer loops.
///
/// Implemented by the correlation pipeline's entry point. Handling must not
/// fail: anything unusable inside the message is the handler's to log and
/// drop, and the consumer commits the offset either way.
///
/// # Dyn Compatibility
///
/// Uses explicit `Pin<Box<dyn Future>>` returns instead of `async fn` so
/// consumer tasks can hold `Arc<dyn EnrichedMessageHandler>`.
pub trait EnrichedMessageHandler: Send + Sync {
    /// Handle one enriched message. `key` is the broker message key, when
    /// present and valid UTF-8.
    fn handle(
        &self,
        key: Option<&str>,
        enriched: &str,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// Owns one consumer task per broker connection.
pub struct ConsumerManager {
    shutdown_tx: watch::Sender<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Default for ConsumerManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsumerManager {
    /// Create a manager with no consumers yet.
    #[must_use]
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            shutdown_tx,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Start one consumer task for `connection`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConsumerError`] when the connection row is unusable or
    /// the client cannot be created or subscribed. Failures here are per
    /// connection: the caller keeps going with the connections that did
    /// start (matching the one-bad-row-does-not-stop-ingestion posture of
    /// the connection loader).
    ///
    /// # Panics
    ///
    /// Panics if the interior handle list lock was poisoned.
    #[allow(clippy::unwrap_used)] // Panics: poisoned handle-list lock is unrecoverable
    pub fn spawn(
        &self,
        connection: BrokerConnection,
        handler: Arc<dyn EnrichedMessageHandler>,
    ) -> Result<(), ConsumerError> {
        if !connection.details.is_valid() {
            return Err(ConsumerError::InvalidConnection(
                connection.connection_name.clone(),
            ));
        }

        let consumer = create_consumer(&connection)?;
        // is_valid() guarantees the topic is present.
        let topic = connection.details.topic.clone().ok_or_else(|| {
            ConsumerError::InvalidConnection(connection.connection_name.clone())
        })?;

        consumer
            .subscribe(&[topic.as_str()])
            .map_err(|e| ConsumerError::Subscription {
                connection: connection.connection_name.clone(),
                reason: e.to_string(),
            })?;

        tracing::info!(
            connection = %connection.connection_name,
            topic = %topic,
            brokers = ?connection.details.kafka_brokers,
            "Consumer started"
        );

        let shutdown_rx = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(consume_loop(consumer, connection, handler, shutdown_rx));
        self.handles.lock().unwrap().push(handle);
        Ok(())
    }

    /// Signal every consumer task to stop and wait for them to exit.
    ///
    /// # Panics
    ///
    /// Panics if the interior handle list lock was poisoned.
    #[allow(clippy::unwrap_used)] // Panics: poisoned handle-list lock is unrecoverable
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        let handles: Vec<_> = self.handles.lock().unwrap().drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Consumer task did not exit cleanly");
            }
        }
        tracing::info!("All consumers stopped");
    }
}

fn create_consumer(connection: &BrokerConnection) -> Result<StreamConsumer, ConsumerError> {
    let details = &connection.details;
    let group_id = details
        .consumer_group_id
        .clone()
        .unwrap_or_else(|| format!("smartlogger-{}", connection.connection_name));

    let mut config = ClientConfig::new();
    config
        .set("bootstrap.servers", details.kafka_brokers.join(","))
        .set("group.id", &group_id)
        .set("enable.auto.commit", "false")
        .set("auto.offset.reset", "latest")
        .set("session.timeout.ms", "6000")
        .set("enable.partition.eof", "false");

    if let Some(protocol) = &details.security_protocol {
        config.set("security.protocol", protocol);
    }
    if let (Some(user), Some(password)) = (&details.user_name, &details.password) {
        config
            .set("sasl.mechanism", "PLAIN")
            .set("sasl.username", user)
            .set("sasl.password", password);
    }

    config.create().map_err(|e| ConsumerError::ClientCreation {
        connection: connection.connection_name.clone(),
        reason: e.to_string(),
    })
}

async fn consume_loop(
    consumer: StreamConsumer,
    connection: BrokerConnection,
    handler: Arc<dyn EnrichedMessageHandler>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut stream = consumer.stream();

    loop {
        let message = tokio::select! {
            msg = stream.next() => msg,
            _ = shutdown_rx.changed() => {
                tracing::info!(connection = %connection.connection_name, "Consumer shutting down");
                break;
            }
        };

        let Some(message) = message else {
            tracing::warn!(connection = %connection.connection_name, "Consumer stream ended");
            break;
        };

        let message = match message {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(
                    connection = %connection.connection_name,
                    error = %e,
                    "Transport error receiving message"
                );
                continue;
            }
        };

        match message.payload().map(std::str::from_utf8) {
            Some(Ok(raw)) => {
                let key = message.key().and_then(|k| std::str::from_utf8(k).ok());
                match enrich::enrich(raw, &connection) {
                    Ok(enriched) => handler.handle(key, &enriched).await,
                    Err(e) => {
                        tracing::warn!(
                            connection = %connection.connection_name,
                            error = %e,
                            "Dropping unparseable message"
                        );
                    }
                }
            }
            Some(Err(_)) => {
                tracing::warn!(
                    connection = %connection.connection_name,
                    "Dropping message with non-UTF-8 payload"
                );
            }
            None => {
                tracing::warn!(
                    connection = %connection.connection_name,
                    "Dropping message with no payload"
                );
            }
        }

        // Commit after handling, whatever the outcome: dropped messages are
        // consumed too.
        if let Err(e) = consumer.commit_message(&message, CommitMode::Async) {
            tracing::warn!(
                connection = %connection.connection_name,
                topic = message.topic(),
                partition = message.partition(),
                offset = message.offset(),
                error = %e,
                "Failed to commit offset (message may be redelivered)"
            );
        }
    }
}
