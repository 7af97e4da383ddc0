//! Kafka-backed implementation of the raw producer contract.

use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use smartlogger_core::producer::{ProducerError, RawProducer};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// Errors building a [`KafkaRawProducer`].
#[derive(Error, Debug)]
pub enum ProducerBuildError {
    /// No brokers configured.
    #[error("Brokers not configured")]
    MissingBrokers,

    /// The underlying client rejected the configuration.
    #[error("Failed to create producer: {0}")]
    ClientCreation(String),
}

/// A [`RawProducer`] over rdkafka's `FutureProducer`.
///
/// Sends are awaited through to broker acknowledgment so the forwarder's
/// retry accounting sees real outcomes, not enqueue successes.
///
/// # Example
///
/// ```no_run
/// use smartlogger_redpanda::KafkaRawProducer;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let producer = KafkaRawProducer::builder()
///     .brokers("localhost:9092")
///     .acks("all")
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct KafkaRawProducer {
    producer: FutureProducer,
    timeout: Duration,
}

impl KafkaRawProducer {
    /// Create a producer with default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ProducerBuildError::ClientCreation`] when the client
    /// configuration is rejected.
    pub fn new(brokers: &str) -> Result<Self, ProducerBuildError> {
        Self::builder().brokers(brokers).build()
    }

    /// Create a new builder.
    #[must_use]
    pub fn builder() -> KafkaRawProducerBuilder {
        KafkaRawProducerBuilder::default()
    }
}

/// Builder for [`KafkaRawProducer`].
#[derive(Default)]
pub struct KafkaRawProducerBuilder {
    brokers: Option<String>,
    acks: Option<String>,
    compression: Option<String>,
    timeout: Option<Duration>,
}

impl KafkaRawProducerBuilder {
    /// Set the comma-separated broker addresses.
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Set the acknowledgment mode: `"0"`, `"1"` or `"all"`. Default: `"1"`.
    #[must_use]
    pub fn acks(mut self, acks: impl Into<String>) -> Self {
        self.acks = Some(acks.into());
        self
    }

    /// Set the compression codec. Default: `"none"`.
    #[must_use]
    pub fn compression(mut self, compression: impl Into<String>) -> Self {
        self.compression = Some(compression.into());
        self
    }

    /// Set the per-send timeout. Default: 5 seconds.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the producer.
    ///
    /// # Errors
    ///
    /// Returns [`ProducerBuildError::MissingBrokers`] when no brokers were
    /// set, or [`ProducerBuildError::ClientCreation`] when the client
    /// rejects the configuration.
    pub fn build(self) -> Result<KafkaRawProducer, ProducerBuildError> {
        let brokers = self.brokers.ok_or(ProducerBuildError::MissingBrokers)?;

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &brokers)
            .set("message.timeout.ms", "5000")
            .set("acks", self.acks.as_deref().unwrap_or("1"))
            .set(
                "compression.type",
                self.compression.as_deref().unwrap_or("none"),
            )
            .create()
            .map_err(|e| ProducerBuildError::ClientCreation(e.to_string()))?;

        tracing::info!(
            brokers = %brokers,
            acks = self.acks.as_deref().unwrap_or("1"),
            compression = self.compression.as_deref().unwrap_or("none"),
            "Kafka raw producer created"
        );

        Ok(KafkaRawProducer {
            producer,
            timeout: self.timeout.unwrap_or(Duration::from_secs(5)),
        })
    }
}

impl RawProducer for KafkaRawProducer {
    fn send(
        &self,
        topic: &str,
        key: &str,
        body: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), ProducerError>> + Send + '_>> {
        let topic = topic.to_string();
        let key = key.to_string();
        let body = body.to_string();
        let timeout = self.timeout;

        Box::pin(async move {
            let record = FutureRecord::to(&topic).payload(&body).key(&key);

            match self.producer.send(record, Timeout::After(timeout)).await {
                Ok((partition, offset)) => {
                    tracing::debug!(
                        topic = %topic,
                        partition,
                        offset,
                        "Raw message delivered"
                    );
                    Ok(())
                }
                Err((kafka_error, _)) => Err(ProducerError::SendFailed {
                    topic,
                    reason: kafka_error.to_string(),
                }),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn producer_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<KafkaRawProducer>();
        assert_sync::<KafkaRawProducer>();
    }

    #[test]
    fn build_without_brokers_is_rejected() {
        let result = KafkaRawProducer::builder().build();
        assert!(matches!(result, Err(ProducerBuildError::MissingBrokers)));
    }
}
