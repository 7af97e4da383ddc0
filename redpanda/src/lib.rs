//! Kafka-compatible broker plumbing for the smartlogger pipeline.
//!
//! This crate owns everything that talks the Kafka protocol, via rdkafka
//! (so it works against Redpanda, Apache Kafka, MSK, and friends):
//!
//! - [`producer`]: a [`RawProducer`](smartlogger_core::producer::RawProducer)
//!   implementation over `FutureProducer`, used by the engine's retrying
//!   forwarder for the secondary raw topic
//! - [`consumer`]: one consumer task per configured broker connection,
//!   enriching each message and handing it to the correlation pipeline
//! - [`enrich`]: the pure message-enrichment step (connection name and
//!   API name injection)
//!
//! # Delivery semantics
//!
//! Consumers commit after handling, whatever the handling outcome: a message
//! the pipeline drops (malformed, unknown API) is still consumed. The
//! pipeline is at-most-once end to end and relies on the upstream audit
//! producers for durability.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod consumer;
pub mod enrich;
pub mod producer;

pub use consumer::{ConsumerError, ConsumerManager, EnrichedMessageHandler};
pub use producer::{KafkaRawProducer, KafkaRawProducerBuilder, ProducerBuildError};
