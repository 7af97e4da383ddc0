//! The raw broker producer contract.
//!
//! The retrying forwarder relays raw message strings to a secondary topic
//! through this trait; `smartlogger-redpanda` implements it with a Kafka
//! producer. Payloads are opaque strings; the forwarder never inspects
//! them.

use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors from raw broker sends.
#[derive(Error, Debug, Clone)]
pub enum ProducerError {
    /// The broker rejected or never acknowledged the send.
    #[error("Send to topic '{topic}' failed: {reason}")]
    SendFailed {
        /// The destination topic.
        topic: String,
        /// Broker-reported reason.
        reason: String,
    },
}

/// Sends raw keyed string messages to a broker topic.
///
/// Sends are acknowledged: the returned future resolves only once the
/// broker has accepted the message or the attempt has failed.
///
/// # Dyn Compatibility
///
/// Uses explicit `Pin<Box<dyn Future>>` returns instead of `async fn` so
/// the forwarder can hold `Arc<dyn RawProducer>`.
pub trait RawProducer: Send + Sync {
    /// Send `body` under `key` to `topic` and wait for the acknowledgment.
    ///
    /// # Errors
    ///
    /// Returns [`ProducerError::SendFailed`] when the broker does not
    /// acknowledge the message.
    fn send(
        &self,
        topic: &str,
        key: &str,
        body: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), ProducerError>> + Send + '_>>;
}
