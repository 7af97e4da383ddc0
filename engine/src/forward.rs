//! Bounded-retry relay of raw messages to a secondary broker topic.
//!
//! The forwarder fans the unmodified inbound message out for independent
//! processing and audit trails. Delivery is best-effort: a fixed number of
//! synchronous attempts with a fixed backoff between them, then a logged
//! give-up. Callers never receive a failure signal and there is no
//! dead-letter queue: the secondary pipeline is advisory, not
//! transactional.

use smartlogger_core::producer::RawProducer;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// Retry policy for the forwarder.
///
/// # Default Values
///
/// - `max_attempts`: 3
/// - `backoff`: 1000 ms, fixed (not exponential)
#[derive(Debug, Clone)]
pub struct ForwardPolicy {
    /// Total number of send attempts, including the first.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub backoff: Duration,
}

impl Default for ForwardPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(1000),
        }
    }
}

/// Relays raw keyed messages to one destination topic with bounded retries.
pub struct RetryingForwarder {
    producer: Arc<dyn RawProducer>,
    topic: String,
    policy: ForwardPolicy,
}

impl RetryingForwarder {
    /// Create a forwarder for `topic` with the default policy.
    #[must_use]
    pub fn new(producer: Arc<dyn RawProducer>, topic: impl Into<String>) -> Self {
        Self::with_policy(producer, topic, ForwardPolicy::default())
    }

    /// Create a forwarder with an explicit retry policy.
    #[must_use]
    pub fn with_policy(
        producer: Arc<dyn RawProducer>,
        topic: impl Into<String>,
        policy: ForwardPolicy,
    ) -> Self {
        Self {
            producer,
            topic: topic.into(),
            policy,
        }
    }

    /// Forward one message, blocking the caller until the broker
    /// acknowledges an attempt or the policy is exhausted.
    ///
    /// Exhaustion is logged and swallowed; the message is dropped.
    pub async fn forward(&self, key: &str, body: &str) {
        for attempt in 1..=self.policy.max_attempts {
            match self.producer.send(&self.topic, key, body).await {
                Ok(()) => {
                    if attempt > 1 {
                        tracing::info!(
                            topic = %self.topic,
                            attempt,
                            "Forwarded message after retry"
                        );
                    } else {
                        tracing::debug!(topic = %self.topic, "Forwarded message");
                    }
                    metrics::counter!("smartlogger_forwarded_total").increment(1);
                    return;
                }
                Err(e) => {
                    tracing::warn!(
                        topic = %self.topic,
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        error = %e,
                        "Forward attempt failed"
                    );
                    if attempt < self.policy.max_attempts {
                        sleep(self.policy.backoff).await;
                    }
                }
            }
        }

        metrics::counter!("smartlogger_forward_exhausted_total").increment(1);
        tracing::error!(
            topic = %self.topic,
            attempts = self.policy.max_attempts,
            "Giving up forwarding message after exhausting retries"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smartlogger_testing::mocks::ScriptedProducer;

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_first_attempt_without_backoff() {
        let producer = Arc::new(ScriptedProducer::failing_first(0));
        let forwarder = RetryingForwarder::new(Arc::clone(&producer) as _, "raw-data");

        forwarder.forward("k", "body").await;

        assert_eq!(producer.attempts(), 1);
        assert_eq!(producer.sent(), vec![("raw-data".to_string(), "k".to_string(), "body".to_string())]);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_with_fixed_backoff_then_succeeds() {
        // Fail twice, succeed on the third of three attempts: exactly
        // three sends, two backoff sleeps, and no error escapes.
        let producer = Arc::new(ScriptedProducer::failing_first(2));
        let forwarder = RetryingForwarder::with_policy(
            Arc::clone(&producer) as _,
            "raw-data",
            ForwardPolicy::default(),
        );

        let started = tokio::time::Instant::now();
        forwarder.forward("k", "body").await;

        assert_eq!(producer.attempts(), 3);
        // Two fixed 1000 ms backoffs under paused time.
        assert_eq!(started.elapsed(), Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_silently_after_exhausting_attempts() {
        let producer = Arc::new(ScriptedProducer::failing_first(u32::MAX));
        let forwarder = RetryingForwarder::with_policy(
            Arc::clone(&producer) as _,
            "raw-data",
            ForwardPolicy {
                max_attempts: 3,
                backoff: Duration::from_millis(10),
            },
        );

        forwarder.forward("k", "body").await;

        assert_eq!(producer.attempts(), 3);
        assert!(producer.sent().is_empty());
    }
}
