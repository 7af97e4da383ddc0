//! # Smartlogger Engine
//!
//! The correlation and extraction core of the smartlogger pipeline.
//!
//! This crate owns all of the system's real concurrency and state-machine
//! complexity:
//!
//! - [`correlator`]: per-correlation-id state machine matching REQUEST and
//!   RESPONSE events (or tolerating orphans and timeouts) and emitting
//!   exactly one finalized record per transaction
//! - [`extract`]: the pure, schema-driven field extractor
//! - [`timeout`]: one-shot deadline scheduling on the tokio timer wheel
//! - [`forward`]: bounded fixed-backoff relay of raw messages to a
//!   secondary broker topic
//! - [`config`]: engine configuration (timeout, retention, sharding)
//!
//! Broker plumbing and the document/relational stores are collaborators
//! behind the traits in `smartlogger-core`; the engine never talks to a
//! network directly.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod correlator;
pub mod extract;
pub mod forward;
pub mod timeout;

pub use config::EngineConfig;
pub use correlator::{Correlator, CorrelatorStats, FinalizeCause};
pub use forward::{ForwardPolicy, RetryingForwarder};
pub use timeout::TimeoutScheduler;
