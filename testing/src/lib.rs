//! In-memory test doubles for the smartlogger pipeline.
//!
//! Everything here is deterministic and lock-based; no network, no broker,
//! no document store. Intended for unit and integration tests only.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod mocks;

/// Install a test-friendly tracing subscriber, once per process.
///
/// Honors `RUST_LOG` and routes output through the test writer so logs stay
/// attached to the failing test. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
