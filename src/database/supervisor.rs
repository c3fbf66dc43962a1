//! Bounded, fixed-delay connection establishment

use super::store::{DocumentStore, ProbeOutcome};
use crate::error::ConnectivityError;
use std::time::Duration;
use tracing::{error, info};

/// How many probe attempts to make and how long to wait between them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of probe attempts, including the first
    pub max_retries: u32,
    /// Fixed pause between consecutive attempts
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// Probe the store until it answers, a fatal failure is reported, or the attempt
/// budget runs out. Returns the number of attempts used.
///
/// The delay never grows; there is no sleep after the final failed attempt.
pub async fn await_ready(
    store: &dyn DocumentStore,
    policy: &RetryPolicy,
) -> Result<u32, ConnectivityError> {
    if policy.max_retries == 0 {
        return Err(ConnectivityError::Configuration {
            message: "max_retries must be at least 1".to_string(),
        });
    }

    let mut last_error = String::new();
    for attempt in 1..=policy.max_retries {
        match store.ping().await {
            ProbeOutcome::Ready => {
                info!(
                    "Attempt {}/{} - database connection established: {}",
                    attempt,
                    policy.max_retries,
                    store.database_name()
                );
                return Ok(attempt);
            }
            ProbeOutcome::Transient(message) => {
                error!(
                    "Failed to reach database (attempt {}/{}): {}",
                    attempt, policy.max_retries, message
                );
                last_error = message;
                if attempt < policy.max_retries {
                    tokio::time::sleep(policy.retry_delay).await;
                }
            }
            ProbeOutcome::Fatal(message) => {
                error!(
                    "Database connection failed on attempt {}/{}: {}",
                    attempt, policy.max_retries, message
                );
                return Err(ConnectivityError::Fatal { message });
            }
        }
    }

    Err(ConnectivityError::RetriesExhausted {
        attempts: policy.max_retries,
        last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory_store::{MemoryStore, ProbeScript};

    fn policy(max_retries: u32, delay_ms: u64) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            retry_delay: Duration::from_millis(delay_ms),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_on_first_attempt() {
        let store = MemoryStore::new("minirecords");
        let start = tokio::time::Instant::now();
        let attempts = await_ready(&store, &policy(3, 1000)).await.unwrap();
        assert_eq!(attempts, 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let store = MemoryStore::with_probe("minirecords", ProbeScript::TransientFor(2));
        let start = tokio::time::Instant::now();
        let attempts = await_ready(&store, &policy(3, 1000)).await.unwrap();
        assert_eq!(attempts, 3);
        assert_eq!(start.elapsed(), Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_probe_stops_immediately() {
        let store = MemoryStore::with_probe(
            "minirecords",
            ProbeScript::Fatal("authentication failed".into()),
        );
        let err = await_ready(&store, &policy(5, 1000)).await.unwrap_err();
        assert_eq!(
            err,
            ConnectivityError::Fatal {
                message: "authentication failed".into()
            }
        );
        assert_eq!(store.probe_count().await, 1);
    }

    #[tokio::test]
    async fn test_zero_attempts_is_a_configuration_error() {
        let store = MemoryStore::new("minirecords");
        let err = await_ready(&store, &policy(0, 10)).await.unwrap_err();
        assert!(matches!(err, ConnectivityError::Configuration { .. }));
        assert_eq!(store.probe_count().await, 0);
    }
}
