//! Timeout assertions for async tests

use std::future::Future;
use tokio::time::{timeout, Duration};

/// Upper bound for flows that are expected to finish
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Await `future`, panicking if it takes longer than `duration`
pub async fn assert_completes_within<F, T>(duration: Duration, future: F) -> T
where
    F: Future<Output = T>,
{
    match timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => panic!("future did not complete within {:?}", duration),
    }
}

/// Panic if `future` finishes before `duration` elapses
pub async fn assert_still_pending<F, T>(duration: Duration, future: F)
where
    F: Future<Output = T>,
{
    if timeout(duration, future).await.is_ok() {
        panic!("future completed within {:?}, expected it to block", duration);
    }
}
