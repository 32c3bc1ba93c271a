//! Service-specific tests
//!
//! Each real service has its own test file. Process tests drive real
//! `/bin/sh` children and only run on unix.


// Common test utilities for services
#[cfg(test)]
pub mod common {
    use std::time::Duration;
    use tokio::time::timeout;

    /// Upper bound for operations that should finish almost immediately
    pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

    /// Helper to run async operations with timeout
    pub async fn with_timeout<T, F>(future: F) -> Result<T, tokio::time::error::Elapsed>
    where
        F: std::future::Future<Output = T>,
    {
        timeout(TEST_TIMEOUT, future).await
    }

    pub fn shell(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }
}
