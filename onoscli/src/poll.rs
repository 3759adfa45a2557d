//! Bounded polling for eventually-consistent controller state.

use std::time::Duration;

use log::debug;

use crate::error::Result;

/// How often and how long to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Number of checks before giving up.
    pub attempts: u32,

    /// Pause between two checks.
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            attempts: 10,
            interval: Duration::from_secs(1),
        }
    }
}

impl PollPolicy {
    pub fn new(attempts: u32, interval: Duration) -> Self {
        Self { attempts, interval }
    }

    /// Run `check` until it reports `true` or the attempts run out.
    ///
    /// Returns `Ok(false)` when the condition never held. Errors from
    /// `check` end the polling immediately.
    pub async fn until<F>(&self, mut check: F) -> Result<bool>
    where
        F: AsyncFnMut() -> Result<bool>,
    {
        for attempt in 1..=self.attempts {
            if check().await? {
                return Ok(true);
            }
            debug!("condition not met (attempt {}/{})", attempt, self.attempts);
            if attempt < self.attempts {
                tokio::time::sleep(self.interval).await;
            }
        }
        Ok(false)
    }
}
