//! Fixed-count polling.
//!
//! Every readiness wait polls a check a fixed number of times with a fixed
//! interval between attempts. There is no backoff.

use std::time::Duration;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

/// Polling schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of checks.
    pub attempts: u32,
    /// Delay between checks.
    pub interval: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 30,
            interval: Duration::from_secs(10),
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub const fn new(attempts: u32, interval: Duration) -> Self {
        Self { attempts, interval }
    }

    /// Upper bound on the total wait.
    #[must_use]
    pub fn budget(&self) -> Duration {
        self.interval * self.attempts.saturating_sub(1)
    }
}

/// Poll `check` until it returns `Ok(true)`.
///
/// Errors from `check` count as a failed attempt; the last one is included
/// in the timeout error.
///
/// # Errors
///
/// Returns an error once all attempts are used up.
pub async fn poll_until<F>(retry: &RetryConfig, what: &str, mut check: F) -> Result<u32>
where
    F: FnMut() -> Result<bool>,
{
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("  {spinner:.cyan} {msg} ({elapsed})")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(format!("Waiting for {what}"));
    spinner.enable_steady_tick(Duration::from_millis(120));

    let mut last_error = None;

    for attempt in 1..=retry.attempts {
        match check() {
            Ok(true) => {
                spinner.finish_and_clear();
                debug!(what = %what, attempt, "Ready");
                return Ok(attempt);
            }
            Ok(false) => {
                debug!(what = %what, attempt, "Not ready yet");
            }
            Err(e) => {
                debug!(what = %what, attempt, error = %e, "Check failed");
                last_error = Some(e);
            }
        }

        if attempt < retry.attempts {
            tokio::time::sleep(retry.interval).await;
        }
    }

    spinner.finish_and_clear();

    match last_error {
        Some(e) => Err(e.context(format!(
            "Timed out waiting for {what} after {} attempts",
            retry.attempts
        ))),
        None => Err(anyhow::anyhow!(
            "Timed out waiting for {what} after {} attempts",
            retry.attempts
        )),
    }
}
