use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::PredictionError;

/// Retry schedule for a single upstream call.
///
/// Attempt `n` (0-based) that fails is followed by a pause of
/// `base_delay * (n + 2)`. Batch jobs use [`RetryPolicy::run_paced`], which
/// also waits `base_delay` after a success so consecutive requests stay
/// under the provider's rate limit; request handlers use plain `run`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Random extra delay as a fraction of the computed backoff (0.0 = none).
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(700),
            jitter: 0.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
            base_delay,
            jitter: 0.0,
        }
    }

    /// No pauses at all.
    #[cfg(test)]
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Pause after failed attempt `attempt` (0-based), before jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * (attempt + 2)
    }

    /// Pause after a successful paced call.
    pub fn pacing(&self) -> Duration {
        self.base_delay
    }

    /// Full schedule of failure pauses for this policy.
    pub fn schedule(&self) -> Vec<Duration> {
        (0..self.max_attempts).map(|a| self.backoff(a)).collect()
    }

    fn jittered(&self, d: Duration) -> Duration {
        if self.jitter <= 0.0 || d.is_zero() {
            return d;
        }
        let extra = rand::thread_rng().gen_range(0.0..=self.jitter);
        d.mul_f64(1.0 + extra)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempts are exhausted. Exhaustion is reported as
    /// [`PredictionError::UpstreamUnavailable`].
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, PredictionError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, PredictionError>>,
    {
        let mut last_err = None;
        for attempt in 0..self.max_attempts {
            match op().await {
                Ok(value) => {
                    info!("OK {} (attempt {})", label, attempt + 1);
                    return Ok(value);
                }
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    warn!("{} failed (attempt {}/{}): {}", label, attempt + 1, self.max_attempts, e);
                    last_err = Some(e);
                    if attempt + 1 < self.max_attempts {
                        sleep_for(self.jittered(self.backoff(attempt))).await;
                    }
                }
            }
        }
        Err(PredictionError::UpstreamUnavailable(format!(
            "{} failed after {} attempts: {}",
            label,
            self.max_attempts,
            last_err.map(|e| e.to_string()).unwrap_or_default()
        )))
    }
}

impl RetryPolicy {
    /// [`RetryPolicy::run`], then the pacing pause when the call succeeded.
    pub async fn run_paced<T, F, Fut>(&self, label: &str, op: F) -> Result<T, PredictionError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, PredictionError>>,
    {
        let value = self.run(label, op).await?;
        sleep_for(self.pacing()).await;
        Ok(value)
    }
}

async fn sleep_for(d: Duration) {
    if !d.is_zero() {
        tokio::time::sleep(d).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn default_schedule_grows_linearly_from_base() {
        let p = RetryPolicy::default();
        assert_eq!(p.max_attempts, 3);
        assert_eq!(
            p.schedule(),
            vec![
                Duration::from_millis(1400),
                Duration::from_millis(2100),
                Duration::from_millis(2800),
            ]
        );
        assert_eq!(p.pacing(), Duration::from_millis(700));
    }

    #[test]
    fn jitter_only_adds_delay() {
        let p = RetryPolicy::new(3, Duration::from_millis(100)).with_jitter(0.5);
        for _ in 0..20 {
            let d = p.jittered(p.backoff(0));
            assert!(d >= Duration::from_millis(200) && d <= Duration::from_millis(300));
        }
    }

    #[tokio::test]
    async fn retries_upstream_failures_until_success() {
        let calls = AtomicU32::new(0);
        let result = RetryPolicy::immediate(3)
            .run("standings", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(PredictionError::UpstreamUnavailable("empty table".into()))
                } else {
                    Ok(n)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn only_paced_runs_wait_after_success() {
        let p = RetryPolicy::new(3, Duration::from_millis(200));

        let started = std::time::Instant::now();
        p.run("live scoreboard", || async { Ok::<_, PredictionError>(1) })
            .await
            .unwrap();
        assert!(started.elapsed() < Duration::from_millis(100));

        let started = std::time::Instant::now();
        p.run_paced("game log", || async { Ok::<_, PredictionError>(1) })
            .await
            .unwrap();
        assert!(started.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = RetryPolicy::immediate(3)
            .run("advanced", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(PredictionError::UpstreamUnavailable("503".into()))
            })
            .await;
        assert!(matches!(result, Err(PredictionError::UpstreamUnavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn structure_mismatch_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = RetryPolicy::immediate(3)
            .run("game log", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(PredictionError::StructureMismatch("no resultSets".into()))
            })
            .await;
        assert!(matches!(result, Err(PredictionError::StructureMismatch(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
