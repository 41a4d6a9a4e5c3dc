/// Timeout and deadline wrappers for async operations
use std::future::Future;
use std::time::Duration;
use tokio::time::{timeout, timeout_at, Instant};

#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    pub duration: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TimeoutError {
    #[error("Operation timed out after {0:?}")]
    Elapsed(Duration),
    #[error("Request budget of {0:?} exhausted")]
    BudgetExhausted(Duration),
}

/// Execute a future with timeout
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> Result<T, TimeoutError>
where
    F: Future<Output = T>,
{
    timeout(duration, future)
        .await
        .map_err(|_| TimeoutError::Elapsed(duration))
}

/// Wall-clock budget shared by every stage of one request.
///
/// Unlike [`with_timeout`], each stage only gets whatever time the earlier
/// stages left over. Once the deadline passes, `run` refuses to start new work.
#[derive(Debug, Clone, Copy)]
pub struct RequestBudget {
    total: Duration,
    started: Instant,
    deadline: Instant,
}

impl RequestBudget {
    pub fn start(total: Duration) -> Self {
        let started = Instant::now();
        Self {
            total,
            started,
            deadline: started + total,
        }
    }

    pub fn total(&self) -> Duration {
        self.total
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_exhausted(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Run `future` until it completes or the deadline passes.
    pub async fn run<F, T>(&self, future: F) -> Result<T, TimeoutError>
    where
        F: Future<Output = T>,
    {
        if self.is_exhausted() {
            return Err(TimeoutError::BudgetExhausted(self.total));
        }

        timeout_at(self.deadline, future)
            .await
            .map_err(|_| TimeoutError::BudgetExhausted(self.total))
    }
}
