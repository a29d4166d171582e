//! Bounded retry policy
//!
//! An [`Attempt`] runs until both a minimum number of tries has been made and
//! a total time budget has been spent. The first try is always granted.
//! Between tries the loop sleeps for the configured delay, minus the time the
//! previous try already took.

use std::time::Duration;
use tokio::time::Instant;

/// Retry policy: total budget, delay between tries and minimum try count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptStrategy {
    /// Minimum number of tries, regardless of elapsed time
    pub min: u32,
    /// Total time budget
    pub total: Duration,
    /// Pause between two tries
    pub delay: Duration,
}

impl Default for AttemptStrategy {
    fn default() -> Self {
        Self {
            min: 5,
            total: Duration::from_secs(5),
            delay: Duration::from_secs(1),
        }
    }
}

impl AttemptStrategy {
    pub fn new(min: u32, total: Duration, delay: Duration) -> Self {
        Self { min, total, delay }
    }

    /// Begin a fresh attempt sequence. The first call to [`Attempt::next`]
    /// always returns `true`.
    pub fn start(&self) -> Attempt {
        let now = Instant::now();
        Attempt {
            strategy: *self,
            last: now,
            end: now + self.total,
            force: true,
            count: 0,
        }
    }
}

/// One running attempt sequence
#[derive(Debug, Clone)]
pub struct Attempt {
    strategy: AttemptStrategy,
    last: Instant,
    end: Instant,
    force: bool,
    count: u32,
}

impl Attempt {
    /// Wait for the next try, if one is left.
    ///
    /// Returns `false` once the sequence is over. Otherwise sleeps for the
    /// remaining part of the delay and returns `true`.
    pub async fn next(&mut self) -> bool {
        let now = Instant::now();
        let sleep = self.next_sleep(now);
        if !self.force && now + sleep >= self.end && self.strategy.min <= self.count {
            return false;
        }
        self.force = false;
        if !sleep.is_zero() && self.count > 0 {
            tokio::time::sleep(sleep).await;
        }
        self.count += 1;
        self.last = Instant::now();
        true
    }

    /// Whether a following [`Attempt::next`] would grant another try.
    ///
    /// A positive answer is binding: the next call to `next` will succeed.
    pub fn has_next(&mut self) -> bool {
        if self.force || self.strategy.min > self.count {
            return true;
        }
        let now = Instant::now();
        if now + self.next_sleep(now) < self.end {
            self.force = true;
            return true;
        }
        false
    }

    /// Tries granted so far
    pub fn count(&self) -> u32 {
        self.count
    }

    fn next_sleep(&self, now: Instant) -> Duration {
        self.strategy
            .delay
            .saturating_sub(now.saturating_duration_since(self.last))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_try_is_always_granted() {
        let strategy = AttemptStrategy::new(0, Duration::ZERO, Duration::ZERO);
        let mut attempt = strategy.start();
        assert!(attempt.next().await);
        assert!(!attempt.next().await);
        assert_eq!(attempt.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_min_tries_outlive_the_budget() {
        let strategy = AttemptStrategy::new(3, Duration::ZERO, Duration::from_millis(100));
        let mut attempt = strategy.start();
        let mut tries = 0;
        while attempt.next().await {
            tries += 1;
        }
        assert_eq!(tries, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_strategy_budget() {
        let start = Instant::now();
        let mut attempt = AttemptStrategy::default().start();
        let mut tries = 0;
        while attempt.next().await {
            tries += 1;
        }
        // 5 tries, with a 1s pause before each of the last four
        assert_eq!(tries, 5);
        assert_eq!(start.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_time_budget_extends_past_min() {
        let strategy = AttemptStrategy::new(1, Duration::from_millis(350), Duration::from_millis(100));
        let mut attempt = strategy.start();
        let mut tries = 0;
        while attempt.next().await {
            tries += 1;
        }
        // tries at 0, 100, 200 and 300ms; a fifth would land at 400ms
        assert_eq!(tries, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_work_shortens_the_sleep() {
        let strategy = AttemptStrategy::new(2, Duration::ZERO, Duration::from_millis(100));
        let mut attempt = strategy.start();
        let start = Instant::now();

        assert!(attempt.next().await);
        tokio::time::advance(Duration::from_millis(60)).await;
        assert!(attempt.next().await);
        assert_eq!(start.elapsed(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_has_next_is_binding() {
        let strategy = AttemptStrategy::new(1, Duration::from_millis(250), Duration::from_millis(100));
        let mut attempt = strategy.start();
        assert!(attempt.has_next());
        assert!(attempt.next().await);
        assert!(attempt.has_next());

        // past the budget, but has_next already promised a try
        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(attempt.next().await);
        assert!(!attempt.has_next());
        assert!(!attempt.next().await);
    }
}
