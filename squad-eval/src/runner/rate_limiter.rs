//! Sliding-window request and token limiter for provider clients

use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const WINDOW: Duration = Duration::from_secs(60);

/// Requests and tokens observed in the last minute
#[derive(Default)]
struct Window {
    requests: VecDeque<Instant>,
    tokens: VecDeque<(Instant, u32)>,
}

impl Window {
    fn prune(&mut self, now: Instant) {
        while matches!(self.requests.front(), Some(&t) if now.duration_since(t) > WINDOW) {
            self.requests.pop_front();
        }
        while matches!(self.tokens.front(), Some(&(t, _)) if now.duration_since(t) > WINDOW) {
            self.tokens.pop_front();
        }
    }

    fn token_total(&self) -> u32 {
        self.tokens.iter().map(|(_, n)| n).sum()
    }
}

/// Per-provider limiter over requests per minute and tokens per minute
pub struct RateLimiter {
    requests_per_minute: u32,
    tokens_per_minute: u32,
    window: Mutex<Window>,
}

impl RateLimiter {
    /// Create a new rate limiter
    pub fn new(requests_per_minute: u32, tokens_per_minute: u32) -> Self {
        Self {
            requests_per_minute: requests_per_minute.max(1),
            tokens_per_minute,
            window: Mutex::new(Window::default()),
        }
    }

    /// Wait until a request fits in the current window, then record it
    pub async fn acquire(&self) -> RateLimitGuard {
        loop {
            match self.try_acquire().await {
                None => return RateLimitGuard { _private: () },
                Some(wait) => {
                    tracing::debug!("Rate limiter waiting {:?}", wait);
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Record the request if allowed, otherwise return how long to wait
    async fn try_acquire(&self) -> Option<Duration> {
        let mut window = self.window.lock().await;
        let now = Instant::now();
        window.prune(now);

        if window.requests.len() >= self.requests_per_minute as usize {
            let oldest = *window.requests.front()?;
            return Some(WINDOW.saturating_sub(now.duration_since(oldest)) + Duration::from_millis(10));
        }

        if self.tokens_per_minute > 0 && window.token_total() >= self.tokens_per_minute {
            let (oldest, _) = *window.tokens.front()?;
            return Some(WINDOW.saturating_sub(now.duration_since(oldest)) + Duration::from_millis(10));
        }

        window.requests.push_back(now);
        None
    }

    /// Record token usage for rate limiting
    pub async fn record_tokens(&self, tokens: u32) {
        let mut window = self.window.lock().await;
        let now = Instant::now();
        window.prune(now);
        window.tokens.push_back((now, tokens));
    }
}

/// Guard returned when rate limit permission is acquired
pub struct RateLimitGuard {
    _private: (),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_requests_within_limit_do_not_wait() {
        let limiter = RateLimiter::new(5, 1000);
        for _ in 0..5 {
            assert!(limiter.try_acquire().await.is_none());
        }
        assert!(limiter.try_acquire().await.is_some());
    }

    #[tokio::test]
    async fn test_token_budget_blocks() {
        let limiter = RateLimiter::new(60, 300);

        limiter.record_tokens(100).await;
        limiter.record_tokens(200).await;
        assert_eq!(limiter.window.lock().await.token_total(), 300);

        let wait = limiter.try_acquire().await.unwrap();
        assert!(wait <= WINDOW + Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_zero_tpm_disables_token_check() {
        let limiter = RateLimiter::new(60, 0);
        limiter.record_tokens(1_000_000).await;
        let _guard = limiter.acquire().await;
    }
}
