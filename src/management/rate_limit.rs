use std::{
    collections::{HashMap, VecDeque},
    time::{Duration, Instant},
};

use tokio::sync::Mutex;

/// Sliding-window request counter keyed by client address.
///
/// Each key may issue `max_requests` requests within any `window`; requests
/// beyond that are refused and not recorded.
pub struct RateLimiter {
    requests: Mutex<HashMap<String, VecDeque<Instant>>>,
    window: Duration,
    max_requests: usize,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            requests: Mutex::new(HashMap::new()),
            window,
            max_requests,
        }
    }

    /// One minute window, as used for the HTTP API.
    pub fn per_minute(max_requests: usize) -> Self {
        Self::new(max_requests, Duration::from_secs(60))
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Records a request for `key` and tells whether it is allowed.
    pub async fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now()).await
    }

    pub async fn check_at(&self, key: &str, now: Instant) -> bool {
        let mut requests = self.requests.lock().await;

        // Forget idle peers so the map does not grow without bound
        requests.retain(|_, times| {
            times
                .back()
                .is_some_and(|last| now.saturating_duration_since(*last) < self.window)
        });

        let times = requests.entry(key.to_string()).or_default();
        while times
            .front()
            .is_some_and(|first| now.saturating_duration_since(*first) >= self.window)
        {
            times.pop_front();
        }

        if times.len() >= self.max_requests {
            return false;
        }

        times.push_back(now);
        true
    }

    /// Requests currently counted against `key`.
    #[cfg(test)]
    async fn request_count(&self, key: &str) -> usize {
        self.requests
            .lock()
            .await
            .get(key)
            .map_or(0, |times| times.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn refuses_once_the_window_is_full() {
        let limiter = RateLimiter::per_minute(3);
        let start = Instant::now();

        for i in 0..3 {
            assert!(limiter.check_at("10.0.0.1", start + Duration::from_secs(i)).await);
        }
        assert!(!limiter.check_at("10.0.0.1", start + Duration::from_secs(5)).await);
        assert_eq!(limiter.request_count("10.0.0.1").await, 3);

        // other clients are counted separately
        assert!(limiter.check_at("10.0.0.2", start + Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn window_slides() {
        let limiter = RateLimiter::per_minute(2);
        let start = Instant::now();

        assert!(limiter.check_at("a", start).await);
        assert!(limiter.check_at("a", start + Duration::from_secs(30)).await);
        assert!(!limiter.check_at("a", start + Duration::from_secs(59)).await);

        // first request has left the window, second is still in it
        assert!(limiter.check_at("a", start + Duration::from_secs(60)).await);
        assert!(!limiter.check_at("a", start + Duration::from_secs(61)).await);
        assert!(limiter.check_at("a", start + Duration::from_secs(90)).await);
    }
}
