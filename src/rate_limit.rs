/// Rate limiting for credential-guessing surfaces
///
/// A fixed-window attempt counter keyed by (operation, caller), owned by
/// the process and injected through AppContext rather than living in
/// module-global state. Every login / forgot-password / reset-password
/// call contends on the same map, so the check-and-increment runs inside
/// one mutex-guarded critical section.
use crate::{context::AppContext, error::MarketError};
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use rand::Rng;
use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::Mutex,
    time::{Duration, Instant},
};

/// Outcome of a rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Blocked { retry_after: u64 },
}

#[derive(Debug)]
struct Window {
    start: Instant,
    count: u32,
}

/// Per-operation, per-caller attempt counter
pub struct RateLimiter {
    windows: Mutex<HashMap<(String, String), Window>>,
    max_attempts: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_attempts: u32, window: Duration) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            max_attempts,
            window,
        }
    }

    /// Count an attempt and decide whether it may proceed
    ///
    /// Stale windows reset before counting. Once the count passes the
    /// limit the caller gets the remaining window time back, padded by
    /// up to 10% random jitter so the exact window edge cannot be probed.
    pub fn check_and_increment(&self, operation: &str, caller: &str) -> Decision {
        let key = (operation.to_string(), caller.to_string());
        let now = Instant::now();

        let mut windows = self.windows.lock().expect("rate limit mutex poisoned");

        let window = windows.entry(key).or_insert(Window { start: now, count: 0 });
        if now.duration_since(window.start) > self.window {
            window.start = now;
            window.count = 0;
        }

        window.count += 1;

        if window.count > self.max_attempts {
            let elapsed = now.duration_since(window.start);
            let remaining = self.window.saturating_sub(elapsed).as_secs_f64();
            let jitter = 1.0 + rand::thread_rng().gen::<f64>() * 0.1;
            let retry_after = (remaining * jitter).ceil() as u64;
            return Decision::Blocked { retry_after };
        }

        Decision::Allowed
    }

    /// Drop windows older than one full period; called by the GC job
    pub fn prune_stale(&self) -> usize {
        let now = Instant::now();
        let mut windows = self.windows.lock().expect("rate limit mutex poisoned");
        let before = windows.len();
        windows.retain(|_, w| now.duration_since(w.start) <= self.window);
        before - windows.len()
    }
}

/// Paths that can be used to guess or mutate credentials
const GUARDED_OPERATIONS: [&str; 3] = ["/login", "/forgot-password", "/reset-password"];

/// Rate limiting middleware stage
///
/// Layered over the API router; only the credential-guessing operations
/// are throttled, everything else passes straight through. The operation
/// identity is the request path; the caller identity is the forwarded
/// address or the peer address, with a single shared "unknown" bucket
/// when neither is available.
pub async fn guard(
    State(ctx): State<AppContext>,
    request: Request,
    next: Next,
) -> Result<Response, MarketError> {
    let operation = request.uri().path().to_string();
    if !GUARDED_OPERATIONS.iter().any(|op| operation.ends_with(op)) {
        return Ok(next.run(request).await);
    }

    let caller = caller_identity(&request);

    match ctx.rate_limiter.check_and_increment(&operation, &caller) {
        Decision::Allowed => Ok(next.run(request).await),
        Decision::Blocked { retry_after } => {
            tracing::warn!(%operation, %caller, retry_after, "Rate limit exceeded");
            crate::metrics::RATE_LIMIT_REJECTIONS.inc();
            Err(MarketError::RateLimited { retry_after })
        }
    }
}

/// Resolve the caller identity for rate limiting
fn caller_identity(request: &Request) -> String {
    if let Some(forwarded) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
    {
        return forwarded.to_string();
    }

    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    tracing::debug!("No caller address available, using shared bucket");
    "unknown".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_up_to_limit() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60));

        for _ in 0..5 {
            assert_eq!(
                limiter.check_and_increment("/login", "1.2.3.4"),
                Decision::Allowed
            );
        }
    }

    #[test]
    fn test_blocks_past_limit_with_positive_retry() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60));

        for _ in 0..5 {
            limiter.check_and_increment("/login", "1.2.3.4");
        }

        match limiter.check_and_increment("/login", "1.2.3.4") {
            Decision::Blocked { retry_after } => {
                // Remaining window plus at most 10% jitter
                assert!(retry_after > 0);
                assert!(retry_after <= 67);
            }
            Decision::Allowed => panic!("sixth attempt should be blocked"),
        }
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));

        assert_eq!(limiter.check_and_increment("/login", "a"), Decision::Allowed);
        assert!(matches!(
            limiter.check_and_increment("/login", "a"),
            Decision::Blocked { .. }
        ));

        // Different caller and different operation are unaffected
        assert_eq!(limiter.check_and_increment("/login", "b"), Decision::Allowed);
        assert_eq!(
            limiter.check_and_increment("/forgot-password", "a"),
            Decision::Allowed
        );
    }

    #[test]
    fn test_window_expiry_resets_count() {
        let limiter = RateLimiter::new(2, Duration::from_millis(30));

        limiter.check_and_increment("/login", "a");
        limiter.check_and_increment("/login", "a");
        assert!(matches!(
            limiter.check_and_increment("/login", "a"),
            Decision::Blocked { .. }
        ));

        std::thread::sleep(Duration::from_millis(40));

        assert_eq!(limiter.check_and_increment("/login", "a"), Decision::Allowed);
    }

    #[test]
    fn test_concurrent_increments_lose_no_updates() {
        use std::sync::Arc;

        let limiter = Arc::new(RateLimiter::new(1000, Duration::from_secs(60)));
        let mut handles = Vec::new();

        for _ in 0..8 {
            let limiter = Arc::clone(&limiter);
            handles.push(std::thread::spawn(move || {
                for _ in 0..100 {
                    limiter.check_and_increment("/login", "shared");
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        // 800 attempts counted, next two exhaust the remaining 200...
        let windows = limiter.windows.lock().unwrap();
        let window = windows
            .get(&("/login".to_string(), "shared".to_string()))
            .unwrap();
        assert_eq!(window.count, 800);
    }

    #[test]
    fn test_prune_stale_drops_old_windows() {
        let limiter = RateLimiter::new(5, Duration::from_millis(10));
        limiter.check_and_increment("/login", "a");
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(limiter.prune_stale(), 1);
    }
}
