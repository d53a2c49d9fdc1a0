/// Background task implementations
use crate::{context::AppContext, db, error::MarketResult};

/// Delete refresh token rows past their expiry
///
/// Blacklisted-but-unexpired rows stay put; the blacklist is what keeps
/// a rotated token dead, so rows only leave once time alone would have
/// killed them anyway.
pub async fn cleanup_expired_refresh_tokens(ctx: &AppContext) -> MarketResult<u64> {
    ctx.sessions.cleanup_expired().await
}

/// Drop rate limit windows that have fully lapsed
pub fn prune_rate_limit_windows(ctx: &AppContext) -> usize {
    ctx.rate_limiter.prune_stale()
}

/// Verify the database still answers
pub async fn health_check(ctx: &AppContext) -> MarketResult<()> {
    db::test_connection(&ctx.db).await
}
