/// Metrics and telemetry for the Tradepost backend
///
/// Prometheus-compatible counters for the security-sensitive flows:
/// registrations, logins, token rotations and rate-limit rejections.

use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, Encoder, IntCounter, IntCounterVec,
    TextEncoder,
};

lazy_static! {
    /// Account registrations
    pub static ref REGISTRATIONS_TOTAL: IntCounter = register_int_counter!(
        "registrations_total",
        "Total number of accounts registered"
    )
    .unwrap();

    /// Login attempts by outcome
    pub static ref LOGINS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "logins_total",
        "Total number of login attempts",
        &["outcome"]
    )
    .unwrap();

    /// Refresh token rotations
    pub static ref TOKEN_ROTATIONS_TOTAL: IntCounter = register_int_counter!(
        "token_rotations_total",
        "Total number of refresh token rotations"
    )
    .unwrap();

    /// Requests rejected by the rate limiter
    pub static ref RATE_LIMIT_REJECTIONS: IntCounter = register_int_counter!(
        "rate_limit_rejections_total",
        "Total number of requests rejected by the rate limiter"
    )
    .unwrap();
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}
