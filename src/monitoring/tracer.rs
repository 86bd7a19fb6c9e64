/*!
 * Wait Tracing
 * Structured tracing for wait calls using the tracing crate
 *
 * Features:
 * - Trace ID per wait call for correlating registration, blocking and wakeup
 * - JSON-formatted logs for structured parsing
 * - Slow-wait detection on span close
 */

use crate::core::types::Timeout;
use std::time::{Duration, Instant};
use tracing::{debug, info, span, warn, Level};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};
use uuid::Uuid;

/// Waits that pass their own timeout are not slow; this applies to the rest
const SLOW_WAIT_THRESHOLD: Duration = Duration::from_millis(10);

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - PAL_TRACE_JSON: Enable JSON output (default: false)
///
/// Returns false if a global subscriber was already installed.
pub fn init_tracing() -> bool {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var("PAL_TRACE_JSON")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
            .is_ok()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()
            .is_ok()
    };

    if installed {
        info!(json = use_json, "structured tracing initialized");
    }
    installed
}

/// Generate a unique trace ID for request correlation
pub fn generate_trace_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span covering one wait call
pub struct WaitSpan {
    span: tracing::Span,
    start: Instant,
    timeout: Timeout,
    trace_id: String,
}

impl WaitSpan {
    pub fn new(count: usize, wait_all: bool, timeout: Timeout) -> Self {
        let trace_id = generate_trace_id();

        let span = span!(
            Level::DEBUG,
            "wait",
            trace_id = %trace_id,
            count,
            wait_all,
            timeout = %timeout,
            path = tracing::field::Empty,
            outcome = tracing::field::Empty,
            error = tracing::field::Empty,
            duration_us = tracing::field::Empty,
        );

        Self {
            span,
            start: Instant::now(),
            timeout,
            trace_id,
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// Which branch of the wait ran: fast, poll or blocked
    pub fn record_path(&self, path: &'static str) {
        self.span.record("path", path);
    }

    pub fn record_outcome<V: std::fmt::Debug>(&self, outcome: V) {
        self.span.record("outcome", format!("{:?}", outcome).as_str());
    }

    pub fn record_error(&self, error: &str) {
        self.span.record("error", error);
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

impl Drop for WaitSpan {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        let _entered = self.span.enter();
        self.span.record("duration_us", duration.as_micros() as u64);

        let bounded_by_timeout = self
            .timeout
            .as_duration()
            .map_or(true, |limit| duration >= limit);
        if duration > SLOW_WAIT_THRESHOLD && !bounded_by_timeout {
            warn!(
                trace_id = %self.trace_id,
                duration_ms = duration.as_millis() as u64,
                slow = true,
                "slow wait"
            );
        } else {
            debug!(
                trace_id = %self.trace_id,
                duration_us = duration.as_micros() as u64,
                "wait completed"
            );
        }
    }
}

#[inline]
pub fn span_wait(count: usize, wait_all: bool, timeout: Timeout) -> WaitSpan {
    WaitSpan::new(count, wait_all, timeout)
}
