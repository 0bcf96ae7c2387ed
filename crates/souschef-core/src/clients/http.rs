// ── SousChef Clients: HTTP Retry & Circuit Breaker ──────────────────────────
//
// Shared by the catalog and classifier clients and the Telegram bridge.
//
//   • Exponential backoff with ±25% jitter (base 1s, max 30s, 3 retries)
//   • Retry on 429 (rate limit), 500, 502, 503, 504
//   • Respects `Retry-After` (integer seconds)
//   • Circuit breaker: N consecutive failures → fail fast for a cooldown
//   • Bridge reconnect delay with a 5-minute cap

use crate::atoms::error::{EngineError, EngineResult};
use log::warn;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

pub const MAX_RETRIES: u32 = 3;

const INITIAL_RETRY_DELAY_MS: u64 = 1_000;
const MAX_RETRY_DELAY_MS: u64 = 30_000;
const MAX_RECONNECT_DELAY_MS: u64 = 300_000;

pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Integer seconds only; HTTP-date values fall back to computed backoff.
pub fn parse_retry_after(header_value: &str) -> Option<u64> {
    header_value.trim().parse::<u64>().ok()
}

fn backoff_ms(attempt: u32, retry_after_secs: Option<u64>) -> u64 {
    let capped = (INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt.min(10))).min(MAX_RETRY_DELAY_MS);
    match retry_after_secs {
        Some(secs) => (secs.min(60) * 1000).max(capped),
        None => capped,
    }
}

/// Sleep before retry `attempt` (0-based). Returns the delay for logging.
pub async fn retry_delay(attempt: u32, retry_after_secs: Option<u64>) -> Duration {
    let delay = Duration::from_millis(apply_jitter(backoff_ms(attempt, retry_after_secs)));
    tokio::time::sleep(delay).await;
    delay
}

/// Sleep before reconnect `attempt` (0-based) of a long-running bridge.
pub async fn reconnect_delay(attempt: u32) -> Duration {
    let base = (INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt.min(12))).min(MAX_RECONNECT_DELAY_MS);
    let delay = Duration::from_millis(apply_jitter(base));
    tokio::time::sleep(delay).await;
    delay
}

fn apply_jitter(base_ms: u64) -> u64 {
    let jitter_range = (base_ms / 4) as i64;
    if jitter_range == 0 {
        return base_ms.max(100);
    }
    let offset = (clock_nanos() % (2 * jitter_range + 1)) - jitter_range;
    (base_ms as i64 + offset).max(100) as u64
}

fn clock_nanos() -> i64 {
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    (nanos % 1000) as i64
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

// ── Circuit Breaker ────────────────────────────────────────────────────────

/// Trips after `threshold` consecutive failures and rejects calls for
/// `cooldown_secs`; after that one probe is let through (half-open).
pub struct CircuitBreaker {
    consecutive_failures: AtomicU32,
    tripped_at: AtomicU64,
    threshold: u32,
    cooldown_secs: u64,
}

impl CircuitBreaker {
    pub const fn new(threshold: u32, cooldown_secs: u64) -> Self {
        Self {
            consecutive_failures: AtomicU32::new(0),
            tripped_at: AtomicU64::new(0),
            threshold,
            cooldown_secs,
        }
    }

    pub fn check(&self) -> Result<(), String> {
        let failures = self.consecutive_failures.load(Ordering::Relaxed);
        if failures < self.threshold {
            return Ok(());
        }
        let elapsed = now_secs().saturating_sub(self.tripped_at.load(Ordering::Relaxed));
        if elapsed < self.cooldown_secs {
            Err(format!(
                "circuit open after {} consecutive failures, {}s cooldown left",
                failures,
                self.cooldown_secs - elapsed
            ))
        } else {
            Ok(())
        }
    }

    pub fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.tripped_at.store(0, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        let prev = self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
        if prev + 1 >= self.threshold {
            self.tripped_at.store(now_secs(), Ordering::Relaxed);
            warn!(
                "[circuit-breaker] Tripped after {} consecutive failures, cooling down {}s",
                prev + 1,
                self.cooldown_secs
            );
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(5, 60)
    }
}

// ── Request loop ───────────────────────────────────────────────────────────

/// Send the request built by `build` until it succeeds, retrying transient
/// failures. Non-success statuses become `EngineError::Upstream` naming
/// `service`; auth failures and other 4xx are returned at once.
pub async fn send_with_retry<F>(
    service: &str,
    breaker: &CircuitBreaker,
    mut build: F,
) -> EngineResult<reqwest::Response>
where
    F: FnMut() -> reqwest::RequestBuilder,
{
    breaker
        .check()
        .map_err(|msg| EngineError::upstream(service, msg))?;

    let mut retry_after: Option<u64> = None;
    for attempt in 0..=MAX_RETRIES {
        if attempt > 0 {
            let delay = retry_delay(attempt - 1, retry_after.take()).await;
            warn!(
                "[{}] Retry {}/{} after {}ms",
                service,
                attempt,
                MAX_RETRIES,
                delay.as_millis()
            );
        }

        let response = match build().send().await {
            Ok(r) => r,
            Err(e) => {
                breaker.record_failure();
                if attempt < MAX_RETRIES && (e.is_timeout() || e.is_connect()) {
                    warn!("[{}] Request failed: {}", service, e);
                    continue;
                }
                return Err(EngineError::Network(e));
            }
        };

        let status = response.status().as_u16();
        if response.status().is_success() {
            breaker.record_success();
            return Ok(response);
        }

        breaker.record_failure();
        retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        let body = response.text().await.unwrap_or_default();
        let snippet: String = body.chars().take(200).collect();

        if is_retryable_status(status) && attempt < MAX_RETRIES {
            warn!("[{}] HTTP {}: {}", service, status, snippet);
            continue;
        }
        return Err(EngineError::upstream(service, format!("HTTP {}: {}", status, snippet)));
    }

    Err(EngineError::upstream(service, "retries exhausted"))
}
