//! Call policies composed around every downstream request:
//! `with_timeout(with_retry(breaker.call(raw_call)))`.

use crate::utils::error::{Result, SeederError};
use parking_lot::Mutex;
use rand::Rng;
use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Bounds the whole call, retries and backoff included.
pub async fn with_timeout<T, Fut>(
    service: &str,
    operation: &str,
    limit: Duration,
    call: Fut,
) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(SeederError::DownstreamTimeout {
            service: service.to_string(),
            operation: operation.to_string(),
        }),
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    /// Fraction of the computed delay randomly added or removed, in `[0, 1]`.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            jitter: 0.5,
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (1-based), without jitter.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = self.multiplier.powi(retry.saturating_sub(1) as i32);
        let delay = self.base_delay.as_secs_f64() * factor;
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }

    fn jittered(&self, retry: u32) -> Duration {
        let delay = self.backoff(retry);
        if self.jitter <= 0.0 {
            return delay;
        }
        let spread = rand::thread_rng().gen_range(-self.jitter..=self.jitter);
        delay.mul_f64((1.0 + spread).max(0.0))
    }
}

/// Re-runs `op` while it fails with a retryable error and the budget lasts.
pub async fn with_retry<T, F, Fut>(
    service: &str,
    operation: &str,
    policy: &RetryPolicy,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut retry = 0;
    loop {
        match op().await {
            Ok(value) => {
                if retry > 0 {
                    tracing::debug!("{} {} succeeded after {} retries", service, operation, retry);
                }
                return Ok(value);
            }
            Err(e) if e.is_retryable() && retry < policy.max_retries => {
                retry += 1;
                let delay = policy.jittered(retry);
                tracing::debug!(
                    "{} {} failed ({}), retry {}/{} in {:?}",
                    service,
                    operation,
                    e,
                    retry,
                    policy.max_retries,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of most recent call outcomes the failure rate is computed over.
    pub window_size: usize,
    /// Outcomes required in the window before the rate is evaluated.
    pub minimum_calls: usize,
    /// Percentage of failures in the window that opens the circuit.
    pub failure_rate_threshold: f64,
    pub open_duration: Duration,
    /// Concurrent trial calls admitted while half-open.
    pub half_open_probes: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            window_size: 100,
            minimum_calls: 10,
            failure_rate_threshold: 50.0,
            open_duration: Duration::from_secs(60),
            half_open_probes: 1,
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    window: VecDeque<bool>,
    opened_at: Option<Instant>,
    probes_in_flight: u32,
    rejections: u64,
}

/// Per-service failure isolation with a count-based rolling window.
#[derive(Debug)]
pub struct CircuitBreaker {
    service: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

enum Admission {
    Normal,
    Probe,
}

/// An admitted call whose future is dropped before completing (for example by
/// the outer deadline) is recorded as a failure so a probe slot is never lost.
struct PendingCall<'a> {
    breaker: &'a CircuitBreaker,
    admission: Option<Admission>,
}

impl Drop for PendingCall<'_> {
    fn drop(&mut self) {
        if let Some(admission) = self.admission.take() {
            self.breaker.record(admission, false);
        }
    }
}

impl CircuitBreaker {
    pub fn new(service: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            service: service.into(),
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                window: VecDeque::new(),
                opened_at: None,
                probes_in_flight: 0,
                rejections: 0,
            }),
        }
    }

    pub fn state(&self) -> CircuitState {
        let mut inner = self.inner.lock();
        self.refresh(&mut inner);
        inner.state
    }

    pub fn rejections(&self) -> u64 {
        self.inner.lock().rejections
    }

    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        self.close(&mut inner);
    }

    /// Runs `call` unless the circuit is open. Only retryable failures count
    /// against the window; a rejection with a client status means the service
    /// answered and is healthy.
    pub async fn call<T, Fut>(&self, call: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        let mut pending = PendingCall {
            breaker: self,
            admission: Some(self.admit()?),
        };
        let result = call.await;
        let healthy = match &result {
            Ok(_) => true,
            Err(e) => !e.is_retryable(),
        };
        if let Some(admission) = pending.admission.take() {
            self.record(admission, healthy);
        }
        result
    }

    fn admit(&self) -> Result<Admission> {
        let mut inner = self.inner.lock();
        self.refresh(&mut inner);

        match inner.state {
            CircuitState::Closed => Ok(Admission::Normal),
            CircuitState::HalfOpen if inner.probes_in_flight < self.config.half_open_probes => {
                inner.probes_in_flight += 1;
                Ok(Admission::Probe)
            }
            CircuitState::HalfOpen | CircuitState::Open => {
                inner.rejections += 1;
                Err(SeederError::DownstreamUnavailable {
                    service: self.service.clone(),
                })
            }
        }
    }

    fn record(&self, admission: Admission, healthy: bool) {
        let mut inner = self.inner.lock();

        if let Admission::Probe = admission {
            inner.probes_in_flight = inner.probes_in_flight.saturating_sub(1);
            if healthy {
                tracing::info!("Circuit for {} closed after successful probe", self.service);
                self.close(&mut inner);
            } else {
                self.open(&mut inner);
            }
            return;
        }

        // A call admitted before the circuit opened may finish afterwards.
        if inner.state != CircuitState::Closed {
            return;
        }

        inner.window.push_back(healthy);
        while inner.window.len() > self.config.window_size {
            inner.window.pop_front();
        }

        if inner.window.len() >= self.config.minimum_calls {
            let failures = inner.window.iter().filter(|ok| !**ok).count();
            let rate = failures as f64 * 100.0 / inner.window.len() as f64;
            if rate >= self.config.failure_rate_threshold {
                tracing::warn!(
                    "Circuit for {} opened: {:.1}% of the last {} calls failed",
                    self.service,
                    rate,
                    inner.window.len()
                );
                self.open(&mut inner);
            }
        }
    }

    fn refresh(&self, inner: &mut BreakerInner) {
        if inner.state != CircuitState::Open {
            return;
        }
        if let Some(opened_at) = inner.opened_at {
            if opened_at.elapsed() >= self.config.open_duration {
                inner.state = CircuitState::HalfOpen;
                inner.probes_in_flight = 0;
            }
        }
    }

    fn open(&self, inner: &mut BreakerInner) {
        inner.state = CircuitState::Open;
        inner.opened_at = Some(Instant::now());
        inner.window.clear();
    }

    fn close(&self, inner: &mut BreakerInner) {
        inner.state = CircuitState::Closed;
        inner.opened_at = None;
        inner.window.clear();
        inner.probes_in_flight = 0;
    }
}
