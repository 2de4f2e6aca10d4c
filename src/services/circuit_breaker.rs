use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, Instrument, StateMachine};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const CLOSED: u8 = 0;
const OPEN: u8 = 1;
const HALF_OPEN: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerConfig {
    /// Consecutive failures that open the breaker.
    pub failure_threshold: u32,
    /// How long the breaker stays open before allowing a trial call.
    pub cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum BreakerError<E> {
    #[error("Circuit breaker open")]
    Open,
    #[error(transparent)]
    Inner(E),
}

/// Mirrors failsafe's state transitions so callers can observe them.
#[derive(Clone)]
struct StateRecorder {
    name: &'static str,
    state: Arc<AtomicU8>,
}

impl Instrument for StateRecorder {
    fn on_call_rejected(&self) {
        tracing::debug!(breaker = self.name, "Call rejected by open circuit breaker");
    }

    fn on_open(&self) {
        self.state.store(OPEN, Ordering::SeqCst);
        tracing::warn!(breaker = self.name, "Circuit breaker opened");
    }

    fn on_half_open(&self) {
        self.state.store(HALF_OPEN, Ordering::SeqCst);
        tracing::info!(breaker = self.name, "Circuit breaker half-open, allowing trial call");
    }

    fn on_closed(&self) {
        self.state.store(CLOSED, Ordering::SeqCst);
        tracing::info!(breaker = self.name, "Circuit breaker closed");
    }
}

type Machine = StateMachine<failure_policy::ConsecutiveFailures<backoff::Constant>, StateRecorder>;

/// Consecutive-failure circuit breaker guarding the outbound publish call.
///
/// While open, calls fail fast without polling the wrapped future. Once the
/// cooldown has elapsed the next call is let through as a trial: success closes
/// the breaker, failure reopens it for another cooldown.
#[derive(Clone)]
pub struct PublishBreaker {
    machine: Machine,
    state: Arc<AtomicU8>,
    config: BreakerConfig,
}

impl PublishBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        let state = Arc::new(AtomicU8::new(CLOSED));
        let recorder = StateRecorder {
            name: "stream-publish",
            state: state.clone(),
        };
        let policy = failure_policy::consecutive_failures(
            config.failure_threshold.max(1),
            backoff::constant(config.cooldown),
        );
        let machine = Config::new().failure_policy(policy).instrument(recorder).build();

        PublishBreaker {
            machine,
            state,
            config,
        }
    }

    pub fn config(&self) -> BreakerConfig {
        self.config
    }

    /// Last observed state. Open -> half-open is detected lazily on the next call.
    pub fn state(&self) -> BreakerState {
        match self.state.load(Ordering::SeqCst) {
            OPEN => BreakerState::Open,
            HALF_OPEN => BreakerState::HalfOpen,
            _ => BreakerState::Closed,
        }
    }

    pub async fn call<T, E, Fut>(&self, f: Fut) -> Result<T, BreakerError<E>>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        match self.machine.call(f).await {
            Ok(value) => Ok(value),
            Err(FailsafeError::Rejected) => Err(BreakerError::Open),
            Err(FailsafeError::Inner(e)) => Err(BreakerError::Inner(e)),
        }
    }
}
