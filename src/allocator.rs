//! Allocation of gift card numbers that do not exist in storage yet.

use rand::Rng;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::number::{NumberError, NumberFormat, generate_candidate};
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AllocateError {
    #[error(transparent)]
    InvalidLength(#[from] NumberError),

    #[error("no unique gift card number found after {attempts} attempts")]
    ExhaustedAttempts { attempts: u32 },

    #[error("existence check failed: {0}")]
    Store(#[from] StoreError),

    #[error("number allocation cancelled")]
    Cancelled,
}

/// Retry policy for number allocation.
#[derive(Debug, Clone)]
pub struct AllocatorConfig {
    pub format: NumberFormat,
    pub max_attempts: u32,
    /// Upper bound (exclusive) of the random pause after a collision.
    pub max_backoff: Duration,
    /// Stop retrying once this much time has passed, if set.
    pub time_budget: Option<Duration>,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            format: NumberFormat::default(),
            max_attempts: 100,
            max_backoff: Duration::from_millis(100),
            time_budget: None,
        }
    }
}

impl AllocatorConfig {
    /// Defaults, overridden by `GIFTCARD_*` environment variables when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(length) = env_setting("GIFTCARD_NUMBER_LENGTH") {
            config.format.length = length;
        }
        if let Some(prefix) = env_setting("GIFTCARD_NUMBER_PREFIX") {
            config.format.prefix = prefix;
        }
        if let Some(max_attempts) = env_setting("GIFTCARD_MAX_ATTEMPTS") {
            config.max_attempts = max_attempts;
        }
        if let Some(ms) = env_setting("GIFTCARD_MAX_BACKOFF_MS") {
            config.max_backoff = Duration::from_millis(ms);
        }
        if let Some(ms) = env_setting("GIFTCARD_TIME_BUDGET_MS") {
            config.time_budget = Some(Duration::from_millis(ms));
        }
        config
    }
}

fn env_setting<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparsable setting");
            None
        }
    }
}

/// Turns the random candidate generator into a producer of unused numbers.
#[derive(Debug, Clone, Default)]
pub struct Allocator {
    config: AllocatorConfig,
}

impl Allocator {
    pub fn new(config: AllocatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    /// Generate candidates until `exists` reports one as unused.
    ///
    /// An `exists` error aborts immediately. Collisions are followed by a
    /// random pause in `[0, max_backoff)`. Both the check and the pause give
    /// way to `cancel`.
    pub async fn allocate<R, F, Fut>(
        &self,
        rng: &mut R,
        cancel: &CancellationToken,
        mut exists: F,
    ) -> Result<String, AllocateError>
    where
        R: Rng,
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<bool, StoreError>>,
    {
        let NumberFormat { length, prefix } = &self.config.format;
        let max_attempts = self.config.max_attempts;
        let started = Instant::now();

        for attempt in 1..=max_attempts {
            if let Some(budget) = self.config.time_budget {
                if attempt > 1 && started.elapsed() >= budget {
                    warn!(
                        attempts = attempt - 1,
                        budget_ms = budget.as_millis() as u64,
                        "number allocation ran out of time"
                    );
                    return Err(AllocateError::ExhaustedAttempts {
                        attempts: attempt - 1,
                    });
                }
            }

            let candidate = generate_candidate(&mut *rng, *length, prefix)?;

            let taken = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AllocateError::Cancelled),
                result = exists(candidate.clone()) => result?,
            };

            if !taken {
                debug!(attempt, number = %candidate, "gift card number allocated");
                return Ok(candidate);
            }

            info!(attempt, "gift card number already exists, retrying");

            if attempt < max_attempts {
                let delay = self.backoff(&mut *rng);
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(AllocateError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        warn!(max_attempts, "no unique gift card number could be generated");
        Err(AllocateError::ExhaustedAttempts {
            attempts: max_attempts,
        })
    }

    fn backoff<R: Rng>(&self, rng: &mut R) -> Duration {
        let max_micros = self.config.max_backoff.as_micros() as u64;
        if max_micros == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(rng.random_range(0..max_micros))
    }
}
