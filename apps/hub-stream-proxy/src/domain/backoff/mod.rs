//! Backoff Policy
//!
//! Maps a consecutive-failure count to the wait before the next connection
//! attempt. The reconnect loop only sees [`BackoffPolicy`], so the linear
//! policy can be swapped for a capped exponential one without touching it.

use std::fmt::Debug;
use std::time::Duration;

use rand::Rng;

/// Wait computation for the reconnect loop.
pub trait BackoffPolicy: Debug + Send + Sync {
    /// Wait before the next attempt after `consecutive_failures` failures.
    ///
    /// Zero failures always means no wait.
    fn delay(&self, consecutive_failures: u32) -> Duration;
}

// =============================================================================
// Linear
// =============================================================================

/// `wait(n) = n * step`, uncapped and without jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearBackoff {
    step: Duration,
}

impl LinearBackoff {
    /// Linear backoff with a custom step.
    #[must_use]
    pub const fn new(step: Duration) -> Self {
        Self { step }
    }

    /// Step added per consecutive failure.
    #[must_use]
    pub const fn step(&self) -> Duration {
        self.step
    }
}

impl Default for LinearBackoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl BackoffPolicy for LinearBackoff {
    fn delay(&self, consecutive_failures: u32) -> Duration {
        self.step.saturating_mul(consecutive_failures)
    }
}

// =============================================================================
// Exponential
// =============================================================================

/// Configuration for [`ExponentialBackoff`].
#[derive(Debug, Clone)]
pub struct ExponentialConfig {
    /// Wait after the first failure.
    pub initial_delay: Duration,
    /// Upper bound before jitter.
    pub max_delay: Duration,
    /// Growth factor per additional failure.
    pub multiplier: f64,
    /// Jitter as a fraction of the computed wait (0.1 = ±10%).
    pub jitter_factor: f64,
}

impl Default for ExponentialConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(64),
            multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

/// `wait(n) = min(initial * multiplier^(n-1), max)` with ±jitter.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    config: ExponentialConfig,
}

impl ExponentialBackoff {
    /// Create the policy.
    #[must_use]
    pub const fn new(config: ExponentialConfig) -> Self {
        Self { config }
    }

    /// Wait before jitter is applied.
    #[must_use]
    pub fn base_delay(&self, consecutive_failures: u32) -> Duration {
        if consecutive_failures == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(consecutive_failures - 1).unwrap_or(i32::MAX);
        #[allow(clippy::cast_precision_loss)]
        let initial_millis = self.config.initial_delay.as_millis() as f64;
        #[allow(clippy::cast_precision_loss)]
        let max_millis = self.config.max_delay.as_millis() as f64;
        let scaled = initial_millis * self.config.multiplier.powi(exponent);
        let capped = if scaled.is_finite() {
            scaled.clamp(0.0, max_millis)
        } else {
            max_millis
        };

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let millis = capped.round() as u64;
        Duration::from_millis(millis)
    }

    fn apply_jitter(&self, duration: Duration) -> Duration {
        if self.config.jitter_factor <= 0.0 || duration.is_zero() {
            return duration;
        }

        #[allow(clippy::cast_precision_loss)]
        let base_millis = duration.as_millis() as f64;
        let jitter_range = base_millis * self.config.jitter_factor;
        let jitter: f64 = rand::rng().random_range(-jitter_range..=jitter_range);
        let adjusted_millis = (base_millis + jitter).max(1.0);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let adjusted_u64 = adjusted_millis as u64;
        Duration::from_millis(adjusted_u64)
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(ExponentialConfig::default())
    }
}

impl BackoffPolicy for ExponentialBackoff {
    fn delay(&self, consecutive_failures: u32) -> Duration {
        self.apply_jitter(self.base_delay(consecutive_failures))
    }
}
