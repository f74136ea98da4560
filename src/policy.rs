//! Wait and termination policy for the polling loop.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// How the delay between poll rounds grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    /// Same delay every round.
    Fixed,
    /// `base_delay_ms * 2^(round - 1)`, capped at `max_delay_ms`.
    Exponential,
}

/// Configuration for the poller's round delay and its bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollPolicy {
    #[serde(default = "default_backoff")]
    pub backoff: Backoff,

    /// Delay before the first round, in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Fraction of the delay randomized in either direction (0.0 disables).
    #[serde(default = "default_jitter")]
    pub jitter: f64,

    /// Rounds to run before giving up on the remaining jobs.
    #[serde(default)]
    pub max_rounds: Option<u32>,

    /// Wall-clock bound for the whole polling phase, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: Option<u64>,
}

fn default_backoff() -> Backoff {
    Backoff::Exponential
}

fn default_base_delay_ms() -> u64 {
    5000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_jitter() -> f64 {
    0.1
}

fn default_timeout_secs() -> Option<u64> {
    Some(1800)
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            backoff: default_backoff(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: default_jitter(),
            max_rounds: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl PollPolicy {
    /// Constant delay with no jitter.
    pub fn fixed(delay_ms: u64) -> Self {
        Self {
            backoff: Backoff::Fixed,
            base_delay_ms: delay_ms,
            max_delay_ms: delay_ms,
            jitter: 0.0,
            ..Default::default()
        }
    }

    /// Nominal delay for `round` (1-based), before jitter.
    pub fn base_delay_for_round(&self, round: u32) -> Duration {
        let ms = match self.backoff {
            Backoff::Fixed => self.base_delay_ms,
            Backoff::Exponential => {
                let factor = 2u64.saturating_pow(round.saturating_sub(1));
                self.base_delay_ms
                    .saturating_mul(factor)
                    .min(self.max_delay_ms.max(self.base_delay_ms))
            }
        };
        Duration::from_millis(ms)
    }

    /// Delay to wait before `round`, jitter applied.
    pub fn delay_for_round(&self, round: u32) -> Duration {
        let base = self.base_delay_for_round(round);
        // NaN passes through clamp; treat any non-finite jitter as none.
        let jitter = if self.jitter.is_finite() {
            self.jitter.clamp(0.0, 1.0)
        } else {
            0.0
        };
        if jitter == 0.0 || base.is_zero() {
            return base;
        }
        let factor = rand::thread_rng().gen_range((1.0 - jitter)..=(1.0 + jitter));
        base.mul_f64(factor)
    }

    /// Delay after a round in which the platform throttled us: the cap,
    /// without jitter.
    pub fn throttled_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms.max(self.base_delay_ms))
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Whether another round may start after `rounds_done` rounds and
    /// `elapsed` time.
    pub fn allows_round(&self, rounds_done: u32, elapsed: Duration) -> bool {
        if self.max_rounds.is_some_and(|max| rounds_done >= max) {
            return false;
        }
        !self.timeout().is_some_and(|limit| elapsed >= limit)
    }
}
