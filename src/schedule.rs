//! Caller-side polling cadence.
//!
//! The driver never retries on its own. Firmware waits `warmup_ms` after
//! power-up, then reads every `interval_ms`; after any failure it waits the
//! fixed `retry_delay_ms` before the next attempt.

use crate::Dht11Error;

pub const DEFAULT_WARMUP_MS: u64 = 1_000;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 3_000;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 3_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PollSchedule {
    pub warmup_ms: u64,
    pub interval_ms: u64,
    pub retry_delay_ms: u64,
}

impl Default for PollSchedule {
    fn default() -> Self {
        PollSchedule {
            warmup_ms: DEFAULT_WARMUP_MS,
            interval_ms: DEFAULT_POLL_INTERVAL_MS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}

impl PollSchedule {
    /// Builds a schedule from optional build-time values such as
    /// `option_env!("DHT11_POLL_INTERVAL_MS")`. Missing or malformed values
    /// fall back to the defaults.
    pub fn from_env_values(
        warmup: Option<&str>,
        interval: Option<&str>,
        retry_delay: Option<&str>,
    ) -> Self {
        PollSchedule {
            warmup_ms: parse_ms("DHT11_WARMUP_MS", warmup, DEFAULT_WARMUP_MS),
            interval_ms: parse_ms("DHT11_POLL_INTERVAL_MS", interval, DEFAULT_POLL_INTERVAL_MS),
            retry_delay_ms: parse_ms("DHT11_RETRY_DELAY_MS", retry_delay, DEFAULT_RETRY_DELAY_MS),
        }
    }

    /// How long to wait before the next acquisition, given the last outcome.
    pub fn next_delay_ms<T>(&self, last: &Result<T, Dht11Error>) -> u64 {
        match last {
            Ok(_) => self.interval_ms,
            Err(_) => self.retry_delay_ms,
        }
    }
}

fn parse_ms(name: &str, value: Option<&str>, default: u64) -> u64 {
    let Some(raw) = value else {
        return default;
    };
    match raw.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => ms,
        _ => {
            warn!("invalid {=str}={=str}, using {=u64}ms", name, raw, default);
            default
        }
    }
}
