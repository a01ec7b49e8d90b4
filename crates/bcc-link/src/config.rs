//! Runtime settings for lock handling and takeover policy
//!
//! Settings come from `BCC_*` environment variables or a JSON file; any
//! field left out keeps its default.

use crate::error::{LinkError, Result};
use crate::reconcile::{MissingPolicy, ReconcileOptions};
use crate::retry::Backoff;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const ENV_MAX_ATTEMPTS: &str = "BCC_LOCK_MAX_ATTEMPTS";
pub const ENV_INITIAL_DELAY_MS: &str = "BCC_LOCK_INITIAL_DELAY_MS";
pub const ENV_MAX_DELAY_MS: &str = "BCC_LOCK_MAX_DELAY_MS";
pub const ENV_BACKOFF_MULTIPLIER: &str = "BCC_LOCK_BACKOFF_MULTIPLIER";
pub const ENV_POLL_INTERVAL_MS: &str = "BCC_LOCK_POLL_INTERVAL_MS";
pub const ENV_LOCK_TIMEOUT_SECS: &str = "BCC_LOCK_TIMEOUT_SECS";
pub const ENV_FORCE_FOREIGN: &str = "BCC_FORCE_FOREIGN";
pub const ENV_TOLERATE_MISSING: &str = "BCC_TOLERATE_MISSING";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkSettings {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub poll_interval_ms: u64,
    pub lock_timeout_secs: u64,
    pub force_foreign: bool,
    pub tolerate_missing: bool,
}

impl Default for LinkSettings {
    fn default() -> Self {
        let backoff = Backoff::default();
        Self {
            max_attempts: backoff.max_attempts,
            initial_delay_ms: backoff.initial_delay.as_millis() as u64,
            max_delay_ms: backoff.max_delay.as_millis() as u64,
            backoff_multiplier: backoff.backoff_multiplier,
            poll_interval_ms: backoff.poll_interval.as_millis() as u64,
            lock_timeout_secs: backoff.max_total_wait.as_secs(),
            force_foreign: false,
            tolerate_missing: false,
        }
    }
}

impl LinkSettings {
    /// Defaults overridden by whichever `BCC_*` variables are set
    pub fn from_env() -> Result<Self> {
        let mut settings = Self::default();

        if let Some(v) = env_parse(ENV_MAX_ATTEMPTS)? {
            settings.max_attempts = v;
        }
        if let Some(v) = env_parse(ENV_INITIAL_DELAY_MS)? {
            settings.initial_delay_ms = v;
        }
        if let Some(v) = env_parse(ENV_MAX_DELAY_MS)? {
            settings.max_delay_ms = v;
        }
        if let Some(v) = env_parse(ENV_BACKOFF_MULTIPLIER)? {
            settings.backoff_multiplier = v;
        }
        if let Some(v) = env_parse(ENV_POLL_INTERVAL_MS)? {
            settings.poll_interval_ms = v;
        }
        if let Some(v) = env_parse(ENV_LOCK_TIMEOUT_SECS)? {
            settings.lock_timeout_secs = v;
        }
        if let Some(v) = env_parse(ENV_FORCE_FOREIGN)? {
            settings.force_foreign = v;
        }
        if let Some(v) = env_parse(ENV_TOLERATE_MISSING)? {
            settings.tolerate_missing = v;
        }

        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let settings: LinkSettings = serde_json::from_str(&content)?;
        settings.validate()?;
        tracing::debug!("Loaded link settings from {}", path.as_ref().display());
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(LinkError::InvalidConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(LinkError::InvalidConfig(format!(
                "backoff_multiplier must be >= 1.0, got {}",
                self.backoff_multiplier
            )));
        }
        if self.initial_delay_ms > self.max_delay_ms {
            return Err(LinkError::InvalidConfig(format!(
                "initial_delay_ms ({}) exceeds max_delay_ms ({})",
                self.initial_delay_ms, self.max_delay_ms
            )));
        }
        Ok(())
    }

    pub fn backoff(&self) -> Backoff {
        Backoff {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            backoff_multiplier: self.backoff_multiplier,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            max_total_wait: Duration::from_secs(self.lock_timeout_secs),
        }
    }

    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            missing: if self.tolerate_missing {
                MissingPolicy::Skip
            } else {
                MissingPolicy::Fail
            },
            force_foreign: self.force_foreign,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| LinkError::InvalidConfig(format!("{}: invalid value {:?}", name, raw))),
        Err(_) => Ok(None),
    }
}
