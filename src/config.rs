// src/config.rs
//
// Transport settings. Defaults, then an optional YAML file named by
// `TWDATA_CONFIG`, then individual `TWDATA_*` variables.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const CONFIG_ENV: &str = "TWDATA_CONFIG";

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Working days the price-ratio fetch walks back looking for a report.
    pub lookback_days: usize,
    /// Pause between two look-back requests.
    pub lookback_pause_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            lookback_days: 14,
            lookback_pause_ms: 1120,
        }
    }
}

impl Settings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn lookback_pause(&self) -> Duration {
        Duration::from_millis(self.lookback_pause_ms)
    }

    /// Settings from the process environment.
    pub fn load() -> Result<Self> {
        Self::from_sources(|key| std::env::var(key).ok())
    }

    /// Settings from an arbitrary variable lookup.
    pub fn from_sources(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut settings = match var(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        settings.apply_overrides(var)?;
        debug!(?settings, "settings loaded");
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_yaml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        fn parsed<T: std::str::FromStr>(key: &str, raw: String) -> Result<T>
        where
            T::Err: std::error::Error + Send + Sync + 'static,
        {
            raw.trim()
                .parse()
                .with_context(|| format!("parsing {}={:?}", key, raw))
        }

        if let Some(raw) = var("TWDATA_TIMEOUT_SECS") {
            self.timeout_secs = parsed("TWDATA_TIMEOUT_SECS", raw)?;
        }
        if let Some(raw) = var("TWDATA_USER_AGENT") {
            self.user_agent = raw;
        }
        if let Some(raw) = var("TWDATA_LOOKBACK_DAYS") {
            self.lookback_days = parsed("TWDATA_LOOKBACK_DAYS", raw)?;
        }
        if let Some(raw) = var("TWDATA_LOOKBACK_PAUSE_MS") {
            self.lookback_pause_ms = parsed("TWDATA_LOOKBACK_PAUSE_MS", raw)?;
        }
        Ok(())
    }
}
