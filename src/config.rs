use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_stale_timeout")]
    pub stale_timeout_ms: u64,
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_ms: u64,
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: String,
}

fn default_poll_interval() -> u64 {
    200
}
fn default_stale_timeout() -> u64 {
    1000
}
fn default_heartbeat_interval() -> u64 {
    300
}
fn default_tick_interval() -> u64 {
    16
}
fn default_store_path() -> String {
    "/tmp/multiwin/windows.json".to_string()
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            stale_timeout_ms: default_stale_timeout(),
            heartbeat_interval_ms: default_heartbeat_interval(),
            tick_interval_ms: default_tick_interval(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

/// Upper bound for every interval setting: one day.
pub const MAX_INTERVAL_MS: u64 = 86_400_000;

fn millis(ms: u64) -> chrono::Duration {
    chrono::Duration::milliseconds(ms.min(MAX_INTERVAL_MS) as i64)
}

impl RegistryConfig {
    pub fn poll_interval(&self) -> chrono::Duration {
        millis(self.poll_interval_ms)
    }

    pub fn stale_timeout(&self) -> chrono::Duration {
        millis(self.stale_timeout_ms)
    }

    pub fn heartbeat_interval(&self) -> chrono::Duration {
        millis(self.heartbeat_interval_ms)
    }

    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.tick_interval_ms.min(MAX_INTERVAL_MS))
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("poll_interval_ms", self.poll_interval_ms),
            ("stale_timeout_ms", self.stale_timeout_ms),
            ("heartbeat_interval_ms", self.heartbeat_interval_ms),
            ("tick_interval_ms", self.tick_interval_ms),
        ] {
            anyhow::ensure!(
                value > 0 && value <= MAX_INTERVAL_MS,
                "{} ({}) must be between 1 and {}",
                name,
                value,
                MAX_INTERVAL_MS
            );
        }
        anyhow::ensure!(
            self.heartbeat_interval_ms < self.stale_timeout_ms,
            "heartbeat_interval_ms ({}) must be below stale_timeout_ms ({})",
            self.heartbeat_interval_ms,
            self.stale_timeout_ms
        );
        // A heartbeat only goes out on a tick, so it can land up to one tick late.
        let worst_refresh =
            self.tick_interval_ms + self.tick_interval_ms.max(self.heartbeat_interval_ms);
        anyhow::ensure!(
            worst_refresh < self.stale_timeout_ms,
            "tick_interval_ms ({}) and heartbeat_interval_ms ({}) leave a live window \
             unrefreshed for up to {} ms, which is not below stale_timeout_ms ({})",
            self.tick_interval_ms,
            self.heartbeat_interval_ms,
            worst_refresh,
            self.stale_timeout_ms
        );
        Ok(())
    }
}

impl Config {
    pub fn default_path() -> PathBuf {
        PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".to_string()))
            .join(".config")
            .join("multiwin")
            .join("config.toml")
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            let config = Self::default();
            config.save(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.registry.validate()?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
