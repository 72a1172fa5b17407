//! Process configuration.
//!
//! Settings come from environment variables (`GATEHOUSE_*`). Missing values use
//! defaults; malformed values are logged and replaced by defaults rather than
//! aborting startup.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const ENV_DATA_DIR: &str = "GATEHOUSE_DATA_DIR";
pub const ENV_SESSION_TTL: &str = "GATEHOUSE_SESSION_TTL_SECS";
pub const ENV_SESSION_PURGE: &str = "GATEHOUSE_SESSION_PURGE_SECS";
pub const ENV_HASH_MEMORY: &str = "GATEHOUSE_HASH_MEMORY_KIB";
pub const ENV_HASH_ITERATIONS: &str = "GATEHOUSE_HASH_ITERATIONS";
pub const ENV_HASH_PARALLELISM: &str = "GATEHOUSE_HASH_PARALLELISM";

/// Top-level settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory for the user store and the session snapshot.
    /// `None` keeps everything in memory.
    pub data_dir: Option<PathBuf>,
    pub session: SessionSettings,
    pub hashing: HashSettings,
}

/// Session lifetime settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Sliding time-to-live (seconds).
    pub ttl_secs: u64,
    /// Interval between background purge sweeps (seconds).
    pub purge_interval_secs: u64,
}

impl SessionSettings {
    pub const DEFAULT_TTL_SECS: u64 = 60 * 60 * 12;
    pub const DEFAULT_PURGE_INTERVAL_SECS: u64 = 60;

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_secs)
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ttl_secs: Self::DEFAULT_TTL_SECS,
            purge_interval_secs: Self::DEFAULT_PURGE_INTERVAL_SECS,
        }
    }
}

/// Argon2 cost parameters.
///
/// `iterations` doubles as the minimum work factor a stored hash must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HashSettings {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashSettings {
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl Settings {
    /// Load settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Settings::default();
        let data_dir = lookup(ENV_DATA_DIR)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        let session = SessionSettings {
            ttl_secs: positive_or(&lookup, ENV_SESSION_TTL, defaults.session.ttl_secs),
            purge_interval_secs: positive_or(
                &lookup,
                ENV_SESSION_PURGE,
                defaults.session.purge_interval_secs,
            ),
        };

        let hashing = HashSettings {
            memory_kib: positive_or(&lookup, ENV_HASH_MEMORY, defaults.hashing.memory_kib),
            iterations: positive_or(&lookup, ENV_HASH_ITERATIONS, defaults.hashing.iterations),
            parallelism: positive_or(&lookup, ENV_HASH_PARALLELISM, defaults.hashing.parallelism),
        };

        Self {
            data_dir,
            session,
            hashing,
        }
    }
}

fn positive_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + PartialOrd + Default + core::fmt::Display + Copy,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(v) if v > T::default() => v,
        _ => {
            tracing::warn!(key, value = %raw, default = %default, "invalid setting; using default");
            default
        }
    }
}
