//! Subscriber configuration.
//!
//! - Filter: `RUST_LOG` when set and valid, otherwise `info`.
//! - Format: `GATEHOUSE_LOG_FORMAT` = `json` (default) or `pretty`.

use tracing_subscriber::EnvFilter;

pub const ENV_LOG_FORMAT: &str = "GATEHOUSE_LOG_FORMAT";
pub const DEFAULT_FILTER: &str = "info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event, with timestamps.
    #[default]
    Json,
    /// Human-readable multi-line output for local runs.
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Fallback filter directive when `RUST_LOG` is absent or invalid.
    pub default_filter: String,
    pub format: LogFormat,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            default_filter: DEFAULT_FILTER.to_string(),
            format: LogFormat::default(),
        }
    }
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let format = match lookup(ENV_LOG_FORMAT).as_deref().map(str::trim) {
            Some(f) if f.eq_ignore_ascii_case("pretty") => LogFormat::Pretty,
            _ => LogFormat::Json,
        };
        Self {
            format,
            ..Self::default()
        }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.default_filter))
    }
}

/// Install the global subscriber. Returns `false` if one was already set.
pub fn init(settings: &LogSettings) -> bool {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(settings.filter())
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false);

    match settings.format {
        LogFormat::Json => builder.json().try_init().is_ok(),
        LogFormat::Pretty => builder.pretty().try_init().is_ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_comes_from_lookup() {
        let pretty = LogSettings::from_lookup(|name| {
            (name == ENV_LOG_FORMAT).then(|| "Pretty".to_string())
        });
        assert_eq!(pretty.format, LogFormat::Pretty);

        let unknown = LogSettings::from_lookup(|_| Some("xml".to_string()));
        assert_eq!(unknown.format, LogFormat::Json);
        assert_eq!(unknown.default_filter, DEFAULT_FILTER);
    }

    #[test]
    fn second_init_is_a_no_op() {
        let settings = LogSettings::default();
        let _ = init(&settings);
        assert!(!init(&settings));
    }
}
