//! API configuration.

use std::time::Duration;

/// Timing of watch streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchConfig {
    /// Delay between two snapshots.
    pub poll_interval: Duration,
    /// Streams are closed once open this long.
    pub idle_timeout: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            idle_timeout: Duration::from_secs(600),
        }
    }
}

impl WatchConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }
}

/// Configuration of the resource API router.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Prefix of every resource route, e.g. `/global-hub-api/v1`.
    pub base_path: String,
    pub watch: WatchConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_path: "/global-hub-api/v1".into(),
            watch: WatchConfig::default(),
        }
    }
}

impl ApiConfig {
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        let path = base_path.into();
        let trimmed = path.trim_end_matches('/');
        self.base_path = if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{trimmed}")
        };
        self
    }

    pub fn with_watch(mut self, watch: WatchConfig) -> Self {
        self.watch = watch;
        self
    }
}
