use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

/// Prefix of every environment variable read by [`MonitorCfg::from_env`].
pub const ENV_PREFIX: &str = "AQUARIO_";

/// All monitor parameters. Loaded from `AQUARIO_*` environment variables at startup;
/// anything missing or unparseable keeps its default.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorCfg {
    // controller
    pub base_url: String,
    /// Per-request timeout in seconds. 0 = no timeout.
    pub request_timeout_secs: u64,

    // polling
    pub poll_interval_ms: u64,
    pub history_capacity: usize,
    /// Apply fetches that were already in flight when the poller stopped.
    pub accept_late_samples: bool,

    // bounds shown until the controller answers
    pub default_min: f64,
    pub default_max: f64,

    // operator notices
    pub notice_buffer: usize,
}

impl Default for MonitorCfg {
    fn default() -> Self {
        Self {
            base_url: aquario_client::http::DEFAULT_BASE_URL.to_owned(),
            request_timeout_secs: 0,
            poll_interval_ms: 7000,
            history_capacity: 20,
            accept_late_samples: true,
            default_min: 22.0,
            default_max: 28.0,
            notice_buffer: 64,
        }
    }
}

impl MonitorCfg {
    /// Load config from the process environment.
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Load config from `(name, value)` pairs, keeping only `AQUARIO_*` names.
    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Self {
        let map: HashMap<String, String> = vars
            .into_iter()
            .filter_map(|(k, v)| {
                k.strip_prefix(ENV_PREFIX)
                    .map(|key| (key.to_ascii_lowercase(), v))
            })
            .collect();
        Self::from_map(&map)
    }

    fn from_map(m: &HashMap<String, String>) -> Self {
        let d = Self::default();
        Self {
            base_url: get_or(m, "base_url", d.base_url),
            request_timeout_secs: get_or(m, "request_timeout_secs", d.request_timeout_secs),
            poll_interval_ms: get_or(m, "poll_interval_ms", d.poll_interval_ms),
            history_capacity: get_or(m, "history_capacity", d.history_capacity),
            accept_late_samples: get_or(m, "accept_late_samples", d.accept_late_samples),
            default_min: get_or(m, "default_min", d.default_min),
            default_max: get_or(m, "default_max", d.default_max),
            notice_buffer: get_or(m, "notice_buffer", d.notice_buffer),
        }
    }

    /// Every key with its current value and a short description.
    pub fn to_entries(&self) -> Vec<(&str, String, &str)> {
        vec![
            ("base_url", self.base_url.clone(), "Heater controller base URL"),
            ("request_timeout_secs", self.request_timeout_secs.to_string(), "Per-request timeout seconds (0 = none)"),
            ("poll_interval_ms", self.poll_interval_ms.to_string(), "Sample poll period ms"),
            ("history_capacity", self.history_capacity.to_string(), "Samples kept in history"),
            ("accept_late_samples", self.accept_late_samples.to_string(), "Apply in-flight fetches after stop"),
            ("default_min", self.default_min.to_string(), "Minimum bound before settings load"),
            ("default_max", self.default_max.to_string(), "Maximum bound before settings load"),
            ("notice_buffer", self.notice_buffer.to_string(), "Operator notice channel capacity"),
        ]
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }

    /// Bounds in effect until the controller's settings arrive.
    pub fn default_bounds(&self) -> aquario_client::TemperatureBounds {
        aquario_client::TemperatureBounds::new(self.default_min, self.default_max)
    }
}

fn get_or<T: std::str::FromStr>(map: &HashMap<String, String>, key: &str, default: T) -> T {
    map.get(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
