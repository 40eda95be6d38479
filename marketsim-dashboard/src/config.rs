use crate::runtime::ReconnectPolicy;
use marketsim_feed::{FeedConfig, FeedTopic, TraderId};
use std::{env, str::FromStr, time::Duration};

/// Dashboard configuration derived from environment variables.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// Backend base url, topic paths are appended to it.
    pub base_url: String,
    pub ping_interval: Duration,
    /// `None` disables the idle read timeout.
    pub read_timeout: Option<Duration>,
    pub channel_buffer_size: usize,
    pub reconnect: ReconnectPolicy,
    pub track_volume: bool,
    pub alert_capacity: usize,
    pub heartbeat_interval: Duration,
    /// Trader selected for the flag overlay at startup.
    pub watch_trader: Option<TraderId>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            base_url: "ws://localhost:9000".to_string(),
            ping_interval: Duration::from_secs(30),
            read_timeout: Some(Duration::from_secs(120)),
            channel_buffer_size: 1000,
            reconnect: ReconnectPolicy::default(),
            track_volume: false,
            alert_capacity: 50,
            heartbeat_interval: Duration::from_secs(10),
            watch_trader: None,
        }
    }
}

impl DashboardConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let read_timeout_secs = env_parse(
            "FEED_READ_TIMEOUT_SECS",
            defaults.read_timeout.map(|t| t.as_secs()).unwrap_or_default(),
        );

        Self {
            base_url: env_str("FEED_BASE_URL", &defaults.base_url),
            ping_interval: Duration::from_secs(
                env_parse("FEED_PING_SECS", defaults.ping_interval.as_secs()).max(1),
            ),
            read_timeout: (read_timeout_secs > 0).then(|| Duration::from_secs(read_timeout_secs)),
            channel_buffer_size: env_parse("FEED_BUFFER_SIZE", defaults.channel_buffer_size).max(1),
            reconnect: ReconnectPolicy {
                initial_delay: Duration::from_millis(env_parse(
                    "RECONNECT_DELAY_MS",
                    defaults.reconnect.initial_delay.as_millis() as u64,
                )),
                max_delay: Duration::from_millis(env_parse(
                    "RECONNECT_MAX_DELAY_MS",
                    defaults.reconnect.max_delay.as_millis() as u64,
                )),
                ..defaults.reconnect
            },
            track_volume: env_bool("TRACK_VOLUME", defaults.track_volume),
            alert_capacity: env_parse("ALERT_CAPACITY", defaults.alert_capacity),
            heartbeat_interval: Duration::from_secs(
                env_parse("HEARTBEAT_SECS", defaults.heartbeat_interval.as_secs()).max(1),
            ),
            watch_trader: env::var("WATCH_TRADER_ID")
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .map(TraderId),
        }
    }

    /// Connection settings for a single topic.
    pub fn feed_config(&self, topic: FeedTopic) -> FeedConfig {
        FeedConfig::new(topic.url(&self.base_url))
            .with_ping_interval(self.ping_interval)
            .with_read_timeout(self.read_timeout)
            .with_channel_buffer_size(self.channel_buffer_size)
    }
}

fn env_str(name: &str, default: &str) -> String {
    non_empty(env::var(name).ok()).unwrap_or_else(|| default.to_string())
}

fn env_parse<T: FromStr>(name: &str, default: T) -> T {
    parse_or(env::var(name).ok(), default)
}

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name).ok().map(|s| is_truthy(&s)).unwrap_or(default)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parse_or<T: FromStr>(value: Option<String>, default: T) -> T {
    value
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}
