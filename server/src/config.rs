use std::path::PathBuf;
use std::time::Duration;

use gw2map_client::MarkerTuning;
use gw2map_shared::{Channel, ChannelSettings, MapContext};

pub const SERVER_PORT: u16 = 3000;
pub const SSE_KEEPALIVE_SECS: u64 = 15;
pub const DEFAULT_EVENT_BUFFER: usize = 256;

// Live markers
pub const DEFAULT_EXPIRY_SECS: u64 = 40;
pub const DEFAULT_SWEEP_SECS: u64 = 30; // expiry may lag by up to one sweep
pub const DEFAULT_FRAME_MS: u64 = 15;
pub const DEFAULT_RECONNECT_BASE_MS: u64 = 500;
pub const DEFAULT_RECONNECT_MAX_MS: u64 = 10_000;
pub const DEFAULT_BROKER_URL: &str = "wss://post.gw2.io:8084/ws";
pub const BROKER_KEEP_ALIVE_SECS: u64 = 30;
pub const BROKER_REQUEST_QUEUE: usize = 16;
pub const PAYLOAD_QUEUE: usize = 1024;
pub const REPLAY_INTERVAL_MS: u64 = 100;
pub const COMMAND_QUEUE: usize = 32;

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_positive_u64(key: &str) -> Option<u64> {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
}

pub fn server_port() -> u16 {
    std::env::var("SERVER_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(SERVER_PORT)
}

/// MQTT broker to subscribe to. `off` disables the live source.
pub fn broker_url() -> Option<String> {
    match env_string("LIVE_BROKER_URL") {
        Some(value) if value.eq_ignore_ascii_case("off") => None,
        Some(value) => Some(value),
        None => Some(DEFAULT_BROKER_URL.to_string()),
    }
}

pub fn broker_client_id() -> String {
    env_string("LIVE_CLIENT_ID").unwrap_or_else(|| {
        format!(
            "gw2map-{}-{}",
            std::process::id(),
            chrono::Utc::now().timestamp_millis()
        )
    })
}

/// Username and token for brokers that require them; both must be set.
pub fn broker_credentials() -> Option<(String, String)> {
    Some((
        env_string("LIVE_BROKER_USERNAME")?,
        env_string("LIVE_BROKER_PASSWORD")?,
    ))
}

/// Newline-delimited JSON capture replayed instead of the relay.
pub fn replay_file() -> Option<PathBuf> {
    env_string("LIVE_REPLAY_FILE").map(PathBuf::from)
}

pub fn channel_settings() -> ChannelSettings {
    ChannelSettings {
        channel: env_string("LIVE_CHANNEL")
            .and_then(|value| Channel::parse(&value))
            .unwrap_or_default(),
        region: env_string("LIVE_REGION"),
        wvw_match: env_string("LIVE_WVW_MATCH"),
        wvw_team: env_string("LIVE_WVW_TEAM"),
        guild_channel: env_string("LIVE_GUILD_CHANNEL"),
        custom_channel: env_string("LIVE_CUSTOM_CHANNEL"),
    }
}

pub fn initial_context() -> MapContext {
    env_string("LIVE_MAP")
        .and_then(|value| MapContext::parse(&value))
        .unwrap_or_default()
}

pub fn local_account() -> Option<String> {
    env_string("LIVE_LOCAL_ACCOUNT")
}

pub fn expiry() -> Duration {
    Duration::from_secs(env_positive_u64("LIVE_EXPIRY_SECS").unwrap_or(DEFAULT_EXPIRY_SECS))
}

pub fn sweep_interval() -> Duration {
    Duration::from_secs(env_positive_u64("LIVE_SWEEP_SECS").unwrap_or(DEFAULT_SWEEP_SECS))
}

pub fn frame_interval() -> Duration {
    Duration::from_millis(env_positive_u64("LIVE_FRAME_MS").unwrap_or(DEFAULT_FRAME_MS))
}

pub fn event_buffer() -> usize {
    std::env::var("LIVE_EVENT_BUFFER")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_EVENT_BUFFER)
}

pub fn reconnect_base() -> Duration {
    Duration::from_millis(
        env_positive_u64("LIVE_RECONNECT_BASE_MS").unwrap_or(DEFAULT_RECONNECT_BASE_MS),
    )
}

/// Never below [`reconnect_base`].
pub fn reconnect_max() -> Duration {
    let max = Duration::from_millis(
        env_positive_u64("LIVE_RECONNECT_MAX_MS").unwrap_or(DEFAULT_RECONNECT_MAX_MS),
    );
    max.max(reconnect_base())
}

pub fn marker_tuning() -> MarkerTuning {
    let mut tuning = MarkerTuning::default();
    tuning.curve.frame_ms = frame_interval().as_millis() as f64;
    tuning.expiry = expiry();
    tuning
}
