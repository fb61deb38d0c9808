//! Server configuration loaded from environment variables.
//!
//! DESIGN
//! ======
//! Everything has a typed default except `DATABASE_URL`. Unparseable values
//! fall back to the default rather than failing startup, matching how the
//! realtime tuning knobs are treated elsewhere.

use std::time::Duration;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_MAX_ATTACHMENT_BYTES: usize = 5 * 1024 * 1024;
const DEFAULT_TYPING_EXPIRY_MS: u64 = 3000;
const DEFAULT_TYPING_SWEEP_INTERVAL_MS: u64 = 1000;
const DEFAULT_CLIENT_CHANNEL_CAPACITY: usize = 256;

/// Headroom for the JSON envelope and non-attachment fields of one frame.
const FRAME_OVERHEAD_BYTES: usize = 64 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),
}

/// Knobs used by the realtime core at runtime. Copied into `AppState`.
#[derive(Clone, Copy, Debug)]
pub struct RealtimeConfig {
    /// Upper bound on the decoded size of one inline attachment.
    pub max_attachment_bytes: usize,
    /// Inactivity window after which a typing entry is considered stale.
    pub typing_expiry: Duration,
    /// How often the server sweeps stale typing entries.
    pub typing_sweep_interval: Duration,
    /// Bounded outbound queue per connection.
    pub client_channel_capacity: usize,
}

impl RealtimeConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            max_attachment_bytes: env_parse("MAX_ATTACHMENT_BYTES", DEFAULT_MAX_ATTACHMENT_BYTES),
            typing_expiry: Duration::from_millis(env_parse("TYPING_EXPIRY_MS", DEFAULT_TYPING_EXPIRY_MS)),
            typing_sweep_interval: Duration::from_millis(
                env_parse("TYPING_SWEEP_INTERVAL_MS", DEFAULT_TYPING_SWEEP_INTERVAL_MS).max(1),
            ),
            client_channel_capacity: env_parse("CLIENT_CHANNEL_CAPACITY", DEFAULT_CLIENT_CHANNEL_CAPACITY).max(1),
        }
    }

    /// Largest websocket message accepted from a client. Base64 inflates the
    /// attachment by 4/3, plus room for the rest of the envelope.
    #[must_use]
    pub fn max_frame_bytes(&self) -> usize {
        self.max_attachment_bytes
            .saturating_mul(4)
            .div_ceil(3)
            .saturating_add(FRAME_OVERHEAD_BYTES)
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            max_attachment_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
            typing_expiry: Duration::from_millis(DEFAULT_TYPING_EXPIRY_MS),
            typing_sweep_interval: Duration::from_millis(DEFAULT_TYPING_SWEEP_INTERVAL_MS),
            client_channel_capacity: DEFAULT_CLIENT_CHANNEL_CAPACITY,
        }
    }
}

/// Process-level configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub database_url: String,
    pub port: u16,
    pub db_max_connections: u32,
    /// Allowed CORS origins. Empty means any origin.
    pub cors_allow_origins: Vec<String>,
    pub realtime: RealtimeConfig,
}

impl ServerConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] if `DATABASE_URL` is unset or empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        Ok(Self {
            database_url,
            port: env_parse("PORT", DEFAULT_PORT),
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS),
            cors_allow_origins: env_list("CORS_ALLOW_ORIGINS"),
            realtime: RealtimeConfig::from_env(),
        })
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn env_list(key: &str) -> Vec<String> {
    std::env::var(key)
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
