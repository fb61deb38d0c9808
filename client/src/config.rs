//! Client configuration loaded from environment variables.

use std::time::Duration;

use crate::error::ClientError;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:3000";
const DEFAULT_RECONNECT_ATTEMPTS: u32 = 5;
const DEFAULT_RECONNECT_DELAY_MS: u64 = 1000;
const DEFAULT_TYPING_EXPIRY_MS: u64 = 3000;

#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// HTTP base URL of the server (e.g. `"http://127.0.0.1:3000"`).
    pub base_url: String,
    /// Reconnect attempts after a drop before giving up.
    pub reconnect_attempts: u32,
    /// Fixed delay between reconnect attempts.
    pub reconnect_delay: Duration,
    /// How long a remote typing indicator stays visible without a refresh.
    pub typing_expiry: Duration,
}

impl ClientConfig {
    /// Defaults pointed at `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            reconnect_attempts: DEFAULT_RECONNECT_ATTEMPTS,
            reconnect_delay: Duration::from_millis(DEFAULT_RECONNECT_DELAY_MS),
            typing_expiry: Duration::from_millis(DEFAULT_TYPING_EXPIRY_MS),
        }
    }

    /// Load client config from environment with defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let base_url = std::env::var("BOARDCHAT_BASE_URL")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());
        Self {
            base_url,
            reconnect_attempts: env_parse("BOARDCHAT_RECONNECT_ATTEMPTS", DEFAULT_RECONNECT_ATTEMPTS),
            reconnect_delay: Duration::from_millis(env_parse("BOARDCHAT_RECONNECT_DELAY_MS", DEFAULT_RECONNECT_DELAY_MS)),
            typing_expiry: Duration::from_millis(env_parse("BOARDCHAT_TYPING_EXPIRY_MS", DEFAULT_TYPING_EXPIRY_MS)),
        }
    }

    /// WebSocket endpoint derived from the HTTP base URL.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidBaseUrl`] for non-HTTP schemes.
    pub fn ws_url(&self) -> Result<String, ClientError> {
        let trimmed = self.base_url.trim_end_matches('/');

        if let Some(rest) = trimmed.strip_prefix("http://") {
            return Ok(format!("ws://{rest}/api/ws"));
        }
        if let Some(rest) = trimmed.strip_prefix("https://") {
            return Ok(format!("wss://{rest}/api/ws"));
        }

        Err(ClientError::InvalidBaseUrl(self.base_url.clone()))
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
