//! Device identity and tunables parsed from environment variables.
//!
//! DESIGN
//! ======
//! `DeviceConfig` is built once at startup and handed to every component by
//! `Arc`. Nothing in the crate reads process-wide state after construction,
//! so tests build configs directly with the `with_*` builders.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_PAIRING_WINDOW_MS: i64 = 1000;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 20;
pub const DEFAULT_STEP_DELAY_MS: u64 = 100;
pub const DEFAULT_SOLO_STEP_DELAY_MS: u64 = 500;
/// 50 dp at the 96 dpi reference density.
pub const DEFAULT_CELL_SIZE_INCHES: f64 = 0.520_833_333;
pub const DEFAULT_BROADCAST_CHANNEL: &str = "broadcast";
pub const DEFAULT_RELAY_URL: &str = "ws://127.0.0.1:3000/ws";

// =============================================================================
// DEVICE ID
// =============================================================================

/// Identity of one tile on the shared bus. Ordering is plain string order and
/// is what both ends of a link use to name its channels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// ERROR TYPE
// =============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("device id must not be empty")]
    EmptyDeviceId,
    #[error("cell size must be a positive number of inches, got {0}")]
    InvalidCellSize(f64),
    #[error("pairing window must not be negative, got {0}ms")]
    NegativePairingWindow(i64),
    #[error("poll interval must be at least 1ms")]
    ZeroPollInterval,
    #[error("broadcast channel name must not be empty")]
    EmptyBroadcastChannel,
}

// =============================================================================
// DEVICE CONFIG
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceConfig {
    pub device_id: DeviceId,
    /// Maximum distance between two swipe timestamps that still pairs.
    pub pairing_window_ms: i64,
    /// Upper bound on how long a barrier wait sleeps between re-checks.
    pub poll_interval: Duration,
    /// Pause between connected rounds.
    pub step_delay: Duration,
    /// Pause between generations while unpaired.
    pub solo_step_delay: Duration,
    pub cell_size_inches: f64,
    pub broadcast_channel: String,
    pub relay_url: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device_id: DeviceId::random(),
            pairing_window_ms: DEFAULT_PAIRING_WINDOW_MS,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            step_delay: Duration::from_millis(DEFAULT_STEP_DELAY_MS),
            solo_step_delay: Duration::from_millis(DEFAULT_SOLO_STEP_DELAY_MS),
            cell_size_inches: DEFAULT_CELL_SIZE_INCHES,
            broadcast_channel: DEFAULT_BROADCAST_CHANNEL.to_string(),
            relay_url: DEFAULT_RELAY_URL.to_string(),
        }
    }
}

impl DeviceConfig {
    /// Build config from environment variables. Unparseable values fall back
    /// to defaults; the result is validated before it is returned.
    ///
    /// Optional:
    /// - `LIFETILES_DEVICE_ID`: random UUID when absent
    /// - `LIFETILES_PAIRING_WINDOW_MS`: default 1000
    /// - `LIFETILES_POLL_INTERVAL_MS`: default 20
    /// - `LIFETILES_STEP_DELAY_MS`: default 100
    /// - `LIFETILES_SOLO_STEP_DELAY_MS`: default 500
    /// - `LIFETILES_CELL_SIZE_INCHES`: default 0.520833
    /// - `LIFETILES_BROADCAST_CHANNEL`: default `broadcast`
    /// - `LIFETILES_RELAY_URL`: default `ws://127.0.0.1:3000/ws`
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a parsed value is semantically invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let device_id = std::env::var("LIFETILES_DEVICE_ID").map_or_else(|_| DeviceId::random(), DeviceId::new);

        Self {
            device_id,
            pairing_window_ms: env_parse("LIFETILES_PAIRING_WINDOW_MS", DEFAULT_PAIRING_WINDOW_MS),
            poll_interval: Duration::from_millis(env_parse("LIFETILES_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS)),
            step_delay: Duration::from_millis(env_parse("LIFETILES_STEP_DELAY_MS", DEFAULT_STEP_DELAY_MS)),
            solo_step_delay: Duration::from_millis(env_parse(
                "LIFETILES_SOLO_STEP_DELAY_MS",
                DEFAULT_SOLO_STEP_DELAY_MS,
            )),
            cell_size_inches: env_parse("LIFETILES_CELL_SIZE_INCHES", DEFAULT_CELL_SIZE_INCHES),
            broadcast_channel: std::env::var("LIFETILES_BROADCAST_CHANNEL")
                .unwrap_or_else(|_| DEFAULT_BROADCAST_CHANNEL.to_string()),
            relay_url: std::env::var("LIFETILES_RELAY_URL").unwrap_or_else(|_| DEFAULT_RELAY_URL.to_string()),
        }
        .validate()
    }

    /// Reject values no component can run with.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.device_id.as_str().is_empty() {
            return Err(ConfigError::EmptyDeviceId);
        }
        if !(self.cell_size_inches.is_finite() && self.cell_size_inches > 0.0) {
            return Err(ConfigError::InvalidCellSize(self.cell_size_inches));
        }
        if self.pairing_window_ms < 0 {
            return Err(ConfigError::NegativePairingWindow(self.pairing_window_ms));
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        if self.broadcast_channel.is_empty() {
            return Err(ConfigError::EmptyBroadcastChannel);
        }
        Ok(self)
    }

    #[must_use]
    pub fn with_device_id(mut self, id: impl Into<String>) -> Self {
        self.device_id = DeviceId::new(id);
        self
    }

    #[must_use]
    pub fn with_pairing_window_ms(mut self, window_ms: i64) -> Self {
        self.pairing_window_ms = window_ms;
        self
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn with_step_delays(mut self, connected: Duration, solo: Duration) -> Self {
        self.step_delay = connected;
        self.solo_step_delay = solo;
        self
    }

    #[must_use]
    pub fn with_cell_size_inches(mut self, inches: f64) -> Self {
        self.cell_size_inches = inches;
        self
    }

    #[must_use]
    pub fn with_relay_url(mut self, url: impl Into<String>) -> Self {
        self.relay_url = url.into();
        self
    }

    #[must_use]
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

// =============================================================================
// RELAY CONFIG
// =============================================================================

pub const DEFAULT_RELAY_PORT: u16 = 3000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayConfig {
    pub port: u16,
}

impl RelayConfig {
    /// `PORT`: listen port, default 3000.
    #[must_use]
    pub fn from_env() -> Self {
        Self { port: env_parse("PORT", DEFAULT_RELAY_PORT) }
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    match std::env::var(key) {
        Ok(raw) => raw.parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
