//! Session configuration
//!
//! [`SyncParams`] holds the polling periods of the three sync loops,
//! [`SyncProfile`] names the presets a user picks from, and [`Settings`] is
//! the record an application loads (from the environment or JSON) to open a
//! session.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, SessionError};

/// Polling periods of the background sync loops
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncParams {
    /// Playlist catalog refresh
    /// Default: 5 minutes
    pub playlists_period: Duration,

    /// Transport state, position and current song refresh
    /// Default: 5 seconds
    pub play_state_period: Duration,

    /// Volume, shuffle, repeat and mute refresh
    /// Default: 10 seconds
    pub misc_period: Duration,
}

impl Default for SyncParams {
    fn default() -> Self {
        Self {
            playlists_period: Duration::from_secs(5 * 60),
            play_state_period: Duration::from_secs(5),
            misc_period: Duration::from_secs(10),
        }
    }
}

impl SyncParams {
    pub fn new(playlists_period: Duration, play_state_period: Duration, misc_period: Duration) -> Self {
        Self {
            playlists_period,
            play_state_period,
            misc_period,
        }
    }

    /// Light polling for metered or battery-bound clients
    pub fn rarely() -> Self {
        Self {
            playlists_period: Duration::from_secs(30 * 60),
            play_state_period: Duration::from_secs(10),
            misc_period: Duration::from_secs(10 * 60),
        }
    }

    pub fn optimally() -> Self {
        Self {
            playlists_period: Duration::from_secs(15 * 60),
            play_state_period: Duration::from_secs(5),
            misc_period: Duration::from_secs(5 * 60),
        }
    }

    pub fn often() -> Self {
        Self {
            playlists_period: Duration::from_secs(5 * 60),
            play_state_period: Duration::from_secs(5),
            misc_period: Duration::from_secs(60),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.playlists_period.is_zero() {
            return Err(SessionError::Configuration(
                "Playlists sync period must be greater than 0".to_string(),
            ));
        }

        if self.play_state_period.is_zero() {
            return Err(SessionError::Configuration(
                "Play state sync period must be greater than 0".to_string(),
            ));
        }

        if self.misc_period.is_zero() {
            return Err(SessionError::Configuration(
                "Misc sync period must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// User-facing sync presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncProfile {
    Rarely,
    #[default]
    Optimally,
    Often,
}

impl SyncProfile {
    pub fn sync_params(self) -> SyncParams {
        match self {
            SyncProfile::Rarely => SyncParams::rarely(),
            SyncProfile::Optimally => SyncParams::optimally(),
            SyncProfile::Often => SyncParams::often(),
        }
    }
}

/// Accepts the stored preference values "1", "2", "3" as well as the names
impl FromStr for SyncProfile {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "rarely" => Ok(SyncProfile::Rarely),
            "2" | "optimally" => Ok(SyncProfile::Optimally),
            "3" | "often" => Ok(SyncProfile::Often),
            other => Err(SessionError::Configuration(format!(
                "Unknown sync profile: {:?}",
                other
            ))),
        }
    }
}

/// Resolved connection parameters of one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
    pub client_name: String,
}

impl Endpoint {
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(SessionError::Configuration("Host must not be empty".to_string()));
        }

        if self.port == 0 {
            return Err(SessionError::Configuration(
                "Port must be in range 1-65535".to_string(),
            ));
        }

        if self.timeout.is_zero() {
            return Err(SessionError::Configuration(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Settings record an application keeps for its player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub timeout_ms: u64,
    pub sync_profile: SyncProfile,
    pub client_name: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: aimp_api::DEFAULT_PORT,
            timeout_ms: aimp_api::DEFAULT_TIMEOUT.as_millis() as u64,
            sync_profile: SyncProfile::default(),
            client_name: "aimp-remote".to_string(),
        }
    }
}

impl Settings {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// Load settings from environment variables
    ///
    /// - `AIMP_HOST` (required)
    /// - `AIMP_PORT`, `AIMP_TIMEOUT_MS`, `AIMP_CLIENT_NAME`
    /// - `AIMP_SYNC_PROFILE`: "1"/"rarely", "2"/"optimally", "3"/"often";
    ///   unknown values fall back to optimally
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut settings = Settings::default();

        settings.host = lookup("AIMP_HOST")
            .ok_or_else(|| SessionError::Configuration("AIMP_HOST is not set".to_string()))?;

        if let Some(port) = lookup("AIMP_PORT") {
            settings.port = port
                .trim()
                .parse()
                .map_err(|_| SessionError::Configuration(format!("Invalid AIMP_PORT: {:?}", port)))?;
        }

        if let Some(timeout) = lookup("AIMP_TIMEOUT_MS") {
            settings.timeout_ms = timeout.trim().parse().map_err(|_| {
                SessionError::Configuration(format!("Invalid AIMP_TIMEOUT_MS: {:?}", timeout))
            })?;
        }

        if let Some(profile) = lookup("AIMP_SYNC_PROFILE") {
            settings.sync_profile = profile.parse().unwrap_or_else(|e| {
                warn!("{}, using the default profile", e);
                SyncProfile::default()
            });
        }

        if let Some(name) = lookup("AIMP_CLIENT_NAME") {
            settings.client_name = name;
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Parse settings from a JSON document; missing fields take defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(json)
            .map_err(|e| SessionError::Configuration(format!("Invalid settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn sync_params(&self) -> SyncParams {
        self.sync_profile.sync_params()
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint {
            host: self.host.clone(),
            port: self.port,
            timeout: self.timeout(),
            client_name: self.client_name.clone(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.endpoint().validate()
    }
}
