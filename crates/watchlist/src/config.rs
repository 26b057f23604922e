use crate::error::{Result, WatchlistError};
use crate::store::{KNOWN_PLAYERS_FILE_NAME, WATCHLIST_FILE_NAME};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Moderation settings, read from `config.toml` in the data directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModerationConfig {
    /// Watchlist record file, relative to the data directory
    pub watchlist_file: String,

    /// Known-player history file, relative to the data directory
    pub known_players_file: String,

    /// Role mentioned when a bridge message pings moderators
    pub bridge_role: String,

    pub report: ReportConfig,

    pub watchlist: WatchlistConfig,
}

/// What happens when a player uses `/report`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Tell online moderators
    pub send_ingame: bool,

    /// Relay to the chat bridge
    pub send_bridge: bool,

    /// Record the report as a watchlist reason
    pub add_to_watchlist: bool,

    pub bridge_channel: String,

    pub ping_moderators: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchlistConfig {
    pub send_ingame: bool,
    pub send_bridge: bool,
    pub bridge_channel: String,
    pub ping_moderators: bool,

    /// Announce joins of watched players (and detected alts) in game
    pub join_notification_ingame: bool,

    /// Announce joins of watched players (and detected alts) on the bridge
    pub join_notification_bridge: bool,

    /// Delay before join announcements, so they arrive after the join message
    pub join_notification_delay_secs: u64,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            watchlist_file: WATCHLIST_FILE_NAME.to_string(),
            known_players_file: KNOWN_PLAYERS_FILE_NAME.to_string(),
            bridge_role: "Moderator".to_string(),
            report: ReportConfig::default(),
            watchlist: WatchlistConfig::default(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            send_ingame: true,
            send_bridge: true,
            add_to_watchlist: true,
            bridge_channel: "reports".to_string(),
            ping_moderators: false,
        }
    }
}

impl Default for WatchlistConfig {
    fn default() -> Self {
        Self {
            send_ingame: true,
            send_bridge: true,
            bridge_channel: "watchlist".to_string(),
            ping_moderators: false,
            join_notification_ingame: true,
            join_notification_bridge: true,
            join_notification_delay_secs: 5,
        }
    }
}

impl ModerationConfig {
    /// Reads and validates `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let config = match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml_str(&text)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No config at {path:?}, using defaults");
                Self::default()
            }
            Err(err) => {
                return Err(WatchlistError::Config(format!(
                    "read {}: {err}",
                    path.display()
                )))
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|err| WatchlistError::Config(err.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|err| WatchlistError::Config(err.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.watchlist_file.trim().is_empty() {
            return Err(WatchlistError::Config("watchlist_file must not be empty".into()));
        }
        if self.known_players_file.trim().is_empty() {
            return Err(WatchlistError::Config(
                "known_players_file must not be empty".into(),
            ));
        }
        if self.watchlist_file == self.known_players_file {
            return Err(WatchlistError::Config(format!(
                "watchlist_file and known_players_file both point at '{}'",
                self.watchlist_file
            )));
        }
        if self.report.send_bridge && self.report.bridge_channel.trim().is_empty() {
            return Err(WatchlistError::Config(
                "report.bridge_channel is required when report.send_bridge is set".into(),
            ));
        }
        let watchlist_bridge =
            self.watchlist.send_bridge || self.watchlist.join_notification_bridge;
        if watchlist_bridge && self.watchlist.bridge_channel.trim().is_empty() {
            return Err(WatchlistError::Config(
                "watchlist.bridge_channel is required when bridge notices are enabled".into(),
            ));
        }
        Ok(())
    }

    pub fn join_notification_delay(&self) -> Duration {
        Duration::from_secs(self.watchlist.join_notification_delay_secs)
    }
}
