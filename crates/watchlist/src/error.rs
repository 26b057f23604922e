use thiserror::Error;

pub type Result<T> = std::result::Result<T, WatchlistError>;

#[derive(Error, Debug)]
pub enum WatchlistError {
    /// No watchlist entry for the requested player
    #[error("Player not on watchlist: {0}")]
    NotFound(String),

    /// Reason position outside `1..=count`
    #[error("Reason {position} out of range (entry has {count})")]
    IndexOutOfRange { position: usize, count: usize },

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Invalid record '{key}': {detail}")]
    InvalidRecord { key: String, detail: String },

    #[error("Notification failed: {0}")]
    Notify(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl WatchlistError {
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound(name.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    pub fn invalid_record(key: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::InvalidRecord {
            key: key.into(),
            detail: detail.into(),
        }
    }

    /// True for errors caused by the request rather than by storage.
    pub fn is_user_error(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::IndexOutOfRange { .. })
    }
}

impl From<serde_yaml::Error> for WatchlistError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}
