use chrono::{Local, NaiveDateTime, Timelike};
use uuid::Uuid;

/// Initiator recorded for reasons the system adds on its own (alt detection).
pub const SYSTEM_INITIATOR: &str = "plugin";

/// Prefix of synthetic keys for entries whose name now belongs to someone else.
pub const PLACEHOLDER_PREFIX: &str = "unknownName";

/// One line in an entry's history: who flagged the player, when and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchlistReason {
    creation_time: NaiveDateTime,
    description: String,
    initiator: String,
    name_at_creation_time: String,
    by_moderator: bool,
}

impl WatchlistReason {
    /// Reason created now, in local time.
    pub fn new(
        description: impl Into<String>,
        initiator: impl Into<String>,
        name_at_creation_time: impl Into<String>,
        by_moderator: bool,
    ) -> Self {
        Self::with_time(
            Local::now().naive_local(),
            description,
            initiator,
            name_at_creation_time,
            by_moderator,
        )
    }

    /// Reason with an explicit creation time. Sub-second precision is dropped so the value
    /// survives the record file unchanged.
    pub fn with_time(
        creation_time: NaiveDateTime,
        description: impl Into<String>,
        initiator: impl Into<String>,
        name_at_creation_time: impl Into<String>,
        by_moderator: bool,
    ) -> Self {
        Self {
            creation_time: creation_time.with_nanosecond(0).unwrap_or(creation_time),
            description: description.into(),
            initiator: initiator.into(),
            name_at_creation_time: name_at_creation_time.into(),
            by_moderator,
        }
    }

    pub fn creation_time(&self) -> NaiveDateTime {
        self.creation_time
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn initiator(&self) -> &str {
        &self.initiator
    }

    pub fn name_at_creation_time(&self) -> &str {
        &self.name_at_creation_time
    }

    pub fn by_moderator(&self) -> bool {
        self.by_moderator
    }

    pub fn is_system(&self) -> bool {
        self.initiator == SYSTEM_INITIATOR
    }
}

/// Watchlist record for one logical player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchlistEntry {
    key: String,
    pub uuid: Option<Uuid>,
    pub ip: Option<String>,
    pub name_unknown: bool,
    reasons: Vec<WatchlistReason>,
}

impl WatchlistEntry {
    pub fn new(
        key: impl Into<String>,
        uuid: Option<Uuid>,
        ip: Option<String>,
        reason: WatchlistReason,
    ) -> Self {
        Self {
            key: key.into(),
            uuid,
            ip,
            name_unknown: false,
            reasons: vec![reason],
        }
    }

    /// Returns `None` when `reasons` is empty.
    pub(crate) fn from_parts(
        key: String,
        uuid: Option<Uuid>,
        ip: Option<String>,
        name_unknown: bool,
        reasons: Vec<WatchlistReason>,
    ) -> Option<Self> {
        if reasons.is_empty() {
            return None;
        }
        Some(Self {
            key,
            uuid,
            ip,
            name_unknown,
            reasons,
        })
    }

    /// Name the entry is indexed under (a real name or a placeholder).
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn reasons(&self) -> &[WatchlistReason] {
        &self.reasons
    }

    pub fn push_reason(&mut self, reason: WatchlistReason) {
        self.reasons.push(reason);
    }

    pub fn is_uuid_unknown(&self) -> bool {
        self.uuid.is_none()
    }

    /// Only the registry renames entries; the name index must follow.
    pub(crate) fn set_key(&mut self, key: String) {
        self.key = key;
    }

    /// Removes the reason at 0-based `index`; the caller guarantees it is in range and that
    /// the entry keeps at least one reason.
    pub(crate) fn remove_reason_at(&mut self, index: usize) -> WatchlistReason {
        self.reasons.remove(index)
    }

    pub(crate) fn absorb(&mut self, other: WatchlistEntry) {
        self.reasons.extend(other.reasons);
    }

    pub(crate) fn sort_reasons(&mut self) {
        self.reasons.sort_by_key(|reason| reason.creation_time);
    }

    /// Alias match: both addresses known and equal.
    pub fn shares_ip_with(&self, ip: Option<&str>) -> bool {
        match (self.ip.as_deref(), ip) {
            (Some(mine), Some(theirs)) => mine == theirs,
            _ => false,
        }
    }

    /// How alt notices refer to this entry.
    pub fn display_name(&self) -> String {
        if self.name_unknown {
            self.uuid
                .map(|uuid| uuid.to_string())
                .unwrap_or_else(|| self.key.clone())
        } else {
            self.key.clone()
        }
    }
}

/// Proxy join as seen by the reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginEvent {
    pub name: String,
    pub uuid: Uuid,
    pub ip: Option<String>,
}

impl LoginEvent {
    pub fn new(name: impl Into<String>, uuid: Uuid, ip: Option<String>) -> Self {
        Self {
            name: name.into(),
            uuid,
            ip,
        }
    }
}
