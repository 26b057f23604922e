use anyhow::Result;
use moderation_bridge::DiscordMessage;
use moderation_watchlist::{format_time, JoinOutcome, Page, WatchlistEntry, WatchlistReason};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ReasonView {
    pub position: usize,
    pub created: String,
    pub description: String,
    pub initiator: String,
    pub name_at_creation_time: String,
    pub by_moderator: bool,
}

impl ReasonView {
    fn new(position: usize, reason: &WatchlistReason) -> Self {
        Self {
            position,
            created: format_time(reason.creation_time()),
            description: reason.description().to_string(),
            initiator: reason.initiator().to_string(),
            name_at_creation_time: reason.name_at_creation_time().to_string(),
            by_moderator: reason.by_moderator(),
        }
    }

    fn line(&self) -> String {
        format!(
            "  {}. [{}] {} (by {}, as {})",
            self.position, self.created, self.description, self.initiator, self.name_at_creation_time
        )
    }
}

#[derive(Debug, Serialize)]
pub struct EntryView {
    pub key: String,
    pub uuid: Option<String>,
    pub ip: Option<String>,
    pub name_unknown: bool,
    pub reasons: Vec<ReasonView>,
}

impl EntryView {
    pub fn from_entry(entry: &WatchlistEntry) -> Self {
        Self {
            key: entry.key().to_string(),
            uuid: entry.uuid.map(|uuid| uuid.to_string()),
            ip: entry.ip.clone(),
            name_unknown: entry.name_unknown,
            reasons: entry
                .reasons()
                .iter()
                .enumerate()
                .map(|(index, reason)| ReasonView::new(index + 1, reason))
                .collect(),
        }
    }

    fn title(&self) -> String {
        match (&self.uuid, self.name_unknown) {
            (Some(uuid), true) => format!("{} (name unknown, {uuid})", self.key),
            _ => self.key.clone(),
        }
    }

    fn lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Watchlist entry {}", self.title()),
            format!("  UUID: {}", self.uuid.as_deref().unwrap_or("unknown")),
            format!("  IP: {}", self.ip.as_deref().unwrap_or("unknown")),
        ];
        lines.extend(self.reasons.iter().map(ReasonView::line));
        lines
    }
}

#[derive(Debug, Serialize)]
pub struct ListView {
    pub page: usize,
    pub total_pages: usize,
    pub total_entries: usize,
    pub entries: Vec<String>,
}

impl ListView {
    pub fn from_page(page: &Page<WatchlistEntry>) -> Self {
        Self {
            page: page.number,
            total_pages: page.total_pages,
            total_entries: page.total_entries,
            entries: page.items.iter().map(WatchlistEntry::display_name).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct JoinView {
    pub player: String,
    pub status: &'static str,
    pub key: Option<String>,
    pub reason: Option<String>,
    pub renamed_from: Option<String>,
    pub displaced: Option<String>,
    pub merged: usize,
}

impl JoinView {
    pub fn from_outcome(player: &str, outcome: &JoinOutcome) -> Self {
        let (status, key, reason) = match outcome {
            JoinOutcome::Unwatched { .. } => ("unwatched", None, None),
            JoinOutcome::Watched { key, .. } => ("watched", Some(key.clone()), None),
            JoinOutcome::AltDetected { key, reason, .. } => {
                ("alt_detected", Some(key.clone()), Some(reason.clone()))
            }
        };
        let reconciliation = outcome.reconciliation();
        Self {
            player: player.to_string(),
            status,
            key,
            reason,
            renamed_from: reconciliation.renamed_from.clone(),
            displaced: reconciliation.displaced.clone(),
            merged: reconciliation.merged,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RemovalView {
    /// Keys of removed entries, the requested player first
    pub entries: Vec<String>,
    pub reason: Option<ReasonView>,
    pub remaining_reasons: Option<usize>,
    pub key: Option<String>,
}

impl RemovalView {
    pub fn entries(entries: &[WatchlistEntry]) -> Self {
        Self {
            entries: entries.iter().map(|e| e.key().to_string()).collect(),
            reason: None,
            remaining_reasons: None,
            key: None,
        }
    }

    pub fn reason(key: String, position: usize, reason: &WatchlistReason, remaining: usize) -> Self {
        Self {
            entries: Vec::new(),
            reason: Some(ReasonView::new(position, reason)),
            remaining_reasons: Some(remaining),
            key: Some(key),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OutboxView {
    pub messages: Vec<OutboxMessage>,
}

#[derive(Debug, Serialize)]
pub struct OutboxMessage {
    pub channel: String,
    pub text: String,
}

impl OutboxView {
    pub fn from_messages(messages: Vec<DiscordMessage>) -> Self {
        Self {
            messages: messages
                .into_iter()
                .map(|m| OutboxMessage {
                    channel: m.channel,
                    text: m.text,
                })
                .collect(),
        }
    }
}

/// Result of one command, printed as text or JSON.
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Output {
    Join(JoinView),
    Reported {
        player: String,
        watchlist_key: Option<String>,
    },
    Added {
        player: String,
        key: String,
        reason: String,
    },
    Removed(RemovalView),
    List(ListView),
    Entry(EntryView),
    Aliases {
        entries: Vec<EntryView>,
    },
    Outbox(OutboxView),
    ConfigWritten {
        path: String,
    },
}

impl Output {
    fn lines(&self) -> Vec<String> {
        match self {
            Self::Join(join) => {
                let mut lines = Vec::new();
                if let Some(from) = &join.renamed_from {
                    lines.push(format!("Watchlist entry {from} renamed to {}", join.player));
                }
                if let Some(placeholder) = &join.displaced {
                    lines.push(format!(
                        "Previous holder of the name {} moved to {placeholder}",
                        join.player
                    ));
                }
                lines.push(match (join.status, &join.reason) {
                    ("watched", _) => format!("Watched player {} joined.", join.player),
                    ("alt_detected", Some(reason)) => format!(
                        "Player {} joined and was put on watchlist as an {reason}",
                        join.player
                    ),
                    _ => format!("{} is not on the watchlist.", join.player),
                });
                lines
            }
            Self::Reported {
                player,
                watchlist_key,
            } => {
                let mut lines = vec![format!("Reported {player} to the moderators.")];
                if let Some(key) = watchlist_key {
                    lines.push(format!("Report recorded on the watchlist entry {key}."));
                }
                lines
            }
            Self::Added { key, reason, .. } => {
                vec![format!("Added {key} to watchlist for '{reason}'")]
            }
            Self::Removed(removal) => match (&removal.key, &removal.reason) {
                (Some(key), Some(reason)) => vec![format!(
                    "Removed reason '{}' from {key} ({} left)",
                    reason.description,
                    removal.remaining_reasons.unwrap_or_default()
                )],
                _ => removal
                    .entries
                    .iter()
                    .map(|key| format!("Removed {key} from watchlist"))
                    .collect(),
            },
            Self::List(list) => {
                let mut lines = vec![format!(
                    "Watchlist page {}/{} ({} entries)",
                    list.page, list.total_pages, list.total_entries
                )];
                if list.entries.is_empty() {
                    lines.push("  no entries".to_string());
                }
                lines.extend(list.entries.iter().map(|name| format!("  - {name}")));
                lines
            }
            Self::Entry(entry) => entry.lines(),
            Self::Aliases { entries } => entries.iter().flat_map(EntryView::lines).collect(),
            Self::Outbox(outbox) => {
                if outbox.messages.is_empty() {
                    return vec!["Bridge outbox is empty".to_string()];
                }
                outbox
                    .messages
                    .iter()
                    .map(|m| format!("#{}: {}", m.channel, m.text))
                    .collect()
            }
            Self::ConfigWritten { path } => vec![format!("Wrote {path}")],
        }
    }

    pub fn print(&self, json: bool) -> Result<()> {
        if json {
            println!("{}", serde_json::to_string_pretty(self)?);
        } else {
            for line in self.lines() {
                println!("{line}");
            }
        }
        Ok(())
    }
}
