use crate::error::{Result, WatchlistError};
use crate::known::KnownPlayers;
use crate::registry::Registry;
use crate::types::{WatchlistEntry, WatchlistReason};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const WATCHLIST_FILE_NAME: &str = "watchlist.yml";
pub const KNOWN_PLAYERS_FILE_NAME: &str = "known_players.yml";

/// Written in place of an unknown IP.
const UNKNOWN_IP: &str = "unknown";

/// US medium date-time, e.g. `Jan 5, 2021, 3:04:05 PM`.
const TIME_FORMAT: &str = "%b %-d, %Y, %-I:%M:%S %p";
const TIME_PARSE_FORMATS: [&str; 2] = ["%b %d, %Y, %I:%M:%S %p", "%b %d, %Y %I:%M:%S %p"];

pub fn format_time(time: NaiveDateTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

/// Parses the record-file timestamp. Older files omit the comma after the year and some
/// writers put a narrow no-break space before AM/PM.
pub fn parse_time(text: &str) -> Option<NaiveDateTime> {
    let normalized: String = text
        .trim()
        .chars()
        .map(|c| match c {
            '\u{202f}' | '\u{a0}' => ' ',
            other => other,
        })
        .collect();
    TIME_PARSE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(&normalized, format).ok())
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEntry<R> {
    uuid: String,
    #[serde(default)]
    ip: Option<String>,
    name_unknown: bool,
    reasons: Vec<R>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReason {
    creation_time: String,
    description: String,
    initiator: String,
    name_at_creation_time: String,
    by_moderator: bool,
}

impl From<&WatchlistReason> for RawReason {
    fn from(reason: &WatchlistReason) -> Self {
        Self {
            creation_time: format_time(reason.creation_time()),
            description: reason.description().to_string(),
            initiator: reason.initiator().to_string(),
            name_at_creation_time: reason.name_at_creation_time().to_string(),
            by_moderator: reason.by_moderator(),
        }
    }
}

impl From<&WatchlistEntry> for RawEntry<RawReason> {
    fn from(entry: &WatchlistEntry) -> Self {
        Self {
            uuid: entry.uuid.unwrap_or_else(Uuid::nil).to_string(),
            ip: Some(entry.ip.clone().unwrap_or_else(|| UNKNOWN_IP.to_string())),
            name_unknown: entry.name_unknown,
            reasons: entry.reasons().iter().map(RawReason::from).collect(),
        }
    }
}

/// Text of a scalar node. Unquoted names such as `1234` or `true` parse as numbers or
/// booleans.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

const REASON_TEXT_FIELDS: [&str; 4] = [
    "creationTime",
    "description",
    "initiator",
    "nameAtCreationTime",
];

fn decode_reason(key: &str, mut value: Value) -> Result<WatchlistReason> {
    if let Value::Mapping(fields) = &mut value {
        for field in REASON_TEXT_FIELDS {
            if let Some(slot) = fields.get_mut(field) {
                if let Some(text) = scalar_text(slot) {
                    *slot = Value::String(text);
                }
            }
        }
    }
    let raw: RawReason = serde_yaml::from_value(value)
        .map_err(|err| WatchlistError::invalid_record(key, format!("reason: {err}")))?;
    let creation_time = parse_time(&raw.creation_time).ok_or_else(|| {
        WatchlistError::invalid_record(
            key,
            format!("unparsable creationTime '{}'", raw.creation_time),
        )
    })?;
    Ok(WatchlistReason::with_time(
        creation_time,
        raw.description,
        raw.initiator,
        raw.name_at_creation_time,
        raw.by_moderator,
    ))
}

/// Decodes one record. Broken reasons are skipped with a warning; an entry without any
/// readable reason is an error.
fn decode_entry(key: &str, value: Value) -> Result<WatchlistEntry> {
    let raw: RawEntry<Value> = serde_yaml::from_value(value)
        .map_err(|err| WatchlistError::invalid_record(key, err.to_string()))?;
    let uuid = Uuid::parse_str(raw.uuid.trim())
        .map_err(|err| WatchlistError::invalid_record(key, format!("uuid: {err}")))?;
    let uuid = (!uuid.is_nil()).then_some(uuid);
    let ip = raw.ip.filter(|ip| ip != UNKNOWN_IP && !ip.is_empty());

    let mut reasons = Vec::with_capacity(raw.reasons.len());
    for value in raw.reasons {
        match decode_reason(key, value) {
            Ok(reason) => reasons.push(reason),
            Err(err) => log::warn!("Skipping watchlist reason: {err}"),
        }
    }

    WatchlistEntry::from_parts(key.to_string(), uuid, ip, raw.name_unknown, reasons)
        .ok_or_else(|| WatchlistError::invalid_record(key, "no readable reasons"))
}

/// Builds a registry from record-file text, skipping malformed records.
pub fn registry_from_yaml(text: &str) -> Result<Registry> {
    let mut registry = Registry::new();
    let document: Value = serde_yaml::from_str(text)?;
    let mapping = match document {
        Value::Null => return Ok(registry),
        Value::Mapping(mapping) => mapping,
        other => {
            return Err(WatchlistError::persistence(format!(
                "watchlist file must be a mapping, found {}",
                value_kind(&other)
            )))
        }
    };

    for (key, value) in mapping {
        let Some(key) = scalar_text(&key) else {
            log::warn!("Skipping watchlist record with non-scalar key {key:?}");
            continue;
        };
        let inserted = decode_entry(&key, value).and_then(|entry| registry.insert(entry));
        if let Err(err) = inserted {
            log::warn!("Skipping watchlist record: {err}");
        }
    }
    Ok(registry)
}

/// Record-file text for `registry`, keys in listing order.
pub fn registry_to_yaml(registry: &Registry) -> Result<String> {
    let mut entries: Vec<&WatchlistEntry> = registry.iter().collect();
    entries.sort_by_cached_key(|entry| entry.key().to_lowercase());

    let mut mapping = Mapping::new();
    for entry in entries {
        let raw = RawEntry::<RawReason>::from(entry);
        mapping.insert(Value::String(entry.key().to_string()), serde_yaml::to_value(raw)?);
    }
    Ok(serde_yaml::to_string(&Value::Mapping(mapping))?)
}

pub fn known_players_from_yaml(text: &str) -> Result<KnownPlayers> {
    let mut known = KnownPlayers::new();
    let document: Value = serde_yaml::from_str(text)?;
    let Value::Mapping(mapping) = document else {
        return Ok(known);
    };
    for (name, uuid) in mapping {
        let (Some(name), Value::String(uuid)) = (scalar_text(&name), uuid) else {
            log::warn!("Skipping malformed known-player record");
            continue;
        };
        match Uuid::parse_str(&uuid) {
            Ok(uuid) => {
                known.record(&name, uuid);
            }
            Err(err) => log::warn!("Skipping known player '{name}': {err}"),
        }
    }
    Ok(known)
}

pub fn known_players_to_yaml(known: &KnownPlayers) -> Result<String> {
    let mut mapping = Mapping::new();
    for (name, uuid) in known.iter() {
        mapping.insert(
            Value::String(name.to_string()),
            Value::String(uuid.to_string()),
        );
    }
    Ok(serde_yaml::to_string(&Value::Mapping(mapping))?)
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

/// Files backing the watchlist and the known-player history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordStore {
    watchlist_path: PathBuf,
    known_players_path: PathBuf,
}

impl RecordStore {
    pub fn new(watchlist_path: impl Into<PathBuf>, known_players_path: impl Into<PathBuf>) -> Self {
        Self {
            watchlist_path: watchlist_path.into(),
            known_players_path: known_players_path.into(),
        }
    }

    /// Default file names inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(
            dir.join(WATCHLIST_FILE_NAME),
            dir.join(KNOWN_PLAYERS_FILE_NAME),
        )
    }

    pub fn watchlist_path(&self) -> &Path {
        &self.watchlist_path
    }

    pub fn known_players_path(&self) -> &Path {
        &self.known_players_path
    }

    /// Loads the watchlist; a missing file is an empty watchlist.
    pub async fn load(&self) -> Result<Registry> {
        let Some(text) = read_optional(&self.watchlist_path).await? else {
            log::info!("No watchlist at {:?}, starting empty", self.watchlist_path);
            return Ok(Registry::new());
        };
        let registry = registry_from_yaml(&text)?;
        log::info!(
            "Loaded {} watchlist entries from {:?}",
            registry.len(),
            self.watchlist_path
        );
        Ok(registry)
    }

    pub async fn save(&self, registry: &Registry) -> Result<()> {
        let text = registry_to_yaml(registry)?;
        write_atomic(&self.watchlist_path, text).await?;
        log::debug!(
            "Saved {} watchlist entries to {:?}",
            registry.len(),
            self.watchlist_path
        );
        Ok(())
    }

    pub async fn load_known_players(&self) -> Result<KnownPlayers> {
        match read_optional(&self.known_players_path).await? {
            Some(text) => known_players_from_yaml(&text),
            None => Ok(KnownPlayers::new()),
        }
    }

    pub async fn save_known_players(&self, known: &KnownPlayers) -> Result<()> {
        let text = known_players_to_yaml(known)?;
        write_atomic(&self.known_players_path, text).await
    }
}

async fn read_optional(path: &Path) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Ok(Some(text)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(WatchlistError::persistence(format!(
            "read {}: {err}",
            path.display()
        ))),
    }
}

async fn write_atomic(path: &Path, text: String) -> Result<()> {
    let io_err =
        |err: std::io::Error| WatchlistError::persistence(format!("write {}: {err}", path.display()));
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    let tmp = path.with_extension("yml.tmp");
    tokio::fs::write(&tmp, text).await.map_err(io_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(io_err)?;
    Ok(())
}
