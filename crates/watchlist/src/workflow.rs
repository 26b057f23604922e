use crate::error::{Result, WatchlistError};
use crate::known::KnownPlayers;
use crate::registry::Registry;
use crate::session::SessionLookup;
use crate::types::{WatchlistEntry, WatchlistReason};

/// Where [`add_reason`] put the new reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// Appended to the entry already keyed by the subject name
    Appended { key: String },
    /// New entry for the subject
    Created { key: String },
    /// The subject's UUID already had an entry under another key; appended there
    AppendedToIdentity { key: String },
}

impl AddOutcome {
    pub fn key(&self) -> &str {
        match self {
            Self::Appended { key } | Self::Created { key } | Self::AppendedToIdentity { key } => {
                key
            }
        }
    }
}

/// Result of [`remove_reason`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReasonRemoval {
    Reason {
        key: String,
        reason: WatchlistReason,
        remaining: usize,
    },
    /// The last reason went, and the entry with it
    Entry(WatchlistEntry),
}

pub fn add_reason(
    registry: &mut Registry,
    known: &KnownPlayers,
    sessions: &dyn SessionLookup,
    subject: &str,
    reason: WatchlistReason,
) -> Result<AddOutcome> {
    if let Some(entry) = registry.get_mut(subject) {
        entry.push_reason(reason);
        return Ok(AddOutcome::Appended {
            key: entry.key().to_string(),
        });
    }

    let session = sessions.session(subject);
    let uuid = session
        .as_ref()
        .map(|s| s.uuid)
        .or_else(|| known.uuid_of(subject));
    let ip = session.and_then(|s| s.ip);

    if let Some(id) = uuid.and_then(|uuid| registry.ids_with_uuid(uuid).first().copied()) {
        if let Some(entry) = registry.entry_mut(id) {
            entry.push_reason(reason);
            if entry.ip.is_none() {
                entry.ip = ip;
            }
            return Ok(AddOutcome::AppendedToIdentity {
                key: entry.key().to_string(),
            });
        }
    }

    registry.insert(WatchlistEntry::new(subject, uuid, ip, reason))?;
    Ok(AddOutcome::Created {
        key: subject.to_string(),
    })
}

/// Removes the subject and every entry sharing its known IP. The subject comes first in the
/// returned list.
pub fn remove_entry(registry: &mut Registry, subject: &str) -> Result<Vec<WatchlistEntry>> {
    let entry = registry
        .remove(subject)
        .ok_or_else(|| WatchlistError::not_found(subject))?;
    let aliases = registry.ids_with_ip(entry.ip.as_deref());
    let mut removed = vec![entry];
    removed.extend(aliases.into_iter().filter_map(|id| registry.remove_id(id)));
    Ok(removed)
}

/// Removes the reason at 1-based `position`. Removing the only reason removes the entry.
pub fn remove_reason(
    registry: &mut Registry,
    subject: &str,
    position: usize,
) -> Result<ReasonRemoval> {
    let id = registry
        .id_of(subject)
        .ok_or_else(|| WatchlistError::not_found(subject))?;
    let count = registry
        .entry(id)
        .map(|entry| entry.reasons().len())
        .unwrap_or_default();
    if position == 0 || position > count {
        return Err(WatchlistError::IndexOutOfRange { position, count });
    }

    if count == 1 {
        let entry = registry
            .remove_id(id)
            .ok_or_else(|| WatchlistError::not_found(subject))?;
        return Ok(ReasonRemoval::Entry(entry));
    }

    let entry = registry
        .entry_mut(id)
        .ok_or_else(|| WatchlistError::not_found(subject))?;
    let reason = entry.remove_reason_at(position - 1);
    Ok(ReasonRemoval::Reason {
        key: entry.key().to_string(),
        reason,
        remaining: entry.reasons().len(),
    })
}

/// Entries sharing the subject's IP, the subject included. An unknown IP has no aliases.
pub fn find_aliases<'a>(registry: &'a Registry, subject: &str) -> Result<Vec<&'a WatchlistEntry>> {
    let entry = registry
        .get(subject)
        .ok_or_else(|| WatchlistError::not_found(subject))?;
    if entry.ip.is_none() {
        return Ok(vec![entry]);
    }
    Ok(registry.find_by_ip(entry.ip.as_deref()))
}

/// Description of the reason added for an account joining from a watched address.
pub fn alt_description(aliases: &[&WatchlistEntry]) -> String {
    let names: Vec<String> = aliases.iter().map(|alias| alias.display_name()).collect();
    format!("Alt of {}", names.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{NoSessions, StaticSessions};
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn reason(subject: &str, text: &str) -> WatchlistReason {
        WatchlistReason::new(text, "Mod", subject, true)
    }

    fn with_ip(key: &str, ip: Option<&str>) -> WatchlistEntry {
        WatchlistEntry::new(key, None, ip.map(str::to_string), reason(key, "x"))
    }

    #[test]
    fn add_appends_to_existing_entry() {
        let mut registry = Registry::new();
        let known = KnownPlayers::new();
        let first = add_reason(&mut registry, &known, &NoSessions, "Bob", reason("Bob", "a")).unwrap();
        assert_eq!(first, AddOutcome::Created { key: "Bob".into() });
        let second = add_reason(&mut registry, &known, &NoSessions, "bob", reason("bob", "b")).unwrap();
        assert_eq!(second, AddOutcome::Appended { key: "Bob".into() });
        assert_eq!(registry.get("Bob").unwrap().reasons().len(), 2);
    }

    #[test]
    fn add_resolves_identity_from_session_then_history() {
        let online = Uuid::new_v4();
        let offline = Uuid::new_v4();
        let sessions = StaticSessions::new().with("Online", online, Some("5.6.7.8"));
        let mut known = KnownPlayers::new();
        known.record("Offline", offline);

        let mut registry = Registry::new();
        add_reason(&mut registry, &known, &sessions, "Online", reason("Online", "a")).unwrap();
        add_reason(&mut registry, &known, &sessions, "Offline", reason("Offline", "b")).unwrap();
        add_reason(&mut registry, &known, &sessions, "Stranger", reason("Stranger", "c")).unwrap();

        let entry = registry.get("Online").unwrap();
        assert_eq!(entry.uuid, Some(online));
        assert_eq!(entry.ip.as_deref(), Some("5.6.7.8"));
        let entry = registry.get("Offline").unwrap();
        assert_eq!(entry.uuid, Some(offline));
        assert_eq!(entry.ip, None);
        let entry = registry.get("Stranger").unwrap();
        assert_eq!(entry.uuid, None);
    }

    #[test]
    fn add_under_new_name_reuses_identity_entry() {
        let uuid = Uuid::new_v4();
        let mut known = KnownPlayers::new();
        known.record("NewName", uuid);
        let mut registry = Registry::new();
        registry
            .insert(WatchlistEntry::new("OldName", Some(uuid), None, reason("OldName", "a")))
            .unwrap();

        let outcome =
            add_reason(&mut registry, &known, &NoSessions, "NewName", reason("NewName", "b")).unwrap();
        assert_eq!(outcome.key(), "OldName");
        assert_eq!(registry.len(), 1);
        let reasons = registry.get("OldName").unwrap().reasons();
        assert_eq!(reasons[1].name_at_creation_time(), "NewName");
    }

    #[test]
    fn remove_cascades_to_shared_ip() {
        let mut registry = Registry::new();
        registry.insert(with_ip("A", Some("1.2.3.4"))).unwrap();
        registry.insert(with_ip("B", Some("1.2.3.4"))).unwrap();
        registry.insert(with_ip("C", Some("1.2.3.4"))).unwrap();
        registry.insert(with_ip("D", Some("4.3.2.1"))).unwrap();

        let removed = remove_entry(&mut registry, "a").unwrap();
        let keys: Vec<&str> = removed.iter().map(|e| e.key()).collect();
        assert_eq!(keys, vec!["A", "B", "C"]);
        assert_eq!(registry.len(), 1);
        assert!(registry.contains("D"));
    }

    #[test]
    fn remove_with_unknown_ip_spares_other_unknowns() {
        let mut registry = Registry::new();
        registry.insert(with_ip("A", None)).unwrap();
        registry.insert(with_ip("B", None)).unwrap();

        let removed = remove_entry(&mut registry, "A").unwrap();
        assert_eq!(removed.len(), 1);
        assert!(registry.contains("B"));
        assert!(matches!(
            remove_entry(&mut registry, "A"),
            Err(WatchlistError::NotFound(_))
        ));
    }

    #[test]
    fn remove_reason_bounds_and_last_reason() {
        let mut registry = Registry::new();
        let mut entry = with_ip("Bob", None);
        entry.push_reason(reason("Bob", "second"));
        registry.insert(entry).unwrap();

        assert!(matches!(
            remove_reason(&mut registry, "Bob", 3),
            Err(WatchlistError::IndexOutOfRange { position: 3, count: 2 })
        ));
        assert!(matches!(
            remove_reason(&mut registry, "Bob", 0),
            Err(WatchlistError::IndexOutOfRange { .. })
        ));
        assert!(matches!(
            remove_reason(&mut registry, "Nobody", 1),
            Err(WatchlistError::NotFound(_))
        ));

        match remove_reason(&mut registry, "Bob", 1).unwrap() {
            ReasonRemoval::Reason { remaining, reason, .. } => {
                assert_eq!(remaining, 1);
                assert_eq!(reason.description(), "x");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            remove_reason(&mut registry, "Bob", 1).unwrap(),
            ReasonRemoval::Entry(_)
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn aliases_include_subject() {
        let mut registry = Registry::new();
        registry.insert(with_ip("A", Some("1.1.1.1"))).unwrap();
        registry.insert(with_ip("B", Some("1.1.1.1"))).unwrap();
        registry.insert(with_ip("C", None)).unwrap();

        fn keys(list: Vec<&WatchlistEntry>) -> Vec<String> {
            list.iter().map(|e| e.key().to_string()).collect()
        }
        assert_eq!(keys(find_aliases(&registry, "b").unwrap()), vec!["A", "B"]);
        assert_eq!(keys(find_aliases(&registry, "C").unwrap()), vec!["C"]);
        assert!(find_aliases(&registry, "Z").is_err());
    }

    #[test]
    fn alt_description_names_placeholders_by_uuid() {
        let uuid = Uuid::new_v4();
        let a = with_ip("Alice", None);
        let mut b = WatchlistEntry::new("unknownName0", Some(uuid), None, reason("x", "y"));
        b.name_unknown = true;
        assert_eq!(alt_description(&[&a, &b]), format!("Alt of Alice, {uuid}"));
    }
}
