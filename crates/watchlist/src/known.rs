use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Sighting {
    name: String,
    uuid: Uuid,
}

/// Name → UUID history of every player that ever joined. Entries are overwritten on each
/// login and never removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownPlayers {
    players: BTreeMap<String, Sighting>,
}

impl KnownPlayers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Records a login. Returns true when the stored mapping changed.
    pub fn record(&mut self, name: &str, uuid: Uuid) -> bool {
        let sighting = Sighting {
            name: name.to_string(),
            uuid,
        };
        match self.players.insert(name.to_lowercase(), sighting) {
            Some(previous) => previous.name != name || previous.uuid != uuid,
            None => true,
        }
    }

    pub fn uuid_of(&self, name: &str) -> Option<Uuid> {
        self.players.get(&name.to_lowercase()).map(|s| s.uuid)
    }

    pub fn is_known(&self, name: &str) -> bool {
        self.players.contains_key(&name.to_lowercase())
    }

    /// (name, uuid) pairs ordered by lowercase name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Uuid)> {
        self.players.values().map(|s| (s.name.as_str(), s.uuid))
    }

    /// Names starting with `prefix` (case-insensitive), sorted; for completion.
    pub fn names_with_prefix(&self, prefix: &str) -> Vec<&str> {
        let prefix = prefix.to_lowercase();
        self.players
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .map(|(_, s)| s.name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_overwrites_and_reports_changes() {
        let uuid = Uuid::new_v4();
        let mut known = KnownPlayers::new();
        assert!(known.record("Bob", uuid));
        assert!(!known.record("Bob", uuid));
        assert_eq!(known.uuid_of("bob"), Some(uuid));

        let other = Uuid::new_v4();
        assert!(known.record("BOB", other));
        assert_eq!(known.uuid_of("Bob"), Some(other));
        assert_eq!(known.len(), 1);
    }

    #[test]
    fn renamed_players_keep_both_names_in_name_order() {
        let uuid = Uuid::new_v4();
        let mut known = KnownPlayers::new();
        known.record("OldName", uuid);
        known.record("NewName", uuid);
        known.record("aragorn", Uuid::new_v4());
        assert!(known.is_known("oldname"));
        assert!(!known.is_known("Unseen"));

        let names: Vec<&str> = known.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["aragorn", "NewName", "OldName"]);
    }

    #[test]
    fn prefix_completion() {
        let mut known = KnownPlayers::new();
        known.record("Gimli", Uuid::new_v4());
        known.record("gandalf", Uuid::new_v4());
        known.record("Frodo", Uuid::new_v4());
        assert_eq!(known.names_with_prefix("G"), vec!["gandalf", "Gimli"]);
    }
}
