//! Keeps one watchlist entry per real player as players log in under new names.
//!
//! ```text
//! login (name, uuid, ip)
//!     │
//!     ├──> name slot: claim an offline entry, or move a different player's
//!     │    entry aside to `unknownName<N>`
//!     │
//!     └──> uuid scan: fold duplicates into one canonical entry,
//!          re-key it to the login name, sort its reasons
//! ```

use crate::registry::{EntryId, Registry};
use crate::types::LoginEvent;

/// What a reconciliation changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// An entry added while the player was offline adopted the login UUID
    pub claimed: bool,
    /// Placeholder key given to the previous holder of the login name
    pub displaced: Option<String>,
    /// Former key of the canonical entry when it was renamed to the login name
    pub renamed_from: Option<String>,
    /// Duplicate entries folded into the canonical one
    pub merged: usize,
    pub ip_updated: bool,
    /// Key of the entry that now represents the player, if watched
    pub canonical: Option<String>,
}

impl Reconciliation {
    pub fn changed(&self) -> bool {
        self.claimed
            || self.displaced.is_some()
            || self.renamed_from.is_some()
            || self.merged > 0
            || self.ip_updated
    }
}

fn same_name(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// Applies a login to `registry`. Persisting the result is the caller's job.
pub fn reconcile(registry: &mut Registry, login: &LoginEvent) -> Reconciliation {
    let mut outcome = Reconciliation::default();
    settle_name_slot(registry, login, &mut outcome);

    let matches = registry.ids_with_uuid(login.uuid);
    if matches.is_empty() {
        return outcome;
    }

    let canonical = registry
        .id_of(&login.name)
        .filter(|id| matches.contains(id))
        .unwrap_or(matches[0]);

    for duplicate in matches.iter().copied().filter(|id| *id != canonical) {
        if let Some(entry) = registry.remove_id(duplicate) {
            log::info!(
                "Merging watchlist entry '{}' into the entry of {}",
                entry.key(),
                login.name
            );
            if let Some(target) = registry.entry_mut(canonical) {
                target.absorb(entry);
            }
            outcome.merged += 1;
        }
    }

    rename_to_login(registry, canonical, login, &mut outcome);

    if let Some(entry) = registry.entry_mut(canonical) {
        entry.name_unknown = false;
        if outcome.merged > 0 {
            entry.sort_reasons();
        }
        if login.ip.is_some() && entry.ip != login.ip {
            entry.ip = login.ip.clone();
            outcome.ip_updated = true;
        }
        outcome.canonical = Some(entry.key().to_string());
    }
    outcome
}

fn settle_name_slot(registry: &mut Registry, login: &LoginEvent, outcome: &mut Reconciliation) {
    let Some(id) = registry.id_of(&login.name) else {
        return;
    };
    let Some(holder_uuid) = registry.entry(id).map(|entry| entry.uuid) else {
        return;
    };
    match holder_uuid {
        None => {
            if let Some(entry) = registry.entry_mut(id) {
                entry.uuid = Some(login.uuid);
                outcome.claimed = true;
                log::info!("Watchlist entry '{}' claimed by {}", login.name, login.uuid);
            }
        }
        Some(uuid) if uuid != login.uuid => {
            let placeholder = registry.next_placeholder_key();
            match registry.rekey(id, &placeholder) {
                Ok(()) => {
                    if let Some(entry) = registry.entry_mut(id) {
                        entry.name_unknown = true;
                    }
                    log::info!(
                        "Name '{}' now belongs to {}; watchlist entry of {uuid} moved to '{placeholder}'",
                        login.name,
                        login.uuid
                    );
                    outcome.displaced = Some(placeholder);
                }
                Err(err) => log::warn!("Could not move watchlist entry aside: {err}"),
            }
        }
        Some(_) => {}
    }
}

fn rename_to_login(
    registry: &mut Registry,
    canonical: EntryId,
    login: &LoginEvent,
    outcome: &mut Reconciliation,
) {
    let Some(current) = registry.entry(canonical).map(|e| e.key().to_string()) else {
        return;
    };
    if same_name(&current, &login.name) {
        return;
    }
    match registry.rekey(canonical, &login.name) {
        Ok(()) => {
            log::info!("Watchlist entry '{current}' renamed to '{}'", login.name);
            outcome.renamed_from = Some(current);
        }
        Err(err) => log::warn!("Could not rename watchlist entry '{current}': {err}"),
    }
}
