use crate::config::ModerationConfig;
use crate::error::{Result, WatchlistError};
use crate::known::KnownPlayers;
use crate::notify::{Dispatcher, WatchlistEvent};
use crate::reconcile::{reconcile, Reconciliation};
use crate::registry::{Page, Registry, Selection};
use crate::session::SessionLookup;
use crate::store::RecordStore;
use crate::types::{LoginEvent, WatchlistEntry, WatchlistReason, SYSTEM_INITIATOR};
use crate::workflow::{self, AddOutcome, ReasonRemoval};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

struct State {
    registry: Registry,
    known: KnownPlayers,
}

/// What a join did to the watchlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Not watched and no watched address
    Unwatched { reconciliation: Reconciliation },
    /// The player is on the watchlist
    Watched {
        key: String,
        reconciliation: Reconciliation,
    },
    /// The player shares an address with watched entries and was added as their alt
    AltDetected {
        key: String,
        reason: String,
        reconciliation: Reconciliation,
    },
}

impl JoinOutcome {
    pub fn reconciliation(&self) -> &Reconciliation {
        match self {
            Self::Unwatched { reconciliation }
            | Self::Watched { reconciliation, .. }
            | Self::AltDetected { reconciliation, .. } => reconciliation,
        }
    }
}

/// A `/report` submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub reporter: String,
    pub subject: String,
    pub reason: String,
    /// Reporter has moderator rights
    pub by_moderator: bool,
}

/// The moderation watchlist service. Every mutation runs under one write lock, persists
/// before the lock is released, and hands notifications to the dispatcher afterwards.
pub struct Watchlist {
    state: RwLock<State>,
    store: RecordStore,
    sessions: Arc<dyn SessionLookup>,
    dispatcher: Dispatcher,
    config: ModerationConfig,
}

impl Watchlist {
    pub fn new(
        registry: Registry,
        known: KnownPlayers,
        store: RecordStore,
        sessions: Arc<dyn SessionLookup>,
        dispatcher: Dispatcher,
        config: ModerationConfig,
    ) -> Self {
        Self {
            state: RwLock::new(State { registry, known }),
            store,
            sessions,
            dispatcher,
            config,
        }
    }

    /// Loads the record files named by `config` from `data_dir`.
    pub async fn open(
        data_dir: &Path,
        config: ModerationConfig,
        sessions: Arc<dyn SessionLookup>,
        dispatcher: Dispatcher,
    ) -> Result<Self> {
        let store = RecordStore::new(
            data_dir.join(&config.watchlist_file),
            data_dir.join(&config.known_players_file),
        );
        let registry = store.load().await?;
        let known = store.load_known_players().await?;
        Ok(Self::new(registry, known, store, sessions, dispatcher, config))
    }

    pub fn config(&self) -> &ModerationConfig {
        &self.config
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    async fn persist(&self, registry: &Registry) {
        if let Err(err) = self.store.save(registry).await {
            log::error!("Watchlist change kept in memory but not saved: {err}");
        }
    }

    async fn persist_known(&self, known: &KnownPlayers) {
        if let Err(err) = self.store.save_known_players(known).await {
            log::error!("Known players not saved: {err}");
        }
    }

    /// Applies a login to the watchlist and persists. Never fails: storage problems are
    /// logged.
    pub async fn reconcile(&self, login: &LoginEvent) -> Reconciliation {
        let (outcome, events) = {
            let mut state = self.state.write().await;
            let outcome = reconcile(&mut state.registry, login);
            self.persist(&state.registry).await;
            let events = changed_events(&state.registry, &outcome);
            (outcome, events)
        };
        self.dispatcher.dispatch_all(events);
        outcome
    }

    /// Full proxy-join handling: remember the player, reconcile, then announce watched
    /// players or put accounts joining from a watched address on the watchlist.
    pub async fn on_join(&self, login: &LoginEvent) -> JoinOutcome {
        let mut events = Vec::new();
        let mut notices = Vec::new();
        let outcome = {
            let mut state = self.state.write().await;
            if state.known.record(&login.name, login.uuid) {
                self.persist_known(&state.known).await;
            }

            let reconciliation = reconcile(&mut state.registry, login);
            events.extend(changed_events(&state.registry, &reconciliation));

            let watched_key = state.registry.get(&login.name).map(|e| e.key().to_string());
            let aliases: Vec<&WatchlistEntry> =
                state.registry.find_by_ip(login.ip.as_deref());

            let outcome = if let Some(key) = watched_key {
                notices.push(WatchlistEvent::WatchedPlayerJoined {
                    name: login.name.clone(),
                });
                JoinOutcome::Watched {
                    key,
                    reconciliation,
                }
            } else if !aliases.is_empty() {
                let description = workflow::alt_description(&aliases);
                let reason =
                    WatchlistReason::new(description.clone(), SYSTEM_INITIATOR, &login.name, true);
                let entry = WatchlistEntry::new(
                    login.name.clone(),
                    Some(login.uuid),
                    login.ip.clone(),
                    reason,
                );
                match state.registry.insert(entry.clone()) {
                    Ok(_) => {
                        log::info!("{} joined from a watched address: {description}", login.name);
                        events.push(WatchlistEvent::EntryChanged(entry));
                        notices.push(WatchlistEvent::AltAccountJoined {
                            name: login.name.clone(),
                            reason: description.clone(),
                        });
                        JoinOutcome::AltDetected {
                            key: login.name.clone(),
                            reason: description,
                            reconciliation,
                        }
                    }
                    Err(err) => {
                        log::warn!("Could not add alt account {}: {err}", login.name);
                        JoinOutcome::Unwatched { reconciliation }
                    }
                }
            } else {
                JoinOutcome::Unwatched { reconciliation }
            };

            self.persist(&state.registry).await;
            outcome
        };

        self.dispatcher.dispatch_all(events);
        let delay = self.config.join_notification_delay();
        for notice in notices {
            self.dispatcher.dispatch_after(delay, notice);
        }
        outcome
    }

    /// Adds a reason for `subject`, creating the entry when needed.
    pub async fn add_reason(
        &self,
        subject: &str,
        initiator: &str,
        description: &str,
        by_moderator: bool,
    ) -> Result<AddOutcome> {
        let (outcome, entry) = {
            let mut state = self.state.write().await;
            let reason = WatchlistReason::new(description, initiator, subject, by_moderator);
            let State { registry, known } = &mut *state;
            let outcome =
                workflow::add_reason(registry, known, self.sessions.as_ref(), subject, reason)?;
            self.persist(registry).await;
            let entry = registry.get(outcome.key()).cloned();
            (outcome, entry)
        };
        self.dispatcher.dispatch_all(entry.map(WatchlistEvent::EntryChanged));
        self.dispatcher.dispatch(WatchlistEvent::PlayerAdded {
            initiator: initiator.to_string(),
            subject: subject.to_string(),
            reason: description.to_string(),
        });
        Ok(outcome)
    }

    /// Announces a report and, if configured, records it on the watchlist.
    pub async fn report(&self, report: &Report) -> Result<Option<AddOutcome>> {
        let added = if self.config.report.add_to_watchlist {
            let (outcome, entry) = {
                let mut state = self.state.write().await;
                let reason = WatchlistReason::new(
                    report.reason.clone(),
                    report.reporter.clone(),
                    report.subject.clone(),
                    report.by_moderator,
                );
                let State { registry, known } = &mut *state;
                let outcome = workflow::add_reason(
                    registry,
                    known,
                    self.sessions.as_ref(),
                    &report.subject,
                    reason,
                )?;
                self.persist(registry).await;
                let entry = registry.get(outcome.key()).cloned();
                (outcome, entry)
            };
            self.dispatcher.dispatch_all(entry.map(WatchlistEvent::EntryChanged));
            Some(outcome)
        } else {
            None
        };
        self.dispatcher.dispatch(WatchlistEvent::PlayerReported {
            reporter: report.reporter.clone(),
            subject: report.subject.clone(),
            reason: report.reason.clone(),
        });
        Ok(added)
    }

    /// Removes `subject` and every entry sharing its address.
    pub async fn remove_entry(&self, subject: &str) -> Result<Vec<WatchlistEntry>> {
        let removed = {
            let mut state = self.state.write().await;
            let removed = workflow::remove_entry(&mut state.registry, subject)?;
            self.persist(&state.registry).await;
            removed
        };
        self.dispatcher
            .dispatch_all(removed.iter().cloned().map(WatchlistEvent::EntryRemoved));
        Ok(removed)
    }

    /// Removes the reason at 1-based `position`; the last reason takes the entry with it.
    pub async fn remove_reason(&self, subject: &str, position: usize) -> Result<ReasonRemoval> {
        let (removal, event) = {
            let mut state = self.state.write().await;
            let removal = workflow::remove_reason(&mut state.registry, subject, position)?;
            self.persist(&state.registry).await;
            let event = match &removal {
                ReasonRemoval::Entry(entry) => Some(WatchlistEvent::EntryRemoved(entry.clone())),
                ReasonRemoval::Reason { key, .. } => state
                    .registry
                    .get(key)
                    .cloned()
                    .map(WatchlistEvent::EntryChanged),
            };
            (removal, event)
        };
        self.dispatcher.dispatch_all(event);
        Ok(removal)
    }

    /// Writes the current state, reporting failures to the caller.
    pub async fn flush(&self) -> Result<()> {
        let state = self.state.read().await;
        self.store.save(&state.registry).await?;
        self.store.save_known_players(&state.known).await
    }

    /// Waits for pending notifications.
    pub async fn close(&self) {
        self.dispatcher.close().await;
    }

    pub async fn entry(&self, name: &str) -> Result<WatchlistEntry> {
        self.state
            .read()
            .await
            .registry
            .get(name)
            .cloned()
            .ok_or_else(|| WatchlistError::not_found(name))
    }

    pub async fn entry_by_uuid(&self, uuid: Uuid) -> Option<WatchlistEntry> {
        self.state.read().await.registry.get_by_uuid(uuid).cloned()
    }

    pub async fn is_on_watchlist(&self, name: &str) -> bool {
        self.state.read().await.registry.contains(name)
    }

    pub async fn has_watched_ip(&self, ip: Option<&str>) -> bool {
        !self.state.read().await.registry.find_by_ip(ip).is_empty()
    }

    pub async fn find_aliases(&self, name: &str) -> Result<Vec<WatchlistEntry>> {
        let state = self.state.read().await;
        let aliases = workflow::find_aliases(&state.registry, name)?;
        Ok(aliases.into_iter().cloned().collect())
    }

    pub async fn select(&self, selection: &Selection) -> Vec<WatchlistEntry> {
        let state = self.state.read().await;
        state
            .registry
            .select(selection)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn list(&self, selection: &Selection, page: usize) -> Page<WatchlistEntry> {
        let state = self.state.read().await;
        state.registry.page(selection, page).map(|entry| entry.clone())
    }

    /// Listing selection for a command word, with `online` resolved through the session
    /// lookup.
    pub fn selection(&self, word: &str) -> Selection {
        Selection::from_word(word, self.sessions.online_names())
    }

    pub async fn snapshot(&self) -> Registry {
        self.state.read().await.registry.clone()
    }

    pub async fn known_uuid(&self, name: &str) -> Option<Uuid> {
        self.state.read().await.known.uuid_of(name)
    }

    pub async fn is_known(&self, name: &str) -> bool {
        self.state.read().await.known.is_known(name)
    }

    pub async fn known_names(&self, prefix: &str) -> Vec<String> {
        let state = self.state.read().await;
        state
            .known
            .names_with_prefix(prefix)
            .into_iter()
            .map(str::to_string)
            .collect()
    }
}

/// Entries touched by a reconciliation: the player's own entry and any entry that was
/// moved aside to free the name.
fn changed_events(registry: &Registry, outcome: &Reconciliation) -> Vec<WatchlistEvent> {
    if !outcome.changed() {
        return Vec::new();
    }
    [outcome.canonical.as_deref(), outcome.displaced.as_deref()]
        .into_iter()
        .flatten()
        .filter_map(|key| registry.get(key))
        .cloned()
        .map(WatchlistEvent::EntryChanged)
        .collect()
}
