use moderation_watchlist::{
    async_trait, AddOutcome, Dispatcher, JoinOutcome, LoginEvent, ModerationConfig, Notifier,
    ReasonRemoval, Report, Result, SessionLookup, StaticSessions, Watchlist, WatchlistError,
    WatchlistEvent, SYSTEM_INITIATOR,
};
use pretty_assertions::assert_eq;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<WatchlistEvent>>,
}

impl Recorder {
    async fn events(&self) -> Vec<WatchlistEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for Recorder {
    async fn notify(&self, event: &WatchlistEvent) -> Result<()> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}

fn immediate_config() -> ModerationConfig {
    let mut config = ModerationConfig::default();
    config.watchlist.join_notification_delay_secs = 0;
    config
}

async fn open(
    dir: &Path,
    config: ModerationConfig,
    sessions: impl SessionLookup + 'static,
) -> (Watchlist, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::default());
    let watchlist = Watchlist::open(
        dir,
        config,
        Arc::new(sessions),
        Dispatcher::spawn(recorder.clone()),
    )
    .await
    .unwrap();
    (watchlist, recorder)
}

#[tokio::test]
async fn account_from_watched_address_is_added_as_alt() {
    let tmp = TempDir::new().unwrap();
    let griefer = Uuid::new_v4();
    let sessions = StaticSessions::new().with("Griefer", griefer, Some("10.0.0.7"));
    let (watchlist, recorder) = open(tmp.path(), immediate_config(), sessions).await;

    let added = watchlist
        .add_reason("Griefer", "Mod", "broke the gate", true)
        .await
        .unwrap();
    assert_eq!(added, AddOutcome::Created { key: "Griefer".into() });

    let login = LoginEvent::new("Sneaky", Uuid::new_v4(), Some("10.0.0.7".into()));
    let outcome = watchlist.on_join(&login).await;
    assert_eq!(
        outcome,
        JoinOutcome::AltDetected {
            key: "Sneaky".into(),
            reason: "Alt of Griefer".into(),
            reconciliation: Default::default(),
        }
    );
    watchlist.close().await;

    let events = recorder.events().await;
    assert!(events.contains(&WatchlistEvent::AltAccountJoined {
        name: "Sneaky".into(),
        reason: "Alt of Griefer".into(),
    }));

    // Reopen from disk: the alt entry was persisted.
    let (reopened, _) = open(tmp.path(), immediate_config(), StaticSessions::new()).await;
    let alt = reopened.entry("sneaky").await.unwrap();
    assert_eq!(alt.ip.as_deref(), Some("10.0.0.7"));
    assert_eq!(alt.reasons()[0].initiator(), SYSTEM_INITIATOR);
    assert!(alt.reasons()[0].is_system());
    let aliases: Vec<String> = reopened
        .find_aliases("Griefer")
        .await
        .unwrap()
        .iter()
        .map(|e| e.key().to_string())
        .collect();
    assert_eq!(aliases, vec!["Griefer".to_string(), "Sneaky".to_string()]);
}

#[tokio::test]
async fn renamed_player_is_recognised_on_join() {
    let tmp = TempDir::new().unwrap();
    let uuid = Uuid::new_v4();
    let sessions = StaticSessions::new().with("OldName", uuid, None);
    let (watchlist, recorder) = open(tmp.path(), immediate_config(), sessions).await;
    watchlist.add_reason("OldName", "Mod", "xray", true).await.unwrap();

    let outcome = watchlist
        .on_join(&LoginEvent::new("NewName", uuid, None))
        .await;
    let JoinOutcome::Watched { key, reconciliation } = outcome else {
        panic!("expected a watched join, got {outcome:?}");
    };
    assert_eq!(key, "NewName");
    assert_eq!(reconciliation.renamed_from.as_deref(), Some("OldName"));
    assert!(!watchlist.is_on_watchlist("OldName").await);
    assert_eq!(watchlist.known_uuid("newname").await, Some(uuid));
    watchlist.close().await;

    assert!(recorder
        .events()
        .await
        .contains(&WatchlistEvent::WatchedPlayerJoined { name: "NewName".into() }));

    let (reopened, _) = open(tmp.path(), immediate_config(), StaticSessions::new()).await;
    assert_eq!(reopened.entry_by_uuid(uuid).await.unwrap().key(), "NewName");
    assert!(reopened.is_known("NewName").await);
}

#[tokio::test]
async fn reports_follow_config() {
    let tmp = TempDir::new().unwrap();
    let (watchlist, recorder) = open(tmp.path(), immediate_config(), StaticSessions::new()).await;
    let report = Report {
        reporter: "Sam".into(),
        subject: "Bob".into(),
        reason: "spam".into(),
        by_moderator: false,
    };

    let added = watchlist.report(&report).await.unwrap();
    assert_eq!(added, Some(AddOutcome::Created { key: "Bob".into() }));
    let entry = watchlist.entry("Bob").await.unwrap();
    assert_eq!(entry.uuid, None);
    assert!(!entry.reasons()[0].by_moderator());
    watchlist.close().await;
    assert!(recorder.events().await.contains(&WatchlistEvent::PlayerReported {
        reporter: "Sam".into(),
        subject: "Bob".into(),
        reason: "spam".into(),
    }));

    let other = TempDir::new().unwrap();
    let mut config = immediate_config();
    config.report.add_to_watchlist = false;
    let (watchlist, _) = open(other.path(), config, StaticSessions::new()).await;
    assert_eq!(watchlist.report(&report).await.unwrap(), None);
    assert!(!watchlist.is_on_watchlist("Bob").await);
    watchlist.close().await;
}

#[tokio::test]
async fn removals_cascade_and_validate_positions() {
    let tmp = TempDir::new().unwrap();
    let sessions = StaticSessions::new()
        .with("Main", Uuid::new_v4(), Some("10.9.9.9"))
        .with("Alt", Uuid::new_v4(), Some("10.9.9.9"))
        .with("Elsewhere", Uuid::new_v4(), Some("10.1.1.1"));
    let (watchlist, recorder) = open(tmp.path(), immediate_config(), sessions).await;
    for name in ["Main", "Alt", "Elsewhere"] {
        watchlist.add_reason(name, "Mod", "first", true).await.unwrap();
    }
    watchlist.add_reason("Elsewhere", "Mod", "second", true).await.unwrap();

    let err = watchlist.remove_reason("Elsewhere", 3).await.unwrap_err();
    assert!(matches!(
        err,
        WatchlistError::IndexOutOfRange { position: 3, count: 2 }
    ));
    let removal = watchlist.remove_reason("Elsewhere", 1).await.unwrap();
    let ReasonRemoval::Reason { remaining, reason, .. } = removal else {
        panic!("entry should survive");
    };
    assert_eq!(remaining, 1);
    assert_eq!(reason.description(), "first");

    let removed: Vec<String> = watchlist
        .remove_entry("main")
        .await
        .unwrap()
        .iter()
        .map(|e| e.key().to_string())
        .collect();
    assert_eq!(removed, vec!["Main".to_string(), "Alt".to_string()]);
    assert!(watchlist.is_on_watchlist("Elsewhere").await);

    let err = watchlist.remove_entry("Main").await.unwrap_err();
    assert!(err.is_user_error());
    watchlist.close().await;

    let removed_events = recorder
        .events()
        .await
        .into_iter()
        .filter(|e| matches!(e, WatchlistEvent::EntryRemoved(_)))
        .count();
    assert_eq!(removed_events, 2);
}

#[tokio::test(start_paused = true)]
async fn join_notices_wait_for_the_configured_delay() {
    let tmp = TempDir::new().unwrap();
    let uuid = Uuid::new_v4();
    let sessions = StaticSessions::new().with("Watched", uuid, None);
    let (watchlist, recorder) =
        open(tmp.path(), ModerationConfig::default(), sessions).await;
    watchlist.add_reason("Watched", "Mod", "x", true).await.unwrap();

    watchlist.on_join(&LoginEvent::new("Watched", uuid, None)).await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    let early = recorder.events().await;
    assert!(!early.iter().any(WatchlistEvent::is_join_notice));

    tokio::time::sleep(Duration::from_secs(5)).await;
    let late = recorder.events().await;
    assert!(late.iter().any(WatchlistEvent::is_join_notice));
    watchlist.close().await;
}

#[tokio::test]
async fn concurrent_joins_keep_uuids_unique() {
    let tmp = TempDir::new().unwrap();
    let uuid = Uuid::new_v4();
    let sessions = StaticSessions::new().with("Shifty", uuid, None);
    let (watchlist, _) = open(tmp.path(), immediate_config(), sessions).await;
    watchlist.add_reason("Shifty", "Mod", "x", true).await.unwrap();
    let watchlist = Arc::new(watchlist);

    let mut handles = Vec::new();
    for n in 0..8 {
        let watchlist = watchlist.clone();
        handles.push(tokio::spawn(async move {
            let login = LoginEvent::new(format!("Shifty{n}"), uuid, None);
            watchlist.on_join(&login).await
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let snapshot = watchlist.snapshot().await;
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot.iter().filter(|e| e.uuid == Some(uuid)).count(), 1);
    watchlist.close().await;
}

#[tokio::test]
async fn failed_save_keeps_the_change_in_memory() {
    let tmp = TempDir::new().unwrap();
    let (watchlist, _) = open(tmp.path(), immediate_config(), StaticSessions::new()).await;
    // A directory in place of the temp file makes every save fail
    std::fs::create_dir(tmp.path().join("watchlist.yml.tmp")).unwrap();

    let added = watchlist.add_reason("Bob", "Mod", "spam", true).await.unwrap();
    assert_eq!(added, AddOutcome::Created { key: "Bob".into() });
    assert_eq!(watchlist.entry("bob").await.unwrap().reasons().len(), 1);
    assert!(!tmp.path().join("watchlist.yml").exists());

    let err = watchlist.flush().await.unwrap_err();
    assert!(matches!(err, WatchlistError::Persistence(_)), "{err:?}");
    assert!(!err.is_user_error());
    watchlist.close().await;
}
