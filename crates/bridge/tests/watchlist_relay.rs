use moderation_bridge::{BridgeNotifier, DiscordMessage, OutboxSink, BRIDGE_CHANNEL};
use moderation_watchlist::{
    Dispatcher, LoginEvent, ModerationConfig, Report, StaticSessions, Watchlist,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

#[tokio::test]
async fn watchlist_events_land_in_the_outbox() {
    let tmp = TempDir::new().unwrap();
    let mut config = ModerationConfig::default();
    config.watchlist.join_notification_delay_secs = 0;
    config.watchlist.ping_moderators = true;

    let outbox = Arc::new(OutboxSink::new(tmp.path().join("bridge.out")));
    let notifier = BridgeNotifier::new(config.clone(), outbox.clone());
    let griefer = Uuid::new_v4();
    let sessions = StaticSessions::new().with("Griefer", griefer, Some("10.0.0.7"));
    let watchlist = Watchlist::open(
        tmp.path(),
        config,
        Arc::new(sessions),
        Dispatcher::spawn(Arc::new(notifier)),
    )
    .await
    .unwrap();

    watchlist
        .report(&Report {
            reporter: "Sam".into(),
            subject: "Griefer".into(),
            reason: "griefing".into(),
            by_moderator: false,
        })
        .await
        .unwrap();
    watchlist
        .on_join(&LoginEvent::new("Griefer", griefer, Some("10.0.0.7".into())))
        .await;
    watchlist.close().await;

    let frames = outbox.read_all().await.unwrap();
    assert!(frames.iter().all(|frame| frame.channel == BRIDGE_CHANNEL));
    let messages: Vec<DiscordMessage> = frames
        .into_iter()
        .map(|frame| DiscordMessage::decode(frame.payload).unwrap())
        .collect();
    assert_eq!(
        messages,
        vec![
            DiscordMessage::new(
                "reports",
                "**Sam** reported player **Griefer.**\nReason: **griefing**"
            ),
            DiscordMessage::new(
                "watchlist",
                "@Moderator Watched player **Griefer** joined the server."
            ),
        ]
    );
}
