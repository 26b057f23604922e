use crate::codec::{DiscordMessage, BRIDGE_CHANNEL};
use crate::sink::BridgeSink;
use async_trait::async_trait;
use moderation_watchlist::{ModerationConfig, Notifier, WatchlistError, WatchlistEvent};
use std::sync::Arc;

/// Relays watchlist events to the chat bridge according to the moderation config.
pub struct BridgeNotifier {
    config: ModerationConfig,
    sink: Arc<dyn BridgeSink>,
}

impl BridgeNotifier {
    pub fn new(config: ModerationConfig, sink: Arc<dyn BridgeSink>) -> Self {
        Self { config, sink }
    }

    /// Bridge message for `event`, or `None` when the config keeps it off the bridge.
    pub fn message(&self, event: &WatchlistEvent) -> Option<DiscordMessage> {
        let report = &self.config.report;
        let watchlist = &self.config.watchlist;
        let (message, ping) = match event {
            WatchlistEvent::PlayerReported {
                reporter,
                subject,
                reason,
            } if report.send_bridge => (
                DiscordMessage::new(
                    &report.bridge_channel,
                    format!("**{reporter}** reported player **{subject}.**\nReason: **{reason}**"),
                ),
                report.ping_moderators,
            ),
            WatchlistEvent::PlayerAdded {
                initiator,
                subject,
                reason,
            } if watchlist.send_bridge => (
                DiscordMessage::new(
                    &watchlist.bridge_channel,
                    format!(
                        "**{initiator}** added player **{subject}** to the watchlist.\nReason: **{reason}**"
                    ),
                ),
                watchlist.ping_moderators,
            ),
            WatchlistEvent::WatchedPlayerJoined { name } if watchlist.join_notification_bridge => (
                DiscordMessage::new(
                    &watchlist.bridge_channel,
                    format!("Watched player **{name}** joined the server."),
                ),
                watchlist.ping_moderators,
            ),
            WatchlistEvent::AltAccountJoined { name, reason }
                if watchlist.join_notification_bridge =>
            {
                (
                    DiscordMessage::new(
                        &watchlist.bridge_channel,
                        format!(
                            "Player **{name}** joined the server and was put on the watchlist as an {reason}"
                        ),
                    ),
                    watchlist.ping_moderators,
                )
            }
            _ => return None,
        };
        Some(if ping {
            message.ping(&self.config.bridge_role)
        } else {
            message
        })
    }
}

#[async_trait]
impl Notifier for BridgeNotifier {
    async fn notify(&self, event: &WatchlistEvent) -> moderation_watchlist::Result<()> {
        let Some(message) = self.message(event) else {
            return Ok(());
        };
        let payload = message
            .encode()
            .map_err(|err| WatchlistError::Notify(err.to_string()))?;
        self.sink
            .send(BRIDGE_CHANNEL, payload)
            .await
            .map_err(|err| WatchlistError::Notify(format!("bridge #{}: {err}", message.channel)))?;
        log::debug!("Sent bridge message to #{}", message.channel);
        Ok(())
    }
}
