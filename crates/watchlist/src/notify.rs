use crate::config::ModerationConfig;
use crate::error::Result;
use crate::types::WatchlistEntry;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;

/// Something moderators may want to hear about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchlistEvent {
    /// An entry was created or changed; carries the entry after the change
    EntryChanged(WatchlistEntry),
    /// An entry left the watchlist
    EntryRemoved(WatchlistEntry),
    /// A moderator put a player on the watchlist (or added a reason)
    PlayerAdded {
        initiator: String,
        subject: String,
        reason: String,
    },
    PlayerReported {
        reporter: String,
        subject: String,
        reason: String,
    },
    WatchedPlayerJoined {
        name: String,
    },
    /// A player joined from the address of watched accounts and was added automatically
    AltAccountJoined {
        name: String,
        reason: String,
    },
}

impl WatchlistEvent {
    pub fn is_join_notice(&self) -> bool {
        matches!(
            self,
            Self::WatchedPlayerJoined { .. } | Self::AltAccountJoined { .. }
        )
    }
}

/// Consumer of watchlist events. Called from a background task, never under the
/// registry lock.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &WatchlistEvent) -> Result<()>;
}

/// Forwards every event to each inner notifier; one failure does not stop the others.
#[derive(Default, Clone)]
pub struct FanOut {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl FanOut {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }
}

#[async_trait]
impl Notifier for FanOut {
    async fn notify(&self, event: &WatchlistEvent) -> Result<()> {
        for notifier in &self.notifiers {
            if let Err(err) = notifier.notify(event).await {
                log::warn!("Watchlist notifier failed: {err}");
            }
        }
        Ok(())
    }
}

/// Staff-facing notices written to the log, standing in for in-game messages to online
/// moderators.
pub struct ConsoleNotifier {
    config: ModerationConfig,
}

impl ConsoleNotifier {
    pub fn new(config: ModerationConfig) -> Self {
        Self { config }
    }

    /// Text shown to staff for `event`, if the config wants it shown.
    pub fn message(&self, event: &WatchlistEvent) -> Option<String> {
        let watchlist = &self.config.watchlist;
        match event {
            WatchlistEvent::PlayerReported {
                reporter,
                subject,
                reason,
            } if self.config.report.send_ingame => {
                Some(format!("{reporter} reported player {subject}\nReason: {reason}"))
            }
            WatchlistEvent::PlayerAdded {
                initiator,
                subject,
                reason,
            } if watchlist.send_ingame => {
                Some(format!("{initiator} added {subject} to watchlist for '{reason}'"))
            }
            WatchlistEvent::WatchedPlayerJoined { name } if watchlist.join_notification_ingame => {
                Some(format!("Watched player {name} joined."))
            }
            WatchlistEvent::AltAccountJoined { name, reason }
                if watchlist.join_notification_ingame =>
            {
                Some(format!(
                    "Player {name} joined and was put on watchlist as an {reason}"
                ))
            }
            _ => None,
        }
    }
}

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn notify(&self, event: &WatchlistEvent) -> Result<()> {
        match self.message(event) {
            Some(message) => log::info!(target: "moderation::staff", "{message}"),
            None => log::debug!("Watchlist event: {event:?}"),
        }
        Ok(())
    }
}

/// Queues events for a background delivery task so callers never wait on notifiers.
pub struct Dispatcher {
    tx: Mutex<Option<UnboundedSender<WatchlistEvent>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Starts the delivery task. Must be called inside a tokio runtime.
    pub fn spawn(notifier: Arc<dyn Notifier>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<WatchlistEvent>();
        let worker = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Err(err) = notifier.notify(&event).await {
                    log::warn!("Dropping watchlist notification: {err}");
                }
            }
        });
        Self {
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Dispatcher that discards everything.
    pub fn disabled() -> Self {
        Self {
            tx: Mutex::new(None),
            worker: Mutex::new(None),
        }
    }

    fn sender(&self) -> Option<UnboundedSender<WatchlistEvent>> {
        self.tx.lock().ok().and_then(|tx| tx.as_ref().cloned())
    }

    pub fn dispatch(&self, event: WatchlistEvent) {
        if let Some(tx) = self.sender() {
            if tx.send(event).is_err() {
                log::debug!("Watchlist notification worker has stopped");
            }
        }
    }

    pub fn dispatch_all(&self, events: impl IntoIterator<Item = WatchlistEvent>) {
        for event in events {
            self.dispatch(event);
        }
    }

    /// Delivers `event` after `delay` without holding up the caller.
    pub fn dispatch_after(&self, delay: Duration, event: WatchlistEvent) {
        if delay.is_zero() {
            self.dispatch(event);
            return;
        }
        let Some(tx) = self.sender() else {
            return;
        };
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(event);
        });
    }

    /// Stops accepting events and waits until everything queued (including delayed
    /// events) has been delivered.
    pub async fn close(&self) {
        if let Ok(mut tx) = self.tx.lock() {
            tx.take();
        }
        let worker = self.worker.lock().ok().and_then(|mut worker| worker.take());
        if let Some(worker) = worker {
            if let Err(err) = worker.await {
                log::warn!("Watchlist notification worker failed: {err}");
            }
        }
    }
}
