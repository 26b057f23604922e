//! # Moderation Watchlist
//!
//! Tracks flagged players across name, UUID and address changes.
//!
//! ## Features
//!
//! - **Identity reconciliation** - one entry per real player, however often they rename
//! - **Alias detection** - accounts joining from a watched address are put on the list
//! - **Durable records** - every change is written to `watchlist.yml` before the call returns
//! - **Non-blocking notices** - events reach notifiers from a background task
//!
//! ## Architecture
//!
//! ```text
//! proxy join / staff command
//!     │
//!     ├──> Watchlist (single write lock)
//!     │      ├─ Reconciler (rename, claim, merge)
//!     │      ├─ Workflow (add, remove, remove reason, aliases)
//!     │      └─ Registry (name index, uuid/ip lookups, listing pages)
//!     │
//!     ├──> Record Store
//!     │      └─> watchlist.yml, known_players.yml
//!     │
//!     └──> Dispatcher (after the lock is released)
//!            └─> Notifier (console, chat bridge)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use moderation_watchlist::{
//!     Dispatcher, LoginEvent, ModerationConfig, NoSessions, Uuid, Watchlist,
//! };
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> moderation_watchlist::Result<()> {
//!     let watchlist = Watchlist::open(
//!         Path::new("data"),
//!         ModerationConfig::default(),
//!         Arc::new(NoSessions),
//!         Dispatcher::disabled(),
//!     )
//!     .await?;
//!
//!     watchlist.add_reason("Griefer", "Mod", "broke the gate", true).await?;
//!     let login = LoginEvent::new("Griefer", Uuid::new_v4(), Some("10.0.0.7".into()));
//!     watchlist.on_join(&login).await;
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod known;
mod notify;
mod reconcile;
mod registry;
mod service;
mod session;
mod store;
mod types;
mod workflow;

pub use config::{ModerationConfig, ReportConfig, WatchlistConfig, CONFIG_FILE_NAME};
pub use error::{Result, WatchlistError};
pub use known::KnownPlayers;
pub use notify::{ConsoleNotifier, Dispatcher, FanOut, Notifier, WatchlistEvent};
pub use reconcile::{reconcile, Reconciliation};
pub use registry::{paginate, EntryId, Page, Registry, Selection, PAGE_SIZE};
pub use service::{JoinOutcome, Report, Watchlist};
pub use session::{NoSessions, Session, SessionLookup, StaticSessions};
pub use store::{
    format_time, parse_time, registry_from_yaml, registry_to_yaml, RecordStore,
    KNOWN_PLAYERS_FILE_NAME, WATCHLIST_FILE_NAME,
};
pub use types::{LoginEvent, WatchlistEntry, WatchlistReason, PLACEHOLDER_PREFIX, SYSTEM_INITIATOR};
pub use workflow::{add_reason, alt_description, find_aliases, remove_entry, remove_reason, AddOutcome, ReasonRemoval};

// Re-exported so hosts need not depend on these crates directly
pub use async_trait::async_trait;
pub use uuid::Uuid;
