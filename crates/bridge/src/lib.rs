//! # Moderation Bridge
//!
//! Mirrors watchlist and report notices to the external chat bridge.
//!
//! ## Architecture
//!
//! ```text
//! WatchlistEvent
//!     │
//!     └──> BridgeNotifier (config: channels, pings, toggles)
//!            └─> DiscordMessage ──encode──> plugin frame on "mcme:connect"
//!                   └─> BridgeSink (proxy connection, outbox file, memory)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use moderation_bridge::{BridgeNotifier, OutboxSink};
//! use moderation_watchlist::{Dispatcher, ModerationConfig};
//! use std::sync::Arc;
//!
//! # async fn run() {
//! let config = ModerationConfig::default();
//! let sink = Arc::new(OutboxSink::new("data/bridge.out"));
//! let dispatcher = Dispatcher::spawn(Arc::new(BridgeNotifier::new(config, sink)));
//! # dispatcher.close().await;
//! # }
//! ```

mod codec;
mod error;
mod notifier;
mod sink;

pub use codec::{get_string, put_string, DiscordMessage, BRIDGE_CHANNEL, DISCORD_SUBCHANNEL};
pub use error::{BridgeError, Result};
pub use notifier::BridgeNotifier;
pub use sink::{decode_outbox, BridgeSink, Frame, MemorySink, OutboxSink};
