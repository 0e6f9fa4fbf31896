//! Relaycast - one-way Mastodon to Telegram relay
//!
//! This library provides the sync engine behind `relay-sync`: it polls a
//! Mastodon account, filters out posts already relayed, converts each post to
//! Telegram HTML and fans it out to every configured channel.

pub mod config;
pub mod cursor;
pub mod delivery;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod platforms;
pub mod sanitize;
pub mod sync;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use cursor::TimeCursor;
pub use error::{RelaycastError, Result};
pub use ledger::Ledger;
pub use sync::{SyncEngine, TickReport};
pub use types::{ChannelResult, MediaAttachment, MediaKind, SourcePost};
