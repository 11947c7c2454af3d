//! # Taskboard Core
//!
//! Board state engine and live update hub for a shared kanban task board.
//!
//! The [`BoardService`] owns every mutation of the board: it loads the whole
//! [`BoardSnapshot`] from a [`BoardRepository`], checks the invariants,
//! saves, and then tells a [`ChangeNotifier`]. The [`LiveUpdateHub`] fans
//! those changes out to connected viewers and replays recent ones to viewers
//! that reconnect. Transport, authentication and process setup live outside
//! this crate.

pub mod config;
pub mod domain;
pub mod error;
pub mod hub;
pub mod notifier;
pub mod service;
pub mod storage;
pub mod usage;

// Re-export commonly used types
pub use config::{CoreConfig, HubConfig};
pub use domain::{
    board::{BoardSnapshot, NormalizeReport},
    card::{Card, CardId, CardView, Lane, Registrar},
};
pub use error::{BoardError, Result};
pub use hub::{
    BoardMessage, HubEvent, HubNotifier, LiveUpdateHub, SubscribeOptions, SubscriberId,
    SubscriberState, Subscription,
};
pub use notifier::{ChangeNotifier, NoopNotifier};
pub use service::BoardService;
pub use storage::{BoardRepository, MemoryRepository};
#[cfg(feature = "file-storage")]
pub use storage::FileRepository;
pub use usage::{UsageEvent, UsageLogger};
