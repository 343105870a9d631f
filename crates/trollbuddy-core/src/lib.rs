//! `TrollBuddy` Core Library
//!
//! Shared functionality for `TrollBuddy` components:
//! - Remote key-path store abstraction with memory, `SQLite` and Firebase backends
//! - Configuration resolution and hierarchy
//! - Single-slot notification channel
//! - Session identifiers, share links and `YouTube` URL handling
//! - Common error types

pub mod config;
pub mod db;
pub mod error;
pub mod ids;
pub mod link;
pub mod notify;
pub mod store;
pub mod tracing_init;
pub mod youtube;

pub use config::Config;
pub use error::{Error, Result};
pub use link::ShareLink;
pub use notify::{NotificationKind, NotificationService, NotificationState, Notifier};
pub use store::{RemoteStore, StoreError};
