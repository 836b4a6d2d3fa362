//! # Helideck Notify
//!
//! Alert fan-out for the inspection app: one bus, two consumers.
//!
//! ## Design Principles
//! - One explicit bus, built at startup and handed to producers and stores
//! - Synchronous delivery with no queue; events without listeners are dropped
//! - Dedup by id: a re-signalled alert replaces its toast or record
//! - Center state survives restarts through a pluggable key/value store
//!
//! ## Architecture
//! ```text
//! producers ── notify(message, severity, options) ──▶ NotificationBus
//!                                                       ├── every event ──────────▶ ToastStore
//!                                                       │                            └── tokio timer per toast
//!                                                       └── warning|error|persist ─▶ CenterStore
//!                                                                                    └── KeyValueStore
//!                                                                                         ├── memory
//!                                                                                         ├── file (JSON)
//!                                                                                         └── sqlite
//! ```

pub mod center;
pub mod dispatch;
pub mod event;
pub mod persistence;
pub mod toast;

pub use center::{CenterRecord, CenterSettings, CenterStore, NotificationFilter, PANEL_FILTERS};
pub use dispatch::{ListenerKind, NotificationBus, Subscription};
pub use event::{NotificationAction, NotificationEvent, NotifyOptions, Severity};
pub use persistence::{FileStore, KeyValueStore, MemoryStore, SqliteStore, open_store};
pub use toast::ToastStore;

use helideck_core::{NotificationConfig, Result};

/// Bus plus both stores, wired from config.
pub struct NotificationSystem {
    pub bus: NotificationBus,
    pub toasts: ToastStore,
    pub center: CenterStore,
}

impl NotificationSystem {
    /// Open storage, load the center, then subscribe both stores.
    pub fn from_config(config: &NotificationConfig) -> Result<Self> {
        let storage = open_store(config)?;
        let bus = NotificationBus::with_durations(config.toast);
        let center = CenterStore::from_config(&bus, storage, config);
        let toasts = ToastStore::new(&bus);
        Ok(Self { bus, toasts, center })
    }
}
