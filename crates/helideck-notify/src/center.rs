//! Notification center: the durable, filterable alert history behind the bell.
//!
//! Receives only center-eligible events from the bus (warning/error or
//! `persist`). Records carry `read` / `archived` flags; every mutation
//! re-serializes the whole record set to the key/value store, and the set is
//! loaded back before the store subscribes.
//!
//! Record lifecycle:
//! ```text
//! created (unread) ──markAsRead──▶ read ──archive──▶ archived ──delete/clear──▶ gone
//!        └───────────────archive (implies read)──────────┘
//! ```
//! A new event for an id whose record is archived starts a fresh unread record.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use helideck_core::{HelideckError, NotificationConfig, ToastDurations};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::dispatch::{NotificationBus, Subscription};
use crate::event::{DEFAULT_CATEGORY, NotificationAction, NotificationEvent, NotifyOptions, Severity};
use crate::persistence::KeyValueStore;

/// Storage key the record set lives under.
pub const DEFAULT_STORAGE_KEY: &str = "helideckNotifications";
/// Records kept before the oldest are evicted.
pub const DEFAULT_MAX_RECORDS: usize = 100;
/// Filter keys offered by the panel, in display order.
pub const PANEL_FILTERS: [&str; 7] = ["all", "unread", "inspection", "helicard", "compliance", "system", "archived"];

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

/// One retained alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CenterRecord {
    pub id: String,
    pub message: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, rename = "duration")]
    pub duration_ms: u64,
    /// Callbacks don't survive serialization.
    #[serde(skip)]
    pub action: Option<NotificationAction>,
}

impl CenterRecord {
    pub fn from_event(event: &NotificationEvent) -> Self {
        Self {
            id: event.id.clone(),
            message: event.message.clone(),
            severity: event.severity,
            category: event.category.clone(),
            read: false,
            archived: false,
            created_at: event.created_at,
            duration_ms: event.duration_ms,
            action: event.action.clone(),
        }
    }

    /// Re-signal of the same logical alert: refresh content, keep flags.
    fn refresh_from(&mut self, event: &NotificationEvent) {
        self.message = event.message.clone();
        self.severity = event.severity;
        self.category = event.category.clone();
        self.created_at = event.created_at;
        self.duration_ms = event.duration_ms;
        self.action = event.action.clone();
    }

    pub fn is_unread(&self) -> bool {
        !self.read && !self.archived
    }

    /// "Just now", "5m ago", "3h ago", "2d ago", then the calendar date.
    pub fn age_label(&self, now: DateTime<Utc>) -> String {
        let elapsed = now - self.created_at;
        let mins = elapsed.num_minutes();
        let hours = elapsed.num_hours();
        let days = elapsed.num_days();
        if mins < 1 {
            "Just now".to_string()
        } else if mins < 60 {
            format!("{mins}m ago")
        } else if hours < 24 {
            format!("{hours}h ago")
        } else if days < 7 {
            format!("{days}d ago")
        } else {
            self.created_at.format("%Y-%m-%d").to_string()
        }
    }
}

/// What the panel is currently showing; also the scope of [`CenterStore::clear_all`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum NotificationFilter {
    /// Everything not archived.
    #[default]
    All,
    /// Not archived and not read.
    Unread,
    Archived,
    /// Not archived, with this category.
    Category(String),
}

impl NotificationFilter {
    pub fn matches(&self, record: &CenterRecord) -> bool {
        match self {
            NotificationFilter::All => !record.archived,
            NotificationFilter::Unread => record.is_unread(),
            NotificationFilter::Archived => record.archived,
            NotificationFilter::Category(c) => !record.archived && record.category == *c,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            NotificationFilter::All => "all",
            NotificationFilter::Unread => "unread",
            NotificationFilter::Archived => "archived",
            NotificationFilter::Category(c) => c,
        }
    }
}

impl fmt::Display for NotificationFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.key())
    }
}

impl FromStr for NotificationFilter {
    type Err = HelideckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Err(HelideckError::InvalidFilter("empty filter key".into())),
            "all" => Ok(NotificationFilter::All),
            "unread" => Ok(NotificationFilter::Unread),
            "archived" => Ok(NotificationFilter::Archived),
            category => Ok(NotificationFilter::Category(category.to_string())),
        }
    }
}

/// Storage key + retention cap.
#[derive(Debug, Clone)]
pub struct CenterSettings {
    pub storage_key: String,
    pub max_records: usize,
    /// Used to fill `duration` for records added directly to the center.
    pub durations: ToastDurations,
}

impl Default for CenterSettings {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            max_records: DEFAULT_MAX_RECORDS,
            durations: ToastDurations::default(),
        }
    }
}

impl From<&NotificationConfig> for CenterSettings {
    fn from(config: &NotificationConfig) -> Self {
        Self {
            storage_key: config.storage_key.clone(),
            max_records: config.max_records,
            durations: config.toast,
        }
    }
}

#[derive(Default)]
struct CenterState {
    /// Newest insert first; refreshes keep their slot.
    records: Vec<CenterRecord>,
    filter: NotificationFilter,
    open: bool,
}

impl CenterState {
    fn unread_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_unread()).count()
    }

    fn ingest(&mut self, event: &NotificationEvent) {
        match self.records.iter_mut().find(|r| r.id == event.id && !r.archived) {
            Some(existing) => {
                existing.refresh_from(event);
                tracing::debug!("🔁 Center record refreshed: {}", event.id);
            }
            None => {
                self.records.insert(0, CenterRecord::from_event(event));
                tracing::info!("🔔 Center record added: {} [{}]", event.id, event.severity);
            }
        }
    }

    /// Drop oldest records (by `created_at`) past the cap.
    fn evict(&mut self, max_records: usize) {
        while self.records.len() > max_records {
            let oldest = self
                .records
                .iter()
                .enumerate()
                .min_by(|(ia, a), (ib, b)| a.created_at.cmp(&b.created_at).then(ib.cmp(ia)))
                .map(|(i, _)| i);
            match oldest {
                Some(i) => {
                    let evicted = self.records.remove(i);
                    tracing::debug!("🧹 Evicted center record: {}", evicted.id);
                }
                None => break,
            }
        }
    }
}

struct CenterShared {
    state: Mutex<CenterState>,
    storage: Arc<dyn KeyValueStore>,
    settings: CenterSettings,
    unread_tx: watch::Sender<usize>,
}

impl CenterShared {
    fn lock(&self) -> MutexGuard<'_, CenterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply a record mutation, then evict, persist and publish the unread count.
    fn mutate<R>(&self, f: impl FnOnce(&mut CenterState) -> R) -> R {
        let mut state = self.lock();
        let out = f(&mut state);
        state.evict(self.settings.max_records.max(1));
        self.persist(&state.records);
        self.unread_tx.send_replace(state.unread_count());
        out
    }

    fn persist(&self, records: &[CenterRecord]) {
        let bytes = match serde_json::to_vec(records) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!("⚠️ Failed to serialize notifications: {e}");
                return;
            }
        };
        if let Err(e) = self.storage.save(&self.settings.storage_key, &bytes) {
            tracing::warn!("⚠️ Failed to persist notifications ({}): {e}", self.storage.name());
        }
    }
}

fn load_records(storage: &dyn KeyValueStore, key: &str) -> Vec<CenterRecord> {
    match storage.load(key) {
        Ok(Some(bytes)) => decode_records(&bytes),
        Ok(None) => Vec::new(),
        Err(e) => {
            tracing::warn!("⚠️ Failed to load notifications ({}): {e}", storage.name());
            Vec::new()
        }
    }
}

/// Decode each stored record on its own; one bad entry must not cost the rest.
fn decode_records(bytes: &[u8]) -> Vec<CenterRecord> {
    let values: Vec<serde_json::Value> = match serde_json::from_slice(bytes) {
        Ok(values) => values,
        Err(e) => {
            tracing::warn!("⚠️ Failed to parse persisted notifications: {e}");
            return Vec::new();
        }
    };
    values
        .into_iter()
        .enumerate()
        .filter_map(|(i, value)| match serde_json::from_value::<CenterRecord>(value) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!("⚠️ Skipping persisted notification #{i}: {e}");
                None
            }
        })
        .collect()
}

/// The notification center store.
pub struct CenterStore {
    shared: Arc<CenterShared>,
    subscription: Subscription,
}

impl CenterStore {
    /// Load persisted records, then attach to the bus as a center listener.
    pub fn new(bus: &NotificationBus, storage: Arc<dyn KeyValueStore>) -> Self {
        Self::with_settings(bus, storage, CenterSettings::default())
    }

    pub fn from_config(bus: &NotificationBus, storage: Arc<dyn KeyValueStore>, config: &NotificationConfig) -> Self {
        Self::with_settings(bus, storage, CenterSettings::from(config))
    }

    pub fn with_settings(bus: &NotificationBus, storage: Arc<dyn KeyValueStore>, settings: CenterSettings) -> Self {
        let mut state = CenterState {
            records: load_records(storage.as_ref(), &settings.storage_key),
            ..CenterState::default()
        };
        state.evict(settings.max_records.max(1));
        tracing::info!(
            "📥 Notification center loaded {} record(s) from {}",
            state.records.len(),
            storage.name()
        );

        let (unread_tx, _) = watch::channel(state.unread_count());
        let shared = Arc::new(CenterShared {
            state: Mutex::new(state),
            storage,
            settings,
            unread_tx,
        });

        let listener_shared = shared.clone();
        let subscription = bus.subscribe_center(move |event| {
            listener_shared.mutate(|state| state.ingest(event));
        });

        Self {
            shared,
            subscription,
        }
    }

    // ─── Queries ──────────────────────────────────────────

    /// Records visible under the active filter, in insertion order (newest
    /// insert first). A re-signalled record keeps its position.
    pub fn notifications(&self) -> Vec<CenterRecord> {
        let state = self.shared.lock();
        state
            .records
            .iter()
            .filter(|r| state.filter.matches(r))
            .cloned()
            .collect()
    }

    /// Records matching an arbitrary filter, without changing the active one.
    pub fn query(&self, filter: &NotificationFilter) -> Vec<CenterRecord> {
        self.shared
            .lock()
            .records
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect()
    }

    /// Every retained record, archived included.
    pub fn all_records(&self) -> Vec<CenterRecord> {
        self.shared.lock().records.clone()
    }

    /// The live record for `id`, falling back to an archived one.
    pub fn get(&self, id: &str) -> Option<CenterRecord> {
        let state = self.shared.lock();
        state
            .records
            .iter()
            .find(|r| r.id == id && !r.archived)
            .or_else(|| state.records.iter().find(|r| r.id == id))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.shared.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn unread_count(&self) -> usize {
        self.shared.lock().unread_count()
    }

    /// Badge text: empty when nothing is unread, "9+" past nine.
    pub fn badge_label(&self) -> String {
        match self.unread_count() {
            0 => String::new(),
            n if n > 9 => "9+".to_string(),
            n => n.to_string(),
        }
    }

    /// Receiver that always holds the current unread count.
    pub fn watch_unread(&self) -> watch::Receiver<usize> {
        self.shared.unread_tx.subscribe()
    }

    /// Non-archived record count per category.
    pub fn category_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for r in self.shared.lock().records.iter().filter(|r| !r.archived) {
            *counts.entry(r.category.clone()).or_insert(0) += 1;
        }
        counts
    }

    pub fn filter(&self) -> NotificationFilter {
        self.shared.lock().filter.clone()
    }

    /// Change what [`Self::notifications`] returns and what [`Self::clear_all`] removes.
    pub fn set_filter(&self, filter: NotificationFilter) {
        self.shared.lock().filter = filter;
    }

    // ─── Panel open/closed ────────────────────────────────

    pub fn is_open(&self) -> bool {
        self.shared.lock().open
    }

    pub fn toggle_center(&self) -> bool {
        let mut state = self.shared.lock();
        state.open = !state.open;
        state.open
    }

    pub fn open(&self) {
        self.shared.lock().open = true;
    }

    pub fn close(&self) {
        self.shared.lock().open = false;
    }

    // ─── Mutations ────────────────────────────────────────

    /// Record an alert directly, without a toast. A caller id that already has
    /// a live record is left as is.
    pub fn add_notification(&self, message: impl Into<String>, severity: Severity, options: NotifyOptions) -> String {
        let event = NotificationEvent::normalize(message, severity, options, &self.shared.settings.durations);
        let id = event.id.clone();
        self.shared.mutate(|state| {
            if !state.records.iter().any(|r| r.id == event.id && !r.archived) {
                state.ingest(&event);
            }
        });
        id
    }

    /// Returns whether any record with `id` exists.
    pub fn mark_as_read(&self, id: &str) -> bool {
        self.shared.mutate(|state| {
            let mut found = false;
            for r in state.records.iter_mut().filter(|r| r.id == id) {
                r.read = true;
                found = true;
            }
            found
        })
    }

    /// Mark every non-archived record read.
    pub fn mark_all_as_read(&self) {
        self.shared.mutate(|state| {
            for r in state.records.iter_mut().filter(|r| !r.archived) {
                r.read = true;
            }
        });
    }

    /// Archive (and mark read) the records for `id`. Idempotent: returns
    /// `true` as long as some record with `id` exists.
    pub fn archive_notification(&self, id: &str) -> bool {
        self.shared.mutate(|state| {
            let mut found = false;
            for r in state.records.iter_mut().filter(|r| r.id == id) {
                r.archived = true;
                r.read = true;
                found = true;
            }
            found
        })
    }

    /// Permanently remove every record with `id`.
    pub fn delete_notification(&self, id: &str) -> bool {
        self.shared.mutate(|state| {
            let before = state.records.len();
            state.records.retain(|r| r.id != id);
            state.records.len() < before
        })
    }

    /// Remove the records in the active filter's scope. Returns how many went.
    pub fn clear_all(&self) -> usize {
        self.shared.mutate(|state| {
            let before = state.records.len();
            let filter = state.filter.clone();
            state.records.retain(|r| !filter.matches(r));
            let removed = before - state.records.len();
            tracing::info!("🧹 Cleared {} notification(s) under '{}'", removed, filter);
            removed
        })
    }
}

impl Drop for CenterStore {
    fn drop(&mut self) {
        self.subscription.unsubscribe();
    }
}
