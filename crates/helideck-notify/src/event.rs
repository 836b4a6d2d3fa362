//! Notification events, the unit the bus fans out to toasts and the center.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use helideck_core::{HelideckError, ToastDurations};
use serde::{Deserialize, Serialize};

/// Category used when the producer doesn't give one.
pub const DEFAULT_CATEGORY: &str = "general";

/// Alert class: drives default duration and center routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Success,
    Warning,
    Error,
    Loading,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::Info,
        Severity::Success,
        Severity::Warning,
        Severity::Error,
        Severity::Loading,
    ];

    /// Auto-dismiss duration in ms when the producer didn't set one.
    /// `0` means the toast stays until removed.
    pub fn default_duration_ms(&self, durations: &ToastDurations) -> u64 {
        match self {
            Severity::Success => durations.success_ms,
            Severity::Info => durations.info_ms,
            Severity::Warning => durations.warning_ms,
            Severity::Error => durations.error_ms,
            Severity::Loading => 0,
        }
    }

    /// Warnings and errors always land in the notification center.
    pub fn routes_to_center(&self) -> bool {
        matches!(self, Severity::Warning | Severity::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Loading => "loading",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = HelideckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "success" => Ok(Severity::Success),
            "warning" | "warn" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            "loading" => Ok(Severity::Loading),
            other => Err(HelideckError::InvalidSeverity(other.to_string())),
        }
    }
}

/// Callback a toast or record can offer (e.g. "Retry", "View inspection").
#[derive(Clone)]
pub struct NotificationAction {
    pub label: String,
    callback: Arc<dyn Fn() + Send + Sync>,
}

impl NotificationAction {
    pub fn new<F>(label: impl Into<String>, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            callback: Arc::new(callback),
        }
    }

    pub fn invoke(&self) {
        (self.callback)();
    }
}

impl fmt::Debug for NotificationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationAction")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Producer-side knobs for [`crate::NotificationBus::notify`].
/// Everything is optional; missing or blank values fall back to defaults.
#[derive(Debug, Clone, Default)]
pub struct NotifyOptions {
    pub id: Option<String>,
    pub duration_ms: Option<u64>,
    pub persist: bool,
    pub category: Option<String>,
    pub action: Option<NotificationAction>,
}

impl NotifyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reuse a logical id so re-signals replace instead of stacking.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn duration_ms(mut self, ms: u64) -> Self {
        self.duration_ms = Some(ms);
        self
    }

    /// Force the event into the notification center regardless of severity.
    pub fn persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn action<F>(mut self, label: impl Into<String>, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.action = Some(NotificationAction::new(label, callback));
        self
    }
}

/// A normalized alert, as delivered to listeners.
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    pub id: String,
    pub message: String,
    pub severity: Severity,
    pub category: String,
    pub persist: bool,
    /// Auto-dismiss after this many ms; `0` = never.
    pub duration_ms: u64,
    pub action: Option<NotificationAction>,
    pub created_at: DateTime<Utc>,
}

impl NotificationEvent {
    /// Build an event from raw producer input, applying defaults.
    pub fn normalize(
        message: impl Into<String>,
        severity: Severity,
        options: NotifyOptions,
        durations: &ToastDurations,
    ) -> Self {
        let id = options
            .id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(generate_id);
        let category = options
            .category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());
        let duration_ms = options
            .duration_ms
            .unwrap_or_else(|| severity.default_duration_ms(durations));

        Self {
            id,
            message: message.into(),
            severity,
            category,
            persist: options.persist,
            duration_ms,
            action: options.action,
            created_at: Utc::now(),
        }
    }

    /// Routing rule for the notification center.
    pub fn qualifies_for_center(&self) -> bool {
        self.persist || self.severity.routes_to_center()
    }
}

fn generate_id() -> String {
    format!("ntf-{}", uuid::Uuid::new_v4().simple())
}
