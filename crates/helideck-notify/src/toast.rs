//! Toast store for the short-lived popups.
//!
//! Every bus event becomes a toast. Re-signalling an id replaces the toast in
//! place and re-arms its timer; timers are tokio tasks tagged with a
//! generation so a cancelled or superseded timer can never remove the
//! replacement.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::dispatch::{NotificationBus, Subscription};
use crate::event::NotificationEvent;

struct ToastSlot {
    event: NotificationEvent,
    generation: u64,
    expiry: Option<JoinHandle<()>>,
}

impl ToastSlot {
    fn cancel_expiry(&mut self) {
        if let Some(task) = self.expiry.take() {
            task.abort();
        }
    }
}

#[derive(Default)]
struct ToastState {
    slots: Vec<ToastSlot>,
    next_generation: u64,
}

type SharedState = Arc<Mutex<ToastState>>;

fn lock(state: &Mutex<ToastState>) -> MutexGuard<'_, ToastState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Visible toasts, in arrival order.
pub struct ToastStore {
    state: SharedState,
    subscription: Subscription,
}

impl ToastStore {
    /// Create the store and attach it to the bus as a toast listener.
    pub fn new(bus: &NotificationBus) -> Self {
        let state: SharedState = Arc::new(Mutex::new(ToastState::default()));
        let listener_state = state.clone();
        let subscription = bus.subscribe_toast(move |event| upsert(&listener_state, event.clone()));
        Self {
            state,
            subscription,
        }
    }

    /// Snapshot of the visible toasts, oldest first.
    pub fn visible(&self) -> Vec<NotificationEvent> {
        lock(&self.state).slots.iter().map(|s| s.event.clone()).collect()
    }

    pub fn get(&self, id: &str) -> Option<NotificationEvent> {
        lock(&self.state)
            .slots
            .iter()
            .find(|s| s.event.id == id)
            .map(|s| s.event.clone())
    }

    pub fn len(&self) -> usize {
        lock(&self.state).slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dismiss a toast and cancel its timer. Returns `false` for unknown ids.
    pub fn remove(&self, id: &str) -> bool {
        let mut state = lock(&self.state);
        match state.slots.iter().position(|s| s.event.id == id) {
            Some(pos) => {
                let mut slot = state.slots.remove(pos);
                slot.cancel_expiry();
                tracing::debug!("🗑️ Toast removed: {}", id);
                true
            }
            None => false,
        }
    }

    /// Dismiss everything.
    pub fn clear(&self) {
        let mut state = lock(&self.state);
        for slot in state.slots.iter_mut() {
            slot.cancel_expiry();
        }
        state.slots.clear();
    }

    /// Run the toast's action callback, if it has one.
    pub fn trigger_action(&self, id: &str) -> bool {
        let action = lock(&self.state)
            .slots
            .iter()
            .find(|s| s.event.id == id)
            .and_then(|s| s.event.action.clone());
        // Run outside the lock: the callback may notify or remove toasts.
        match action {
            Some(action) => {
                action.invoke();
                true
            }
            None => false,
        }
    }
}

impl Drop for ToastStore {
    fn drop(&mut self) {
        self.subscription.unsubscribe();
        self.clear();
    }
}

fn upsert(state: &SharedState, event: NotificationEvent) {
    let mut guard = lock(state);
    guard.next_generation += 1;
    let generation = guard.next_generation;
    let expiry = schedule_expiry(Arc::downgrade(state), &event, generation);

    if let Some(slot) = guard.slots.iter_mut().find(|s| s.event.id == event.id) {
        slot.cancel_expiry();
        tracing::debug!("🔁 Toast replaced: {}", event.id);
        slot.event = event;
        slot.generation = generation;
        slot.expiry = expiry;
    } else {
        guard.slots.push(ToastSlot {
            event,
            generation,
            expiry,
        });
    }
}

fn schedule_expiry(state: Weak<Mutex<ToastState>>, event: &NotificationEvent, generation: u64) -> Option<JoinHandle<()>> {
    if event.duration_ms == 0 {
        return None;
    }
    let runtime = match tokio::runtime::Handle::try_current() {
        Ok(handle) => handle,
        Err(_) => {
            tracing::warn!("⚠️ No tokio runtime, toast '{}' will not auto-dismiss", event.id);
            return None;
        }
    };

    let id = event.id.clone();
    let delay = Duration::from_millis(event.duration_ms);
    Some(runtime.spawn(async move {
        tokio::time::sleep(delay).await;
        if let Some(state) = state.upgrade() {
            expire(&state, &id, generation);
        }
    }))
}

/// Timer fired: only remove the slot this timer was armed for.
fn expire(state: &Mutex<ToastState>, id: &str, generation: u64) {
    let mut guard = lock(state);
    if let Some(pos) = guard
        .slots
        .iter()
        .position(|s| s.event.id == id && s.generation == generation)
    {
        guard.slots.remove(pos);
        tracing::debug!("⏱️ Toast expired: {}", id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::NotifyOptions;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn advance(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        tokio::task::yield_now().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_toast_self_removes() {
        let bus = NotificationBus::new();
        let toasts = ToastStore::new(&bus);
        bus.success("Upload complete", NotifyOptions::new());
        assert_eq!(toasts.len(), 1);

        advance(4900).await;
        assert_eq!(toasts.len(), 1);
        advance(200).await;
        assert!(toasts.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dedup_replaces_in_place() {
        let bus = NotificationBus::new();
        let toasts = ToastStore::new(&bus);
        bus.info("first", NotifyOptions::new().id("a"));
        bus.info("other", NotifyOptions::new().id("b"));
        bus.error("second", NotifyOptions::new().id("a"));

        let visible = toasts.visible();
        assert_eq!(visible.len(), 2);
        assert_eq!(visible[0].id, "a");
        assert_eq!(visible[0].message, "second");
        assert_eq!(visible[0].severity, crate::Severity::Error);
        assert_eq!(visible[1].id, "b");
    }

    #[tokio::test(start_paused = true)]
    async fn test_replace_cancels_stale_timer() {
        let bus = NotificationBus::new();
        let toasts = ToastStore::new(&bus);
        bus.info("v1", NotifyOptions::new().id("a").duration_ms(1000));
        advance(600).await;
        bus.info("v2", NotifyOptions::new().id("a").duration_ms(1000));

        // The first timer would have fired at 1000ms.
        advance(500).await;
        assert_eq!(toasts.get("a").unwrap().message, "v2");

        advance(600).await;
        assert!(toasts.get("a").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_loading_stays_until_removed() {
        let bus = NotificationBus::new();
        let toasts = ToastStore::new(&bus);
        let id = bus.loading("Uploading helideck plate...", NotifyOptions::new().id("upload-1"));
        advance(60_000).await;
        assert_eq!(toasts.len(), 1);

        assert!(toasts.remove(&id));
        assert!(toasts.is_empty());
        assert!(!toasts.remove(&id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_cancels_timer_for_readded_id() {
        let bus = NotificationBus::new();
        let toasts = ToastStore::new(&bus);
        bus.warning("w", NotifyOptions::new().id("x").duration_ms(1000));
        toasts.remove("x");
        bus.loading("again", NotifyOptions::new().id("x"));
        advance(2000).await;
        assert_eq!(toasts.get("x").unwrap().message, "again");
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_action() {
        let bus = NotificationBus::new();
        let toasts = ToastStore::new(&bus);
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        bus.error(
            "Failed to download helideck plate",
            NotifyOptions::new().id("dl").action("Retry", move || {
                h.fetch_add(1, Ordering::SeqCst);
            }),
        );
        bus.info("plain", NotifyOptions::new().id("plain"));

        assert!(toasts.trigger_action("dl"));
        assert!(!toasts.trigger_action("plain"));
        assert!(!toasts.trigger_action("missing"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_unsubscribes() {
        let bus = NotificationBus::new();
        let toasts = ToastStore::new(&bus);
        assert_eq!(bus.listener_count(crate::ListenerKind::Toast), 1);
        drop(toasts);
        assert_eq!(bus.listener_count(crate::ListenerKind::Toast), 0);
    }

    #[test]
    fn test_without_runtime_keeps_toast() {
        let bus = NotificationBus::new();
        let toasts = ToastStore::new(&bus);
        bus.success("no timers here", NotifyOptions::new().id("s"));
        assert_eq!(toasts.len(), 1);
        toasts.clear();
        assert!(toasts.is_empty());
    }
}
