//! Notification bus: the single fan-out point for every alert in the app.
//!
//! Producers call [`NotificationBus::notify`]; the bus normalizes the event and
//! hands it synchronously to every toast listener, then to every center
//! listener if the event qualifies (warning/error or `persist`).
//! No queue: with nobody subscribed, the event is simply dropped.

use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use helideck_core::ToastDurations;

use crate::event::{NotificationEvent, NotifyOptions, Severity};

/// Listener callback. Runs on the producer's thread, inside `notify`.
pub type Listener = Arc<dyn Fn(&NotificationEvent) + Send + Sync>;

/// Which side of the bus a listener is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    Toast,
    Center,
}

impl std::fmt::Display for ListenerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerKind::Toast => write!(f, "toast"),
            ListenerKind::Center => write!(f, "center"),
        }
    }
}

/// Listener tables keyed by subscription token. Tokens are monotonic, so
/// map order is subscription order.
#[derive(Default)]
struct Registry {
    next_token: u64,
    toast: BTreeMap<u64, Listener>,
    center: BTreeMap<u64, Listener>,
}

impl Registry {
    fn table(&mut self, kind: ListenerKind) -> &mut BTreeMap<u64, Listener> {
        match kind {
            ListenerKind::Toast => &mut self.toast,
            ListenerKind::Center => &mut self.center,
        }
    }
}

/// Handle returned by `subscribe_*`. Dropping it does NOT unsubscribe;
/// call [`Subscription::unsubscribe`] (any number of times).
#[derive(Debug)]
pub struct Subscription {
    registry: Weak<Mutex<Registry>>,
    kind: ListenerKind,
    token: u64,
}

impl Subscription {
    /// Detach exactly this listener. Safe to repeat, and safe after the bus is gone.
    pub fn unsubscribe(&self) {
        if let Some(registry) = self.registry.upgrade() {
            let mut reg = registry.lock().unwrap_or_else(PoisonError::into_inner);
            if reg.table(self.kind).remove(&self.token).is_some() {
                tracing::debug!("🔕 Unsubscribed {} listener #{}", self.kind, self.token);
            }
        }
    }

    pub fn kind(&self) -> ListenerKind {
        self.kind
    }
}

/// The event bus. Cheap to clone; clones share one listener registry.
/// Build one at startup and inject it into the stores and producers.
#[derive(Clone)]
pub struct NotificationBus {
    registry: Arc<Mutex<Registry>>,
    durations: ToastDurations,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::with_durations(ToastDurations::default())
    }

    /// Bus whose per-severity default durations come from config.
    pub fn with_durations(durations: ToastDurations) -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry::default())),
            durations,
        }
    }

    pub fn durations(&self) -> &ToastDurations {
        &self.durations
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn subscribe(&self, kind: ListenerKind, listener: Listener) -> Subscription {
        let mut reg = self.registry();
        let token = reg.next_token;
        reg.next_token += 1;
        reg.table(kind).insert(token, listener);
        tracing::debug!("🔔 Subscribed {} listener #{}", kind, token);
        Subscription {
            registry: Arc::downgrade(&self.registry),
            kind,
            token,
        }
    }

    /// Receive every event.
    pub fn subscribe_toast<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&NotificationEvent) + Send + Sync + 'static,
    {
        self.subscribe(ListenerKind::Toast, Arc::new(listener))
    }

    /// Receive only events that qualify for the notification center.
    pub fn subscribe_center<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&NotificationEvent) + Send + Sync + 'static,
    {
        self.subscribe(ListenerKind::Center, Arc::new(listener))
    }

    pub fn listener_count(&self, kind: ListenerKind) -> usize {
        self.registry().table(kind).len()
    }

    /// Normalize and fan out an alert. Returns the event id (caller's or generated).
    pub fn notify(&self, message: impl Into<String>, severity: Severity, options: NotifyOptions) -> String {
        let event = NotificationEvent::normalize(message, severity, options, &self.durations);
        self.publish(&event);
        event.id
    }

    /// Fan out an already-built event.
    pub fn publish(&self, event: &NotificationEvent) {
        // Snapshot so listeners may (un)subscribe or notify re-entrantly.
        let (toast, center): (Vec<Listener>, Vec<Listener>) = {
            let reg = self.registry();
            let center = if event.qualifies_for_center() {
                reg.center.values().cloned().collect()
            } else {
                Vec::new()
            };
            (reg.toast.values().cloned().collect(), center)
        };

        if toast.is_empty() && center.is_empty() {
            tracing::debug!("📭 No listeners for '{}', dropped", event.id);
            return;
        }

        deliver(ListenerKind::Toast, &toast, event);
        deliver(ListenerKind::Center, &center, event);
    }

    pub fn success(&self, message: impl Into<String>, options: NotifyOptions) -> String {
        self.notify(message, Severity::Success, options)
    }

    pub fn error(&self, message: impl Into<String>, options: NotifyOptions) -> String {
        self.notify(message, Severity::Error, options)
    }

    pub fn warning(&self, message: impl Into<String>, options: NotifyOptions) -> String {
        self.notify(message, Severity::Warning, options)
    }

    pub fn info(&self, message: impl Into<String>, options: NotifyOptions) -> String {
        self.notify(message, Severity::Info, options)
    }

    /// Loading toasts never auto-dismiss; remove them by id when the work finishes.
    pub fn loading(&self, message: impl Into<String>, options: NotifyOptions) -> String {
        self.notify(message, Severity::Loading, options.duration_ms(0))
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Call each listener; a panicking listener is logged and skipped.
fn deliver(kind: ListenerKind, listeners: &[Listener], event: &NotificationEvent) {
    for listener in listeners {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| listener(event))) {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!("💥 {} listener failed on '{}': {}", kind, event.id, reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    fn recorder() -> (Arc<StdMutex<Vec<String>>>, impl Fn(&NotificationEvent) + Send + Sync + 'static) {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let s = seen.clone();
        (seen, move |ev: &NotificationEvent| s.lock().unwrap().push(ev.id.clone()))
    }

    #[test]
    fn test_routing_rule() {
        let bus = NotificationBus::new();
        let (toasts, t) = recorder();
        let (center, c) = recorder();
        let _ts = bus.subscribe_toast(t);
        let _cs = bus.subscribe_center(c);

        bus.success("saved", NotifyOptions::new().id("s"));
        bus.info("fyi", NotifyOptions::new().id("i"));
        bus.loading("working", NotifyOptions::new().id("l"));
        bus.warning("careful", NotifyOptions::new().id("w"));
        bus.error("broken", NotifyOptions::new().id("e"));
        bus.info("pinned", NotifyOptions::new().id("p").persist(true));

        assert_eq!(*toasts.lock().unwrap(), vec!["s", "i", "l", "w", "e", "p"]);
        assert_eq!(*center.lock().unwrap(), vec!["w", "e", "p"]);
    }

    #[test]
    fn test_notify_returns_id() {
        let bus = NotificationBus::new();
        assert_eq!(bus.error("x", NotifyOptions::new().id("na-kika-lighting")), "na-kika-lighting");
        let generated = bus.info("x", NotifyOptions::new());
        assert!(!generated.is_empty());
        assert_ne!(generated, bus.info("x", NotifyOptions::new()));
    }

    #[test]
    fn test_subscription_order() {
        let bus = NotificationBus::new();
        let order = Arc::new(StdMutex::new(Vec::new()));
        let subs: Vec<_> = (0..3)
            .map(|n| {
                let o = order.clone();
                bus.subscribe_toast(move |_| o.lock().unwrap().push(n))
            })
            .collect();
        bus.info("x", NotifyOptions::new());
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(subs.len(), 3);
    }

    #[test]
    fn test_unsubscribe_is_idempotent_and_targeted() {
        let bus = NotificationBus::new();
        let (a_seen, a) = recorder();
        let (b_seen, b) = recorder();
        let sub_a = bus.subscribe_toast(a);
        let _sub_b = bus.subscribe_toast(b);

        sub_a.unsubscribe();
        sub_a.unsubscribe();
        assert_eq!(bus.listener_count(ListenerKind::Toast), 1);

        bus.info("x", NotifyOptions::new().id("after"));
        assert!(a_seen.lock().unwrap().is_empty());
        assert_eq!(*b_seen.lock().unwrap(), vec!["after"]);
    }

    #[test]
    fn test_unsubscribe_after_bus_dropped() {
        let bus = NotificationBus::new();
        let sub = bus.subscribe_center(|_| {});
        drop(bus);
        sub.unsubscribe();
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let bus = NotificationBus::new();
        let _bad = bus.subscribe_toast(|_| panic!("listener blew up"));
        let (seen, good) = recorder();
        let _good = bus.subscribe_toast(good);

        let id = bus.warning("still delivered", NotifyOptions::new().id("w1"));
        assert_eq!(id, "w1");
        assert_eq!(*seen.lock().unwrap(), vec!["w1"]);
    }

    #[test]
    fn test_panicking_center_listener_beside_center_store() {
        let bus = NotificationBus::new();
        let _bad = bus.subscribe_center(|_| panic!("center listener blew up"));
        let center = crate::CenterStore::new(&bus, Arc::new(crate::MemoryStore::new()));
        let _late_bad = bus.subscribe_center(|_| panic!("late listener blew up"));

        bus.error("Helideck lighting failure", NotifyOptions::new().id("na-kika-lighting"));
        bus.warning("Helicard expiring", NotifyOptions::new().id("hc-2"));

        assert_eq!(center.len(), 2);
        assert_eq!(center.unread_count(), 2);
        assert!(center.get("na-kika-lighting").is_some());
    }

    #[test]
    fn test_no_listeners_drops_event() {
        let bus = NotificationBus::new();
        let id = bus.error("nobody home", NotifyOptions::new());
        assert!(!id.is_empty());
    }

    #[test]
    fn test_publish_prebuilt_event() {
        let bus = NotificationBus::new();
        let (toasts, t) = recorder();
        let (center, c) = recorder();
        let _ts = bus.subscribe_toast(t);
        let _cs = bus.subscribe_center(c);

        let event = NotificationEvent::normalize(
            "Helicard expiring",
            Severity::Warning,
            NotifyOptions::new().id("hc-7"),
            bus.durations(),
        );
        bus.publish(&event);
        assert_eq!(*toasts.lock().unwrap(), vec!["hc-7"]);
        assert_eq!(*center.lock().unwrap(), vec!["hc-7"]);
    }

    #[test]
    fn test_loading_forces_zero_duration() {
        let bus = NotificationBus::new();
        let durations = Arc::new(StdMutex::new(Vec::new()));
        let d = durations.clone();
        let _s = bus.subscribe_toast(move |ev| d.lock().unwrap().push(ev.duration_ms));
        bus.loading("uploading", NotifyOptions::new().duration_ms(3000));
        bus.error("failed", NotifyOptions::new());
        assert_eq!(*durations.lock().unwrap(), vec![0, 7000]);
    }

    #[test]
    fn test_custom_durations() {
        let bus = NotificationBus::with_durations(ToastDurations {
            success_ms: 1000,
            ..ToastDurations::default()
        });
        let durations = Arc::new(StdMutex::new(Vec::new()));
        let d = durations.clone();
        let _s = bus.subscribe_toast(move |ev| d.lock().unwrap().push(ev.duration_ms));
        bus.success("ok", NotifyOptions::new());
        assert_eq!(*durations.lock().unwrap(), vec![1000]);
    }

    #[test]
    fn test_reentrant_notify_from_listener() {
        let bus = NotificationBus::new();
        let (seen, rec) = recorder();
        let _rec = bus.subscribe_toast(rec);
        let inner = bus.clone();
        let _echo = bus.subscribe_center(move |ev| {
            if ev.id == "outer" {
                inner.info("echo", NotifyOptions::new().id("inner"));
            }
        });
        bus.error("boom", NotifyOptions::new().id("outer"));
        assert_eq!(*seen.lock().unwrap(), vec!["outer", "inner"]);
    }
}
