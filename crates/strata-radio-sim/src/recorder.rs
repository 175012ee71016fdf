use std::sync::{Arc, Mutex};
use strata_service_state::notify::{EventKind, Notification, NotificationHub, Observer};
use strata_service_state::tracker::CycleId;

/// Observer that keeps every notification it receives, in arrival order.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    seen: Mutex<Vec<(EventKind, CycleId)>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Subscribe `this` to every event kind on `hub`.
    pub fn attach(this: &Arc<Self>, hub: &NotificationHub) {
        let observer: Arc<dyn Observer> = this.clone();
        for kind in EventKind::ALL {
            hub.subscribe(kind, observer.clone());
        }
    }

    pub fn events(&self) -> Vec<(EventKind, CycleId)> {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events().into_iter().map(|(k, _)| k).collect()
    }

    /// Kinds delivered for one cycle.
    pub fn kinds_for(&self, cycle: CycleId) -> Vec<EventKind> {
        self.events()
            .into_iter()
            .filter(|(_, c)| *c == cycle)
            .map(|(k, _)| k)
            .collect()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events().iter().filter(|(k, _)| *k == kind).count()
    }

    pub fn clear(&self) {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl Observer for RecordingObserver {
    fn on_event(&self, notification: &Notification) {
        self.seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((notification.kind, notification.cycle));
    }
}
