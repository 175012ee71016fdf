//! # Notification Fan-out
//!
//! One ordered observer list per [`EventKind`], kept in a single keyed
//! collection. Observers receive the committed snapshot behind an `Arc`,
//! so they can read it but never change what other observers see.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::state::Snapshot;
use crate::tracker::barrier::CycleId;

/// Kinds of notification an observer can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    Registered,
    Deregistered,
    DataAttached,
    DataDetached,
    TechnologyChanged,
    RoamingOn,
    RoamingOff,
    LocationChanged,
    LinkedHandoff,
    GainedMultiSession,
    LostMultiSession,
    ServiceStateChanged,
    DataConnectionChanged,
    SignalStrengthChanged,
    StrategySwapFailed,
}

impl EventKind {
    pub const ALL: [EventKind; 15] = [
        EventKind::Registered,
        EventKind::Deregistered,
        EventKind::DataAttached,
        EventKind::DataDetached,
        EventKind::TechnologyChanged,
        EventKind::RoamingOn,
        EventKind::RoamingOff,
        EventKind::LocationChanged,
        EventKind::LinkedHandoff,
        EventKind::GainedMultiSession,
        EventKind::LostMultiSession,
        EventKind::ServiceStateChanged,
        EventKind::DataConnectionChanged,
        EventKind::SignalStrengthChanged,
        EventKind::StrategySwapFailed,
    ];

    /// Whether this kind is a registration/data/roaming/technology edge
    /// rather than a coarse change or failure report.
    pub fn is_edge(self) -> bool {
        !matches!(
            self,
            EventKind::ServiceStateChanged
                | EventKind::DataConnectionChanged
                | EventKind::SignalStrengthChanged
                | EventKind::StrategySwapFailed
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Delivered to every observer of `kind`.
#[derive(Debug, Clone)]
pub struct Notification {
    pub kind: EventKind,
    pub cycle: CycleId,
    pub snapshot: Arc<Snapshot>,
}

pub trait Observer: Send + Sync {
    fn on_event(&self, notification: &Notification);
}

impl<F> Observer for F
where
    F: Fn(&Notification) + Send + Sync,
{
    fn on_event(&self, notification: &Notification) {
        self(notification)
    }
}

/// Keyed observer registry.
#[derive(Default)]
pub struct NotificationHub {
    observers: RwLock<HashMap<EventKind, Vec<Arc<dyn Observer>>>>,
}

/// Observer identity is the allocation, not the value.
fn same_observer(a: &Arc<dyn Observer>, b: &Arc<dyn Observer>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `observer` for `kind`. Returns `false` if it was already
    /// registered.
    pub fn subscribe(&self, kind: EventKind, observer: Arc<dyn Observer>) -> bool {
        let mut map = self.observers.write().unwrap_or_else(|e| e.into_inner());
        let list = map.entry(kind).or_default();
        if list.iter().any(|o| same_observer(o, &observer)) {
            return false;
        }
        list.push(observer);
        true
    }

    /// Remove `observer` from `kind`. Returns `false` if it was not
    /// registered.
    pub fn unsubscribe(&self, kind: EventKind, observer: &Arc<dyn Observer>) -> bool {
        let mut map = self.observers.write().unwrap_or_else(|e| e.into_inner());
        let Some(list) = map.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|o| !same_observer(o, observer));
        before != list.len()
    }

    pub fn observer_count(&self, kind: EventKind) -> usize {
        self.observers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&kind)
            .map_or(0, Vec::len)
    }

    /// Deliver to every observer of `notification.kind`, in registration
    /// order, and return how many were called. The list is cloned first so
    /// observers may (un)subscribe from inside the callback.
    pub fn notify(&self, notification: &Notification) -> usize {
        let targets: Vec<Arc<dyn Observer>> = self
            .observers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&notification.kind)
            .cloned()
            .unwrap_or_default();

        for observer in &targets {
            observer.on_event(notification);
        }
        targets.len()
    }
}

impl fmt::Debug for NotificationHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let map = self.observers.read().unwrap_or_else(|e| e.into_inner());
        let counts: HashMap<EventKind, usize> = map.iter().map(|(k, v)| (*k, v.len())).collect();
        f.debug_struct("NotificationHub")
            .field("observers", &counts)
            .finish()
    }
}
