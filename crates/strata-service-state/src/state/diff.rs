//! Structural diff of two committed snapshots.
//!
//! [`diff`] is pure: it sees only the previous and the next snapshot and
//! derives every transition flag from them, so it can be exercised without
//! a radio or a reconciler.

use super::snapshot::Snapshot;
use crate::notify::EventKind;

/// Transition flags for one commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Transitions {
    pub registered: bool,
    pub deregistered: bool,
    pub data_attached: bool,
    pub data_detached: bool,
    pub technology_changed: bool,
    pub roaming_on: bool,
    pub roaming_off: bool,
    pub location_changed: bool,
    /// Data stayed up across an LTE ⇄ eHRPD move.
    pub linked_handoff: bool,
    pub gained_multi_session: bool,
    pub lost_multi_session: bool,
    pub data_state_changed: bool,
    /// Any field of the service state differs.
    pub service_changed: bool,
}

impl Transitions {
    pub fn is_empty(&self) -> bool {
        *self == Transitions::default()
    }

    /// Events to fan out for these flags, in a stable order.
    pub fn fired(&self) -> Vec<EventKind> {
        let table = [
            (self.registered, EventKind::Registered),
            (self.deregistered, EventKind::Deregistered),
            (self.data_attached, EventKind::DataAttached),
            (self.data_detached, EventKind::DataDetached),
            (self.technology_changed, EventKind::TechnologyChanged),
            (self.roaming_on, EventKind::RoamingOn),
            (self.roaming_off, EventKind::RoamingOff),
            (self.location_changed, EventKind::LocationChanged),
            (self.linked_handoff, EventKind::LinkedHandoff),
            (self.gained_multi_session, EventKind::GainedMultiSession),
            (self.lost_multi_session, EventKind::LostMultiSession),
            (self.service_changed, EventKind::ServiceStateChanged),
            (
                self.data_state_changed || self.technology_changed,
                EventKind::DataConnectionChanged,
            ),
        ];
        table
            .into_iter()
            .filter_map(|(on, kind)| on.then_some(kind))
            .collect()
    }

    /// Only the registration/data/roaming/technology edges, without the
    /// coarse "something changed" notifications.
    pub fn edges(&self) -> Vec<EventKind> {
        self.fired().into_iter().filter(|k| k.is_edge()).collect()
    }
}

/// Compare `old` against `new` field by field.
pub fn diff(old: &Snapshot, new: &Snapshot) -> Transitions {
    let (o, n) = (&old.service, &new.service);

    let old_voice_up = o.state.is_in_service();
    let new_voice_up = n.state.is_in_service();
    let old_data_up = o.data_state.is_in_service();
    let new_data_up = n.data_state.is_in_service();

    Transitions {
        registered: !old_voice_up && new_voice_up,
        deregistered: old_voice_up && !new_voice_up,
        data_attached: !old_data_up && new_data_up,
        data_detached: old_data_up && !new_data_up,
        technology_changed: o.technology != n.technology
            || o.data_technology != n.data_technology,
        roaming_on: !o.roaming && n.roaming,
        roaming_off: o.roaming && !n.roaming,
        location_changed: old.cell != new.cell,
        linked_handoff: new_data_up && o.data_technology.is_linked_with(n.data_technology),
        gained_multi_session: n.data_technology.supports_multi_session()
            && !o.data_technology.supports_multi_session(),
        lost_multi_session: n.data_technology.is_legacy_single_session()
            && !o.data_technology.is_legacy_single_session(),
        data_state_changed: o.data_state != n.data_state,
        service_changed: o != n,
    }
}
