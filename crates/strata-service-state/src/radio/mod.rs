//! # Radio Layer Boundary
//!
//! Traits for the collaborators the tracker consumes (the radio transport
//! and the subscriber card) plus the reply plumbing that carries each
//! asynchronous query result back to the reconciler, tagged with the cycle
//! it was issued under.
//!
//! The radio layer may answer from any thread and in any order.

pub mod country;
pub mod home;
pub mod parse;

use std::fmt;

use crossbeam_channel::Sender;

use crate::error::RadioError;
use crate::tracker::barrier::CycleId;

/// Power/availability of the radio, read synchronously at cycle start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioPowerState {
    Unavailable,
    Off,
    On,
}

/// Queries issued once per polling cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueryKind {
    Operator,
    VoiceRegistration,
    DataRegistration,
    NetworkSelectionMode,
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QueryKind::Operator => "operator",
            QueryKind::VoiceRegistration => "voice-registration",
            QueryKind::DataRegistration => "data-registration",
            QueryKind::NetworkSelectionMode => "network-selection-mode",
        };
        f.write_str(s)
    }
}

/// Loosely typed reply payload: an ordered list of optional string fields.
pub type RawReply = Vec<Option<String>>;

/// Build a [`RawReply`] where every field is present.
pub fn raw_reply<S: AsRef<str>>(fields: &[S]) -> RawReply {
    fields.iter().map(|f| Some(f.as_ref().to_string())).collect()
}

/// One query result travelling back to the reconciler.
#[derive(Debug, Clone)]
pub struct QueryReply {
    pub cycle: CycleId,
    pub kind: QueryKind,
    pub result: Result<RawReply, RadioError>,
}

/// Completion handle handed to the radio layer with each query.
///
/// Consumed on delivery, so each query answers at most once.
#[derive(Debug)]
pub struct ReplySink {
    cycle: CycleId,
    kind: QueryKind,
    tx: Sender<QueryReply>,
}

impl ReplySink {
    pub(crate) fn new(cycle: CycleId, kind: QueryKind, tx: Sender<QueryReply>) -> Self {
        Self { cycle, kind, tx }
    }

    pub fn cycle(&self) -> CycleId {
        self.cycle
    }

    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    pub fn deliver(self, result: Result<RawReply, RadioError>) {
        let reply = QueryReply {
            cycle: self.cycle,
            kind: self.kind,
            result,
        };
        if self.tx.send(reply).is_err() {
            tracing::debug!(cycle = %self.cycle, kind = %self.kind, "reply dropped, tracker gone");
        }
    }

    pub fn ok<S: AsRef<str>>(self, fields: &[S]) {
        self.deliver(Ok(raw_reply(fields)))
    }

    pub fn fail(self, err: RadioError) {
        self.deliver(Err(err))
    }
}

/// The radio transport that executes queries.
pub trait RadioLayer: Send + Sync {
    fn power_state(&self) -> RadioPowerState;

    /// Start `kind`; answer later through `reply`, from any thread.
    fn issue_query(&self, kind: QueryKind, reply: ReplySink);
}

/// Subscriber identity card records the tracker reads.
pub trait SubscriberCard: Send + Sync {
    /// Card application present and ready.
    fn is_ready(&self) -> bool;

    fn service_provider_name(&self) -> Option<String>;

    /// Stored display condition: show the provider name while on the home
    /// network.
    fn show_spn_in_home(&self) -> bool;

    /// Comma-separated home system ids as provisioned on the card.
    fn home_system_ids(&self) -> Option<String>;

    /// Comma-separated home network ids, parallel to the system ids.
    fn home_network_ids(&self) -> Option<String>;
}
