//! Polling-cycle machinery: the query barrier and the reconciler that
//! drives cycles through it.

pub mod barrier;
pub mod reconciler;

pub use barrier::{Completion, CycleId, PollingContext, QueryBarrier};
pub use reconciler::{Collaborators, CycleReport, CyclePhase, Reconciler};
