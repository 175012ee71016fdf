//! # strata-service-state
//!
//! Cellular service-state tracker for hybrid CDMA/LTE modems.
//!
//! Each polling cycle fires the operator and registration queries at the
//! radio concurrently, waits for all of them behind a query barrier, folds
//! the replies into one immutable snapshot, diffs it against the previous
//! one and fans the resulting transitions out to observers. When the data
//! technology crosses the multi-session boundary the active data-session
//! strategy is swapped.
//!
//! ## Crate structure
//!
//! - [`state`] — Snapshot model and the pure snapshot diff
//! - [`radio`] — Radio/card boundary traits, reply parsers, home network table
//! - [`tracker`] — Query barrier and the reconciler state machine
//! - [`session`] — Single/multi-session trackers and the strategy selector
//! - [`notify`] — Per-event observer registry
//! - [`config`] — TOML configuration
//! - [`runtime`] — Worker-thread wrapper around the reconciler

pub mod config;
pub mod error;
pub mod notify;
pub mod radio;
pub mod runtime;
pub mod session;
pub mod state;
pub mod tracker;

pub use config::ServiceStateConfig;
pub use error::{ConfigError, RadioError, SessionError, StrategyError};
pub use notify::{EventKind, Notification, NotificationHub, Observer};
pub use runtime::ServiceStateRuntime;
pub use state::{Snapshot, Transitions};
pub use tracker::{Collaborators, CycleId, CycleReport, Reconciler};
