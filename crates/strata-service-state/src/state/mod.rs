//! # Service State
//!
//! Immutable snapshot types and the pure diff that turns two snapshots into
//! transition flags.

pub mod diff;
pub mod snapshot;

pub use diff::{diff, Transitions};
pub use snapshot::{
    CellLocation, OperatorInfo, RadioTechnology, RegState, ServiceState, SignalStrength, Snapshot,
    ROAMING_INDICATOR_OFF,
};
