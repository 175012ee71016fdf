//! # Strategy Selector
//!
//! Keeps exactly one data-session strategy installed and replaces it when
//! the data technology crosses the multi-session capability boundary.
//!
//! The replacement is built before the old strategy is touched and swapped
//! in under the slot lock, so a session request always finds a strategy.
//! If building fails the old one stays active and the swap is retried on
//! the next cycle whose data technology still calls for it.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use super::{DataSession, DataSessionStrategy, SessionId, StrategyFactory, TechnologyClass};
use crate::error::{SessionError, StrategyError};
use crate::state::{RadioTechnology, Transitions};

type StrategySlot = Arc<Mutex<Box<dyn DataSessionStrategy>>>;

fn lock(slot: &StrategySlot) -> MutexGuard<'_, Box<dyn DataSessionStrategy>> {
    slot.lock().unwrap_or_else(|e| e.into_inner())
}

/// What a selection pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapOutcome {
    Unchanged,
    Replaced {
        from: TechnologyClass,
        to: TechnologyClass,
    },
    Failed {
        target: TechnologyClass,
        error: StrategyError,
    },
}

/// Shared access to whichever strategy is active, for session requests
/// coming from outside the tracker.
#[derive(Clone)]
pub struct DataSessionHandle {
    slot: StrategySlot,
}

impl DataSessionHandle {
    pub fn class(&self) -> TechnologyClass {
        lock(&self.slot).class()
    }

    pub fn open_session(&self, apn: &str) -> Result<SessionId, SessionError> {
        lock(&self.slot).open_session(apn)
    }

    pub fn close_session(&self, id: SessionId) -> Result<(), SessionError> {
        lock(&self.slot).close_session(id)
    }

    pub fn sessions(&self) -> Vec<DataSession> {
        lock(&self.slot).sessions()
    }
}

pub struct StrategySelector {
    factory: Arc<dyn StrategyFactory>,
    slot: StrategySlot,
    retry: Option<TechnologyClass>,
    replacements: u64,
}

impl StrategySelector {
    /// Install the strategy for `initial`.
    pub fn new(
        factory: Arc<dyn StrategyFactory>,
        initial: TechnologyClass,
    ) -> Result<Self, StrategyError> {
        let strategy = factory.create_for(initial)?;
        Ok(StrategySelector {
            factory,
            slot: Arc::new(Mutex::new(strategy)),
            retry: None,
            replacements: 0,
        })
    }

    pub fn active_class(&self) -> TechnologyClass {
        lock(&self.slot).class()
    }

    pub fn handle(&self) -> DataSessionHandle {
        DataSessionHandle {
            slot: self.slot.clone(),
        }
    }

    /// Successful replacements since construction.
    pub fn replacements(&self) -> u64 {
        self.replacements
    }

    /// Class of a swap that failed and will be retried.
    pub fn pending_retry(&self) -> Option<TechnologyClass> {
        self.retry
    }

    /// React to a commit's capability edges. `data_technology` is the newly
    /// committed data technology, used to decide whether a failed swap is
    /// still wanted.
    pub fn on_transitions(
        &mut self,
        transitions: &Transitions,
        data_technology: RadioTechnology,
    ) -> SwapOutcome {
        let flagged = if transitions.gained_multi_session {
            Some(TechnologyClass::Multi)
        } else if transitions.lost_multi_session {
            Some(TechnologyClass::Single)
        } else {
            None
        };

        let target = flagged.or_else(|| match self.retry {
            Some(class) if TechnologyClass::of(data_technology) == Some(class) => Some(class),
            Some(class) => {
                debug!(%class, tech = %data_technology, "dropping strategy retry, technology moved on");
                self.retry = None;
                None
            }
            None => None,
        });

        match target {
            Some(target) => self.select(target),
            None => SwapOutcome::Unchanged,
        }
    }

    /// Make `target` the active class. No-op when it already is.
    pub fn select(&mut self, target: TechnologyClass) -> SwapOutcome {
        let current = self.active_class();
        if current == target {
            self.retry = None;
            return SwapOutcome::Unchanged;
        }

        match self.factory.create_for(target) {
            Ok(next) => {
                let old = std::mem::replace(&mut *lock(&self.slot), next);
                self.factory.dispose(old);
                self.retry = None;
                self.replacements += 1;
                info!(from = %current, to = %target, "data session strategy replaced");
                SwapOutcome::Replaced {
                    from: current,
                    to: target,
                }
            }
            Err(error) => {
                warn!(%target, %error, "data session strategy swap failed, keeping {}", current);
                self.retry = Some(target);
                SwapOutcome::Failed { target, error }
            }
        }
    }
}

impl std::fmt::Debug for StrategySelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategySelector")
            .field("active", &self.active_class())
            .field("retry", &self.retry)
            .field("replacements", &self.replacements)
            .finish()
    }
}
