//! # Data-Session Strategies
//!
//! How data sessions are tracked depends on the technology class: legacy
//! CDMA air interfaces carry one session, LTE/eHRPD carry one per APN. Both
//! trackers sit behind [`DataSessionStrategy`]; which one is active is
//! decided by [`TechnologyClass::of`] and swapped by the
//! [`selector::StrategySelector`], never by inspecting concrete types.

pub mod selector;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::SessionConfig;
use crate::error::{SessionError, StrategyError};
use crate::state::RadioTechnology;

/// Capability class of a radio technology for data sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TechnologyClass {
    Single,
    Multi,
}

impl TechnologyClass {
    /// Class a technology demands, or `None` when it does not force either.
    pub fn of(tech: RadioTechnology) -> Option<TechnologyClass> {
        if tech.supports_multi_session() {
            Some(TechnologyClass::Multi)
        } else if tech.is_legacy_single_session() {
            Some(TechnologyClass::Single)
        } else {
            None
        }
    }
}

impl fmt::Display for TechnologyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TechnologyClass::Single => write!(f, "single-session"),
            TechnologyClass::Multi => write!(f, "multi-session"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u32);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSession {
    pub id: SessionId,
    pub apn: String,
}

/// Capability interface shared by every tracker variant.
pub trait DataSessionStrategy: Send {
    fn class(&self) -> TechnologyClass;

    fn open_session(&mut self, apn: &str) -> Result<SessionId, SessionError>;

    fn close_session(&mut self, id: SessionId) -> Result<(), SessionError>;

    fn sessions(&self) -> Vec<DataSession>;

    /// Tear down every session and refuse further requests.
    fn dispose(&mut self);

    fn is_disposed(&self) -> bool;
}

/// Builds and releases strategies for the selector.
pub trait StrategyFactory: Send + Sync {
    fn create_for(
        &self,
        class: TechnologyClass,
    ) -> Result<Box<dyn DataSessionStrategy>, StrategyError>;

    fn dispose(&self, mut strategy: Box<dyn DataSessionStrategy>) {
        strategy.dispose();
    }
}

// ─── Session Table ──────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct SessionTable {
    next_id: u32,
    open: BTreeMap<SessionId, String>,
    disposed: bool,
}

impl SessionTable {
    fn insert(&mut self, apn: &str) -> SessionId {
        self.next_id += 1;
        let id = SessionId(self.next_id);
        self.open.insert(id, apn.to_string());
        id
    }

    fn remove(&mut self, id: SessionId) -> Result<(), SessionError> {
        if self.disposed {
            return Err(SessionError::Disposed);
        }
        self.open
            .remove(&id)
            .map(|_| ())
            .ok_or(SessionError::UnknownSession(id))
    }

    fn list(&self) -> Vec<DataSession> {
        self.open
            .iter()
            .map(|(id, apn)| DataSession {
                id: *id,
                apn: apn.clone(),
            })
            .collect()
    }

    fn dispose(&mut self) {
        for (id, apn) in std::mem::take(&mut self.open) {
            tracing::debug!(%id, apn = %apn, "closing data session on dispose");
        }
        self.disposed = true;
    }
}

// ─── Single-Session Tracker ─────────────────────────────────────────────────

/// Legacy tracker: one data session, the requested APN is only recorded.
#[derive(Debug, Default)]
pub struct SingleSessionTracker {
    table: SessionTable,
}

impl SingleSessionTracker {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DataSessionStrategy for SingleSessionTracker {
    fn class(&self) -> TechnologyClass {
        TechnologyClass::Single
    }

    fn open_session(&mut self, apn: &str) -> Result<SessionId, SessionError> {
        if self.table.disposed {
            return Err(SessionError::Disposed);
        }
        if !self.table.open.is_empty() {
            return Err(SessionError::LimitReached(1));
        }
        Ok(self.table.insert(apn))
    }

    fn close_session(&mut self, id: SessionId) -> Result<(), SessionError> {
        self.table.remove(id)
    }

    fn sessions(&self) -> Vec<DataSession> {
        self.table.list()
    }

    fn dispose(&mut self) {
        self.table.dispose();
    }

    fn is_disposed(&self) -> bool {
        self.table.disposed
    }
}

// ─── Multi-Session Tracker ──────────────────────────────────────────────────

/// One session per APN, up to `max_sessions`.
#[derive(Debug)]
pub struct MultiSessionTracker {
    table: SessionTable,
    max_sessions: usize,
}

impl MultiSessionTracker {
    pub fn new(max_sessions: usize) -> Self {
        MultiSessionTracker {
            table: SessionTable::default(),
            max_sessions: max_sessions.max(1),
        }
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }
}

impl DataSessionStrategy for MultiSessionTracker {
    fn class(&self) -> TechnologyClass {
        TechnologyClass::Multi
    }

    fn open_session(&mut self, apn: &str) -> Result<SessionId, SessionError> {
        if self.table.disposed {
            return Err(SessionError::Disposed);
        }
        if self.table.open.values().any(|a| a == apn) {
            return Err(SessionError::AlreadyActive(apn.to_string()));
        }
        if self.table.open.len() >= self.max_sessions {
            return Err(SessionError::LimitReached(self.max_sessions));
        }
        Ok(self.table.insert(apn))
    }

    fn close_session(&mut self, id: SessionId) -> Result<(), SessionError> {
        self.table.remove(id)
    }

    fn sessions(&self) -> Vec<DataSession> {
        self.table.list()
    }

    fn dispose(&mut self) {
        self.table.dispose();
    }

    fn is_disposed(&self) -> bool {
        self.table.disposed
    }
}

// ─── Default Factory ────────────────────────────────────────────────────────

/// Factory for the two built-in trackers.
#[derive(Debug, Clone, Copy)]
pub struct TrackerFactory {
    pub max_multi_sessions: usize,
}

impl TrackerFactory {
    /// Factory honouring the configured multi-session limit.
    pub fn from_config(config: &SessionConfig) -> Self {
        TrackerFactory {
            max_multi_sessions: config.max_multi_sessions,
        }
    }
}

impl Default for TrackerFactory {
    fn default() -> Self {
        TrackerFactory::from_config(&SessionConfig::default())
    }
}

impl StrategyFactory for TrackerFactory {
    fn create_for(
        &self,
        class: TechnologyClass,
    ) -> Result<Box<dyn DataSessionStrategy>, StrategyError> {
        let strategy: Box<dyn DataSessionStrategy> = match class {
            TechnologyClass::Single => Box::new(SingleSessionTracker::new()),
            TechnologyClass::Multi => Box::new(MultiSessionTracker::new(self.max_multi_sessions)),
        };
        Ok(strategy)
    }
}
