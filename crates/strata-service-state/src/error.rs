use thiserror::Error;

use crate::session::{SessionId, TechnologyClass};

// ── Radio ───────────────────────────────────────────────────────────

/// Failure reported by the radio layer for a single query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RadioError {
    #[error("radio not available")]
    NotAvailable,
    #[error("request not supported by the radio")]
    NotSupported,
    #[error("radio request failed: {0}")]
    Failure(String),
}

// ── Data-session strategies ─────────────────────────────────────────

/// Building a replacement data-session strategy failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StrategyError {
    #[error("resources exhausted creating {0} strategy")]
    Exhausted(TechnologyClass),
    #[error("no strategy available for {0}")]
    Unsupported(TechnologyClass),
}

/// A data-session request rejected by the active strategy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session limit of {0} reached")]
    LimitReached(usize),
    #[error("a session for APN '{0}' is already active")]
    AlreadyActive(String),
    #[error("unknown session {0}")]
    UnknownSession(SessionId),
    #[error("strategy has been disposed")]
    Disposed,
}

// ── Configuration ───────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("unsupported config version {0}")]
    UnsupportedVersion(u32),
    #[error("max_multi_sessions must be at least 1")]
    NoSessions,
}
