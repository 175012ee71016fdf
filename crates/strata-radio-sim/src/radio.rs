//! Scriptable radio layer.
//!
//! Each query kind has a scripted result. In [`ReplyMode::Immediate`] the
//! reply is sent from inside `issue_query`; in [`ReplyMode::Deferred`] the
//! completion handle is held until the test flushes it, in order, shuffled
//! or from one thread per reply.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use strata_service_state::error::RadioError;
use strata_service_state::radio::{
    QueryKind, RadioLayer, RadioPowerState, RawReply, ReplySink,
};
use strata_service_state::state::RadioTechnology;

use crate::reply::{data_reply, operator_reply, VoiceReply};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyMode {
    Immediate,
    Deferred,
}

type Script = HashMap<QueryKind, Result<RawReply, RadioError>>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Debug)]
pub struct ScriptedRadio {
    power: Mutex<RadioPowerState>,
    mode: Mutex<ReplyMode>,
    script: Mutex<Script>,
    silenced: Mutex<HashSet<QueryKind>>,
    held: Mutex<Vec<ReplySink>>,
    issued: AtomicU64,
}

impl ScriptedRadio {
    /// Powered on, out of service, answering immediately.
    pub fn new() -> Self {
        let radio = ScriptedRadio {
            power: Mutex::new(RadioPowerState::On),
            mode: Mutex::new(ReplyMode::Immediate),
            script: Mutex::new(HashMap::new()),
            silenced: Mutex::new(HashSet::new()),
            held: Mutex::new(Vec::new()),
            issued: AtomicU64::new(0),
        };
        radio.set_voice(&VoiceReply::out_of_service());
        radio.set_data(0, RadioTechnology::Unknown);
        radio.set_reply(QueryKind::Operator, operator_reply("", "", ""));
        radio.set_reply(QueryKind::NetworkSelectionMode, vec![Some("0".into())]);
        radio
    }

    pub fn deferred() -> Self {
        let radio = Self::new();
        radio.set_mode(ReplyMode::Deferred);
        radio
    }

    // ─── Script ─────────────────────────────────────────────────────────

    pub fn set_power(&self, power: RadioPowerState) {
        *lock(&self.power) = power;
    }

    pub fn set_mode(&self, mode: ReplyMode) {
        *lock(&self.mode) = mode;
    }

    pub fn set_reply(&self, kind: QueryKind, reply: RawReply) {
        lock(&self.script).insert(kind, Ok(reply));
    }

    pub fn set_failure(&self, kind: QueryKind, err: RadioError) {
        lock(&self.script).insert(kind, Err(err));
    }

    pub fn set_voice(&self, voice: &VoiceReply) {
        self.set_reply(QueryKind::VoiceRegistration, voice.fields());
    }

    pub fn set_data(&self, reg_code: i32, technology: RadioTechnology) {
        self.set_reply(QueryKind::DataRegistration, data_reply(reg_code, technology));
    }

    pub fn set_operator(&self, long: &str, short: &str, numeric: &str) {
        self.set_reply(QueryKind::Operator, operator_reply(long, short, numeric));
    }

    /// Forget the script for `kind`; its queries fail as unsupported.
    pub fn clear_reply(&self, kind: QueryKind) {
        lock(&self.script).remove(&kind);
    }

    /// Queries of `kind` are accepted but never answered.
    pub fn silence(&self, kind: QueryKind) {
        lock(&self.silenced).insert(kind);
    }

    pub fn unsilence(&self, kind: QueryKind) {
        lock(&self.silenced).remove(&kind);
    }

    /// Queries issued so far, silenced ones included.
    pub fn issued(&self) -> u64 {
        self.issued.load(Ordering::Relaxed)
    }

    // ─── Delivery ───────────────────────────────────────────────────────

    /// Answer `sink` from the current script.
    pub fn answer(&self, sink: ReplySink) {
        let result = lock(&self.script)
            .get(&sink.kind())
            .cloned()
            .unwrap_or(Err(RadioError::NotSupported));
        sink.deliver(result);
    }

    pub fn held_count(&self) -> usize {
        lock(&self.held).len()
    }

    /// Hand the held completions to the caller.
    pub fn take_held(&self) -> Vec<ReplySink> {
        std::mem::take(&mut *lock(&self.held))
    }

    /// Answer held queries in issue order.
    pub fn flush(&self) -> usize {
        let sinks = self.take_held();
        let n = sinks.len();
        for sink in sinks {
            self.answer(sink);
        }
        n
    }

    /// Answer held queries in a seeded random order.
    pub fn flush_shuffled(&self, seed: u64) -> usize {
        let mut sinks = self.take_held();
        sinks.shuffle(&mut StdRng::seed_from_u64(seed));
        let n = sinks.len();
        for sink in sinks {
            self.answer(sink);
        }
        n
    }

    /// Answer each held query from its own thread, all at once.
    pub fn flush_threaded(&self) -> usize {
        let sinks = self.take_held();
        let n = sinks.len();
        thread::scope(|s| {
            for sink in sinks {
                s.spawn(move || self.answer(sink));
            }
        });
        n
    }
}

impl Default for ScriptedRadio {
    fn default() -> Self {
        Self::new()
    }
}

impl RadioLayer for ScriptedRadio {
    fn power_state(&self) -> RadioPowerState {
        *lock(&self.power)
    }

    fn issue_query(&self, kind: QueryKind, reply: ReplySink) {
        self.issued.fetch_add(1, Ordering::Relaxed);
        if lock(&self.silenced).contains(&kind) {
            tracing::debug!(%kind, cycle = %reply.cycle(), "query silenced");
            return;
        }
        match *lock(&self.mode) {
            ReplyMode::Immediate => self.answer(reply),
            ReplyMode::Deferred => lock(&self.held).push(reply),
        }
    }
}
