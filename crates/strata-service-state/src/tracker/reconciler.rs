//! # Reconciler
//!
//! Drives one polling cycle at a time:
//!
//! ```text
//! Idle ──poll──► Polling ──barrier hits 0──► Reconciling ──commit──► Idle
//!   ▲               │ poll again: context superseded, pending scrapped
//!   └───────────────┘
//! ```
//!
//! Queries go out together; replies come back through a channel tagged with
//! the cycle they belong to and are merged into a pending cycle. When the
//! last one lands the pending results are folded into a fresh [`Snapshot`],
//! diffed against the committed one, swapped in atomically, and the
//! resulting events are fanned out. Radio off/unavailable skips the barrier
//! and commits a no-service snapshot immediately.

use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, info, warn};

use super::barrier::{Completion, CycleId, QueryBarrier};
use crate::config::ServiceStateConfig;
use crate::error::{RadioError, StrategyError};
use crate::notify::{EventKind, Notification, NotificationHub};
use crate::radio::country::{mcc_of, CountryLookup};
use crate::radio::home::HomeNetworkTable;
use crate::radio::parse::{
    parse_data_registration, parse_network_selection, parse_operator, parse_signal_strength,
    parse_voice_registration, Anomaly, DataRegistration, Parsed, VoiceRegistration,
};
use crate::radio::{
    QueryKind, QueryReply, RadioLayer, RadioPowerState, RawReply, ReplySink, SubscriberCard,
};
use crate::session::selector::{DataSessionHandle, StrategySelector, SwapOutcome};
use crate::session::StrategyFactory;
use crate::state::{
    diff, CellLocation, OperatorInfo, RadioTechnology, RegState, ServiceState, SignalStrength,
    Snapshot, Transitions, ROAMING_INDICATOR_OFF,
};

/// Where the reconciler is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    Polling,
    Reconciling,
}

/// External collaborators the reconciler consumes.
#[derive(Clone)]
pub struct Collaborators {
    pub radio: Arc<dyn RadioLayer>,
    pub card: Option<Arc<dyn SubscriberCard>>,
    pub country: Arc<dyn CountryLookup>,
    pub strategies: Arc<dyn StrategyFactory>,
}

/// Outcome of one committed cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle: CycleId,
    pub transitions: Transitions,
    pub swap: SwapOutcome,
    pub anomalies: Vec<Anomaly>,
    /// Queries that failed or never answered; their fields kept the
    /// previous values.
    pub failed_queries: Vec<QueryKind>,
    /// Observer callbacks made for this commit.
    pub delivered: usize,
}

/// Results gathered for the in-flight cycle.
#[derive(Debug)]
struct PendingCycle {
    id: CycleId,
    started: Instant,
    expected: Vec<QueryKind>,
    answered: Vec<QueryKind>,
    operator: Option<OperatorInfo>,
    voice: Option<VoiceRegistration>,
    data: Option<DataRegistration>,
    manual_selection: Option<bool>,
    failed: Vec<QueryKind>,
    anomalies: Vec<Anomaly>,
}

impl PendingCycle {
    fn new(id: CycleId, expected: Vec<QueryKind>) -> Self {
        PendingCycle {
            id,
            started: Instant::now(),
            expected,
            answered: Vec::new(),
            operator: None,
            voice: None,
            data: None,
            manual_selection: None,
            failed: Vec::new(),
            anomalies: Vec::new(),
        }
    }

    fn absorb(&mut self, kind: QueryKind, result: Result<RawReply, RadioError>) {
        self.answered.push(kind);
        let raw = match result {
            Ok(raw) => raw,
            Err(err) => {
                warn!(cycle = %self.id, %kind, error = %err, "query failed, keeping previous values");
                self.failed.push(kind);
                return;
            }
        };

        match kind {
            QueryKind::Operator => self.operator = Some(self.keep(parse_operator(&raw))),
            QueryKind::VoiceRegistration => {
                self.voice = Some(self.keep(parse_voice_registration(&raw)))
            }
            QueryKind::DataRegistration => {
                self.data = Some(self.keep(parse_data_registration(&raw)))
            }
            QueryKind::NetworkSelectionMode => {
                self.manual_selection = Some(self.keep(parse_network_selection(&raw)))
            }
        }
    }

    fn keep<T>(&mut self, parsed: Parsed<T>) -> T {
        for anomaly in &parsed.anomalies {
            warn!(cycle = %self.id, %anomaly, "malformed radio reply");
        }
        self.anomalies.extend(parsed.anomalies);
        parsed.value
    }

    /// Treat every unanswered query as failed.
    fn expire(&mut self) {
        let missing: Vec<QueryKind> = self
            .expected
            .iter()
            .filter(|k| !self.answered.contains(k))
            .copied()
            .collect();
        for kind in missing {
            warn!(cycle = %self.id, %kind, "query timed out, keeping previous values");
            self.failed.push(kind);
        }
    }
}

/// Last successfully parsed result per query, reused when a query fails.
#[derive(Debug, Default)]
struct Retained {
    operator: Option<OperatorInfo>,
    voice: Option<VoiceRegistration>,
    data: Option<DataRegistration>,
    manual_selection: bool,
}

pub struct Reconciler {
    config: ServiceStateConfig,
    radio: Arc<dyn RadioLayer>,
    card: Option<Arc<dyn SubscriberCard>>,
    country: Arc<dyn CountryLookup>,
    barrier: QueryBarrier,
    phase: CyclePhase,
    pending: Option<PendingCycle>,
    retained: Retained,
    committed: Arc<ArcSwap<Snapshot>>,
    home: Arc<HomeNetworkTable>,
    selector: StrategySelector,
    hub: Arc<NotificationHub>,
    reply_tx: Sender<QueryReply>,
    reply_rx: Receiver<QueryReply>,
    country_cache: Option<(String, String)>,
    anomaly_count: u64,
}

impl Reconciler {
    /// Fails only if the initial data-session strategy cannot be built.
    pub fn new(config: ServiceStateConfig, deps: Collaborators) -> Result<Self, StrategyError> {
        let selector = StrategySelector::new(deps.strategies, config.sessions.initial_class)?;
        let (reply_tx, reply_rx) = unbounded();
        let home = Arc::new(config.home_network.clone());
        Ok(Reconciler {
            config,
            radio: deps.radio,
            card: deps.card,
            country: deps.country,
            barrier: QueryBarrier::new(),
            phase: CyclePhase::Idle,
            pending: None,
            retained: Retained::default(),
            committed: Arc::new(ArcSwap::from_pointee(Snapshot::initial())),
            home,
            selector,
            hub: Arc::new(NotificationHub::new()),
            reply_tx,
            reply_rx,
            country_cache: None,
            anomaly_count: 0,
        })
    }

    // ─── Accessors ──────────────────────────────────────────────────────

    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    /// The committed snapshot. Never a partially updated one.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.committed.load_full()
    }

    /// Lock-free cell other threads can read the committed snapshot from.
    pub fn shared_snapshot(&self) -> Arc<ArcSwap<Snapshot>> {
        self.committed.clone()
    }

    pub fn hub(&self) -> Arc<NotificationHub> {
        self.hub.clone()
    }

    pub fn sessions(&self) -> DataSessionHandle {
        self.selector.handle()
    }

    pub fn selector(&self) -> &StrategySelector {
        &self.selector
    }

    /// Cycle currently waiting on replies.
    pub fn in_flight(&self) -> Option<CycleId> {
        self.pending.as_ref().map(|p| p.id)
    }

    /// Channel the radio replies arrive on, for callers that multiplex it.
    pub fn reply_receiver(&self) -> Receiver<QueryReply> {
        self.reply_rx.clone()
    }

    /// When the in-flight cycle should be given up on, if a timeout is set.
    pub fn deadline(&self) -> Option<Instant> {
        let timeout = self.config.polling.query_timeout?;
        self.pending.as_ref().map(|p| p.started + timeout)
    }

    pub fn anomaly_count(&self) -> u64 {
        self.anomaly_count
    }

    pub fn home_network(&self) -> Arc<HomeNetworkTable> {
        self.home.clone()
    }

    /// Whether voice and data can be used at the same time on the current
    /// data technology.
    pub fn concurrent_voice_and_data_allowed(&self) -> bool {
        let snap = self.committed.load();
        if snap.service.data_technology != RadioTechnology::OneXRtt {
            self.config.sessions.concurrent_voice_data
        } else {
            snap.service.css_indicator
        }
    }

    fn queries(&self) -> Vec<QueryKind> {
        let mut kinds = vec![
            QueryKind::Operator,
            QueryKind::VoiceRegistration,
            QueryKind::DataRegistration,
        ];
        if self.config.polling.query_network_selection {
            kinds.push(QueryKind::NetworkSelectionMode);
        }
        kinds
    }

    // ─── Cycle Driving ──────────────────────────────────────────────────

    /// Start a polling cycle. Supersedes any cycle in flight.
    ///
    /// Returns the report right away when the radio is off or unavailable;
    /// otherwise the cycle completes later in [`Reconciler::handle_reply`].
    pub fn poll_state(&mut self) -> Option<CycleReport> {
        if let Some(prev) = self.pending.take() {
            debug!(superseded = %prev.id, answered = prev.answered.len(), "scrapping in-flight cycle");
        }

        let power = self.radio.power_state();
        if power != RadioPowerState::On {
            let ctx = self.barrier.open(0);
            self.retained = Retained::default();
            self.country_cache = None;
            let service = match power {
                RadioPowerState::Off => ServiceState::radio_off(),
                _ => ServiceState::out_of_service(),
            };
            debug!(cycle = %ctx.id(), ?power, "radio not on, committing no-service snapshot");
            let snapshot = Snapshot {
                cycle: ctx.id(),
                service,
                cell: CellLocation::invalid(),
                signal: SignalStrength::no_radio(),
            };
            return Some(self.commit(snapshot, Vec::new(), Vec::new()));
        }

        let kinds = self.queries();
        let ctx = self.barrier.open(kinds.len());
        let id = ctx.id();
        self.pending = Some(PendingCycle::new(id, kinds.clone()));
        self.phase = CyclePhase::Polling;
        debug!(cycle = %id, queries = kinds.len(), "polling radio");

        for kind in kinds {
            self.radio
                .issue_query(kind, ReplySink::new(id, kind, self.reply_tx.clone()));
        }
        None
    }

    /// Merge one reply. Returns the report if it completed the cycle.
    pub fn handle_reply(&mut self, reply: QueryReply) -> Option<CycleReport> {
        if !self.barrier.is_current(reply.cycle) {
            debug!(cycle = %reply.cycle, kind = %reply.kind, "discarding stale reply");
            return None;
        }
        let pending = self.pending.as_mut().filter(|p| p.id == reply.cycle)?;
        pending.absorb(reply.kind, reply.result);

        match self.barrier.complete(reply.cycle) {
            Completion::Done => self.finish_cycle(),
            Completion::Pending(left) => {
                debug!(cycle = %reply.cycle, left, "awaiting replies");
                None
            }
            Completion::Stale => None,
        }
    }

    /// Process every reply already queued.
    pub fn drain_replies(&mut self) -> Vec<CycleReport> {
        let mut reports = Vec::new();
        while let Ok(reply) = self.reply_rx.try_recv() {
            reports.extend(self.handle_reply(reply));
        }
        reports
    }

    /// Finish the in-flight cycle with whatever has arrived; missing
    /// queries count as failed.
    pub fn expire_in_flight(&mut self) -> Option<CycleReport> {
        let pending = self.pending.as_mut()?;
        pending.expire();
        self.barrier.close();
        self.finish_cycle()
    }

    /// Card records became available: reload the home network table from
    /// the card and poll again so roaming/display rules use it.
    pub fn on_card_records_loaded(&mut self) -> Option<CycleReport> {
        if let Some(card) = &self.card {
            match (card.home_system_ids(), card.home_network_ids()) {
                (Some(sids), Some(nids)) => {
                    let table = HomeNetworkTable::parse(&sids, &nids);
                    info!(entries = table.len(), "home network table loaded from card");
                    self.home = Arc::new(table);
                }
                _ => debug!("card has no home network lists, keeping current table"),
            }
        }
        self.poll_state()
    }

    /// Publish a new signal report. Returns whether it changed.
    pub fn on_signal_strength(&mut self, raw: &RawReply) -> bool {
        let current = self.committed.load_full();
        let signal = if self.radio.power_state() == RadioPowerState::On {
            let lte = current.service.data_technology == RadioTechnology::Lte;
            let parsed = parse_signal_strength(raw, lte);
            for anomaly in &parsed.anomalies {
                warn!(%anomaly, "malformed signal report");
            }
            self.anomaly_count += parsed.anomalies.len() as u64;
            parsed.value
        } else {
            SignalStrength::no_radio()
        };

        if current.signal == signal {
            return false;
        }
        let next = Arc::new(current.with_signal(signal));
        self.committed.store(next.clone());
        self.hub.notify(&Notification {
            kind: EventKind::SignalStrengthChanged,
            cycle: next.cycle,
            snapshot: next,
        });
        true
    }

    // ─── Reconciliation ─────────────────────────────────────────────────

    fn finish_cycle(&mut self) -> Option<CycleReport> {
        let mut pending = self.pending.take()?;
        self.phase = CyclePhase::Reconciling;

        let voice = pending.voice.take().or_else(|| self.retained.voice.clone());
        let data = pending.data.or(self.retained.data);
        let operator = pending
            .operator
            .take()
            .or_else(|| self.retained.operator.clone());
        let manual_selection = pending
            .manual_selection
            .unwrap_or(self.retained.manual_selection);

        let mut service = ServiceState::out_of_service();
        if let Some(v) = &voice {
            service.state = v.state;
            service.technology = v.technology;
            service.roaming = v.roaming;
            service.system_id = v.system_id;
            service.network_id = v.network_id;
            service.roaming_indicator = v.roaming_indicator;
            service.css_indicator = v.css_indicator;
        }
        if let Some(d) = &data {
            service.data_state = d.state;
            service.data_technology = d.technology;
            // data-side roaming wins when set
            if d.roaming {
                service.roaming = true;
            }
        }
        if service.state == RegState::OutOfService && self.config.polling.data_only {
            debug!(cycle = %pending.id, data = %service.data_state, "data-only mode, using data state");
            service.state = service.data_state;
        }

        service.operator = operator.clone().unwrap_or_default();
        service.manual_selection = manual_selection;
        service.country_iso = self.country_for(service.operator.numeric.as_deref());
        self.apply_home_override(&mut service);

        let cell = voice
            .as_ref()
            .map(|v| v.cell)
            .unwrap_or_else(CellLocation::invalid);

        self.retained = Retained {
            operator,
            voice,
            data,
            manual_selection,
        };

        let snapshot = Snapshot {
            cycle: pending.id,
            service,
            cell,
            signal: self.committed.load().signal,
        };
        Some(self.commit(snapshot, pending.anomalies, pending.failed))
    }

    fn country_for(&mut self, numeric: Option<&str>) -> String {
        let Some(numeric) = numeric else {
            return String::new();
        };
        if mcc_of(numeric).is_none() {
            warn!(numeric, "operator numeric has no valid country code");
            return String::new();
        }
        if let Some((cached, iso)) = &self.country_cache {
            if cached == numeric {
                return iso.clone();
            }
        }
        let iso = self.country.country_for_operator(numeric);
        self.country_cache = Some((numeric.to_string(), iso.clone()));
        iso
    }

    /// On the home network with the roaming indicator off, show the
    /// provider name stored on the card.
    fn apply_home_override(&self, service: &mut ServiceState) {
        let Some(card) = &self.card else {
            return;
        };
        if !card.is_ready() || !card.show_spn_in_home() {
            return;
        }
        if service.roaming_indicator != Some(ROAMING_INDICATOR_OFF) {
            return;
        }
        if !self.home.contains(service.system_id, service.network_id) {
            return;
        }
        if let Some(spn) = card.service_provider_name() {
            debug!(spn = %spn, sid = service.system_id, nid = service.network_id, "home network, using card provider name");
            service.operator.alpha_long = Some(spn);
        }
    }

    fn commit(
        &mut self,
        next: Snapshot,
        anomalies: Vec<Anomaly>,
        failed_queries: Vec<QueryKind>,
    ) -> CycleReport {
        self.phase = CyclePhase::Reconciling;
        let cycle = next.cycle;
        let old = self.committed.load_full();
        let transitions = diff(&old, &next);

        if old.service.state != next.service.state
            || old.service.data_state != next.service.data_state
        {
            info!(
                %cycle,
                old_voice = %old.service.state,
                old_data = %old.service.data_state,
                new_voice = %next.service.state,
                new_data = %next.service.data_state,
                "service state change"
            );
        }
        debug!(%cycle, ?transitions, "committing snapshot");

        let next = Arc::new(next);
        self.committed.store(next.clone());
        drop(old);

        let swap = self
            .selector
            .on_transitions(&transitions, next.service.data_technology);

        let mut delivered = 0;
        let mut kinds = transitions.fired();
        if matches!(swap, SwapOutcome::Failed { .. }) {
            kinds.push(EventKind::StrategySwapFailed);
        }
        for kind in kinds {
            delivered += self.hub.notify(&Notification {
                kind,
                cycle,
                snapshot: next.clone(),
            });
        }

        self.anomaly_count += anomalies.len() as u64;
        self.phase = CyclePhase::Idle;
        CycleReport {
            cycle,
            transitions,
            swap,
            anomalies,
            failed_queries,
            delivered,
        }
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("phase", &self.phase)
            .field("in_flight", &self.in_flight())
            .field("committed", &self.committed.load().cycle)
            .field("selector", &self.selector)
            .finish()
    }
}
