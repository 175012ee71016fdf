//! Behavioural tests for the reconciler driven by the scripted radio.
//!
//! Each test runs real polling cycles: queries go out through the
//! [`ScriptedRadio`], replies come back through the reconciler's channel,
//! and assertions are made against the committed snapshot, the cycle
//! report and the notifications an observer received.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use strata_radio_sim::{operator_reply, RecordingObserver, ScriptedRadio, StaticCard, VoiceReply};
use strata_service_state::config::ServiceStateConfig;
use strata_service_state::error::{RadioError, StrategyError};
use strata_service_state::radio::country::MccTable;
use strata_service_state::radio::{QueryKind, RadioPowerState, SubscriberCard};
use strata_service_state::session::selector::SwapOutcome;
use strata_service_state::session::{
    DataSessionStrategy, StrategyFactory, TechnologyClass, TrackerFactory,
};
use strata_service_state::state::{CellLocation, RadioTechnology, RegState};
use strata_service_state::tracker::{Collaborators, CycleReport, Reconciler};
use strata_service_state::EventKind;

// ─── Harness ─────────────────────────────────────────────────────────────────

struct Harness {
    radio: Arc<ScriptedRadio>,
    rec: Reconciler,
    events: Arc<RecordingObserver>,
}

fn harness_with(
    config: ServiceStateConfig,
    card: Option<Arc<dyn SubscriberCard>>,
    strategies: Arc<dyn StrategyFactory>,
) -> Harness {
    let radio = Arc::new(ScriptedRadio::deferred());
    radio.set_operator("Carrier", "CAR", "310120");
    let rec = Reconciler::new(
        config,
        Collaborators {
            radio: radio.clone(),
            card,
            country: Arc::new(MccTable),
            strategies,
        },
    )
    .unwrap();
    let events = RecordingObserver::new();
    RecordingObserver::attach(&events, &rec.hub());
    Harness { radio, rec, events }
}

fn harness() -> Harness {
    harness_with(
        ServiceStateConfig::default(),
        None,
        Arc::new(TrackerFactory::default()),
    )
}

impl Harness {
    fn script(&self, voice: VoiceReply, data_code: i32, data_tech: RadioTechnology) {
        self.radio.set_voice(&voice);
        self.radio.set_data(data_code, data_tech);
    }

    /// Run one full cycle with the current script.
    fn cycle(&mut self) -> CycleReport {
        if let Some(report) = self.rec.poll_state() {
            return report;
        }
        self.radio.flush();
        let mut reports = self.rec.drain_replies();
        assert_eq!(reports.len(), 1, "cycle did not complete");
        reports.remove(0)
    }
}

// ─── Stale Replies ───────────────────────────────────────────────────────────

#[test]
fn replies_for_superseded_cycle_are_discarded() {
    let mut h = harness();

    // Cycle A would report roaming on LTE.
    h.script(VoiceReply::roaming(RadioTechnology::OneXRtt), 5, RadioTechnology::Lte);
    assert!(h.rec.poll_state().is_none());
    let cycle_a = h.radio.take_held();
    assert_eq!(cycle_a.len(), 3);

    // Cycle B starts before A's replies land.
    h.script(VoiceReply::home(RadioTechnology::OneXRtt), 1, RadioTechnology::OneXRtt);
    assert!(h.rec.poll_state().is_none());
    let cycle_b = h.radio.take_held();

    // Answer A from a stale script: none of it may stick.
    let stale_voice = VoiceReply::roaming(RadioTechnology::OneXRtt).fields();
    for sink in cycle_a {
        match sink.kind() {
            QueryKind::VoiceRegistration => sink.deliver(Ok(stale_voice.clone())),
            _ => h.radio.answer(sink),
        }
    }
    assert!(h.rec.drain_replies().is_empty());
    assert!(h.events.events().is_empty());

    for sink in cycle_b {
        h.radio.answer(sink);
    }
    let reports = h.rec.drain_replies();
    assert_eq!(reports.len(), 1);

    let snap = h.rec.snapshot();
    assert_eq!(snap.cycle, reports[0].cycle);
    assert!(!snap.service.roaming);
    assert_eq!(snap.service.data_technology, RadioTechnology::OneXRtt);
    assert_eq!(h.events.count(EventKind::RoamingOn), 0);
}

#[test]
fn late_reply_after_commit_is_ignored() {
    let mut h = harness();
    h.script(VoiceReply::home(RadioTechnology::OneXRtt), 1, RadioTechnology::EvdoA);
    h.rec.poll_state();
    let sinks = h.radio.take_held();
    let mut sinks = sinks.into_iter();
    let first = sinks.next().unwrap();
    for sink in sinks {
        h.radio.answer(sink);
    }
    assert!(h.rec.drain_replies().is_empty());

    // A new cycle supersedes; the leftover answer arrives afterwards.
    h.rec.poll_state();
    h.radio.answer(first);
    assert!(h.rec.drain_replies().is_empty());
    assert_eq!(h.rec.in_flight().map(|c| c.get()), Some(2));
}

// ─── Reply Ordering ──────────────────────────────────────────────────────────

#[test]
fn reply_order_does_not_change_the_committed_snapshot() {
    let mut reference = harness();
    reference.script(VoiceReply::roaming(RadioTechnology::OneXRtt), 1, RadioTechnology::Ehrpd);
    reference.cycle();
    let expected = reference.rec.snapshot();

    for seed in 0..16 {
        let mut h = harness();
        h.script(VoiceReply::roaming(RadioTechnology::OneXRtt), 1, RadioTechnology::Ehrpd);
        h.rec.poll_state();
        h.radio.flush_shuffled(seed);
        assert_eq!(h.rec.drain_replies().len(), 1, "seed {}", seed);
        assert_eq!(h.rec.snapshot().service, expected.service, "seed {}", seed);
        assert_eq!(h.rec.snapshot().cell, expected.cell, "seed {}", seed);
    }
}

#[test]
fn replies_from_concurrent_threads_complete_once() {
    let mut h = harness();
    h.script(VoiceReply::home(RadioTechnology::OneXRtt), 1, RadioTechnology::Lte);
    h.rec.poll_state();
    assert_eq!(h.radio.flush_threaded(), 3);

    let reports = h.rec.drain_replies();
    assert_eq!(reports.len(), 1);
    assert_eq!(h.rec.snapshot().service.data_technology, RadioTechnology::Lte);
    assert_eq!(h.events.count(EventKind::Registered), 1);
}

// ─── Degenerate Radio States ─────────────────────────────────────────────────

#[test]
fn radio_off_after_service_without_location_only_deregisters() {
    let mut h = harness();
    h.script(
        VoiceReply::home(RadioTechnology::Unknown).without_location(),
        0,
        RadioTechnology::Unknown,
    );
    h.cycle();
    let before = h.rec.snapshot();
    assert_eq!(before.service.state, RegState::InService);
    assert_eq!(before.cell, CellLocation::invalid());

    h.radio.set_power(RadioPowerState::Off);
    let report = h.rec.poll_state().expect("radio off commits synchronously");
    assert_eq!(h.radio.held_count(), 0);
    assert_eq!(report.transitions.edges(), vec![EventKind::Deregistered]);
    assert_eq!(h.rec.snapshot().service.state, RegState::RadioOff);
    assert_eq!(h.events.kinds_for(report.cycle).first(), Some(&EventKind::Deregistered));
}

#[test]
fn radio_off_scraps_cycle_in_flight() {
    let mut h = harness();
    h.script(VoiceReply::home(RadioTechnology::OneXRtt), 1, RadioTechnology::Lte);
    h.rec.poll_state();
    let pending = h.radio.take_held();

    h.radio.set_power(RadioPowerState::Unavailable);
    assert!(h.rec.poll_state().is_some());
    for sink in pending {
        h.radio.answer(sink);
    }
    assert!(h.rec.drain_replies().is_empty());
    assert_eq!(h.rec.snapshot().service.state, RegState::OutOfService);
}

// ─── Idempotent Commit ───────────────────────────────────────────────────────

#[test]
fn identical_cycles_notify_nothing() {
    let mut h = harness();
    h.script(VoiceReply::roaming(RadioTechnology::OneXRtt), 5, RadioTechnology::EvdoA);

    let first = h.cycle();
    assert!(!first.transitions.is_empty());
    h.events.clear();

    for _ in 0..3 {
        let report = h.cycle();
        assert!(report.transitions.is_empty(), "{:?}", report.transitions);
        assert_eq!(report.delivered, 0);
    }
    assert!(h.events.events().is_empty());
}

// ─── Home Network ────────────────────────────────────────────────────────────

fn home_name(sid: i32, nid: i32) -> Option<String> {
    let card: Arc<dyn SubscriberCard> = Arc::new(StaticCard::new("HomeCo", "100", "0"));
    let mut h = harness_with(
        ServiceStateConfig::default(),
        Some(card),
        Arc::new(TrackerFactory::default()),
    );
    h.script(
        VoiceReply::home(RadioTechnology::OneXRtt).with_system(sid, nid),
        1,
        RadioTechnology::OneXRtt,
    );
    assert!(h.rec.on_card_records_loaded().is_none());
    h.radio.flush();
    assert_eq!(h.rec.drain_replies().len(), 1);
    h.rec.snapshot().service.operator.alpha_long.clone()
}

#[test]
fn home_network_match_uses_card_name() {
    assert_eq!(home_name(100, 0).as_deref(), Some("HomeCo"));
    assert_eq!(home_name(100, 42).as_deref(), Some("HomeCo"));
    assert_eq!(home_name(200, 0).as_deref(), Some("Carrier"));
}

#[test]
fn roaming_indicator_on_keeps_network_name() {
    let card: Arc<dyn SubscriberCard> = Arc::new(StaticCard::new("HomeCo", "100", "0"));
    let mut h = harness_with(
        ServiceStateConfig::default(),
        Some(card),
        Arc::new(TrackerFactory::default()),
    );
    h.rec.on_card_records_loaded();
    h.radio.flush();
    h.rec.drain_replies();

    h.script(
        VoiceReply::roaming(RadioTechnology::OneXRtt).with_system(100, 0),
        5,
        RadioTechnology::OneXRtt,
    );
    h.cycle();
    assert_eq!(
        h.rec.snapshot().service.operator.alpha_long.as_deref(),
        Some("Carrier")
    );
}

// ─── Strategy Swap ───────────────────────────────────────────────────────────

#[test]
fn technology_sequence_swaps_strategy_exactly_once() {
    let mut config = ServiceStateConfig::default();
    config.sessions.initial_class = TechnologyClass::Multi;
    let mut h = harness_with(config, None, Arc::new(TrackerFactory::default()));

    let mut outcomes = Vec::new();
    for tech in [
        RadioTechnology::Lte,
        RadioTechnology::Lte,
        RadioTechnology::OneXRtt,
        RadioTechnology::OneXRtt,
    ] {
        h.script(VoiceReply::home(RadioTechnology::OneXRtt), 1, tech);
        outcomes.push(h.cycle().swap);
    }

    assert_eq!(
        outcomes,
        vec![
            SwapOutcome::Unchanged,
            SwapOutcome::Unchanged,
            SwapOutcome::Replaced {
                from: TechnologyClass::Multi,
                to: TechnologyClass::Single
            },
            SwapOutcome::Unchanged,
        ]
    );
    assert_eq!(h.rec.selector().replacements(), 1);
    assert_eq!(h.rec.sessions().class(), TechnologyClass::Single);
    assert_eq!(h.events.count(EventKind::LostMultiSession), 1);
}

#[test]
fn linked_handoff_keeps_multi_session_strategy() {
    let mut h = harness();
    h.script(VoiceReply::home(RadioTechnology::OneXRtt), 1, RadioTechnology::Lte);
    h.cycle();
    let sessions = h.rec.sessions();
    sessions.open_session("internet").unwrap();

    h.script(VoiceReply::home(RadioTechnology::OneXRtt), 1, RadioTechnology::Ehrpd);
    let report = h.cycle();
    assert!(report.transitions.linked_handoff);
    assert_eq!(report.swap, SwapOutcome::Unchanged);
    assert_eq!(sessions.sessions().len(), 1);
    assert_eq!(h.events.count(EventKind::LinkedHandoff), 1);
}

/// Fails the next `failures` builds.
#[derive(Default)]
struct FlakyFactory {
    failures: AtomicUsize,
    built: AtomicUsize,
}

impl StrategyFactory for FlakyFactory {
    fn create_for(
        &self,
        class: TechnologyClass,
    ) -> Result<Box<dyn DataSessionStrategy>, StrategyError> {
        let left = self.failures.load(Ordering::SeqCst);
        if left > 0 {
            self.failures.store(left - 1, Ordering::SeqCst);
            return Err(StrategyError::Exhausted(class));
        }
        self.built.fetch_add(1, Ordering::SeqCst);
        TrackerFactory::default().create_for(class)
    }
}

#[test]
fn failed_swap_is_reported_and_retried() {
    let factory = Arc::new(FlakyFactory::default());
    let mut h = harness_with(ServiceStateConfig::default(), None, factory.clone());
    factory.failures.store(1, Ordering::SeqCst);

    h.script(VoiceReply::home(RadioTechnology::OneXRtt), 1, RadioTechnology::Lte);
    let report = h.cycle();
    assert!(matches!(report.swap, SwapOutcome::Failed { target: TechnologyClass::Multi, .. }));
    assert_eq!(h.rec.sessions().class(), TechnologyClass::Single);
    assert_eq!(h.events.count(EventKind::StrategySwapFailed), 1);

    // Same conditions again: no edges, but the swap goes through.
    let report = h.cycle();
    assert!(report.transitions.is_empty());
    assert!(matches!(report.swap, SwapOutcome::Replaced { .. }));
    assert_eq!(h.rec.sessions().class(), TechnologyClass::Multi);
}

// ─── Failures and Timeouts ───────────────────────────────────────────────────

#[test]
fn failed_query_keeps_previous_fields() {
    let mut h = harness();
    h.script(VoiceReply::home(RadioTechnology::OneXRtt), 1, RadioTechnology::EvdoA);
    h.cycle();

    h.radio.set_failure(QueryKind::Operator, RadioError::Failure("generic".into()));
    h.radio.set_failure(QueryKind::DataRegistration, RadioError::NotAvailable);
    h.radio.set_voice(&VoiceReply::roaming(RadioTechnology::OneXRtt));
    let report = h.cycle();

    assert_eq!(
        report.failed_queries,
        vec![QueryKind::Operator, QueryKind::DataRegistration]
    );
    let snap = h.rec.snapshot();
    assert!(snap.service.roaming);
    assert_eq!(snap.service.operator.numeric.as_deref(), Some("310120"));
    assert_eq!(snap.service.data_technology, RadioTechnology::EvdoA);
    assert_eq!(snap.service.data_state, RegState::InService);
}

#[test]
fn timeout_commits_with_replies_received() {
    let mut config = ServiceStateConfig::default();
    config.polling.query_timeout = Some(std::time::Duration::from_millis(50));
    let mut h = harness_with(config, None, Arc::new(TrackerFactory::default()));
    h.script(VoiceReply::home(RadioTechnology::OneXRtt), 1, RadioTechnology::OneXRtt);
    h.radio.silence(QueryKind::Operator);

    h.rec.poll_state();
    h.radio.flush();
    assert!(h.rec.drain_replies().is_empty());
    assert!(h.rec.deadline().is_some());

    let report = h.rec.expire_in_flight().unwrap();
    assert_eq!(report.failed_queries, vec![QueryKind::Operator]);
    let snap = h.rec.snapshot();
    assert_eq!(snap.service.state, RegState::InService);
    assert_eq!(snap.service.operator.numeric, None);
    assert!(h.rec.expire_in_flight().is_none());
}

#[test]
fn malformed_replies_degrade_instead_of_failing() {
    let mut h = harness();
    h.radio.set_reply(
        QueryKind::VoiceRegistration,
        vec![Some("1".into()), None, None, Some("fourteen".into())],
    );
    h.radio.set_reply(QueryKind::Operator, operator_reply("Carrier", "", "31"));
    h.radio.set_data(1, RadioTechnology::Lte);

    let report = h.cycle();
    assert!(report.anomalies.len() >= 2);
    let snap = h.rec.snapshot();
    assert_eq!(snap.service.state, RegState::InService);
    assert_eq!(snap.service.technology, RadioTechnology::Unknown);
    assert_eq!(snap.service.country_iso, "");
}

// ─── Data-Only Mode ──────────────────────────────────────────────────────────

#[test]
fn data_only_device_reports_data_registration() {
    let mut config = ServiceStateConfig::default();
    config.polling.data_only = true;
    let mut h = harness_with(config, None, Arc::new(TrackerFactory::default()));
    h.script(VoiceReply::out_of_service(), 1, RadioTechnology::Lte);

    let report = h.cycle();
    assert!(report.transitions.registered);
    assert_eq!(h.rec.snapshot().service.state, RegState::InService);
}

#[test]
fn network_selection_mode_is_polled_when_enabled() {
    let mut config = ServiceStateConfig::default();
    config.polling.query_network_selection = true;
    let mut h = harness_with(config, None, Arc::new(TrackerFactory::default()));
    h.radio.set_reply(QueryKind::NetworkSelectionMode, vec![Some("1".into())]);

    h.rec.poll_state();
    assert_eq!(h.radio.held_count(), 4);
    h.radio.flush();
    h.rec.drain_replies();
    assert!(h.rec.snapshot().service.manual_selection);
}

// ─── Snapshot Publication ────────────────────────────────────────────────────

#[test]
fn readers_never_see_a_mixed_snapshot() {
    let mut h = harness();
    let shared = h.rec.shared_snapshot();
    let stop = Arc::new(AtomicBool::new(false));

    let reader = {
        let stop = stop.clone();
        thread::spawn(move || {
            let mut reads = 0u64;
            while !stop.load(Ordering::Relaxed) {
                let snap = shared.load_full();
                let s = &snap.service;
                match s.system_id {
                    // LTE roaming abroad
                    10 => {
                        assert!(s.roaming);
                        assert_eq!(s.data_technology, RadioTechnology::Lte);
                        assert_eq!(snap.cell.base_station_id, 10);
                    }
                    // 1xRTT at home
                    20 => {
                        assert!(!s.roaming);
                        assert_eq!(s.data_technology, RadioTechnology::OneXRtt);
                        assert_eq!(snap.cell.base_station_id, 20);
                    }
                    -1 => assert_eq!(snap.cycle.get(), 0),
                    other => panic!("unexpected system id {}", other),
                }
                reads += 1;
            }
            reads
        })
    };

    for i in 0..200 {
        if i % 2 == 0 {
            h.script(
                VoiceReply::roaming(RadioTechnology::OneXRtt)
                    .with_system(10, 1)
                    .with_base_station(10),
                5,
                RadioTechnology::Lte,
            );
        } else {
            h.script(
                VoiceReply::home(RadioTechnology::OneXRtt)
                    .with_system(20, 1)
                    .with_base_station(20),
                1,
                RadioTechnology::OneXRtt,
            );
        }
        h.cycle();
    }

    stop.store(true, Ordering::Relaxed);
    let reads = reader.join().unwrap();
    assert!(reads > 0);
}

// ─── Signal and Card ─────────────────────────────────────────────────────────

#[test]
fn signal_report_keeps_registration_view() {
    let mut h = harness();
    h.script(VoiceReply::home(RadioTechnology::OneXRtt), 1, RadioTechnology::OneXRtt);
    h.cycle();
    let before = h.rec.snapshot();

    let raw = strata_service_state::radio::raw_reply(&["20", "0", "75", "90", "80", "100", "5"]);
    assert!(h.rec.on_signal_strength(&raw));
    let after = h.rec.snapshot();
    assert_eq!(after.service, before.service);
    assert_eq!(after.cycle, before.cycle);
    assert!(!after.signal.gsm);
    assert_eq!(h.events.count(EventKind::SignalStrengthChanged), 1);

    h.radio.set_power(RadioPowerState::Off);
    assert!(h.rec.on_signal_strength(&raw));
    assert_eq!(h.rec.snapshot().signal.cdma_dbm, -1);
}

#[test]
fn concurrent_voice_and_data_follows_technology() {
    let mut config = ServiceStateConfig::default();
    config.sessions.concurrent_voice_data = true;
    let mut h = harness_with(config, None, Arc::new(TrackerFactory::default()));

    h.script(VoiceReply::home(RadioTechnology::OneXRtt).with_css(false), 1, RadioTechnology::OneXRtt);
    h.cycle();
    assert!(!h.rec.concurrent_voice_and_data_allowed());

    h.script(VoiceReply::home(RadioTechnology::OneXRtt), 1, RadioTechnology::Lte);
    h.cycle();
    assert!(h.rec.concurrent_voice_and_data_allowed());
}
