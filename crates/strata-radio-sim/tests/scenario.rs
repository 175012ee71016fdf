//! End-to-end scenario runs through the threaded runtime.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use strata_radio_sim::scenario::{Scenario, ScenarioConfig};
use strata_radio_sim::{RecordingObserver, ScriptedRadio, StaticCard};
use strata_service_state::radio::country::MccTable;
use strata_service_state::radio::RadioPowerState;
use strata_service_state::session::{TechnologyClass, TrackerFactory};
use strata_service_state::state::RegState;
use strata_service_state::{Collaborators, EventKind, ServiceStateConfig, ServiceStateRuntime};

fn wait_for_commits(rt: &ServiceStateRuntime, target: u64) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while rt.commits() < target {
        assert!(Instant::now() < deadline, "cycle {} never committed", target);
        thread::sleep(Duration::from_millis(1));
    }
}

fn start(radio: Arc<ScriptedRadio>) -> ServiceStateRuntime {
    radio.set_operator("Strata Mobile", "Strata", "310120");
    ServiceStateRuntime::start(
        ServiceStateConfig::default(),
        Collaborators {
            radio,
            card: Some(Arc::new(StaticCard::new("Strata Home", "1", "65535"))),
            country: Arc::new(MccTable),
            strategies: Arc::new(TrackerFactory::default()),
        },
    )
    .unwrap()
}

#[test]
fn seeded_walk_tracks_every_step() {
    for seed in [1u64, 7, 42] {
        let radio = Arc::new(ScriptedRadio::new());
        let rt = start(radio.clone());
        let steps = Scenario::new(ScenarioConfig {
            seed,
            steps: 40,
            power_off_probability: 0.1,
            ..Default::default()
        })
        .steps();

        for (i, step) in steps.iter().enumerate() {
            step.apply(&radio);
            rt.request_poll().unwrap();
            wait_for_commits(&rt, i as u64 + 1);

            let snap = rt.snapshot();
            if step.power == RadioPowerState::Off {
                assert_eq!(snap.service.state, RegState::RadioOff, "seed {} step {}", seed, i);
                continue;
            }
            assert_eq!(snap.service.data_technology, step.data_technology);
            assert_eq!(snap.service.roaming, step.voice.reg_code == 5);
            assert_eq!(snap.cell.base_station_id, step.voice.base_station_id);
            if let Some(class) = TechnologyClass::of(step.data_technology) {
                assert_eq!(rt.sessions().class(), class, "seed {} step {}", seed, i);
            }
        }
    }
}

#[test]
fn card_load_shows_provider_name_at_home() {
    let radio = Arc::new(ScriptedRadio::new());
    radio.set_voice(&strata_radio_sim::VoiceReply::home(
        strata_service_state::state::RadioTechnology::OneXRtt,
    ));
    radio.set_data(1, strata_service_state::state::RadioTechnology::EvdoA);
    let rt = start(radio);
    let recorder = RecordingObserver::new();
    assert!(rt.subscribe(EventKind::ServiceStateChanged, recorder.clone()));

    rt.card_records_loaded().unwrap();
    wait_for_commits(&rt, 1);

    let snap = rt.snapshot();
    assert_eq!(snap.service.operator.alpha_long.as_deref(), Some("Strata Home"));
    assert_eq!(snap.service.country_iso, "us");
    assert_eq!(recorder.count(EventKind::ServiceStateChanged), 1);
}

#[test]
fn repeated_polls_are_quiet_once_settled() {
    let radio = Arc::new(ScriptedRadio::new());
    radio.set_data(1, strata_service_state::state::RadioTechnology::Lte);
    let rt = start(radio);
    let recorder = RecordingObserver::new();
    for kind in EventKind::ALL {
        rt.subscribe(kind, recorder.clone());
    }

    rt.request_poll().unwrap();
    wait_for_commits(&rt, 1);
    let settled = recorder.events().len();
    assert!(settled > 0);

    for n in 2..=5 {
        rt.request_poll().unwrap();
        wait_for_commits(&rt, n);
    }
    assert_eq!(recorder.events().len(), settled);
}
