use anyhow::{Context, Result};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use strata_radio_sim::scenario::{Scenario, ScenarioConfig};
use strata_radio_sim::{RecordingObserver, ScriptedRadio, StaticCard};
use strata_service_state::radio::country::MccTable;
use strata_service_state::session::TrackerFactory;
use strata_service_state::{Collaborators, EventKind, ServiceStateConfig, ServiceStateRuntime};
use tracing::info;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(true)
        .compact()
        .init();

    let mut config_path = None;
    let mut scenario = ScenarioConfig::default();

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                config_path = Some(args.next().context("Missing --config value")?);
            }
            "--seed" => {
                scenario.seed = args.next().context("Missing --seed value")?.parse()?;
            }
            "--steps" => {
                scenario.steps = args.next().context("Missing --steps value")?.parse()?;
            }
            "--power-off" => {
                scenario.power_off_probability =
                    args.next().context("Missing --power-off value")?.parse()?;
            }
            other => anyhow::bail!("Unknown argument: {}", other),
        }
    }

    let config = match config_path {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config {}", path))?;
            ServiceStateConfig::from_toml_str(&text)?
        }
        None => ServiceStateConfig::default(),
    };

    let radio = Arc::new(ScriptedRadio::new());
    radio.set_operator("Strata Mobile", "Strata", "310120");
    let card = Arc::new(StaticCard::new("Strata Home", "1", "65535"));

    let strategies = Arc::new(TrackerFactory::from_config(&config.sessions));
    let mut runtime = ServiceStateRuntime::start(
        config,
        Collaborators {
            radio: radio.clone(),
            card: Some(card),
            country: Arc::new(MccTable),
            strategies,
        },
    )?;
    let recorder = RecordingObserver::new();
    for kind in EventKind::ALL {
        runtime.subscribe(kind, recorder.clone());
    }

    info!(seed = scenario.seed, steps = scenario.steps, "running radio scenario");
    let steps = Scenario::new(scenario).steps();

    runtime.card_records_loaded()?;
    wait_for_commit(&runtime, 1)?;

    for (i, step) in steps.iter().enumerate() {
        step.apply(&radio);
        let before = runtime.commits();
        runtime.request_poll()?;
        wait_for_commit(&runtime, before + 1)?;

        let snapshot = runtime.snapshot();
        info!(
            step = i,
            cycle = %snapshot.cycle,
            state = %snapshot.service.state,
            data = %snapshot.service.data_technology,
            sessions = %runtime.sessions().class(),
            "step committed"
        );
        println!("{}", serde_json::to_string(&*snapshot)?);
    }

    for kind in EventKind::ALL {
        let n = recorder.count(kind);
        if n > 0 {
            info!(event = %kind, count = n, "event totals");
        }
    }

    runtime.shutdown();
    Ok(())
}

fn wait_for_commit(runtime: &ServiceStateRuntime, target: u64) -> Result<()> {
    let deadline = Instant::now() + Duration::from_secs(5);
    while runtime.commits() < target {
        if Instant::now() >= deadline {
            anyhow::bail!("Timed out waiting for cycle {}", target);
        }
        thread::sleep(Duration::from_millis(1));
    }
    Ok(())
}
