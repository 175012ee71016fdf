use crate::radio::ScriptedRadio;
use crate::reply::VoiceReply;
use rand::RngExt as _;
use rand::SeedableRng;
use rand::rngs::StdRng;
use strata_service_state::radio::RadioPowerState;
use strata_service_state::state::RadioTechnology;

/// Configuration for a deterministic radio scenario.
#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    pub seed: u64,
    pub steps: usize,
    /// Chance per step of moving to another data technology.
    pub handoff_probability: f64,
    /// Chance per step of toggling roaming.
    pub roaming_probability: f64,
    /// Chance per step of the radio being switched off.
    pub power_off_probability: f64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        ScenarioConfig {
            seed: 1,
            steps: 12,
            handoff_probability: 0.4,
            roaming_probability: 0.1,
            power_off_probability: 0.05,
        }
    }
}

/// Radio conditions for one polling cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioStep {
    pub power: RadioPowerState,
    pub voice: VoiceReply,
    pub data_reg_code: i32,
    pub data_technology: RadioTechnology,
}

impl ScenarioStep {
    /// Load this step into the radio script.
    pub fn apply(&self, radio: &ScriptedRadio) {
        radio.set_power(self.power);
        radio.set_voice(&self.voice);
        radio.set_data(self.data_reg_code, self.data_technology);
    }
}

/// Data technologies a hybrid CDMA/LTE modem moves between.
const WALK: [RadioTechnology; 5] = [
    RadioTechnology::OneXRtt,
    RadioTechnology::Evdo0,
    RadioTechnology::EvdoA,
    RadioTechnology::Ehrpd,
    RadioTechnology::Lte,
];

/// Deterministic random walk across data technologies.
///
/// Given a seed, produces a reproducible sequence of [`ScenarioStep`]s
/// in which the modem hands off between neighbouring technologies,
/// occasionally roams and occasionally loses power.
#[derive(Debug)]
pub struct Scenario {
    cfg: ScenarioConfig,
    rng: StdRng,
    position: usize,
    roaming: bool,
}

impl Scenario {
    pub fn new(cfg: ScenarioConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(cfg.seed);
        let position = (rng.random::<f64>() * WALK.len() as f64) as usize % WALK.len();
        Self {
            cfg,
            rng,
            position,
            roaming: false,
        }
    }

    pub fn steps(&mut self) -> Vec<ScenarioStep> {
        (0..self.cfg.steps).map(|_| self.next_step()).collect()
    }

    fn next_step(&mut self) -> ScenarioStep {
        if self.rng.random::<f64>() < self.cfg.handoff_probability {
            self.position = if self.rng.random::<bool>() {
                (self.position + 1).min(WALK.len() - 1)
            } else {
                self.position.saturating_sub(1)
            };
        }
        if self.rng.random::<f64>() < self.cfg.roaming_probability {
            self.roaming = !self.roaming;
        }
        let power = if self.rng.random::<f64>() < self.cfg.power_off_probability {
            RadioPowerState::Off
        } else {
            RadioPowerState::On
        };

        let data_technology = WALK[self.position];
        let voice_technology = if data_technology == RadioTechnology::Lte {
            RadioTechnology::OneXRtt
        } else {
            data_technology
        };
        let voice = if self.roaming {
            VoiceReply::roaming(voice_technology)
        } else {
            VoiceReply::home(voice_technology)
        }
        .with_base_station(100 + self.position as i32);

        ScenarioStep {
            power,
            voice,
            data_reg_code: if self.roaming { 5 } else { 1 },
            data_technology,
        }
    }
}
