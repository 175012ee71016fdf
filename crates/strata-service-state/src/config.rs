use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::radio::home::HomeNetworkTable;
use crate::session::TechnologyClass;

pub const CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceStateConfigInput {
    pub version: u32,
    pub polling: PollingConfigInput,
    pub sessions: SessionConfigInput,
    pub home_network: HomeNetworkConfigInput,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PollingConfigInput {
    pub data_only: Option<bool>,
    pub query_network_selection: Option<bool>,
    pub query_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SessionConfigInput {
    pub initial_class: Option<TechnologyClass>,
    pub max_multi_sessions: Option<usize>,
    pub concurrent_voice_data: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HomeNetworkConfigInput {
    pub system_ids: Option<String>,
    pub network_ids: Option<String>,
}

/// Polling-cycle behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollingConfig {
    /// Device runs data-only (LTE only): when voice registration is out of
    /// service the data-side state becomes the service state.
    pub data_only: bool,
    /// Also query manual/automatic network selection each cycle.
    pub query_network_selection: bool,
    /// Give up on outstanding queries after this long. `None` waits forever.
    pub query_timeout: Option<Duration>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            data_only: false,
            query_network_selection: false,
            query_timeout: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub initial_class: TechnologyClass,
    pub max_multi_sessions: usize,
    /// Platform supports simultaneous voice and data off 1xRTT.
    pub concurrent_voice_data: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            initial_class: TechnologyClass::Single,
            max_multi_sessions: 8,
            concurrent_voice_data: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceStateConfig {
    pub version: u32,
    pub polling: PollingConfig,
    pub sessions: SessionConfig,
    /// Provisioned table used until the card supplies its own.
    pub home_network: HomeNetworkTable,
}

impl Default for ServiceStateConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            polling: PollingConfig::default(),
            sessions: SessionConfig::default(),
            home_network: HomeNetworkTable::default(),
        }
    }
}

impl ServiceStateConfigInput {
    pub fn resolve(self) -> Result<ServiceStateConfig, ConfigError> {
        let version = if self.version == 0 {
            CONFIG_VERSION
        } else {
            self.version
        };
        if version != CONFIG_VERSION {
            return Err(ConfigError::UnsupportedVersion(version));
        }

        let polling = PollingConfig {
            data_only: self.polling.data_only.unwrap_or(false),
            query_network_selection: self.polling.query_network_selection.unwrap_or(false),
            query_timeout: self
                .polling
                .query_timeout_ms
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis),
        };

        let defaults = SessionConfig::default();
        let max_multi_sessions = self
            .sessions
            .max_multi_sessions
            .unwrap_or(defaults.max_multi_sessions);
        if max_multi_sessions == 0 {
            return Err(ConfigError::NoSessions);
        }
        let sessions = SessionConfig {
            initial_class: self.sessions.initial_class.unwrap_or(defaults.initial_class),
            max_multi_sessions,
            concurrent_voice_data: self
                .sessions
                .concurrent_voice_data
                .unwrap_or(defaults.concurrent_voice_data),
        };

        let home_network = match (self.home_network.system_ids, self.home_network.network_ids) {
            (Some(sids), Some(nids)) => HomeNetworkTable::parse(&sids, &nids),
            (None, None) => HomeNetworkTable::default(),
            (sids, nids) => {
                tracing::warn!(?sids, ?nids, "home network lists must be given together, ignoring");
                HomeNetworkTable::default()
            }
        };

        Ok(ServiceStateConfig {
            version,
            polling,
            sessions,
            home_network,
        })
    }
}

impl ServiceStateConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        if input.trim().is_empty() {
            return Ok(ServiceStateConfig::default());
        }
        let parsed: ServiceStateConfigInput = toml::from_str(input)?;
        parsed.resolve()
    }
}
