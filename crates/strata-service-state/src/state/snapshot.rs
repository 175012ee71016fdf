//! # Service-State Snapshot
//!
//! Value types describing one reconciled view of the modem: registration
//! state, radio technology, operator identity, cell location and signal
//! strength. A [`Snapshot`] is built from scratch every polling cycle and
//! published behind an `Arc`; once published it is never mutated.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tracker::barrier::CycleId;

// ─── Registration State ─────────────────────────────────────────────────────

/// Voice or data registration state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegState {
    #[default]
    OutOfService,
    /// Not registered, but emergency calls are possible.
    Emergency,
    /// Registration rejected by the network.
    Denied,
    RadioOff,
    InService,
}

impl RegState {
    pub fn is_in_service(self) -> bool {
        self == RegState::InService
    }
}

impl fmt::Display for RegState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RegState::OutOfService => "out-of-service",
            RegState::Emergency => "emergency-only",
            RegState::Denied => "denied",
            RegState::RadioOff => "radio-off",
            RegState::InService => "in-service",
        };
        f.write_str(s)
    }
}

// ─── Radio Technology ───────────────────────────────────────────────────────

/// Air interface reported by the radio layer.
///
/// Discriminants are the radio layer's numeric codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RadioTechnology {
    #[default]
    Unknown = 0,
    Gprs = 1,
    Edge = 2,
    Umts = 3,
    Is95A = 4,
    Is95B = 5,
    OneXRtt = 6,
    Evdo0 = 7,
    EvdoA = 8,
    Hsdpa = 9,
    Hsupa = 10,
    Hspa = 11,
    EvdoB = 12,
    Ehrpd = 13,
    Lte = 14,
    Hspap = 15,
    Gsm = 16,
}

impl RadioTechnology {
    const ALL: [RadioTechnology; 17] = [
        RadioTechnology::Unknown,
        RadioTechnology::Gprs,
        RadioTechnology::Edge,
        RadioTechnology::Umts,
        RadioTechnology::Is95A,
        RadioTechnology::Is95B,
        RadioTechnology::OneXRtt,
        RadioTechnology::Evdo0,
        RadioTechnology::EvdoA,
        RadioTechnology::Hsdpa,
        RadioTechnology::Hsupa,
        RadioTechnology::Hspa,
        RadioTechnology::EvdoB,
        RadioTechnology::Ehrpd,
        RadioTechnology::Lte,
        RadioTechnology::Hspap,
        RadioTechnology::Gsm,
    ];

    /// Look up a technology by its radio-layer code.
    pub fn from_code(code: i32) -> Option<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
    }

    pub fn code(self) -> i32 {
        self as i32
    }

    /// Technologies able to carry several concurrent data sessions.
    pub fn supports_multi_session(self) -> bool {
        matches!(self, RadioTechnology::Lte | RadioTechnology::Ehrpd)
    }

    /// The legacy CDMA range (IS-95A through EV-DO rev. A) limited to a
    /// single data session.
    pub fn is_legacy_single_session(self) -> bool {
        (RadioTechnology::Is95A.code()..=RadioTechnology::EvdoA.code()).contains(&self.code())
    }

    /// Whether `self` and `other` form a data handoff pair that keeps the
    /// session alive (LTE ⇄ eHRPD).
    pub fn is_linked_with(self, other: RadioTechnology) -> bool {
        matches!(
            (self, other),
            (RadioTechnology::Lte, RadioTechnology::Ehrpd)
                | (RadioTechnology::Ehrpd, RadioTechnology::Lte)
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            RadioTechnology::Unknown => "Unknown",
            RadioTechnology::Gprs => "GPRS",
            RadioTechnology::Edge => "EDGE",
            RadioTechnology::Umts => "UMTS",
            RadioTechnology::Is95A => "CDMA-IS95A",
            RadioTechnology::Is95B => "CDMA-IS95B",
            RadioTechnology::OneXRtt => "1xRTT",
            RadioTechnology::Evdo0 => "EvDo-rev.0",
            RadioTechnology::EvdoA => "EvDo-rev.A",
            RadioTechnology::Hsdpa => "HSDPA",
            RadioTechnology::Hsupa => "HSUPA",
            RadioTechnology::Hspa => "HSPA",
            RadioTechnology::EvdoB => "EvDo-rev.B",
            RadioTechnology::Ehrpd => "eHRPD",
            RadioTechnology::Lte => "LTE",
            RadioTechnology::Hspap => "HSPAP",
            RadioTechnology::Gsm => "GSM",
        }
    }
}

impl fmt::Display for RadioTechnology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ─── Operator ───────────────────────────────────────────────────────────────

/// Operator identity as reported by the network.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct OperatorInfo {
    pub alpha_long: Option<String>,
    pub alpha_short: Option<String>,
    /// MCC + MNC, e.g. `"310004"`.
    pub numeric: Option<String>,
}

// ─── Service State ──────────────────────────────────────────────────────────

/// Roaming indicator value meaning "not roaming" (the network's roaming
/// banner is off).
pub const ROAMING_INDICATOR_OFF: i32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceState {
    /// Overall (voice) registration state.
    pub state: RegState,
    /// Technology reported by voice registration.
    pub technology: RadioTechnology,
    pub data_state: RegState,
    /// Technology reported by data registration.
    pub data_technology: RadioTechnology,
    pub roaming: bool,
    pub operator: OperatorInfo,
    /// ISO country derived from the operator's MCC; empty when unknown.
    pub country_iso: String,
    pub manual_selection: bool,
    pub system_id: i32,
    pub network_id: i32,
    pub roaming_indicator: Option<i32>,
    /// Concurrent voice and data indicator from voice registration.
    pub css_indicator: bool,
}

impl ServiceState {
    pub fn out_of_service() -> Self {
        ServiceState {
            state: RegState::OutOfService,
            technology: RadioTechnology::Unknown,
            data_state: RegState::OutOfService,
            data_technology: RadioTechnology::Unknown,
            roaming: false,
            operator: OperatorInfo::default(),
            country_iso: String::new(),
            manual_selection: false,
            system_id: -1,
            network_id: -1,
            roaming_indicator: None,
            css_indicator: false,
        }
    }

    pub fn radio_off() -> Self {
        ServiceState {
            state: RegState::RadioOff,
            ..Self::out_of_service()
        }
    }
}

impl Default for ServiceState {
    fn default() -> Self {
        Self::out_of_service()
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "voice={} ({}) data={} ({}) roaming={} operator={}/{}",
            self.state,
            self.technology,
            self.data_state,
            self.data_technology,
            self.roaming,
            self.operator.alpha_long.as_deref().unwrap_or("-"),
            self.operator.numeric.as_deref().unwrap_or("-"),
        )
    }
}

// ─── Cell Location ──────────────────────────────────────────────────────────

/// CDMA-style cell location. Compared by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CellLocation {
    pub base_station_id: i32,
    /// Latitude in units of 0.25 seconds.
    pub latitude: i32,
    /// Longitude in units of 0.25 seconds.
    pub longitude: i32,
    pub system_id: i32,
    pub network_id: i32,
}

impl CellLocation {
    /// Sentinel coordinate for an unknown position.
    pub const INVALID_COORD: i32 = i32::MAX;

    pub fn invalid() -> Self {
        CellLocation {
            base_station_id: -1,
            latitude: Self::INVALID_COORD,
            longitude: Self::INVALID_COORD,
            system_id: -1,
            network_id: -1,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.base_station_id >= 0
    }
}

impl Default for CellLocation {
    fn default() -> Self {
        Self::invalid()
    }
}

// ─── Signal Strength ────────────────────────────────────────────────────────

/// Normalised signal report. Replaced wholesale on every update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SignalStrength {
    /// Whether the GSM/LTE fields are the meaningful ones.
    pub gsm: bool,
    /// GSM RSSI in ASU (0–31, 99 = unknown).
    pub gsm_rssi: i32,
    pub gsm_bit_error_rate: i32,
    /// CDMA RSSI in dBm (positive magnitude, -1 = unknown).
    pub cdma_dbm: i32,
    /// CDMA Ec/Io in dB×10 (positive magnitude, -1 = unknown).
    pub cdma_ecio: i32,
    pub evdo_dbm: i32,
    pub evdo_ecio: i32,
    /// EV-DO SNR 0–8, -1 = unknown.
    pub evdo_snr: i32,
    /// LTE signal strength in ASU (0–63, 99 = unknown).
    pub lte_signal_strength: i32,
    /// LTE RSRP in dBm (positive magnitude, -1 = unknown).
    pub lte_rsrp: i32,
    pub lte_rsrq: i32,
    /// LTE RS-SNR in dB×10 (`i32::MAX` = unknown).
    pub lte_rssnr: i32,
}

impl SignalStrength {
    /// Sentinel used when the radio is off or unavailable.
    pub fn no_radio() -> Self {
        SignalStrength {
            gsm: false,
            gsm_rssi: 99,
            gsm_bit_error_rate: -1,
            cdma_dbm: -1,
            cdma_ecio: -1,
            evdo_dbm: -1,
            evdo_ecio: -1,
            evdo_snr: -1,
            lte_signal_strength: 99,
            lte_rsrp: -1,
            lte_rsrq: -1,
            lte_rssnr: i32::MAX,
        }
    }

    /// Coarse 0–4 level for display.
    pub fn level(&self) -> u8 {
        if self.gsm && self.lte_rsrp > 0 {
            // RSRP is reported as a positive magnitude
            return match -self.lte_rsrp {
                r if r >= -95 => 4,
                r if r >= -105 => 3,
                r if r >= -115 => 2,
                r if r >= -125 => 1,
                _ => 0,
            };
        }
        if self.gsm {
            return match self.gsm_rssi {
                99 => 0,
                r if r >= 12 => 4,
                r if r >= 8 => 3,
                r if r >= 5 => 2,
                r if r >= 2 => 1,
                _ => 0,
            };
        }
        if self.cdma_dbm <= 0 {
            return 0;
        }
        match -self.cdma_dbm {
            d if d >= -75 => 4,
            d if d >= -85 => 3,
            d if d >= -95 => 2,
            d if d >= -100 => 1,
            _ => 0,
        }
    }
}

impl Default for SignalStrength {
    fn default() -> Self {
        Self::no_radio()
    }
}

// ─── Snapshot ───────────────────────────────────────────────────────────────

/// Everything observers see after a commit, published as one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    /// Cycle that produced this snapshot (0 before the first commit).
    pub cycle: CycleId,
    pub service: ServiceState,
    pub cell: CellLocation,
    pub signal: SignalStrength,
}

impl Snapshot {
    pub fn initial() -> Self {
        Snapshot {
            cycle: CycleId::ZERO,
            service: ServiceState::out_of_service(),
            cell: CellLocation::invalid(),
            signal: SignalStrength::no_radio(),
        }
    }

    /// Same registration view, new signal report.
    pub fn with_signal(&self, signal: SignalStrength) -> Self {
        Snapshot {
            signal,
            ..self.clone()
        }
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::initial()
    }
}
