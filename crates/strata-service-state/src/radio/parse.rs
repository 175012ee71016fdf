//! # Response Parsers
//!
//! Pure functions turning raw radio replies into partial snapshot fields.
//! Vendor radio layers return ragged, loosely typed field lists, so nothing
//! here fails: missing or unparsable fields fall back to documented
//! sentinels and the problem is recorded as an [`Anomaly`] next to the
//! parsed value.
//!
//! | Query | Field layout |
//! |-------|--------------|
//! | operator | `[0]` long name, `[1]` short name, `[2]` numeric |
//! | voice registration | `[0]` reg state, `[3]` technology, `[4]` base station, `[5]` lat, `[6]` long, `[7]` CSS, `[8]` SID, `[9]` NID, `[10]` roaming indicator, `[11]` in PRL, `[12]` default roaming indicator |
//! | data registration | `[0]` reg state, `[3]` technology |
//! | network selection | `[0]` 1 = manual |

use std::fmt;

use super::{QueryKind, RawReply};
use crate::state::{CellLocation, OperatorInfo, RadioTechnology, RegState, SignalStrength};

/// Sentinel for an unparsable registration code.
pub const UNKNOWN_REG_CODE: i32 = -1;
/// Fields the voice-registration reply is expected to carry.
pub const VOICE_REPLY_FIELDS: usize = 14;

// ─── Anomalies ──────────────────────────────────────────────────────────────

/// A recoverable defect in a radio reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anomaly {
    ShortReply {
        kind: QueryKind,
        expected: usize,
        got: usize,
    },
    BadNumber {
        kind: QueryKind,
        index: usize,
        raw: String,
    },
    UnknownRegCode {
        kind: QueryKind,
        code: i32,
    },
    UnknownTechnology {
        kind: QueryKind,
        code: i32,
    },
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anomaly::ShortReply {
                kind,
                expected,
                got,
            } => write!(f, "{kind}: expected {expected} fields, got {got}"),
            Anomaly::BadNumber { kind, index, raw } => {
                write!(f, "{kind}: field {index} is not a number: {raw:?}")
            }
            Anomaly::UnknownRegCode { kind, code } => {
                write!(f, "{kind}: unexpected registration code {code}")
            }
            Anomaly::UnknownTechnology { kind, code } => {
                write!(f, "{kind}: unexpected radio technology {code}")
            }
        }
    }
}

/// A parsed value plus whatever was wrong with its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parsed<T> {
    pub value: T,
    pub anomalies: Vec<Anomaly>,
}

impl<T> Parsed<T> {
    pub fn is_clean(&self) -> bool {
        self.anomalies.is_empty()
    }
}

// ─── Code Tables ────────────────────────────────────────────────────────────

/// Registration code → state. `None` for codes outside the table.
pub fn reg_code_to_state(code: i32) -> Option<RegState> {
    match code {
        // not registered, not searching
        0 => Some(RegState::OutOfService),
        // registered, home
        1 => Some(RegState::InService),
        // searching
        2 => Some(RegState::OutOfService),
        3 => Some(RegState::Denied),
        // unknown
        4 => Some(RegState::OutOfService),
        // registered, roaming
        5 => Some(RegState::InService),
        // same as 0/2/4 with emergency calls available
        10 | 12 | 14 => Some(RegState::Emergency),
        13 => Some(RegState::Denied),
        _ => None,
    }
}

pub fn reg_code_is_roaming(code: i32) -> bool {
    code == 5
}

// ─── Field Access ───────────────────────────────────────────────────────────

struct Fields<'a> {
    kind: QueryKind,
    raw: &'a RawReply,
    anomalies: Vec<Anomaly>,
}

impl<'a> Fields<'a> {
    fn new(kind: QueryKind, raw: &'a RawReply, expected: usize) -> Self {
        let mut anomalies = Vec::new();
        if raw.len() < expected {
            anomalies.push(Anomaly::ShortReply {
                kind,
                expected,
                got: raw.len(),
            });
        }
        Fields {
            kind,
            raw,
            anomalies,
        }
    }

    fn text(&self, idx: usize) -> Option<&'a str> {
        self.raw
            .get(idx)
            .and_then(|f| f.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Integer at `idx`, or `None` when absent. Garbage is recorded.
    fn int(&mut self, idx: usize) -> Option<i32> {
        let raw = self.text(idx)?;
        match raw.parse::<i32>() {
            Ok(v) => Some(v),
            Err(_) => {
                self.anomalies.push(Anomaly::BadNumber {
                    kind: self.kind,
                    index: idx,
                    raw: raw.to_string(),
                });
                None
            }
        }
    }

    fn reg_state(&mut self, idx: usize) -> (i32, RegState) {
        let code = self.int(idx).unwrap_or(UNKNOWN_REG_CODE);
        let state = reg_code_to_state(code).unwrap_or_else(|| {
            if code != UNKNOWN_REG_CODE {
                self.anomalies.push(Anomaly::UnknownRegCode {
                    kind: self.kind,
                    code,
                });
            }
            RegState::OutOfService
        });
        (code, state)
    }

    fn technology(&mut self, idx: usize) -> RadioTechnology {
        let code = self.int(idx).unwrap_or(0);
        RadioTechnology::from_code(code).unwrap_or_else(|| {
            self.anomalies.push(Anomaly::UnknownTechnology {
                kind: self.kind,
                code,
            });
            RadioTechnology::Unknown
        })
    }

    fn finish<T>(self, value: T) -> Parsed<T> {
        Parsed {
            value,
            anomalies: self.anomalies,
        }
    }
}

// ─── Operator ───────────────────────────────────────────────────────────────

pub fn parse_operator(raw: &RawReply) -> Parsed<OperatorInfo> {
    let fields = Fields::new(QueryKind::Operator, raw, 3);
    let owned = |idx| fields.text(idx).map(str::to_string);
    let value = OperatorInfo {
        alpha_long: owned(0),
        alpha_short: owned(1),
        numeric: owned(2),
    };
    fields.finish(value)
}

// ─── Voice Registration ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceRegistration {
    pub reg_code: i32,
    pub state: RegState,
    pub roaming: bool,
    pub technology: RadioTechnology,
    pub cell: CellLocation,
    pub css_indicator: bool,
    pub system_id: i32,
    pub network_id: i32,
    pub roaming_indicator: Option<i32>,
    pub in_prl: bool,
    pub default_roaming_indicator: Option<i32>,
}

pub fn parse_voice_registration(raw: &RawReply) -> Parsed<VoiceRegistration> {
    let mut f = Fields::new(QueryKind::VoiceRegistration, raw, VOICE_REPLY_FIELDS);

    let (reg_code, state) = f.reg_state(0);
    let technology = f.technology(3);
    let base_station_id = f.int(4).unwrap_or(-1);
    let mut latitude = f.int(5).unwrap_or(CellLocation::INVALID_COORD);
    let mut longitude = f.int(6).unwrap_or(CellLocation::INVALID_COORD);
    // 0,0 is what modems report when they have no fix
    if latitude == 0 && longitude == 0 {
        latitude = CellLocation::INVALID_COORD;
        longitude = CellLocation::INVALID_COORD;
    }
    let css_indicator = f.int(7) == Some(1);
    let system_id = f.int(8).unwrap_or(0);
    let network_id = f.int(9).unwrap_or(0);
    let roaming_indicator = f.int(10).filter(|v| *v >= 0);
    let in_prl = f.int(11) == Some(1);
    let default_roaming_indicator = f.int(12).filter(|v| *v >= 0);

    let value = VoiceRegistration {
        reg_code,
        state,
        roaming: reg_code_is_roaming(reg_code),
        technology,
        cell: CellLocation {
            base_station_id,
            latitude,
            longitude,
            system_id,
            network_id,
        },
        css_indicator,
        system_id,
        network_id,
        roaming_indicator,
        in_prl,
        default_roaming_indicator,
    };
    f.finish(value)
}

// ─── Data Registration ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataRegistration {
    pub reg_code: i32,
    pub state: RegState,
    pub roaming: bool,
    pub technology: RadioTechnology,
}

pub fn parse_data_registration(raw: &RawReply) -> Parsed<DataRegistration> {
    let mut f = Fields::new(QueryKind::DataRegistration, raw, 1);
    let (reg_code, state) = f.reg_state(0);
    let technology = f.technology(3);
    f.finish(DataRegistration {
        reg_code,
        state,
        roaming: reg_code_is_roaming(reg_code),
        technology,
    })
}

// ─── Network Selection ──────────────────────────────────────────────────────

/// `true` when the user selected the network manually.
pub fn parse_network_selection(raw: &RawReply) -> Parsed<bool> {
    let mut f = Fields::new(QueryKind::NetworkSelectionMode, raw, 1);
    let manual = f.int(0) == Some(1);
    f.finish(manual)
}

// ─── Signal Strength ────────────────────────────────────────────────────────

/// Parse a signal report:
/// `[gsm rssi, gsm ber, cdma dbm, cdma ecio, evdo dbm, evdo ecio, evdo snr,
/// lte signal, lte rsrp, lte rsrq, lte rssnr]`.
///
/// `lte` marks the report as GSM-format (LTE fields meaningful).
pub fn parse_signal_strength(raw: &RawReply, lte: bool) -> Parsed<SignalStrength> {
    // Signal reports are not one of the polled queries; attribute anomalies
    // to the registration that decides their format.
    let kind = if lte {
        QueryKind::DataRegistration
    } else {
        QueryKind::VoiceRegistration
    };
    let mut f = Fields::new(kind, raw, 7);
    let d = SignalStrength::no_radio();
    let value = SignalStrength {
        gsm: lte,
        gsm_rssi: f.int(0).unwrap_or(d.gsm_rssi),
        gsm_bit_error_rate: f.int(1).unwrap_or(d.gsm_bit_error_rate),
        cdma_dbm: f.int(2).unwrap_or(d.cdma_dbm),
        cdma_ecio: f.int(3).unwrap_or(d.cdma_ecio),
        evdo_dbm: f.int(4).unwrap_or(d.evdo_dbm),
        evdo_ecio: f.int(5).unwrap_or(d.evdo_ecio),
        evdo_snr: f.int(6).unwrap_or(d.evdo_snr),
        lte_signal_strength: f.int(7).unwrap_or(d.lte_signal_strength),
        lte_rsrp: f.int(8).unwrap_or(d.lte_rsrp),
        lte_rsrq: f.int(9).unwrap_or(d.lte_rsrq),
        lte_rssnr: f.int(10).unwrap_or(d.lte_rssnr),
    };
    f.finish(value)
}
