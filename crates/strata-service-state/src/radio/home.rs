//! Home network table: the provisioned (system id, network id) pairs that
//! identify the subscriber's home carrier footprint.
//!
//! Network ids `0` and `65535` are reserved and match any network id; a
//! reported system id of `0` is treated as home.

/// Reserved network ids meaning "any network within the system".
pub const WILDCARD_NETWORK_IDS: [i32; 2] = [0, 65535];

fn is_wildcard_nid(nid: i32) -> bool {
    WILDCARD_NETWORK_IDS.contains(&nid)
}

/// Read-only after load; shared behind an `Arc` and replaced wholesale
/// when the card's records reload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HomeNetworkTable {
    system_ids: Vec<i32>,
    network_ids: Vec<i32>,
}

impl HomeNetworkTable {
    pub fn new(pairs: &[(i32, i32)]) -> Self {
        HomeNetworkTable {
            system_ids: pairs.iter().map(|p| p.0).collect(),
            network_ids: pairs.iter().map(|p| p.1).collect(),
        }
    }

    /// Parse the comma-separated lists stored on the card. Entries that do
    /// not parse are kept as `0` and logged, so list positions stay aligned.
    pub fn parse(system_ids: &str, network_ids: &str) -> Self {
        HomeNetworkTable {
            system_ids: parse_id_list(system_ids, "system id"),
            network_ids: parse_id_list(network_ids, "network id"),
        }
    }

    pub fn len(&self) -> usize {
        self.system_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.system_ids.is_empty()
    }

    /// Whether `(sid, nid)` belongs to the home network.
    pub fn contains(&self, sid: i32, nid: i32) -> bool {
        // Nothing provisioned: assume home.
        if self.system_ids.iter().all(|&s| s == 0) {
            return true;
        }
        // Malformed provisioning: the lists must be parallel.
        if self.system_ids.len() != self.network_ids.len() {
            return true;
        }
        if sid == 0 {
            return true;
        }

        self.system_ids
            .iter()
            .zip(&self.network_ids)
            .any(|(&home_sid, &home_nid)| {
                home_sid == sid
                    && (is_wildcard_nid(home_nid) || is_wildcard_nid(nid) || home_nid == nid)
            })
    }
}

fn parse_id_list(input: &str, what: &str) -> Vec<i32> {
    if input.trim().is_empty() {
        return Vec::new();
    }
    input
        .split(',')
        .map(|field| {
            field.trim().parse::<i32>().unwrap_or_else(|e| {
                tracing::warn!(field, error = %e, "error parsing home {}", what);
                0
            })
        })
        .collect()
}
