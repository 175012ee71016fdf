use std::sync::Mutex;
use strata_service_state::radio::SubscriberCard;

#[derive(Debug, Clone, Default)]
struct CardRecords {
    ready: bool,
    spn: Option<String>,
    show_spn: bool,
    home_system_ids: Option<String>,
    home_network_ids: Option<String>,
}

/// Subscriber card with fixed records that a test can rewrite.
#[derive(Debug, Default)]
pub struct StaticCard {
    records: Mutex<CardRecords>,
}

impl StaticCard {
    /// Ready card showing `spn` on its home network `sids`/`nids`.
    pub fn new(spn: &str, sids: &str, nids: &str) -> Self {
        StaticCard {
            records: Mutex::new(CardRecords {
                ready: true,
                spn: Some(spn.to_string()),
                show_spn: true,
                home_system_ids: Some(sids.to_string()),
                home_network_ids: Some(nids.to_string()),
            }),
        }
    }

    /// Card not inserted or not yet loaded.
    pub fn absent() -> Self {
        Self::default()
    }

    pub fn set_ready(&self, ready: bool) {
        self.records().ready = ready;
    }

    pub fn set_show_spn(&self, show: bool) {
        self.records().show_spn = show;
    }

    pub fn set_home_networks(&self, sids: &str, nids: &str) {
        let mut r = self.records();
        r.home_system_ids = Some(sids.to_string());
        r.home_network_ids = Some(nids.to_string());
    }

    fn records(&self) -> std::sync::MutexGuard<'_, CardRecords> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SubscriberCard for StaticCard {
    fn is_ready(&self) -> bool {
        self.records().ready
    }

    fn service_provider_name(&self) -> Option<String> {
        self.records().spn.clone()
    }

    fn show_spn_in_home(&self) -> bool {
        self.records().show_spn
    }

    fn home_system_ids(&self) -> Option<String> {
        self.records().home_system_ids.clone()
    }

    fn home_network_ids(&self) -> Option<String> {
        self.records().home_network_ids.clone()
    }
}
